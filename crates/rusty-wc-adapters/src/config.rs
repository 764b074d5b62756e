use std::path::PathBuf;
use std::str::FromStr;

use rusty_wc_core::{Account, BacklogOrder, BrokerConfig, EmptySessionPolicy};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct BrokerAdapterConfig {
    /// `None` keeps sessions in memory only.
    pub store_path: Option<PathBuf>,
    pub accounts: Vec<Account>,
    pub allow_eth_sign: bool,
    pub backlog_order: BacklogOrder,
    pub empty_session_policy: EmptySessionPolicy,
    pub proposal_timeout_ms: Option<u64>,
    pub maintenance_interval_ms: u64,
    pub responded_history_limit: usize,
}

impl Default for BrokerAdapterConfig {
    fn default() -> Self {
        Self {
            store_path: None,
            accounts: Vec::new(),
            allow_eth_sign: false,
            backlog_order: BacklogOrder::Lifo,
            empty_session_policy: EmptySessionPolicy::KeepSession,
            proposal_timeout_ms: None,
            maintenance_interval_ms: 30_000,
            responded_history_limit: 1_024,
        }
    }
}

impl BrokerAdapterConfig {
    pub const STORE_PATH: &'static str = "RUSTY_WC_STORE_PATH";
    pub const ACCOUNTS: &'static str = "RUSTY_WC_ACCOUNTS";
    pub const ALLOW_ETH_SIGN: &'static str = "RUSTY_WC_ALLOW_ETH_SIGN";
    pub const BACKLOG_ORDER: &'static str = "RUSTY_WC_BACKLOG_ORDER";
    pub const EMPTY_SESSION_POLICY: &'static str = "RUSTY_WC_EMPTY_SESSION_POLICY";
    pub const PROPOSAL_TIMEOUT_MS: &'static str = "RUSTY_WC_PROPOSAL_TIMEOUT_MS";
    pub const MAINTENANCE_INTERVAL_MS: &'static str = "RUSTY_WC_MAINTENANCE_INTERVAL_MS";

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source. Values that do not
    /// parse keep their default and are logged.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        if let Some(path) = get(Self::STORE_PATH) {
            cfg.store_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = get(Self::ACCOUNTS) {
            cfg.accounts = parse_accounts(&raw);
        }
        if let Some(raw) = get(Self::ALLOW_ETH_SIGN) {
            match parse_bool(&raw) {
                Some(v) => cfg.allow_eth_sign = v,
                None => invalid(Self::ALLOW_ETH_SIGN, &raw),
            }
        }
        if let Some(raw) = get(Self::BACKLOG_ORDER) {
            match raw.to_ascii_lowercase().as_str() {
                "lifo" => cfg.backlog_order = BacklogOrder::Lifo,
                "fifo" => cfg.backlog_order = BacklogOrder::Fifo,
                _ => invalid(Self::BACKLOG_ORDER, &raw),
            }
        }
        if let Some(raw) = get(Self::EMPTY_SESSION_POLICY) {
            match raw.to_ascii_lowercase().replace('-', "_").as_str() {
                "keep" | "keep_session" => {
                    cfg.empty_session_policy = EmptySessionPolicy::KeepSession
                }
                "disconnect" => cfg.empty_session_policy = EmptySessionPolicy::Disconnect,
                _ => invalid(Self::EMPTY_SESSION_POLICY, &raw),
            }
        }
        if let Some(raw) = get(Self::PROPOSAL_TIMEOUT_MS) {
            match parse_num::<u64>(Self::PROPOSAL_TIMEOUT_MS, &raw) {
                Some(0) => cfg.proposal_timeout_ms = None,
                Some(ms) => cfg.proposal_timeout_ms = Some(ms),
                None => {}
            }
        }
        if let Some(raw) = get(Self::MAINTENANCE_INTERVAL_MS) {
            if let Some(ms) = parse_num::<u64>(Self::MAINTENANCE_INTERVAL_MS, &raw) {
                if ms > 0 {
                    cfg.maintenance_interval_ms = ms;
                } else {
                    invalid(Self::MAINTENANCE_INTERVAL_MS, &raw);
                }
            }
        }
        cfg
    }

    pub fn broker_config(&self) -> BrokerConfig {
        BrokerConfig {
            backlog_order: self.backlog_order,
            empty_session_policy: self.empty_session_policy,
            proposal_decision_timeout_ms: self.proposal_timeout_ms,
            responded_history_limit: self.responded_history_limit,
        }
    }
}

fn invalid(key: &str, raw: &str) {
    warn!(key, value = raw, "ignoring invalid config value; using default");
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_num<T: FromStr>(key: &str, raw: &str) -> Option<T> {
    let parsed = raw.parse::<T>().ok();
    if parsed.is_none() {
        invalid(key, raw);
    }
    parsed
}

fn parse_accounts(raw: &str) -> Vec<Account> {
    let mut out: Vec<Account> = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        match entry.parse::<Account>() {
            Ok(account) if !out.contains(&account) => out.push(account),
            Ok(_) => {}
            Err(e) => warn!(account = entry, error = %e, "skipping invalid account"),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> BrokerAdapterConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        BrokerAdapterConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn empty_environment_is_default() {
        let cfg = from_pairs(&[]);
        assert_eq!(cfg.broker_config(), BrokerConfig::default());
        assert!(cfg.store_path.is_none());
        assert!(!cfg.allow_eth_sign);
    }

    #[test]
    fn parses_all_keys() {
        let cfg = from_pairs(&[
            (BrokerAdapterConfig::STORE_PATH, "/tmp/wc.json"),
            (
                BrokerAdapterConfig::ACCOUNTS,
                "eip155:1:0x1000000000000000000000000000000000000001, eip155:137:0x1000000000000000000000000000000000000001",
            ),
            (BrokerAdapterConfig::ALLOW_ETH_SIGN, "true"),
            (BrokerAdapterConfig::BACKLOG_ORDER, "FIFO"),
            (BrokerAdapterConfig::EMPTY_SESSION_POLICY, "disconnect"),
            (BrokerAdapterConfig::PROPOSAL_TIMEOUT_MS, "60000"),
            (BrokerAdapterConfig::MAINTENANCE_INTERVAL_MS, "5000"),
        ]);
        assert_eq!(cfg.store_path, Some(PathBuf::from("/tmp/wc.json")));
        assert_eq!(cfg.accounts.len(), 2);
        assert!(cfg.allow_eth_sign);
        assert_eq!(cfg.backlog_order, BacklogOrder::Fifo);
        assert_eq!(cfg.empty_session_policy, EmptySessionPolicy::Disconnect);
        assert_eq!(cfg.proposal_timeout_ms, Some(60_000));
        assert_eq!(cfg.maintenance_interval_ms, 5_000);
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let cfg = from_pairs(&[
            (BrokerAdapterConfig::ACCOUNTS, "eip155:1:nope,eip155:1:0x1000000000000000000000000000000000000001"),
            (BrokerAdapterConfig::ALLOW_ETH_SIGN, "maybe"),
            (BrokerAdapterConfig::BACKLOG_ORDER, "random"),
            (BrokerAdapterConfig::PROPOSAL_TIMEOUT_MS, "soon"),
            (BrokerAdapterConfig::MAINTENANCE_INTERVAL_MS, "0"),
        ]);
        assert_eq!(cfg.accounts.len(), 1);
        assert!(!cfg.allow_eth_sign);
        assert_eq!(cfg.backlog_order, BacklogOrder::Lifo);
        assert_eq!(cfg.proposal_timeout_ms, None);
        assert_eq!(cfg.maintenance_interval_ms, 30_000);
    }
}

//! Single task that owns the broker. Every inbound line and every
//! maintenance tick is handled here, one at a time.

use std::time::Duration;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use rusty_wc_adapters::{
    BrokerAdapterConfig, Eip155ActionTranslator, FileSessionPersistence,
    InMemorySessionPersistence, KeystoreSigner, StaticActiveChains, SystemClockAdapter,
};
use rusty_wc_core::{Broker, BrokerCommand, BrokerNotification, NotificationPort, PortError};

use crate::bridge::{
    ChannelNotifier, ChannelProtocolClient, Inbound, Outbound, SessionBackend, WalletInput,
};

pub type BridgeBroker = Broker<
    ChannelProtocolClient,
    StaticActiveChains,
    Eip155ActionTranslator,
    KeystoreSigner,
    ChannelNotifier,
    SystemClockAdapter,
    SessionBackend,
>;

pub struct Runtime {
    broker: BridgeBroker,
    chains: StaticActiveChains,
    inbound: UnboundedReceiver<Inbound>,
    maintenance_interval: Duration,
}

impl Runtime {
    pub fn new(
        config: &BrokerAdapterConfig,
        inbound: UnboundedReceiver<Inbound>,
        outbound: UnboundedSender<Outbound>,
    ) -> eyre::Result<Self> {
        let backend = match &config.store_path {
            Some(path) => SessionBackend::File(FileSessionPersistence::new(path)),
            None => SessionBackend::Memory(InMemorySessionPersistence::default()),
        };
        let chains = StaticActiveChains::new(config.accounts.clone());
        let (broker, report) = Broker::new(
            ChannelProtocolClient::new(outbound.clone()),
            chains.clone(),
            Eip155ActionTranslator::new(config.allow_eth_sign),
            KeystoreSigner::from_accounts(&config.accounts),
            ChannelNotifier::new(outbound),
            SystemClockAdapter,
            backend,
            config.broker_config(),
        )?;
        info!(
            loaded = report.loaded,
            unparseable = report.unparseable,
            expired = report.expired,
            accounts = config.accounts.len(),
            "session store ready"
        );
        Ok(Self {
            broker,
            chains,
            inbound,
            maintenance_interval: Duration::from_millis(config.maintenance_interval_ms.max(1)),
        })
    }

    /// Runs until every inbound sender is dropped.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.maintenance_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                input = self.inbound.recv() => match input {
                    Some(input) => self.dispatch(input),
                    None => break,
                },
                _ = ticker.tick() => self.maintain(),
            }
        }
        info!(sessions = self.broker.sessions().len(), "inbound closed; broker stopped");
    }

    fn dispatch(&mut self, input: Inbound) {
        let (context, result) = match input {
            Inbound::Event(event) => (event.kind(), self.broker.handle_event(event)),
            Inbound::Command(command) => (command.kind(), self.broker.handle(command)),
            Inbound::Wallet(WalletInput::SetAccounts { accounts }) => {
                debug!(count = accounts.len(), "active accounts replaced");
                let result = self
                    .chains
                    .set_accounts(accounts)
                    .and_then(|()| self.broker.handle(BrokerCommand::ActiveAccountsChanged));
                ("set_accounts", result)
            }
        };
        if let Err(e) = result {
            self.surface(context, &e);
        }
    }

    fn maintain(&mut self) {
        for command in [
            BrokerCommand::ExpireStaleProposal,
            BrokerCommand::PruneExpiredSessions,
        ] {
            let context = command.kind();
            if let Err(e) = self.broker.handle(command) {
                self.surface(context, &e);
            }
        }
    }

    fn surface(&self, context: &str, error: &PortError) {
        warn!(context, error = %error, "broker input failed");
        self.broker
            .notifier
            .notify(BrokerNotification::error(context, error.to_string()));
    }
}

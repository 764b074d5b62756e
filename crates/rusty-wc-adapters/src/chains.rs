use std::sync::{Arc, RwLock};

use rusty_wc_core::{Account, ActiveChainsPort, PortError};

/// Wallet accounts as configured; the wallet side replaces them and then
/// sends `ActiveAccountsChanged`.
#[derive(Debug, Clone, Default)]
pub struct StaticActiveChains {
    accounts: Arc<RwLock<Vec<Account>>>,
}

impl StaticActiveChains {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self {
            accounts: Arc::new(RwLock::new(accounts)),
        }
    }

    pub fn set_accounts(&self, accounts: Vec<Account>) -> Result<(), PortError> {
        let mut g = self
            .accounts
            .write()
            .map_err(|e| PortError::Transport(format!("active chains lock poisoned: {e}")))?;
        *g = accounts;
        Ok(())
    }
}

impl ActiveChainsPort for StaticActiveChains {
    fn active_accounts(&self) -> Result<Vec<Account>, PortError> {
        let g = self
            .accounts
            .read()
            .map_err(|e| PortError::Transport(format!("active chains lock poisoned: {e}")))?;
        Ok(g.clone())
    }
}

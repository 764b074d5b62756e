use std::collections::BTreeSet;

use alloy::primitives::Address;
use tracing::info;

use rusty_wc_core::{Account, PortError, SessionProposal, SignerPort};

/// Authorizes an approval only when every granted account is held by the
/// local keystore.
#[derive(Debug, Clone, Default)]
pub struct KeystoreSigner {
    addresses: BTreeSet<Address>,
}

impl KeystoreSigner {
    pub fn new(addresses: impl IntoIterator<Item = Address>) -> Self {
        Self {
            addresses: addresses.into_iter().collect(),
        }
    }

    pub fn from_accounts(accounts: &[Account]) -> Self {
        Self::new(accounts.iter().map(Account::address))
    }

    pub fn holds(&self, address: Address) -> bool {
        self.addresses.contains(&address)
    }
}

impl SignerPort for KeystoreSigner {
    fn authorize_approval(
        &self,
        proposal: &SessionProposal,
        accounts: &[Account],
    ) -> Result<(), PortError> {
        if accounts.is_empty() {
            return Err(PortError::Policy("no accounts to approve".to_owned()));
        }
        if let Some(foreign) = accounts.iter().find(|a| !self.holds(a.address())) {
            info!(proposal_id = proposal.id, account = %foreign, "account not in keystore");
            return Err(PortError::Policy(format!(
                "account {foreign} is not held by this wallet"
            )));
        }
        Ok(())
    }
}

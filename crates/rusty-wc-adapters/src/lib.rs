pub mod chains;
pub mod clock;
pub mod config;
pub mod persistence;
pub mod protocol;
pub mod signer;
pub mod translator;

pub use chains::StaticActiveChains;
pub use clock::{ManualClock, SystemClockAdapter};
pub use config::BrokerAdapterConfig;
pub use persistence::{FileSessionPersistence, InMemorySessionPersistence};
pub use protocol::{RecordingNotifier, RecordingProtocolClient};
pub use signer::KeystoreSigner;
pub use translator::Eip155ActionTranslator;

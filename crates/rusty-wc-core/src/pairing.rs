use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PairingUriError {
    #[error("pairing uri must start with wc:")]
    MissingScheme,
    #[error("pairing uri has no topic")]
    MissingTopic,
    #[error("unsupported pairing protocol version: {0}")]
    UnsupportedVersion(String),
    #[error("pairing uri is missing parameter {0}")]
    MissingParam(&'static str),
    #[error("invalid symKey: expected 32 hex-encoded bytes")]
    InvalidSymKey,
    #[error("invalid expiryTimestamp: {0}")]
    InvalidExpiry(String),
}

/// `wc:{topic}@2?relay-protocol=irn&symKey={hex}[&expiryTimestamp={secs}]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingUri {
    pub topic: String,
    pub version: u32,
    pub relay_protocol: String,
    pub sym_key: String,
    pub expiry_timestamp: Option<u64>,
}

impl PairingUri {
    pub const SUPPORTED_VERSION: u32 = 2;

    pub fn parse(raw: &str) -> Result<Self, PairingUriError> {
        let rest = raw
            .trim()
            .strip_prefix("wc:")
            .ok_or(PairingUriError::MissingScheme)?;
        let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
        let (topic, version) = path.split_once('@').ok_or(PairingUriError::MissingTopic)?;
        if topic.is_empty() {
            return Err(PairingUriError::MissingTopic);
        }
        let version = version
            .parse::<u32>()
            .ok()
            .filter(|v| *v == Self::SUPPORTED_VERSION)
            .ok_or_else(|| PairingUriError::UnsupportedVersion(version.to_owned()))?;

        let mut relay_protocol = None;
        let mut sym_key = None;
        let mut expiry_timestamp = None;
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                "relay-protocol" => relay_protocol = Some(value.to_owned()),
                "symKey" => sym_key = Some(value.to_owned()),
                "expiryTimestamp" => {
                    expiry_timestamp = Some(
                        value
                            .parse::<u64>()
                            .map_err(|_| PairingUriError::InvalidExpiry(value.to_owned()))?,
                    )
                }
                _ => {}
            }
        }

        let relay_protocol = relay_protocol
            .filter(|p| !p.is_empty())
            .ok_or(PairingUriError::MissingParam("relay-protocol"))?;
        let sym_key = sym_key.ok_or(PairingUriError::MissingParam("symKey"))?;
        if sym_key.len() != 64 || !sym_key.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(PairingUriError::InvalidSymKey);
        }

        Ok(Self {
            topic: topic.to_owned(),
            version,
            relay_protocol,
            sym_key,
            expiry_timestamp,
        })
    }
}

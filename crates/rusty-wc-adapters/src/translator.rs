//! Maps EIP-155 session requests onto wallet actions.

use alloy::primitives::{hex, Address, Bytes};
use serde_json::Value;
use tracing::debug;

use rusty_wc_core::{
    parse_eip155_address, ActionTranslatorPort, PortError, RpcServer, Session, SessionRequest,
    SignatureMethod, WalletAction, WcMethod,
};

#[derive(Debug, Clone, Default)]
pub struct Eip155ActionTranslator {
    pub allow_eth_sign: bool,
}

impl Eip155ActionTranslator {
    pub fn new(allow_eth_sign: bool) -> Self {
        Self { allow_eth_sign }
    }
}

fn params(request: &SessionRequest) -> Result<&[Value], PortError> {
    request
        .params
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| PortError::Validation(format!("{} params must be an array", request.method)))
}

fn param<'a>(params: &'a [Value], idx: usize, method: &str) -> Result<&'a Value, PortError> {
    params
        .get(idx)
        .ok_or_else(|| PortError::Validation(format!("{method} is missing param {idx}")))
}

fn address_param(value: &Value, method: &str) -> Result<Address, PortError> {
    let raw = value
        .as_str()
        .ok_or_else(|| PortError::Validation(format!("{method} address must be a string")))?;
    parse_eip155_address(raw).map_err(|e| PortError::Validation(e.to_string()))
}

/// Hex payloads are decoded; anything else is signed as UTF-8 text.
fn message_bytes(value: &Value, method: &str) -> Result<Bytes, PortError> {
    let raw = value
        .as_str()
        .ok_or_else(|| PortError::Validation(format!("{method} message must be a string")))?;
    if let Some(stripped) = raw.strip_prefix("0x") {
        if let Ok(bytes) = hex::decode(stripped) {
            return Ok(Bytes::from(bytes));
        }
    }
    Ok(Bytes::copy_from_slice(raw.as_bytes()))
}

fn typed_data(value: &Value, method: &str) -> Result<Value, PortError> {
    match value {
        Value::String(raw) => serde_json::from_str(raw)
            .map_err(|e| PortError::Validation(format!("{method} typed data is not JSON: {e}"))),
        Value::Object(_) => Ok(value.clone()),
        _ => Err(PortError::Validation(format!(
            "{method} typed data must be an object"
        ))),
    }
}

fn parse_quantity(raw: &str) -> Option<u64> {
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

impl Eip155ActionTranslator {
    fn session_signer(
        &self,
        address: Address,
        server: RpcServer,
        session: &Session,
    ) -> Result<Address, PortError> {
        let chain = server.to_chain_id();
        if session.accounts_on(&chain).any(|a| a.address() == address) {
            Ok(address)
        } else {
            Err(PortError::Policy(format!(
                "{address} is not a session account on {chain}"
            )))
        }
    }

    fn transaction(
        &self,
        request: &SessionRequest,
        server: RpcServer,
        session: &Session,
    ) -> Result<(Address, Value), PortError> {
        let params = params(request)?;
        let tx = param(params, 0, &request.method)?;
        if !tx.is_object() {
            return Err(PortError::Validation(format!(
                "{} transaction must be an object",
                request.method
            )));
        }
        let from = tx
            .get("from")
            .ok_or_else(|| PortError::Validation(format!("{} is missing from", request.method)))?;
        let from = self.session_signer(address_param(from, &request.method)?, server, session)?;
        Ok((from, tx.clone()))
    }
}

impl ActionTranslatorPort for Eip155ActionTranslator {
    fn translate(
        &self,
        request: &SessionRequest,
        server: RpcServer,
        session: &Session,
    ) -> Result<WalletAction, PortError> {
        let method = WcMethod::from_method(&request.method).ok_or_else(|| {
            PortError::Validation(format!("unsupported method: {}", request.method))
        })?;
        debug!(request_id = request.id, method = method.as_str(), %server, "translating request");

        match method {
            WcMethod::PersonalSign => {
                let params = params(request)?;
                let first = param(params, 0, &request.method)?;
                let second = param(params, 1, &request.method)?;
                // Some dApps send [address, message]; accept both orders.
                let (message, address) = match (
                    address_param(second, &request.method),
                    address_param(first, &request.method),
                ) {
                    (Ok(address), _) => (first, address),
                    (Err(_), Ok(address)) => (second, address),
                    (Err(e), Err(_)) => return Err(e),
                };
                Ok(WalletAction::SignMessage {
                    method: SignatureMethod::PersonalSign,
                    signer: self.session_signer(address, server, session)?,
                    message: message_bytes(message, &request.method)?,
                })
            }
            WcMethod::EthSign => {
                if !self.allow_eth_sign {
                    return Err(PortError::Policy("eth_sign is disabled".to_owned()));
                }
                let params = params(request)?;
                let address = address_param(param(params, 0, &request.method)?, &request.method)?;
                Ok(WalletAction::SignMessage {
                    method: SignatureMethod::EthSign,
                    signer: self.session_signer(address, server, session)?,
                    message: message_bytes(param(params, 1, &request.method)?, &request.method)?,
                })
            }
            WcMethod::EthSignTypedData | WcMethod::EthSignTypedDataV4 => {
                let params = params(request)?;
                let address = address_param(param(params, 0, &request.method)?, &request.method)?;
                let method = if method == WcMethod::EthSignTypedData {
                    SignatureMethod::EthSignTypedData
                } else {
                    SignatureMethod::EthSignTypedDataV4
                };
                Ok(WalletAction::SignTypedData {
                    method,
                    signer: self.session_signer(address, server, session)?,
                    typed_data: typed_data(param(params, 1, &request.method)?, &request.method)?,
                })
            }
            WcMethod::EthSendTransaction => {
                let (from, transaction) = self.transaction(request, server, session)?;
                Ok(WalletAction::SendTransaction { from, transaction })
            }
            WcMethod::EthSignTransaction => {
                let (from, transaction) = self.transaction(request, server, session)?;
                Ok(WalletAction::SignTransaction { from, transaction })
            }
            WcMethod::WalletSwitchEthereumChain => {
                let params = params(request)?;
                let chain_id = param(params, 0, &request.method)?
                    .get("chainId")
                    .and_then(Value::as_str)
                    .and_then(parse_quantity)
                    .ok_or_else(|| {
                        PortError::Validation("wallet_switchEthereumChain needs a chainId".to_owned())
                    })?;
                let target = RpcServer::from_chain_id(chain_id);
                if !session.grants_chain(&target.to_chain_id()) {
                    return Err(PortError::Policy(format!(
                        "session does not include {target}"
                    )));
                }
                Ok(WalletAction::SwitchChain { server: target })
            }
        }
    }
}

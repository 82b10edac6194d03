//! JSON bodies of the HTTP surface.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

use crate::address::Address;
use crate::builder::UserInputs;
use crate::config::Network;
use crate::error::BuildError;
use crate::transactions::multiasset::{PolicyId, Value};
use crate::transactions::primitive::{TxInput, TxOutput, Utxo};

const LOVELACE_UNIT: &str = "lovelace";
const POLICY_ID_LEN: usize = 28;

/// A UTxO the way browser wallet libraries hand it out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireUtxo {
    pub input: WireInput,
    pub output: WireOutput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireInput {
    pub output_index: u32,
    pub tx_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireOutput {
    pub address: String,
    pub amount: Vec<Asset>,
}

// Quantities travel as decimal strings so they survive JavaScript number
// precision.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub unit: String,
    #[serde_as(as = "DisplayFromStr")]
    pub quantity: u64,
}

impl Asset {
    pub fn lovelace(quantity: u64) -> Self {
        Self {
            unit: LOVELACE_UNIT.to_string(),
            quantity,
        }
    }
}

impl WireUtxo {
    pub fn to_utxo(&self, network: Network) -> Result<Utxo, BuildError> {
        let tx_hash = decode_tx_hash(&self.input.tx_hash)?;
        let address = Address::parse(&self.output.address, network)
            .map_err(|e| BuildError::invalid_address(&self.output.address, e))?;

        let mut value = Value::default();
        for asset in &self.output.amount {
            let part = if asset.unit == LOVELACE_UNIT {
                Value::lovelace(asset.quantity)
            } else {
                let (policy, name) = split_unit(&asset.unit)?;
                Value::with_single_asset(0, policy, name, asset.quantity)
            };
            value = value
                .checked_add(&part)
                .ok_or_else(|| BuildError::InvalidUtxo(format!("value overflow in {}", asset.unit)))?;
        }

        Ok(Utxo {
            input: TxInput {
                tx_hash,
                index: self.input.output_index,
            },
            output: TxOutput::new(address, value),
        })
    }

    pub fn from_utxo(utxo: &Utxo) -> Self {
        let mut amount = vec![Asset::lovelace(utxo.output.value.coin)];
        amount.extend(utxo.output.value.assets.iter().map(|(policy, name, quantity)| Asset {
            unit: format!("{}{}", hex::encode(policy), hex::encode(name)),
            quantity,
        }));
        Self {
            input: WireInput {
                output_index: utxo.input.index,
                tx_hash: hex::encode(utxo.input.tx_hash),
            },
            output: WireOutput {
                address: utxo.output.address.to_string(),
                amount,
            },
        }
    }
}

fn decode_tx_hash(tx_hash: &str) -> Result<[u8; 32], BuildError> {
    let bytes = hex::decode(tx_hash)
        .map_err(|e| BuildError::InvalidUtxo(format!("tx hash {tx_hash}: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| BuildError::InvalidUtxo(format!("tx hash {tx_hash} is not 32 bytes")))
}

/// Splits `policyHex ++ assetNameHex` into its parts.
fn split_unit(unit: &str) -> Result<(PolicyId, Vec<u8>), BuildError> {
    let bytes = hex::decode(unit)
        .map_err(|e| BuildError::InvalidUtxo(format!("asset unit {unit}: {e}")))?;
    if bytes.len() < POLICY_ID_LEN {
        return Err(BuildError::InvalidUtxo(format!(
            "asset unit {unit} is shorter than a policy id"
        )));
    }
    let (policy_bytes, name) = bytes.split_at(POLICY_ID_LEN);
    let mut policy = [0u8; POLICY_ID_LEN];
    policy.copy_from_slice(policy_bytes);
    Ok((PolicyId::new(policy), name.to_vec()))
}

/// Body of `POST /transactions/build-<variantId>`. Every field is optional
/// at the JSON level so that absence is reported as a 400 naming the field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utxos: Option<Vec<WireUtxo>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lovelace_amount: Option<String>,
}

impl BuildRequest {
    /// Recipient and amount, or the name of the first one missing. Empty
    /// strings count as missing.
    pub fn user_inputs(&self) -> Result<UserInputs, BuildError> {
        let recipient_address = non_empty(&self.recipient_address, "recipientAddress")?;
        let lovelace_amount = non_empty(&self.lovelace_amount, "lovelaceAmount")?;
        Ok(UserInputs {
            recipient_address,
            lovelace_amount,
        })
    }
}

fn non_empty(field: &Option<String>, name: &'static str) -> Result<String, BuildError> {
    match field.as_deref() {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(BuildError::MissingField(name)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResponse {
    pub unsigned_tx: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    #[serde(default)]
    pub signed_tx: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub tx_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::tests::USER_ADDR;

    fn wire_json() -> serde_json::Value {
        serde_json::json!({
            "input": { "outputIndex": 2, "txHash": "ab".repeat(32) },
            "output": {
                "address": USER_ADDR,
                "amount": [
                    { "unit": "lovelace", "quantity": "7000000" },
                    { "unit": format!("{}{}", "05".repeat(28), hex::encode("gem")), "quantity": "3" }
                ],
                "dataHash": null,
                "plutusData": null
            }
        })
    }

    #[test]
    fn parses_wallet_utxo() {
        let wire: WireUtxo = serde_json::from_value(wire_json()).unwrap();
        let utxo = wire.to_utxo(Network::Preprod).unwrap();
        assert_eq!(utxo.input.index, 2);
        assert_eq!(utxo.input.tx_hash, [0xab; 32]);
        assert_eq!(utxo.output.value.coin, 7_000_000);
        assert_eq!(utxo.output.value.assets.get(&PolicyId::new([5; 28]), b"gem"), 3);
        assert_eq!(WireUtxo::from_utxo(&utxo), wire);
    }

    #[test]
    fn quantity_must_be_a_decimal_string() {
        let mut json = wire_json();
        json["output"]["amount"][0]["quantity"] = serde_json::json!("7e6");
        assert!(serde_json::from_value::<WireUtxo>(json).is_err());
    }

    #[test]
    fn rejects_short_hash_and_unit() {
        let mut wire: WireUtxo = serde_json::from_value(wire_json()).unwrap();
        wire.input.tx_hash = "abcd".to_string();
        assert!(matches!(
            wire.to_utxo(Network::Preprod),
            Err(BuildError::InvalidUtxo(_))
        ));

        let mut wire: WireUtxo = serde_json::from_value(wire_json()).unwrap();
        wire.output.amount[1].unit = "0505".to_string();
        assert!(matches!(
            wire.to_utxo(Network::Preprod),
            Err(BuildError::InvalidUtxo(_))
        ));
    }

    #[test]
    fn utxo_on_another_network() {
        let wire: WireUtxo = serde_json::from_value(wire_json()).unwrap();
        assert!(matches!(
            wire.to_utxo(Network::Mainnet),
            Err(BuildError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn build_request_reports_first_missing_input() {
        let req: BuildRequest =
            serde_json::from_str(r#"{"changeAddress":"x","lovelaceAmount":"5"}"#).unwrap();
        assert!(req.utxos.is_none());
        assert_eq!(req.user_inputs(), Err(BuildError::MissingField("recipientAddress")));

        let req: BuildRequest =
            serde_json::from_str(r#"{"recipientAddress":"addr","lovelaceAmount":""}"#).unwrap();
        assert_eq!(req.user_inputs(), Err(BuildError::MissingField("lovelaceAmount")));
    }

    #[test]
    fn camel_case_bodies() {
        let json = serde_json::to_value(BuildResponse {
            unsigned_tx: "84".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({ "unsignedTx": "84" }));
        let req: SubmitRequest = serde_json::from_str(r#"{"signedTx":"84a0"}"#).unwrap();
        assert_eq!(req.signed_tx.as_deref(), Some("84a0"));
    }
}

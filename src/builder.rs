use pallas_crypto::hash::Hash;
use tracing::{debug, info};

use crate::address::Address;
use crate::catalog::{self, BuildPolicy, FixedOutput, Recipient};
use crate::config::{Network, ProtocolParams};
use crate::error::BuildError;
use crate::mint::{self, MintAction};
use crate::model::BuildRequest;
use crate::selection::{self, Draft};
use crate::transactions::multiasset::Value;
use crate::transactions::primitive::{TxOutput, Utxo};
use crate::transactions::{Transaction, TxEffects};

/// Recipient and amount typed by the learner. Only consulted by variants
/// whose policy is a user-specified output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInputs {
    pub recipient_address: String,
    pub lovelace_amount: String,
}

/// A balanced transaction with no key witnesses yet, along with its
/// serialized form and id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub tx: Transaction,
    cbor: Vec<u8>,
    id: Hash<32>,
}

impl UnsignedTransaction {
    pub fn new(tx: Transaction) -> Result<Self, BuildError> {
        let cbor = tx.to_cbor()?;
        let id = tx.body.id()?;
        Ok(Self { tx, cbor, id })
    }

    pub fn cbor(&self) -> &[u8] {
        &self.cbor
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.cbor)
    }

    pub fn id_hex(&self) -> String {
        hex::encode(self.id)
    }

    pub fn effects(&self, own: &Address) -> TxEffects {
        self.tx.body.effects(own)
    }
}

/// Assembles unsigned transactions for catalog variants. Holds no per-request
/// state; one instance serves every request.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    network: Network,
    params: ProtocolParams,
}

impl TransactionBuilder {
    pub fn new(network: Network, params: ProtocolParams) -> Self {
        Self { network, params }
    }

    pub fn build(
        &self,
        variant_id: &str,
        utxos: &[Utxo],
        change_address: &str,
        user_inputs: Option<&UserInputs>,
    ) -> Result<UnsignedTransaction, BuildError> {
        let variant = catalog::resolve(variant_id)?;
        let change = self.parse_address(change_address)?;

        // Labels and description are never read here.
        let draft = match variant.build_policy {
            BuildPolicy::FixedOutputSet { outputs } => Draft {
                outputs: outputs
                    .iter()
                    .map(|fixed| self.fixed_output(fixed, &change))
                    .collect::<Result<_, _>>()?,
                mint: None,
                native_scripts: Vec::new(),
            },
            BuildPolicy::UserSpecifiedOutput => {
                let inputs = user_inputs.ok_or(BuildError::MissingField("recipientAddress"))?;
                Draft {
                    outputs: vec![self.user_output(inputs)?],
                    mint: None,
                    native_scripts: Vec::new(),
                }
            }
            BuildPolicy::MintAndDeliver {
                asset_name,
                delivery_lovelace,
            } => {
                let script = mint::single_signature_script(&change)?;
                let action = MintAction::new(script.clone(), asset_name, 1)?;
                debug!(unit = %action.unit(), "minting under single-signature policy");
                let delivery = Value::with_single_asset(
                    delivery_lovelace,
                    action.policy_id(),
                    action.asset_name.clone(),
                    1,
                );
                Draft {
                    outputs: vec![TxOutput::new(change.clone(), delivery)],
                    mint: Some(action.to_mint()),
                    native_scripts: vec![script],
                }
            }
        };

        for output in &draft.outputs {
            output.check_min_coin(&self.params)?;
        }

        let unsigned = UnsignedTransaction::new(selection::balance(
            draft,
            utxos,
            &change,
            &self.params,
        )?)?;
        info!(
            variant = variant.id,
            tx_id = %unsigned.id_hex(),
            inputs = unsigned.tx.body.inputs.len(),
            outputs = unsigned.tx.body.outputs.len(),
            fee = unsigned.tx.body.fee,
            "built unsigned transaction"
        );
        Ok(unsigned)
    }

    /// Checks a wire request for its fields, converts its UTxOs and builds.
    /// Field checks run before anything else so that a malformed request
    /// never reaches the ledger side.
    pub fn build_request(
        &self,
        variant_id: &str,
        request: &BuildRequest,
    ) -> Result<UnsignedTransaction, BuildError> {
        let variant = catalog::resolve(variant_id)?;
        let wire_utxos = request
            .utxos
            .as_ref()
            .ok_or(BuildError::MissingField("utxos"))?;
        let change_address = match request.change_address.as_deref() {
            Some(address) if !address.is_empty() => address,
            _ => return Err(BuildError::MissingField("changeAddress")),
        };
        let user_inputs = if variant.requires_user_inputs {
            Some(request.user_inputs()?)
        } else {
            None
        };

        let utxos = wire_utxos
            .iter()
            .map(|wire| wire.to_utxo(self.network))
            .collect::<Result<Vec<_>, _>>()?;
        self.build(variant.id, &utxos, change_address, user_inputs.as_ref())
    }

    fn parse_address(&self, address: &str) -> Result<Address, BuildError> {
        Address::parse(address, self.network).map_err(|e| BuildError::invalid_address(address, e))
    }

    fn fixed_output(&self, fixed: &FixedOutput, change: &Address) -> Result<TxOutput, BuildError> {
        let address = match fixed.recipient {
            Recipient::ChangeAddress => change.clone(),
            Recipient::Literal(literal) => self.parse_address(literal)?,
        };
        Ok(TxOutput::new(address, Value::lovelace(fixed.lovelace)))
    }

    fn user_output(&self, inputs: &UserInputs) -> Result<TxOutput, BuildError> {
        if inputs.recipient_address.is_empty() {
            return Err(BuildError::MissingField("recipientAddress"));
        }
        if inputs.lovelace_amount.is_empty() {
            return Err(BuildError::MissingField("lovelaceAmount"));
        }
        let recipient = self.parse_address(&inputs.recipient_address)?;
        let lovelace = parse_lovelace(&inputs.lovelace_amount)?;
        Ok(TxOutput::new(recipient, Value::lovelace(lovelace)))
    }
}

fn parse_lovelace(amount: &str) -> Result<u64, BuildError> {
    match amount.trim().parse::<u64>() {
        Ok(0) | Err(_) => Err(BuildError::InvalidAmount(amount.to_string())),
        Ok(lovelace) => Ok(lovelace),
    }
}

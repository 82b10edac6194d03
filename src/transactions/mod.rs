use pallas_codec::minicbor::{self, Encode};
use pallas_crypto::hash::{Hash, Hasher};
use pallas_primitives::conway::{self, NativeScript, VKeyWitness};
use pallas_primitives::{NonEmptySet, Nullable, Set};

use crate::address::Address;
use crate::error::BuildError;

use self::multiasset::{mint_to_ledger, Mint, MultiAsset};
use self::primitive::{TxInput, TxOutput};

pub mod multiasset;
pub mod primitive;

pub const VKEY_LEN: usize = 32;
pub const SIGNATURE_LEN: usize = 64;

/// CBOR bytes of a ledger value.
pub(crate) fn to_cbor<T: Encode<()>>(value: &T) -> Result<Vec<u8>, BuildError> {
    minicbor::to_vec(value).map_err(|e| BuildError::BuildFailed(format!("ledger encoding: {e}")))
}

// Transactions are built as a body plus witnesses. The body is what the
// signer commits to (its hash is the transaction id); the witness set of an
// unsigned transaction carries only the scripts the ledger needs to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxBody {
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub fee: u64,
    pub mint: Option<Mint>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WitnessSet {
    pub vkey_witnesses: Vec<VKeyWitness>,
    pub native_scripts: Vec<NativeScript>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub body: TxBody,
    pub witnesses: WitnessSet,
}

/// What a transaction does from the point of view of one wallet address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxEffects {
    /// Outputs paying anyone other than the wallet address.
    pub external_outputs: Vec<TxOutput>,
    /// Lovelace leaving the wallet through external outputs.
    pub external_lovelace: u64,
    /// Lovelace returned to the wallet address, change included.
    pub own_lovelace: u64,
    pub fee: u64,
    pub minted: MultiAsset,
}

impl TxBody {
    /// Conway body with inputs in canonical order.
    pub(crate) fn to_ledger(&self) -> conway::TransactionBody {
        let mut inputs = self.inputs.clone();
        inputs.sort();

        conway::TransactionBody {
            inputs: Set::from(inputs.into_iter().map(TxInput::to_ledger).collect::<Vec<_>>()),
            outputs: self.outputs.iter().map(TxOutput::to_ledger).collect(),
            fee: self.fee,
            ttl: None,
            certificates: None,
            withdrawals: None,
            auxiliary_data_hash: None,
            validity_interval_start: None,
            mint: self.mint.as_ref().and_then(mint_to_ledger),
            script_data_hash: None,
            collateral: None,
            required_signers: None,
            network_id: None,
            collateral_return: None,
            total_collateral: None,
            reference_inputs: None,
            voting_procedures: None,
            proposal_procedures: None,
            treasury_value: None,
            donation: None,
        }
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>, BuildError> {
        to_cbor(&self.to_ledger())
    }

    /// Transaction id: blake2b-256 over the serialized body.
    pub fn id(&self) -> Result<Hash<32>, BuildError> {
        Ok(Hasher::<256>::hash(&self.to_cbor()?))
    }

    pub fn effects(&self, own: &Address) -> TxEffects {
        let mut effects = TxEffects {
            fee: self.fee,
            minted: self
                .mint
                .as_ref()
                .map(multiasset::minted_assets)
                .unwrap_or_default(),
            ..TxEffects::default()
        };
        for output in &self.outputs {
            if output.address == *own {
                effects.own_lovelace = effects.own_lovelace.saturating_add(output.value.coin);
            } else {
                effects.external_lovelace =
                    effects.external_lovelace.saturating_add(output.value.coin);
                effects.external_outputs.push(output.clone());
            }
        }
        effects
    }
}

impl WitnessSet {
    pub(crate) fn to_ledger(&self) -> conway::WitnessSet {
        conway::WitnessSet {
            vkeywitness: NonEmptySet::from_vec(self.vkey_witnesses.clone()),
            native_script: NonEmptySet::from_vec(self.native_scripts.clone()),
            bootstrap_witness: None,
            plutus_v1_script: None,
            plutus_data: None,
            redeemer: None,
            plutus_v2_script: None,
            plutus_v3_script: None,
        }
    }
}

impl Transaction {
    pub(crate) fn to_ledger(&self) -> conway::Tx {
        conway::Tx {
            transaction_body: self.body.to_ledger(),
            transaction_witness_set: self.witnesses.to_ledger(),
            success: true,
            auxiliary_data: Nullable::Null,
        }
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>, BuildError> {
        to_cbor(&self.to_ledger())
    }

    /// Serialized size once `signers` key witnesses have been attached.
    /// Placeholder witnesses have the same length as real ones.
    pub fn size_with_signers(&self, signers: usize) -> Result<usize, BuildError> {
        let placeholder = VKeyWitness {
            vkey: vec![0u8; VKEY_LEN].into(),
            signature: vec![0u8; SIGNATURE_LEN].into(),
        };
        let mut sized = self.clone();
        sized
            .witnesses
            .vkey_witnesses
            .extend(std::iter::repeat(placeholder).take(signers));
        Ok(sized.to_cbor()?.len())
    }
}

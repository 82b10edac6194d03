use pallas_primitives::conway::{
    LegacyTransactionOutput, PseudoTransactionOutput, TransactionInput, TransactionOutput,
};

use crate::address::Address;
use crate::config::ProtocolParams;
use crate::error::BuildError;

use super::multiasset::Value;
use super::to_cbor;

// Fixed per-entry overhead the ledger adds to an output's serialized size
// when computing its minimum lovelace.
const UTXO_ENTRY_OVERHEAD: u64 = 160;

/// Reference to an output of a previous transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxInput {
    pub tx_hash: [u8; 32],
    pub index: u32,
}

impl TxInput {
    pub(crate) fn to_ledger(self) -> TransactionInput {
        TransactionInput {
            transaction_id: self.tx_hash.into(),
            index: u64::from(self.index),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    pub address: Address,
    pub value: Value,
}

impl TxOutput {
    pub fn new(address: Address, value: Value) -> Self {
        Self { address, value }
    }

    /// Shelley-style `[address, value]` output; no datum, no script ref.
    pub(crate) fn to_ledger(&self) -> TransactionOutput {
        PseudoTransactionOutput::Legacy(LegacyTransactionOutput {
            address: self.address.to_vec().into(),
            amount: self.value.to_ledger(),
            datum_hash: None,
        })
    }

    pub fn encoded_len(&self) -> Result<u64, BuildError> {
        Ok(to_cbor(&self.to_ledger())?.len() as u64)
    }

    /// Smallest lovelace amount the ledger accepts for this output.
    pub fn min_coin(&self, params: &ProtocolParams) -> Result<u64, BuildError> {
        let size = UTXO_ENTRY_OVERHEAD + self.encoded_len()?;
        params
            .coins_per_utxo_byte
            .checked_mul(size)
            .ok_or_else(|| BuildError::BuildFailed("minimum output value overflow".to_string()))
    }

    pub fn check_min_coin(&self, params: &ProtocolParams) -> Result<(), BuildError> {
        let minimum = self.min_coin(params)?;
        if self.value.coin < minimum {
            return Err(BuildError::BuildFailed(format!(
                "output to {} carries {} lovelace, below the minimum of {minimum}",
                self.address, self.value.coin
            )));
        }
        Ok(())
    }
}

/// An unspent output the caller's wallet controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    pub input: TxInput,
    pub output: TxOutput,
}

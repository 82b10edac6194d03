use std::fmt;

use bech32::{FromBase32, Variant};
use pallas_addresses::{Address as LedgerAddress, ShelleyAddress, ShelleyPaymentPart};
use pallas_crypto::hash::Hash;
use thiserror::Error;

use crate::config::Network;

/// Blake2b-224 hash of a verification key.
pub type KeyHash = Hash<28>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("bech32: {0}")]
    Bech32(#[from] bech32::Error),
    #[error("bech32m checksum, expected plain bech32")]
    WrongVariant,
    #[error("expected prefix `{expected}`, found `{found}`")]
    WrongPrefix { expected: &'static str, found: String },
    #[error("{0}")]
    Payload(String),
    #[error("not a payment address")]
    NotPayment,
    #[error("address payload has {0} trailing bytes")]
    TrailingBytes(usize),
    #[error("address belongs to network {found}, expected {expected}")]
    WrongNetwork { expected: u8, found: u8 },
}

/// A shelley-era payment address. Keeps the original bech32 text for display
/// next to the decoded ledger address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    bech32: String,
    inner: ShelleyAddress,
}

impl Address {
    pub fn parse(s: &str, network: Network) -> Result<Self, AddressError> {
        let (hrp, data, variant) = bech32::decode(s)?;
        if variant != Variant::Bech32 {
            return Err(AddressError::WrongVariant);
        }
        if hrp != network.address_hrp() {
            return Err(AddressError::WrongPrefix {
                expected: network.address_hrp(),
                found: hrp,
            });
        }

        let bytes = Vec::<u8>::from_base32(&data)?;
        let inner = match LedgerAddress::from_bytes(&bytes)
            .map_err(|e| AddressError::Payload(e.to_string()))?
        {
            LedgerAddress::Shelley(shelley) => shelley,
            _ => return Err(AddressError::NotPayment),
        };
        // the ledger parser accepts and drops bytes past the last credential
        let encoded = inner.to_vec().len();
        if encoded != bytes.len() {
            return Err(AddressError::TrailingBytes(bytes.len() - encoded));
        }

        let found = inner.network().value();
        if found != network.network_id() {
            return Err(AddressError::WrongNetwork {
                expected: network.network_id(),
                found,
            });
        }

        Ok(Self {
            bech32: s.to_ascii_lowercase(),
            inner,
        })
    }

    /// Raw address bytes as they appear in a transaction output.
    pub fn to_vec(&self) -> Vec<u8> {
        self.inner.to_vec()
    }

    pub fn as_str(&self) -> &str {
        &self.bech32
    }

    /// Verification key hash of the payment credential, `None` when the
    /// payment part is a script.
    pub fn payment_key_hash(&self) -> Option<KeyHash> {
        match self.inner.payment() {
            ShelleyPaymentPart::Key(hash) => Some(*hash),
            ShelleyPaymentPart::Script(_) => None,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.bech32)
    }
}

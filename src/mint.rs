use std::collections::BTreeMap;

use pallas_crypto::hash::Hasher;
use pallas_primitives::conway::NativeScript;

use crate::address::{Address, KeyHash};
use crate::error::BuildError;
use crate::transactions::multiasset::{AssetName, Mint, PolicyId, MAX_ASSET_NAME_LEN};

// Tag prepended to a native script's CBOR before hashing it into a policy id.
const NATIVE_SCRIPT_TAG: u8 = 0;

/// Forging script that requires a signature from the payment key of
/// `address`.
pub fn single_signature_script(address: &Address) -> Result<NativeScript, BuildError> {
    address
        .payment_key_hash()
        .map(NativeScript::ScriptPubkey)
        .ok_or_else(|| {
            BuildError::BuildFailed(format!(
                "address {address} has no payment key to sign a minting policy"
            ))
        })
}

pub fn policy_id(script: &NativeScript) -> PolicyId {
    Hasher::<224>::hash_tagged_cbor(script, NATIVE_SCRIPT_TAG)
}

/// Keys named anywhere in `script`. Time locks name none.
pub fn script_signers(script: &NativeScript) -> Vec<KeyHash> {
    match script {
        NativeScript::ScriptPubkey(key_hash) => vec![*key_hash],
        NativeScript::ScriptAll(scripts)
        | NativeScript::ScriptAny(scripts)
        | NativeScript::ScriptNOfK(_, scripts) => scripts.iter().flat_map(script_signers).collect(),
        NativeScript::InvalidBefore(_) | NativeScript::InvalidHereafter(_) => Vec::new(),
    }
}

/// A mint action: `quantity` units of `asset_name` under `script`'s policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintAction {
    pub script: NativeScript,
    pub asset_name: AssetName,
    pub quantity: i64,
}

impl MintAction {
    pub fn new(script: NativeScript, asset_name: &str, quantity: i64) -> Result<Self, BuildError> {
        if asset_name.len() > MAX_ASSET_NAME_LEN {
            return Err(BuildError::BuildFailed(format!(
                "asset name `{asset_name}` exceeds {MAX_ASSET_NAME_LEN} bytes"
            )));
        }
        if quantity == 0 {
            return Err(BuildError::BuildFailed(format!(
                "mint of `{asset_name}` has zero quantity"
            )));
        }
        Ok(Self {
            script,
            asset_name: asset_name.as_bytes().to_vec(),
            quantity,
        })
    }

    pub fn policy_id(&self) -> PolicyId {
        policy_id(&self.script)
    }

    /// Asset unit as the wallet APIs print it: policy id hex followed by the
    /// asset name hex.
    pub fn unit(&self) -> String {
        format!(
            "{}{}",
            hex::encode(self.policy_id()),
            hex::encode(&self.asset_name)
        )
    }

    pub fn to_mint(&self) -> Mint {
        Mint::from([(
            self.policy_id(),
            BTreeMap::from([(self.asset_name.clone(), self.quantity)]),
        )])
    }
}

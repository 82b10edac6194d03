use std::collections::BTreeMap;

use pallas_primitives::{alonzo, conway, Bytes, KeyValuePairs, NonEmptyKeyValuePairs, NonZeroInt};

pub use pallas_primitives::PolicyId;

pub const MAX_ASSET_NAME_LEN: usize = 32;

pub type AssetName = Vec<u8>;

/// Native assets grouped by minting policy. Zero quantities are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiAsset(BTreeMap<PolicyId, BTreeMap<AssetName, u64>>);

/// Mint field of a transaction body; negative quantities burn.
pub type Mint = BTreeMap<PolicyId, BTreeMap<AssetName, i64>>;

impl MultiAsset {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bag holding `quantity` units of a single asset.
    pub fn single(policy: PolicyId, name: AssetName, quantity: u64) -> Self {
        if quantity == 0 {
            return Self::new();
        }
        Self(BTreeMap::from([(policy, BTreeMap::from([(name, quantity)]))]))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, policy: &PolicyId, name: &[u8]) -> u64 {
        self.0
            .get(policy)
            .and_then(|assets| assets.get(name))
            .copied()
            .unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PolicyId, &AssetName, u64)> {
        self.0
            .iter()
            .flat_map(|(policy, assets)| assets.iter().map(move |(name, qty)| (policy, name, *qty)))
    }

    /// Adds `quantity` units, `None` on overflow.
    fn checked_insert(&mut self, policy: PolicyId, name: AssetName, quantity: u64) -> Option<()> {
        if quantity == 0 {
            return Some(());
        }
        let entry = self.0.entry(policy).or_default().entry(name).or_insert(0);
        *entry = entry.checked_add(quantity)?;
        Some(())
    }

    pub fn checked_add(&self, other: &MultiAsset) -> Option<MultiAsset> {
        let mut out = self.clone();
        for (policy, name, qty) in other.iter() {
            out.checked_insert(*policy, name.clone(), qty)?;
        }
        Some(out)
    }

    /// Subtracts `other`, failing if any asset would go negative.
    pub fn checked_sub(&self, other: &MultiAsset) -> Option<MultiAsset> {
        let mut out = self.clone();
        for (policy, name, qty) in other.iter() {
            let assets = out.0.get_mut(policy)?;
            let held = assets.get_mut(name)?;
            *held = held.checked_sub(qty)?;
            if *held == 0 {
                assets.remove(name);
            }
            if assets.is_empty() {
                out.0.remove(policy);
            }
        }
        Some(out)
    }

    fn to_ledger(&self) -> alonzo::Multiasset<u64> {
        self.0
            .iter()
            .map(|(policy, assets)| {
                let assets: KeyValuePairs<Bytes, u64> = assets
                    .iter()
                    .map(|(name, qty)| (Bytes::from(name.clone()), *qty))
                    .collect();
                (*policy, assets)
            })
            .collect()
    }
}

/// Lovelace plus native assets carried by one output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Value {
    pub coin: u64,
    pub assets: MultiAsset,
}

impl Value {
    pub fn lovelace(coin: u64) -> Self {
        Self {
            coin,
            assets: MultiAsset::new(),
        }
    }

    pub fn with_single_asset(coin: u64, policy: PolicyId, name: AssetName, quantity: u64) -> Self {
        Self {
            coin,
            assets: MultiAsset::single(policy, name, quantity),
        }
    }

    pub fn checked_add(&self, other: &Value) -> Option<Value> {
        Some(Value {
            coin: self.coin.checked_add(other.coin)?,
            assets: self.assets.checked_add(&other.assets)?,
        })
    }

    pub fn checked_sub(&self, other: &Value) -> Option<Value> {
        Some(Value {
            coin: self.coin.checked_sub(other.coin)?,
            assets: self.assets.checked_sub(&other.assets)?,
        })
    }

    pub(crate) fn to_ledger(&self) -> alonzo::Value {
        if self.assets.is_empty() {
            alonzo::Value::Coin(self.coin)
        } else {
            alonzo::Value::Multiasset(self.coin, self.assets.to_ledger())
        }
    }
}

/// Ledger form of a mint field. Zero quantities are dropped; `None` when
/// nothing is left.
pub(crate) fn mint_to_ledger(mint: &Mint) -> Option<conway::Mint> {
    let policies = mint
        .iter()
        .filter_map(|(policy, assets)| {
            let assets = assets
                .iter()
                .filter_map(|(name, qty)| {
                    NonZeroInt::try_from(*qty)
                        .ok()
                        .map(|qty| (Bytes::from(name.clone()), qty))
                })
                .collect();
            NonEmptyKeyValuePairs::from_vec(assets).map(|assets| (*policy, assets))
        })
        .collect();
    NonEmptyKeyValuePairs::from_vec(policies)
}

/// Positive part of a mint field, i.e. what it adds to the transaction's
/// available value.
pub(crate) fn minted_assets(mint: &Mint) -> MultiAsset {
    MultiAsset(
        mint.iter()
            .filter_map(|(policy, assets)| {
                let minted: BTreeMap<AssetName, u64> = assets
                    .iter()
                    .filter(|(_, qty)| **qty > 0)
                    .map(|(name, qty)| (name.clone(), qty.unsigned_abs()))
                    .collect();
                (!minted.is_empty()).then_some((*policy, minted))
            })
            .collect(),
    )
}

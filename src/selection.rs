//! Covering input selection and fee balancing.
//!
//! Inputs are taken largest-first until they pay for the requested outputs,
//! the fee and a change output that satisfies the ledger minimum. The fee is
//! recomputed from the serialized size after every change to the input set
//! until it stops growing.

use std::collections::{BTreeSet, HashSet};

use tracing::debug;

use pallas_primitives::conway::NativeScript;

use crate::address::{Address, KeyHash};
use crate::config::ProtocolParams;
use crate::error::BuildError;
use crate::mint::script_signers;
use crate::transactions::multiasset::{minted_assets, Mint, Value};
use crate::transactions::primitive::{TxOutput, Utxo};
use crate::transactions::{Transaction, TxBody, WitnessSet};

const MAX_FEE_ROUNDS: usize = 16;

/// Everything the balancer needs besides the wallet's UTxOs.
#[derive(Debug, Clone)]
pub struct Draft {
    pub outputs: Vec<TxOutput>,
    pub mint: Option<Mint>,
    pub native_scripts: Vec<NativeScript>,
}

pub fn balance(
    draft: Draft,
    utxos: &[Utxo],
    change_address: &Address,
    params: &ProtocolParams,
) -> Result<Transaction, BuildError> {
    let required = draft
        .outputs
        .iter()
        .try_fold(Value::default(), |acc, out| acc.checked_add(&out.value))
        .ok_or_else(|| BuildError::BuildFailed("output value overflow".to_string()))?;
    let minted = Value {
        coin: 0,
        assets: draft.mint.as_ref().map(minted_assets).unwrap_or_default(),
    };

    let mut candidates = dedup(utxos);
    let available_total = candidates
        .iter()
        .try_fold(0u64, |acc, u| acc.checked_add(u.output.value.coin))
        .ok_or_else(|| BuildError::InvalidUtxo("wallet lovelace total overflows".to_string()))?;
    // ascending, so the largest candidate sits at the back
    candidates.sort_by(|a, b| a.output.value.coin.cmp(&b.output.value.coin));

    let mut selected: Vec<Utxo> = Vec::new();
    let mut selected_value = minted;

    // Native assets the outputs need beyond what the transaction mints.
    for (policy, name, qty) in required.assets.iter() {
        while selected_value.assets.get(policy, name) < qty {
            let pos = candidates
                .iter()
                .rposition(|u| u.output.value.assets.get(policy, name) > 0)
                .ok_or_else(|| {
                    BuildError::BuildFailed(format!(
                        "inputs do not hold enough of asset {}{}",
                        hex::encode(policy),
                        hex::encode(name)
                    ))
                })?;
            take(&mut candidates, pos, &mut selected, &mut selected_value)?;
        }
    }

    let mut fee = 0u64;
    let mut fee_rounds = 0;
    loop {
        let target = required
            .coin
            .checked_add(fee)
            .ok_or_else(|| BuildError::BuildFailed("fee overflow".to_string()))?;
        while selected_value.coin < target {
            let pos = candidates.len().checked_sub(1).ok_or(BuildError::InsufficientFunds {
                required: target,
                available: available_total,
            })?;
            take(&mut candidates, pos, &mut selected, &mut selected_value)?;
        }

        let leftover = selected_value
            .checked_sub(&required)
            .and_then(|v| v.checked_sub(&Value::lovelace(fee)))
            .ok_or_else(|| BuildError::BuildFailed("unbalanced selection".to_string()))?;

        let mut outputs = draft.outputs.clone();
        let mut paid_fee = fee;
        if leftover != Value::default() {
            let change = TxOutput::new(change_address.clone(), leftover);
            let min_change = change.min_coin(params)?;
            if change.value.coin < min_change {
                if let Some(pos) = candidates.len().checked_sub(1) {
                    take(&mut candidates, pos, &mut selected, &mut selected_value)?;
                    continue;
                }
                if !change.value.assets.is_empty() {
                    let required = target.checked_add(min_change).ok_or_else(|| {
                        BuildError::BuildFailed("change requirement overflow".to_string())
                    })?;
                    return Err(BuildError::InsufficientFunds {
                        required,
                        available: available_total,
                    });
                }
                // dust change: leave it to the fee
                paid_fee = paid_fee
                    .checked_add(change.value.coin)
                    .ok_or_else(|| BuildError::BuildFailed("fee overflow".to_string()))?;
            } else {
                outputs.push(change);
            }
        }

        let tx = Transaction {
            body: TxBody {
                inputs: selected.iter().map(|u| u.input).collect(),
                outputs,
                fee: paid_fee,
                mint: draft.mint.clone(),
            },
            witnesses: WitnessSet {
                vkey_witnesses: Vec::new(),
                native_scripts: draft.native_scripts.clone(),
            },
        };

        let size = tx.size_with_signers(required_signers(&selected, &draft.native_scripts))?;
        if size > params.max_tx_size {
            return Err(BuildError::BuildFailed(format!(
                "transaction size {size} exceeds maximum {}",
                params.max_tx_size
            )));
        }

        let min_fee = params
            .min_fee_a
            .checked_mul(size as u64)
            .and_then(|fee| fee.checked_add(params.min_fee_b))
            .ok_or_else(|| BuildError::BuildFailed("fee overflow".to_string()))?;
        debug!(inputs = selected.len(), size, fee, min_fee, "balancing round");
        if min_fee <= paid_fee {
            return Ok(tx);
        }
        fee = min_fee;
        fee_rounds += 1;
        if fee_rounds >= MAX_FEE_ROUNDS {
            return Err(BuildError::BuildFailed(
                "fee calculation did not converge".to_string(),
            ));
        }
    }
}

fn take(
    candidates: &mut Vec<Utxo>,
    pos: usize,
    selected: &mut Vec<Utxo>,
    selected_value: &mut Value,
) -> Result<(), BuildError> {
    let utxo = candidates.remove(pos);
    *selected_value = selected_value
        .checked_add(&utxo.output.value)
        .ok_or_else(|| BuildError::BuildFailed("input value overflow".to_string()))?;
    selected.push(utxo);
    Ok(())
}

fn dedup(utxos: &[Utxo]) -> Vec<Utxo> {
    let mut seen = HashSet::new();
    utxos
        .iter()
        .filter(|u| seen.insert(u.input))
        .cloned()
        .collect()
}

/// Number of distinct keys that must sign: one per payment key among the
/// spent inputs, plus every key a native script demands.
fn required_signers(inputs: &[Utxo], scripts: &[NativeScript]) -> usize {
    let mut keys: BTreeSet<KeyHash> = inputs
        .iter()
        .filter_map(|u| u.output.address.payment_key_hash())
        .collect();
    keys.extend(scripts.iter().flat_map(script_signers));
    keys.len()
}

use std::sync::Arc;

use pallas_codec::minicbor::Decoder;
use tracing::{info, warn};

use crate::error::SubmitError;
use crate::provider::LedgerProvider;

/// Relays signed transactions to the ledger provider. Stateless between
/// calls: nothing is remembered about what was built or submitted before.
#[derive(Clone)]
pub struct SubmissionGateway {
    provider: Arc<dyn LedgerProvider>,
}

impl SubmissionGateway {
    pub fn new(provider: Arc<dyn LedgerProvider>) -> Self {
        Self { provider }
    }

    /// Submits `signed_tx` (hex CBOR) once and returns the ledger's hash.
    /// Rejections come back as they are; resubmitting is up to the caller.
    pub async fn submit(&self, signed_tx: &str) -> Result<String, SubmitError> {
        let signed_tx = signed_tx.trim();
        if signed_tx.is_empty() {
            return Err(SubmitError::MissingSignedTx);
        }
        let tx_cbor =
            hex::decode(signed_tx).map_err(|e| SubmitError::MalformedSignedTx(e.to_string()))?;
        // every serialized transaction is a CBOR array
        Decoder::new(&tx_cbor).array().map_err(|e| {
            SubmitError::MalformedSignedTx(format!("not a serialized transaction: {e}"))
        })?;

        match self.provider.submit_tx(&tx_cbor).await {
            Ok(tx_hash) => {
                info!(%tx_hash, bytes = tx_cbor.len(), "transaction submitted");
                Ok(tx_hash)
            }
            Err(e) => {
                warn!(error = %e, "transaction submission failed");
                Err(e)
            }
        }
    }
}

//! Ledger submission provider.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use tracing::{debug, warn};

use crate::config::{Network, ProviderConfig};
use crate::error::SubmitError;

const API_KEY_HEADER: &str = "api-key";

/// Relays serialized, signed transactions to the ledger.
#[async_trait]
pub trait LedgerProvider: Send + Sync {
    /// Hands `tx_cbor` to the ledger and returns the hash it was accepted
    /// under. Called exactly once per submission; implementations must not
    /// retry.
    async fn submit_tx(&self, tx_cbor: &[u8]) -> Result<String, SubmitError>;
}

/// Maestro's transaction manager endpoint.
pub struct MaestroProvider {
    client: reqwest::Client,
    submit_url: String,
    api_key: String,
}

impl MaestroProvider {
    pub fn new(network: Network, config: &ProviderConfig, api_key: String) -> reqwest::Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| network.maestro_base_url());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            submit_url: format!("{}/txmanager", base_url.trim_end_matches('/')),
            api_key,
        })
    }
}

#[async_trait]
impl LedgerProvider for MaestroProvider {
    async fn submit_tx(&self, tx_cbor: &[u8]) -> Result<String, SubmitError> {
        debug!(url = %self.submit_url, bytes = tx_cbor.len(), "posting transaction");
        let response = self
            .client
            .post(&self.submit_url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/cbor"))
            .header(API_KEY_HEADER, &self.api_key)
            .body(tx_cbor.to_vec())
            .send()
            .await
            .map_err(|e| SubmitError::NetworkFailure(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SubmitError::NetworkFailure(e.to_string()))?;

        if !status.is_success() {
            warn!(%status, "provider rejected transaction");
            return Err(SubmitError::SubmissionRejected(body));
        }

        // The hash comes back as plain text, sometimes JSON-quoted.
        Ok(body.trim().trim_matches('"').to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::net::{SocketAddr, TcpListener};
    use std::sync::{Arc, Mutex};

    use axum::body::Bytes;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::Router;

    use super::*;

    #[derive(Default)]
    struct Seen {
        calls: usize,
        content_type: Option<String>,
        api_key: Option<String>,
        body: Vec<u8>,
    }

    /// Serves a stand-in tx manager answering every post with `status`/`reply`.
    async fn fake_maestro(status: StatusCode, reply: String) -> (SocketAddr, Arc<Mutex<Seen>>) {
        let seen = Arc::new(Mutex::new(Seen::default()));
        let app = Router::new()
            .route(
                "/v1/txmanager",
                post(
                    move |State(seen): State<Arc<Mutex<Seen>>>, headers: HeaderMap, body: Bytes| {
                        let reply = reply.clone();
                        async move {
                            let mut seen = seen.lock().unwrap();
                            seen.calls += 1;
                            seen.content_type = headers
                                .get(CONTENT_TYPE)
                                .and_then(|v| v.to_str().ok())
                                .map(str::to_string);
                            seen.api_key = headers
                                .get(API_KEY_HEADER)
                                .and_then(|v| v.to_str().ok())
                                .map(str::to_string);
                            seen.body = body.to_vec();
                            (status, reply)
                        }
                    },
                ),
            )
            .with_state(seen.clone());

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = axum::Server::from_tcp(listener)
            .unwrap()
            .serve(app.into_make_service());
        tokio::spawn(server);
        (addr, seen)
    }

    fn provider_for(addr: SocketAddr) -> MaestroProvider {
        let config = ProviderConfig {
            base_url: Some(format!("http://{addr}/v1/")),
            api_key: None,
            timeout_ms: 5_000,
        };
        MaestroProvider::new(Network::Preprod, &config, "secret".to_string()).unwrap()
    }

    #[tokio::test]
    async fn posts_cbor_with_api_key() {
        let hash = "a".repeat(64);
        let (addr, seen) = fake_maestro(StatusCode::ACCEPTED, format!("\"{hash}\"")).await;

        let got = provider_for(addr).submit_tx(&[0x84, 0xa0]).await.unwrap();
        assert_eq!(got, hash);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.calls, 1);
        assert_eq!(seen.content_type.as_deref(), Some("application/cbor"));
        assert_eq!(seen.api_key.as_deref(), Some("secret"));
        assert_eq!(seen.body, vec![0x84, 0xa0]);
    }

    #[tokio::test]
    async fn rejection_body_is_passed_through_once() {
        let (addr, seen) = fake_maestro(StatusCode::BAD_REQUEST, "BadInputsUTxO".to_string()).await;
        let err = provider_for(addr).submit_tx(&[0x84]).await.unwrap_err();
        assert_eq!(err, SubmitError::SubmissionRejected("BadInputsUTxO".to_string()));
        assert_eq!(seen.lock().unwrap().calls, 1);
    }

    #[tokio::test]
    async fn unreachable_provider_is_a_network_failure() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let err = provider_for(addr).submit_tx(&[0x84]).await.unwrap_err();
        assert!(matches!(err, SubmitError::NetworkFailure(_)));
    }

    #[test]
    fn default_endpoint_follows_network() {
        let provider =
            MaestroProvider::new(Network::Preview, &ProviderConfig::default(), String::new()).unwrap();
        assert_eq!(
            provider.submit_url,
            "https://preview.gomaestro-api.org/v1/txmanager"
        );
    }
}

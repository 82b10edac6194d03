//! Client-side driver of the build, sign and submit pipeline.
//!
//! One [`Orchestrator`] backs one variant card. It owns that card's form
//! fields and its [`PipelineState`]; two cards never share either. Every
//! step is awaited in order, so a declined signature can never be followed
//! by a submission.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::builder::TransactionBuilder;
use crate::catalog::{self, VariantDefinition};
use crate::config::Network;
use crate::error::{PipelineError, WalletError};
use crate::gateway::SubmissionGateway;
use crate::model::{BuildRequest, BuildResponse, ErrorBody, SubmitRequest, SubmitResponse, WireUtxo};

/// The browser wallet, as seen by the pipeline. Only the first three
/// methods are used by [`Orchestrator::run`].
#[async_trait]
pub trait WalletAgent: Send + Sync {
    async fn get_utxos(&self) -> Result<Vec<WireUtxo>, WalletError>;
    async fn get_change_address(&self) -> Result<String, WalletError>;
    /// Asks the user to approve `unsigned_tx`; returns the witnessed
    /// transaction as hex CBOR.
    async fn sign_tx(&self, unsigned_tx: &str) -> Result<String, WalletError>;
    async fn get_network_id(&self) -> Result<u8, WalletError>;
    async fn get_lovelace(&self) -> Result<u64, WalletError>;
}

/// Where unsigned transactions come from and signed ones go.
#[async_trait]
pub trait PipelineBackend: Send + Sync {
    /// Returns the unsigned transaction as hex CBOR.
    async fn build(&self, variant_id: &str, request: &BuildRequest) -> Result<String, PipelineError>;
    /// Returns the ledger's transaction hash.
    async fn submit(&self, signed_tx: &str) -> Result<String, PipelineError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Building,
    Signing { unsigned_tx: String },
    Submitting { signed_tx: String },
    Success { tx_hash: String },
    Error { message: String },
}

impl PipelineState {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Building => "building",
            PipelineState::Signing { .. } => "signing",
            PipelineState::Submitting { .. } => "submitting",
            PipelineState::Success { .. } => "success",
            PipelineState::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Success { .. } | PipelineState::Error { .. })
    }

    /// True while a step is in flight and the card's button is disabled.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            PipelineState::Building | PipelineState::Signing { .. } | PipelineState::Submitting { .. }
        )
    }
}

/// Recipient and amount typed into a card.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields {
    pub recipient_address: String,
    pub lovelace_amount: String,
}

pub type StateObserver = Arc<dyn Fn(&PipelineState) + Send + Sync>;

pub struct Orchestrator {
    variant: &'static VariantDefinition,
    network: Network,
    backend: Arc<dyn PipelineBackend>,
    wallet: Option<Arc<dyn WalletAgent>>,
    fields: FormFields,
    state: watch::Sender<PipelineState>,
    observer: Option<StateObserver>,
    last_error: Option<PipelineError>,
}

impl Orchestrator {
    pub fn new(
        variant_id: &str,
        network: Network,
        backend: Arc<dyn PipelineBackend>,
    ) -> Result<Self, PipelineError> {
        let variant = catalog::resolve(variant_id)?;
        let (state, _) = watch::channel(PipelineState::Idle);
        Ok(Self {
            variant,
            network,
            backend,
            wallet: None,
            fields: FormFields::default(),
            state,
            observer: None,
            last_error: None,
        })
    }

    /// Called with every state the pipeline enters, the initial reset to
    /// idle included.
    pub fn with_observer(mut self, observer: StateObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn variant(&self) -> &'static VariantDefinition {
        self.variant
    }

    pub fn connect_wallet(&mut self, wallet: Arc<dyn WalletAgent>) {
        self.wallet = Some(wallet);
    }

    pub fn disconnect_wallet(&mut self) {
        self.wallet = None;
    }

    pub fn is_wallet_connected(&self) -> bool {
        self.wallet.is_some()
    }

    pub fn set_recipient_address(&mut self, recipient_address: impl Into<String>) {
        self.fields.recipient_address = recipient_address.into();
    }

    pub fn set_lovelace_amount(&mut self, lovelace_amount: impl Into<String>) {
        self.fields.lovelace_amount = lovelace_amount.into();
    }

    pub fn fields(&self) -> &FormFields {
        &self.fields
    }

    pub fn state(&self) -> PipelineState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    /// Explorer page of the last successful submission.
    pub fn explorer_link(&self) -> Option<String> {
        match &*self.state.borrow() {
            PipelineState::Success { tx_hash } => Some(self.network.explorer_tx_url(tx_hash)),
            _ => None,
        }
    }

    /// Failure of the most recent run, pre-flight checks included. A run
    /// refused for a missing wallet leaves the card idle, so this is the
    /// only place its message survives.
    pub fn last_error(&self) -> Option<&PipelineError> {
        self.last_error.as_ref()
    }

    /// Runs the pipeline once from idle. Returns the transaction hash on
    /// success. Wallet and form checks fail without leaving idle; every
    /// later failure ends in [`PipelineState::Error`].
    pub async fn run(&mut self) -> Result<String, PipelineError> {
        self.last_error = None;
        let result = self.run_from_idle().await;
        if let Err(e) = &result {
            self.last_error = Some(e.clone());
        }
        result
    }

    async fn run_from_idle(&mut self) -> Result<String, PipelineError> {
        if *self.state.borrow() != PipelineState::Idle {
            self.transition(PipelineState::Idle);
        }

        let wallet = self.wallet.clone().ok_or(PipelineError::WalletNotConnected)?;
        let mut request = BuildRequest::default();
        if self.variant.requires_user_inputs {
            if self.fields.recipient_address.is_empty() {
                return Err(PipelineError::MissingField("recipientAddress"));
            }
            if self.fields.lovelace_amount.is_empty() {
                return Err(PipelineError::MissingField("lovelaceAmount"));
            }
            request.recipient_address = Some(self.fields.recipient_address.clone());
            request.lovelace_amount = Some(self.fields.lovelace_amount.clone());
        }

        match self.drive(wallet.as_ref(), request).await {
            Ok(tx_hash) => {
                info!(variant = self.variant.id, %tx_hash, "pipeline succeeded");
                if self.variant.requires_user_inputs {
                    self.fields = FormFields::default();
                }
                self.transition(PipelineState::Success {
                    tx_hash: tx_hash.clone(),
                });
                Ok(tx_hash)
            }
            Err(e) => {
                warn!(variant = self.variant.id, error = %e, "pipeline failed");
                self.transition(PipelineState::Error {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        wallet: &dyn WalletAgent,
        mut request: BuildRequest,
    ) -> Result<String, PipelineError> {
        self.transition(PipelineState::Building);
        request.utxos = Some(wallet.get_utxos().await?);
        request.change_address = Some(wallet.get_change_address().await?);
        let unsigned_tx = self.backend.build(self.variant.id, &request).await?;

        self.transition(PipelineState::Signing {
            unsigned_tx: unsigned_tx.clone(),
        });
        let signed_tx = wallet.sign_tx(&unsigned_tx).await?;

        self.transition(PipelineState::Submitting {
            signed_tx: signed_tx.clone(),
        });
        self.backend.submit(&signed_tx).await
    }

    fn transition(&self, next: PipelineState) {
        debug!(variant = self.variant.id, state = next.name(), "pipeline transition");
        if let Some(observer) = &self.observer {
            observer(&next);
        }
        self.state.send_replace(next);
    }
}

/// Talks to the service's HTTP surface.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post<T, R>(&self, path: &str, body: &T) -> Result<Result<R, String>, PipelineError>
    where
        T: serde::Serialize + Sync,
        R: serde::de::DeserializeOwned,
    {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|e| PipelineError::NetworkFailure(e.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PipelineError::NetworkFailure(e.to_string()))?;

        if status.is_success() {
            serde_json::from_slice::<R>(&bytes)
                .map(Ok)
                .map_err(|e| PipelineError::NetworkFailure(format!("unexpected response: {e}")))
        } else {
            let message = serde_json::from_slice::<ErrorBody>(&bytes)
                .map(|body| body.error)
                .unwrap_or_else(|_| format!("HTTP {status}"));
            Ok(Err(message))
        }
    }
}

#[async_trait]
impl PipelineBackend for HttpBackend {
    async fn build(&self, variant_id: &str, request: &BuildRequest) -> Result<String, PipelineError> {
        let path = format!("/transactions/build-{variant_id}");
        match self.post::<_, BuildResponse>(&path, request).await? {
            Ok(response) => Ok(response.unsigned_tx),
            Err(message) => Err(PipelineError::Build(message)),
        }
    }

    async fn submit(&self, signed_tx: &str) -> Result<String, PipelineError> {
        let request = SubmitRequest {
            signed_tx: Some(signed_tx.to_string()),
        };
        match self
            .post::<_, SubmitResponse>("/transactions/submit", &request)
            .await?
        {
            Ok(response) => Ok(response.tx_hash),
            Err(message) => Err(PipelineError::Submission(message)),
        }
    }
}

/// Runs builder and gateway in-process, for embedding the whole pipeline
/// without an HTTP hop.
pub struct LocalBackend {
    builder: TransactionBuilder,
    gateway: SubmissionGateway,
}

impl LocalBackend {
    pub fn new(builder: TransactionBuilder, gateway: SubmissionGateway) -> Self {
        Self { builder, gateway }
    }
}

#[async_trait]
impl PipelineBackend for LocalBackend {
    async fn build(&self, variant_id: &str, request: &BuildRequest) -> Result<String, PipelineError> {
        Ok(self.builder.build_request(variant_id, request)?.to_hex())
    }

    async fn submit(&self, signed_tx: &str) -> Result<String, PipelineError> {
        Ok(self.gateway.submit(signed_tx).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::address::tests::{ENTERPRISE_ADDR, USER_ADDR};
    use crate::address::Address;
    use crate::config::ProtocolParams;
    use crate::gateway::tests::FakeProvider;
    use crate::routes::{router, AppState};
    use crate::transactions::multiasset::Value;
    use crate::transactions::primitive::{TxInput, TxOutput, Utxo};

    #[derive(Default)]
    struct FakeWallet {
        decline: bool,
        utxos_failure: Option<String>,
        sign_failure: Option<String>,
        sign_calls: AtomicUsize,
    }

    impl FakeWallet {
        fn approving() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn declining() -> Arc<Self> {
            Arc::new(Self {
                decline: true,
                ..Self::default()
            })
        }

        fn failing_utxos(message: &str) -> Arc<Self> {
            Arc::new(Self {
                utxos_failure: Some(message.to_string()),
                ..Self::default()
            })
        }

        fn failing_sign(message: &str) -> Arc<Self> {
            Arc::new(Self {
                sign_failure: Some(message.to_string()),
                ..Self::default()
            })
        }
    }

    #[async_trait]
    impl WalletAgent for FakeWallet {
        async fn get_utxos(&self) -> Result<Vec<WireUtxo>, WalletError> {
            if let Some(message) = &self.utxos_failure {
                return Err(WalletError::Failed(message.clone()));
            }
            let address = Address::parse(USER_ADDR, Network::Preprod).unwrap();
            let utxo = Utxo {
                input: TxInput {
                    tx_hash: [0x42; 32],
                    index: 0,
                },
                output: TxOutput::new(address, Value::lovelace(1_000_000_000)),
            };
            Ok(vec![WireUtxo::from_utxo(&utxo)])
        }

        async fn get_change_address(&self) -> Result<String, WalletError> {
            Ok(USER_ADDR.to_string())
        }

        async fn sign_tx(&self, unsigned_tx: &str) -> Result<String, WalletError> {
            self.sign_calls.fetch_add(1, Ordering::SeqCst);
            if self.decline {
                return Err(WalletError::Declined);
            }
            match &self.sign_failure {
                Some(message) => Err(WalletError::Failed(message.clone())),
                None => Ok(unsigned_tx.to_string()),
            }
        }

        async fn get_network_id(&self) -> Result<u8, WalletError> {
            Ok(0)
        }

        async fn get_lovelace(&self) -> Result<u64, WalletError> {
            Ok(1_000_000_000)
        }
    }

    /// Scripted backend that counts calls.
    #[derive(Default)]
    struct FakeBackend {
        build_error: Option<PipelineError>,
        submit_error: Option<PipelineError>,
        builds: Mutex<Vec<(String, BuildRequest)>>,
        submits: AtomicUsize,
    }

    #[async_trait]
    impl PipelineBackend for FakeBackend {
        async fn build(&self, variant_id: &str, request: &BuildRequest) -> Result<String, PipelineError> {
            self.builds
                .lock()
                .unwrap()
                .push((variant_id.to_string(), request.clone()));
            match &self.build_error {
                Some(e) => Err(e.clone()),
                None => Ok("84a0a0f5f6".to_string()),
            }
        }

        async fn submit(&self, _signed_tx: &str) -> Result<String, PipelineError> {
            self.submits.fetch_add(1, Ordering::SeqCst);
            match &self.submit_error {
                Some(e) => Err(e.clone()),
                None => Ok("c".repeat(64)),
            }
        }
    }

    fn recording(orchestrator: Orchestrator) -> (Orchestrator, Arc<Mutex<Vec<&'static str>>>) {
        let seen = Arc::new(Mutex::new(vec!["idle"]));
        let sink = seen.clone();
        let orchestrator = orchestrator.with_observer(Arc::new(move |state: &PipelineState| {
            sink.lock().unwrap().push(state.name());
        }));
        (orchestrator, seen)
    }

    #[tokio::test]
    async fn success_visits_every_state_once() {
        let backend = Arc::new(FakeBackend::default());
        let (mut card, seen) =
            recording(Orchestrator::new("1013a", Network::Preprod, backend.clone()).unwrap());
        card.connect_wallet(FakeWallet::approving());

        let hash = card.run().await.unwrap();
        assert_eq!(hash, "c".repeat(64));
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["idle", "building", "signing", "submitting", "success"]
        );
        assert_eq!(
            card.explorer_link().unwrap(),
            format!("https://preprod.cardanoscan.io/transaction/{hash}")
        );
    }

    #[tokio::test]
    async fn declined_signature_never_submits() {
        let backend = Arc::new(FakeBackend::default());
        let wallet = FakeWallet::declining();
        let (mut card, seen) =
            recording(Orchestrator::new("1013c", Network::Preprod, backend.clone()).unwrap());
        card.connect_wallet(wallet.clone());

        assert_eq!(card.run().await, Err(PipelineError::SigningDeclined));
        assert_eq!(*seen.lock().unwrap(), vec!["idle", "building", "signing", "error"]);
        assert_eq!(wallet.sign_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.submits.load(Ordering::SeqCst), 0);
        assert_eq!(
            card.state(),
            PipelineState::Error {
                message: "Transaction signing declined".to_string()
            }
        );
    }

    #[tokio::test]
    async fn wallet_utxo_failure_stops_while_building() {
        let backend = Arc::new(FakeBackend::default());
        let wallet = FakeWallet::failing_utxos("account locked");
        let (mut card, seen) =
            recording(Orchestrator::new("1013a", Network::Preprod, backend.clone()).unwrap());
        card.connect_wallet(wallet.clone());

        assert_eq!(
            card.run().await,
            Err(PipelineError::Wallet("account locked".to_string()))
        );
        assert_eq!(*seen.lock().unwrap(), vec!["idle", "building", "error"]);
        assert!(backend.builds.lock().unwrap().is_empty());
        assert_eq!(wallet.sign_calls.load(Ordering::SeqCst), 0);
        assert_eq!(backend.submits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn wallet_signing_failure_is_not_a_decline() {
        let backend = Arc::new(FakeBackend::default());
        let wallet = FakeWallet::failing_sign("popup closed unexpectedly");
        let (mut card, seen) =
            recording(Orchestrator::new("1013b", Network::Preprod, backend.clone()).unwrap());
        card.connect_wallet(wallet.clone());

        let err = card.run().await.unwrap_err();
        assert_eq!(err, PipelineError::Wallet("popup closed unexpectedly".to_string()));
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["idle", "building", "signing", "error"]
        );
        assert_eq!(
            card.state(),
            PipelineState::Error {
                message: "Wallet error: popup closed unexpectedly".to_string()
            }
        );
        assert_eq!(wallet.sign_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.submits.load(Ordering::SeqCst), 0);
        assert_eq!(card.last_error(), Some(&err));
    }

    #[tokio::test]
    async fn missing_wallet_after_failure_resets_but_keeps_the_message() {
        let backend = Arc::new(FakeBackend::default());
        let (mut card, seen) =
            recording(Orchestrator::new("1013c", Network::Preprod, backend.clone()).unwrap());
        card.connect_wallet(FakeWallet::declining());
        assert!(card.run().await.is_err());
        assert_eq!(card.last_error(), Some(&PipelineError::SigningDeclined));

        card.disconnect_wallet();
        assert_eq!(card.run().await, Err(PipelineError::WalletNotConnected));
        assert_eq!(card.state(), PipelineState::Idle);
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["idle", "building", "signing", "error", "idle"]
        );
        assert_eq!(
            card.last_error().map(ToString::to_string).as_deref(),
            Some("Please connect your wallet first")
        );

        card.connect_wallet(FakeWallet::approving());
        card.run().await.unwrap();
        assert_eq!(card.last_error(), None);
    }

    #[tokio::test]
    async fn missing_wallet_stays_idle() {
        let backend = Arc::new(FakeBackend::default());
        let (mut card, seen) =
            recording(Orchestrator::new("1013a", Network::Preprod, backend.clone()).unwrap());
        card.connect_wallet(FakeWallet::approving());
        card.disconnect_wallet();
        assert!(!card.is_wallet_connected());

        let err = card.run().await.unwrap_err();
        assert_eq!(err, PipelineError::WalletNotConnected);
        assert_eq!(err.to_string(), "Please connect your wallet first");
        assert_eq!(card.state(), PipelineState::Idle);
        assert_eq!(*seen.lock().unwrap(), vec!["idle"]);
        assert!(backend.builds.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn build_error_message_is_carried() {
        let backend = Arc::new(FakeBackend {
            build_error: Some(PipelineError::Build("Insufficient funds".to_string())),
            ..FakeBackend::default()
        });
        let (mut card, seen) =
            recording(Orchestrator::new("1013d", Network::Preprod, backend.clone()).unwrap());
        card.connect_wallet(FakeWallet::approving());

        assert!(card.run().await.is_err());
        assert_eq!(*seen.lock().unwrap(), vec!["idle", "building", "error"]);
        assert_eq!(
            card.state(),
            PipelineState::Error {
                message: "Insufficient funds".to_string()
            }
        );
    }

    #[tokio::test]
    async fn submission_error_ends_in_error_after_submitting() {
        let backend = Arc::new(FakeBackend {
            submit_error: Some(PipelineError::Submission("BadInputsUTxO".to_string())),
            ..FakeBackend::default()
        });
        let (mut card, seen) =
            recording(Orchestrator::new("1013a", Network::Preprod, backend.clone()).unwrap());
        card.connect_wallet(FakeWallet::approving());

        assert!(card.run().await.is_err());
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["idle", "building", "signing", "submitting", "error"]
        );
        assert_eq!(backend.submits.load(Ordering::SeqCst), 1);
        assert!(card.explorer_link().is_none());
    }

    #[tokio::test]
    async fn fixed_variant_sends_no_form_fields_and_keeps_them() {
        let backend = Arc::new(FakeBackend::default());
        let mut card = Orchestrator::new("1013c", Network::Preprod, backend.clone()).unwrap();
        card.connect_wallet(FakeWallet::approving());
        card.set_recipient_address(ENTERPRISE_ADDR);
        card.set_lovelace_amount("5000000");

        card.run().await.unwrap();
        let builds = backend.builds.lock().unwrap();
        let (variant, request) = &builds[0];
        assert_eq!(variant, "1013c");
        assert!(request.recipient_address.is_none());
        assert!(request.lovelace_amount.is_none());
        assert_eq!(request.change_address.as_deref(), Some(USER_ADDR));
        assert_eq!(card.fields().lovelace_amount, "5000000");
    }

    #[tokio::test]
    async fn user_input_variant_clears_fields_on_success_only() {
        let backend = Arc::new(FakeBackend {
            submit_error: Some(PipelineError::Submission("rejected".to_string())),
            ..FakeBackend::default()
        });
        let mut card = Orchestrator::new("1013example", Network::Preprod, backend).unwrap();
        card.connect_wallet(FakeWallet::approving());

        assert_eq!(
            card.run().await,
            Err(PipelineError::MissingField("recipientAddress"))
        );
        assert_eq!(card.state(), PipelineState::Idle);

        card.set_recipient_address(ENTERPRISE_ADDR);
        card.set_lovelace_amount("3000000");
        assert!(card.run().await.is_err());
        assert_eq!(card.fields().recipient_address, ENTERPRISE_ADDR);

        let backend = Arc::new(FakeBackend::default());
        let mut card = Orchestrator::new("1013example", Network::Preprod, backend.clone()).unwrap();
        card.connect_wallet(FakeWallet::approving());
        card.set_recipient_address(ENTERPRISE_ADDR);
        card.set_lovelace_amount("3000000");
        card.run().await.unwrap();
        assert_eq!(card.fields(), &FormFields::default());
        let builds = backend.builds.lock().unwrap();
        assert_eq!(builds[0].1.lovelace_amount.as_deref(), Some("3000000"));
    }

    #[tokio::test]
    async fn rerun_starts_again_from_idle() {
        let backend = Arc::new(FakeBackend::default());
        let (mut card, seen) =
            recording(Orchestrator::new("1013a", Network::Preprod, backend.clone()).unwrap());
        card.connect_wallet(FakeWallet::approving());
        card.run().await.unwrap();
        card.run().await.unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "idle", "building", "signing", "submitting", "success", "idle", "building",
                "signing", "submitting", "success"
            ]
        );
        assert_eq!(backend.submits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cards_run_independently() {
        let backend = Arc::new(FakeBackend::default());
        let mut ok = Orchestrator::new("1013a", Network::Preprod, backend.clone()).unwrap();
        let mut declined = Orchestrator::new("1013b", Network::Preprod, backend.clone()).unwrap();
        ok.connect_wallet(FakeWallet::approving());
        declined.connect_wallet(FakeWallet::declining());
        let mut ok_rx = ok.subscribe();

        let (a, b) = tokio::join!(ok.run(), declined.run());
        assert!(a.is_ok());
        assert_eq!(b, Err(PipelineError::SigningDeclined));
        assert!(ok_rx.has_changed().unwrap());
        assert_eq!(ok_rx.borrow_and_update().name(), "success");
        assert_eq!(declined.state().name(), "error");
        assert!(declined.state().is_terminal());
        assert!(!declined.state().is_busy());
    }

    #[test]
    fn unknown_variant_card() {
        let backend = Arc::new(FakeBackend::default());
        assert!(matches!(
            Orchestrator::new("1013z", Network::Preprod, backend),
            Err(PipelineError::UnknownVariant(_))
        ));
    }

    async fn serve_lab(provider: Arc<FakeProvider>) -> String {
        let state = AppState {
            builder: Arc::new(TransactionBuilder::new(
                Network::Preprod,
                ProtocolParams::default(),
            )),
            gateway: SubmissionGateway::new(provider),
        };
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = axum::Server::from_tcp(listener)
            .unwrap()
            .serve(router(state).into_make_service());
        tokio::spawn(server);
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn full_pipeline_over_http() {
        let provider = Arc::new(FakeProvider::default());
        let base_url = serve_lab(provider.clone()).await;
        let backend = Arc::new(HttpBackend::new(base_url, Duration::from_secs(5)).unwrap());
        let (mut card, seen) =
            recording(Orchestrator::new("1013c", Network::Preprod, backend).unwrap());
        card.connect_wallet(FakeWallet::approving());

        let hash = card.run().await.unwrap();
        assert_eq!(hash, "f".repeat(64));
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["idle", "building", "signing", "submitting", "success"]
        );
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn http_build_error_reaches_the_card() {
        let provider = Arc::new(FakeProvider::default());
        let base_url = serve_lab(provider.clone()).await;
        let backend = Arc::new(HttpBackend::new(base_url, Duration::from_secs(5)).unwrap());
        let mut card = Orchestrator::new("1013example", Network::Preprod, backend).unwrap();
        card.connect_wallet(FakeWallet::approving());
        card.set_recipient_address("addr_test1qqbioqqqq");
        card.set_lovelace_amount("3000000");

        assert!(matches!(card.run().await, Err(PipelineError::Build(_))));
        assert_eq!(card.state().name(), "error");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn local_backend_runs_in_process() {
        let provider = Arc::new(FakeProvider::default());
        let backend = Arc::new(LocalBackend::new(
            TransactionBuilder::new(Network::Preprod, ProtocolParams::default()),
            SubmissionGateway::new(provider.clone()),
        ));
        let mut card = Orchestrator::new("1013b", Network::Preprod, backend).unwrap();
        card.connect_wallet(FakeWallet::approving());
        card.run().await.unwrap();
        let payloads = provider.payloads.lock().unwrap();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0][0], 0x84);
    }

    #[tokio::test]
    async fn unreachable_service_is_a_network_failure() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let backend =
            Arc::new(HttpBackend::new(format!("http://{addr}"), Duration::from_secs(5)).unwrap());
        let mut card = Orchestrator::new("1013a", Network::Preprod, backend).unwrap();
        card.connect_wallet(FakeWallet::approving());
        assert!(matches!(card.run().await, Err(PipelineError::NetworkFailure(_))));
    }
}

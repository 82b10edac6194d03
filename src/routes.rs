use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use metrics::increment_counter;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::builder::TransactionBuilder;
use crate::catalog::{self, VariantDefinition};
use crate::error::{BuildError, SubmitError};
use crate::gateway::SubmissionGateway;
use crate::model::{BuildRequest, BuildResponse, ErrorBody, SubmitRequest, SubmitResponse};

#[derive(Clone)]
pub struct AppState {
    pub builder: Arc<TransactionBuilder>,
    pub gateway: SubmissionGateway,
}

/// Everything a handler can answer with besides success.
#[derive(Debug)]
pub enum ApiError {
    Build(BuildError),
    Submit(SubmitError),
    InvalidJson(String),
    MethodNotAllowed,
    NotFound,
}

impl From<BuildError> for ApiError {
    fn from(e: BuildError) -> Self {
        ApiError::Build(e)
    }
}

impl From<SubmitError> for ApiError {
    fn from(e: SubmitError) -> Self {
        ApiError::Submit(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Build(e) => match e {
                BuildError::MissingField(_)
                | BuildError::InvalidAddress { .. }
                | BuildError::InvalidAmount(_)
                | BuildError::InvalidUtxo(_) => StatusCode::BAD_REQUEST,
                BuildError::UnknownVariant(_) => StatusCode::NOT_FOUND,
                BuildError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                BuildError::BuildFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Submit(e) => match e {
                SubmitError::MissingSignedTx | SubmitError::MalformedSignedTx(_) => {
                    StatusCode::BAD_REQUEST
                }
                SubmitError::SubmissionRejected(_) => StatusCode::INTERNAL_SERVER_ERROR,
                SubmitError::NetworkFailure(_) => StatusCode::BAD_GATEWAY,
            },
            ApiError::InvalidJson(_) => StatusCode::BAD_REQUEST,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Build(e) => e.to_string(),
            ApiError::Submit(e) => e.to_string(),
            ApiError::InvalidJson(e) => format!("Invalid JSON body: {e}"),
            ApiError::MethodNotAllowed => "Method not allowed".to_string(),
            ApiError::NotFound => "Not found".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message(),
        };
        (self.status(), Json(body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/variants", get(variants))
        .route(
            "/transactions/submit",
            post(submit).fallback(method_not_allowed),
        );

    // One route per catalog entry, so unknown ids never reach a handler.
    for variant in catalog::all() {
        let id = variant.id;
        app = app.route(
            &format!("/transactions/build-{id}"),
            post(move |State(state): State<AppState>, body: Bytes| build(state, id, body))
                .fallback(method_not_allowed),
        );
    }

    app.fallback(not_found).with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn variants() -> Json<&'static [VariantDefinition]> {
    Json(catalog::all())
}

async fn build(
    state: AppState,
    variant_id: &'static str,
    body: Bytes,
) -> Result<Json<BuildResponse>, ApiError> {
    let outcome = parse_body::<BuildRequest>(&body).and_then(|request| {
        state
            .builder
            .build_request(variant_id, &request)
            .map_err(ApiError::from)
    });
    match outcome {
        Ok(unsigned) => {
            increment_counter!("tx_lab_builds_total", "variant" => variant_id, "outcome" => "ok");
            Ok(Json(BuildResponse {
                unsigned_tx: unsigned.to_hex(),
            }))
        }
        Err(e) => {
            warn!(variant = variant_id, error = %e.message(), "build request failed");
            increment_counter!("tx_lab_builds_total", "variant" => variant_id, "outcome" => "error");
            Err(e)
        }
    }
}

async fn submit(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SubmitResponse>, ApiError> {
    let request = parse_body::<SubmitRequest>(&body)?;
    let signed_tx = request.signed_tx.unwrap_or_default();
    match state.gateway.submit(&signed_tx).await {
        Ok(tx_hash) => {
            info!(%tx_hash, "relayed signed transaction");
            increment_counter!("tx_lab_submissions_total", "outcome" => "ok");
            Ok(Json(SubmitResponse { tx_hash }))
        }
        Err(e) => {
            increment_counter!("tx_lab_submissions_total", "outcome" => "error");
            Err(e.into())
        }
    }
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

/// An empty body reads as `{}`, leaving every field missing.
fn parse_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::InvalidJson(e.to_string()))
}

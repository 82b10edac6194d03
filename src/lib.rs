//! Build, sign and submit pipeline for a lesson on transactions whose
//! advertised intent differs from what they do.

pub mod address;
pub mod builder;
pub mod catalog;
pub mod config;
pub mod error;
pub mod gateway;
pub mod mint;
pub mod model;
pub mod orchestrator;
pub mod provider;
pub mod routes;
pub mod selection;
pub mod transactions;

pub use builder::{TransactionBuilder, UnsignedTransaction, UserInputs};
pub use config::{LabConfig, Network, ProtocolParams};
pub use error::{BuildError, PipelineError, SubmitError, WalletError};
pub use gateway::SubmissionGateway;
pub use orchestrator::{Orchestrator, PipelineBackend, PipelineState, WalletAgent};

//! coldiq-core: everything the ColdIQ mail agent needs that does not touch the host page.
//!
//! - **analysis**: the `AnalysisRequest` / `AnalysisResult` value objects exchanged with the API.
//! - **client**: `AnalysisApi` seam and the reqwest-backed `HttpAnalysisClient`.
//! - **token_store**: read-only `TokenStore` seam, sled-backed persistent store, in-memory store.
//! - **config**: `AgentConfig` (TOML file + `COLDIQ__*` env) with timing and link helpers.

mod analysis;
mod client;
mod config;
mod error;
mod token_store;

pub use analysis::{AnalysisRequest, AnalysisResult};
pub use client::{AnalysisApi, ApiError, HttpAnalysisClient, ANALYZE_PATH};
pub use config::{AgentConfig, PanelLinks};
pub use error::{CoreError, CoreResult};
pub use token_store::{InMemoryTokenStore, SledTokenStore, TokenStore};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

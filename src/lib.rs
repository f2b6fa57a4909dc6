//! Home-run probability serving and live alerting.
//!
//! - [`schema`] / [`payload`]: align raw plate-appearance fields to the
//!   frozen column layout a model was trained on.
//! - [`model`]: the classifier capability and its artifact formats.
//! - [`service`] / [`server`]: predict and explain, in-process or over HTTP.
//! - [`poller`]: watch the live feed and alert on high-risk balls in play.

pub mod config;
pub mod error;
pub mod feed;
pub mod model;
pub mod notify;
pub mod payload;
pub mod poller;
pub mod retry;
pub mod schema;
pub mod scorer;
pub mod server;
pub mod service;
pub mod types;

pub use error::{ConfigError, ModelError, PollError, SchemaError, ServiceError};
pub use model::{LinearModel, LoadedModel, ProbabilityModel, TreeEnsemble};
pub use payload::{FeatureVector, RawValue};
pub use schema::FeatureSchema;
pub use service::InferenceService;
pub use types::{Handedness, PlayEvent, RawPlateAppearance};

/// Install the fmt subscriber on stderr, honouring `RUST_LOG` and defaulting to `info`.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

use thiserror::Error;

/// Failures loading the model artifact or deriving its feature schema.
/// All of these are fatal at startup.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read model artifact at {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse model artifact at {path}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("model artifact declares no features")]
    Empty,
    #[error("duplicate feature column '{0}'")]
    DuplicateColumn(String),
    #[error("tree {tree}: {reason}")]
    InvalidTree { tree: usize, reason: String },
    #[error("model references unknown feature '{0}'")]
    UnknownFeature(String),
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("feature length mismatch: got {got}, expected {expected}")]
    DimensionMismatch { got: usize, expected: usize },
    #[error("model returned {got} rows for a batch of {expected}")]
    OutputLength { got: usize, expected: usize },
    #[error("model expects {model} features but the schema has {schema}")]
    SchemaMismatch { model: usize, schema: usize },
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("top_n must be at least 1")]
    InvalidTopN,
    #[error(transparent)]
    Model(#[from] ModelError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set before starting")]
    MissingSecret(&'static str),
    #[error("invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Conditions that terminate the poll loop.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("live feed fetch failed")]
    FeedFetch(#[source] anyhow::Error),
    #[error("batch scoring call failed")]
    Score(#[source] anyhow::Error),
}

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ForwarderError>;

#[derive(Error, Debug)]
pub enum ForwarderError {
    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Forwarder returned status {status} for {endpoint}")]
    Status { endpoint: String, status: u16 },
}

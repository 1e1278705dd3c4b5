use edgectl_core::Cause;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid API URL '{url}'")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("failed to build HTTP client")]
    ClientBuild { source: reqwest::Error },

    #[error("request to {url} failed")]
    Transport { url: String, source: reqwest::Error },

    #[error("unexpected status {status} from {method} {url}: {body}")]
    UnexpectedStatus {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("failed to decode response from {url}")]
    Decode { url: String, source: reqwest::Error },

    #[error("failed to encode metadata for {slug}")]
    Encode {
        slug: String,
        source: serde_json::Error,
    },

    /// The upload body could not be produced; `source` is the producer's error.
    #[error("failed to upload function {slug}: {source}")]
    Upload { slug: String, source: Cause },

    #[error("request cancelled")]
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("job queue is closed")]
    QueueClosed,
}

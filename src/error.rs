// ABOUTME: Error types with structured exit codes for CLI
// ABOUTME: Separates per-document codec faults from remote and vault failures

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Malformed frontmatter: {0}")]
    MalformedHeader(String),

    #[error("Post {post_id} is inconsistent after applying document: {detail}")]
    ConsistencyMismatch { post_id: String, detail: String },

    #[error("Invalid post record: {0}")]
    Invariant(String),

    #[error("Post not found: {0}")]
    NotFound(String),

    #[error("Failed to fetch {address}: {message}")]
    Fetch { address: String, message: String },

    #[error("{} of {total} posts failed: {}", .failed.len(), .failed.join(", "))]
    PartialBulkFailure { failed: Vec<String>, total: usize },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error {status} on {endpoint}: {message}")]
    Api {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    #[error("Resource {address} is not valid UTF-8")]
    Encoding { address: String },

    #[error("Unsafe path: {0}")]
    InvalidPath(String),

    #[error("Markdown render error: {0}")]
    Render(String),
}

impl Error {
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Auth(_) | Error::Config(_) => 2,
            Error::Network(_) | Error::Fetch { .. } => 3,
            Error::Api { .. } | Error::NotFound(_) => 4,
            Error::Parse(_) | Error::Yaml(_) | Error::Encoding { .. } => 5,
            Error::Filesystem(_) | Error::InvalidPath(_) => 6,
            Error::MalformedHeader(_) | Error::Render(_) => 7,
            Error::ConsistencyMismatch { .. } | Error::Invariant(_) => 8,
            Error::PartialBulkFailure { .. } => 9,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(Error::Auth("test".into()).exit_code(), 2);
        assert_eq!(
            Error::Api {
                endpoint: "test".into(),
                status: 404,
                message: "not found".into()
            }
            .exit_code(),
            4
        );
        assert_eq!(Error::MalformedHeader("test".into()).exit_code(), 7);
        assert_eq!(
            Error::PartialBulkFailure {
                failed: vec!["a".into()],
                total: 3
            }
            .exit_code(),
            9
        );
    }

    #[test]
    fn test_partial_bulk_failure_message() {
        let err = Error::PartialBulkFailure {
            failed: vec!["p2".into(), "p5".into()],
            total: 6,
        };
        assert_eq!(err.to_string(), "2 of 6 posts failed: p2, p5");
    }
}

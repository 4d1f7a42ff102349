use thiserror::Error;

/// Errors raised by [`crate::VPromptClient`]
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Could not send request to {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {url} failed with status {code}: {body}")]
    Status { url: String, code: u16, body: String },

    #[error("Failed to parse response from {url}: {detail}")]
    Format { url: String, detail: String },

    #[error("Backend reported an error: {0}")]
    Backend(String),
}

impl ClientError {
    pub(crate) fn network(url: &str, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.to_string(),
            source,
        }
    }

    pub(crate) fn format(url: &str, detail: impl std::fmt::Display) -> Self {
        Self::Format {
            url: url.to_string(),
            detail: detail.to_string(),
        }
    }

    /// Short text suitable for splicing into a user-facing notice
    pub fn summary(&self) -> String {
        match self {
            ClientError::Network { source, .. } => source.to_string(),
            ClientError::Status { code, body, .. } => {
                let body = body.trim();
                if body.is_empty() {
                    format!("HTTP {code}")
                } else {
                    let head: String = body.chars().take(200).collect();
                    format!("HTTP {code}: {head}")
                }
            }
            ClientError::Format { detail, .. } => detail.clone(),
            ClientError::Backend(msg) => msg.clone(),
        }
    }
}

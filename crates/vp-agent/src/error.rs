use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("http error: {message}")]
    Http { message: String },
    #[error("server answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("storage error: {message}")]
    Storage { message: String },
    #[error("decode error: {message}")]
    Decode { message: String },
    #[error("command failed: {message}")]
    Command { message: String },
}

impl AgentError {
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage {
            message: err.to_string(),
        }
    }

    /// Failures worth retrying later: the server was unreachable or broken.
    /// A 4xx other than timeout/throttling means the request itself is bad.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { .. } => true,
            Self::Status { status, .. } => *status >= 500 || matches!(*status, 408 | 429),
            Self::Storage { .. } | Self::Decode { .. } | Self::Command { .. } => false,
        }
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::decode(err);
        }
        Self::Http {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16) -> AgentError {
        AgentError::Status {
            status,
            body: String::new(),
        }
    }

    #[test]
    fn only_network_and_server_failures_are_transient() {
        assert!(
            AgentError::Http {
                message: "timed out".to_string()
            }
            .is_transient()
        );
        assert!(status(503).is_transient());
        assert!(status(429).is_transient());
        assert!(!status(400).is_transient());
        assert!(!status(422).is_transient());
        assert!(!AgentError::decode("bad json").is_transient());
    }
}

use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the GMP client stack
#[derive(Debug, Error)]
pub enum GmpError {
    /// DNS, connect, handshake or socket I/O failure
    #[error("transport error: {0}")]
    Transport(String),

    /// The server certificate was rejected
    #[error("certificate error: {0}")]
    Certificate(String),

    /// The daemon refused the credentials
    #[error("authentication failed: {reason}")]
    Auth {
        /// Status text reported by the daemon
        reason: String,
    },

    /// Session misuse or an unclassified fault
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The response could not be parsed
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The daemon does not know the referenced resource
    #[error("not found: {0}")]
    NotFound(String),

    /// A resource with the same name already exists
    #[error("duplicate name: {0}")]
    DuplicateName(String),

    /// Local TLS material could not be loaded
    #[error("configuration error: {0}")]
    Config(String),
}

/// Serializable discriminant of [`GmpError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transport,
    Certificate,
    Auth,
    Protocol,
    MalformedResponse,
    NotFound,
    DuplicateName,
    Config,
}

impl ErrorKind {
    /// Process exit code for this kind; success exits with 0
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Transport => 10,
            ErrorKind::Certificate => 11,
            ErrorKind::Auth => 12,
            ErrorKind::Protocol => 13,
            ErrorKind::MalformedResponse => 14,
            ErrorKind::NotFound => 15,
            ErrorKind::DuplicateName => 16,
            ErrorKind::Config => 17,
        }
    }
}

impl GmpError {
    /// Returns the kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            GmpError::Transport(_) => ErrorKind::Transport,
            GmpError::Certificate(_) => ErrorKind::Certificate,
            GmpError::Auth { .. } => ErrorKind::Auth,
            GmpError::Protocol(_) => ErrorKind::Protocol,
            GmpError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            GmpError::NotFound(_) => ErrorKind::NotFound,
            GmpError::DuplicateName(_) => ErrorKind::DuplicateName,
            GmpError::Config(_) => ErrorKind::Config,
        }
    }
}

impl From<std::io::Error> for GmpError {
    fn from(err: std::io::Error) -> Self {
        GmpError::Transport(err.to_string())
    }
}

/// A non-success response from the daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    /// Numeric status attribute of the response root
    pub status:      u16,
    /// The `status_text` attribute, empty when absent
    pub status_text: String,
    /// Text content of the response root, if any
    pub message:     Option<String>,
}

impl Fault {
    /// True when the daemon reports that the resource already exists
    pub fn is_duplicate(&self) -> bool {
        self.status == 400 && self.status_text.to_ascii_lowercase().contains("exists already")
    }

    /// Classifies the fault by status code
    pub fn into_error(self) -> GmpError {
        let detail = self.to_string();
        match self.status {
            404 => GmpError::NotFound(detail),
            _ if self.is_duplicate() => GmpError::DuplicateName(detail),
            _ => GmpError::Protocol(detail),
        }
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "status {}", self.status)?;
        if !self.status_text.is_empty() {
            write!(f, ": {}", self.status_text)?;
        }
        if let Some(message) = &self.message {
            write!(f, " ({message})")?;
        }
        Ok(())
    }
}

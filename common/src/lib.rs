//! GMP Common Library
//!
//! Building blocks shared by the GMP client crates:
//!
//! - Configuration defaults and TLS options
//! - The error taxonomy and fault classification
//! - A synchronous TLS transport to the scanner daemon
//! - The markup codec for commands and responses
//!
//! # Features
//!
//! - **TLS only**: connections are always encrypted; there is no plaintext
//!   fallback
//! - **Generic tree codec**: new verbs need no codec changes
//! - **Typed faults**: non-success responses are values, never payloads

/// Configuration defaults and connection settings
pub mod config;

/// Markup encoding and decoding
pub mod codec;

/// Error taxonomy
pub mod error;

/// TLS stream wrapper over TCP
pub mod tls_stream;

/// Connection establishment and ownership
pub mod transport;

// Re-export commonly used types for convenience
pub use codec::{decode, encode, Command, Element, Response, Value};
pub use config::{ClientCertPath, ClientConfig, ScanDefaults, TlsOptions, DEFAULT_PORT};
pub use error::{ErrorKind, Fault, GmpError};
pub use tls_stream::TlsStream;
pub use transport::{connect, ByteStream, Connection, ConnectionState};

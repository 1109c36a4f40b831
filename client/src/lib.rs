//! GMP Client Library
//!
//! A synchronous client for the XML-based management protocol spoken by
//! vulnerability-scanner daemons. One TLS connection carries one
//! authenticated session; each call sends one command and blocks until its
//! response has been read.
//!
//! # Example
//!
//! ```no_run
//! use gmp_client::{find_or_create_target, Credentials, GmpClient};
//! use gmp_common::{ClientConfig, ScanDefaults, TlsOptions};
//!
//! # fn main() -> Result<(), gmp_common::GmpError> {
//! let config = ClientConfig::new("gvm.example.net").with_tls(TlsOptions::new().with_insecure(true));
//! let defaults = ScanDefaults::default();
//!
//! let mut client = GmpClient::connect(&config)?;
//! client.authenticate(&Credentials::new("admin", "admin"))?;
//!
//! let hosts = vec!["10.0.0.5".to_string()];
//! let target_id = find_or_create_target(&mut client, "web1", &hosts, &defaults.port_list)?;
//! let task = client.create_task("Scan_web1", &defaults.scan_config, &target_id, &defaults.scanner_id)?;
//! client.start_task(&task.id)?;
//!
//! client.disconnect();
//! # Ok(())
//! # }
//! ```

mod client;

/// Targets and tasks decoded from responses
pub mod model;

/// Find-or-create for targets
pub mod reconcile;

/// One-shot scan orchestration and its JSON report
pub mod scan;

/// Authenticated request/response sessions
pub mod session;

pub use client::*;
pub use model::{hosts_equivalent, Target, TargetList, Task, TaskStatus};
pub use reconcile::find_or_create_target;
pub use scan::{run_scan, start_scan_now, ScanReport, ScanRequest, ScanStarted};
pub use session::{Credentials, Session};
// Re-export important types from gmp-common for convenience
pub use gmp_common::{ClientConfig, ErrorKind, GmpError, ScanDefaults, TlsOptions};

use gmp_common::{
    config::{ClientConfig, ScanDefaults},
    error::{ErrorKind, GmpError},
    transport::ByteStream,
};
use serde::Serialize;

use crate::{client::GmpClient, reconcile::find_or_create_target, session::Credentials};

/// What to scan and with which remote configuration
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub target_name:  String,
    pub target_hosts: Vec<String>,
    pub defaults:     ScanDefaults,
}

impl ScanRequest {
    /// A request using [`ScanDefaults::default`]
    pub fn new<N: Into<String>>(target_name: N, target_hosts: Vec<String>) -> Self {
        Self {
            target_name: target_name.into(),
            target_hosts,
            defaults:    ScanDefaults::default(),
        }
    }

    /// Overrides the scan config, scanner and port list
    pub fn with_defaults(mut self, defaults: ScanDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Name given to the created task
    pub fn task_name(&self) -> String {
        format!("Scan_{}", self.target_name)
    }
}

/// Identifiers of a started scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanStarted {
    pub task_id:   String,
    pub target_id: String,
}

/// Outcome printed by the command line tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanReport {
    Success {
        task_id:   String,
        target_id: String,
        message:   String,
    },
    Error {
        kind:    ErrorKind,
        message: String,
    },
}

impl ScanReport {
    /// Builds the report printed for a finished run
    pub fn from_result(request: &ScanRequest, result: Result<ScanStarted, GmpError>) -> Self {
        match result {
            Ok(started) => ScanReport::Success {
                task_id:   started.task_id,
                target_id: started.target_id,
                message:   format!("Scan started for {}", request.target_name),
            },
            Err(err) => ScanReport::Error {
                kind:    err.kind(),
                message: err.to_string(),
            },
        }
    }

    /// Process exit code: 0 on success, the error kind's code otherwise
    pub fn exit_code(&self) -> i32 {
        match self {
            ScanReport::Success { .. } => 0,
            ScanReport::Error { kind, .. } => kind.exit_code(),
        }
    }
}

/// Authenticates, reconciles the target, then creates and starts a task.
///
/// The client's session is closed on every exit path.
pub fn run_scan<S: ByteStream>(
    mut client: GmpClient<S>,
    credentials: &Credentials,
    request: &ScanRequest,
) -> Result<ScanStarted, GmpError> {
    let result = run_steps(&mut client, credentials, request);
    client.disconnect();
    result
}

fn run_steps<S: ByteStream>(
    client: &mut GmpClient<S>,
    credentials: &Credentials,
    request: &ScanRequest,
) -> Result<ScanStarted, GmpError> {
    if request.target_hosts.is_empty() {
        return Err(GmpError::Protocol("no target hosts given".into()));
    }

    client.authenticate(credentials)?;

    let target_id = find_or_create_target(
        client,
        &request.target_name,
        &request.target_hosts,
        &request.defaults.port_list,
    )?;

    let task = client.create_task(
        &request.task_name(),
        &request.defaults.scan_config,
        &target_id,
        &request.defaults.scanner_id,
    )?;

    client.start_task(&task.id)?;

    Ok(ScanStarted {
        task_id: task.id,
        target_id,
    })
}

/// Connects to the daemon described by `config` and starts a scan
pub fn start_scan_now(
    config: &ClientConfig,
    credentials: &Credentials,
    request: &ScanRequest,
) -> ScanReport {
    let result =
        GmpClient::connect(config).and_then(|client| run_scan(client, credentials, request));
    if let Err(e) = &result {
        tracing::error!("Scan for {} failed: {}", request.target_name, e);
    }
    ScanReport::from_result(request, result)
}

use std::{env, path::PathBuf, time::Duration};

/// The well-known GMP administrative port
pub const DEFAULT_PORT: u16 = 9390;

/// Socket read/write timeout applied when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Scan config "Full and fast"
pub const FULL_AND_FAST_SCAN_CONFIG: &str = "daba56c8-73ec-11df-a475-002264764cea";

/// The default OpenVAS scanner
pub const DEFAULT_SCANNER: &str = "08b69003-5fc2-4037-a479-93b440211c73";

/// Port list "All IANA assigned TCP"
pub const ALL_IANA_TCP_PORT_LIST: &str = "4a4717fe-57d2-11e1-9a26-406186ea4fc5";

const CERTS_DIR_ENV: &str = "GMP_CERTS_DIR";

/// Certificate paths for mutual TLS and server verification
#[derive(Debug, Clone, Default)]
pub struct ClientCertPath {
    /// Path to the client certificate file
    pub cert_path: Option<PathBuf>,
    /// Path to the client private key file
    pub key_path:  Option<PathBuf>,
    /// Path to the certificate authority bundle
    pub ca_path:   Option<PathBuf>,
}

impl ClientCertPath {
    /// Creates an empty set of paths (system roots, no client certificate)
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves paths from `GMP_CERTS_DIR`, keeping only files that exist.
    ///
    /// The directory is expected to hold `client.pem`, `client.key.pem` and
    /// `root-ca.pem`.
    pub fn from_env() -> Self {
        let Ok(dir) = env::var(CERTS_DIR_ENV) else {
            return Self::default();
        };
        Self::from_dir(PathBuf::from(dir))
    }

    /// Resolves paths inside `base`, keeping only files that exist
    pub fn from_dir(base: PathBuf) -> Self {
        let existing = |name: &str| Some(base.join(name)).filter(|p| p.is_file());
        Self {
            cert_path: existing("client.pem"),
            key_path:  existing("client.key.pem"),
            ca_path:   existing("root-ca.pem"),
        }
    }

    /// Fills any unset path from `other`
    pub fn or(self, other: ClientCertPath) -> Self {
        Self {
            cert_path: self.cert_path.or(other.cert_path),
            key_path:  self.key_path.or(other.key_path),
            ca_path:   self.ca_path.or(other.ca_path),
        }
    }
}

/// TLS settings for the connection to the daemon
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    /// Certificate material to load
    pub certs:    ClientCertPath,
    /// Skip server certificate verification entirely
    pub insecure: bool,
}

impl TlsOptions {
    /// Creates options that verify against the bundled web PKI roots
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the certificate paths
    pub fn with_certs(mut self, certs: ClientCertPath) -> Self {
        self.certs = certs;
        self
    }

    /// Disable server certificate verification
    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }
}

/// Connection settings for a GMP daemon
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Daemon host name or address
    pub host:    String,
    /// Daemon port
    pub port:    u16,
    /// Connect, read and write timeout
    pub timeout: Duration,
    /// TLS settings
    pub tls:     TlsOptions,
}

impl ClientConfig {
    /// Creates a configuration for `host` on the default port
    pub fn new<S: Into<String>>(host: S) -> Self {
        Self {
            host:    host.into(),
            port:    DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
            tls:     TlsOptions::default(),
        }
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the socket timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the TLS options
    pub fn with_tls(mut self, tls: TlsOptions) -> Self {
        self.tls = tls;
        self
    }
}

/// Remote identifiers used when creating targets and tasks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanDefaults {
    /// Scan config UUID
    pub scan_config: String,
    /// Scanner UUID
    pub scanner_id:  String,
    /// Port list UUID
    pub port_list:   String,
}

impl Default for ScanDefaults {
    fn default() -> Self {
        Self {
            scan_config: FULL_AND_FAST_SCAN_CONFIG.to_string(),
            scanner_id:  DEFAULT_SCANNER.to_string(),
            port_list:   ALL_IANA_TCP_PORT_LIST.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder_overrides_defaults() {
        let config = ClientConfig::new("gvm.local")
            .with_port(9391)
            .with_timeout(Duration::from_secs(5));
        assert_eq!(config.host, "gvm.local");
        assert_eq!(config.port, 9391);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(!config.tls.insecure);
    }

    #[test]
    fn cert_dir_keeps_only_existing_files() {
        let paths = ClientCertPath::from_dir(PathBuf::from("/nonexistent/gmp-certs"));
        assert!(paths.cert_path.is_none());
        assert!(paths.key_path.is_none());
        assert!(paths.ca_path.is_none());
    }

    #[test]
    fn explicit_paths_win_over_fallback() {
        let explicit = ClientCertPath {
            ca_path: Some(PathBuf::from("/etc/gvm/ca.pem")),
            ..ClientCertPath::default()
        };
        let fallback = ClientCertPath {
            ca_path:   Some(PathBuf::from("/other/ca.pem")),
            cert_path: Some(PathBuf::from("/other/client.pem")),
            key_path:  None,
        };
        let merged = explicit.or(fallback);
        assert_eq!(merged.ca_path, Some(PathBuf::from("/etc/gvm/ca.pem")));
        assert_eq!(merged.cert_path, Some(PathBuf::from("/other/client.pem")));
    }

    #[test]
    fn scan_defaults_use_well_known_ids() {
        let defaults = ScanDefaults::default();
        assert_eq!(defaults.scan_config, FULL_AND_FAST_SCAN_CONFIG);
        assert_eq!(defaults.scanner_id, DEFAULT_SCANNER);
        assert_eq!(defaults.port_list, ALL_IANA_TCP_PORT_LIST);
    }
}

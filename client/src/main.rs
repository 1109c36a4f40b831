use std::{path::PathBuf, process::ExitCode, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use gmp_client::{start_scan_now, Credentials, ScanReport, ScanRequest};
use gmp_common::{
    config::{ALL_IANA_TCP_PORT_LIST, DEFAULT_SCANNER, FULL_AND_FAST_SCAN_CONFIG},
    ClientCertPath, ClientConfig, ScanDefaults, TlsOptions, DEFAULT_PORT,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Start an immediate scan on a GMP daemon
#[derive(Parser)]
#[command(name = "gmp-scan-now", version)]
#[command(about = "Start an immediate GMP scan and print the result as JSON")]
struct Args {
    /// Daemon host
    #[arg(long, env = "GMP_HOST")]
    host: String,

    /// Daemon port
    #[arg(long, env = "GMP_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Username
    #[arg(long, env = "GMP_USERNAME")]
    username: String,

    /// Password
    #[arg(long, env = "GMP_PASSWORD", hide_env_values = true)]
    password: String,

    /// Target name
    #[arg(long = "target_name", alias = "target-name")]
    target_name: String,

    /// Target host or address; repeat or separate with commas for several
    #[arg(long = "target_host", alias = "target-host", required = true, value_delimiter = ',')]
    target_host: Vec<String>,

    /// Scan config UUID (default: Full and fast)
    #[arg(long = "scan_config", alias = "scan-config", default_value = FULL_AND_FAST_SCAN_CONFIG)]
    scan_config: String,

    /// Scanner UUID (default: OpenVAS default)
    #[arg(long = "scanner_id", alias = "scanner-id", default_value = DEFAULT_SCANNER)]
    scanner_id: String,

    /// Port list UUID (default: All IANA assigned TCP)
    #[arg(long = "port_list", alias = "port-list", default_value = ALL_IANA_TCP_PORT_LIST)]
    port_list: String,

    /// CA bundle used to verify the daemon certificate
    #[arg(long)]
    ca_cert: Option<PathBuf>,

    /// Client certificate for mutual TLS
    #[arg(long, requires = "client_key")]
    client_cert: Option<PathBuf>,

    /// Client private key for mutual TLS
    #[arg(long, requires = "client_cert")]
    client_key: Option<PathBuf>,

    /// Do not verify the daemon certificate
    #[arg(long, default_value_t = false)]
    insecure: bool,

    /// Socket timeout in seconds
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    #[arg(short, long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries only the JSON report
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let certs = ClientCertPath {
        cert_path: args.client_cert,
        key_path:  args.client_key,
        ca_path:   args.ca_cert,
    }
    .or(ClientCertPath::from_env());

    let config = ClientConfig::new(args.host)
        .with_port(args.port)
        .with_timeout(Duration::from_secs(args.timeout_secs))
        .with_tls(TlsOptions::new().with_certs(certs).with_insecure(args.insecure));

    let credentials = Credentials::new(args.username, args.password);

    let request = ScanRequest::new(args.target_name, args.target_host).with_defaults(ScanDefaults {
        scan_config: args.scan_config,
        scanner_id:  args.scanner_id,
        port_list:   args.port_list,
    });

    let report = start_scan_now(&config, &credentials, &request);
    print_report(&report)?;

    let code = u8::try_from(report.exit_code()).unwrap_or(1);
    Ok(ExitCode::from(code))
}

fn print_report(report: &ScanReport) -> Result<()> {
    let rendered = serde_json::to_string_pretty(report).context("Failed to render report")?;
    println!("{rendered}");
    Ok(())
}

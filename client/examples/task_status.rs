use std::env;

use anyhow::{Context, Result};
use gmp_client::{ClientConfig, Credentials, GmpClient, TlsOptions};

/// Prints the run state and last report of every task, or of the task given
/// as the first argument.
///
/// Reads GMP_HOST, GMP_USERNAME and GMP_PASSWORD from the environment.
fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let host = env::var("GMP_HOST").context("GMP_HOST is not set")?;
    let username = env::var("GMP_USERNAME").context("GMP_USERNAME is not set")?;
    let password = env::var("GMP_PASSWORD").context("GMP_PASSWORD is not set")?;

    let config = ClientConfig::new(host).with_tls(TlsOptions::new().with_insecure(true));
    let mut client = GmpClient::connect(&config)?;
    println!("Daemon speaks GMP {}", client.get_version()?);

    client.authenticate(&Credentials::new(username, password))?;

    let tasks = match env::args().nth(1) {
        Some(task_id) => vec![client.get_task(&task_id)?],
        None => client.get_tasks("rows=-1")?,
    };

    for task in tasks {
        println!(
            "{}  {:<30} {:?}  last report: {}",
            task.id,
            task.name,
            task.status,
            task.last_report_id.as_deref().unwrap_or("-")
        );
    }

    client.disconnect();
    Ok(())
}

//! seatwarden-admin: list sessions, close a session, or stop the daemon.

use clap::Parser;
use seatwarden::client::remote::DaemonClient;
use seatwarden::config::{locate_server, ServerAddr, LOG_ENV};
use seatwarden::messages::{text, Msg};
use seatwarden::protocol::io::DEFAULT_IO_TIMEOUT;
use seatwarden::{SeatwardenError, SharedSecret};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "seatwarden-admin",
    version,
    about = "Administer a seatwarden license daemon (lists sessions by default)"
)]
struct Cli {
    /// License server as host[:port]; located like clients when omitted
    server: Option<String>,

    /// Stop the daemon
    #[arg(short = 'k', long, conflicts_with = "close")]
    kill: bool,

    /// Close the session opened by HOST with process id PID
    #[arg(short = 'p', long, num_args = 2, value_names = ["HOST", "PID"])]
    close: Option<Vec<String>>,

    /// Search path for license.host when no server is given
    #[arg(long, default_value = ".")]
    search_path: String,
}

fn server_for(cli: &Cli) -> Result<ServerAddr, SeatwardenError> {
    if let Some(server) = &cli.server {
        return server.parse();
    }
    locate_server(&cli.search_path)?
        .map(|(addr, _)| addr)
        .ok_or_else(|| SeatwardenError::ConfigError("no license server configured".to_string()))
}

fn run(cli: Cli) -> Result<(), SeatwardenError> {
    let server = server_for(&cli)?;
    let client = DaemonClient::new(server, SharedSecret::from_env()?, DEFAULT_IO_TIMEOUT);

    if cli.kill {
        client.kill()?;
        println!("{}", text(Msg::KillAcknowledged));
        return Ok(());
    }

    if let Some(args) = &cli.close {
        let (host, pid) = match args.as_slice() {
            [host, pid] => (host, pid),
            _ => {
                return Err(SeatwardenError::ConfigError(
                    "--close takes HOST and PID".to_string(),
                ))
            }
        };
        let pid: u32 = pid
            .parse()
            .map_err(|_| SeatwardenError::ConfigError(format!("invalid pid: {}", pid)))?;
        client.close(host, pid)?;
        println!("{}", text(Msg::CloseAcknowledged));
        return Ok(());
    }

    let lines = client.dump()?;
    for line in &lines {
        println!("{}", line);
    }
    if lines.len() <= 1 {
        println!("{}", text(Msg::NoJobs));
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::WARN.into())
                .with_env_var(LOG_ENV)
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("seatwarden-admin: {}", e);
            ExitCode::FAILURE
        }
    }
}

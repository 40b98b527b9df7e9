//! seatwardend: the license daemon.

use clap::Parser;
use seatwarden::clock::{Clock, SystemClock};
use seatwarden::config::{DaemonConfig, DEFAULT_LICENSE_DIR, LOG_ENV};
use seatwarden::messages::{text, Msg};
use seatwarden::server::daemon::{bind_listener, verify_startup_license, LicenseServer};
use seatwarden::server::logfile::RotatingLog;
use seatwarden::server::process::{daemonize, shutdown_signal, version_banner};
use seatwarden::{SeatwardenError, SharedSecret};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "seatwardend",
    about = "Node-locked and floating seat license daemon",
    disable_version_flag = true
)]
struct Cli {
    /// Directory containing license.xt
    #[arg(short = 'l', long, value_name = "DIR", default_value = DEFAULT_LICENSE_DIR)]
    license_dir: PathBuf,

    /// Append log output to this file (rotated past 100 KB)
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Working directory after detaching
    #[arg(short = 'w', long, value_name = "DIR")]
    workdir: Option<PathBuf>,

    /// Listening port (default: /etc/services entry, else 6114)
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Print nothing on startup
    #[arg(short = 's', long)]
    silent: bool,

    /// Stay in the foreground
    #[arg(short = 'f', long)]
    foreground: bool,

    /// Refuse to start unless the license grants SERVER to this host
    #[arg(long)]
    require_server_license: bool,

    /// Print version, OS and architecture, then exit
    #[arg(long)]
    version: bool,
}

fn absolute(path: &Path) -> Result<PathBuf, SeatwardenError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|e| SeatwardenError::ConfigError(format!("cannot read working directory: {}", e)))
}

fn setup_logging(log: Option<RotatingLog>) {
    use tracing_subscriber::filter::{EnvFilter, LevelFilter};

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var(LOG_ENV)
        .from_env_lossy();

    let fmt = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(false);

    match log {
        Some(log) => fmt.with_writer(log).init(),
        None => fmt.with_writer(std::io::stderr).init(),
    }
}

fn run(cli: Cli) -> Result<(), SeatwardenError> {
    let config = DaemonConfig {
        license_dir: absolute(&cli.license_dir)?,
        log_file: cli.log_file.as_deref().map(absolute).transpose()?,
        workdir: cli.workdir,
        port: cli.port,
        silent: cli.silent,
        foreground: cli.foreground,
        require_server_license: cli.require_server_license,
        ..DaemonConfig::default()
    };
    config.validate()?;

    let secret = SharedSecret::from_env()?;
    verify_startup_license(&config, &secret, SystemClock.now_epoch())?;
    let listener = bind_listener(&config)?;

    if !config.silent {
        eprintln!(
            "{}: {} on port {}",
            version_banner(),
            config.license_path().display(),
            config.listen_port()
        );
    }

    if config.foreground {
        if let Some(dir) = &config.workdir {
            std::env::set_current_dir(dir).map_err(|e| {
                SeatwardenError::ConfigError(format!("cannot change to {}: {}", dir.display(), e))
            })?;
        }
    } else {
        daemonize(config.workdir.as_deref())?;
    }

    let log = match &config.log_file {
        Some(path) => Some(RotatingLog::open(path, config.log_max_bytes)?),
        None => None,
    };
    setup_logging(log.clone());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| SeatwardenError::ConfigError(format!("cannot start runtime: {}", e)))?;

    runtime.block_on(async move {
        let mut server = LicenseServer::from_listener(config, secret, listener).await?;
        if let Some(log) = log {
            server = server.with_log(log);
        }
        tracing::info!(addr = %server.local_addr()?, pid = std::process::id(), "{}", text(Msg::DaemonListening));

        tokio::select! {
            result = server.serve() => {
                let reason = result?;
                tracing::info!(reason = ?reason, "{}", text(Msg::DaemonKilled));
            }
            signal = shutdown_signal() => {
                let name = signal?;
                tracing::info!(signal = name, "{}", text(Msg::DaemonSignalled));
            }
        }
        Ok(())
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.version {
        println!("{}", version_banner());
        return ExitCode::SUCCESS;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "{}", text(Msg::DaemonLicenseInvalid));
            eprintln!("seatwardend: {}: {}", text(Msg::DaemonLicenseInvalid), e);
            ExitCode::FAILURE
        }
    }
}

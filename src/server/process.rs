//! Process lifecycle: daemonizing, termination signals, version banner.

use crate::SeatwardenError;
use std::path::Path;

/// Detach from the controlling terminal.
///
/// Forks, lets the parent exit, starts a new session, points stdio at
/// `/dev/null` and changes into `workdir` (or `/`). Must run before any
/// threads exist, so call it before building the async runtime.
#[cfg(unix)]
pub fn daemonize(workdir: Option<&Path>) -> Result<(), SeatwardenError> {
    use std::ffi::CString;

    // SAFETY: called while the process is still single-threaded.
    match unsafe { libc::fork() } {
        -1 => {
            return Err(SeatwardenError::ConfigError(format!(
                "fork failed: {}",
                std::io::Error::last_os_error()
            )))
        }
        0 => {}
        _ => std::process::exit(0),
    }

    // SAFETY: plain syscall in the child.
    if unsafe { libc::setsid() } == -1 {
        return Err(SeatwardenError::ConfigError(format!(
            "setsid failed: {}",
            std::io::Error::last_os_error()
        )));
    }

    let devnull = CString::new("/dev/null")
        .map_err(|e| SeatwardenError::ConfigError(e.to_string()))?;
    // SAFETY: devnull is a valid NUL-terminated path; the descriptors
    // duplicated over are the standard streams.
    unsafe {
        let fd = libc::open(devnull.as_ptr(), libc::O_RDWR);
        if fd >= 0 {
            libc::dup2(fd, libc::STDIN_FILENO);
            libc::dup2(fd, libc::STDOUT_FILENO);
            libc::dup2(fd, libc::STDERR_FILENO);
            if fd > libc::STDERR_FILENO {
                libc::close(fd);
            }
        }
    }

    let dir = workdir.unwrap_or_else(|| Path::new("/"));
    std::env::set_current_dir(dir).map_err(|e| {
        SeatwardenError::ConfigError(format!("cannot change to {}: {}", dir.display(), e))
    })?;
    Ok(())
}

/// Daemonizing is not supported here; the daemon stays in the foreground.
#[cfg(not(unix))]
pub fn daemonize(workdir: Option<&Path>) -> Result<(), SeatwardenError> {
    if let Some(dir) = workdir {
        std::env::set_current_dir(dir).map_err(|e| {
            SeatwardenError::ConfigError(format!("cannot change to {}: {}", dir.display(), e))
        })?;
    }
    Ok(())
}

/// Wait for SIGTERM, SIGINT, SIGHUP or SIGQUIT and return its name.
#[cfg(unix)]
pub async fn shutdown_signal() -> Result<&'static str, SeatwardenError> {
    use tokio::signal::unix::{signal, SignalKind};

    let install = |kind: SignalKind| {
        signal(kind).map_err(|e| {
            SeatwardenError::ConfigError(format!("cannot install signal handler: {}", e))
        })
    };
    let mut term = install(SignalKind::terminate())?;
    let mut int = install(SignalKind::interrupt())?;
    let mut hup = install(SignalKind::hangup())?;
    let mut quit = install(SignalKind::quit())?;

    let name = tokio::select! {
        _ = term.recv() => "SIGTERM",
        _ = int.recv() => "SIGINT",
        _ = hup.recv() => "SIGHUP",
        _ = quit.recv() => "SIGQUIT",
    };
    Ok(name)
}

/// Wait for Ctrl-C.
#[cfg(not(unix))]
pub async fn shutdown_signal() -> Result<&'static str, SeatwardenError> {
    tokio::signal::ctrl_c().await.map_err(|e| {
        SeatwardenError::ConfigError(format!("cannot install signal handler: {}", e))
    })?;
    Ok("CTRL-C")
}

/// Version line printed by `--version`.
pub fn version_banner() -> String {
    format!(
        "seatwardend {} ({} {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

//! Child process shutdown with SIGTERM → SIGKILL escalation.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;
use tokio::time::timeout;

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Stop a server process whose stdin has already been closed.
///
/// # Strategy
/// 1. Wait up to `grace` for the server to exit on EOF
/// 2. Send SIGTERM and wait up to `grace` again
/// 3. Send SIGKILL and reap
///
/// Never waits longer than twice the grace period plus the final reap.
/// On Windows the process is killed after the first wait.
pub async fn shutdown_child(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    if let Ok(status) = timeout(grace, child.wait()).await {
        return status;
    }

    #[cfg(unix)]
    {
        if let Some(status) = terminate(child, grace).await? {
            return Ok(status);
        }
    }

    child.kill().await?;
    child.wait().await
}

/// SIGTERM phase. `Some` when the process exited within `grace`.
#[cfg(unix)]
async fn terminate(child: &mut Child, grace: Duration) -> io::Result<Option<ExitStatus>> {
    let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) else {
        // Already reaped.
        return child.wait().await.map(Some);
    };

    if let Err(e) = signal::kill(Pid::from_raw(pid), Signal::SIGTERM) {
        if e == nix::errno::Errno::ESRCH {
            return child.wait().await.map(Some);
        }
        return Err(io::Error::other(e));
    }

    match timeout(grace, child.wait()).await {
        Ok(result) => result.map(Some),
        Err(_) => {
            tracing::debug!(pid, "Process ignored SIGTERM, escalating to SIGKILL");
            Ok(None)
        }
    }
}

//! Child-subreaper scope.
//!
//! While a [`SubreaperGuard`] is alive, orphaned descendants are reparented to
//! this process instead of the namespace init. Closing the guard blocks until
//! every child, direct or reparented, has been reaped.

use nix::errno::Errno;
use nix::sys::prctl;
use nix::sys::wait::{WaitStatus, wait};
use nix::unistd::Pid;
use tracing::{debug, info, warn};

use crate::error::{Result, SuperviseError};

/// One descendant collected by the drain loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reaped {
    pub pid: Pid,
    pub status: WaitStatus,
}

/// Why the drain loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainEnd {
    /// `wait` returned `ECHILD`: nothing left to reap.
    NoChildren,
    /// `wait` failed for another reason. The loop still stops.
    Anomaly(Errno),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainReport {
    pub reaped: Vec<Reaped>,
    pub end: DrainEnd,
}

impl DrainReport {
    pub fn contains(&self, pid: Pid) -> bool {
        self.reaped.iter().any(|r| r.pid == pid)
    }
}

/// Whether the calling process is currently registered as child subreaper.
pub fn is_subreaper() -> Result<bool> {
    prctl::get_child_subreaper().map_err(SuperviseError::Subreaper)
}

/// Scoped registration as child subreaper.
///
/// The prior flag value is restored on close, so entering and leaving any
/// number of times is indistinguishable from never entering. Dropping the guard
/// without calling [`SubreaperGuard::exit`] still drains.
#[derive(Debug)]
pub struct SubreaperGuard {
    previous: bool,
    closed: bool,
}

impl SubreaperGuard {
    pub fn enter() -> Result<Self> {
        let previous = is_subreaper()?;
        prctl::set_child_subreaper(true).map_err(SuperviseError::Subreaper)?;
        debug!(previous, "registered as child subreaper");
        Ok(Self {
            previous,
            closed: false,
        })
    }

    /// Reap every remaining descendant, then restore the prior subreaper flag.
    pub fn exit(mut self) -> DrainReport {
        self.close()
    }

    fn close(&mut self) -> DrainReport {
        self.closed = true;
        let report = drain_with(wait);
        if let Err(errno) = prctl::set_child_subreaper(self.previous) {
            warn!(%errno, "failed to restore child subreaper flag");
        }
        report
    }
}

impl Drop for SubreaperGuard {
    fn drop(&mut self) {
        if !self.closed {
            self.close();
        }
    }
}

fn drain_with(mut wait_any: impl FnMut() -> nix::Result<WaitStatus>) -> DrainReport {
    let mut reaped = Vec::new();
    let end = loop {
        match wait_any() {
            Ok(status) => {
                if let Some(pid) = status.pid() {
                    info!("Process #{pid} terminated with status {status:?}");
                    reaped.push(Reaped { pid, status });
                }
            }
            Err(Errno::ECHILD) => {
                info!("All children were terminated.");
                break DrainEnd::NoChildren;
            }
            // A forwarded SIGTERM can interrupt the wait.
            Err(Errno::EINTR) => continue,
            Err(errno) => {
                warn!(%errno, reaped = reaped.len(), "wait failed, abandoning drain");
                break DrainEnd::Anomaly(errno);
            }
        }
    };
    DrainReport { reaped, end }
}

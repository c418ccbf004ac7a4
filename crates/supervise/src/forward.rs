//! SIGTERM forwarding to a single supervised child.
//!
//! The handler only touches atomics and calls `kill(2)`, both of which are
//! async-signal-safe. The statics below are private to this module; the only
//! way to arm them is [`ForwardedChild::spawn`], and dropping the returned
//! value disarms them.

use std::process::{Child, Command, ExitStatus};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd::Pid;
use tracing::{debug, warn};

use crate::error::{Result, SuperviseError};

/// Set while a handler installed by this module is in place. Nesting is refused.
static ACTIVE: AtomicBool = AtomicBool::new(false);
/// PID of the child to forward to, 0 while not yet spawned or already reaped.
static TARGET: AtomicI32 = AtomicI32::new(0);
/// SIGTERM arrived while `TARGET` was still 0.
static PENDING: AtomicBool = AtomicBool::new(false);
/// SIGTERM has been sent to the child.
static FORWARDED: AtomicBool = AtomicBool::new(false);

/// Whether a forwarding handler is currently installed.
pub fn forwarder_active() -> bool {
    ACTIVE.load(Ordering::SeqCst)
}

extern "C" fn forward_sigterm(_sig: libc::c_int) {
    let pid = TARGET.load(Ordering::SeqCst);
    if pid <= 0 {
        PENDING.store(true, Ordering::SeqCst);
        return;
    }
    forward_once(pid);
}

fn forward_once(pid: i32) {
    if FORWARDED.swap(true, Ordering::SeqCst) {
        return;
    }
    // ESRCH if the child is already gone.
    let _ = signal::kill(Pid::from_raw(pid), Signal::SIGTERM);
}

/// Installed SIGTERM handler; restores the saved disposition on drop.
struct HandlerScope {
    previous: SigAction,
}

impl HandlerScope {
    fn install() -> Result<Self> {
        if ACTIVE
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SuperviseError::ForwarderActive);
        }
        TARGET.store(0, Ordering::SeqCst);
        PENDING.store(false, Ordering::SeqCst);
        FORWARDED.store(false, Ordering::SeqCst);

        let action = SigAction::new(
            SigHandler::Handler(forward_sigterm),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );
        // SAFETY: forward_sigterm is async-signal-safe (atomics and kill only).
        match unsafe { signal::sigaction(Signal::SIGTERM, &action) } {
            Ok(previous) => Ok(Self { previous }),
            Err(errno) => {
                ACTIVE.store(false, Ordering::SeqCst);
                Err(SuperviseError::Install(errno))
            }
        }
    }
}

impl Drop for HandlerScope {
    fn drop(&mut self) {
        // SAFETY: re-installs the exact action sigaction(2) handed back on install.
        if let Err(errno) = unsafe { signal::sigaction(Signal::SIGTERM, &self.previous) } {
            warn!(%errno, "failed to restore previous SIGTERM handler");
        }
        TARGET.store(0, Ordering::SeqCst);
        ACTIVE.store(false, Ordering::SeqCst);
    }
}

/// A child spawned with SIGTERM forwarding armed.
///
/// The handler is installed before the child is spawned, so there is no window
/// in which the child exists without forwarding. The caller is responsible for
/// [`wait`](Self::wait)ing; dropping only restores the previous handler.
pub struct ForwardedChild {
    child: Child,
    _handler: HandlerScope,
}

impl ForwardedChild {
    pub fn spawn(command: &mut Command) -> Result<Self> {
        let handler = HandlerScope::install()?;
        let child = command.spawn().map_err(|source| SuperviseError::Spawn {
            command: command_line(command),
            source,
        })?;

        let pid = i32::try_from(child.id()).unwrap_or(0);
        TARGET.store(pid, Ordering::SeqCst);
        if PENDING.load(Ordering::SeqCst) {
            debug!(pid, "delivering SIGTERM received before spawn");
            forward_once(pid);
        }

        Ok(Self {
            child,
            _handler: handler,
        })
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Whether SIGTERM has been forwarded to the child during this scope.
    pub fn forwarded(&self) -> bool {
        FORWARDED.load(Ordering::SeqCst)
    }

    /// Block until the child exits. Forwarding is disarmed once it is reaped.
    pub fn wait(&mut self) -> Result<ExitStatus> {
        let status = self.child.wait().map_err(SuperviseError::Wait)?;
        TARGET.store(0, Ordering::SeqCst);
        Ok(status)
    }
}

/// Render a command as a single space-separated line for logs and errors.
pub fn command_line(command: &Command) -> String {
    std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(|s| s.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

//! Process supervision primitives for a container entrypoint.
//!
//! Both the subreaper flag and the SIGTERM disposition are process-wide state.
//! They are only touched through the scoped guards in this crate, which restore
//! the prior state when the scope closes:
//!
//! - [`SubreaperGuard`]: registers the process as child subreaper and drains
//!   every descendant on exit.
//! - [`ForwardedChild`]: installs a SIGTERM handler that forwards the signal to
//!   one spawned child, and restores the previous handler on drop.

mod error;
mod forward;
mod status;
mod subreaper;

pub use error::{Result, SuperviseError};
pub use forward::{ForwardedChild, command_line, forwarder_active};
pub use status::exit_code;
pub use subreaper::{DrainEnd, DrainReport, Reaped, SubreaperGuard, is_subreaper};

use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

/// Map a child's exit status to the exit code this process should report.
///
/// Normal exits keep their code; death by signal becomes `128 + signo`, the
/// shell convention.
pub fn exit_code(status: ExitStatus) -> u8 {
    if let Some(code) = status.code() {
        return u8::try_from(code & 0xff).unwrap_or(1);
    }
    match status.signal() {
        Some(sig) => u8::try_from((128 + sig) & 0xff).unwrap_or(1),
        None => 1,
    }
}

//! Fatal handling for broken resource-tracking invariants.
//!
//! A failed register/deregister call on the readiness multiplexer means the
//! session bookkeeping and the host disagree about an fd. Nothing after that
//! point can be trusted, so the process is aborted after logging where it
//! happened.

use std::fmt::Display;
use std::io::Write;
use tracing::error;

/// Unwraps `Ok`, or aborts the process with the failing expression and location.
#[macro_export]
macro_rules! assert_invariant {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(err) => $crate::invariant::violation(
                stringify!($result),
                module_path!(),
                file!(),
                line!(),
                &err,
            ),
        }
    };
}

#[doc(hidden)]
#[cold]
pub fn violation(expr: &str, module: &str, file: &str, line: u32, err: &dyn Display) -> ! {
    error!(
        expr,
        module,
        file,
        line,
        error = %err,
        "Invariant violated, aborting"
    );
    let _ = std::io::stdout().flush();
    let mut stderr = std::io::stderr();
    let _ = writeln!(
        stderr,
        "{}:{}:{}() Invariant violated: {} ({})",
        file, line, module, expr, err
    );
    let _ = stderr.flush();
    std::process::abort()
}

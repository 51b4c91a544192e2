//! Error fixtures for exhaustion and unrelated failures

use std::io;

use crate::resilience::classifier::EXHAUSTION_TABLE;

/// Raw code used when the platform has no exhaustion table (`EMFILE` on
/// Linux and the BSDs)
const FALLBACK_EXHAUSTION_CODE: i32 = 24;

/// An `io::Error` carrying the platform's "too many open files" code
pub fn exhaustion_error() -> io::Error {
    let code = EXHAUSTION_TABLE.first().map_or(FALLBACK_EXHAUSTION_CODE, |entry| entry.code);
    io::Error::from_raw_os_error(code)
}

/// An unrelated failure: permission denied, with no OS code
pub fn permission_error() -> io::Error {
    io::Error::new(io::ErrorKind::PermissionDenied, "access denied")
}

//! Classification of failures as descriptor exhaustion.
//!
//! Classification is table driven: an error is exhaustion when its chain
//! carries an OS error code listed in [`EXHAUSTION_TABLE`]. Message text is
//! never inspected.

use std::error::Error;
use std::fmt;
use std::io;

/// Bumped whenever [`EXHAUSTION_TABLE`] changes for any platform
pub const EXHAUSTION_TABLE_VERSION: u32 = 1;

/// Maximum number of `source()` links followed before giving up
const MAX_CHAIN_DEPTH: usize = 16;

/// An OS error code that signals handle exhaustion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExhaustionCode {
    pub code: i32,
    pub name: &'static str,
}

/// Per-process (`EMFILE`) and system-wide (`ENFILE`) table exhaustion
#[cfg(unix)]
pub const EXHAUSTION_TABLE: &[ExhaustionCode] = &[
    ExhaustionCode { code: nix::errno::Errno::EMFILE as i32, name: "EMFILE" },
    ExhaustionCode { code: nix::errno::Errno::ENFILE as i32, name: "ENFILE" },
];

/// `ERROR_TOO_MANY_OPEN_FILES`
#[cfg(windows)]
pub const EXHAUSTION_TABLE: &[ExhaustionCode] =
    &[ExhaustionCode { code: 4, name: "ERROR_TOO_MANY_OPEN_FILES" }];

#[cfg(not(any(unix, windows)))]
pub const EXHAUSTION_TABLE: &[ExhaustionCode] = &[];

/// Look up a raw OS error code in the exhaustion table
pub fn lookup(code: i32) -> Option<&'static ExhaustionCode> {
    EXHAUSTION_TABLE.iter().find(|entry| entry.code == code)
}

/// Decides whether a failure represents handle exhaustion.
///
/// Implementations must return false for every failure that is not
/// exhaustion: a false positive turns an unrelated error into pointless
/// retries.
pub trait ExhaustionClassifier: Send + Sync + fmt::Debug {
    fn is_exhaustion(&self, error: &(dyn Error + 'static)) -> bool;
}

/// Classifier backed by [`EXHAUSTION_TABLE`].
///
/// Recognises `std::io::Error` raw OS codes and `nix` errno values anywhere
/// in the error's source chain, including errors wrapped inside an
/// `io::Error`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsErrorClassifier;

impl OsErrorClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl ExhaustionClassifier for OsErrorClassifier {
    fn is_exhaustion(&self, error: &(dyn Error + 'static)) -> bool {
        is_exhaustion(error)
    }
}

/// Whether any error in the chain carries an exhaustion code
pub fn is_exhaustion(error: &(dyn Error + 'static)) -> bool {
    let mut current = Some(error);
    let mut depth = 0;

    while let Some(err) = current {
        if depth >= MAX_CHAIN_DEPTH {
            break;
        }
        depth += 1;

        if raw_code(err).is_some_and(|code| lookup(code).is_some()) {
            return true;
        }

        // io::Error::source() skips the wrapped error itself, so step into it.
        current = match err.downcast_ref::<io::Error>().and_then(io::Error::get_ref) {
            Some(inner) => Some(inner as &(dyn Error + 'static)),
            None => err.source(),
        };
    }

    false
}

/// Whether an `io::Error` is descriptor exhaustion
pub fn is_exhaustion_io(error: &io::Error) -> bool {
    is_exhaustion(error)
}

fn raw_code(error: &(dyn Error + 'static)) -> Option<i32> {
    if let Some(io_err) = error.downcast_ref::<io::Error>() {
        return io_err.raw_os_error();
    }

    #[cfg(unix)]
    if let Some(errno) = error.downcast_ref::<nix::errno::Errno>() {
        return Some(*errno as i32);
    }

    None
}

//! Error kinds produced by the ext2 image reader.
//!
//! The core never panics and never calls `unwrap`/`expect` outside of tests: every
//! fallible operation returns a `Result<T, Error>`. `Error` plays the role `io::Error`
//! plays in a plain file-manipulation tool, except it also carries the validation and
//! API-misuse kinds the distilled spec requires.

use std::fmt;
use std::io;

/// Marks the two validation failures an operator may suppress with `FORCE=true`.
///
/// Modeled as a method on `Error` rather than a loose `bool` so that callers cannot
/// mix up which kind of error a flag refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forcible {
    /// The error can be suppressed by the force policy.
    Yes,
    /// The error is always fatal.
    No,
}

/// A failure encountered while reading an ext2 image.
#[derive(Debug)]
pub enum Error {
    /// Bad signature, unsupported version, non-clean state, or stale fsck counters.
    FormatMismatch(String),
    /// Bits set in the required/optional/write/compression feature masks outside the
    /// known set.
    UnknownFeature(String),
    /// The block stream would need a tier beyond triply-indirect to address the file.
    FileTooLarge,
    /// A path component could not be found.
    NotFound,
    /// A non-absolute path or a subcommand called with the wrong arity.
    InvalidArgument(String),
    /// A read or seek failed on the backing byte source.
    Io(io::Error),
    /// The caller asked the API to do something it does not support for the given
    /// inode (e.g. `get` on a directory).
    ApiMisuse(String),
    /// Allocation failure. Never constructed in practice: Rust's global allocator
    /// aborts the process rather than handing back a value, so this variant exists
    /// only for taxonomic parity with the source this spec was distilled from.
    OutOfMemory,
}

impl Error {
    /// Tells whether this error may be suppressed by `FORCE=true`.
    pub fn forcible(&self) -> Forcible {
        match self {
            Self::FormatMismatch(_) | Self::UnknownFeature(_) => Forcible::Yes,
            _ => Forcible::No,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FormatMismatch(msg) => write!(f, "{msg}"),
            Self::UnknownFeature(msg) => write!(f, "{msg}"),
            Self::FileTooLarge => {
                write!(f, "file size exceeds addressable range (beyond triply-indirect)")
            }
            Self::NotFound => write!(f, "no such file or directory"),
            Self::InvalidArgument(msg) => write!(f, "{msg}"),
            Self::Io(e) => write!(f, "{e}"),
            Self::ApiMisuse(msg) => write!(f, "{msg}"),
            Self::OutOfMemory => write!(f, "out of memory"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Injected policy controlling whether forcible validation errors are suppressed.
///
/// Modeled as a value rather than a global so the core stays testable under both
/// strict and permissive modes without mutating the process environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForcePolicy {
    force: bool,
}

impl ForcePolicy {
    /// Builds a policy that never suppresses forcible errors.
    pub fn strict() -> Self {
        Self { force: false }
    }

    /// Builds a policy that suppresses every forcible error.
    pub fn forced() -> Self {
        Self { force: true }
    }

    /// Builds a policy from the `FORCE` environment variable, per §6: `1`, `true` or
    /// `TRUE` enable it, anything else (including unset) leaves it strict.
    pub fn from_env() -> Self {
        let forced = std::env::var("FORCE")
            .map(|v| v == "1" || v == "true" || v == "TRUE")
            .unwrap_or(false);
        Self { force: forced }
    }

    /// Applies the policy to a validation result: a forcible `Err` is turned into
    /// `Ok(())` when the policy forces it; anything else passes through unchanged.
    pub fn apply(&self, result: Result<(), Error>) -> Result<(), Error> {
        match result {
            Err(e) if self.force && e.forcible() == Forcible::Yes => Ok(()),
            other => other,
        }
    }
}

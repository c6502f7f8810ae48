//! Typed errors for the supervisor core.
//!
//! A closed [`ErrorKind`] enum carries the information callers need to
//! branch on, while [`SupervisorError`] retains the original `source`
//! error for logging and `Display`.

use derive_more::Display;
use thiserror::Error;

/// The error kinds a supervisor can produce.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Cannot read the bundle file.
    #[display(fmt = "cannot read bundle")]
    BundleIo,
    /// A tar entry failed the path-containment security filter.
    #[display(fmt = "bundle contains an unsafe entry")]
    BundleUnsafe,
    /// The temp-folder allocator refused to hand out a working directory.
    #[display(fmt = "could not allocate a working directory")]
    TempDirFailed,
    /// `config/keter.yaml` is absent.
    #[display(fmt = "configuration file is missing")]
    ConfigMissing,
    /// `config/keter.yaml` failed to parse.
    #[display(fmt = "configuration file is malformed")]
    ConfigMalformed,
    /// The router has no ports left to lease.
    #[display(fmt = "no ports available")]
    PortExhausted,
    /// The process tracker could not start the child.
    #[display(fmt = "failed to spawn child process")]
    ChildSpawnFailed,
    /// The child did not accept connections within the probe budget.
    #[display(fmt = "health probe timed out")]
    ProbeTimeout,
    /// The database provisioner could not be reached; soft failure.
    #[display(fmt = "database provisioner unavailable")]
    DbUnavailable,
}

impl ErrorKind {
    /// Whether this kind is ever fatal. `DbUnavailable` is always a soft
    /// failure; every other kind is fatal during Bring-up and non-fatal
    /// (rolled back) during Reload.
    pub fn is_soft(&self) -> bool {
        matches!(self, ErrorKind::DbUnavailable)
    }
}

/// An error produced by the supervisor core, annotated with its [`ErrorKind`].
#[derive(Error, Debug)]
#[error("{kind}")]
pub struct SupervisorError {
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
    kind: ErrorKind,
}

impl SupervisorError {
    /// Construct an error with no underlying cause.
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }

    /// The kind of failure this error represents.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

pub type Result<T> = std::result::Result<T, SupervisorError>;

/// Attach an [`ErrorKind`] to an arbitrary error, turning it into a
/// [`SupervisorError`] that retains the original as its `source`.
pub trait ErrorExt {
    fn reason(self, kind: ErrorKind) -> SupervisorError;
}

impl<E> ErrorExt for E
where
    E: 'static + std::error::Error + Send + Sync,
{
    fn reason(self, kind: ErrorKind) -> SupervisorError {
        SupervisorError {
            kind,
            source: Some(Box::new(self)),
        }
    }
}

/// Same as [`ErrorExt`], but for `Result`s: maps the error variant in place.
pub trait ResultExt<T> {
    fn reason(self, kind: ErrorKind) -> Result<T>;
    fn with_reason<F>(self, with_kind: F) -> Result<T>
    where
        F: FnOnce() -> ErrorKind;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: 'static + std::error::Error + Send + Sync,
{
    fn reason(self, kind: ErrorKind) -> Result<T> {
        self.map_err(|e| e.reason(kind))
    }

    fn with_reason<F>(self, with_kind: F) -> Result<T>
    where
        F: FnOnce() -> ErrorKind,
    {
        self.map_err(|e| e.reason(with_kind()))
    }
}

impl<T> ResultExt<T> for Option<T> {
    fn reason(self, kind: ErrorKind) -> Result<T> {
        self.ok_or_else(|| SupervisorError::new(kind))
    }

    fn with_reason<F>(self, with_kind: F) -> Result<T>
    where
        F: FnOnce() -> ErrorKind,
    {
        self.ok_or_else(|| SupervisorError::new(with_kind()))
    }
}

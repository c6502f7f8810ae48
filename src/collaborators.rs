//! Traits for the external collaborators a supervisor needs. These are
//! contracts only — concrete implementations (the real reverse proxy, the
//! real process tracker, the real database provisioner) live outside this
//! crate's scope.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{AppName, Owner, PortLease, RoutingTarget};

/// The reverse proxy's routing table: a key-value store mapping virtual
/// hostnames to routing targets.
///
/// `add_entry` is an upsert; `remove_entry` is a delete. Implementations
/// must be internally thread-safe — the supervisor holds no locks of its
/// own and relies on this being last-writer-wins per key.
#[async_trait]
pub trait Router: Send + Sync {
    /// Lease a free TCP port.
    async fn get_port(&self) -> Result<PortLease>;

    /// Publish or overwrite a routing entry for `host`.
    async fn add_entry(&self, host: &str, target: RoutingTarget) -> Result<()>;

    /// Retract the routing entry for `host`, if any.
    async fn remove_entry(&self, host: &str);

    /// Return a previously leased port to the pool.
    async fn release_port(&self, port: PortLease);
}

/// An opaque handle to a launched child process.
pub trait ChildHandle: Send + Sync {
    /// The OS process id, if the child is still known to be running.
    fn pid(&self) -> Option<u32>;
}

/// Launches and tracks child OS processes.
#[async_trait]
pub trait ProcessTracker: Send + Sync {
    /// Launch `exec_path` with `args` and `env`, running as `owner` (user
    /// component only) with working directory `work_dir`.
    async fn run(
        &self,
        owner: Option<Owner>,
        exec_path: &Path,
        work_dir: &Path,
        args: &[String],
        env: &HashMap<String, OsString>,
    ) -> Result<Box<dyn ChildHandle>>;

    /// Terminate a previously launched child.
    async fn terminate(&self, child: &dyn ChildHandle);
}

/// Per-app database credentials.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DbInfo {
    pub user: String,
    pub pass: String,
    pub name: String,
}

/// Allocates per-app database credentials.
#[async_trait]
pub trait DbProvisioner: Send + Sync {
    async fn get_info(&self, app: &AppName) -> Result<DbInfo>;
}

/// Allocates a fresh, empty working directory for one bundle incarnation.
#[async_trait]
pub trait TempDirAllocator: Send + Sync {
    async fn allocate(&self, app: &AppName) -> Result<crate::model::WorkingDir>;
}

/// The caller's registry of live apps. On a hard failure during Bring-up,
/// or on Terminate, the supervisor removes itself from this registry
/// before going `Dead`.
pub trait AppRegistry: Send + Sync {
    fn remove(&self, app: &AppName);
}

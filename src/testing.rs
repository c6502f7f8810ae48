//! In-memory fakes for the external collaborator traits, used by unit
//! tests across the crate.

use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::collaborators::{AppRegistry, ChildHandle, DbInfo, DbProvisioner, ProcessTracker, Router, TempDirAllocator};
use crate::error::{ErrorKind, Result, SupervisorError};
use crate::model::{AppName, Owner, PortLease, RoutingTarget, WorkingDir};

/// A [`Router`] backed by a `Mutex<HashMap>`, with an incrementing port
/// counter. Set `exhausted` to make `get_port` fail, exercising the
/// `PortExhausted` path.
pub struct FakeRouter {
    next_port: AtomicU16,
    entries: Mutex<HashMap<String, RoutingTarget>>,
    leased: Mutex<HashSet<PortLease>>,
    exhausted: std::sync::atomic::AtomicBool,
}

impl FakeRouter {
    /// Build a router whose first leased port is `start_port`, incrementing
    /// from there. Callers that bind a real listener to assert on the
    /// health prober's behavior should pick disjoint ranges per test to
    /// avoid colliding with other tests running concurrently.
    pub fn new(start_port: u16) -> Self {
        Self {
            next_port: AtomicU16::new(start_port),
            entries: Mutex::new(HashMap::new()),
            leased: Mutex::new(HashSet::new()),
            exhausted: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn set_exhausted(&self, exhausted: bool) {
        self.exhausted.store(exhausted, Ordering::SeqCst);
    }

    pub fn entry(&self, host: &str) -> Option<RoutingTarget> {
        self.entries.lock().unwrap().get(host).cloned()
    }

    pub fn hosts(&self) -> HashSet<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }

    pub fn leased_ports(&self) -> usize {
        self.leased.lock().unwrap().len()
    }
}

#[async_trait]
impl Router for FakeRouter {
    async fn get_port(&self) -> Result<PortLease> {
        if self.exhausted.load(Ordering::SeqCst) {
            return Err(SupervisorError::new(ErrorKind::PortExhausted));
        }
        let port = self.next_port.fetch_add(1, Ordering::SeqCst);
        self.leased.lock().unwrap().insert(port);
        Ok(port)
    }

    async fn add_entry(&self, host: &str, target: RoutingTarget) -> Result<()> {
        self.entries.lock().unwrap().insert(host.to_string(), target);
        Ok(())
    }

    async fn remove_entry(&self, host: &str) {
        self.entries.lock().unwrap().remove(host);
    }

    async fn release_port(&self, port: PortLease) {
        self.leased.lock().unwrap().remove(&port);
    }
}

/// A no-op [`ChildHandle`] carrying a fixed fake pid.
pub struct FakeChild {
    pid: u32,
}

impl ChildHandle for FakeChild {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }
}

/// A [`ProcessTracker`] that never actually spawns anything. Set `fail` to
/// exercise `ChildSpawnFailed`.
pub struct FakeProcessTracker {
    next_pid: AtomicU16,
    fail: std::sync::atomic::AtomicBool,
    terminated: Mutex<Vec<u32>>,
}

impl FakeProcessTracker {
    pub fn new() -> Self {
        Self {
            next_pid: AtomicU16::new(1000),
            fail: std::sync::atomic::AtomicBool::new(false),
            terminated: Mutex::new(Vec::new()),
        }
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn terminated_pids(&self) -> Vec<u32> {
        self.terminated.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessTracker for FakeProcessTracker {
    async fn run(
        &self,
        _owner: Option<Owner>,
        _exec_path: &Path,
        _work_dir: &Path,
        _args: &[String],
        _env: &HashMap<String, OsString>,
    ) -> Result<Box<dyn ChildHandle>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SupervisorError::new(ErrorKind::ChildSpawnFailed));
        }
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst) as u32;
        Ok(Box::new(FakeChild { pid }))
    }

    async fn terminate(&self, child: &dyn ChildHandle) {
        if let Some(pid) = child.pid() {
            self.terminated.lock().unwrap().push(pid);
        }
    }
}

/// A [`DbProvisioner`] returning a fixed [`DbInfo`], or failing when told to.
pub struct FakeDbProvisioner {
    fail: std::sync::atomic::AtomicBool,
}

impl FakeDbProvisioner {
    pub fn new() -> Self {
        Self {
            fail: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DbProvisioner for FakeDbProvisioner {
    async fn get_info(&self, app: &AppName) -> Result<DbInfo> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SupervisorError::new(ErrorKind::DbUnavailable));
        }
        Ok(DbInfo {
            user: app.to_string(),
            pass: "fake-password".to_string(),
            name: app.to_string(),
        })
    }
}

/// A [`TempDirAllocator`] that hands out subdirectories of a shared tempdir
/// root, or fails when told to.
pub struct FakeTempDirAllocator {
    root: PathBuf,
    counter: AtomicU16,
    fail: std::sync::atomic::AtomicBool,
}

impl FakeTempDirAllocator {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            counter: AtomicU16::new(0),
            fail: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl TempDirAllocator for FakeTempDirAllocator {
    async fn allocate(&self, app: &AppName) -> Result<WorkingDir> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SupervisorError::new(ErrorKind::TempDirFailed));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let dir = self.root.join(format!("{app}-{n}"));
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|_| SupervisorError::new(ErrorKind::TempDirFailed))?;
        Ok(WorkingDir(dir))
    }
}

/// An [`AppRegistry`] that just remembers who was removed.
pub struct FakeRegistry {
    removed: Mutex<Vec<AppName>>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self {
            removed: Mutex::new(Vec::new()),
        }
    }

    pub fn removed(&self) -> Vec<AppName> {
        self.removed.lock().unwrap().clone()
    }
}

impl AppRegistry for FakeRegistry {
    fn remove(&self, app: &AppName) {
        self.removed.lock().unwrap().push(app.clone());
    }
}

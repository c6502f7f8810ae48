//! Core data types shared across the bundle extractor, config loader, and
//! supervisor.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// Opaque identifier for an app, unique within the host. Used as a
/// directory suffix and logging tag, so it may not contain path
/// separators.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AppName(String);

impl AppName {
    /// Build an `AppName`, rejecting empty values and anything that could
    /// act as a path component escape (`/`, `\`, NUL).
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        if name.is_empty() || name.contains(['/', '\\', '\0']) {
            return None;
        }
        Some(Self(name))
    }
}

impl AsRef<str> for AppName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A filesystem path to a compressed archive. Treated read-only.
#[derive(Clone, Debug)]
pub struct BundleRef(pub PathBuf);

/// The UID/GID a bundle's extracted files, and its child process, should
/// run as.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Owner {
    pub uid: u32,
    pub gid: u32,
}

/// `{host, root}`, identity by `(host, root)`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct StaticHostEntry {
    pub host: String,
    pub root: PathBuf,
}

/// `{from, to}`, identity by `(from, to)`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct RedirectEntry {
    pub from: String,
    pub to: String,
}

/// The executable sub-document of a bundle's configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    /// Path to the executable, relative to the bundle's `config/` directory.
    pub exec: PathBuf,
    /// Ordered CLI arguments.
    pub args: Vec<String>,
    /// Primary virtual hostname.
    pub host: String,
    /// Additional virtual hostnames, duplicates collapsed.
    pub extra_hosts: BTreeSet<String>,
    /// Whether a database should be provisioned for this app.
    pub postgres: bool,
    /// Whether `APPROOT` uses `https`.
    pub ssl: bool,
}

/// The normalized form of a bundle's `config/keter.yaml`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    pub app: Option<AppConfig>,
    pub static_hosts: BTreeSet<StaticHostEntry>,
    pub redirects: BTreeSet<RedirectEntry>,
}

impl Config {
    /// The set of virtual hosts this config would, if active, publish to
    /// the Router: `{primaryHost} ∪ extraHosts ∪ staticHostHosts ∪
    /// redirectFroms`.
    pub fn route_set(&self) -> BTreeSet<String> {
        let mut routes = BTreeSet::new();
        if let Some(app) = &self.app {
            routes.insert(app.host.clone());
            routes.extend(app.extra_hosts.iter().cloned());
        }
        routes.extend(self.static_hosts.iter().map(|s| s.host.clone()));
        routes.extend(self.redirects.iter().map(|r| r.from.clone()));
        routes
    }
}

/// An absolute directory owned by the supervisor for the lifetime of one
/// bundle incarnation. Deletion happens eagerly on failure, on a delay
/// after reload cut-over, or on terminate.
#[derive(Clone, Debug)]
pub struct WorkingDir(pub PathBuf);

impl AsRef<std::path::Path> for WorkingDir {
    fn as_ref(&self) -> &std::path::Path {
        &self.0
    }
}

/// A TCP port leased from the Router. Must be released on every failure
/// path and on handoff completion.
pub type PortLease = u16;

/// A routing target published to the Router for one virtual host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoutingTarget {
    /// Route to a locally bound port.
    Port(PortLease),
    /// Serve static files from this bundle-relative, already-contained root.
    Static(PathBuf),
    /// Redirect to this target URL.
    Redirect(String),
}

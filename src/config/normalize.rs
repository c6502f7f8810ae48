//! Normalization rules: turn the raw YAML document into the typed
//! [`Config`] the rest of the supervisor works with.

use std::path::{Path, PathBuf};

use crate::config::model::RawConfig;
use crate::model::{AppConfig, Config, RedirectEntry, StaticHostEntry};

/// Normalize a parsed document against the bundle's `config/` directory
/// (used to resolve and contain `static-hosts[*].root`).
pub fn normalize(raw: RawConfig, config_dir: &Path) -> Config {
    // Presence of `host` is the signal that an app sub-document was
    // provided at all; its absence means this bundle is pure static/redirect.
    let app = raw.host.map(|host| AppConfig {
        exec: PathBuf::from(raw.exec.unwrap_or_default()),
        args: raw.args,
        host,
        extra_hosts: raw.extra_hosts.into_iter().collect(),
        postgres: raw.postgres,
        ssl: raw.ssl,
    });

    let static_hosts = raw
        .static_hosts
        .into_iter()
        .filter_map(|entry| {
            let root = Path::new(&entry.root);
            // Not a relative path: dropped silently.
            if root.is_absolute() {
                return None;
            }
            let resolved = collapse(&config_dir.join(root));
            // Must remain inside the bundle's working directory.
            if !resolved.starts_with(config_dir) {
                return None;
            }
            Some(StaticHostEntry {
                host: entry.host,
                root: resolved,
            })
        })
        .collect();

    let redirects = raw
        .redirects
        .into_iter()
        .map(|entry| RedirectEntry {
            from: entry.from,
            to: entry.to,
        })
        .collect();

    Config {
        app,
        static_hosts,
        redirects,
    }
}

/// Collapse `.`/`..` components without touching the filesystem (the path
/// need not exist yet at normalization time).
fn collapse(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

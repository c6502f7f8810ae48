//! Delayed retirement of a superseded incarnation.
//!
//! A detached background task needing only the old child handle and the
//! old directory — it holds no mailbox reference, and once spawned it is
//! not cancellable: the 20s/60s windows run to completion even if the app
//! goes `Dead` in the meantime, because the incarnation they refer to is
//! already out of the route set by construction.

use std::sync::Arc;
use std::time::Duration;

use tracing::info_span;
use tracing::Instrument;

use crate::collaborators::{ChildHandle, ProcessTracker, Router};
use crate::model::{PortLease, WorkingDir};

/// In-flight requests get this long to drain against the old child before
/// it is killed.
const KILL_DELAY: Duration = Duration::from_secs(20);
/// The OS and the old child get this long to flush before its directory is
/// removed.
const CLEANUP_DELAY: Duration = Duration::from_secs(60);

/// Schedule retirement of a superseded incarnation's child, port, and
/// directory. `port` is released back to the router alongside the child
/// kill, so a reload or terminate never leaves a `PortLease` held past the
/// kill-delay window.
pub fn spawn_retirement(
    app: String,
    router: Arc<dyn Router>,
    process_tracker: Arc<dyn ProcessTracker>,
    child: Option<Box<dyn ChildHandle>>,
    port: Option<PortLease>,
    dir: WorkingDir,
) {
    tokio::spawn(
        async move {
            tokio::time::sleep(KILL_DELAY).await;
            if let Some(child) = child.as_deref() {
                tracing::info!(pid = ?child.pid(), "TerminatingOldProcess");
                process_tracker.terminate(child).await;
            }
            if let Some(port) = port {
                router.release_port(port).await;
            }

            tokio::time::sleep(CLEANUP_DELAY).await;
            tracing::info!(dir = %dir.0.display(), "RemovingOldFolder");
            if let Err(err) = tokio::fs::remove_dir_all(&dir.0).await {
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(error = ?err, dir = %dir.0.display(), "error removing retired working directory");
                }
            }
        }
        .instrument(info_span!("retire", app = %app)),
    );
}

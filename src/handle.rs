//! A cheap, cloneable reference to a running supervisor task, used to post
//! `Reload`/`Terminate` without exposing any of the supervisor's internal
//! state.

use tokio::sync::mpsc;

use crate::supervisor::SupervisorCommand;
use crate::model::BundleRef;

/// A handle to a supervisor task's mailbox. Cloning shares the same
/// underlying channel, so every caller that needs to reach one supervisor
/// can hold its own handle.
///
/// Posting after the supervisor has gone `Dead` is a silent no-op: the
/// receiver has already been dropped, so the message is simply discarded.
#[derive(Clone)]
pub struct AppHandle {
    tx: mpsc::UnboundedSender<SupervisorCommand>,
}

impl AppHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<SupervisorCommand>) -> Self {
        Self { tx }
    }

    /// Ask the supervisor to reload against a new bundle. Observable
    /// outcomes are a `FinishedReloading` log and the Router's entries
    /// changing — this call itself never blocks on cut-over completing.
    pub fn reload(&self, bundle: BundleRef) {
        let _ = self.tx.send(SupervisorCommand::Reload(bundle));
    }

    /// Ask the supervisor to tear itself down. Observable outcomes are a
    /// `TerminatingApp` log, every route it held being retracted, and the
    /// app disappearing from the caller's registry.
    pub fn terminate(&self) {
        let _ = self.tx.send(SupervisorCommand::Terminate);
    }
}

//! The App Supervisor: the state machine driving bundle extraction, config
//! loading, health probing, and the external collaborators through
//! Bootstrapping, Serving, Reloading, and Dead.
//!
//! Modeled as a sequential mailbox actor: one task owns a
//! `tokio::sync::mpsc` receiver and processes commands one at a time,
//! with no locks over incarnation state because all of it lives on that
//! task's own stack.

mod incarnation;
mod retire;

use std::collections::HashMap;
use std::ffi::OsString;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::bundle;
use crate::collaborators::{AppRegistry, DbProvisioner, ProcessTracker, Router};
use crate::config;
use crate::error::{ErrorKind, Result, SupervisorError};
use crate::handle::AppHandle;
use crate::health::HealthProber;
use crate::model::{AppConfig, AppName, BundleRef, Config, Owner, PortLease, RoutingTarget};

use incarnation::Incarnation;

/// A command posted to a supervisor's mailbox.
pub enum SupervisorCommand {
    Reload(BundleRef),
    Terminate,
}

/// The external collaborators a supervisor needs, bundled together so
/// `Supervisor::start` doesn't take an unwieldy parameter list.
pub struct Collaborators {
    pub router: Arc<dyn Router>,
    pub process_tracker: Arc<dyn ProcessTracker>,
    pub db: Arc<dyn DbProvisioner>,
    pub temp_dirs: Arc<dyn crate::collaborators::TempDirAllocator>,
    pub registry: Arc<dyn AppRegistry>,
}

pub struct Supervisor {
    app: AppName,
    owner: Option<Owner>,
    collaborators: Collaborators,
    prober: HealthProber,
    mailbox: mpsc::UnboundedReceiver<SupervisorCommand>,
}

impl Supervisor {
    /// Enter `Bootstrapping` for `app` against `bundle`, and spawn the
    /// task that will run its lifetime. Returns an [`AppHandle`]
    /// immediately; success or failure of Bring-up is only observable via
    /// the Router, logs, and the registry.
    pub fn start(
        app: AppName,
        owner: Option<Owner>,
        bundle: BundleRef,
        collaborators: Collaborators,
    ) -> AppHandle {
        Self::start_with_prober(app, owner, bundle, collaborators, HealthProber::default())
    }

    /// Same as [`Supervisor::start`], but with an explicit [`HealthProber`]
    /// — used by tests that cannot afford the default 90-second budget.
    pub fn start_with_prober(
        app: AppName,
        owner: Option<Owner>,
        bundle: BundleRef,
        collaborators: Collaborators,
        prober: HealthProber,
    ) -> AppHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let supervisor = Supervisor {
            app,
            owner,
            collaborators,
            prober,
            mailbox: rx,
        };
        tokio::spawn(supervisor.run(bundle));
        AppHandle::new(tx)
    }

    #[tracing::instrument(level = "info", skip_all, fields(app = %self.app))]
    async fn run(mut self, bundle: BundleRef) {
        let mut current = match self.bring_up(&bundle).await {
            Ok(incarnation) => incarnation,
            Err(err) => {
                tracing::error!(error = %err, "bring-up failed, app is dead");
                self.collaborators.registry.remove(&self.app);
                return;
            }
        };

        while let Some(cmd) = self.mailbox.recv().await {
            match cmd {
                SupervisorCommand::Reload(bundle) => {
                    current = self.reload(current, &bundle).await;
                }
                SupervisorCommand::Terminate => {
                    self.terminate(current).await;
                    return;
                }
            }
        }

        // All handles were dropped without an explicit Terminate: treat it
        // the same as one, so the app doesn't leak routes, a child, or a
        // directory.
        self.terminate(current).await;
    }

    /// Initial Bring-up.
    async fn bring_up(&self, bundle: &BundleRef) -> Result<Incarnation> {
        let dir = self.collaborators.temp_dirs.allocate(&self.app).await?;

        tracing::info!("UnpackingBundle");
        if let Err(err) = bundle::extract(&bundle.0, &dir.0, self.owner).await {
            tracing::error!(error = %err, "InvalidBundle");
            return Err(err);
        }

        let cfg = match config::load_config(&dir.0).await {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::error!(error = %err, "InvalidConfigFile");
                let _ = tokio::fs::remove_dir_all(&dir.0).await;
                return Err(err);
            }
        };

        let mut incarnation = Incarnation::new(dir, cfg);

        if let Some(app_cfg) = incarnation.cfg.app.clone() {
            if let Err(err) = self.launch_and_probe(&mut incarnation, &app_cfg).await {
                tracing::warn!(error = %err, "ProcessDidNotStart");
                let _ = tokio::fs::remove_dir_all(&incarnation.dir.0).await;
                return Err(err);
            }
        }

        self.publish_routes(&incarnation.cfg, incarnation.port).await;
        Ok(incarnation)
    }

    /// Reload. On any handled error, the pre-existing incarnation
    /// is returned untouched — the caller keeps serving it.
    async fn reload(&self, old: Incarnation, bundle: &BundleRef) -> Incarnation {
        let new_dir = match self.collaborators.temp_dirs.allocate(&self.app).await {
            Ok(dir) => dir,
            Err(err) => {
                tracing::warn!(error = %err, "TempDirFailed during reload, keeping old incarnation");
                return old;
            }
        };

        if let Err(err) = bundle::extract(&bundle.0, &new_dir.0, self.owner).await {
            tracing::warn!(error = %err, "InvalidBundle");
            return old;
        }

        let new_cfg = match config::load_config(&new_dir.0).await {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::warn!(error = %err, "InvalidBundle");
                let _ = tokio::fs::remove_dir_all(&new_dir.0).await;
                return old;
            }
        };

        let mut new_incarnation = Incarnation::new(new_dir, new_cfg);

        if let Some(app_cfg) = new_incarnation.cfg.app.clone() {
            if let Err(err) = self.launch_and_probe(&mut new_incarnation, &app_cfg).await {
                tracing::warn!(error = %err, "ProcessDidNotStart");
                let _ = tokio::fs::remove_dir_all(&new_incarnation.dir.0).await;
                return old;
            }
        }

        // Publish the new incarnation's routes before retracting anything
        // from the old one: observers never see an outage, and shared
        // keys move to the new incarnation via last-writer-wins.
        self.publish_routes(&new_incarnation.cfg, new_incarnation.port)
            .await;

        // Explicitly retract whatever the old config published that the new
        // one does not, so a reload never leaves a stale route behind.
        let stale: Vec<String> = old
            .cfg
            .route_set()
            .difference(&new_incarnation.cfg.route_set())
            .cloned()
            .collect();
        for host in stale {
            self.collaborators.router.remove_entry(&host).await;
        }

        retire::spawn_retirement(
            self.app.to_string(),
            self.collaborators.router.clone(),
            self.collaborators.process_tracker.clone(),
            old.child,
            old.port,
            old.dir,
        );

        tracing::info!("FinishedReloading");
        new_incarnation
    }

    /// Terminate.
    async fn terminate(&self, current: Incarnation) {
        tracing::info!("TerminatingApp");
        self.retract_routes(&current.cfg).await;

        retire::spawn_retirement(
            self.app.to_string(),
            self.collaborators.router.clone(),
            self.collaborators.process_tracker.clone(),
            current.child,
            current.port,
            current.dir,
        );

        self.collaborators.registry.remove(&self.app);
    }

    /// Acquire a port, launch the child, and probe it. On success, the
    /// incarnation's `child`/`port` fields are populated. On failure, the
    /// port (if leased) is released and the child (if spawned) is killed
    /// before the error is returned — the caller still owns cleaning up
    /// the working directory.
    async fn launch_and_probe(
        &self,
        incarnation: &mut Incarnation,
        app_cfg: &AppConfig,
    ) -> Result<()> {
        let port = self.collaborators.router.get_port().await?;

        let env = self.build_env(port, app_cfg).await;
        let exec_path = incarnation.dir.0.join("config").join(&app_cfg.exec);

        let child = match self
            .collaborators
            .process_tracker
            .run(self.owner, &exec_path, &incarnation.dir.0, &app_cfg.args, &env)
            .await
        {
            Ok(child) => child,
            Err(err) => {
                self.collaborators.router.release_port(port).await;
                return Err(err);
            }
        };

        if !self.prober.probe(port).await {
            self.collaborators.process_tracker.terminate(child.as_ref()).await;
            self.collaborators.router.release_port(port).await;
            return Err(SupervisorError::new(ErrorKind::ProbeTimeout));
        }

        incarnation.port = Some(port);
        incarnation.child = Some(child);
        Ok(())
    }

    /// Child launch environment.
    async fn build_env(&self, port: PortLease, app_cfg: &AppConfig) -> HashMap<String, OsString> {
        let mut env = HashMap::new();
        env.insert("PORT".to_string(), OsString::from(port.to_string()));

        let scheme = if app_cfg.ssl { "https" } else { "http" };
        env.insert(
            "APPROOT".to_string(),
            OsString::from(format!("{scheme}://{}", app_cfg.host)),
        );

        if app_cfg.postgres {
            match self.collaborators.db.get_info(&self.app).await {
                Ok(info) => {
                    env.insert("PGHOST".to_string(), OsString::from("localhost"));
                    env.insert("PGPORT".to_string(), OsString::from("5432"));
                    env.insert("PGUSER".to_string(), OsString::from(info.user));
                    env.insert("PGPASS".to_string(), OsString::from(info.pass));
                    env.insert("PGDATABASE".to_string(), OsString::from(info.name));
                }
                Err(err) => {
                    tracing::warn!(error = %err, "DbUnavailable, launching without PG* vars");
                }
            }
        }

        env
    }

    /// Publish every route named by `cfg`: the app's primary host and
    /// extra hosts route to its port, each static host to its root, each
    /// redirect to its target. Must only be called after a successful
    /// probe, so the Router never routes to a not-yet-listening child.
    async fn publish_routes(&self, cfg: &Config, port: Option<PortLease>) {
        if let (Some(app_cfg), Some(port)) = (&cfg.app, port) {
            self.collaborators
                .router
                .add_entry(&app_cfg.host, RoutingTarget::Port(port))
                .await
                .ok();
            for host in &app_cfg.extra_hosts {
                self.collaborators
                    .router
                    .add_entry(host, RoutingTarget::Port(port))
                    .await
                    .ok();
            }
        }

        for entry in &cfg.static_hosts {
            self.collaborators
                .router
                .add_entry(&entry.host, RoutingTarget::Static(entry.root.clone()))
                .await
                .ok();
        }

        for entry in &cfg.redirects {
            self.collaborators
                .router
                .add_entry(&entry.from, RoutingTarget::Redirect(entry.to.clone()))
                .await
                .ok();
        }
    }

    /// Retract every route currently published by `cfg` (used by Terminate).
    async fn retract_routes(&self, cfg: &Config) {
        for host in cfg.route_set() {
            self.collaborators.router.remove_entry(&host).await;
        }
    }
}

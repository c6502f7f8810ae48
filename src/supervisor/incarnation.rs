//! One running (or bringing-up) version of an app: its working directory,
//! its normalized config, and, once launched, its child process and
//! leased port. The supervisor holds at most two of these simultaneously,
//! and only during the reload cut-over window.

use crate::collaborators::ChildHandle;
use crate::model::{Config, PortLease, WorkingDir};

pub struct Incarnation {
    pub dir: WorkingDir,
    pub cfg: Config,
    pub child: Option<Box<dyn ChildHandle>>,
    pub port: Option<PortLease>,
}

impl Incarnation {
    pub fn new(dir: WorkingDir, cfg: Config) -> Self {
        Self {
            dir,
            cfg,
            child: None,
            port: None,
        }
    }
}

//! Per-application supervisor core for a bundle-based web app host.
//!
//! A [`supervisor::Supervisor`] owns one app's lifecycle end to end:
//! unpacking a bundle, loading its configuration, leasing a port, launching
//! and health-probing its child process, and publishing routes to an
//! external [`collaborators::Router`]. Callers drive one through an
//! [`handle::AppHandle`]; they never see its internal state directly.

pub mod bundle;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod handle;
pub mod health;
pub mod model;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod testing;

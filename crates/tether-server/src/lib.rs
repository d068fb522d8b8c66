//! Tether Server — pooled execution contexts and activation dispatch.
//!
//! A [`Controller`] is the reusable unit that handles one activation at a
//! time. The [`ControllerPool`] hands units out and takes them back; the
//! [`Dispatcher`] binds a unit to inbound traffic, runs the matching
//! [`Handler`], translates failures and guarantees the unit is released.

pub mod config;
pub mod controller;
pub mod correlation;
pub mod dispatcher;
pub mod env;
pub mod error;
pub mod handler;
pub mod pool;

pub use config::{ControllerConfig, PoolConfig};
pub use controller::{Completion, Controller, ScopedResource};
pub use correlation::derive_correlation_id;
pub use dispatcher::Dispatcher;
pub use env::ControllerEnv;
pub use error::ControllerError;
pub use handler::Handler;
pub use pool::{ControllerPool, PoolStats, PooledController, ReleaseNotifier};

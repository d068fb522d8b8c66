//! Controller pool.
//!
//! Units are handed out as [`PooledController`] leases. A lease owns its
//! unit exclusively; dropping it releases the activation if the handler did
//! not, then returns the unit to the idle list. A unit still in use can
//! therefore never be handed out twice.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::config::PoolConfig;
use crate::controller::Controller;
use crate::env::ControllerEnv;

/// Receives the pool-return notification from [`Controller::release`].
pub trait ReleaseNotifier: Send + Sync {
    fn unit_released(&self, correlation_id: &str);
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Units constructed over the pool's lifetime.
    pub created: usize,
    pub idle: usize,
    pub busy: usize,
    /// Release notifications received.
    pub released: usize,
}

struct PoolInner {
    env: Arc<ControllerEnv>,
    config: PoolConfig,
    idle: Mutex<Vec<Controller>>,
    created: AtomicUsize,
    busy: AtomicUsize,
    released: AtomicUsize,
}

impl ReleaseNotifier for PoolInner {
    fn unit_released(&self, correlation_id: &str) {
        self.released.fetch_add(1, Ordering::Relaxed);
        trace!(correlation_id, "Unit released to pool");
    }
}

#[derive(Clone)]
pub struct ControllerPool {
    inner: Arc<PoolInner>,
}

impl ControllerPool {
    pub fn new(env: Arc<ControllerEnv>, config: PoolConfig) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                env,
                config,
                idle: Mutex::new(Vec::new()),
                created: AtomicUsize::new(0),
                busy: AtomicUsize::new(0),
                released: AtomicUsize::new(0),
            }),
        }
    }

    /// Take an idle unit, or build one if none is free.
    pub fn acquire(&self) -> PooledController {
        let reused = self.inner.idle.lock().pop();
        let controller = match reused {
            Some(controller) => controller,
            None => {
                let created = self.inner.created.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(created, "Creating controller");
                let notifier: Weak<PoolInner> = Arc::downgrade(&self.inner);
                Controller::pooled(self.inner.env.clone(), notifier)
            }
        };
        self.inner.busy.fetch_add(1, Ordering::Relaxed);
        PooledController {
            controller: Some(controller),
            pool: self.inner.clone(),
        }
    }

    /// Return a lease explicitly. Same as dropping it.
    pub fn release(&self, lease: PooledController) {
        if !Arc::ptr_eq(&self.inner, &lease.pool) {
            warn!("Lease returned to a pool that did not issue it");
        }
        drop(lease);
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            created: self.inner.created.load(Ordering::Relaxed),
            idle: self.inner.idle.lock().len(),
            busy: self.inner.busy.load(Ordering::Relaxed),
            released: self.inner.released.load(Ordering::Relaxed),
        }
    }
}

/// Exclusive lease on a pooled [`Controller`].
pub struct PooledController {
    // Only `None` once `drop` has taken the unit back.
    controller: Option<Controller>,
    pool: Arc<PoolInner>,
}

impl Deref for PooledController {
    type Target = Controller;

    fn deref(&self) -> &Controller {
        self.controller.as_ref().expect("lease holds its controller")
    }
}

impl DerefMut for PooledController {
    fn deref_mut(&mut self) -> &mut Controller {
        self.controller.as_mut().expect("lease holds its controller")
    }
}

impl Drop for PooledController {
    fn drop(&mut self) {
        let Some(mut controller) = self.controller.take() else {
            return;
        };
        if !controller.is_released() {
            warn!(
                correlation_id = %controller.correlation_id(),
                operation = %controller.operation(),
                "Lease dropped before release, releasing now"
            );
            controller.release();
        }
        controller.clear_captured();
        self.pool.busy.fetch_sub(1, Ordering::Relaxed);

        let mut idle = self.pool.idle.lock();
        if idle.len() < self.pool.config.max_idle {
            idle.push(controller);
        } else {
            trace!("Idle list full, dropping controller");
        }
    }
}

//! Process-wide lifecycle of the embedded runtime instance.
//!
//! The manager walks the hosting chain (meta host → runtime info → runtime
//! handle → start) and caches each link, so a failed setup attempt neither
//! leaks nor re-acquires what it already holds. Retry policy lives with the
//! caller; the manager only guarantees that calling `start` again is safe.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};

use crate::error::HostError;
use crate::platform::{MetaHost, MetaHostProvider, RuntimeHandle, RuntimeInfo, ShutdownFn};

#[derive(Default)]
struct HandleChain {
    meta_host: Option<Arc<dyn MetaHost>>,
    runtime_info: Option<Arc<dyn RuntimeInfo>>,
    runtime: Option<Arc<dyn RuntimeHandle>>,
    started: bool,
}

/// Owns the handles to the embedded runtime. At most one live chain per
/// manager; handles are released only by [`RuntimeHostManager::shutdown`],
/// never implicitly.
pub struct RuntimeHostManager {
    provider: MetaHostProvider,
    chain: Mutex<HandleChain>,
}

impl RuntimeHostManager {
    pub fn new(provider: MetaHostProvider) -> Self {
        Self {
            provider,
            chain: Mutex::new(HandleChain::default()),
        }
    }

    /// Acquire and start the embedded runtime for `version`.
    ///
    /// Each step is skipped when its handle is already cached, so the call
    /// is safe to repeat after a failure. The first failing step returns
    /// its error immediately; partially-acquired handles stay cached until
    /// [`RuntimeHostManager::shutdown`] releases them.
    pub fn start(&self, version: &str) -> Result<Arc<dyn RuntimeHandle>, HostError> {
        let mut chain = self.chain.lock().unwrap_or_else(|e| e.into_inner());

        let meta_host = match &chain.meta_host {
            Some(cached) => Arc::clone(cached),
            None => {
                tracing::debug!("acquiring meta host");
                let meta_host = (self.provider)()?;
                chain.meta_host = Some(Arc::clone(&meta_host));
                meta_host
            }
        };

        let runtime_info = match &chain.runtime_info {
            Some(cached) => Arc::clone(cached),
            None => {
                tracing::debug!(version, "resolving runtime info");
                let info = meta_host.runtime_info(version)?;

                // The loadability check accounts for any runtime already
                // loaded into this process side-by-side.
                if !info.is_loadable()? {
                    tracing::warn!(version, "runtime version is not loadable in-process");
                    return Err(HostError::NotLoadable(version.to_string()));
                }
                chain.runtime_info = Some(Arc::clone(&info));
                info
            }
        };

        let runtime = match &chain.runtime {
            Some(cached) => Arc::clone(cached),
            None => {
                tracing::debug!("obtaining runtime host interface");
                let runtime = runtime_info.host_interface()?;
                chain.runtime = Some(Arc::clone(&runtime));
                runtime
            }
        };

        if !chain.started {
            tracing::info!(version, "starting embedded runtime");
            runtime.start()?;
            chain.started = true;
        }

        Ok(runtime)
    }

    pub fn is_started(&self) -> bool {
        self.chain
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .started
    }

    /// Release everything, in reverse acquisition order.
    ///
    /// If the embedded shutdown callback was resolved it is signalled
    /// first, behind its own unwind guard — shutdown may run from a fault
    /// path and must never panic. Idempotent and a no-op when nothing was
    /// ever acquired.
    pub fn shutdown(&self, embedded_shutdown: Option<ShutdownFn>) {
        if let Some(callback) = embedded_shutdown {
            if catch_unwind(AssertUnwindSafe(callback)).is_err() {
                tracing::warn!("embedded shutdown callback faulted; releasing anyway");
            }
        }

        let mut chain = self.chain.lock().unwrap_or_else(|e| e.into_inner());
        if chain.runtime.is_some() || chain.runtime_info.is_some() || chain.meta_host.is_some() {
            tracing::info!("releasing embedded runtime handles");
        }
        chain.started = false;
        chain.runtime = None;
        chain.runtime_info = None;
        chain.meta_host = None;
    }
}

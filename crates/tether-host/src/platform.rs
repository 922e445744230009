//! The platform seam: traits implemented by the real hosting layer (or by
//! test stubs) through which the bridge acquires, starts, and calls into the
//! embedded runtime.
//!
//! The handle chain mirrors the hosting API it wraps: a meta host yields
//! version-specific runtime info, which yields the runtime handle the bridge
//! actually starts and bootstraps through. All three are opaque here.

use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use crate::dispatch::RequestView;
use crate::error::HostError;

/// Zero-argument embedded shutdown callback.
pub type ShutdownFn = fn();

/// Embedded wakeup callback. Receives the host base directory and may return
/// an error string; the reference flow logs it and carries on.
pub type WakeupFn = fn(&Path) -> Option<String>;

/// The resolved per-request handler on the embedded side.
pub type HandleRequestFn = fn(&RequestView<'_>);

/// A pointer-sized callback value deposited into the [`ValueSlot`] by the
/// embedded side during a bootstrap call.
///
/// The bootstrap call itself can only return a 32-bit status, which cannot
/// carry a function pointer on 64-bit targets; the typed variants here are
/// the widened hand-off that replaces an untyped shared word.
#[derive(Debug, Clone, Copy)]
pub enum EntryPoint {
    Shutdown(ShutdownFn),
    Wakeup(WakeupFn),
    Handle(HandleRequestFn),
}

impl EntryPoint {
    /// Raw address of the carried pointer, for logging and distinctness checks.
    pub fn addr(&self) -> usize {
        match self {
            EntryPoint::Shutdown(f) => *f as usize,
            EntryPoint::Wakeup(f) => *f as usize,
            EntryPoint::Handle(f) => *f as usize,
        }
    }
}

/// Single-slot value exchange between a bootstrap call and the resolver.
///
/// The embedded side deposits at most one value per bootstrap call; the
/// resolver takes it immediately after the call returns. Only the most
/// recent deposit is visible, and `take` empties the slot, so a stale value
/// can never satisfy a later resolution.
#[derive(Default)]
pub struct ValueSlot {
    value: Mutex<Option<EntryPoint>>,
}

impl ValueSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deposit a value, replacing whatever was there.
    pub fn deposit(&self, value: EntryPoint) {
        *self.value.lock().unwrap_or_else(|e| e.into_inner()) = Some(value);
    }

    /// Take the current value, leaving the slot empty.
    pub fn take(&self) -> Option<EntryPoint> {
        self.value.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

/// Entry to the hosting layer; yields runtime info for a version string.
pub trait MetaHost: Send + Sync {
    fn runtime_info(&self, version: &str) -> Result<Arc<dyn RuntimeInfo>, HostError>;
}

/// Version-specific runtime description.
pub trait RuntimeInfo: Send + Sync {
    /// Whether this runtime can be loaded into the current process,
    /// accounting for any runtime already loaded in-process.
    fn is_loadable(&self) -> Result<bool, HostError>;

    /// Obtain the runtime host interface, loading the runtime if needed.
    fn host_interface(&self) -> Result<Arc<dyn RuntimeHandle>, HostError>;
}

/// The started (or startable) embedded runtime.
pub trait RuntimeHandle: Send + Sync {
    fn start(&self) -> Result<(), HostError>;

    /// Invoke the well-known bootstrap function `(string) -> i32` located by
    /// the (assembly, class, function) triple, passing `argument` through.
    ///
    /// On a positive result the embedded side has deposited the requested
    /// callback into `slot`; the status itself cannot carry it.
    fn execute_bootstrap(
        &self,
        assembly: &Path,
        class: &str,
        function: &str,
        argument: &str,
        slot: &ValueSlot,
    ) -> Result<i32, HostError>;
}

/// Factory for the meta host, called at most once per manager lifetime.
pub type MetaHostProvider =
    Box<dyn Fn() -> Result<Arc<dyn MetaHost>, HostError> + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_shutdown() {}
    fn other_shutdown() {
        tracing::trace!("replacement shutdown");
    }

    #[test]
    fn slot_is_take_once() {
        let slot = ValueSlot::new();
        assert!(slot.take().is_none());

        slot.deposit(EntryPoint::Shutdown(noop_shutdown));
        assert!(slot.take().is_some());
        assert!(slot.take().is_none(), "take must empty the slot");
    }

    #[test]
    fn slot_keeps_only_most_recent_deposit() {
        let slot = ValueSlot::new();
        slot.deposit(EntryPoint::Shutdown(noop_shutdown));
        slot.deposit(EntryPoint::Shutdown(other_shutdown));

        let taken = slot.take().unwrap();
        assert_eq!(taken.addr(), other_shutdown as usize);
    }
}

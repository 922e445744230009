use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use crate::error::HostError;
use crate::platform::{
    EntryPoint, HandleRequestFn, RuntimeHandle, ShutdownFn, ValueSlot, WakeupFn,
};

/// The three entry points the bridge resolves from the embedded side.
///
/// A closed set: the bootstrap protocol knows exactly these names, each
/// with its own callback signature, and nothing else is ever looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPointName {
    Shutdown,
    Handle,
    Wakeup,
}

impl EntryPointName {
    /// The string argument passed to the bootstrap function.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryPointName::Shutdown => "Shutdown",
            EntryPointName::Handle => "Handle",
            EntryPointName::Wakeup => "Wakeup",
        }
    }
}

/// The fully-resolved entry point table. Populated exactly once; read-only
/// and safe to share across dispatch threads thereafter.
#[derive(Debug, Clone, Copy)]
pub struct EntryPoints {
    pub shutdown: ShutdownFn,
    pub wakeup: WakeupFn,
    pub handle_request: HandleRequestFn,
}

/// Locates the bootstrap function on the embedded side.
#[derive(Debug, Clone)]
pub struct AssemblyLocator {
    /// Full path to the embedded-side bootstrap assembly.
    pub assembly_path: PathBuf,
    /// Namespace-qualified class holding the bootstrap function.
    pub entry_class: String,
    /// Bootstrap function name; must have the `(string) -> i32` shape.
    pub bootstrap_function: String,
}

/// Performs the one-time bootstrap handshake that turns the three logical
/// names into callable pointers.
///
/// The resolver owns the [`ValueSlot`] hand-off: each bootstrap call
/// deposits one callback there, and the resolver takes it immediately
/// after the call returns. Once the table is populated further `resolve`
/// calls are no-ops returning the cached table.
pub struct FunctionTableResolver {
    slot: ValueSlot,
    table: OnceLock<EntryPoints>,
    /// Kept as soon as the Shutdown entry resolves, even when a later step
    /// fails and the full table never materializes.
    partial_shutdown: Mutex<Option<ShutdownFn>>,
}

impl FunctionTableResolver {
    pub fn new() -> Self {
        Self {
            slot: ValueSlot::new(),
            table: OnceLock::new(),
            partial_shutdown: Mutex::new(None),
        }
    }

    /// The resolved table, if resolution has completed.
    pub fn entry_points(&self) -> Option<&EntryPoints> {
        self.table.get()
    }

    /// The embedded shutdown callback, if it resolved — including after a
    /// partially failed resolution. Shutdown paths consult this rather
    /// than the full table so the embedded side is still signalled when
    /// setup died after the Shutdown entry came back.
    pub fn resolved_shutdown(&self) -> Option<ShutdownFn> {
        *self
            .partial_shutdown
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Resolve all three entry points through `host`.
    ///
    /// The shutdown callback is resolved first and retained even when a
    /// later step fails, so a partially-resolved embedded side can still
    /// be shut down cleanly. Each logical name costs one bootstrap call; a
    /// result below 1 means the embedded side could not find the callback
    /// even though the call itself succeeded. Any failure is terminal for
    /// this attempt — there is no internal retry, and a later attempt
    /// restarts the handshake from the beginning (only the retained
    /// shutdown callback survives a failed attempt).
    pub fn resolve(
        &self,
        host: &dyn RuntimeHandle,
        locator: &AssemblyLocator,
    ) -> Result<&EntryPoints, HostError> {
        if let Some(table) = self.table.get() {
            tracing::debug!("entry point table already resolved");
            return Ok(table);
        }

        let EntryPoint::Shutdown(shutdown) =
            self.resolve_one(host, locator, EntryPointName::Shutdown)?
        else {
            return Err(self.mismatch(EntryPointName::Shutdown));
        };
        *self
            .partial_shutdown
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(shutdown);

        let EntryPoint::Handle(handle_request) =
            self.resolve_one(host, locator, EntryPointName::Handle)?
        else {
            return Err(self.mismatch(EntryPointName::Handle));
        };

        let EntryPoint::Wakeup(wakeup) =
            self.resolve_one(host, locator, EntryPointName::Wakeup)?
        else {
            return Err(self.mismatch(EntryPointName::Wakeup));
        };

        let table = EntryPoints {
            shutdown,
            wakeup,
            handle_request,
        };
        tracing::info!(
            shutdown = format_args!("{:#x}", shutdown as usize),
            handle = format_args!("{:#x}", handle_request as usize),
            wakeup = format_args!("{:#x}", wakeup as usize),
            "entry point table resolved"
        );
        Ok(self.table.get_or_init(|| table))
    }

    /// The embedded side deposited a callback of the wrong shape for
    /// `name`; indistinguishable from an empty slot as far as the caller
    /// is concerned.
    fn mismatch(&self, name: EntryPointName) -> HostError {
        tracing::warn!(
            name = name.as_str(),
            "bootstrap deposited a mismatched callback shape"
        );
        HostError::ChannelMiss(name.as_str())
    }

    fn resolve_one(
        &self,
        host: &dyn RuntimeHandle,
        locator: &AssemblyLocator,
        name: EntryPointName,
    ) -> Result<EntryPoint, HostError> {
        tracing::debug!(name = name.as_str(), "issuing bootstrap call");
        let result = host.execute_bootstrap(
            &locator.assembly_path,
            &locator.entry_class,
            &locator.bootstrap_function,
            name.as_str(),
            &self.slot,
        )?;

        // The embedded side signals "not found" through the result value,
        // not through the call's own error channel.
        if result < 1 {
            return Err(HostError::BootstrapRejected {
                name: name.as_str(),
                result,
            });
        }

        // The status is only 32 bits wide; the actual pointer-sized value
        // travels through the slot and must be there by now.
        self.slot
            .take()
            .ok_or(HostError::ChannelMiss(name.as_str()))
    }
}

impl Default for FunctionTableResolver {
    fn default() -> Self {
        Self::new()
    }
}

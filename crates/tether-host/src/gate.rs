//! Exactly-once setup and the top-level bridge façade.
//!
//! `InitializationGate` is a mutex-guarded state machine: the first caller
//! runs setup while later callers block on the lock and then observe the
//! winner's outcome, so concurrent first requests can never race through
//! partially-initialized state.

use std::path::PathBuf;
use std::sync::Mutex;

use crate::config::{BridgeConfig, SetupRetry};
use crate::dispatch::{DispatchTracker, RequestDispatcher, RequestView, send_plain_header, write_text};
use crate::error::{DispatchOutcome, HostError};
use crate::hosting::RuntimeHostManager;
use crate::platform::MetaHostProvider;
use crate::resolver::{AssemblyLocator, FunctionTableResolver};

#[derive(Debug, Clone)]
enum SetupState {
    Unattempted,
    Ready,
    Failed(HostError),
}

/// Ensures the runtime start and entry-point resolution run exactly once
/// (or once per request under the `PerRequest` retry policy).
pub struct InitializationGate {
    state: Mutex<SetupState>,
    policy: SetupRetry,
}

impl InitializationGate {
    pub fn new(policy: SetupRetry) -> Self {
        Self {
            state: Mutex::new(SetupState::Unattempted),
            policy,
        }
    }

    /// Run `setup` if no attempt has concluded yet; otherwise return the
    /// cached outcome.
    ///
    /// Under `OneShot` a failure is sticky until process restart. Under
    /// `PerRequest` a failed state re-attempts on the next call. On any
    /// failure (fresh or cached) with a request supplied, diagnostic text
    /// is written to the requester before returning.
    pub fn ensure_ready<F>(
        &self,
        request: Option<&RequestView<'_>>,
        setup: F,
    ) -> Result<(), HostError>
    where
        F: FnOnce() -> Result<(), HostError>,
    {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        match &*state {
            SetupState::Ready => return Ok(()),
            SetupState::Failed(err) => {
                let retry = self.policy == SetupRetry::PerRequest;
                if !retry {
                    let err = err.clone();
                    Self::emit_failure_diagnostics(request, &err);
                    return Err(err);
                }
                tracing::debug!("re-attempting setup under per-request policy");
            }
            SetupState::Unattempted => {}
        }

        match setup() {
            Ok(()) => {
                *state = SetupState::Ready;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(code = format_args!("0x{:08X}", err.code()), %err, "setup failed");
                Self::emit_failure_diagnostics(request, &err);
                *state = SetupState::Failed(err.clone());
                Err(err)
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(
            &*self.state.lock().unwrap_or_else(|e| e.into_inner()),
            SetupState::Ready
        )
    }

    fn emit_failure_diagnostics(request: Option<&RequestView<'_>>, err: &HostError) {
        let Some(request) = request else { return };
        send_plain_header(request);
        write_text(request, "Setup failed. See the code below.\r\n");
        write_text(request, &err.to_string());
        write_text(request, &format!("\r\nCode 0x{:X}", err.code()));
    }
}

/// The bridge: owns the gate, manager, resolver and dispatcher, and is the
/// single type host glue talks to.
///
/// One instance per process is the intended shape; all methods take `&self`
/// and are safe to call from concurrent worker threads.
pub struct BridgeHost {
    config: BridgeConfig,
    locator: AssemblyLocator,
    base_dir: PathBuf,
    manager: RuntimeHostManager,
    resolver: FunctionTableResolver,
    gate: InitializationGate,
    dispatcher: RequestDispatcher,
    tracker: DispatchTracker,
}

impl BridgeHost {
    /// Build a bridge for the host module at `module_path`.
    ///
    /// The bootstrap assembly is expected next to the host module under the
    /// configured file name; `provider` is how the platform hands over its
    /// meta host (called lazily, on the first request).
    pub fn new(
        config: BridgeConfig,
        module_path: &str,
        provider: MetaHostProvider,
    ) -> anyhow::Result<Self> {
        let assembly_path = config.bootstrap_assembly_path(module_path);
        let base_dir = assembly_path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let locator = AssemblyLocator {
            assembly_path,
            entry_class: config.entry_class.clone(),
            bootstrap_function: config.bootstrap_function.clone(),
        };
        tracing::info!(
            assembly = %locator.assembly_path.display(),
            version = %config.runtime_version,
            "bridge host configured"
        );

        Ok(Self {
            gate: InitializationGate::new(config.setup_retry),
            manager: RuntimeHostManager::new(provider),
            resolver: FunctionTableResolver::new(),
            dispatcher: RequestDispatcher,
            tracker: DispatchTracker::default(),
            locator,
            base_dir,
            config,
        })
    }

    /// Run lazy setup if needed: start the runtime, resolve the entry point
    /// table, and wake the embedded side up with the host base directory.
    ///
    /// On a fresh failure, whatever was partially acquired is released
    /// again through [`BridgeHost::shutdown`]-equivalent handle release, so
    /// a later attempt (or process recycle) starts clean.
    pub fn ensure_ready(&self, request: Option<&RequestView<'_>>) -> Result<(), HostError> {
        let outcome = self.gate.ensure_ready(request, || {
            let runtime = self.manager.start(&self.config.runtime_version)?;
            let entry_points = self.resolver.resolve(runtime.as_ref(), &self.locator)?;

            // One implicit bootstrap use: tell the embedded side where it
            // lives. The reference flow ignores the returned error string
            // beyond logging it.
            if let Some(message) = (entry_points.wakeup)(&self.base_dir) {
                tracing::warn!(%message, "embedded wakeup reported an error");
            }
            tracing::info!("bridge setup complete");
            Ok(())
        });

        if outcome.is_err() {
            // A partially resolved shutdown callback must still be
            // signalled; the full table may never have materialized.
            self.manager.shutdown(self.resolver.resolved_shutdown());
        }
        outcome
    }

    /// Handle one inbound request end to end: lazy setup, then dispatch.
    ///
    /// Fails closed: if setup has failed (now or previously) the embedded
    /// handler is never invoked and the setup error comes back instead.
    pub fn handle_request(&self, request: &RequestView<'_>) -> Result<DispatchOutcome, HostError> {
        self.ensure_ready(Some(request))?;
        self.dispatch(request)
    }

    /// Dispatch without running setup. Fails closed when the entry point
    /// table has not been resolved.
    pub fn dispatch(&self, request: &RequestView<'_>) -> Result<DispatchOutcome, HostError> {
        let Some(entry_points) = self.resolver.entry_points() else {
            return Err(HostError::RuntimeUnavailable);
        };
        let _guard = self.tracker.begin();
        Ok(self.dispatcher.dispatch(entry_points, request))
    }

    pub fn is_started(&self) -> bool {
        self.manager.is_started()
    }

    /// Orderly shutdown: wait out in-flight dispatches, signal the embedded
    /// shutdown callback if one was resolved, release all handles.
    ///
    /// Idempotent, never panics, and safe to call when setup never ran or
    /// failed part-way.
    pub fn shutdown(&self) {
        self.tracker.quiesce();
        self.manager.shutdown(self.resolver.resolved_shutdown());
    }
}

//! Embedded managed-runtime bridge.
//!
//! `tether-host` embeds a managed-code runtime inside a host process and
//! dispatches inbound requests into it through dynamically resolved
//! function pointers. The bridge provides lazy, exactly-once startup, a
//! one-time bootstrap handshake that resolves the embedded entry points
//! ({Shutdown, Handle, Wakeup}), per-request dispatch with fault isolation
//! so a crash on the embedded side never takes the host process down, and
//! orderly, reusable shutdown.
//!
//! The host protocol and the embedded runtime itself are collaborators
//! behind traits ([`ServerCallbacks`] and the [`platform`] traits); this
//! crate owns only the lifecycle and the boundary crossing.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use tether_host::{BridgeConfig, BridgeHost, DispatchOutcome, RequestView};
//!
//! # fn demo(provider: tether_host::MetaHostProvider,
//! #         request: &RequestView<'_>) -> anyhow::Result<()> {
//! let config = BridgeConfig::default();
//! let bridge = BridgeHost::new(config, "/srv/host/tether.so", provider)?;
//!
//! // Per request, from any worker thread. The first call runs setup.
//! match bridge.handle_request(request) {
//!     Ok(DispatchOutcome::Completed) => {}
//!     Ok(DispatchOutcome::Faulted { code, .. }) => {
//!         tracing::warn!(code, "request faulted on the embedded side");
//!     }
//!     Err(setup_error) => {
//!         tracing::error!(%setup_error, "bridge is unusable until restart");
//!     }
//! }
//!
//! // On host termination (or fatal setup failure):
//! bridge.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod hosting;
pub mod platform;
pub mod resolver;

pub use config::{BridgeConfig, SetupRetry};
pub use dispatch::{ConnectionId, EmbeddedFault, RequestDispatcher, RequestView, ServerCallbacks};
pub use error::{DispatchOutcome, FaultKind, HostError};
pub use gate::{BridgeHost, InitializationGate};
pub use hosting::RuntimeHostManager;
pub use platform::{
    EntryPoint, HandleRequestFn, MetaHost, MetaHostProvider, RuntimeHandle, RuntimeInfo,
    ShutdownFn, ValueSlot, WakeupFn,
};
pub use resolver::{AssemblyLocator, EntryPointName, EntryPoints, FunctionTableResolver};

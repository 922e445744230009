//! Per-request dispatch into the embedded runtime.
//!
//! This is the safety-critical boundary of the bridge: the one call that
//! crosses into the embedded side runs under a fault guard, and nothing
//! raised during it may unwind past [`RequestDispatcher::dispatch`]. The
//! guard wraps exactly that call, not the surrounding pipeline, so local
//! logic errors are not masked.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Condvar, Mutex};

use crate::error::{DispatchOutcome, FaultKind, codes};
use crate::resolver::EntryPoints;

/// Opaque per-request connection identifier handed through to the embedded
/// side and back into the server callbacks.
pub type ConnectionId = u64;

/// Capability functions the host protocol exposes for one request.
///
/// Implementations are supplied by the host glue; the bridge only forwards
/// them to the embedded handler and uses `write_client` /
/// `send_response_header` itself for plain-text diagnostics.
pub trait ServerCallbacks: Sync {
    /// Write response bytes to the requester; returns bytes written.
    fn write_client(&self, data: &[u8]) -> usize;

    /// Read more request body into `buf`; `None` on failure, else bytes read.
    fn read_client(&self, buf: &mut [u8]) -> Option<usize>;

    /// Look up a server variable by name.
    fn server_variable(&self, name: &str) -> Option<String>;

    /// Generic support function; used at minimum to send response headers.
    fn send_response_header(&self, header: &str) -> bool;
}

/// Borrowed view over one inbound request.
///
/// Lives only for the duration of one dispatch call and is never retained
/// past it.
pub struct RequestView<'a> {
    pub connection_id: ConnectionId,
    pub method: &'a str,
    pub query_string: &'a str,
    pub path_info: &'a str,
    pub path_translated: &'a str,
    pub content_type: &'a str,
    /// Total body length announced by the protocol.
    pub total_bytes: u32,
    /// Body bytes already buffered by the host (the `body` slice).
    pub available_bytes: u32,
    pub body: &'a [u8],
    pub callbacks: &'a dyn ServerCallbacks,
}

/// Structured fault payload raised by the embedded side.
///
/// An embedded handler (or a test stand-in) signals a hardware-class fault
/// by panicking with this payload; the dispatcher recovers the raw code
/// from it. A panic with any other payload is an unclassified fault.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedFault(pub u32);

/// Send the minimal plain-text header used for diagnostic output.
pub(crate) fn send_plain_header(request: &RequestView<'_>) {
    request.callbacks.send_response_header("Content-type: text/plain\n\n");
}

pub(crate) fn write_text(request: &RequestView<'_>, text: &str) {
    request.callbacks.write_client(text.as_bytes());
}

/// Invokes the resolved `HandleRequest` entry point under the fault guard.
pub struct RequestDispatcher;

impl RequestDispatcher {
    /// Dispatch one request into the embedded runtime.
    ///
    /// A non-faulting call is `Completed` regardless of what the embedded
    /// side wrote back; a fault is intercepted, reported to the requester
    /// as diagnostic text, and returned as `Faulted`. The host process
    /// survives either way.
    pub fn dispatch(
        &self,
        entry_points: &EntryPoints,
        request: &RequestView<'_>,
    ) -> DispatchOutcome {
        let handler = entry_points.handle_request;
        let result = catch_unwind(AssertUnwindSafe(|| handler(request)));

        let payload = match result {
            Ok(()) => return DispatchOutcome::Completed,
            Err(payload) => payload,
        };

        let code = payload
            .downcast_ref::<EmbeddedFault>()
            .map(|fault| fault.0)
            .unwrap_or(codes::FAULT_UNCLASSIFIED);
        let kind = FaultKind::classify(code);

        tracing::warn!(
            connection = request.connection_id,
            code = format_args!("0x{code:08X}"),
            kind = kind.describe(),
            "embedded call faulted"
        );

        send_plain_header(request);
        write_text(request, "Call into the embedded runtime failed\r\n");
        write_text(request, kind.describe());
        write_text(request, &format!("\r\nCode 0x{code:X}"));

        DispatchOutcome::Faulted { code, kind }
    }
}

/// Counts in-flight dispatches so shutdown can quiesce before releasing
/// runtime handles out from under a live call.
#[derive(Default)]
pub(crate) struct DispatchTracker {
    in_flight: Mutex<usize>,
    idle: Condvar,
}

pub(crate) struct DispatchGuard<'a> {
    tracker: &'a DispatchTracker,
}

impl DispatchTracker {
    pub(crate) fn begin(&self) -> DispatchGuard<'_> {
        let mut count = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        *count += 1;
        DispatchGuard { tracker: self }
    }

    /// Block until no dispatch is in flight. New dispatches started after
    /// this returns are the caller's problem; the bridge only quiesces
    /// during shutdown, when the host has stopped feeding requests.
    pub(crate) fn quiesce(&self) {
        let mut count = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        while *count > 0 {
            count = self
                .idle
                .wait(count)
                .unwrap_or_else(|e| e.into_inner());
        }
    }
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        let mut count = self
            .tracker
            .in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *count -= 1;
        if *count == 0 {
            self.tracker.idle.notify_all();
        }
    }
}

use thiserror::Error;

/// Raw result codes surfaced by the hosting layer and the bootstrap call.
///
/// These are the wire-level values the platform reports; [`HostError::from_raw`]
/// maps them onto the typed taxonomy and [`HostError::code`] maps back, so a
/// code seen in a diagnostic line can be matched against this table.
pub mod codes {
    /// Hosting layer is not available in this process.
    pub const RUNTIME_UNAVAILABLE: u32 = 0x8013_0015;
    /// The bootstrap call timed out on the embedded side.
    pub const CALL_TIMEOUT: u32 = 0x8013_0016;
    /// The calling thread does not own the lock for the call.
    pub const NOT_OWNER: u32 = 0x8013_0017;
    /// The bootstrap call was abandoned mid-flight.
    pub const CALL_ABANDONED: u32 = 0x8013_0018;
    /// Unspecified failure reported by the embedded side.
    pub const GENERIC_FAILURE: u32 = 0x8000_4005;
    /// Bootstrap assembly file was not found.
    pub const ASSEMBLY_NOT_FOUND: u32 = 0x8007_0002;
    /// Bootstrap assembly was found but could not be loaded.
    pub const ASSEMBLY_LOAD: u32 = 0x8013_1621;
    /// Unexpected end of input while reading the assembly.
    pub const END_OF_STREAM: u32 = 0x8007_0026;
    /// A directory on the assembly path does not exist.
    pub const DIRECTORY_NOT_FOUND: u32 = 0x8007_0003;
    /// Assembly path exceeds the platform limit.
    pub const PATH_TOO_LONG: u32 = 0x8007_00CE;
    /// I/O failure while reading the assembly.
    pub const IO_ERROR: u32 = 0x8013_1620;
    /// Width or conversion mismatch marshaling across the boundary.
    pub const MARSHAL_OVERFLOW: u32 = 0x8013_1516;
    /// Entry class or bootstrap function was not found on the embedded side.
    pub const BOOTSTRAP_REJECTED: u32 = 0x8013_1522;
    /// The requested runtime version cannot be loaded into this process.
    pub const NOT_LOADABLE: u32 = 0x8013_1022;
    /// The value channel was empty after a successful bootstrap call.
    pub const CHANNEL_MISS: u32 = 0x8000_4021;

    /// Structured fault codes observed during dispatch.
    pub const FAULT_ACCESS_VIOLATION: u32 = 0xC000_0005;
    pub const FAULT_INT_DIVIDE_BY_ZERO: u32 = 0xC000_0094;
    pub const FAULT_INT_OVERFLOW: u32 = 0xC000_0095;
    pub const FAULT_FLT_DIVIDE_BY_ZERO: u32 = 0xC000_008E;
    pub const FAULT_STACK_OVERFLOW: u32 = 0xC000_00FD;
    /// Unhandled exception escaping the embedded runtime.
    pub const FAULT_EMBEDDED_RUNTIME: u32 = 0xE043_4352;
    /// Catch-all for an unwind with no structured code attached.
    pub const FAULT_UNCLASSIFIED: u32 = 0xE06D_7363;
}

/// Any failure acquiring or starting the embedded runtime, or resolving its
/// entry points. Setup errors never propagate past the initialization gate;
/// they are cached there and reported to the requester as diagnostic text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("embedded runtime is not available in this process")]
    RuntimeUnavailable,

    #[error("bootstrap call timed out")]
    CallTimeout,

    #[error("calling thread does not own the bootstrap lock")]
    NotOwner,

    #[error("bootstrap call was abandoned")]
    CallAbandoned,

    #[error("embedded side reported an unspecified failure")]
    GenericFailure,

    #[error("bootstrap assembly not found (check path and permissions)")]
    AssemblyNotFound,

    #[error("bootstrap assembly could not be loaded (check path and permissions)")]
    AssemblyLoad,

    #[error("unexpected end of input reading the bootstrap assembly")]
    UnexpectedEndOfStream,

    #[error("directory on the assembly path not found")]
    DirectoryNotFound,

    #[error("assembly path too long")]
    PathTooLong,

    #[error("I/O error reading the bootstrap assembly")]
    Io,

    #[error("marshaling width mismatch (check 32/64-bit setup)")]
    MarshalOverflow,

    #[error("embedded side reported '{name}' not found (bootstrap result {result})")]
    BootstrapRejected { name: &'static str, result: i32 },

    #[error("runtime version {0:?} cannot be loaded into this process")]
    NotLoadable(String),

    #[error("value channel was empty after bootstrap call for '{0}'")]
    ChannelMiss(&'static str),

    #[error("unclassified hosting error 0x{0:08X}")]
    Unclassified(u32),
}

impl HostError {
    /// Map a raw hosting-layer result code onto the taxonomy.
    ///
    /// Codes without a dedicated variant come back as [`HostError::Unclassified`]
    /// carrying the raw value.
    pub fn from_raw(code: u32) -> Self {
        match code {
            codes::RUNTIME_UNAVAILABLE => Self::RuntimeUnavailable,
            codes::CALL_TIMEOUT => Self::CallTimeout,
            codes::NOT_OWNER => Self::NotOwner,
            codes::CALL_ABANDONED => Self::CallAbandoned,
            codes::GENERIC_FAILURE => Self::GenericFailure,
            codes::ASSEMBLY_NOT_FOUND => Self::AssemblyNotFound,
            codes::ASSEMBLY_LOAD => Self::AssemblyLoad,
            codes::END_OF_STREAM => Self::UnexpectedEndOfStream,
            codes::DIRECTORY_NOT_FOUND => Self::DirectoryNotFound,
            codes::PATH_TOO_LONG => Self::PathTooLong,
            codes::IO_ERROR => Self::Io,
            codes::MARSHAL_OVERFLOW => Self::MarshalOverflow,
            other => Self::Unclassified(other),
        }
    }

    /// The raw code for this error, suitable for the hex diagnostic line.
    pub fn code(&self) -> u32 {
        match self {
            Self::RuntimeUnavailable => codes::RUNTIME_UNAVAILABLE,
            Self::CallTimeout => codes::CALL_TIMEOUT,
            Self::NotOwner => codes::NOT_OWNER,
            Self::CallAbandoned => codes::CALL_ABANDONED,
            Self::GenericFailure => codes::GENERIC_FAILURE,
            Self::AssemblyNotFound => codes::ASSEMBLY_NOT_FOUND,
            Self::AssemblyLoad => codes::ASSEMBLY_LOAD,
            Self::UnexpectedEndOfStream => codes::END_OF_STREAM,
            Self::DirectoryNotFound => codes::DIRECTORY_NOT_FOUND,
            Self::PathTooLong => codes::PATH_TOO_LONG,
            Self::Io => codes::IO_ERROR,
            Self::MarshalOverflow => codes::MARSHAL_OVERFLOW,
            Self::BootstrapRejected { .. } => codes::BOOTSTRAP_REJECTED,
            Self::NotLoadable(_) => codes::NOT_LOADABLE,
            Self::ChannelMiss(_) => codes::CHANNEL_MISS,
            Self::Unclassified(code) => *code,
        }
    }
}

/// Coarse classification of a structured fault intercepted during dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    AccessViolation,
    Arithmetic,
    StackOverflow,
    /// An unhandled exception escaped the embedded runtime itself.
    EmbeddedRuntime,
    Unknown,
}

impl FaultKind {
    pub fn classify(code: u32) -> Self {
        match code {
            codes::FAULT_ACCESS_VIOLATION => Self::AccessViolation,
            codes::FAULT_INT_DIVIDE_BY_ZERO
            | codes::FAULT_INT_OVERFLOW
            | codes::FAULT_FLT_DIVIDE_BY_ZERO => Self::Arithmetic,
            codes::FAULT_STACK_OVERFLOW => Self::StackOverflow,
            codes::FAULT_EMBEDDED_RUNTIME => Self::EmbeddedRuntime,
            _ => Self::Unknown,
        }
    }

    /// Diagnostic label written to the requester after a fault.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::AccessViolation => "ACCESS_VIOLATION",
            Self::Arithmetic => "ARITHMETIC_FAULT",
            Self::StackOverflow => "STACK_OVERFLOW",
            Self::EmbeddedRuntime => "EMBEDDED_RUNTIME_FAULT",
            Self::Unknown => "UNKNOWN_FAULT",
        }
    }
}

/// Result of one dispatch into the embedded runtime.
///
/// `Completed` says only that the call returned without faulting; what the
/// embedded side wrote back to the requester is invisible to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Completed,
    Faulted { code: u32, kind: FaultKind },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_codes_round_trip() {
        for code in [
            codes::RUNTIME_UNAVAILABLE,
            codes::CALL_TIMEOUT,
            codes::NOT_OWNER,
            codes::CALL_ABANDONED,
            codes::GENERIC_FAILURE,
            codes::ASSEMBLY_NOT_FOUND,
            codes::ASSEMBLY_LOAD,
            codes::END_OF_STREAM,
            codes::DIRECTORY_NOT_FOUND,
            codes::PATH_TOO_LONG,
            codes::IO_ERROR,
            codes::MARSHAL_OVERFLOW,
        ] {
            assert_eq!(HostError::from_raw(code).code(), code);
        }
    }

    #[test]
    fn unknown_code_carries_raw_value() {
        let err = HostError::from_raw(0xDEAD_BEEF);
        assert_eq!(err, HostError::Unclassified(0xDEAD_BEEF));
        assert_eq!(err.code(), 0xDEAD_BEEF);
    }

    #[test]
    fn fault_classification() {
        assert_eq!(
            FaultKind::classify(codes::FAULT_ACCESS_VIOLATION),
            FaultKind::AccessViolation
        );
        assert_eq!(
            FaultKind::classify(codes::FAULT_INT_DIVIDE_BY_ZERO),
            FaultKind::Arithmetic
        );
        assert_eq!(
            FaultKind::classify(codes::FAULT_STACK_OVERFLOW),
            FaultKind::StackOverflow
        );
        assert_eq!(
            FaultKind::classify(codes::FAULT_EMBEDDED_RUNTIME),
            FaultKind::EmbeddedRuntime
        );
        assert_eq!(FaultKind::classify(0x1234), FaultKind::Unknown);
    }
}

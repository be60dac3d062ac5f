use std::collections::TryReserveError;
use std::ffi::{c_char, CString};
use thiserror::Error;

/// Error codes for FFI operations
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostErrorCode {
    Success = 0,
    InvalidParameters = 1000,
    InvalidState = 1001,
    OutOfMemory = 6000,
    InitializationFailure = 7000,
    RuntimeError = 7001,
    ConfigError = 8000,
}

/// Rust-side error types
#[derive(Error, Debug)]
pub enum HostError {
    #[error("out of memory while building the argument vector")]
    OutOfMemory,

    #[error("invalid argument at index {index}: {reason}")]
    InvalidArgument { index: usize, reason: String },

    #[error("node initialization failed: {reason}")]
    InitializationFailure { reason: String },

    #[error("invalid host state: expected {expected}, found {actual}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("runtime error: {message}")]
    Runtime { message: String },

    #[error("configuration error: {message}")]
    Config { message: String },
}

impl HostError {
    pub fn code(&self) -> HostErrorCode {
        match self {
            HostError::OutOfMemory => HostErrorCode::OutOfMemory,
            HostError::InvalidArgument { .. } => HostErrorCode::InvalidParameters,
            HostError::InitializationFailure { .. } => HostErrorCode::InitializationFailure,
            HostError::InvalidState { .. } => HostErrorCode::InvalidState,
            HostError::Runtime { .. } => HostErrorCode::RuntimeError,
            HostError::Config { .. } => HostErrorCode::ConfigError,
        }
    }
}

impl From<TryReserveError> for HostError {
    fn from(_: TryReserveError) -> Self {
        HostError::OutOfMemory
    }
}

pub type Result<T> = std::result::Result<T, HostError>;

/// C-compatible error out-parameter
///
/// `message` is owned by the library and must be released with
/// `teo_error_message_free`.
#[repr(C)]
pub struct TeoError {
    pub code: i32,
    pub message: *const c_char,
}

impl TeoError {
    pub fn empty() -> Self {
        Self {
            code: HostErrorCode::Success as i32,
            message: std::ptr::null(),
        }
    }
}

impl Default for TeoError {
    fn default() -> Self {
        Self::empty()
    }
}

/// Fill `err` (if non-null) and return the numeric code
pub(crate) fn set_error(err: *mut TeoError, error: &HostError) -> i32 {
    let code = error.code() as i32;
    if err.is_null() {
        return code;
    }
    // Display output never contains NUL, the fallback is only for safety
    let message = CString::new(error.to_string())
        .unwrap_or_else(|_| CString::from(c"teo_host error"));
    unsafe {
        (*err).code = code;
        (*err).message = message.into_raw();
    }
    code
}

/// FFI error handling functions
pub mod ffi {
    use super::*;

    /// Release the message of a `TeoError` filled by this library
    ///
    /// The message pointer is reset, so calling this twice is a no-op.
    ///
    /// # Safety
    ///
    /// `err` must be null or point to a `TeoError` whose message was produced
    /// by this library (or is null).
    #[no_mangle]
    pub unsafe extern "C" fn teo_error_message_free(err: *mut TeoError) {
        if err.is_null() {
            return;
        }
        let message = (*err).message;
        if !message.is_null() {
            drop(CString::from_raw(message as *mut c_char));
            (*err).message = std::ptr::null();
        }
    }
}

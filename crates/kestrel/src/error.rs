//! Error taxonomy shared by the compiler and the runtime executor.
//!
//! Every class is unrecoverable at this layer: a failed pass, selection, or
//! launch aborts the compilation or execution step that triggered it. The
//! message always names the offending op type, variable, or kernel alias so
//! the failing stage can be identified from the diagnostic alone.

use thiserror::Error;

/// Fatal failure raised by the compiler core or the runtime executor.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid graph structure: cycle introduction, unresolved operand.
    #[error("ir integrity violation: {0}")]
    IrIntegrity(String),
    /// No kernel found for an operation, or an explicit alias did not match.
    #[error("kernel selection failure: {0}")]
    Selection(String),
    /// Unsupported variable type or missing variable lookup.
    #[error("workspace failure: {0}")]
    Workspace(String),
    /// An allocator or device backend call did not succeed.
    #[error("device failure: {0}")]
    Device(String),
    /// Misuse of the compilation API, e.g. a duplicate `build` call.
    #[error("compilation failure: {0}")]
    Compile(String),
}

impl Error {
    pub fn ir_integrity(message: impl Into<String>) -> Self {
        Error::IrIntegrity(message.into())
    }

    pub fn selection(message: impl Into<String>) -> Self {
        Error::Selection(message.into())
    }

    pub fn workspace(message: impl Into<String>) -> Self {
        Error::Workspace(message.into())
    }

    pub fn device(message: impl Into<String>) -> Self {
        Error::Device(message.into())
    }

    pub fn compile(message: impl Into<String>) -> Self {
        Error::Compile(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

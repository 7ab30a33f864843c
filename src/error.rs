//! Error and warning types for page rendering.
//!
//! Rendering is best-effort: most problems inside a content stream are
//! reported as [`RenderWarnMsg`] records and the interpreter keeps going.
//! [`RenderError`] is reserved for conditions that end the current render
//! (cancellation, an unusable page object).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

/// Hard failure of a page render.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The requested page index does not exist in the document.
    #[error("page {0} not found")]
    PageNotFound(usize),
    /// A required dictionary field is missing or malformed.
    #[error("validation: {0}")]
    Validation(String),
    /// A stream could not be decoded.
    #[error("decode: {0}")]
    Decode(String),
    /// A named resource could not be resolved.
    #[error("resource not found: {0}")]
    Resource(String),
    /// The file uses a feature this crate does not implement.
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// The caller cancelled the render.
    #[error("render cancelled")]
    Cancelled,
    /// An internal invariant did not hold.
    #[error("internal: {0}")]
    Internal(String),
    /// Error bubbled up from the object parser.
    #[error(transparent)]
    Pdf(#[from] lopdf::Error),
}

/// A non-fatal problem encountered while executing a content stream.
///
/// `op_id` is the index of the operation inside the decoded content stream
/// that triggered the message.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RenderWarnMsg {
    pub page: usize,
    pub op_id: usize,
    pub severity: &'static str,
    pub msg: String,
}

impl RenderWarnMsg {
    pub const ERROR: &'static str = "error";
    pub const WARNING: &'static str = "warning";
    pub const INFO: &'static str = "info";

    pub fn error(page: usize, op_id: usize, e: String) -> Self {
        RenderWarnMsg { page, op_id, severity: Self::ERROR, msg: e }
    }

    pub fn warning(page: usize, op_id: usize, e: String) -> Self {
        RenderWarnMsg { page, op_id, severity: Self::WARNING, msg: e }
    }

    pub fn info(page: usize, op_id: usize, e: String) -> Self {
        RenderWarnMsg { page, op_id, severity: Self::INFO, msg: e }
    }
}

/// Caller-supplied cancellation signal, checked at row and patch boundaries
/// of long decodes. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// `Err(RenderError::Cancelled)` once the flag is set.
    pub fn check(&self) -> Result<(), RenderError> {
        if self.is_cancelled() {
            Err(RenderError::Cancelled)
        } else {
            Ok(())
        }
    }
}

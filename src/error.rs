//! Error types for the HAL.
//!
//! Only unrecoverable conditions surface as [`GfxError`]. Recoverable misuse
//! (a draw recorded outside a render pass, a type-mismatched descriptor bind)
//! is logged through `log::error!` and the offending call is skipped, so a
//! single bad command does not abort an entire frame.

use thiserror::Error;

/// Errors that can occur in the graphics HAL.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GfxError {
    /// Failed to initialize a backend device.
    #[error("device initialization failed: {0}")]
    InitializationFailed(String),
    /// Failed to create a resource.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    /// An invalid parameter was provided to a creation call.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// A requested feature is not supported by the active backend.
    #[error("feature not supported: {0}")]
    FeatureNotSupported(String),
    /// Out of GPU memory.
    #[error("out of GPU memory")]
    OutOfMemory,
    /// Queue submission failed. Fatal for the current frame; the device
    /// should be torn down and recreated.
    #[error("queue submission failed: {0}")]
    SubmitFailed(String),
    /// The GPU device was lost.
    #[error("GPU device lost")]
    DeviceLost,
    /// The swapchain image is out of date and must be recreated by the
    /// surface owner.
    #[error("swapchain out of date")]
    SwapchainOutOfDate,
}

/// Convenience alias used throughout the crate.
pub type GfxResult<T> = Result<T, GfxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(GfxError::OutOfMemory.to_string(), "out of GPU memory");
        assert_eq!(
            GfxError::SubmitFailed("vkQueueSubmit: ERROR_DEVICE_LOST".into()).to_string(),
            "queue submission failed: vkQueueSubmit: ERROR_DEVICE_LOST"
        );
    }
}

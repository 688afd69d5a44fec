//! Error Types
//!
//! This module defines the error types used throughout the crate.
//!
//! # Overview
//!
//! The main error type [`KilnError`] covers all failure modes including:
//! - Pixel-format capability exhaustion
//! - Source image validation and compression failures
//! - Frame-ring state and synchronization failures
//! - Staging allocator overflow
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for `std::result::Result<T, KilnError>`.
//!
//! ```rust,ignore
//! use kiln::errors::{KilnError, Result};
//!
//! fn ingest_texture() -> Result<()> {
//!     // Operations that may fail return Result
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::format::{ColorSpace, PixelFormat};

/// The main error type for the kiln core.
///
/// This enum covers all possible error conditions that can occur
/// during texture ingestion and frame submission. Each variant provides
/// specific context about what went wrong.
#[derive(Error, Debug)]
pub enum KilnError {
    // ========================================================================
    // Format Negotiation Errors
    // ========================================================================
    /// No uncompressed pixel format worked for any channel count.
    ///
    /// This signals a backend capability-table defect, not a data problem.
    /// It aborts creation of that one texture and is non-fatal to the process.
    #[error(
        "no supported uncompressed format for '{name}' ({channels} channels, {colorspace:?})"
    )]
    NoSupportedFormat {
        /// Name of the texture being ingested
        name: String,
        /// Channel count of the request that exhausted the fallback chain
        channels: u8,
        /// Colorspace of the final (Linear) retry
        colorspace: ColorSpace,
    },

    // ========================================================================
    // Image & Compression Errors
    // ========================================================================
    /// The source image's dimensions, channel count or byte length are inconsistent.
    #[error("invalid source image: {0}")]
    InvalidImage(String),

    /// The block compressor failed (or produced a wrongly sized buffer) for a format
    /// it advertised.
    #[error("runtime compression to {format:?} failed for '{name}'")]
    CompressionFailed {
        /// Target compressed format
        format: PixelFormat,
        /// Name of the texture being ingested
        name: String,
    },

    // ========================================================================
    // Backend Errors
    // ========================================================================
    /// The backend refused to create a GPU resource.
    #[error("backend resource creation failed: {0}")]
    BackendCreation(String),

    /// A texture level upload was rejected by the backend.
    #[error("texture upload failed: {0}")]
    UploadFailed(String),

    /// A fence wait failed or timed out. Fatal at the render-context level;
    /// escalates to a full backend reinitialization.
    #[error("device lost: {0}")]
    DeviceLost(String),

    /// The surface is suboptimal or out of date. The swapchain and the frame
    /// resource ring must both be recreated; partial recovery is disallowed.
    #[error("swapchain out of date; full recreation required")]
    SwapchainOutOfDate,

    // ========================================================================
    // Frame Ring Errors
    // ========================================================================
    /// A frame-ring call arrived in the wrong slot state (e.g. `submit_frame`
    /// without a preceding `begin_frame`).
    #[error("frame ring state error: {0}")]
    FrameState(String),

    /// A per-frame descriptor pool exceeded its fixed allocation count.
    ///
    /// Pools are sized at initialization; exceeding capacity is a fatal
    /// configuration error, not a case of dynamic growth.
    #[error("descriptor pool exhausted ({allocated} allocated, capacity {capacity})")]
    DescriptorPoolExhausted {
        /// Sets allocated so far this frame
        allocated: u32,
        /// Fixed pool capacity
        capacity: u32,
    },

    // ========================================================================
    // Staging Allocator Errors
    // ========================================================================
    /// A staging-ring allocation would overlap GPU-pending memory.
    ///
    /// The ring is undersized for the workload; this is a configuration
    /// error, never something the allocator resolves by blocking.
    #[error(
        "staging ring overflow: {requested} bytes (align {align}) do not fit, capacity {capacity}"
    )]
    StagingOverflow {
        /// Rounded-up request size in bytes
        requested: u64,
        /// Requested alignment
        align: u64,
        /// Total ring capacity
        capacity: u64,
    },
}

/// Alias for `Result<T, KilnError>`.
pub type Result<T> = std::result::Result<T, KilnError>;

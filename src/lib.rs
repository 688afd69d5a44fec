#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

//! Backend-agnostic GPU texture ingestion and frame-resource core.
//!
//! The crate is built from four pieces, leaves first:
//!
//! - [`format::FormatNegotiator`] — pixel-format negotiation against a
//!   backend capability oracle, including runtime block-compression
//!   selection per texture semantic.
//! - [`staging::StagingRing`] — a single circular host-visible allocation
//!   range shared by per-frame upload data.
//! - [`ingest::TextureIngestionPipeline`] — channel adjustment, downscale,
//!   mip planning, per-level compression and upload.
//! - [`frame::FrameResourceRing`] — an N-deep ring of per-frame resource
//!   bundles bounding CPU/GPU overlap, with fence-gated deferred deletion.
//!
//! Concrete GPU backends live outside this crate and plug in through the
//! traits in [`backend`]; a headless [`backend::null::NullBackend`] ships
//! for tests and capability-free environments.

pub mod backend;
pub mod compress;
pub mod context;
pub mod errors;
pub mod format;
pub mod frame;
pub mod image;
pub mod ingest;
pub mod staging;

pub use backend::{CapabilityOracle, DeviceBackend, TextureHandle};
pub use compress::{BlockCompressor, NoCompressor};
pub use context::{ContextSettings, RenderContext};
pub use errors::{KilnError, Result};
pub use format::{
    ColorSpace, FormatNegotiator, FormatUsage, PixelFormat, TargetClass, TextureSemantic,
};
pub use frame::{FrameResourceBundle, FrameResourceRing};
pub use image::{CompressedImage, SourceImage};
pub use ingest::TextureIngestionPipeline;
pub use staging::StagingRing;

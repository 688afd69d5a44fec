//! The render context facade.
//!
//! Owns the backend, the format negotiator (built once from the backend's
//! capabilities), the frame resource ring and the staging ring, and exposes
//! the surface the renderer consumes: `ingest`, `begin_frame` /
//! `submit_frame`, and `staging_alloc`.
//!
//! All calls come from the single render thread; concurrency is CPU/GPU
//! overlap, bounded by the ring depth.

use log::info;

use crate::backend::{CapabilityOracle, DeviceBackend, TextureHandle};
use crate::compress::BlockCompressor;
use crate::errors::Result;
use crate::format::{FormatNegotiator, TargetClass, TextureSemantic};
use crate::frame::{DEFAULT_DESCRIPTOR_SETS_PER_FRAME, FrameResourceBundle, FrameResourceRing};
use crate::image::SourceImage;
use crate::ingest::TextureIngestionPipeline;
use crate::staging::StagingRing;

/// Sizing knobs fixed at context creation.
#[derive(Debug, Clone, Copy)]
pub struct ContextSettings {
    /// Byte capacity of the circular host-staging buffer.
    pub staging_capacity: u64,
    /// Fixed descriptor-set capacity of each frame slot's pool.
    pub descriptor_sets_per_frame: u32,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            staging_capacity: 16 * 1024 * 1024,
            descriptor_sets_per_frame: DEFAULT_DESCRIPTOR_SETS_PER_FRAME,
        }
    }
}

/// The root object tying the subsystems together for one backend.
pub struct RenderContext {
    backend: Box<dyn DeviceBackend>,
    compressor: Box<dyn BlockCompressor>,
    negotiator: FormatNegotiator,
    ring: FrameResourceRing,
    staging: StagingRing,
}

impl RenderContext {
    /// Initializes against an already created backend. The capability table
    /// behind the negotiator is computed here, once; re-initializing the
    /// backend means building a new context.
    pub fn new(
        backend: Box<dyn DeviceBackend>,
        compressor: Box<dyn BlockCompressor>,
        settings: ContextSettings,
    ) -> Result<Self> {
        let oracle: &dyn CapabilityOracle = backend.as_ref();
        let negotiator = FormatNegotiator::new(oracle, compressor.as_ref());
        let ring = FrameResourceRing::new(backend.as_ref(), settings.descriptor_sets_per_frame)?;
        info!(
            "render context up: {} frame slots, {} byte staging ring",
            ring.slot_count(),
            settings.staging_capacity
        );
        Ok(Self {
            backend,
            compressor,
            negotiator,
            ring,
            staging: StagingRing::new(settings.staging_capacity),
        })
    }

    /// Ingests a decoded source image into a GPU texture (consuming the
    /// image; see [`TextureIngestionPipeline::ingest`]).
    pub fn ingest(
        &self,
        image: SourceImage,
        semantic: TextureSemantic,
        name: &str,
        max_size: Option<(u32, u32)>,
    ) -> Result<Box<dyn TextureHandle>> {
        TextureIngestionPipeline::new(
            self.backend.as_ref(),
            &self.negotiator,
            self.compressor.as_ref(),
            TargetClass::Texture2d,
        )
        .ingest(image, semantic, name, max_size)
    }

    /// Begins the next frame; blocks until its ring slot's previous
    /// generation has retired.
    pub fn begin_frame(&mut self) -> Result<&mut FrameResourceBundle> {
        self.ring.begin_frame(self.backend.as_ref(), &mut self.staging)
    }

    /// Submits the recording frame.
    pub fn submit_frame(&mut self) -> Result<()> {
        self.ring.submit_frame(self.backend.as_ref(), &self.staging)
    }

    /// Allocates transient upload space valid for the current frame.
    pub fn staging_alloc(&mut self, size: u64, align: u64) -> Result<u64> {
        self.staging.alloc(size, align)
    }

    /// Rebuilds the frame ring (and empties the staging ring) after a
    /// swapchain loss. The caller recreates the swapchain first.
    pub fn recreate_frame_ring(&mut self) -> Result<()> {
        self.ring.recreate(self.backend.as_ref(), &mut self.staging)
    }

    #[must_use]
    pub fn negotiator(&self) -> &FormatNegotiator {
        &self.negotiator
    }

    #[must_use]
    pub fn frame_ring(&self) -> &FrameResourceRing {
        &self.ring
    }

    #[must_use]
    pub fn staging(&self) -> &StagingRing {
        &self.staging
    }

    #[must_use]
    pub fn backend(&self) -> &dyn DeviceBackend {
        self.backend.as_ref()
    }
}

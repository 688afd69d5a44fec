//! The abstract backend contract.
//!
//! This core never touches a concrete GPU API. Everything it needs from a
//! backend — capability queries, texture creation, synchronization
//! primitives, command submission — goes through the traits here, with one
//! implementation per backend (OpenGL, Vulkan, [`null`]). All objects are
//! driven from the single render thread; the traits carry no `Send`/`Sync`
//! bounds.

pub mod null;

use crate::errors::Result;
use crate::format::{FormatUsage, PixelFormat, TargetClass};

/// Answers whether a pixel format is usable for a render-target class.
///
/// Implemented per backend; this core treats it as an opaque boolean
/// function and caches the answers it needs at initialization.
pub trait CapabilityOracle {
    fn format_supported(
        &self,
        target: TargetClass,
        format: PixelFormat,
        usage: FormatUsage,
    ) -> bool;
}

/// A GPU texture owned by the backend.
///
/// Created once with a fixed mip-level count and format; each level is
/// uploaded write-once. Dropping the handle releases the GPU memory and
/// image view(s).
pub trait TextureHandle {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn format(&self) -> PixelFormat;
    fn mip_level_count(&self) -> u32;

    /// Uploads one mip level. `data` is laid out per `format`'s block math
    /// for the level's dimensions.
    fn upload(&mut self, level: u32, width: u32, height: u32, data: &[u8]) -> Result<()>;
}

/// A GPU→CPU fence, signaled when queued GPU work completes.
pub trait Fence {
    /// Blocks until the fence signals. A failure here means the device is
    /// lost; the caller escalates, it never retries.
    fn wait(&self, timeout_ns: u64) -> Result<()>;

    /// Returns the fence to the unsignaled state.
    fn reset(&mut self) -> Result<()>;
}

/// A GPU↔GPU synchronization primitive (image acquire / present ordering).
/// Opaque to this core.
pub trait Semaphore {}

/// A recorded-command container. Recording is the renderer's business; this
/// core only resets buffers when their slot is recycled.
pub trait CommandBuffer {
    fn reset(&mut self) -> Result<()>;
}

/// Identifies a descriptor set allocated from a per-frame pool. Valid only
/// until the pool is reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorSetId(pub u64);

/// A fixed-capacity descriptor pool, reset wholesale once per ring cycle.
pub trait DescriptorPool {
    /// The fixed maximum number of sets, decided at creation.
    fn max_sets(&self) -> u32;

    fn allocate_set(&mut self) -> Result<DescriptorSetId>;

    /// Recycles every set at once.
    fn reset(&mut self) -> Result<()>;
}

// Handles queued for deferred destruction. Dropping the box releases the
// underlying GPU object; the frame ring only controls *when* that happens.
pub trait BufferHandle {}
pub trait ImageHandle {}
pub trait ImageViewHandle {}
pub trait MemoryHandle {}

/// Result of a swapchain image acquire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image is ready for rendering.
    Ready { image_index: u32 },
    /// An image was acquired but the surface no longer matches it. The
    /// swapchain and frame ring must be fully recreated.
    Suboptimal { image_index: u32 },
    /// No image could be acquired; full recreation required.
    OutOfDate,
}

/// One frame's submission: the recorded command buffers plus the
/// synchronization primitives gating them.
pub struct SubmitRequest<'a> {
    pub copy: &'a mut dyn CommandBuffer,
    pub draw: &'a mut dyn CommandBuffer,
    /// Waited on before any output writes (signaled by image acquire).
    pub wait_acquire: &'a dyn Semaphore,
    /// Signaled when rendering finishes (waited on by present).
    pub signal_render_finished: &'a dyn Semaphore,
    /// Signaled when all of this frame's GPU work completes.
    pub fence: &'a mut dyn Fence,
}

/// The device-level backend contract: resource creation plus queue
/// submission. Extends [`CapabilityOracle`] because format negotiation is
/// part of backend initialization.
pub trait DeviceBackend: CapabilityOracle {
    /// Number of swapchain images; the frame resource ring is sized by this.
    fn swapchain_image_count(&self) -> usize;

    fn create_texture(
        &self,
        name: &str,
        mip_level_count: u32,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<Box<dyn TextureHandle>>;

    fn create_fence(&self, signaled: bool) -> Result<Box<dyn Fence>>;

    fn create_semaphore(&self) -> Result<Box<dyn Semaphore>>;

    fn create_command_buffer(&self) -> Result<Box<dyn CommandBuffer>>;

    fn create_descriptor_pool(&self, max_sets: u32) -> Result<Box<dyn DescriptorPool>>;

    /// Acquires the next swapchain image, signaling `signal` when the image
    /// is ready for writes.
    fn acquire_next_image(&self, signal: &dyn Semaphore) -> Result<AcquireOutcome>;

    /// Submits one frame's command buffers to the graphics queue.
    fn submit(&self, request: SubmitRequest<'_>) -> Result<()>;

    /// Blocks until the GPU is idle. Used only for ring recreation and
    /// shutdown.
    fn wait_idle(&self) -> Result<()>;
}

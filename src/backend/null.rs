//! The headless null backend.
//!
//! Implements the full [`DeviceBackend`] contract against no GPU at all:
//! fence waits return immediately, submissions complete instantly, and
//! every upload is journaled so callers (and tests) can check what would
//! have reached the hardware. The capability set is explicit — nothing is
//! supported until [`NullBackend::support`] says so.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use log::trace;
use rustc_hash::FxHashSet;

use crate::backend::{
    AcquireOutcome, CapabilityOracle, CommandBuffer, DescriptorPool, DescriptorSetId,
    DeviceBackend, Fence, Semaphore, SubmitRequest, TextureHandle,
};
use crate::errors::{KilnError, Result};
use crate::format::{FormatUsage, PixelFormat, TargetClass};

/// One texture-level upload as observed by the null device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
    pub texture_id: u64,
    pub texture_name: String,
    pub level: u32,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub byte_len: usize,
}

type UploadJournal = Rc<RefCell<Vec<UploadRecord>>>;

/// A backend that talks to no GPU.
pub struct NullBackend {
    supported: FxHashSet<(TargetClass, PixelFormat)>,
    swapchain_images: usize,
    device_lost: Rc<Cell<bool>>,
    uploads: UploadJournal,
    next_texture_id: Cell<u64>,
    acquire_queue: RefCell<VecDeque<AcquireOutcome>>,
    acquire_cursor: Cell<u32>,
    submissions: Cell<u64>,
}

impl NullBackend {
    #[must_use]
    pub fn new(swapchain_image_count: usize) -> Self {
        Self {
            supported: FxHashSet::default(),
            swapchain_images: swapchain_image_count,
            device_lost: Rc::new(Cell::new(false)),
            uploads: Rc::new(RefCell::new(Vec::new())),
            next_texture_id: Cell::new(1),
            acquire_queue: RefCell::new(VecDeque::new()),
            acquire_cursor: Cell::new(0),
            submissions: Cell::new(0),
        }
    }

    /// Declares `format` supported for `target` (any usage).
    #[must_use]
    pub fn support(mut self, target: TargetClass, format: PixelFormat) -> Self {
        self.supported.insert((target, format));
        self
    }

    /// Declares every uncompressed format supported for every target class.
    /// The common baseline a real device would report.
    #[must_use]
    pub fn support_all_uncompressed(mut self) -> Self {
        for target in TargetClass::all() {
            for channels in 1..=4u8 {
                for colorspace in [crate::format::ColorSpace::Srgb, crate::format::ColorSpace::Linear]
                {
                    if let Some(format) = PixelFormat::uncompressed(channels, colorspace) {
                        self.supported.insert((target, format));
                    }
                }
            }
        }
        self
    }

    /// Everything recorded by texture uploads so far, in order.
    #[must_use]
    pub fn uploads(&self) -> Vec<UploadRecord> {
        self.uploads.borrow().clone()
    }

    /// Number of frames submitted so far.
    #[must_use]
    pub fn submission_count(&self) -> u64 {
        self.submissions.get()
    }

    /// Makes every subsequent fence wait / submit / `wait_idle` fail,
    /// simulating device loss.
    pub fn set_device_lost(&self, lost: bool) {
        self.device_lost.set(lost);
    }

    /// Forces the next image acquire to report `outcome` instead of the
    /// default `Ready`.
    pub fn queue_acquire_outcome(&self, outcome: AcquireOutcome) {
        self.acquire_queue.borrow_mut().push_back(outcome);
    }

    fn check_alive(&self, what: &str) -> Result<()> {
        if self.device_lost.get() {
            return Err(KilnError::DeviceLost(format!("null device lost during {what}")));
        }
        Ok(())
    }
}

impl CapabilityOracle for NullBackend {
    fn format_supported(
        &self,
        target: TargetClass,
        format: PixelFormat,
        _usage: FormatUsage,
    ) -> bool {
        self.supported.contains(&(target, format))
    }
}

impl DeviceBackend for NullBackend {
    fn swapchain_image_count(&self) -> usize {
        self.swapchain_images
    }

    fn create_texture(
        &self,
        name: &str,
        mip_level_count: u32,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<Box<dyn TextureHandle>> {
        self.check_alive("create_texture")?;
        if mip_level_count == 0 || width == 0 || height == 0 {
            return Err(KilnError::BackendCreation(format!(
                "degenerate texture '{name}': {width}x{height}, {mip_level_count} levels"
            )));
        }
        let id = self.next_texture_id.get();
        self.next_texture_id.set(id + 1);
        trace!("null: created texture '{name}' #{id} {width}x{height} {format:?} x{mip_level_count}");
        Ok(Box::new(NullTexture {
            id,
            name: name.to_string(),
            width,
            height,
            format,
            uploaded: vec![false; mip_level_count as usize],
            journal: Rc::clone(&self.uploads),
        }))
    }

    fn create_fence(&self, signaled: bool) -> Result<Box<dyn Fence>> {
        self.check_alive("create_fence")?;
        Ok(Box::new(NullFence {
            device_lost: Rc::clone(&self.device_lost),
            signaled: Cell::new(signaled),
        }))
    }

    fn create_semaphore(&self) -> Result<Box<dyn Semaphore>> {
        self.check_alive("create_semaphore")?;
        Ok(Box::new(NullSemaphore))
    }

    fn create_command_buffer(&self) -> Result<Box<dyn CommandBuffer>> {
        self.check_alive("create_command_buffer")?;
        Ok(Box::new(NullCommandBuffer { resets: 0 }))
    }

    fn create_descriptor_pool(&self, max_sets: u32) -> Result<Box<dyn DescriptorPool>> {
        self.check_alive("create_descriptor_pool")?;
        Ok(Box::new(NullDescriptorPool {
            max_sets,
            allocated: 0,
            next_id: 0,
        }))
    }

    fn acquire_next_image(&self, _signal: &dyn Semaphore) -> Result<AcquireOutcome> {
        self.check_alive("acquire_next_image")?;
        if let Some(outcome) = self.acquire_queue.borrow_mut().pop_front() {
            return Ok(outcome);
        }
        let index = self.acquire_cursor.get();
        self.acquire_cursor
            .set((index + 1) % self.swapchain_images as u32);
        Ok(AcquireOutcome::Ready { image_index: index })
    }

    fn submit(&self, request: SubmitRequest<'_>) -> Result<()> {
        self.check_alive("submit")?;
        // The null queue completes instantly; the fence is left as-is (it
        // reports signaled unless the device is lost).
        let _ = &request;
        self.submissions.set(self.submissions.get() + 1);
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        self.check_alive("wait_idle")
    }
}

// ============================================================================
// Null primitive implementations
// ============================================================================

struct NullTexture {
    id: u64,
    name: String,
    width: u32,
    height: u32,
    format: PixelFormat,
    uploaded: Vec<bool>,
    journal: UploadJournal,
}

impl TextureHandle for NullTexture {
    fn width(&self) -> u32 {
        self.width
    }
    fn height(&self) -> u32 {
        self.height
    }
    fn format(&self) -> PixelFormat {
        self.format
    }
    fn mip_level_count(&self) -> u32 {
        self.uploaded.len() as u32
    }

    fn upload(&mut self, level: u32, width: u32, height: u32, data: &[u8]) -> Result<()> {
        let level_count = self.uploaded.len();
        let Some(slot) = self.uploaded.get_mut(level as usize) else {
            return Err(KilnError::UploadFailed(format!(
                "'{}': level {level} out of range (texture has {level_count} levels)",
                self.name
            )));
        };
        if *slot {
            return Err(KilnError::UploadFailed(format!(
                "'{}': level {level} uploaded twice (levels are write-once)",
                self.name
            )));
        }
        let expected_w = (self.width >> level).max(1);
        let expected_h = (self.height >> level).max(1);
        if width != expected_w || height != expected_h {
            return Err(KilnError::UploadFailed(format!(
                "'{}': level {level} is {expected_w}x{expected_h}, got {width}x{height}",
                self.name
            )));
        }
        let expected_len = self.format.level_size(width, height);
        if data.len() != expected_len {
            return Err(KilnError::UploadFailed(format!(
                "'{}': level {level} needs {expected_len} bytes for {:?}, got {}",
                self.name,
                self.format,
                data.len()
            )));
        }
        *slot = true;
        self.journal.borrow_mut().push(UploadRecord {
            texture_id: self.id,
            texture_name: self.name.clone(),
            level,
            width,
            height,
            format: self.format,
            byte_len: data.len(),
        });
        Ok(())
    }
}

struct NullFence {
    device_lost: Rc<Cell<bool>>,
    signaled: Cell<bool>,
}

impl Fence for NullFence {
    fn wait(&self, _timeout_ns: u64) -> Result<()> {
        if self.device_lost.get() {
            return Err(KilnError::DeviceLost("null fence wait failed".into()));
        }
        // The null queue retires work the moment it is submitted.
        self.signaled.set(true);
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.signaled.set(false);
        Ok(())
    }
}

struct NullSemaphore;
impl Semaphore for NullSemaphore {}

struct NullCommandBuffer {
    resets: u64,
}

impl CommandBuffer for NullCommandBuffer {
    fn reset(&mut self) -> Result<()> {
        self.resets += 1;
        Ok(())
    }
}

struct NullDescriptorPool {
    max_sets: u32,
    allocated: u32,
    next_id: u64,
}

impl DescriptorPool for NullDescriptorPool {
    fn max_sets(&self) -> u32 {
        self.max_sets
    }

    fn allocate_set(&mut self) -> Result<DescriptorSetId> {
        if self.allocated >= self.max_sets {
            return Err(KilnError::DescriptorPoolExhausted {
                allocated: self.allocated,
                capacity: self.max_sets,
            });
        }
        self.allocated += 1;
        self.next_id += 1;
        Ok(DescriptorSetId(self.next_id))
    }

    fn reset(&mut self) -> Result<()> {
        self.allocated = 0;
        Ok(())
    }
}

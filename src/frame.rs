//! The per-frame GPU resource ring.
//!
//! An N-deep ring of [`FrameResourceBundle`]s bounds how many frames of GPU
//! work may be outstanding at once. Each slot owns its command buffers,
//! descriptor pool, submission fence, acquire/present semaphores, and a
//! [`GarbageBin`] of resources queued for deferred destruction.
//!
//! Slot lifecycle: `Idle → Recording → Submitted → (retire on next reuse)
//! → Recording → …`. The fence wait at the start of each frame is the sole
//! blocking point on the critical path; once it succeeds, the garbage the
//! slot accumulated a full ring cycle ago is drained *before* any new
//! recording touches the slot's memory, so no slot ever holds more than one
//! generation of garbage.

use log::{info, warn};

use crate::backend::{
    AcquireOutcome, BufferHandle, CommandBuffer, DescriptorPool, DescriptorSetId, DeviceBackend,
    Fence, ImageHandle, ImageViewHandle, MemoryHandle, Semaphore, SubmitRequest,
};
use crate::errors::{KilnError, Result};
use crate::staging::StagingRing;

/// No per-call timeout at this layer: a stalled fence is device loss, which
/// is fatal and escalates to backend reinitialization.
const FENCE_WAIT_TIMEOUT_NS: u64 = u64::MAX;

/// Default fixed descriptor-set capacity per frame slot.
pub const DEFAULT_DESCRIPTOR_SETS_PER_FRAME: u32 = 1024;

/// Where a ring slot is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Never used, or freshly recreated.
    Idle,
    /// The CPU is recording commands into this slot.
    Recording,
    /// Submitted to the GPU; the fence will signal when the work retires.
    Submitted,
}

/// One generation's deferred-deletion lists.
///
/// Resources pushed here stay alive until the owning slot's fence — from
/// its *next* reuse, a full ring cycle later — has signaled. Dropping the
/// boxed handles is what actually frees the GPU objects; destruction order
/// across slots need not match creation order.
#[derive(Default)]
pub struct GarbageBin {
    buffers: Vec<Box<dyn BufferHandle>>,
    images: Vec<Box<dyn ImageHandle>>,
    image_views: Vec<Box<dyn ImageViewHandle>>,
    memory: Vec<Box<dyn MemoryHandle>>,
}

impl GarbageBin {
    /// Total handles awaiting destruction.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffers.len() + self.images.len() + self.image_views.len() + self.memory.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn drain(&mut self) {
        self.buffers.clear();
        self.images.clear();
        self.image_views.clear();
        self.memory.clear();
    }
}

/// One of the ring's N slots.
pub struct FrameResourceBundle {
    index: usize,
    state: SlotState,
    copy_commands: Box<dyn CommandBuffer>,
    draw_commands: Box<dyn CommandBuffer>,
    descriptor_pool: Box<dyn DescriptorPool>,
    descriptor_sets_allocated: u32,
    submission_fence: Box<dyn Fence>,
    image_acquire_semaphore: Box<dyn Semaphore>,
    render_finished_semaphore: Box<dyn Semaphore>,
    garbage: GarbageBin,
    /// Staging-ring high-water mark recorded at this slot's last submit.
    staging_mark: u64,
}

impl FrameResourceBundle {
    fn create(backend: &dyn DeviceBackend, index: usize, descriptor_sets: u32) -> Result<Self> {
        Ok(Self {
            index,
            state: SlotState::Idle,
            copy_commands: backend.create_command_buffer()?,
            draw_commands: backend.create_command_buffer()?,
            descriptor_pool: backend.create_descriptor_pool(descriptor_sets)?,
            descriptor_sets_allocated: 0,
            // Created signaled so the first use of the slot does not block.
            submission_fence: backend.create_fence(true)?,
            image_acquire_semaphore: backend.create_semaphore()?,
            render_finished_semaphore: backend.create_semaphore()?,
            garbage: GarbageBin::default(),
            staging_mark: 0,
        })
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn state(&self) -> SlotState {
        self.state
    }

    /// The deferred-deletion lists of this slot's current generation.
    #[must_use]
    pub fn garbage(&self) -> &GarbageBin {
        &self.garbage
    }

    pub fn copy_commands_mut(&mut self) -> &mut dyn CommandBuffer {
        &mut *self.copy_commands
    }

    pub fn draw_commands_mut(&mut self) -> &mut dyn CommandBuffer {
        &mut *self.draw_commands
    }

    /// Allocates one descriptor set from this slot's fixed-capacity pool.
    ///
    /// Exceeding the capacity decided at initialization is a fatal
    /// configuration error; the pool never grows.
    pub fn allocate_descriptor_set(&mut self) -> Result<DescriptorSetId> {
        if self.descriptor_sets_allocated >= self.descriptor_pool.max_sets() {
            return Err(KilnError::DescriptorPoolExhausted {
                allocated: self.descriptor_sets_allocated,
                capacity: self.descriptor_pool.max_sets(),
            });
        }
        let id = self.descriptor_pool.allocate_set()?;
        self.descriptor_sets_allocated += 1;
        Ok(id)
    }

    // Deferred destruction: the GPU may still read these this frame, so
    // they are queued rather than freed, and dropped only after this slot's
    // fence signals on its next reuse.

    pub fn retire_buffer(&mut self, buffer: Box<dyn BufferHandle>) {
        self.garbage.buffers.push(buffer);
    }

    pub fn retire_image(&mut self, image: Box<dyn ImageHandle>) {
        self.garbage.images.push(image);
    }

    pub fn retire_image_view(&mut self, view: Box<dyn ImageViewHandle>) {
        self.garbage.image_views.push(view);
    }

    pub fn retire_memory(&mut self, memory: Box<dyn MemoryHandle>) {
        self.garbage.memory.push(memory);
    }
}

/// A swapchain with no images cannot host frames in flight; the slot count
/// doubles as the ring's modulus, so zero would poison every index.
fn checked_slot_count(backend: &dyn DeviceBackend) -> Result<usize> {
    match backend.swapchain_image_count() {
        0 => Err(KilnError::BackendCreation(
            "backend reported a swapchain with zero images".into(),
        )),
        count => Ok(count),
    }
}

/// The N-deep ring of per-frame resource bundles.
pub struct FrameResourceRing {
    slots: Vec<FrameResourceBundle>,
    frame_counter: u64,
    descriptor_sets_per_frame: u32,
}

impl FrameResourceRing {
    /// Builds one slot per swapchain image. Fences start signaled, so the
    /// first pass over the ring never blocks.
    pub fn new(backend: &dyn DeviceBackend, descriptor_sets_per_frame: u32) -> Result<Self> {
        let slot_count = checked_slot_count(backend)?;
        let slots = (0..slot_count)
            .map(|index| FrameResourceBundle::create(backend, index, descriptor_sets_per_frame))
            .collect::<Result<Vec<_>>>()?;
        info!(
            "frame resource ring: {slot_count} slots, {descriptor_sets_per_frame} descriptor sets per slot"
        );
        Ok(Self {
            slots,
            frame_counter: 0,
            descriptor_sets_per_frame,
        })
    }

    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Frames begun-and-submitted since creation or the last recreation.
    #[must_use]
    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    /// The slot the next `begin_frame` will use (or the one currently
    /// recording).
    #[must_use]
    pub fn current(&self) -> &FrameResourceBundle {
        &self.slots[self.frame_counter as usize % self.slots.len()]
    }

    pub fn current_mut(&mut self) -> &mut FrameResourceBundle {
        let index = self.frame_counter as usize % self.slots.len();
        &mut self.slots[index]
    }

    /// Begins a new frame on slot `frame_counter mod N`.
    ///
    /// Waits for the slot's fence from its previous submission — the sole
    /// blocking point, bounding frames in flight to N — then drains the
    /// slot's previous-generation garbage, releases its staging span,
    /// resets its descriptor pool and command buffers, and acquires a
    /// swapchain image.
    ///
    /// A suboptimal or out-of-date acquire returns
    /// [`KilnError::SwapchainOutOfDate`]: the swapchain and this ring must
    /// both be recreated, because partial recovery would desynchronize
    /// fence and semaphore state.
    pub fn begin_frame(
        &mut self,
        backend: &dyn DeviceBackend,
        staging: &mut StagingRing,
    ) -> Result<&mut FrameResourceBundle> {
        let index = self.frame_counter as usize % self.slots.len();
        let slot = &mut self.slots[index];

        if slot.state == SlotState::Recording {
            return Err(KilnError::FrameState(format!(
                "begin_frame on slot {index} which is still recording"
            )));
        }

        // Blocks until generation (frame_counter - N) has retired. Failure
        // is device loss and escalates; nothing here is retried.
        slot.submission_fence.wait(FENCE_WAIT_TIMEOUT_NS)?;
        slot.submission_fence.reset()?;

        // The GPU is done with everything this slot submitted last cycle:
        // drop that generation's garbage and hand its staging span back
        // before any new recording touches the slot.
        slot.garbage.drain();
        staging.release_to(slot.staging_mark);

        slot.descriptor_pool.reset()?;
        slot.descriptor_sets_allocated = 0;
        slot.copy_commands.reset()?;
        slot.draw_commands.reset()?;

        match backend.acquire_next_image(&*slot.image_acquire_semaphore)? {
            AcquireOutcome::Ready { .. } => {}
            AcquireOutcome::Suboptimal { .. } | AcquireOutcome::OutOfDate => {
                warn!("swapchain no longer matches the surface; requesting full recreation");
                slot.state = SlotState::Idle;
                return Err(KilnError::SwapchainOutOfDate);
            }
        }

        slot.state = SlotState::Recording;
        Ok(slot)
    }

    /// Submits the currently recording slot's command buffers, recording
    /// the staging high-water mark for release when this slot's fence next
    /// signals.
    pub fn submit_frame(&mut self, backend: &dyn DeviceBackend, staging: &StagingRing) -> Result<()> {
        let index = self.frame_counter as usize % self.slots.len();
        let slot = &mut self.slots[index];

        if slot.state != SlotState::Recording {
            return Err(KilnError::FrameState(format!(
                "submit_frame on slot {index} in state {:?}",
                slot.state
            )));
        }

        slot.staging_mark = staging.mark();
        backend.submit(SubmitRequest {
            copy: &mut *slot.copy_commands,
            draw: &mut *slot.draw_commands,
            wait_acquire: &*slot.image_acquire_semaphore,
            signal_render_finished: &*slot.render_finished_semaphore,
            fence: &mut *slot.submission_fence,
        })?;

        slot.state = SlotState::Submitted;
        self.frame_counter += 1;
        Ok(())
    }

    /// Tears down and rebuilds every slot after a swapchain loss.
    ///
    /// Waits for the device to go idle first, so all pending generations —
    /// garbage and staging spans included — are known retired. Partial
    /// recovery is deliberately not offered.
    pub fn recreate(&mut self, backend: &dyn DeviceBackend, staging: &mut StagingRing) -> Result<()> {
        backend.wait_idle()?;

        // Idle device: everything previously pending is free again.
        staging.reset();
        for slot in &mut self.slots {
            slot.garbage.drain();
        }

        let slot_count = checked_slot_count(backend)?;
        self.slots = (0..slot_count)
            .map(|index| FrameResourceBundle::create(backend, index, self.descriptor_sets_per_frame))
            .collect::<Result<Vec<_>>>()?;
        self.frame_counter = 0;
        info!("frame resource ring recreated with {slot_count} slots");
        Ok(())
    }
}

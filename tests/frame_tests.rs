//! Frame Resource Ring Tests
//!
//! Tests for:
//! - Slot rotation and the frames-in-flight bound over many cycles
//! - The Idle/Recording/Submitted state machine and its errors
//! - Deferred destruction: garbage drains on slot reuse, never sooner,
//!   and no slot holds more than one generation of garbage
//! - Staging-mark release wired through begin/submit
//! - Descriptor pool capacity enforcement and per-frame reset
//! - Suboptimal/out-of-date acquire escalating to full ring recreation
//! - Device loss propagating out of fence waits

use std::cell::Cell;
use std::rc::Rc;

use kiln::backend::null::NullBackend;
use kiln::backend::{AcquireOutcome, BufferHandle, ImageHandle};
use kiln::errors::KilnError;
use kiln::frame::{FrameResourceRing, SlotState, DEFAULT_DESCRIPTOR_SETS_PER_FRAME};
use kiln::staging::StagingRing;

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A retired resource that reports its own destruction.
struct TrackedHandle {
    drops: Rc<Cell<u32>>,
}

impl TrackedHandle {
    fn new(drops: &Rc<Cell<u32>>) -> Box<Self> {
        Box::new(Self {
            drops: Rc::clone(drops),
        })
    }
}

impl Drop for TrackedHandle {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

impl BufferHandle for TrackedHandle {}
impl ImageHandle for TrackedHandle {}

// ============================================================================
// Rotation and state machine
// ============================================================================

#[test]
fn slots_rotate_in_ring_order() {
    init_logs();
    let backend = NullBackend::new(3);
    let mut staging = StagingRing::new(1024);
    let mut ring = FrameResourceRing::new(&backend, DEFAULT_DESCRIPTOR_SETS_PER_FRAME).unwrap();
    assert_eq!(ring.slot_count(), 3);

    for frame in 0..9u64 {
        let slot = ring.begin_frame(&backend, &mut staging).unwrap();
        assert_eq!(slot.index(), (frame % 3) as usize);
        assert_eq!(slot.state(), SlotState::Recording);
        ring.submit_frame(&backend, &staging).unwrap();
    }
    assert_eq!(ring.frame_counter(), 9);
    assert_eq!(backend.submission_count(), 9);
}

#[test]
fn zero_swapchain_images_is_rejected_at_creation() {
    let backend = NullBackend::new(0);
    assert!(matches!(
        FrameResourceRing::new(&backend, 16),
        Err(KilnError::BackendCreation(_))
    ));
}

#[test]
fn begin_twice_without_submit_is_a_state_error() {
    let backend = NullBackend::new(2);
    let mut staging = StagingRing::new(1024);
    let mut ring = FrameResourceRing::new(&backend, 16).unwrap();

    ring.begin_frame(&backend, &mut staging).unwrap();
    match ring.begin_frame(&backend, &mut staging) {
        Err(KilnError::FrameState(_)) => {}
        Err(other) => panic!("expected FrameState error, got {other}"),
        Ok(_) => panic!("expected FrameState error, got a recording slot"),
    }
}

#[test]
fn submit_without_begin_is_a_state_error() {
    let backend = NullBackend::new(2);
    let staging = StagingRing::new(1024);
    let mut ring = FrameResourceRing::new(&backend, 16).unwrap();

    match ring.submit_frame(&backend, &staging) {
        Err(KilnError::FrameState(_)) => {}
        other => panic!("expected FrameState error, got {other:?}"),
    }
}

// ============================================================================
// Deferred destruction
// ============================================================================

#[test]
fn garbage_survives_until_the_slot_comes_around_again() {
    let backend = NullBackend::new(2);
    let mut staging = StagingRing::new(1024);
    let mut ring = FrameResourceRing::new(&backend, 16).unwrap();
    let drops = Rc::new(Cell::new(0u32));

    // Frame 0 on slot 0 retires two resources.
    let slot = ring.begin_frame(&backend, &mut staging).unwrap();
    slot.retire_buffer(TrackedHandle::new(&drops));
    slot.retire_image(TrackedHandle::new(&drops));
    assert_eq!(slot.garbage().len(), 2);
    ring.submit_frame(&backend, &staging).unwrap();

    // Frame 1 runs on slot 1; slot 0's garbage is untouched.
    ring.begin_frame(&backend, &mut staging).unwrap();
    ring.submit_frame(&backend, &staging).unwrap();
    assert_eq!(drops.get(), 0);

    // Frame 2 reuses slot 0: its fence has signaled, so the generation
    // retired in frame 0 drops before recording starts.
    let slot = ring.begin_frame(&backend, &mut staging).unwrap();
    assert_eq!(drops.get(), 2);
    assert!(slot.garbage().is_empty());
}

#[test]
fn no_slot_accumulates_more_than_one_generation() {
    let backend = NullBackend::new(3);
    let mut staging = StagingRing::new(4096);
    let mut ring = FrameResourceRing::new(&backend, 16).unwrap();
    let drops = Rc::new(Cell::new(0u32));

    for frame in 0..12u32 {
        let slot = ring.begin_frame(&backend, &mut staging).unwrap();
        slot.retire_buffer(TrackedHandle::new(&drops));
        assert_eq!(slot.garbage().len(), 1, "frame {frame}");
        ring.submit_frame(&backend, &staging).unwrap();
    }
    // 12 retired, the last ring's worth (3) still queued.
    assert_eq!(drops.get(), 9);
}

// ============================================================================
// Staging marks
// ============================================================================

#[test]
fn staging_spans_release_when_their_slot_is_reused() {
    let backend = NullBackend::new(2);
    let mut staging = StagingRing::new(1024);
    let mut ring = FrameResourceRing::new(&backend, 16).unwrap();

    // Frame 0 stages 300 bytes.
    ring.begin_frame(&backend, &mut staging).unwrap();
    staging.alloc(300, 4).unwrap();
    ring.submit_frame(&backend, &staging).unwrap();

    // Frame 1 stages 200 more; frame 0's span is still pending.
    ring.begin_frame(&backend, &mut staging).unwrap();
    assert_eq!(staging.pending_bytes(), 300);
    staging.alloc(200, 4).unwrap();
    ring.submit_frame(&backend, &staging).unwrap();
    assert_eq!(staging.pending_bytes(), 500);

    // Frame 2 reuses slot 0, whose fence covers the 300-byte span.
    ring.begin_frame(&backend, &mut staging).unwrap();
    assert_eq!(staging.pending_bytes(), 200);
}

// ============================================================================
// Descriptor pools
// ============================================================================

#[test]
fn descriptor_pool_capacity_is_enforced_and_resets_per_frame() {
    let backend = NullBackend::new(2);
    let mut staging = StagingRing::new(1024);
    let mut ring = FrameResourceRing::new(&backend, 2).unwrap();

    let slot = ring.begin_frame(&backend, &mut staging).unwrap();
    slot.allocate_descriptor_set().unwrap();
    slot.allocate_descriptor_set().unwrap();
    match slot.allocate_descriptor_set() {
        Err(KilnError::DescriptorPoolExhausted {
            allocated,
            capacity,
        }) => {
            assert_eq!(allocated, 2);
            assert_eq!(capacity, 2);
        }
        other => panic!("expected DescriptorPoolExhausted, got {other:?}"),
    }
    ring.submit_frame(&backend, &staging).unwrap();

    // One full cycle later the pool is reset and the budget is fresh.
    ring.begin_frame(&backend, &mut staging).unwrap();
    ring.submit_frame(&backend, &staging).unwrap();
    let slot = ring.begin_frame(&backend, &mut staging).unwrap();
    slot.allocate_descriptor_set().unwrap();
    slot.allocate_descriptor_set().unwrap();
}

// ============================================================================
// Swapchain loss and recreation
// ============================================================================

#[test]
fn suboptimal_acquire_escalates_to_recreation() {
    init_logs();
    let backend = NullBackend::new(2);
    let mut staging = StagingRing::new(1024);
    let mut ring = FrameResourceRing::new(&backend, 16).unwrap();

    backend.queue_acquire_outcome(AcquireOutcome::Suboptimal { image_index: 0 });
    match ring.begin_frame(&backend, &mut staging) {
        Err(KilnError::SwapchainOutOfDate) => {}
        Err(other) => panic!("expected SwapchainOutOfDate, got {other}"),
        Ok(_) => panic!("expected SwapchainOutOfDate, got a recording slot"),
    }
    assert_eq!(ring.current().state(), SlotState::Idle);

    ring.recreate(&backend, &mut staging).unwrap();
    assert_eq!(ring.frame_counter(), 0);

    // Normal service resumes.
    ring.begin_frame(&backend, &mut staging).unwrap();
    ring.submit_frame(&backend, &staging).unwrap();
}

#[test]
fn out_of_date_acquire_escalates_to_recreation() {
    let backend = NullBackend::new(2);
    let mut staging = StagingRing::new(1024);
    let mut ring = FrameResourceRing::new(&backend, 16).unwrap();

    backend.queue_acquire_outcome(AcquireOutcome::OutOfDate);
    assert!(matches!(
        ring.begin_frame(&backend, &mut staging),
        Err(KilnError::SwapchainOutOfDate)
    ));
}

#[test]
fn recreation_drops_garbage_and_resets_staging() {
    let backend = NullBackend::new(2);
    let mut staging = StagingRing::new(1024);
    let mut ring = FrameResourceRing::new(&backend, 16).unwrap();
    let drops = Rc::new(Cell::new(0u32));

    let slot = ring.begin_frame(&backend, &mut staging).unwrap();
    slot.retire_buffer(TrackedHandle::new(&drops));
    staging.alloc(512, 4).unwrap();
    ring.submit_frame(&backend, &staging).unwrap();

    ring.recreate(&backend, &mut staging).unwrap();
    assert_eq!(drops.get(), 1);
    assert_eq!(staging.pending_bytes(), 0);
    assert_eq!(staging.mark(), 0);
}

// ============================================================================
// Device loss
// ============================================================================

#[test]
fn device_loss_surfaces_from_the_fence_wait() {
    let backend = NullBackend::new(2);
    let mut staging = StagingRing::new(1024);
    let mut ring = FrameResourceRing::new(&backend, 16).unwrap();

    backend.set_device_lost(true);
    match ring.begin_frame(&backend, &mut staging) {
        Err(KilnError::DeviceLost(_)) => {}
        Err(other) => panic!("expected DeviceLost, got {other}"),
        Ok(_) => panic!("expected DeviceLost, got a recording slot"),
    }
}

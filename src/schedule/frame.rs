use std::cell::RefCell;
use std::rc::Rc;

/// Work to run at the next display-frame boundary.
pub type FrameCallback = Box<dyn FnOnce() + 'static>;

/// Injected "next frame" primitive.
pub trait NextFrame {
    /// Run `callback` once at the next frame boundary.
    fn request_frame(&self, callback: FrameCallback);
}

/// Single-threaded frame queue advanced explicitly by its owner.
///
/// Callbacks requested while a frame is running land in the following frame.
#[derive(Clone, Default)]
pub struct FrameQueue {
    queued: Rc<RefCell<Vec<FrameCallback>>>,
}

impl FrameQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of callbacks waiting for the next frame.
    pub fn pending(&self) -> usize {
        self.queued.borrow().len()
    }

    /// Run every callback queued before this call; returns how many ran.
    pub fn run_frame(&self) -> usize {
        let batch = std::mem::take(&mut *self.queued.borrow_mut());
        let ran = batch.len();
        for callback in batch {
            callback();
        }
        ran
    }
}

impl NextFrame for FrameQueue {
    fn request_frame(&self, callback: FrameCallback) {
        self.queued.borrow_mut().push(callback);
    }
}

//! Cancellable delayed task.
//!
//! Used for close-on-leave: leaving the dock schedules a hide, entering it
//! (or any of its buttons) cancels the pending hide.  Scheduling again
//! replaces whatever was pending.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

/// A one-shot timer facility on the current thread's event loop.
pub trait Scheduler {
    type Handle;

    /// Run `f` once after `delay`.
    fn schedule(&self, delay: Duration, f: Box<dyn FnOnce()>) -> Self::Handle;

    /// Cancel a task that has not run yet.
    fn cancel(&self, handle: Self::Handle);
}

/// One pending delayed task at most.
pub struct Debounce<S: Scheduler> {
    scheduler: S,
    delay: Duration,
    pending: Rc<RefCell<Option<S::Handle>>>,
}

impl<S> Debounce<S>
where
    S: Scheduler,
    S::Handle: 'static,
{
    pub fn new(scheduler: S, delay: Duration) -> Self {
        Self {
            scheduler,
            delay,
            pending: Rc::new(RefCell::new(None)),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `f` after the delay, replacing any pending task.
    pub fn schedule(&self, f: impl FnOnce() + 'static) {
        self.cancel();
        let pending = Rc::downgrade(&self.pending);
        let handle = self.scheduler.schedule(
            self.delay,
            Box::new(move || {
                // The handle is spent once the task runs.
                if let Some(pending) = pending.upgrade() {
                    pending.borrow_mut().take();
                }
                f();
            }),
        );
        *self.pending.borrow_mut() = Some(handle);
    }

    /// Drop the pending task, if any.  Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        let handle = self.pending.borrow_mut().take();
        match handle {
            Some(h) => {
                self.scheduler.cancel(h);
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.borrow().is_some()
    }
}

#[cfg(test)]
pub(crate) mod manual {
    use super::*;
    use std::cell::Cell;

    type Slot = Option<Box<dyn FnOnce()>>;

    /// A scheduler driven by hand: [`ManualScheduler::fire_all`] runs every
    /// task still scheduled.
    #[derive(Clone, Default)]
    pub struct ManualScheduler {
        tasks: Rc<RefCell<Vec<Slot>>>,
        pub cancelled: Rc<Cell<usize>>,
    }

    impl ManualScheduler {
        pub fn fire_all(&self) {
            let due: Vec<Box<dyn FnOnce()>> =
                self.tasks.borrow_mut().iter_mut().filter_map(Option::take).collect();
            for f in due {
                f();
            }
        }
    }

    impl Scheduler for ManualScheduler {
        type Handle = usize;

        fn schedule(&self, _delay: Duration, f: Box<dyn FnOnce()>) -> usize {
            let mut tasks = self.tasks.borrow_mut();
            tasks.push(Some(f));
            tasks.len() - 1
        }

        fn cancel(&self, handle: usize) {
            if let Some(slot) = self.tasks.borrow_mut().get_mut(handle) {
                slot.take();
                self.cancelled.set(self.cancelled.get() + 1);
            }
        }
    }
}

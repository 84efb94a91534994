//! Timer seam used by the connection manager and the message router.
//!
//! In the browser timers are `gloo-timers` handles; tests drive a virtual
//! clock instead so backoff and timeout sequences can be asserted exactly.

/// Cancels the underlying timer when dropped.
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl TimerHandle {
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}

pub trait TimerHost {
    /// Run `callback` once after `delay_ms`.
    fn set_timeout(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> TimerHandle;

    /// Run `callback` every `period_ms` until the handle is dropped.
    fn set_interval(&self, period_ms: u32, callback: Box<dyn FnMut()>) -> TimerHandle;
}

/// Browser timers backed by `window.setTimeout` / `setInterval`.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserTimers;

#[cfg(target_arch = "wasm32")]
impl TimerHost for BrowserTimers {
    fn set_timeout(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> TimerHandle {
        let timeout = gloo_timers::callback::Timeout::new(delay_ms, callback);
        TimerHandle::new(move || drop(timeout))
    }

    fn set_interval(&self, period_ms: u32, callback: Box<dyn FnMut()>) -> TimerHandle {
        let mut callback = callback;
        let interval = gloo_timers::callback::Interval::new(period_ms, move || callback());
        TimerHandle::new(move || drop(interval))
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use manual::ManualTimers;

#[cfg(any(test, feature = "test-support"))]
mod manual {
    use std::cell::{Cell, RefCell};
    use std::collections::HashSet;
    use std::rc::{Rc, Weak};

    use super::{TimerHandle, TimerHost};

    enum Task {
        Once(Box<dyn FnOnce()>),
        Repeat(Box<dyn FnMut()>),
    }

    struct Scheduled {
        id: u64,
        due_ms: u64,
        period_ms: Option<u64>,
        task: Task,
    }

    #[derive(Default)]
    struct Clock {
        now_ms: Cell<u64>,
        next_id: Cell<u64>,
        queue: RefCell<Vec<Scheduled>>,
        cancelled: RefCell<HashSet<u64>>,
        /// Every delay passed to `set_timeout`, in call order.
        timeout_log: RefCell<Vec<u32>>,
    }

    impl Clock {
        fn cancel(&self, id: u64) {
            self.queue.borrow_mut().retain(|s| s.id != id);
            self.cancelled.borrow_mut().insert(id);
        }

        fn pop_due(&self, target_ms: u64) -> Option<Scheduled> {
            let mut queue = self.queue.borrow_mut();
            let idx = queue
                .iter()
                .enumerate()
                .filter(|(_, s)| s.due_ms <= target_ms)
                .min_by_key(|(_, s)| (s.due_ms, s.id))
                .map(|(i, _)| i)?;
            Some(queue.remove(idx))
        }
    }

    /// Virtual clock for tests.  Nothing fires until `advance` is called.
    #[derive(Clone, Default)]
    pub struct ManualTimers {
        clock: Rc<Clock>,
    }

    impl ManualTimers {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn now_ms(&self) -> u64 {
            self.clock.now_ms.get()
        }

        /// Number of armed timers.
        pub fn pending(&self) -> usize {
            self.clock.queue.borrow().len()
        }

        pub fn timeout_delays(&self) -> Vec<u32> {
            self.clock.timeout_log.borrow().clone()
        }

        /// Move the clock forward, firing everything that falls due in order.
        pub fn advance(&self, ms: u64) {
            let target = self.clock.now_ms.get() + ms;
            while let Some(scheduled) = self.clock.pop_due(target) {
                self.clock.now_ms.set(scheduled.due_ms);
                match scheduled.task {
                    Task::Once(callback) => callback(),
                    Task::Repeat(mut callback) => {
                        callback();
                        // The callback may have dropped its own handle.
                        let period = scheduled.period_ms.unwrap_or(1).max(1);
                        if !self.clock.cancelled.borrow().contains(&scheduled.id) {
                            self.clock.queue.borrow_mut().push(Scheduled {
                                id: scheduled.id,
                                due_ms: scheduled.due_ms + period,
                                period_ms: Some(period),
                                task: Task::Repeat(callback),
                            });
                        }
                    }
                }
            }
            self.clock.now_ms.set(target);
        }

        fn schedule(&self, delay_ms: u32, period_ms: Option<u64>, task: Task) -> TimerHandle {
            let id = self.clock.next_id.get();
            self.clock.next_id.set(id + 1);
            self.clock.queue.borrow_mut().push(Scheduled {
                id,
                due_ms: self.clock.now_ms.get() + delay_ms as u64,
                period_ms,
                task,
            });
            let clock: Weak<Clock> = Rc::downgrade(&self.clock);
            TimerHandle::new(move || {
                if let Some(clock) = clock.upgrade() {
                    clock.cancel(id);
                }
            })
        }
    }

    impl TimerHost for ManualTimers {
        fn set_timeout(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> TimerHandle {
            self.clock.timeout_log.borrow_mut().push(delay_ms);
            self.schedule(delay_ms, None, Task::Once(callback))
        }

        fn set_interval(&self, period_ms: u32, callback: Box<dyn FnMut()>) -> TimerHandle {
            self.schedule(period_ms, Some(period_ms as u64), Task::Repeat(callback))
        }
    }

}

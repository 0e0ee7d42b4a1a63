//! Cooperative timer queue.
//!
//! Timers never wait on the real clock. `setInterval` and `setTimeout` push a
//! task onto a FIFO queue that is drained after the fragment's top level (or
//! an invoked function) returns. Each turn checks the timer's `isActive` flag
//! first, so a clear issued while a fire is already queued still suppresses it.

use std::collections::VecDeque;

use boa_engine::JsValue;
use tracing::{trace, warn};

use crate::engine::{Engine, lock, with_host};
use crate::error::SandboxError;

struct Task {
    id: u32,
    callback: JsValue,
    args: Vec<JsValue>,
    repeating: bool,
}

#[derive(Default)]
pub(crate) struct Scheduler {
    queue: VecDeque<Task>,
}

impl Scheduler {
    pub(crate) fn schedule(&mut self, id: u32, callback: JsValue, args: Vec<JsValue>, repeating: bool) {
        self.queue.push_back(Task {
            id,
            callback,
            args,
            repeating,
        });
    }

    pub(crate) fn clear(&mut self) {
        if !self.queue.is_empty() {
            trace!(pending = self.queue.len(), "timer tasks abandoned");
        }
        self.queue.clear();
    }

    fn next(&mut self) -> Option<Task> {
        self.queue.pop_front()
    }
}

impl Engine {
    /// Runs queued timer callbacks until the queue is empty.
    pub(crate) fn drain_timers(&mut self) -> Result<(), SandboxError> {
        while let Some(task) = with_host(|host| host.scheduler.next()).flatten() {
            self.check_deadline()?;
            let fired = {
                let mut state = lock(&self.mocks);
                if !state.is_timer_active(task.id) {
                    trace!(timer = task.id, "skipping fire of cleared timer");
                    continue;
                }

                let fired = state.timer(task.id).map(|t| t.invocation_count).unwrap_or(0);
                let max = self.limits.max_timer_invocations;
                if task.repeating && fired >= max {
                    warn!(timer = task.id, max, "timer fired too often without being cleared");
                    return Err(SandboxError::Timeout(format!(
                        "Execution timed out: timer {} fired {max} times without being cleared",
                        task.id
                    )));
                }

                state.record_timer_fire(task.id);
                if !task.repeating {
                    state.stop_timer(task.id);
                }
                fired
            };
            trace!(timer = task.id, fire = fired + 1, "timer fired");

            if let Some(callback) = task.callback.as_callable() {
                if let Err(err) = callback.call(&JsValue::undefined(), &task.args, &mut self.context) {
                    return Err(self.describe(err));
                }
            }
            self.run_jobs();

            if task.repeating && lock(&self.mocks).is_timer_active(task.id) {
                with_host(|host| host.scheduler.schedule(task.id, task.callback, task.args, true));
            }
        }
        Ok(())
    }
}

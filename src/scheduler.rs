use std::collections::VecDeque;

/// Work deferred to the next turn of the editor's event loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeferredTask {
    Normalize,
}

#[derive(Clone, Debug, Default)]
pub struct Scheduler {
    queue: VecDeque<DeferredTask>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defer(&mut self, task: DeferredTask) {
        self.queue.push_back(task);
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Takes the tasks queued before this tick. Tasks deferred while these
    /// run land in the queue for the following tick.
    pub fn take_ready(&mut self) -> Vec<DeferredTask> {
        self.queue.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_fifo_order_per_tick() {
        let mut scheduler = Scheduler::new();
        scheduler.defer(DeferredTask::Normalize);
        scheduler.defer(DeferredTask::Normalize);
        assert_eq!(scheduler.pending(), 2);

        let ready = scheduler.take_ready();
        scheduler.defer(DeferredTask::Normalize);
        assert_eq!(ready.len(), 2);
        assert_eq!(scheduler.pending(), 1);
    }
}

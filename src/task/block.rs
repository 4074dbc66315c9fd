use std::thread;

use anyhow::anyhow;

use super::{panic_message, Task, TaskBuilder};

impl Task {
    /// Create a task that runs several blocks concurrently
    ///
    /// The blocks run on scoped threads once the task starts, and the task
    /// finishes only after every block has returned. Any panicking block fails
    /// the task; the remaining blocks still run to completion.
    pub fn from_blocks<I, F>(blocks: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() + Send + 'static,
    {
        TaskBuilder::new().build_blocks(blocks)
    }
}

impl TaskBuilder {
    /// Build a block task, see [`Task::from_blocks`]
    pub fn build_blocks<I, F>(self, blocks: I) -> Task
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() + Send + 'static,
    {
        let blocks: Vec<F> = blocks.into_iter().collect();

        self.build_fallible(move |_ctx| {
            let total = blocks.len();
            let failures: Vec<String> = thread::scope(|scope| {
                let handles: Vec<_> = blocks.into_iter().map(|block| scope.spawn(block)).collect();
                handles
                    .into_iter()
                    .filter_map(|handle| handle.join().err())
                    .map(|payload| panic_message(payload.as_ref()))
                    .collect()
            });

            if failures.is_empty() {
                Ok(())
            } else {
                Err(anyhow!(
                    "{} of {} blocks panicked: {}",
                    failures.len(),
                    total,
                    failures.join("; ")
                ))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::TaskState;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};

    #[test]
    fn test_blocks_run_concurrently() {
        // Every block must be in flight at once for the barrier to release
        let barrier = Arc::new(Barrier::new(4));
        let completed = Arc::new(AtomicUsize::new(0));

        let blocks: Vec<_> = (0..4)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let completed = Arc::clone(&completed);
                move || {
                    barrier.wait();
                    completed.fetch_add(1, Ordering::SeqCst);
                }
            })
            .collect();

        let task = Task::from_blocks(blocks);
        task.run().unwrap();

        assert_eq!(completed.load(Ordering::SeqCst), 4);
        assert_eq!(task.state(), TaskState::Finished);
        assert!(task.outcome().unwrap().is_success());
    }

    #[test]
    fn test_panicking_block_fails_task() {
        let completed = Arc::new(AtomicUsize::new(0));
        let survivor = Arc::clone(&completed);

        let blocks: Vec<Box<dyn FnOnce() + Send>> = vec![
            Box::new(|| panic!("block exploded")),
            Box::new(move || {
                survivor.fetch_add(1, Ordering::SeqCst);
            }),
        ];

        let task = Task::from_blocks(blocks);
        task.run().unwrap();

        let message = task.outcome().unwrap().error_message().unwrap().to_string();
        assert!(message.contains("1 of 2 blocks panicked"));
        assert!(message.contains("block exploded"));
        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_block_task_succeeds() {
        let task = Task::from_blocks(Vec::<fn()>::new());
        task.run().unwrap();
        assert!(task.outcome().unwrap().is_success());
    }
}

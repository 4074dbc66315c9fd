//! Proptest strategies for dispatch properties

use proptest::prelude::*;

use tasker_dispatch::TaskEvent;

/// Concurrency limit and task count, with more tasks than slots most of the time
pub fn limit_and_tasks_strategy() -> impl Strategy<Value = (usize, usize)> {
    (1usize..=4).prop_flat_map(|limit| (Just(limit), 1usize..=12))
}

/// Arbitrary lifecycle event
pub fn task_event_strategy() -> impl Strategy<Value = TaskEvent> {
    prop_oneof![
        Just(TaskEvent::DependenciesResolved),
        Just(TaskEvent::Start),
        Just(TaskEvent::Complete),
        "[a-z]{1,8}".prop_map(TaskEvent::Fail),
        Just(TaskEvent::Cancel),
    ]
}

pub fn task_event_sequence_strategy() -> impl Strategy<Value = Vec<TaskEvent>> {
    prop::collection::vec(task_event_strategy(), 0..12)
}

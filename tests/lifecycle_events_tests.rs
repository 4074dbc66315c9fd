//! Lifecycle event subscription tests

use std::time::Duration;

use tasker_dispatch::constants::events;
use tasker_dispatch::{PublishedEvent, Task, TaskQueue};
use tokio::sync::broadcast;
use tokio::time::timeout;

async fn next_event(receiver: &mut broadcast::Receiver<PublishedEvent>) -> PublishedEvent {
    timeout(Duration::from_secs(10), receiver.recv())
        .await
        .expect("event should arrive")
        .expect("channel should stay open")
}

#[tokio::test]
async fn test_successful_task_event_sequence() {
    let queue = TaskQueue::with_name("events", tasker_dispatch::ConcurrencyLimit::Serial);
    let mut receiver = queue.subscribe();

    let task = Task::builder().name("greet").build(|_| {});
    queue.submit(&task).unwrap();

    let names = [
        events::TASK_SUBMITTED,
        events::TASK_STARTED,
        events::TASK_COMPLETED,
        events::QUEUE_DRAINED,
    ];
    for expected in names {
        let event = next_event(&mut receiver).await;
        assert_eq!(event.name, expected);
        assert_eq!(event.queue, "events");
        if expected != events::QUEUE_DRAINED {
            assert_eq!(event.task_id, Some(task.id()));
        }
    }
}

#[tokio::test]
async fn test_failed_and_cancelled_events() {
    let queue = TaskQueue::serial();
    queue.set_suspended(true);
    let mut receiver = queue.subscribe();

    let cancelled = Task::new(|| {});
    queue.submit(&cancelled).unwrap();
    assert_eq!(next_event(&mut receiver).await.name, events::TASK_SUBMITTED);

    cancelled.cancel();
    let event = next_event(&mut receiver).await;
    assert_eq!(event.name, events::TASK_CANCELLED);
    assert_eq!(event.context["outcome"]["status"], "cancelled");
    assert_eq!(next_event(&mut receiver).await.name, events::QUEUE_DRAINED);

    let failing = Task::fallible(|_| Err(anyhow::anyhow!("bad input")));
    queue.submit(&failing).unwrap();
    queue.set_suspended(false);

    let mut failed = None;
    while failed.is_none() {
        let event = next_event(&mut receiver).await;
        if event.name == events::TASK_FAILED {
            failed = Some(event);
        }
    }
    let failed = failed.unwrap();
    assert_eq!(failed.task_id, Some(failing.id()));
    assert_eq!(failed.context["outcome"]["error"], "bad input");
}

#[tokio::test]
async fn test_suspend_and_resume_events() {
    let queue = TaskQueue::concurrent();
    let mut receiver = queue.subscribe();

    queue.set_suspended(true);
    queue.set_suspended(true);
    queue.set_suspended(false);

    assert_eq!(next_event(&mut receiver).await.name, events::QUEUE_SUSPENDED);
    assert_eq!(next_event(&mut receiver).await.name, events::QUEUE_RESUMED);
    assert!(receiver.try_recv().is_err());
}

#[test]
fn test_events_from_blocking_code() {
    let queue = TaskQueue::serial();
    let mut receiver = queue.subscribe();

    let task = queue.submit_fn(|| {}).unwrap();
    assert!(task.wait_timeout(Duration::from_secs(10)).is_some());

    let first = tokio_test::block_on(next_event(&mut receiver));
    assert_eq!(first.name, events::TASK_SUBMITTED);
    let serialized = serde_json::to_value(&first).unwrap();
    assert_eq!(serialized["queue"], "default");
    assert_eq!(serialized["task_id"], task.id().to_string());
}

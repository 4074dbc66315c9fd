use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::constants::system;
use crate::task::TaskId;

/// Broadcast publisher for queue lifecycle events
///
/// Publishing never blocks and never fails for lack of subscribers; slow
/// subscribers observe `RecvError::Lagged` instead of stalling the queue.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

/// Event that has been published
#[derive(Debug, Clone, Serialize)]
pub struct PublishedEvent {
    pub name: String,
    pub queue: String,
    pub task_id: Option<TaskId>,
    pub context: Value,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event with the given name and context
    pub fn publish(
        &self,
        event_name: impl Into<String>,
        queue: &str,
        task_id: Option<TaskId>,
        context: Value,
    ) {
        let event = PublishedEvent {
            name: event_name.into(),
            queue: queue.to_string(),
            task_id,
            context,
            published_at: chrono::Utc::now(),
        };

        // send() only errors when nobody is subscribed, which is fine here
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(system::DEFAULT_EVENT_CHANNEL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let publisher = EventPublisher::new(4);
        publisher.publish("task.started", "q", None, Value::Null);
        assert_eq!(publisher.subscriber_count(), 0);
    }

    #[test]
    fn test_subscriber_receives_events_in_order() {
        let publisher = EventPublisher::new(8);
        let mut receiver = publisher.subscribe();

        let task_id = TaskId::new();
        publisher.publish("task.submitted", "q", Some(task_id), Value::Null);
        publisher.publish("task.started", "q", Some(task_id), Value::Null);

        let first = receiver.try_recv().unwrap();
        let second = receiver.try_recv().unwrap();
        assert_eq!(first.name, "task.submitted");
        assert_eq!(second.name, "task.started");
        assert_eq!(second.task_id, Some(task_id));
        assert_eq!(second.queue, "q");
    }

    #[tokio::test]
    async fn test_async_subscriber() {
        let publisher = EventPublisher::default();
        let mut receiver = publisher.subscribe();
        publisher.publish(
            "queue.drained",
            "q",
            None,
            serde_json::json!({"submitted": 3}),
        );

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.context["submitted"], 3);
    }
}

use super::*;
use sidecar_core::event::{EventEnvelope, EventType};
use std::collections::HashMap;

fn test_end_event(test_id: &str) -> ValidatedEvent {
    EventEnvelope {
        event_type: EventType::TestEnd.to_string(),
        framework: "pytest".to_string(),
        timestamp: None,
        run_id: Some("R1".to_string()),
        test_id: Some(test_id.to_string()),
        data: HashMap::new(),
    }
    .validate()
    .unwrap()
}

#[tokio::test]
async fn try_put_succeeds_under_capacity() {
    let queue = BoundedQueue::new(2);
    assert!(queue.try_put(test_end_event("a")).await.is_ok());
    assert_eq!(queue.len().await, 1);
}

#[tokio::test]
async fn try_put_fails_at_capacity_tail_drop() {
    let queue = BoundedQueue::new(2);
    assert!(queue.try_put(test_end_event("a")).await.is_ok());
    assert!(queue.try_put(test_end_event("b")).await.is_ok());
    let result = queue.try_put(test_end_event("c")).await;
    assert_eq!(result, Err(QueueFullError));
    assert_eq!(queue.len().await, 2);
}

#[tokio::test]
async fn get_returns_in_fifo_order() {
    let queue = BoundedQueue::new(4);
    queue.try_put(test_end_event("first")).await.unwrap();
    queue.try_put(test_end_event("second")).await.unwrap();

    let first = queue.get(Duration::from_millis(100)).await.unwrap();
    assert_eq!(first.test_id.unwrap().as_str(), "first");
    let second = queue.get(Duration::from_millis(100)).await.unwrap();
    assert_eq!(second.test_id.unwrap().as_str(), "second");
}

#[tokio::test]
async fn get_times_out_on_empty_queue() {
    let queue = BoundedQueue::new(4);
    let result = queue.get(Duration::from_millis(20)).await;
    assert!(result.is_none());
}

#[tokio::test]
async fn get_wakes_up_as_soon_as_an_event_arrives() {
    let queue = Arc::new(BoundedQueue::new(4));
    let reader = queue.clone();
    let handle = tokio::spawn(async move { reader.get(Duration::from_secs(5)).await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    queue.try_put(test_end_event("late")).await.unwrap();

    let result = handle.await.unwrap();
    assert!(result.is_some());
}

#[tokio::test]
async fn utilization_reflects_fill_level() {
    let queue = BoundedQueue::new(4);
    assert_eq!(queue.utilization().await, 0.0);
    queue.try_put(test_end_event("a")).await.unwrap();
    assert_eq!(queue.utilization().await, 0.25);
}

#[tokio::test]
async fn set_capacity_narrows_without_evicting() {
    let queue = BoundedQueue::new(4);
    queue.try_put(test_end_event("a")).await.unwrap();
    queue.try_put(test_end_event("b")).await.unwrap();
    queue.set_capacity(1);
    assert_eq!(queue.len().await, 2, "narrowing capacity does not evict buffered events");
    let result = queue.try_put(test_end_event("c")).await;
    assert_eq!(result, Err(QueueFullError));
}

proptest::proptest! {
    // §8: "queue_size ≤ queue.max_size at all times" and the
    // queued = processed + in_queue + dropped accounting identity, restricted
    // to the no-drain case (nothing dequeues concurrently): every attempted
    // `try_put` either lands in the buffer or is counted as a tail-drop,
    // never both, never neither, and the buffer never exceeds capacity.
    #[test]
    fn try_put_accounting_identity_holds(capacity in 1usize..16, attempts in 0usize..64) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(async {
            let queue = BoundedQueue::new(capacity);
            let mut accepted = 0usize;
            let mut dropped = 0usize;
            for i in 0..attempts {
                match queue.try_put(test_end_event(&i.to_string())).await {
                    Ok(()) => accepted += 1,
                    Err(QueueFullError) => dropped += 1,
                }
                prop_assert!(queue.len().await <= capacity);
            }
            prop_assert_eq!(accepted + dropped, attempts);
            prop_assert_eq!(accepted, attempts.min(capacity));
            prop_assert_eq!(queue.len().await, accepted);
            Ok(())
        })?;
    }
}

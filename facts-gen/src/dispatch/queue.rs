//! Priority queue of pending generation requests
//!
//! Higher priority first, then earlier timestamp, then arrival order.
//! Offer and removal never block on the consumer; `take` waits until a
//! request is available.

use super::admission::GenerationRequest;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

struct QueuedRequest {
    request: GenerationRequest,
    /// Arrival sequence, keeps equal keys FIFO
    seq: u64,
}

/// BinaryHeap is a max-heap: "greater" entries are dequeued first
impl Ord for QueuedRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        self.request
            .priority
            .cmp(&other.request.priority)
            .then_with(|| other.request.timestamp.cmp(&self.request.timestamp))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedRequest {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedRequest {}

#[derive(Default)]
struct QueueState {
    heap: BinaryHeap<QueuedRequest>,
    next_seq: u64,
}

#[derive(Default)]
pub struct GenerationQueue {
    state: Mutex<QueueState>,
    available: Notify,
}

impl GenerationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a request; returns the new queue length
    pub fn offer(&self, request: GenerationRequest) -> usize {
        let len = {
            let mut state = self.lock();
            let seq = state.next_seq;
            state.next_seq += 1;
            state.heap.push(QueuedRequest { request, seq });
            state.heap.len()
        };
        self.available.notify_one();
        len
    }

    /// Pop the head without waiting
    pub fn try_take(&self) -> Option<GenerationRequest> {
        self.lock().heap.pop().map(|queued| queued.request)
    }

    /// Wait for and pop the head
    pub async fn take(&self) -> GenerationRequest {
        loop {
            if let Some(request) = self.try_take() {
                return request;
            }
            self.available.notified().await;
        }
    }

    /// Drop every pending request for `track_id`; returns how many were removed
    pub fn remove_track(&self, track_id: &str) -> usize {
        let mut state = self.lock();
        let before = state.heap.len();
        state.heap.retain(|queued| queued.request.track_id != track_id);
        before - state.heap.len()
    }

    pub fn len(&self) -> usize {
        self.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pending track ids in dequeue order
    pub fn pending_track_ids(&self) -> Vec<String> {
        let state = self.lock();
        let mut entries: Vec<&QueuedRequest> = state.heap.iter().collect();
        entries.sort_by(|a, b| b.cmp(a));
        entries
            .into_iter()
            .map(|queued| queued.request.track_id.clone())
            .collect()
    }
}

//! The ordered, rate-limited pipeline of pending chat requests.
//!
//! [`OutboundQueue`] assigns request ids and preserves FIFO order; the
//! session's drain task pops one request at a time and spaces sends by the
//! configured inter-send delay. Ids are assigned under the same lock as the
//! append, so dispatch order and id order always agree, and an id is never
//! reused for the lifetime of the client.
//!
//! [`PendingAcks`] is the correlation table: once a request is actually
//! sent, its id maps to a single-resolution completion slot until the
//! server acknowledges it (`success`/`error`) or the session tears down.
//! Every [`Delivery`] resolves exactly once — a slot dropped without an
//! explicit resolution yields `false`.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use tokio::sync::{oneshot, Notify};

use crate::protocol::{ChatRequest, ChatRequestKind, FormattingMode, RequestId};

/// The outcome handle returned by `say`/`tell`.
///
/// Resolves to `true` when the server acknowledged the request with a
/// `success` envelope, `false` when the server rejected it or the session
/// tore down before an acknowledgment arrived. Awaiting never blocks the
/// enqueue itself; the request is delivered in the background.
#[derive(Debug)]
pub struct Delivery {
    id: RequestId,
    rx: oneshot::Receiver<bool>,
}

impl Delivery {
    /// The id assigned to the underlying request at enqueue time.
    pub fn id(&self) -> RequestId {
        self.id
    }
}

impl Future for Delivery {
    type Output = bool;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<bool> {
        // A dropped sender means the request was abandoned without an
        // acknowledgment; that counts as failure, never as a hang.
        Pin::new(&mut self.rx).poll(cx).map(|res| res.unwrap_or(false))
    }
}

/// The fields of a chat request the caller controls; the queue supplies
/// the id.
#[derive(Debug, Clone)]
pub(crate) struct RequestDraft {
    pub kind: ChatRequestKind,
    pub user: Option<String>,
    pub text: String,
    pub name: Option<String>,
    pub mode: Option<FormattingMode>,
}

/// A queued request together with its completion slot.
#[derive(Debug)]
pub(crate) struct QueuedRequest {
    pub request: ChatRequest,
    pub ack: oneshot::Sender<bool>,
}

#[derive(Debug, Default)]
struct QueueInner {
    next_id: RequestId,
    items: VecDeque<QueuedRequest>,
}

/// FIFO queue of not-yet-dispatched chat requests.
///
/// Safe for concurrent enqueue (caller tasks) and dequeue (the drain task).
/// Contents survive a reconnect: requests enqueued before a disconnect are
/// retried once the session is ready again.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    inner: Mutex<QueueInner>,
    wake: Notify,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Assign the next id, append at the tail and return the completion
    /// handle. Returns immediately; delivery is asynchronous.
    pub(crate) fn enqueue(&self, draft: RequestDraft) -> Delivery {
        let (ack, rx) = oneshot::channel();
        let id = {
            let mut inner = self.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.items.push_back(QueuedRequest {
                request: ChatRequest {
                    id,
                    kind: draft.kind,
                    user: draft.user,
                    text: draft.text,
                    name: draft.name,
                    mode: draft.mode,
                },
                ack,
            });
            id
        };
        self.wake.notify_one();
        Delivery { id, rx }
    }

    /// Pop the head of the queue, if any.
    pub(crate) fn pop(&self) -> Option<QueuedRequest> {
        self.lock().items.pop_front()
    }

    /// Wait until an item is available, then pop it.
    pub(crate) async fn next(&self) -> QueuedRequest {
        loop {
            // Create the listener before checking so an enqueue racing with
            // the check leaves a stored permit rather than a lost wakeup.
            let notified = self.wake.notified();
            if let Some(item) = self.pop() {
                return item;
            }
            notified.await;
        }
    }

    /// Return a request to the head of the queue (dispatch failed before
    /// the frame reached a live connection).
    pub(crate) fn requeue_front(&self, item: QueuedRequest) {
        self.lock().items.push_front(item);
        self.wake.notify_one();
    }

    /// Resolve every queued-but-undispatched request to failure.
    pub(crate) fn fail_all(&self) {
        let drained: Vec<QueuedRequest> = self.lock().items.drain(..).collect();
        for item in drained {
            let _ = item.ack.send(false);
        }
    }

    /// Number of queued-but-undispatched requests.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }
}

/// Correlation table mapping dispatched request ids to completion slots.
#[derive(Debug, Default)]
pub struct PendingAcks {
    inner: Mutex<HashMap<RequestId, oneshot::Sender<bool>>>,
}

impl PendingAcks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RequestId, oneshot::Sender<bool>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Track a dispatched request until the server acknowledges it.
    pub(crate) fn register(&self, id: RequestId, ack: oneshot::Sender<bool>) {
        self.lock().insert(id, ack);
    }

    /// Reclaim a registered slot (dispatch failed after registration).
    pub(crate) fn take(&self, id: RequestId) -> Option<oneshot::Sender<bool>> {
        self.lock().remove(&id)
    }

    /// Resolve a correlation to the given outcome. Returns `false` when the
    /// id is unknown (already resolved, or never tracked) — a benign race,
    /// not an error.
    pub(crate) fn resolve(&self, id: RequestId, outcome: bool) -> bool {
        match self.lock().remove(&id) {
            Some(ack) => {
                let _ = ack.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Resolve every in-flight correlation to failure (session teardown).
    pub(crate) fn fail_all(&self) {
        let drained: Vec<oneshot::Sender<bool>> =
            self.lock().drain().map(|(_, ack)| ack).collect();
        for ack in drained {
            let _ = ack.send(false);
        }
    }

    /// Number of dispatched-but-unresolved requests.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    fn say_draft(text: &str) -> RequestDraft {
        RequestDraft {
            kind: ChatRequestKind::Say,
            user: None,
            text: text.into(),
            name: None,
            mode: None,
        }
    }

    #[test]
    fn ids_are_monotonic_and_order_is_fifo() {
        let queue = OutboundQueue::new();
        let first = queue.enqueue(say_draft("one"));
        let second = queue.enqueue(say_draft("two"));
        let third = queue.enqueue(say_draft("three"));

        assert_eq!(first.id(), 0);
        assert_eq!(second.id(), 1);
        assert_eq!(third.id(), 2);

        assert_eq!(queue.pop().unwrap().request.text, "one");
        assert_eq!(queue.pop().unwrap().request.text, "two");
        assert_eq!(queue.pop().unwrap().request.text, "three");
        assert!(queue.pop().is_none());
    }

    #[test]
    fn ids_are_not_reused_after_drain() {
        let queue = OutboundQueue::new();
        let first = queue.enqueue(say_draft("one"));
        assert_eq!(first.id(), 0);
        queue.pop().unwrap();

        let second = queue.enqueue(say_draft("two"));
        assert_eq!(second.id(), 1);
    }

    #[test]
    fn requeue_front_preserves_dispatch_order() {
        let queue = OutboundQueue::new();
        queue.enqueue(say_draft("one"));
        queue.enqueue(say_draft("two"));

        let head = queue.pop().unwrap();
        queue.requeue_front(head);

        assert_eq!(queue.pop().unwrap().request.text, "one");
        assert_eq!(queue.pop().unwrap().request.text, "two");
    }

    #[tokio::test]
    async fn next_wakes_on_enqueue() {
        let queue = std::sync::Arc::new(OutboundQueue::new());
        let waiter = {
            let queue = std::sync::Arc::clone(&queue);
            tokio::spawn(async move { queue.next().await.request.text })
        };
        // Give the waiter time to park.
        tokio::task::yield_now().await;
        queue.enqueue(say_draft("wake"));
        assert_eq!(waiter.await.unwrap(), "wake");
    }

    #[tokio::test]
    async fn delivery_resolves_false_when_slot_dropped() {
        let queue = OutboundQueue::new();
        let delivery = queue.enqueue(say_draft("lost"));
        drop(queue.pop().unwrap());
        assert!(!delivery.await);
    }

    #[tokio::test]
    async fn fail_all_resolves_queued_requests_to_false() {
        let queue = OutboundQueue::new();
        let first = queue.enqueue(say_draft("a"));
        let second = queue.enqueue(say_draft("b"));
        queue.fail_all();
        assert!(queue.is_empty());
        assert!(!first.await);
        assert!(!second.await);
    }

    #[tokio::test]
    async fn pending_acks_resolve_exactly_once() {
        let queue = OutboundQueue::new();
        let pending = PendingAcks::new();

        let delivery = queue.enqueue(say_draft("hi"));
        let item = queue.pop().unwrap();
        pending.register(item.request.id, item.ack);
        assert_eq!(pending.len(), 1);

        assert!(pending.resolve(0, true));
        // Second resolution attempt is a no-op.
        assert!(!pending.resolve(0, false));
        assert!(pending.is_empty());

        assert!(delivery.await);
    }

    #[tokio::test]
    async fn unknown_id_resolution_is_ignored() {
        let pending = PendingAcks::new();
        assert!(!pending.resolve(99, true));
    }

    #[tokio::test]
    async fn fail_all_pending_resolves_to_false() {
        let queue = OutboundQueue::new();
        let pending = PendingAcks::new();

        let delivery = queue.enqueue(say_draft("doomed"));
        let item = queue.pop().unwrap();
        pending.register(item.request.id, item.ack);

        pending.fail_all();
        assert!(!delivery.await);
    }

    #[tokio::test]
    async fn take_reclaims_a_registered_slot() {
        let queue = OutboundQueue::new();
        let pending = PendingAcks::new();

        let delivery = queue.enqueue(say_draft("retry"));
        let item = queue.pop().unwrap();
        let id = item.request.id;
        let request = item.request;
        pending.register(id, item.ack);

        let ack = pending.take(id).unwrap();
        assert!(pending.is_empty());

        // Reclaimed slot goes back to the queue for a later retry.
        queue.requeue_front(QueuedRequest { request, ack });
        let item = queue.pop().unwrap();
        let _ = item.ack.send(true);
        assert!(delivery.await);
    }

    #[tokio::test]
    async fn delivery_is_pending_until_resolved() {
        let queue = OutboundQueue::new();
        let delivery = queue.enqueue(say_draft("slow"));
        let mut delivery = task::spawn(delivery);
        assert_pending!(delivery.poll());

        let item = queue.pop().unwrap();
        let _ = item.ack.send(true);
        assert_ready_eq!(delivery.poll(), true);
    }
}

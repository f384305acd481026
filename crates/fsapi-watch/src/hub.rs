use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use fsapi_types::{ListOptions, Resource};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tracing::{debug, warn};

use crate::error::{WatchError, WatchResult};
use crate::event::WatchEvent;

/// Configuration for a [`WatchHub`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Capacity of each subscriber's live event queue. A subscriber whose
    /// queue is full when an event is published is dropped.
    pub channel_capacity: usize,
    /// Number of recent events kept for watches that resume from a version.
    pub history_capacity: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 100,
            history_capacity: 1000,
        }
    }
}

struct Subscriber<R> {
    filter: ListOptions,
    sender: mpsc::Sender<WatchEvent<R>>,
}

/// Recently published events, oldest first.
struct History<R> {
    events: VecDeque<WatchEvent<R>>,
    /// Highest version that has been evicted. Resuming below it would skip
    /// events.
    evicted_through: u64,
}

struct HubInner<R> {
    config: WatchConfig,
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<u64, Subscriber<R>>>,
    history: Mutex<History<R>>,
}

impl<R> HubInner<R> {
    fn unsubscribe(&self, id: u64) {
        let removed = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        if removed.is_some() {
            debug!(watcher = id, "watcher stopped");
        }
    }
}

/// Fan-out broker delivering committed changes to watchers.
///
/// `publish` never blocks: each watcher has a bounded queue, and a watcher
/// whose queue is full is dropped (its stream ends after the events already
/// queued). Events reach every remaining watcher in the order `publish` was
/// called.
///
/// The hub does not serialize publishers itself. The object store calls
/// `publish`, `subscribe` and `events_since` while holding its mutation
/// lock, which is what makes a watcher's initial replay and its live stream
/// meet without gaps or duplicates.
pub struct WatchHub<R> {
    inner: Arc<HubInner<R>>,
}

impl<R> Clone for WatchHub<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Resource> WatchHub<R> {
    pub fn new(config: WatchConfig) -> Self {
        Self::starting_at(config, 0)
    }

    /// A hub whose history begins after `version`. Resuming from an older
    /// version fails as expired, since those events were never recorded.
    pub fn starting_at(config: WatchConfig, version: u64) -> Self {
        Self {
            inner: Arc::new(HubInner {
                config,
                next_id: AtomicU64::new(1),
                subscribers: Mutex::new(HashMap::new()),
                history: Mutex::new(History {
                    events: VecDeque::new(),
                    evicted_through: version,
                }),
            }),
        }
    }

    pub fn config(&self) -> &WatchConfig {
        &self.inner.config
    }

    /// Register a watcher for objects matching `filter`.
    ///
    /// `initial` events are delivered before anything published after this
    /// call. They are held in the watcher itself, so their number is not
    /// limited by the channel capacity.
    pub fn subscribe(&self, filter: ListOptions, initial: Vec<WatchEvent<R>>) -> Watcher<R> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.inner.config.channel_capacity.max(1));
        let replayed = initial.len();

        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Subscriber { filter, sender });

        debug!(watcher = id, replayed, "watcher started");

        let stopped = Arc::new(AtomicBool::new(false));
        Watcher {
            pending: initial.into(),
            receiver,
            handle: StopHandle {
                id,
                stopped,
                hub: Arc::downgrade(&self.inner),
            },
        }
    }

    /// Deliver a committed change to every matching watcher and record it
    /// for resuming watches.
    pub fn publish(&self, event: WatchEvent<R>) {
        self.record(&event);

        let mut subs = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subs.retain(|id, sub| {
            if !sub.filter.matches(event.object.metadata()) {
                return !sub.sender.is_closed();
            }
            match sub.sender.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        watcher = *id,
                        capacity = self.inner.config.channel_capacity,
                        "watcher fell behind, dropping it"
                    );
                    false
                }
                Err(TrySendError::Closed(_)) => false,
            }
        });
    }

    fn record(&self, event: &WatchEvent<R>) {
        let capacity = self.inner.config.history_capacity;
        let mut history = self
            .inner
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        history.events.push_back(event.clone());
        while history.events.len() > capacity {
            if let Some(evicted) = history.events.pop_front() {
                history.evicted_through = history.evicted_through.max(evicted.version());
            }
        }
    }

    /// Retained events newer than `version` that match `filter`, oldest
    /// first.
    ///
    /// Fails with [`WatchError::Expired`] if events newer than `version`
    /// have already been evicted.
    pub fn events_since(&self, version: u64, filter: &ListOptions) -> WatchResult<Vec<WatchEvent<R>>> {
        let history = self
            .inner
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if version < history.evicted_through {
            return Err(WatchError::Expired {
                requested: version,
                oldest_resumable: history.evicted_through,
            });
        }
        Ok(history
            .events
            .iter()
            .filter(|e| e.version() > version && filter.matches(e.object.metadata()))
            .cloned()
            .collect())
    }

    /// Current number of registered watchers.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Cloneable handle that stops a [`Watcher`] from any thread.
pub struct StopHandle<R> {
    id: u64,
    stopped: Arc<AtomicBool>,
    hub: Weak<HubInner<R>>,
}

impl<R> Clone for StopHandle<R> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            stopped: Arc::clone(&self.stopped),
            hub: Weak::clone(&self.hub),
        }
    }
}

impl<R> StopHandle<R> {
    /// Stop the watcher. Safe to call repeatedly and concurrently with
    /// delivery; no event is returned by the watcher afterwards.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self.id);
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// A single subscription's event stream.
///
/// The stream ends (`recv` returns `None`) when the watcher is stopped,
/// when it was dropped for falling behind, or when the hub goes away.
/// Dropping the watcher stops it.
pub struct Watcher<R> {
    pending: VecDeque<WatchEvent<R>>,
    receiver: mpsc::Receiver<WatchEvent<R>>,
    handle: StopHandle<R>,
}

impl<R> Watcher<R> {
    pub fn id(&self) -> u64 {
        self.handle.id
    }

    pub fn stop_handle(&self) -> StopHandle<R> {
        self.handle.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.handle.is_stopped()
    }

    /// Stop this watcher and release its queued events.
    pub fn stop(&mut self) {
        self.handle.stop();
        self.pending.clear();
        self.receiver.close();
    }

    /// Wait for the next event.
    pub async fn recv(&mut self) -> Option<WatchEvent<R>> {
        if self.is_stopped() {
            return None;
        }
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }
        let event = self.receiver.recv().await?;
        if self.is_stopped() {
            return None;
        }
        Some(event)
    }

    /// Blocking variant of [`Watcher::recv`] for use outside an async
    /// runtime.
    pub fn blocking_recv(&mut self) -> Option<WatchEvent<R>> {
        if self.is_stopped() {
            return None;
        }
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }
        let event = self.receiver.blocking_recv()?;
        if self.is_stopped() {
            return None;
        }
        Some(event)
    }

    /// Take the next event if one is ready.
    pub fn try_recv(&mut self) -> Result<WatchEvent<R>, TryRecvError> {
        if self.is_stopped() {
            return Err(TryRecvError::Disconnected);
        }
        if let Some(event) = self.pending.pop_front() {
            return Ok(event);
        }
        self.receiver.try_recv()
    }
}

impl<R> Drop for Watcher<R> {
    fn drop(&mut self) {
        self.handle.stop();
    }
}

impl<R> std::fmt::Debug for Watcher<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.handle.id)
            .field("pending", &self.pending.len())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;
    use fsapi_types::{DynamicObject, ObjectMeta, Selector};
    use std::time::Duration;

    fn obj(name: &str, group: &str, version: u64) -> DynamicObject {
        let mut meta = ObjectMeta::named(name).with_label("group", group);
        meta.resource_version = version.to_string();
        DynamicObject::new(meta)
    }

    fn group(g: &str) -> ListOptions {
        ListOptions::with_labels(Selector::from_set([("group", g)]))
    }

    fn small_hub(channel: usize, history: usize) -> WatchHub<DynamicObject> {
        WatchHub::new(WatchConfig {
            channel_capacity: channel,
            history_capacity: history,
        })
    }

    #[test]
    fn delivers_matching_events_in_publish_order() {
        let hub = WatchHub::new(WatchConfig::default());
        let mut w = hub.subscribe(group("foo"), Vec::new());

        hub.publish(WatchEvent::added(obj("foo-1", "foo", 1)));
        hub.publish(WatchEvent::added(obj("bar-1", "bar", 2)));
        hub.publish(WatchEvent::modified(obj("foo-1", "foo", 3)));

        let e = w.try_recv().unwrap();
        assert_eq!((e.event_type, e.version()), (EventType::Added, 1));
        let e = w.try_recv().unwrap();
        assert_eq!((e.event_type, e.version()), (EventType::Modified, 3));
        assert_eq!(w.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[test]
    fn initial_events_come_first_and_ignore_capacity() {
        let hub = small_hub(1, 10);
        let initial = (1..=5).map(|v| WatchEvent::added(obj("x", "foo", v))).collect();
        let mut w = hub.subscribe(ListOptions::default(), initial);
        hub.publish(WatchEvent::modified(obj("x", "foo", 6)));

        let versions: Vec<u64> = std::iter::from_fn(|| w.try_recv().ok())
            .map(|e| e.version())
            .collect();
        assert_eq!(versions, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn slow_watcher_is_dropped_without_blocking() {
        let hub = small_hub(2, 10);
        let mut slow = hub.subscribe(ListOptions::default(), Vec::new());
        let mut fast = hub.subscribe(ListOptions::default(), Vec::new());

        for v in 1..=2 {
            hub.publish(WatchEvent::added(obj("x", "foo", v)));
        }
        // fast keeps up
        assert_eq!(fast.try_recv().unwrap().version(), 1);
        assert_eq!(fast.try_recv().unwrap().version(), 2);

        // the third event overflows `slow`
        hub.publish(WatchEvent::added(obj("x", "foo", 3)));
        assert_eq!(hub.subscriber_count(), 1);
        assert_eq!(fast.try_recv().unwrap().version(), 3);

        // slow drains what it had, then sees end of stream
        assert_eq!(slow.try_recv().unwrap().version(), 1);
        assert_eq!(slow.try_recv().unwrap().version(), 2);
        assert_eq!(slow.try_recv().unwrap_err(), TryRecvError::Disconnected);
    }

    #[test]
    fn stop_is_idempotent_and_ends_stream() {
        let hub = WatchHub::new(WatchConfig::default());
        let mut w = hub.subscribe(ListOptions::default(), vec![WatchEvent::added(obj("a", "foo", 1))]);
        hub.publish(WatchEvent::added(obj("b", "foo", 2)));

        w.stop();
        w.stop();
        assert!(w.is_stopped());
        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(w.try_recv().unwrap_err(), TryRecvError::Disconnected);

        hub.publish(WatchEvent::added(obj("c", "foo", 3)));
        assert_eq!(w.try_recv().unwrap_err(), TryRecvError::Disconnected);
    }

    #[test]
    fn stop_handle_works_from_another_thread() {
        let hub = WatchHub::new(WatchConfig::default());
        let mut w = hub.subscribe(ListOptions::default(), Vec::new());
        let handle = w.stop_handle();

        let publisher = {
            let hub = hub.clone();
            std::thread::spawn(move || {
                for v in 1..=50 {
                    hub.publish(WatchEvent::added(obj("x", "foo", v)));
                }
            })
        };
        let stopper = std::thread::spawn(move || {
            handle.stop();
            handle.stop();
        });
        publisher.join().unwrap();
        stopper.join().unwrap();

        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(w.try_recv().unwrap_err(), TryRecvError::Disconnected);
    }

    #[test]
    fn dropping_watcher_unsubscribes() {
        let hub = WatchHub::<DynamicObject>::new(WatchConfig::default());
        let w = hub.subscribe(ListOptions::default(), Vec::new());
        assert_eq!(hub.subscriber_count(), 1);
        drop(w);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn events_since_filters_by_version_and_selector() {
        let hub = WatchHub::new(WatchConfig::default());
        hub.publish(WatchEvent::added(obj("foo-1", "foo", 1)));
        hub.publish(WatchEvent::added(obj("bar-1", "bar", 2)));
        hub.publish(WatchEvent::modified(obj("foo-1", "foo", 3)));

        let events = hub.events_since(1, &group("foo")).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].version(), 3);
        assert_eq!(hub.events_since(0, &ListOptions::default()).unwrap().len(), 3);
    }

    #[test]
    fn events_since_expires_after_eviction() {
        let hub = small_hub(10, 2);
        for v in 1..=4 {
            hub.publish(WatchEvent::added(obj("x", "foo", v)));
        }
        // versions 1 and 2 were evicted
        assert_eq!(
            hub.events_since(1, &ListOptions::default()).unwrap_err(),
            WatchError::Expired {
                requested: 1,
                oldest_resumable: 2
            }
        );
        let events = hub.events_since(2, &ListOptions::default()).unwrap();
        assert_eq!(events.iter().map(|e| e.version()).collect::<Vec<_>>(), vec![3, 4]);
    }

    #[test]
    fn history_starts_at_recovered_version() {
        let hub = WatchHub::<DynamicObject>::starting_at(WatchConfig::default(), 7);
        assert!(hub.events_since(3, &ListOptions::default()).is_err());
        assert!(hub.events_since(7, &ListOptions::default()).unwrap().is_empty());
        hub.publish(WatchEvent::added(obj("a", "x", 8)));
        assert_eq!(hub.events_since(7, &ListOptions::default()).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn async_recv_wakes_on_publish() {
        let hub = WatchHub::new(WatchConfig::default());
        let mut w = hub.subscribe(ListOptions::default(), Vec::new());

        let publisher = hub.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            publisher.publish(WatchEvent::deleted(obj("a", "foo", 9)));
        });

        let event = tokio::time::timeout(Duration::from_secs(5), w.recv())
            .await
            .expect("event within timeout")
            .expect("stream open");
        assert_eq!(event.event_type, EventType::Deleted);
        assert_eq!(event.version(), 9);
    }

    #[tokio::test]
    async fn recv_returns_none_after_drop_for_lag() {
        let hub = small_hub(1, 10);
        let mut w = hub.subscribe(ListOptions::default(), Vec::new());
        hub.publish(WatchEvent::added(obj("a", "foo", 1)));
        hub.publish(WatchEvent::added(obj("a", "foo", 2)));

        assert_eq!(w.recv().await.map(|e| e.version()), Some(1));
        assert!(w.recv().await.is_none());
    }
}

//! A bounded, thread-safe FIFO queue with blocking and batch operations.
//!
//! This is the transport beneath the dispatcher: asynchronous subscriptions
//! enqueue onto a bus-wide `BlockingQueue<DispatchItem>` and the dispatcher
//! thread drains it. Built on `std::sync::{Mutex, Condvar}` guarding a
//! `VecDeque`, the std-thread analogue of the `parking_lot::RwLock`-guarded
//! maps in `data/topics/memory.rs` — adapted to a blocking deque since the
//! bus runs on OS threads, not an async runtime.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

struct State<T> {
    items: VecDeque<T>,
    maxsize: usize,
}

impl<T> State<T> {
    fn is_full(&self) -> bool {
        self.maxsize != 0 && self.items.len() >= self.maxsize
    }
}

/// A bounded FIFO queue. `maxsize == 0` means unbounded.
pub struct BlockingQueue<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> BlockingQueue<T> {
    /// Creates a new queue. `maxsize == 0` means unbounded.
    pub fn new(maxsize: usize) -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                maxsize,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// The configured bound (`0` if unbounded).
    pub fn maxsize(&self) -> usize {
        self.state.lock().unwrap().maxsize
    }

    /// Number of items currently queued.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().items.len()
    }

    /// Whether the queue currently holds no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the queue is at or past its bound.
    pub fn is_full(&self) -> bool {
        self.state.lock().unwrap().is_full()
    }

    /// Appends `item` to the back, blocking while the queue is full.
    pub fn put(&self, item: T) {
        let mut state = self.state.lock().unwrap();
        while state.is_full() {
            state = self.not_full.wait(state).unwrap();
        }
        state.items.push_back(item);
        self.not_empty.notify_one();
    }

    /// Appends `item` to the back, blocking at most `timeout` while full.
    ///
    /// Returns `false` if the deadline elapsed before room was available.
    pub fn put_timeout(&self, item: T, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().unwrap();
        while state.is_full() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, result) = self.not_full.wait_timeout(state, deadline - now).unwrap();
            state = guard;
            if result.timed_out() && state.is_full() {
                return false;
            }
        }
        state.items.push_back(item);
        self.not_empty.notify_one();
        true
    }

    /// Prepends `item` to the front, blocking while full unless
    /// `respect_maxsize` is `false`.
    ///
    /// When `respect_maxsize` is `false` the item is always accepted, even if
    /// that pushes the queue one item past `maxsize`.
    pub fn putleft(&self, item: T, respect_maxsize: bool) {
        let mut state = self.state.lock().unwrap();
        if respect_maxsize {
            while state.is_full() {
                state = self.not_full.wait(state).unwrap();
            }
        }
        state.items.push_front(item);
        self.not_empty.notify_one();
    }

    /// Appends a whole batch atomically. A no-op for an empty `items`.
    ///
    /// Blocks until there is room for the *entire* batch, the same
    /// back-pressure contract `put` gives a single item — a bounded queue
    /// can never hold more than `maxsize` items after a `putmany` returns.
    pub fn putmany<I: IntoIterator<Item = T>>(&self, items: I) {
        let batch: Vec<T> = items.into_iter().collect();
        if batch.is_empty() {
            return;
        }
        let mut state = self.state.lock().unwrap();
        while state.maxsize != 0 && state.items.len() + batch.len() > state.maxsize {
            state = self.not_full.wait(state).unwrap();
        }
        let count = batch.len();
        state.items.extend(batch);
        drop(state);
        if count == 1 {
            self.not_empty.notify_one();
        } else {
            self.not_empty.notify_all();
        }
    }

    /// Removes and returns the item at the front, blocking while empty.
    pub fn get(&self) -> T {
        let mut state = self.state.lock().unwrap();
        while state.items.is_empty() {
            state = self.not_empty.wait(state).unwrap();
        }
        let item = state.items.pop_front().expect("checked non-empty above");
        self.not_full.notify_one();
        item
    }

    /// Removes and returns the item at the front, blocking at most
    /// `timeout`. Returns `None` if the deadline elapsed first.
    pub fn get_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().unwrap();
        while state.items.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, result) = self.not_empty.wait_timeout(state, deadline - now).unwrap();
            state = guard;
            if result.timed_out() && state.items.is_empty() {
                return None;
            }
        }
        let item = state.items.pop_front();
        self.not_full.notify_one();
        item
    }

    /// Removes and returns a batch of items.
    ///
    /// With `n = None`, blocks until at least one item is available, then
    /// drains **all** currently available items in one call. With
    /// `n = Some(0)`, returns an empty `Vec` immediately without blocking.
    /// With `n = Some(k)`, `k > 0`, blocks until at least one item is
    /// available, then returns up to `k` items without blocking for more.
    pub fn getmany(&self, n: Option<usize>) -> Vec<T> {
        if n == Some(0) {
            return Vec::new();
        }
        let mut state = self.state.lock().unwrap();
        while state.items.is_empty() {
            state = self.not_empty.wait(state).unwrap();
        }
        let take = n.unwrap_or(usize::MAX).min(state.items.len());
        let drained: Vec<T> = state.items.drain(..take).collect();
        let remaining_notify = !state.items.is_empty();
        drop(state);
        self.not_full.notify_all();
        if remaining_notify {
            self.not_empty.notify_one();
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn get_put_nomaxsize() {
        let q: BlockingQueue<i32> = BlockingQueue::new(0);
        q.put(1);
        q.put(2);
        q.put(3);
        assert_eq!(q.get(), 1);
        assert_eq!(q.get(), 2);
        assert_eq!(q.get(), 3);
        assert!(q.is_empty());
    }

    #[test]
    fn putmany_getmany() {
        let q: BlockingQueue<i32> = BlockingQueue::new(0);
        q.putmany(Vec::<i32>::new());
        assert!(q.is_empty());

        let items = vec![1, 2, 3, 4, 5];
        q.putmany(items.clone());
        assert_eq!(q.getmany(None), items);
        assert!(q.is_empty());

        q.putmany(vec![1, 2, 3]);
        assert_eq!(q.getmany(Some(0)), Vec::<i32>::new());
        assert_eq!(q.len(), 3);
        assert_eq!(q.getmany(Some(2)), vec![1, 2]);
        assert_eq!(q.getmany(None), vec![3]);
    }

    #[test]
    fn putleft_is_lifo_retrievable() {
        let q: BlockingQueue<i32> = BlockingQueue::new(0);
        q.put(1);
        q.putleft(2, true);
        assert_eq!(q.get(), 2);
        assert_eq!(q.get(), 1);
    }

    #[test]
    fn maxsize_respected_by_put_but_not_putleft_unrespected() {
        let q: BlockingQueue<i32> = BlockingQueue::new(3);
        q.put(1);
        q.put(2);
        q.put(3);
        assert!(q.is_full());

        q.putleft(99, false);
        assert_eq!(q.len(), 4);
        assert!(q.is_full());

        assert!(!q.put_timeout(100, Duration::from_millis(20)));
    }

    #[test]
    fn putmany_blocks_until_the_whole_batch_fits() {
        let q = Arc::new(BlockingQueue::new(3));
        q.put(1);
        q.put(2);
        assert_eq!(q.len(), 2);

        let blocked = Arc::clone(&q);
        let handle = thread::spawn(move || {
            blocked.putmany(vec![10, 20, 30]);
        });

        // One free slot isn't enough room for a 3-item batch on top of the
        // 2 already queued; the call must stay blocked.
        thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_finished());
        assert_eq!(q.len(), 2);

        // Draining down to 0 frees enough room for the whole batch at once.
        assert_eq!(q.get(), 1);
        assert_eq!(q.get(), 2);
        handle.join().unwrap();
        assert_eq!(q.len(), 3);
        assert_eq!(q.getmany(None), vec![10, 20, 30]);
    }

    #[test]
    fn multiple_threads_each_item_woken_once() {
        let q = Arc::new(BlockingQueue::new(0));
        let mut handles = Vec::new();
        for _ in 0..10 {
            let q = Arc::clone(&q);
            handles.push(thread::spawn(move || q.get()));
        }
        thread::sleep(Duration::from_millis(50));
        for i in 0..10 {
            q.put(i);
        }
        let mut results: Vec<i32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        results.sort_unstable();
        assert_eq!(results, (0..10).collect::<Vec<_>>());
    }
}

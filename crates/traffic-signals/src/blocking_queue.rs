use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Blocking hand-off queue with newest-first retrieval
///
/// A mutex-guarded buffer paired with a condition variable. Producers never
/// block; receivers sleep on the condvar until a value is available.
///
/// # Ordering
///
/// `receive` pops the most recently sent value (LIFO). The queue carries
/// "latest state" messages, so a slow consumer sees the newest value first
/// and older ones only after it.
///
/// # Wake-ups
///
/// Each `send` wakes exactly one blocked receiver. With several long-lived
/// consumers a value reaches only one of them; fan-out requires one `send`
/// per intended receiver.
///
/// # Poisoning
///
/// Every critical section is a single push or pop, so a panic elsewhere in a
/// lock holder cannot leave the buffer half-updated. A poisoned lock is
/// recovered instead of propagated.
pub struct BlockingQueue<T> {
    state: Mutex<State<T>>,
    available: Condvar,
}

struct State<T> {
    buffer: Vec<T>,
    closed: bool,
}

impl<T> BlockingQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                buffer: Vec::new(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, State<T>>) -> MutexGuard<'a, State<T>> {
        self.available
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Move `value` into the buffer and wake one blocked receiver.
    ///
    /// Never blocks beyond acquiring the lock. Values sent after
    /// [`close`](Self::close) are still buffered.
    pub fn send(&self, value: T) {
        let mut state = self.lock();
        state.buffer.push(value);
        self.available.notify_one();
    }

    /// Block until a value is available and return the newest one.
    ///
    /// The lock is released while waiting and the buffer is re-checked after
    /// every wake, so spurious wake-ups are harmless. Closing the queue does
    /// not interrupt this call; use
    /// [`receive_until_closed`](Self::receive_until_closed) for that.
    pub fn receive(&self) -> T {
        let mut state = self.lock();
        loop {
            if let Some(value) = state.buffer.pop() {
                return value;
            }
            state = self.wait(state);
        }
    }

    /// Like [`receive`](Self::receive), but returns `None` once the queue is
    /// closed and drained.
    pub fn receive_until_closed(&self) -> Option<T> {
        let mut state = self.lock();
        loop {
            if let Some(value) = state.buffer.pop() {
                return Some(value);
            }
            if state.closed {
                return None;
            }
            state = self.wait(state);
        }
    }

    /// Pop the newest value without waiting.
    pub fn try_receive(&self) -> Option<T> {
        self.lock().buffer.pop()
    }

    /// Mark the queue closed and wake every blocked receiver.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of buffered values (snapshot)
    pub fn len(&self) -> usize {
        self.lock().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().buffer.is_empty()
    }
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for BlockingQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("BlockingQueue")
            .field("len", &state.buffer.len())
            .field("closed", &state.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn test_newest_first() {
        let queue = BlockingQueue::new();
        queue.send(1);
        queue.send(2);
        queue.send(3);

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.receive(), 3);
        assert_eq!(queue.receive(), 2);

        queue.send(4);
        assert_eq!(queue.receive(), 4);
        assert_eq!(queue.receive(), 1);
        assert!(queue.is_empty());
        assert_eq!(queue.try_receive(), None);
    }

    #[test]
    fn test_moves_non_copy_values() {
        let queue = BlockingQueue::new();
        queue.send(String::from("first"));
        queue.send(String::from("second"));

        assert_eq!(queue.receive(), "second");
        assert_eq!(queue.try_receive().as_deref(), Some("first"));
    }

    #[test]
    fn test_receive_blocks_until_send() {
        let queue = Arc::new(BlockingQueue::new());
        let producer_queue = queue.clone();

        let start = Instant::now();
        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            producer_queue.send(42u32);
        });

        assert_eq!(queue.receive(), 42);
        assert!(
            start.elapsed() >= Duration::from_millis(90),
            "receive returned before anything was sent"
        );
        producer.join().unwrap();
    }

    #[test]
    fn test_close_releases_waiters() {
        let queue = Arc::new(BlockingQueue::<u8>::new());

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                thread::spawn(move || queue.receive_until_closed())
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        queue.close();

        for waiter in waiters {
            assert_eq!(waiter.join().unwrap(), None);
        }
        assert!(queue.is_closed());
    }

    #[test]
    fn test_plain_receive_ignores_close() {
        let queue = Arc::new(BlockingQueue::<u8>::new());
        let (done_tx, done_rx) = std::sync::mpsc::channel();

        let receiver = {
            let queue = queue.clone();
            thread::spawn(move || done_tx.send(queue.receive()).unwrap())
        };

        thread::sleep(Duration::from_millis(20));
        queue.close();
        assert!(
            done_rx.recv_timeout(Duration::from_millis(100)).is_err(),
            "receive returned on a closed, empty queue"
        );

        queue.send(9);
        assert_eq!(done_rx.recv_timeout(Duration::from_secs(2)).unwrap(), 9);
        receiver.join().unwrap();
    }

    #[test]
    fn test_closed_queue_drains_before_reporting_closed() {
        let queue = BlockingQueue::new();
        queue.send('a');
        queue.close();
        queue.send('b');

        assert_eq!(queue.receive_until_closed(), Some('b'));
        assert_eq!(queue.receive_until_closed(), Some('a'));
        assert_eq!(queue.receive_until_closed(), None);
    }

    #[test]
    fn test_concurrent_producers_and_consumers() {
        const PRODUCERS: u32 = 4;
        const PER_PRODUCER: u32 = 2500;

        let queue = Arc::new(BlockingQueue::new());

        let consumers: Vec<_> = (0..PRODUCERS)
            .map(|_| {
                let queue = queue.clone();
                thread::spawn(move || {
                    let mut received = Vec::new();
                    for _ in 0..PER_PRODUCER {
                        received.push(queue.receive());
                    }
                    received
                })
            })
            .collect();

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        queue.send(p * PER_PRODUCER + i);
                    }
                })
            })
            .collect();

        for producer in producers {
            producer.join().unwrap();
        }

        let mut all: Vec<u32> = consumers
            .into_iter()
            .flat_map(|c| c.join().unwrap())
            .collect();
        all.sort_unstable();

        // Every value delivered exactly once
        assert_eq!(all, (0..PRODUCERS * PER_PRODUCER).collect::<Vec<_>>());
        assert!(queue.is_empty());
    }
}

use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use crate::thread_pool::{ThreadPool, Thunk};
use crate::{Error, ErrorKind, Result};

/// A fixed set of worker threads taking calls from one shared queue.
///
/// A panicking call is caught and its worker keeps serving, so the pool never shrinks. Dropping
/// the pool lets the workers drain the queue, then joins them.
pub struct SharedQueueThreadPool {
    queue: Arc<Queue>,
    workers: Vec<JoinHandle<()>>,
}

struct Queue {
    state: Mutex<QueueState>,
    available: Condvar,
}

struct QueueState {
    jobs: VecDeque<Thunk<'static>>,
    closed: bool,
}

impl Queue {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // jobs never run under the lock, a poisoned state is still consistent
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, job: Thunk<'static>) {
        self.lock().jobs.push_back(job);
        self.available.notify_one();
    }

    /// Wait for the next job, `None` once the queue is closed and drained
    fn pop(&self) -> Option<Thunk<'static>> {
        let mut state = self.lock();
        loop {
            if let Some(job) = state.jobs.pop_front() {
                return Some(job);
            }
            if state.closed {
                return None;
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    fn close(&self) {
        self.lock().closed = true;
        self.available.notify_all();
    }
}

impl ThreadPool for SharedQueueThreadPool {
    fn new(threads: u32) -> Result<Self> {
        let queue = Arc::new(Queue {
            state: Mutex::new(QueueState {
                jobs: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
        });

        let mut pool = Self {
            queue,
            workers: Vec::with_capacity(threads as usize),
        };
        for id in 0..threads {
            let queue = Arc::clone(&pool.queue);
            let worker = thread::Builder::new()
                .name(format!("shared-queue-worker-{}", id))
                .spawn(move || run_worker(&queue))
                .map_err(|err| Error::new(ErrorKind::ThreadPoolBuild, err.to_string()))?;
            pool.workers.push(worker);
        }
        Ok(pool)
    }

    fn spawn<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.queue.push(Box::new(f));
    }
}

fn run_worker(queue: &Queue) {
    while let Some(job) = queue.pop() {
        // the panic is reported by the panic hook, the worker takes the next job
        panic::catch_unwind(AssertUnwindSafe(job)).ok();
    }
}

impl Drop for SharedQueueThreadPool {
    fn drop(&mut self) {
        self.queue.close();
        for worker in self.workers.drain(..) {
            worker.join().ok();
        }
    }
}

impl fmt::Debug for SharedQueueThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedQueueThreadPool")
            .field("threads", &self.workers.len())
            .finish()
    }
}

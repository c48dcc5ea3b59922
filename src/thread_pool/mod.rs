//! Implementations of different type of threadpool that run the server's connection handlers

mod naive;
pub use naive::NaiveThreadPool;

mod shared_queue;
pub use shared_queue::SharedQueueThreadPool;

mod rayon;
pub use self::rayon::RayonThreadPool;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, ErrorKind, Result};

/// Interface of a threads manager that queues jobs and executes the queued jobs when possible.
///
/// A pool is shared by every connection of the server, jobs may be spawned from many threads.
pub trait ThreadPool: Send + Sync + 'static {
    /// Create a threadpool that runs jobs on the given number of threads
    fn new(threads: u32) -> Result<Self>
    where
        Self: Sized;

    /// Executes the given closure if possible, otherwise, queues the task for future execution
    fn spawn<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static;
}

/// Heap-allocated thread's closure
pub type Thunk<'a> = Box<dyn FnOnce() + Send + 'a>;

/// Names of the supported thread pools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThreadPoolVariant {
    /// `NaiveThreadPool`
    Naive,
    /// `SharedQueueThreadPool`
    SharedQueue,
    /// `RayonThreadPool`
    Rayon,
}

impl Default for ThreadPoolVariant {
    fn default() -> Self {
        Self::SharedQueue
    }
}

impl FromStr for ThreadPoolVariant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "naive" => Ok(Self::Naive),
            "shared-queue" => Ok(Self::SharedQueue),
            "rayon" => Ok(Self::Rayon),
            _ => Err(Error::new(ErrorKind::UnsupportedThreadPool, s)),
        }
    }
}

impl fmt::Display for ThreadPoolVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Naive => write!(f, "naive"),
            Self::SharedQueue => write!(f, "shared-queue"),
            Self::Rayon => write!(f, "rayon"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_utils::sync::WaitGroup;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn spawn_counter<P>(pool: P)
    where
        P: ThreadPool,
    {
        const TASK_NUM: usize = 20;
        const ADD_COUNT: usize = 1000;

        let wg = WaitGroup::new();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..TASK_NUM {
            let counter = Arc::clone(&counter);
            let wg = wg.clone();
            pool.spawn(move || {
                for _ in 0..ADD_COUNT {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
                drop(wg);
            })
        }

        wg.wait();
        assert_eq!(counter.load(Ordering::SeqCst), TASK_NUM * ADD_COUNT);
    }

    #[test]
    fn naive_thread_pool_spawn_counter() {
        spawn_counter(NaiveThreadPool::new(4).unwrap());
    }

    #[test]
    fn shared_queue_thread_pool_spawn_counter() {
        spawn_counter(SharedQueueThreadPool::new(4).unwrap());
    }

    #[test]
    fn rayon_thread_pool_spawn_counter() {
        spawn_counter(RayonThreadPool::new(4).unwrap());
    }

    #[test]
    fn shared_queue_thread_pool_panic_task() {
        const TASK_NUM: usize = 20;

        let pool = SharedQueueThreadPool::new(4).unwrap();
        for _ in 0..TASK_NUM {
            pool.spawn(|| panic!("job panicked on purpose"));
        }
        // the workers survived, the pool still runs jobs
        spawn_counter(pool);
    }

    #[test]
    fn shared_queue_thread_pool_drop_runs_queued_jobs() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let pool = SharedQueueThreadPool::new(1).unwrap();
            for _ in 0..10 {
                let counter = Arc::clone(&counter);
                pool.spawn(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                });
            }
        }
        assert_eq!(10, counter.load(Ordering::SeqCst));
    }

    #[test]
    fn shared_queue_thread_pool_spawn_from_many_threads() {
        let pool = Arc::new(SharedQueueThreadPool::new(2).unwrap());
        let counter = Arc::new(AtomicUsize::new(0));
        let wg = WaitGroup::new();

        let spawners: Vec<_> = (0..4)
            .map(|_| {
                let pool = Arc::clone(&pool);
                let counter = Arc::clone(&counter);
                let wg = wg.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let counter = Arc::clone(&counter);
                        let wg = wg.clone();
                        pool.spawn(move || {
                            counter.fetch_add(1, Ordering::SeqCst);
                            drop(wg);
                        });
                    }
                })
            })
            .collect();
        for spawner in spawners {
            spawner.join().unwrap();
        }
        wg.wait();
        assert_eq!(400, counter.load(Ordering::SeqCst));
    }

    #[test]
    fn parse_variant() {
        assert_eq!(ThreadPoolVariant::Naive, "naive".parse().unwrap());
        assert_eq!(
            ThreadPoolVariant::SharedQueue,
            "shared-queue".parse().unwrap()
        );
        assert_eq!(ThreadPoolVariant::Rayon, "rayon".parse().unwrap());
        let err = "fifo".parse::<ThreadPoolVariant>().unwrap_err();
        assert_eq!(Some(ErrorKind::UnsupportedThreadPool), err.kind());
    }
}

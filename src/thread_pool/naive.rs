use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use crate::thread_pool::ThreadPool;
use crate::Result;

/// Runs every call on a thread of its own, no thread is reused
#[derive(Debug, Default)]
pub struct NaiveThreadPool {
    spawned: AtomicUsize,
}

impl ThreadPool for NaiveThreadPool {
    fn new(_threads: u32) -> Result<Self> {
        Ok(Self::default())
    }

    /// A call whose thread cannot be spawned is dropped, its caller sees the call as abandoned.
    fn spawn<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.spawned.fetch_add(1, Ordering::Relaxed);
        thread::Builder::new()
            .name(format!("naive-call-{}", id))
            .spawn(f)
            .ok();
    }
}

use crate::thread_pool::ThreadPool;
use crate::{Error, ErrorKind, Result};

/// A thread pool that hands its jobs to a dedicated `rayon` pool
#[derive(Debug)]
pub struct RayonThreadPool {
    pool: rayon::ThreadPool,
}

impl ThreadPool for RayonThreadPool {
    fn new(threads: u32) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads as usize)
            .thread_name(|i| format!("rayon-worker-{}", i))
            // a panicking job must not abort the whole server
            .panic_handler(|_| {})
            .build()
            .map_err(|err| Error::new(ErrorKind::ThreadPoolBuild, err.to_string()))?;
        Ok(Self { pool })
    }

    fn spawn<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.spawn(f);
    }
}

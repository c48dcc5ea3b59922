use std::fmt;

/// Heap-allocated completion callback
pub type Closure = Box<dyn FnOnce() + Send + 'static>;

/// Signals the transport that the response of a call is ready to be sent.
///
/// The callback runs exactly once: either when `run` is called, or when the guard is dropped.
/// Handlers that finish the call later, on another thread, take the callback out with `release`
/// and become responsible for running it.
pub struct Done {
    closure: Option<Closure>,
}

impl Done {
    /// Guard the given completion callback
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            closure: Some(Box::new(f)),
        }
    }

    /// Signal the completion now
    pub fn run(mut self) {
        self.complete();
    }

    /// Take the callback out of the guard without running it
    pub fn release(mut self) -> Closure {
        self.closure.take().unwrap_or_else(|| Box::new(|| {}))
    }

    fn complete(&mut self) {
        if let Some(closure) = self.closure.take() {
            closure();
        }
    }
}

impl Drop for Done {
    fn drop(&mut self) {
        self.complete();
    }
}

impl fmt::Debug for Done {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Done")
            .field("pending", &self.closure.is_some())
            .finish()
    }
}

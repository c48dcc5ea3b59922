//! The process-scoped storage that backs every request of the server.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{KvsEngine, Result, SledKvsEngine};

/// Default directory of the backing store
pub const DEFAULT_DB_PATH: &str = "/tmp/experiment_rocksdb";

/// Owns the storage engine that is opened when the server boots.
///
/// The store is ephemeral: closing the handle flushes the engine and then removes its directory
/// from the file system. A handle that goes out of scope without being closed is closed on drop,
/// so the clean up runs exactly once. Failing to remove the directory is logged and never
/// escalated. The directory is kept, with a warning, while any other owner still holds the
/// engine.
///
/// # Usages
///
/// ```
/// use echo_kvs::{KvsEngine, Result, StorageHandle};
/// use tempfile::TempDir;
///
/// fn main() -> Result<()> {
///     let logger = slog::Logger::root(slog::Discard, slog::o!());
///     let temp_dir = TempDir::new().expect("unable to create temporary working directory");
///     let db_path = temp_dir.path().join("db");
///
///     let storage = StorageHandle::open(&db_path, &logger)?;
///     storage.engine().set(b"key", b"val")?;
///     assert_eq!(Some(b"val".to_vec()), storage.engine().get(b"key")?);
///
///     storage.close();
///     assert!(!db_path.exists());
///     Ok(())
/// }
/// ```
pub struct StorageHandle<E = SledKvsEngine>
where
    E: KvsEngine,
{
    path: PathBuf,
    engine: Option<Arc<E>>,
    logger: slog::Logger,
}

impl StorageHandle<SledKvsEngine> {
    /// Open the sled store at the given path, creating it if missing.
    pub fn open<P>(path: P, logger: &slog::Logger) -> Result<Self>
    where
        P: Into<PathBuf>,
    {
        let path = path.into();
        fs::create_dir_all(&path)?;
        let engine = SledKvsEngine::open(&path)?;
        Ok(Self::with_engine(path, engine, logger))
    }
}

impl<E> StorageHandle<E>
where
    E: KvsEngine,
{
    /// Take ownership of an engine that was opened at `path`.
    pub fn with_engine<P>(path: P, engine: E, logger: &slog::Logger) -> Self
    where
        P: Into<PathBuf>,
    {
        let path = path.into();
        let logger = logger.new(o!("db_path" => path.display().to_string()));
        info!(logger, "Opened storage");
        Self {
            path,
            engine: Some(Arc::new(engine)),
            logger,
        }
    }

    /// Path of the backing directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get a shared reference to the opened engine.
    pub fn engine(&self) -> Arc<E> {
        match self.engine {
            Some(ref engine) => Arc::clone(engine),
            None => unreachable!("storage handle is used after being closed"),
        }
    }

    /// Flush and release the engine, then remove the backing directory.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        let engine = match self.engine.take() {
            Some(engine) => engine,
            None => return,
        };
        info!(self.logger, "Terminating, removing storage");

        if let Err(err) = engine.flush() {
            warn!(self.logger, "Could not flush storage"; "error" => %err);
        }
        let refs = Arc::strong_count(&engine) - 1;
        if refs > 0 {
            // the directory outlives every owner of the engine
            warn!(self.logger, "Storage is still referenced, keeping it"; "refs" => refs);
            return;
        }
        drop(engine);

        if let Err(err) = fs::remove_dir_all(&self.path) {
            warn!(self.logger, "Failed to remove storage"; "error" => %err);
        }
    }
}

impl<E> Drop for StorageHandle<E>
where
    E: KvsEngine,
{
    fn drop(&mut self) {
        self.release();
    }
}

impl<E> fmt::Debug for StorageHandle<E>
where
    E: KvsEngine,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageHandle")
            .field("path", &self.path)
            .field("open", &self.engine.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn logger() -> slog::Logger {
        slog::Logger::root(slog::Discard, o!())
    }

    #[test]
    fn open_creates_missing_directory() {
        let tmpdir = TempDir::new().unwrap();
        let db_path = tmpdir.path().join("nested").join("db");

        let storage = StorageHandle::open(&db_path, &logger()).unwrap();
        assert!(db_path.is_dir());
        assert_eq!(db_path.as_path(), storage.path());
    }

    #[test]
    fn close_removes_directory() {
        let tmpdir = TempDir::new().unwrap();
        let db_path = tmpdir.path().join("db");

        let storage = StorageHandle::open(&db_path, &logger()).unwrap();
        storage.engine().set(b"key", b"val").unwrap();
        storage.close();
        assert!(!db_path.exists());
    }

    #[test]
    fn drop_removes_directory() {
        let tmpdir = TempDir::new().unwrap();
        let db_path = tmpdir.path().join("db");
        {
            let _storage = StorageHandle::open(&db_path, &logger()).unwrap();
            assert!(db_path.exists());
        }
        assert!(!db_path.exists());
    }

    #[test]
    fn close_tolerates_missing_directory() {
        let tmpdir = TempDir::new().unwrap();
        let db_path = tmpdir.path().join("db");

        let storage = StorageHandle::open(&db_path, &logger()).unwrap();
        fs::remove_dir_all(&db_path).unwrap();
        storage.close();
        assert!(!db_path.exists());
    }

    #[test]
    fn close_keeps_directory_of_referenced_engine() {
        let tmpdir = TempDir::new().unwrap();
        let db_path = tmpdir.path().join("db");

        let storage = StorageHandle::open(&db_path, &logger()).unwrap();
        let engine = storage.engine();
        storage.close();
        assert!(db_path.exists());

        engine.set(b"key", b"val").unwrap();
        assert_eq!(Some(b"val".to_vec()), engine.get(b"key").unwrap());
    }
}

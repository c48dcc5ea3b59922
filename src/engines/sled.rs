//! An `KvsEngine` that proxies method calls to the underlying `sled` key-value store.

use std::path::PathBuf;

use crate::{Error, ErrorKind, KvsEngine, Result};

/// A key-value store that uses sled as the underlying data storage engine
#[derive(Debug, Clone)]
pub struct SledKvsEngine {
    db: sled::Db,
}

impl SledKvsEngine {
    /// Start the storage engine with the file system created at the given path, the directory is
    /// created if it is missing.
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: Into<PathBuf>,
    {
        let db = sled::open(path.into())?;
        Ok(Self { db })
    }
}

impl KvsEngine for SledKvsEngine {
    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.db.insert(key, value)?;
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let value = self.db.get(key)?;
        Ok(value.map(|v| v.to_vec()))
    }

    fn remove(&self, key: &[u8]) -> Result<()> {
        match self.db.remove(key)? {
            Some(_) => Ok(()),
            None => Err(Error::from(ErrorKind::KeyNotFound)),
        }
    }

    fn replace(&self, key: &[u8], value: &[u8]) -> Result<()> {
        // retry until the swap is applied against the value we observed, a concurrent remove makes
        // the next lookup miss
        loop {
            let current = match self.db.get(key)? {
                Some(current) => current,
                None => return Err(Error::from(ErrorKind::KeyNotFound)),
            };
            if self
                .db
                .compare_and_swap(key, Some(current), Some(value))?
                .is_ok()
            {
                return Ok(());
            }
        }
    }

    fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

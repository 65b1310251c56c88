//! File-backed [`LocalCache`] for a single device.
//!
//! Each key maps to one file under a capability-scoped directory. File names
//! are the SHA-256 of the key, so arbitrary key text never reaches the file
//! system. Writes go to a hidden temporary file that is then renamed over the
//! target, so a crash never leaves a partially written entry.

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use cap_std::ambient_authority;
use cap_std::fs::{Dir, OpenOptions};
use sha2::{Digest, Sha256};

use crate::domain::ports::{CacheKey, LocalCache, LocalCacheError};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

const ENTRY_EXTENSION: &str = "entry";

/// Local cache persisted as files under one directory.
#[derive(Debug, Clone)]
pub struct FileLocalCache {
    dir: Arc<Dir>,
}

impl FileLocalCache {
    /// Open the cache rooted at `path`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`LocalCacheError::Backend`] when the directory cannot be
    /// created or opened.
    pub fn open(path: &Path) -> Result<Self, LocalCacheError> {
        Dir::create_ambient_dir_all(path, ambient_authority()).map_err(|err| {
            LocalCacheError::backend(format!("create {}: {err}", path.display()))
        })?;
        let dir = Dir::open_ambient_dir(path, ambient_authority()).map_err(|err| {
            LocalCacheError::backend(format!("open {}: {err}", path.display()))
        })?;
        Ok(Self::from_dir(dir))
    }

    /// Wrap an already opened directory.
    pub fn from_dir(dir: Dir) -> Self {
        Self { dir: Arc::new(dir) }
    }

    async fn run_blocking<T, F>(&self, operation: F) -> Result<T, LocalCacheError>
    where
        T: Send + 'static,
        F: FnOnce(&Dir) -> io::Result<T> + Send + 'static,
    {
        let dir = Arc::clone(&self.dir);
        tokio::task::spawn_blocking(move || operation(&dir))
            .await
            .map_err(|err| LocalCacheError::backend(format!("cache task failed: {err}")))?
            .map_err(|err| LocalCacheError::backend(err.to_string()))
    }
}

fn entry_name(key: &CacheKey) -> String {
    let digest = Sha256::digest(key.as_str().as_bytes());
    format!("{}.{ENTRY_EXTENSION}", hex::encode(digest))
}

fn read_entry(dir: &Dir, name: &str) -> io::Result<Option<String>> {
    match dir.read_to_string(name) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

fn remove_entry(dir: &Dir, name: &str) -> io::Result<()> {
    match dir.remove_file(name) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

fn write_atomic(dir: &Dir, name: &str, contents: &str) -> io::Result<()> {
    let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_nanos());
    let tmp_name = format!(".{name}.tmp.{}.{suffix}.{counter}", std::process::id());

    if let Err(err) = write_temp_file(dir, &tmp_name, contents) {
        drop(dir.remove_file(&tmp_name));
        return Err(err);
    }
    if let Err(err) = replace_entry(dir, &tmp_name, name) {
        drop(dir.remove_file(&tmp_name));
        return Err(err);
    }
    // Directory sync is best effort.
    drop(dir.open(".").and_then(|handle| handle.sync_all()));
    Ok(())
}

fn write_temp_file(dir: &Dir, tmp_name: &str, contents: &str) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    let mut file = dir.open_with(tmp_name, &options)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()
}

#[cfg(windows)]
fn replace_entry(dir: &Dir, tmp_name: &str, name: &str) -> io::Result<()> {
    remove_entry(dir, name)?;
    dir.rename(tmp_name, dir, name)
}

#[cfg(not(windows))]
fn replace_entry(dir: &Dir, tmp_name: &str, name: &str) -> io::Result<()> {
    dir.rename(tmp_name, dir, name)
}

#[async_trait]
impl LocalCache for FileLocalCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, LocalCacheError> {
        let name = entry_name(key);
        self.run_blocking(move |dir| read_entry(dir, &name)).await
    }

    async fn set(&self, key: &CacheKey, value: &str) -> Result<(), LocalCacheError> {
        let name = entry_name(key);
        let contents = value.to_owned();
        self.run_blocking(move |dir| write_atomic(dir, &name, &contents))
            .await
    }

    async fn remove(&self, key: &CacheKey) -> Result<(), LocalCacheError> {
        let name = entry_name(key);
        self.run_blocking(move |dir| remove_entry(dir, &name)).await
    }
}

#[cfg(test)]
mod tests {
    //! Exercises the file cache against a temporary directory.
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn temp_dir() -> TempDir {
        tempfile::tempdir().expect("temp dir")
    }

    fn key(raw: &str) -> CacheKey {
        CacheKey::new(raw).expect("key")
    }

    #[rstest]
    #[tokio::test]
    async fn missing_entries_read_as_none(temp_dir: TempDir) {
        let cache = FileLocalCache::open(temp_dir.path()).expect("open");
        assert_eq!(cache.get(&key("favorites_alice")).await.expect("get"), None);
    }

    #[rstest]
    #[tokio::test]
    async fn entries_survive_reopening(temp_dir: TempDir) {
        let first = FileLocalCache::open(temp_dir.path()).expect("open");
        first
            .set(&key("favorites_alice"), r#"["Golden Bear Cafe"]"#)
            .await
            .expect("set");
        drop(first);

        let reopened = FileLocalCache::open(temp_dir.path()).expect("reopen");
        assert_eq!(
            reopened
                .get(&key("favorites_alice"))
                .await
                .expect("get")
                .as_deref(),
            Some(r#"["Golden Bear Cafe"]"#)
        );
    }

    #[rstest]
    #[tokio::test]
    async fn overwrite_leaves_no_temporary_files(temp_dir: TempDir) {
        let cache = FileLocalCache::open(temp_dir.path()).expect("open");
        cache.set(&key("k"), "one").await.expect("first");
        cache.set(&key("k"), "two").await.expect("second");

        let names: Vec<String> = std::fs::read_dir(temp_dir.path())
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![entry_name(&key("k"))]);
        assert_eq!(cache.get(&key("k")).await.expect("get").as_deref(), Some("two"));
    }

    #[rstest]
    #[tokio::test]
    async fn remove_is_idempotent(temp_dir: TempDir) {
        let cache = FileLocalCache::open(temp_dir.path()).expect("open");
        cache.set(&key("k"), "value").await.expect("set");

        cache.remove(&key("k")).await.expect("remove");
        cache.remove(&key("k")).await.expect("remove again");

        assert_eq!(cache.get(&key("k")).await.expect("get"), None);
    }

    #[rstest]
    fn key_text_never_reaches_the_file_system() {
        let name = entry_name(&key("../../etc/passwd"));
        assert!(!name.contains('/'));
        assert!(name.ends_with(".entry"));
    }

    #[rstest]
    #[tokio::test]
    async fn separate_directories_are_separate_devices() {
        let phone = tempfile::tempdir().expect("phone dir");
        let laptop = tempfile::tempdir().expect("laptop dir");
        let phone_cache = FileLocalCache::open(phone.path()).expect("open phone");
        let laptop_cache = FileLocalCache::open(laptop.path()).expect("open laptop");

        phone_cache.set(&key("favorites_alice"), "[]").await.expect("set");

        assert_eq!(
            laptop_cache.get(&key("favorites_alice")).await.expect("get"),
            None
        );
    }
}

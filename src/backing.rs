use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use memmap2::{MmapMut, MmapOptions};

use crate::config::BackingConfig;

/// A scratch file on disk together with a shared, writable mapping of all of its bytes.
///
/// Dropping a `Backing` unmaps and closes it but leaves the file in place. Use
/// [`Backing::release`] to decide whether the file goes too.
pub(crate) struct Backing {
    mmap: MmapMut,
    file: File,
    path: PathBuf,
}

impl Backing {
    /// Create a brand new file of exactly `n_bytes` bytes under `config.dir` and map it.
    ///
    /// If sizing or mapping fails, the half-made file is removed again.
    pub fn create(config: &BackingConfig, n_bytes: usize) -> Result<Self> {
        ensure!(n_bytes > 0, "refusing to map an empty backing file");
        let (file, path) = Self::open_fresh(config)?;

        let mapped = file
            .set_len(n_bytes as u64)
            .with_context(|| format!("failed to size {path:?} to {n_bytes} bytes"))
            .and_then(|_| {
                // SAFETY: the file was just created by us with create-new semantics and
                // is only reachable through this mapping.
                let mmap = unsafe { MmapOptions::new().len(n_bytes).map_mut(&file) };
                mmap.with_context(|| format!("failed to map {path:?}"))
            });

        match mapped {
            Ok(mmap) => {
                tracing::debug!(?path, n_bytes, "created backing file");
                Ok(Self { mmap, file, path })
            }
            Err(err) => {
                drop(file);
                remove_backing_file(&path);
                Err(err)
            }
        }
    }

    fn open_fresh(config: &BackingConfig) -> Result<(File, PathBuf)> {
        let attempts = config.create_attempts.max(1);
        for _ in 0..attempts {
            let path = config.next_path();
            let mut options = File::options();
            options.read(true).write(true).create_new(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(0o666);
            }
            match options.open(&path) {
                Ok(file) => return Ok((file, path)),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    tracing::warn!(?path, "backing file name already taken, trying another");
                }
                Err(err) => {
                    return Err(err)
                        .with_context(|| format!("failed to create backing file {path:?}"))
                }
            }
        }
        bail!(
            "no unused backing file name found in {:?} after {} attempts",
            config.dir,
            attempts
        );
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        &self.mmap
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.mmap
    }

    /// Unmap and close, then delete the file if asked to.
    ///
    /// A failed delete is only logged: by this point the caller no longer depends on the file.
    pub fn release(self, delete: bool) {
        let Self { mmap, file, path } = self;
        drop(mmap);
        drop(file);
        if delete {
            remove_backing_file(&path);
        } else {
            tracing::debug!(?path, "closed backing file");
        }
    }
}

/// Delete a backing file, logging rather than failing if it cannot be removed.
fn remove_backing_file(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(?path, "deleted backing file");
            true
        }
        Err(err) => {
            tracing::warn!(?path, %err, "failed to delete backing file");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::NameGenerator;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    #[derive(Debug)]
    struct FixedNames(Mutex<Vec<&'static str>>);

    impl NameGenerator for FixedNames {
        fn next_name(&self, _prefix: &str) -> String {
            self.0.lock().unwrap().remove(0).to_string()
        }
    }

    #[test]
    fn test_create_sizes_file() {
        let tmp_dir = tempdir().unwrap();
        let config = BackingConfig::new(tmp_dir.path());

        let mut backing = Backing::create(&config, 24).unwrap();
        assert_eq!(backing.bytes().len(), 24);
        assert!(backing.bytes().iter().all(|b| *b == 0));
        assert_eq!(fs::metadata(backing.path()).unwrap().len(), 24);

        backing.bytes_mut()[3] = 7;
        assert_eq!(backing.bytes()[3], 7);
    }

    #[test]
    fn test_release_keep_and_delete() {
        let tmp_dir = tempdir().unwrap();
        let config = BackingConfig::new(tmp_dir.path());

        let kept = Backing::create(&config, 8).unwrap();
        let kept_path = kept.path().to_path_buf();
        kept.release(false);
        assert!(kept_path.is_file());

        let deleted = Backing::create(&config, 8).unwrap();
        let deleted_path = deleted.path().to_path_buf();
        deleted.release(true);
        assert!(!deleted_path.exists());
    }

    #[test]
    fn test_create_retries_taken_names() {
        let tmp_dir = tempdir().unwrap();
        fs::write(tmp_dir.path().join("taken"), b"do not touch").unwrap();
        let names = FixedNames(Mutex::new(vec!["taken", "free"]));
        let config = BackingConfig::new(tmp_dir.path()).with_names(Arc::new(names));

        let backing = Backing::create(&config, 16).unwrap();
        assert_eq!(backing.path(), tmp_dir.path().join("free"));
        assert_eq!(fs::read(tmp_dir.path().join("taken")).unwrap(), b"do not touch");
    }

    #[test]
    fn test_create_gives_up_after_attempts() {
        let tmp_dir = tempdir().unwrap();
        fs::write(tmp_dir.path().join("taken"), b"").unwrap();
        let names = FixedNames(Mutex::new(vec!["taken", "taken"]));
        let config = BackingConfig::new(tmp_dir.path())
            .with_names(Arc::new(names))
            .with_create_attempts(2);

        assert!(Backing::create(&config, 16).is_err());
    }

    #[test]
    fn test_remove_backing_file() {
        let tmp_dir = tempdir().unwrap();
        let path = tmp_dir.path().join("scratch");
        fs::write(&path, b"").unwrap();
        assert!(remove_backing_file(&path));
        assert!(!path.exists());
        assert!(!remove_backing_file(&path));
    }

    #[test]
    fn test_create_in_missing_dir_fails() {
        let tmp_dir = tempdir().unwrap();
        let config = BackingConfig::new(tmp_dir.path().join("missing"));
        assert!(Backing::create(&config, 16).is_err());
    }
}

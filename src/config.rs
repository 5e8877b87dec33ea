use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::naming::{NameGenerator, PidRandomNames};

/// What happens to the backing file when a `DiskArray` is dropped or cleared.
///
/// Remaps always delete the file they replace; this only governs the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DropPolicy {
    /// Unmap and close, leaving the file in place for inspection.
    #[default]
    Keep,
    /// Unmap, close and delete.
    Delete,
}

/// Where and how backing files get created.
#[derive(Debug, Clone)]
pub struct BackingConfig {
    pub dir: PathBuf,
    pub prefix: String,
    pub drop_policy: DropPolicy,
    pub create_attempts: usize,
    pub names: Arc<dyn NameGenerator>,
}

impl BackingConfig {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Backing files in `dir` that are deleted on drop as well as on remap.
    pub fn scratch<P: AsRef<Path>>(dir: P) -> Self {
        Self::new(dir).with_drop_policy(DropPolicy::Delete)
    }

    pub fn with_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_drop_policy(mut self, drop_policy: DropPolicy) -> Self {
        self.drop_policy = drop_policy;
        self
    }

    pub fn with_create_attempts(mut self, create_attempts: usize) -> Self {
        self.create_attempts = create_attempts;
        self
    }

    pub fn with_names(mut self, names: Arc<dyn NameGenerator>) -> Self {
        self.names = names;
        self
    }

    pub(crate) fn next_path(&self) -> PathBuf {
        self.dir.join(self.names.next_name(&self.prefix))
    }
}

impl Default for BackingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            prefix: String::from("file"),
            drop_policy: DropPolicy::Keep,
            create_attempts: 8,
            names: Arc::new(PidRandomNames),
        }
    }
}

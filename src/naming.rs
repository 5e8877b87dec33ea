// Names for backing files.

use std::fmt::Debug;

/// Mints file names for backing files.
///
/// Names only need to be unlikely to collide between instances running in the same
/// directory. Collisions that do happen are caught when the file is created with
/// create-new semantics, and a fresh name is requested.
pub trait NameGenerator: Debug + Send + Sync {
    fn next_name(&self, prefix: &str) -> String;
}

/// Process id plus a random 64-bit token, rendered in hex.
#[derive(Debug, Default, Clone, Copy)]
pub struct PidRandomNames;

impl NameGenerator for PidRandomNames {
    fn next_name(&self, prefix: &str) -> String {
        format!("{}_{}_{:x}", prefix, std::process::id(), rand::random::<u64>())
    }
}

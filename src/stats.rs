// Stats for logging while filling a DiskArray.

use anyhow::Result;
use bytemuck::Pod;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::prelude::*;
use std::mem::size_of;
use std::path::Path;

use crate::disk_array::DiskArray;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FillStats {
    pub n_items: usize,
    pub capacity: usize,
    pub n_bytes: u64,
    pub n_remaps: usize,
    pub physical_mem: Option<usize>,
    pub virtual_mem: Option<usize>,
    pub elapsed_time: f32,
}

impl FillStats {
    pub fn from_array<T: Pod>(array: &DiskArray<T>, n_remaps: usize, elapsed_time: f32) -> Self {
        let usage = memory_stats::memory_stats();
        Self {
            n_items: array.len(),
            capacity: array.capacity(),
            n_bytes: (array.capacity() * size_of::<T>()) as u64,
            n_remaps,
            physical_mem: usage.as_ref().map(|usage| usage.physical_mem),
            virtual_mem: usage.as_ref().map(|usage| usage.virtual_mem),
            elapsed_time,
        }
    }

    /// Fraction of the backing file holding live items.
    pub fn get_fill_ratio(&self) -> f64 {
        if self.capacity == 0 {
            return 1.;
        }
        (self.n_items as f64) / (self.capacity as f64)
    }

    pub fn append_to_jsonl<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let blob = serde_json::to_string(self)?;

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(writeln!(file, "{}", blob)?)
    }
}

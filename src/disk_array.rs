use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker;
use std::mem::size_of;
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::slice;

use anyhow::{anyhow, bail, ensure, Result};
use bytemuck::Pod;

use crate::backing::Backing;
use crate::config::{BackingConfig, DropPolicy};

/// A vec-like data structure whose storage is a memory-mapped scratch file.
///
/// Items are plain-old-data and are moved around as raw bytes, so growing, copying and
/// trimming never run per-item code. Whenever the capacity changes, a new file of the
/// new size is created, the live bytes are copied over, and only then is the previous
/// file unmapped and deleted.
pub struct DiskArray<T>
where
    T: Pod,
{
    len: usize,
    capacity: usize,
    backing: Option<Backing>,
    config: BackingConfig,
    _marker: marker::PhantomData<T>,
}

impl<T> DiskArray<T>
where
    T: Pod,
{
    const ITEM_SIZE: usize = {
        assert!(size_of::<T>() != 0, "DiskArray does not support zero-sized items");
        size_of::<T>()
    };

    /// Create an empty `DiskArray<T>`. No file is created until capacity is needed.
    pub fn new(config: BackingConfig) -> Self {
        Self {
            len: 0,
            capacity: 0,
            backing: None,
            config,
            _marker: marker::PhantomData::<T>,
        }
    }

    /// Create a `DiskArray<T>` holding `len` zeroed items.
    pub fn with_len(config: BackingConfig, len: usize) -> Result<Self> {
        let mut array = Self::new(config);
        array.reallocate(len)?;
        array.len = len;
        Ok(array)
    }

    /// Create a `DiskArray<T>` holding `len` copies of `value`.
    pub fn from_elem(config: BackingConfig, len: usize, value: T) -> Result<Self> {
        Self::from_elem_with_capacity(config, len, value, len)
    }

    /// Like [`DiskArray::from_elem`], but with room for `capacity` items.
    ///
    /// Fails if `len > capacity`. Items past `len` are left zeroed.
    pub fn from_elem_with_capacity(
        config: BackingConfig,
        len: usize,
        value: T,
        capacity: usize,
    ) -> Result<Self> {
        ensure!(
            len <= capacity,
            "length {} exceeds requested capacity {}",
            len,
            capacity
        );
        let mut array = Self::new(config);
        array.reallocate(capacity)?;
        array.len = len;
        array.as_mut_slice().fill(value);
        Ok(array)
    }

    /// Copy `items` into a new `DiskArray<T>`.
    pub fn from_slice(config: BackingConfig, items: &[T]) -> Result<Self> {
        Self::from_slice_with_capacity(config, items, items.len())
    }

    /// Like [`DiskArray::from_slice`], but with room for `capacity` items.
    pub fn from_slice_with_capacity(
        config: BackingConfig,
        items: &[T],
        capacity: usize,
    ) -> Result<Self> {
        ensure!(
            items.len() <= capacity,
            "length {} exceeds requested capacity {}",
            items.len(),
            capacity
        );
        let mut array = Self::new(config);
        array.reallocate(capacity)?;
        array.len = items.len();
        array.as_mut_slice().copy_from_slice(items);
        Ok(array)
    }

    /// Copy this array into a new, independent backing file with the same capacity.
    pub fn try_clone(&self) -> Result<Self> {
        Self::from_slice_with_capacity(self.config.clone(), self.as_slice(), self.capacity)
    }

    /// The number of items in the `DiskArray`.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the `DiskArray` is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The number of items the current backing file can hold without a remap.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The largest capacity a `DiskArray<T>` can be mapped with.
    pub fn max_len(&self) -> usize {
        isize::MAX as usize / Self::ITEM_SIZE
    }

    /// Path of the current backing file, if one exists.
    pub fn path(&self) -> Option<&Path> {
        self.backing.as_ref().map(Backing::path)
    }

    pub fn config(&self) -> &BackingConfig {
        &self.config
    }

    pub fn as_slice(&self) -> &[T] {
        match &self.backing {
            Some(backing) => {
                let items: &[T] = bytemuck::cast_slice(backing.bytes());
                &items[..self.len]
            }
            None => &[],
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        let len = self.len;
        &mut self.slots_mut()[..len]
    }

    // Every slot up to capacity, including the stale ones past `len`.
    fn slots_mut(&mut self) -> &mut [T] {
        match &mut self.backing {
            Some(backing) => bytemuck::cast_slice_mut(backing.bytes_mut()),
            None => &mut [],
        }
    }

    /// Get the item at the given index, failing if it is out of bounds.
    pub fn at(&self, index: usize) -> Result<&T> {
        let len = self.len;
        self.as_slice()
            .get(index)
            .ok_or_else(|| anyhow!("index {} out of bounds for DiskArray of size {}", index, len))
    }

    /// Mutable version of [`DiskArray::at`].
    pub fn at_mut(&mut self, index: usize) -> Result<&mut T> {
        let len = self.len;
        self.as_mut_slice()
            .get_mut(index)
            .ok_or_else(|| anyhow!("index {} out of bounds for DiskArray of size {}", index, len))
    }

    pub fn front(&self) -> Option<&T> {
        self.as_slice().first()
    }

    pub fn back(&self) -> Option<&T> {
        self.as_slice().last()
    }

    /// Move everything into a freshly created backing file holding exactly `new_capacity`
    /// items, then delete the old file.
    ///
    /// The lesser of the old and new capacity is copied over. The old backing stays in
    /// place until the new one is fully populated, so an error leaves `self` untouched.
    fn reallocate(&mut self, new_capacity: usize) -> Result<()> {
        let max_len = self.max_len();
        if new_capacity > max_len {
            bail!(
                "capacity {} exceeds the maximum of {} items",
                new_capacity,
                max_len
            );
        }

        let fresh = if new_capacity == 0 {
            None
        } else {
            let mut fresh = Backing::create(&self.config, new_capacity * Self::ITEM_SIZE)?;
            if let Some(old) = &self.backing {
                let n_bytes = self.capacity.min(new_capacity) * Self::ITEM_SIZE;
                fresh.bytes_mut()[..n_bytes].copy_from_slice(&old.bytes()[..n_bytes]);
            }
            Some(fresh)
        };

        let old_capacity = self.capacity;
        let old = std::mem::replace(&mut self.backing, fresh);
        self.capacity = new_capacity;
        self.len = self.len.min(new_capacity);
        tracing::debug!(old_capacity, new_capacity, path = ?self.path(), "remapped DiskArray");

        if let Some(old) = old {
            old.release(true);
        }
        Ok(())
    }

    // Doubling plus one, saturating at `max_len`.
    fn grown_capacity(&self, capacity: usize) -> usize {
        let max_len = self.max_len();
        capacity
            .checked_mul(2)
            .and_then(|doubled| doubled.checked_add(1))
            .map_or(max_len, |grown| grown.min(max_len))
    }

    fn grow(&mut self) -> Result<()> {
        ensure!(
            self.capacity < self.max_len(),
            "DiskArray is already at its maximum capacity of {} items",
            self.capacity
        );
        let new_capacity = self.grown_capacity(self.capacity);
        tracing::trace!(from = self.capacity, to = new_capacity, "growing DiskArray");
        self.reallocate(new_capacity)
    }

    /// Set the number of items to `new_len`.
    ///
    /// Within capacity only the length changes, so items uncovered by growing the length
    /// hold whatever bytes were there before. Beyond capacity, the array is remapped to
    /// hold exactly `new_len` items.
    pub fn resize(&mut self, new_len: usize) -> Result<()> {
        if new_len > self.capacity {
            self.reallocate(new_len)?;
        }
        self.len = new_len;
        Ok(())
    }

    /// Make sure there is room for at least `capacity` items in total.
    pub fn reserve(&mut self, capacity: usize) -> Result<()> {
        if capacity > self.capacity {
            self.reallocate(capacity)?;
        }
        Ok(())
    }

    /// Shrink the backing file to hold exactly `len` items.
    pub fn trim(&mut self) -> Result<()> {
        if self.len < self.capacity {
            self.reallocate(self.len)?;
        }
        Ok(())
    }

    /// Push a new item onto the `DiskArray<T>`.
    pub fn push_back(&mut self, value: T) -> Result<()> {
        if self.len == self.capacity {
            self.grow()?;
        }
        let len = self.len;
        self.slots_mut()[len] = value;
        self.len += 1;
        Ok(())
    }

    /// Remove and return the last item. The bytes stay in the backing file.
    pub fn pop_back(&mut self) -> Option<T> {
        debug_assert!(self.len > 0, "pop_back on an empty DiskArray");
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        let len = self.len;
        Some(self.slots_mut()[len])
    }

    /// Insert `value` at `index`, shifting everything after it one place to the right.
    pub fn insert(&mut self, index: usize, value: T) -> Result<()> {
        if index > self.len {
            bail!(
                "insertion index {} out of bounds for DiskArray of size {}",
                index,
                self.len
            );
        }
        match self.back().copied() {
            Some(last) => self.push_back(last)?,
            None => return self.push_back(value),
        }
        let len = self.len;
        let items = self.as_mut_slice();
        items.copy_within(index..len - 1, index + 1);
        items[index] = value;
        Ok(())
    }

    /// Remove and return the item at `index`, shifting everything after it to the left.
    pub fn erase(&mut self, index: usize) -> Result<T> {
        if index >= self.len {
            bail!(
                "index {} out of bounds for DiskArray of size {}",
                index,
                self.len
            );
        }
        let len = self.len;
        let items = self.as_mut_slice();
        let removed = items[index];
        items.copy_within(index + 1..len, index);
        self.len -= 1;
        Ok(removed)
    }

    /// Overwrite every item with `value`.
    pub fn assign(&mut self, value: T) {
        self.as_mut_slice().fill(value);
    }

    /// Replace the contents with `len` copies of `value`.
    pub fn assign_elem(&mut self, len: usize, value: T) -> Result<()> {
        self.reserve(len)?;
        self.len = len;
        self.as_mut_slice().fill(value);
        Ok(())
    }

    /// Replace the contents with a byte copy of `items`.
    pub fn assign_slice(&mut self, items: &[T]) -> Result<()> {
        self.reserve(items.len())?;
        self.len = items.len();
        self.as_mut_slice().copy_from_slice(items);
        Ok(())
    }

    /// Replace the contents with the items of `iter`, written one at a time.
    pub fn assign_iter<I>(&mut self, iter: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: ExactSizeIterator,
    {
        let iter = iter.into_iter();
        self.resize(iter.len())?;
        let mut written = 0;
        for (slot, item) in self.as_mut_slice().iter_mut().zip(iter) {
            *slot = item;
            written += 1;
        }
        self.len = written;
        Ok(())
    }

    /// Make this array a copy of `other`, reusing the current backing file if it is big enough.
    pub fn assign_from(&mut self, other: &Self) -> Result<()> {
        self.resize(other.len)?;
        self.as_mut_slice().copy_from_slice(other.as_slice());
        Ok(())
    }

    /// Append `value` unless an equal item is already present. Returns whether it was added.
    pub fn add_unique(&mut self, value: T) -> Result<bool>
    where
        T: PartialEq,
    {
        if self.as_slice().contains(&value) {
            return Ok(false);
        }
        self.push_back(value)?;
        Ok(true)
    }

    /// Append all of `items`, growing geometrically as `push_back` would.
    pub fn extend_from_slice(&mut self, items: &[T]) -> Result<()> {
        let new_len = self
            .len
            .checked_add(items.len())
            .ok_or_else(|| anyhow!("DiskArray length overflow"))?;
        if new_len > self.capacity {
            let mut target = self.capacity;
            while target < new_len {
                let grown = self.grown_capacity(target);
                if grown == target {
                    break;
                }
                target = grown;
            }
            self.reallocate(target.max(new_len))?;
        }
        let start = self.len;
        self.len = new_len;
        self.as_mut_slice()[start..].copy_from_slice(items);
        Ok(())
    }

    /// Zero the bytes of every live item.
    pub fn set_zero(&mut self) {
        bytemuck::cast_slice_mut::<T, u8>(self.as_mut_slice()).fill(0);
    }

    /// Exchange contents, capacity and backing files with `other` without copying any items.
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(self, other);
    }

    /// Unmap and close the backing file and go back to the empty state.
    ///
    /// Whether the file is also deleted is decided by the configured [`DropPolicy`]. The
    /// next allocation creates a new file.
    pub fn clear(&mut self) {
        if let Some(backing) = self.backing.take() {
            backing.release(self.config.drop_policy == DropPolicy::Delete);
        }
        self.len = 0;
        self.capacity = 0;
    }
}

impl<T: Pod> Drop for DiskArray<T> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T: Pod> Default for DiskArray<T> {
    fn default() -> Self {
        Self::new(BackingConfig::default())
    }
}

/// # Panics
///
/// Panics if a backing file for the copy cannot be created, the way `Vec` aborts when it
/// cannot allocate. Use [`DiskArray::try_clone`] to handle the error instead.
impl<T: Pod> Clone for DiskArray<T> {
    fn clone(&self) -> Self {
        self.try_clone()
            .unwrap_or_else(|err| panic!("failed to clone DiskArray: {err:#}"))
    }

    fn clone_from(&mut self, source: &Self) {
        self.assign_from(source)
            .unwrap_or_else(|err| panic!("failed to clone DiskArray: {err:#}"))
    }
}

impl<T: Pod> Deref for DiskArray<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Pod> DerefMut for DiskArray<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T: Pod> AsRef<[T]> for DiskArray<T> {
    fn as_ref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Pod> AsMut<[T]> for DiskArray<T> {
    fn as_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<'a, T: Pod> IntoIterator for &'a DiskArray<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}

impl<'a, T: Pod> IntoIterator for &'a mut DiskArray<T> {
    type Item = &'a mut T;
    type IntoIter = slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_mut_slice().iter_mut()
    }
}

impl<T: Pod + fmt::Debug> fmt::Debug for DiskArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

// Comparisons are lexicographic over the live items, with length breaking ties.

impl<T: Pod + PartialEq> PartialEq for DiskArray<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Pod + Eq> Eq for DiskArray<T> {}

impl<T: Pod + PartialEq> PartialEq<[T]> for DiskArray<T> {
    fn eq(&self, other: &[T]) -> bool {
        self.as_slice() == other
    }
}

impl<T: Pod + PartialEq, const N: usize> PartialEq<[T; N]> for DiskArray<T> {
    fn eq(&self, other: &[T; N]) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Pod + PartialEq> PartialEq<Vec<T>> for DiskArray<T> {
    fn eq(&self, other: &Vec<T>) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Pod + PartialOrd> PartialOrd for DiskArray<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.as_slice().partial_cmp(other.as_slice())
    }
}

impl<T: Pod + Ord> Ord for DiskArray<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_slice().cmp(other.as_slice())
    }
}

impl<T: Pod + Hash> Hash for DiskArray<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state);
    }
}

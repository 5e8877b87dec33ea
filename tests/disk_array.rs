use std::collections::HashSet;
use std::path::PathBuf;

use disk_array::{BackingConfig, DiskArray};
use tempfile::{tempdir, TempDir};

fn array(dir: &TempDir, items: &[i64]) -> DiskArray<i64> {
    DiskArray::from_slice(BackingConfig::scratch(dir.path()), items).unwrap()
}

#[test]
fn test_ordering() {
    let tmp_dir = tempdir().unwrap();
    let a = array(&tmp_dir, &[1, 2, 3]);
    let b = array(&tmp_dir, &[1, 2, 4]);
    let c = array(&tmp_dir, &[1, 2]);
    let d = array(&tmp_dir, &[1, 2, 3]);

    assert!(a < b);
    assert!(b > a);
    assert!(c < a);
    assert!(a > c);
    assert!(c <= a);
    assert!(a >= c);
    assert!(a <= d && a >= d);
    assert_eq!(a, d);
    assert_ne!(a, c);
    assert_ne!(a, b);
}

#[test]
fn test_empty_arrays_compare_equal() {
    let tmp_dir = tempdir().unwrap();
    let a = DiskArray::<i64>::new(BackingConfig::scratch(tmp_dir.path()));
    let b = array(&tmp_dir, &[]);
    let c = array(&tmp_dir, &[0]);
    assert_eq!(a, b);
    assert!(a < c);
}

#[test]
fn test_swap_exchanges_backing_files() {
    let tmp_dir = tempdir().unwrap();
    let mut a = array(&tmp_dir, &[1, 2, 3]);
    let mut b = array(&tmp_dir, &[9]);
    let a_path: PathBuf = a.path().unwrap().into();
    let b_path: PathBuf = b.path().unwrap().into();

    a.swap(&mut b);
    assert_eq!(a, [9]);
    assert_eq!(b, [1, 2, 3]);
    assert_eq!(a.path().unwrap(), b_path);
    assert_eq!(b.path().unwrap(), a_path);
    assert_eq!(a.capacity(), 1);
    assert_eq!(b.capacity(), 3);
}

#[test]
fn test_swap_exchanges_configs() {
    let tmp_dir = tempdir().unwrap();
    let config = BackingConfig::scratch(tmp_dir.path());
    let mut a = DiskArray::from_slice(config.clone().with_prefix("left"), &[1i64]).unwrap();
    let mut b = DiskArray::from_slice(config.with_prefix("right"), &[2i64, 3]).unwrap();

    a.swap(&mut b);
    assert_eq!(a.config().prefix, "right");
    assert_eq!(b.config().prefix, "left");
    assert_eq!(a, [2, 3]);

    // Growth mints the next file with the config that travelled with the data.
    a.push_back(4).unwrap();
    let name = a.path().unwrap().file_name().unwrap().to_str().unwrap().to_string();
    assert!(name.starts_with("right_"));
}

#[test]
fn test_erase_then_insert_restores() {
    let tmp_dir = tempdir().unwrap();
    let original: Vec<i64> = vec![5, -3, 8, 13, 0, 21];
    let mut array = array(&tmp_dir, &original);
    for i in 0..original.len() {
        let removed = array.erase(i).unwrap();
        assert_eq!(removed, original[i]);
        array.insert(i, removed).unwrap();
        assert_eq!(array, original);
    }
}

#[test]
fn test_copies_are_independent() {
    let tmp_dir = tempdir().unwrap();
    let source: Vec<i64> = (0..100).collect();
    let mut a = array(&tmp_dir, &source);
    let mut b = a.clone();
    assert_eq!(a, b);

    a[10] = -1;
    b.push_back(100).unwrap();
    assert_eq!(a.len(), 100);
    assert_eq!(b[10], 10);
    assert_ne!(a, b);

    let mut c = array(&tmp_dir, &[7; 3]);
    c.clone_from(&a);
    assert_eq!(c, a);
    a.set_zero();
    assert_eq!(c[10], -1);
}

#[test]
fn test_push_many_retains_order() {
    let tmp_dir = tempdir().unwrap();
    let mut array = DiskArray::<u64>::new(BackingConfig::scratch(tmp_dir.path()));
    let mut paths = HashSet::new();
    for i in 0..10_000u64 {
        array.push_back(i * 3).unwrap();
        paths.insert(array.path().unwrap().to_path_buf());
    }
    assert_eq!(array.len(), 10_000);
    assert!(array.capacity() >= 10_000);
    assert!(array.iter().enumerate().all(|(i, x)| *x == i as u64 * 3));
    // 0 -> 1 -> 3 -> ... -> 16383 takes 14 remaps, each into a fresh file.
    assert_eq!(paths.len(), 14);
    assert_eq!(std::fs::read_dir(tmp_dir.path()).unwrap().count(), 1);
}

#[test]
fn test_iteration() {
    let tmp_dir = tempdir().unwrap();
    let mut array = array(&tmp_dir, &[1, 2, 3]);
    for item in &mut array {
        *item *= 10;
    }
    let forward: Vec<i64> = (&array).into_iter().copied().collect();
    let backward: Vec<i64> = array.iter().rev().copied().collect();
    assert_eq!(forward, vec![10, 20, 30]);
    assert_eq!(backward, vec![30, 20, 10]);
    assert_eq!(array.first(), Some(&10));
    assert_eq!(unsafe { *array.get_unchecked(2) }, 30);
}

use crate::{
    binary_search::partition_point_by_index,
    cht::{Cht, ChtBuilder},
    coding::{decode_key, encode_key, Decode, Encode},
    config::BuildOptions,
    error::{Error, Result},
    key::Key,
    mapped_array::MappedArray,
    pod::Pod,
    spline::SplineBuilder,
    trie_spline::TrieSpline,
};
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

/// One payload record: a key paired with its associated `u64` value.
///
/// Duplicates of `key` are permitted and must be adjacent in the input; the
/// array as a whole must be in ascending key order.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Record<K: Key> {
    /// The key.
    pub key: K,
    /// The payload value associated with `key`.
    pub payload: u64,
}

#[expect(unsafe_code, reason = "Record<K> has a stable #[repr(C)] byte layout")]
unsafe impl<K: Key> Pod for Record<K> {}

const DATA_FILE: &str = "data";
const SPLINE_POINTS_FILE: &str = "spline_points";
const META_FILE: &str = "meta";

/// A learned secondary index: a [`TrieSpline`] over a sorted, memory-mapped
/// array of `(K, u64)` payload records.
///
/// Built once from a sorted slice of `(key, payload)` pairs, then either
/// kept in-process or persisted to a directory and reopened later. Queries
/// (`lower_bound`, `sum_for_key`) never fail and never mutate.
pub struct MultiMap<K: Key> {
    payload: MappedArray<Record<K>>,
    trie_spline: TrieSpline<K>,
}

impl<K: Key> MultiMap<K> {
    /// Builds a new index over `elements` (must be sorted ascending by key,
    /// non-empty) and persists it under `root_path`.
    pub fn build(elements: &[(K, u64)], options: BuildOptions, root_path: &Path) -> Result<Self> {
        let options = options.validate()?;

        if elements.is_empty() {
            return Err(Error::Contract(
                "cannot build an index over an empty input".to_owned(),
            ));
        }

        for pair in elements.windows(2) {
            if pair[1].0 < pair[0].0 {
                return Err(Error::Contract(format!(
                    "keys must be sorted ascending: {:?} follows {:?}",
                    pair[1].0, pair[0].0
                )));
            }
        }

        let min_key = elements[0].0;
        let max_key = elements[elements.len() - 1].0;
        let num_keys = elements.len() as u64;

        log::debug!("building multi_map: {num_keys} keys, min={min_key:?}, max={max_key:?}");

        let records: Vec<Record<K>> = elements
            .iter()
            .map(|&(key, payload)| Record { key, payload })
            .collect();

        let payload = MappedArray::create(&root_path.join(DATA_FILE), &records)?;

        let mut spline_builder =
            SplineBuilder::new(min_key, max_key, options.get_spline_max_error())?;
        for &(key, _) in elements {
            spline_builder.add_key(key)?;
        }
        let breakpoints_vec = spline_builder.finalize()?;

        log::debug!(
            "spline built: {} breakpoints from {num_keys} keys",
            breakpoints_vec.len()
        );

        let cht_builder = ChtBuilder::new(
            min_key,
            max_key,
            options.get_num_bins(),
            options.get_cht_max_error(),
        )?;
        let cht = cht_builder.build(&breakpoints_vec);

        log::debug!(
            "cht built: single_layer={}, table cells={}",
            cht.single_layer(),
            cht.table().len()
        );

        let breakpoints =
            MappedArray::create(&root_path.join(SPLINE_POINTS_FILE), &breakpoints_vec)?;

        write_meta(
            root_path,
            min_key,
            max_key,
            num_keys,
            options.get_spline_max_error(),
            &cht,
            breakpoints_vec.len() as u64,
        )?;

        log::info!(
            "multi_map build complete: {num_keys} keys, {} breakpoints, {} bytes",
            breakpoints_vec.len(),
            payload.len() * std::mem::size_of::<Record<K>>()
        );

        let trie_spline = TrieSpline::new(
            breakpoints,
            cht,
            min_key,
            max_key,
            num_keys,
            options.get_spline_max_error(),
        );

        Ok(Self {
            payload,
            trie_spline,
        })
    }

    /// Opens a previously built index from `root_path`.
    pub fn open(root_path: &Path) -> Result<Self> {
        if !root_path.is_dir() {
            return Err(Error::NotFound(root_path.to_path_buf()));
        }

        let meta_path = root_path.join(META_FILE);
        if !meta_path.is_file() {
            return Err(Error::NotFound(meta_path));
        }

        let meta = read_meta::<K>(&meta_path)?;

        let payload = MappedArray::open(&root_path.join(DATA_FILE), meta.num_keys as usize)?;
        let breakpoints = MappedArray::open(
            &root_path.join(SPLINE_POINTS_FILE),
            meta.num_breakpoints as usize,
        )?;

        let cht = Cht::from_parts(
            meta.cht_single_layer,
            meta.cht_min_key,
            meta.cht_max_key,
            meta.cht_num_keys as u32,
            meta.cht_num_bins as u32,
            meta.cht_log_num_bins as u32,
            meta.cht_max_error as u32,
            meta.cht_shift as u32,
            meta.cht_table,
        )?;

        log::debug!(
            "opened multi_map at {}: {} keys",
            root_path.display(),
            meta.num_keys
        );

        let trie_spline = TrieSpline::new(
            breakpoints,
            cht,
            meta.min_key,
            meta.max_key,
            meta.num_keys,
            meta.spline_max_error as u32,
        );

        Ok(Self {
            payload,
            trie_spline,
        })
    }

    /// Returns the index of the first payload record whose key is `>= key`,
    /// or `len()` if none (invariant: lower-bound correctness).
    #[must_use]
    pub fn lower_bound(&self, key: K) -> usize {
        let bound = self.trie_spline.search_bound(key);
        let lo = bound.start.min(self.payload.len());
        let hi = bound.end.min(self.payload.len()).max(lo);

        partition_point_by_index(lo..hi, |i| self.payload.index(i).key < key)
    }

    /// Sums the payloads of every record whose key equals `key`; `0` if absent.
    #[must_use]
    pub fn sum_for_key(&self, key: K) -> u64 {
        let mut idx = self.lower_bound(key);
        let mut sum = 0u64;

        while idx < self.payload.len() && self.payload.index(idx).key == key {
            sum += self.payload.index(idx).payload;
            idx += 1;
        }

        sum
    }

    /// Number of payload records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the index is empty. Always `false`: [`MultiMap::build`] rejects empty input.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Approximate heap footprint: the payload array plus the [`TrieSpline`].
    #[must_use]
    pub fn size_in_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.payload.len() * std::mem::size_of::<Record<K>>()
            + self.trie_spline.size_in_bytes()
    }
}

struct Meta<K: Key> {
    num_keys: u64,
    min_key: K,
    max_key: K,
    spline_max_error: u64,
    cht_single_layer: bool,
    cht_min_key: K,
    cht_max_key: K,
    cht_num_keys: u64,
    cht_num_bins: u64,
    cht_log_num_bins: u64,
    cht_max_error: u64,
    cht_shift: u64,
    cht_table: Vec<u32>,
    num_breakpoints: u64,
}

#[allow(clippy::too_many_arguments)]
fn write_meta<K: Key>(
    root_path: &Path,
    min_key: K,
    max_key: K,
    num_keys: u64,
    spline_max_error: u32,
    cht: &Cht<K>,
    num_breakpoints: u64,
) -> Result<()> {
    std::fs::create_dir_all(root_path)
        .map_err(|e| Error::io(e, format!("create_dir_all {}", root_path.display())))?;

    let tmp = tempfile::NamedTempFile::new_in(root_path)
        .map_err(|e| Error::io(e, "create meta temp file"))?;

    {
        let mut writer = BufWriter::new(tmp.as_file());
        let write_err = |e: std::io::Error| Error::io(e, "write meta");

        num_keys.encode_into(&mut writer).map_err(write_err)?;
        encode_key(min_key, &mut writer).map_err(write_err)?;
        encode_key(max_key, &mut writer).map_err(write_err)?;
        num_keys.encode_into(&mut writer).map_err(write_err)?;
        u64::from(spline_max_error)
            .encode_into(&mut writer)
            .map_err(write_err)?;

        cht.single_layer().encode_into(&mut writer).map_err(write_err)?;
        encode_key(cht.min_key(), &mut writer).map_err(write_err)?;
        encode_key(cht.max_key(), &mut writer).map_err(write_err)?;
        u64::from(cht.num_breakpoints())
            .encode_into(&mut writer)
            .map_err(write_err)?;
        u64::from(cht.num_bins())
            .encode_into(&mut writer)
            .map_err(write_err)?;
        u64::from(cht.log_num_bins())
            .encode_into(&mut writer)
            .map_err(write_err)?;
        u64::from(cht.cht_max_error())
            .encode_into(&mut writer)
            .map_err(write_err)?;
        u64::from(cht.shift()).encode_into(&mut writer).map_err(write_err)?;
        cht.table().to_vec().encode_into(&mut writer).map_err(write_err)?;

        num_breakpoints.encode_into(&mut writer).map_err(write_err)?;

        std::io::Write::flush(&mut writer).map_err(|e| Error::io(e, "flush meta"))?;
    }

    let meta_path = root_path.join(META_FILE);
    tmp.persist(&meta_path)
        .map_err(|e| Error::io(e.error, format!("persist {}", meta_path.display())))?;

    Ok(())
}

fn read_meta<K: Key>(path: &Path) -> Result<Meta<K>> {
    let file = File::open(path).map_err(|e| Error::io(e, format!("open {}", path.display())))?;
    let mut reader = BufReader::new(file);

    let top_num_keys = u64::decode_from(&mut reader)
        .map_err(|e| Error::io(e, format!("read meta {}", path.display())))?;
    let min_key = decode_key::<K, _>(&mut reader)
        .map_err(|e| Error::io(e, format!("read meta {}", path.display())))?;
    let max_key = decode_key::<K, _>(&mut reader)
        .map_err(|e| Error::io(e, format!("read meta {}", path.display())))?;
    let num_keys = u64::decode_from(&mut reader)
        .map_err(|e| Error::io(e, format!("read meta {}", path.display())))?;
    let spline_max_error = u64::decode_from(&mut reader)
        .map_err(|e| Error::io(e, format!("read meta {}", path.display())))?;

    let cht_single_layer = bool::decode_from(&mut reader)
        .map_err(|e| Error::io(e, format!("read meta {}", path.display())))?;
    let cht_min_key = decode_key::<K, _>(&mut reader)
        .map_err(|e| Error::io(e, format!("read meta {}", path.display())))?;
    let cht_max_key = decode_key::<K, _>(&mut reader)
        .map_err(|e| Error::io(e, format!("read meta {}", path.display())))?;
    let cht_num_keys = u64::decode_from(&mut reader)
        .map_err(|e| Error::io(e, format!("read meta {}", path.display())))?;
    let cht_num_bins = u64::decode_from(&mut reader)
        .map_err(|e| Error::io(e, format!("read meta {}", path.display())))?;
    let cht_log_num_bins = u64::decode_from(&mut reader)
        .map_err(|e| Error::io(e, format!("read meta {}", path.display())))?;
    let cht_max_error = u64::decode_from(&mut reader)
        .map_err(|e| Error::io(e, format!("read meta {}", path.display())))?;
    let cht_shift = u64::decode_from(&mut reader)
        .map_err(|e| Error::io(e, format!("read meta {}", path.display())))?;
    let cht_table = Vec::<u32>::decode_from(&mut reader)
        .map_err(|e| Error::io(e, format!("read meta {}", path.display())))?;

    let num_breakpoints = u64::decode_from(&mut reader)
        .map_err(|e| Error::io(e, format!("read meta {}", path.display())))?;

    debug_assert_eq!(top_num_keys, num_keys);

    Ok(Meta {
        num_keys,
        min_key,
        max_key,
        spline_max_error,
        cht_single_layer,
        cht_min_key,
        cht_max_key,
        cht_num_keys,
        cht_num_bins,
        cht_log_num_bins,
        cht_max_error,
        cht_shift,
        cht_table,
        num_breakpoints,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn elements(pairs: &[(u64, u64)]) -> Vec<(u64, u64)> {
        pairs.to_vec()
    }

    #[test]
    fn dense_uniform_lower_bound_and_sum() {
        let dir = tempfile::tempdir().unwrap();
        let els = elements(&[(0, 0), (1, 1), (2, 2), (3, 3), (4, 4), (5, 5), (6, 6), (7, 7), (8, 8), (9, 9)]);
        let mm = MultiMap::build(
            &els,
            BuildOptions::new().num_bins(4).cht_max_error(2).spline_max_error(1),
            dir.path(),
        )
        .unwrap();

        assert_eq!(5, mm.lower_bound(5));
        assert_eq!(5, mm.sum_for_key(5));
    }

    #[test]
    fn step_function_sum_for_key() {
        let dir = tempfile::tempdir().unwrap();
        let els = elements(&[(0, 0), (0, 1), (0, 2), (10, 3), (10, 4), (20, 5)]);
        let mm = MultiMap::build(
            &els,
            BuildOptions::new().num_bins(2).cht_max_error(2).spline_max_error(2),
            dir.path(),
        )
        .unwrap();

        assert_eq!(0, mm.lower_bound(0));
        assert_eq!(3, mm.sum_for_key(0));
        assert_eq!(7, mm.sum_for_key(10));
        assert_eq!(0, mm.sum_for_key(5));
    }

    #[test]
    fn gap_keys() {
        let dir = tempfile::tempdir().unwrap();
        let els = elements(&[(1, 10), (2, 20), (3, 30), (1000, 40), (1001, 50)]);
        let mm = MultiMap::build(
            &els,
            BuildOptions::new().num_bins(2).cht_max_error(1).spline_max_error(1),
            dir.path(),
        )
        .unwrap();

        assert_eq!(3, mm.lower_bound(500));
        assert_eq!(40, mm.payload.index(mm.lower_bound(500)).payload);
        assert_eq!(0, mm.sum_for_key(500));
    }

    #[test]
    fn boundary_queries() {
        let dir = tempfile::tempdir().unwrap();
        let els = elements(&[(10, 1), (20, 2), (30, 3)]);
        let mm = MultiMap::build(
            &els,
            BuildOptions::new().num_bins(2).cht_max_error(1).spline_max_error(1),
            dir.path(),
        )
        .unwrap();

        assert_eq!(0, mm.lower_bound(0));
        assert_eq!(mm.len(), mm.lower_bound(31));
        assert_eq!(0, mm.sum_for_key(31));
    }

    #[test]
    fn duplicate_last() {
        let dir = tempfile::tempdir().unwrap();
        let els = elements(&[(5, 1), (5, 2), (5, 3)]);
        let mm = MultiMap::build(
            &els,
            BuildOptions::new().num_bins(2).cht_max_error(1).spline_max_error(1),
            dir.path(),
        )
        .unwrap();

        assert_eq!(0, mm.lower_bound(5));
        assert_eq!(6, mm.sum_for_key(5));
        assert_eq!(0, mm.sum_for_key(6));
    }

    #[test]
    fn rejects_empty_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = MultiMap::<u64>::build(&[], BuildOptions::new(), dir.path()).unwrap_err();
        assert!(matches!(err, Error::Contract(_)));
    }

    #[test]
    fn rejects_unsorted_input() {
        let dir = tempfile::tempdir().unwrap();
        let els = elements(&[(2, 1), (1, 2)]);
        let err = MultiMap::build(&els, BuildOptions::new(), dir.path()).unwrap_err();
        assert!(matches!(err, Error::Contract(_)));
    }

    #[test]
    fn open_missing_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let err = MultiMap::<u64>::open(&missing).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn round_trip_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let mut els = Vec::new();
        let mut k = 0u64;
        for i in 0..2000u64 {
            k += (i % 3) + 1;
            els.push((k, i));
        }

        let built = MultiMap::build(
            &els,
            BuildOptions::new().num_bins(32).cht_max_error(16).spline_max_error(16),
            dir.path(),
        )
        .unwrap();

        let opened = MultiMap::<u64>::open(dir.path()).unwrap();

        for &(key, _) in &els {
            assert_eq!(built.lower_bound(key), opened.lower_bound(key));
            assert_eq!(built.sum_for_key(key), opened.sum_for_key(key));
        }

        assert_eq!(built.len(), opened.len());
    }
}

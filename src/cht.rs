use crate::{
    error::{Error, Result},
    key::Key,
    spline::Coord,
};
use std::collections::VecDeque;
use std::ops::Range;

const LEAF_BIT: u32 = 1 << 31;
const LEAF_MASK: u32 = LEAF_BIT - 1;

/// A radix histogram trie over breakpoint x-coordinates: narrows a key down
/// to a short run of breakpoint indices containing the correct spline
/// segment endpoint.
///
/// Either a flat prefix-sum table (`single_layer`, for key ranges small
/// enough that one level of `num_bins` buckets already satisfies
/// `cht_max_error`) or a multi-level tree of `num_bins`-wide blocks flattened
/// breadth-first into a single `Vec<u32>`. Cells are tagged in their high
/// bit: set means "leaf, low 31 bits are a breakpoint index", unset means
/// "inner, value is the flat cell offset of the child block".
#[derive(Clone, Debug)]
pub struct Cht<K: Key> {
    single_layer: bool,
    min_key: K,
    max_key: K,
    num_breakpoints: u32,
    num_bins: u32,
    log_num_bins: u32,
    cht_max_error: u32,
    shift: u32,
    table: Vec<u32>,
}

impl<K: Key> Cht<K> {
    /// Returns a `[begin, end)` range of breakpoint indices guaranteed to
    /// contain the correct spline segment endpoint for `key` (invariant C2).
    #[must_use]
    pub fn search_bound(&self, key: K) -> Range<usize> {
        let offset = key.as_u128().saturating_sub(self.min_key.as_u128());

        if self.single_layer {
            let mask = (1u128 << self.log_num_bins) - 1;
            let prefix = ((offset >> self.shift) & mask) as usize;
            let begin = self.table[prefix] as usize;
            let end = self.table[prefix + 1] as usize;
            return begin..end;
        }

        let begin = self.lookup(offset) as usize;
        let end = (begin + self.cht_max_error as usize + 1).min(self.num_breakpoints as usize);
        begin..end
    }

    fn lookup(&self, offset: u128) -> u32 {
        let mask = (1u128 << self.log_num_bins) - 1;
        let mut shift = self.shift;
        let mut block_offset = 0usize;

        loop {
            let bin = ((offset >> shift) & mask) as usize;
            let cell = self.table[block_offset + bin];

            if cell & LEAF_BIT != 0 {
                return cell & LEAF_MASK;
            }

            block_offset = cell as usize;
            shift = shift.saturating_sub(self.log_num_bins);
        }
    }

    /// Approximate size of this structure on the heap, in bytes.
    #[must_use]
    pub fn size_in_bytes(&self) -> usize {
        std::mem::size_of::<Self>() + self.table.len() * std::mem::size_of::<u32>()
    }

    pub(crate) fn min_key(&self) -> K {
        self.min_key
    }

    pub(crate) fn max_key(&self) -> K {
        self.max_key
    }

    pub(crate) fn single_layer(&self) -> bool {
        self.single_layer
    }

    pub(crate) fn num_breakpoints(&self) -> u32 {
        self.num_breakpoints
    }

    pub(crate) fn num_bins(&self) -> u32 {
        self.num_bins
    }

    pub(crate) fn log_num_bins(&self) -> u32 {
        self.log_num_bins
    }

    pub(crate) fn cht_max_error(&self) -> u32 {
        self.cht_max_error
    }

    pub(crate) fn shift(&self) -> u32 {
        self.shift
    }

    pub(crate) fn table(&self) -> &[u32] {
        &self.table
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        single_layer: bool,
        min_key: K,
        max_key: K,
        num_breakpoints: u32,
        num_bins: u32,
        log_num_bins: u32,
        cht_max_error: u32,
        shift: u32,
        table: Vec<u32>,
    ) -> Result<Self> {
        if num_bins != 1 << log_num_bins {
            return Err(Error::Format(format!(
                "num_bins ({num_bins}) is not 1 << log_num_bins ({log_num_bins})"
            )));
        }

        Ok(Self {
            single_layer,
            min_key,
            max_key,
            num_breakpoints,
            num_bins,
            log_num_bins,
            cht_max_error,
            shift,
            table,
        })
    }
}

/// Builds a [`Cht`] from a breakpoint sequence.
pub struct ChtBuilder<K: Key> {
    min_key: K,
    max_key: K,
    num_bins: u32,
    log_num_bins: u32,
    cht_max_error: u32,
}

impl<K: Key> ChtBuilder<K> {
    /// Creates a new builder. `num_bins` must be a power of two and
    /// `cht_max_error` must be at least 1.
    pub fn new(min_key: K, max_key: K, num_bins: u32, cht_max_error: u32) -> Result<Self> {
        if num_bins == 0 || !num_bins.is_power_of_two() {
            return Err(Error::Contract(format!(
                "num_bins ({num_bins}) must be a non-zero power of two"
            )));
        }

        if cht_max_error == 0 {
            return Err(Error::Contract(
                "cht_max_error must be at least 1".to_owned(),
            ));
        }

        Ok(Self {
            min_key,
            max_key,
            num_bins,
            log_num_bins: num_bins.trailing_zeros(),
            cht_max_error,
        })
    }

    /// Builds the trie over `breakpoints`, which must be the strictly
    /// x-increasing output of a [`crate::spline::SplineBuilder`].
    #[must_use]
    pub fn build(&self, breakpoints: &[Coord<K>]) -> Cht<K> {
        let num_breakpoints = breakpoints.len() as u32;

        let range = self.max_key.as_u128() - self.min_key.as_u128() + 1;
        let total_bits = ceil_log2(range);
        let top_shift = total_bits.saturating_sub(self.log_num_bins);

        let top_ranges = partition_ranges(
            breakpoints,
            0,
            breakpoints.len(),
            self.min_key,
            top_shift,
            self.log_num_bins,
            self.num_bins,
        );

        let single_layer = top_ranges
            .iter()
            .all(|(lo, hi)| (hi - lo) as u32 <= self.cht_max_error);

        if single_layer {
            let mut table = Vec::with_capacity(top_ranges.len() + 1);
            for &(lo, _) in &top_ranges {
                table.push(lo as u32);
            }
            table.push(breakpoints.len() as u32);

            return Cht {
                single_layer: true,
                min_key: self.min_key,
                max_key: self.max_key,
                num_breakpoints,
                num_bins: self.num_bins,
                log_num_bins: self.log_num_bins,
                cht_max_error: self.cht_max_error,
                shift: top_shift,
                table,
            };
        }

        // Multi-layer: breadth-first flattening, root block reserved at offset 0.
        let mut table = vec![0u32; self.num_bins as usize];
        let mut queue: VecDeque<(usize, usize, i64)> = VecDeque::new();

        let top_child_shift = i64::from(top_shift) - i64::from(self.log_num_bins);
        for &(lo, hi) in &top_ranges {
            queue.push_back((lo, hi, top_child_shift));
        }

        let mut cell_idx = 0usize;

        while let Some((lo, hi, shift)) = queue.pop_front() {
            let count = (hi - lo) as u32;

            if count <= self.cht_max_error || shift < 0 {
                table[cell_idx] = LEAF_BIT | (lo as u32);
            } else {
                #[expect(
                    clippy::cast_sign_loss,
                    reason = "shift >= 0 was just checked above"
                )]
                let shift_u32 = shift as u32;

                let child_block_offset = table.len();
                table.resize(child_block_offset + self.num_bins as usize, 0);
                table[cell_idx] = child_block_offset as u32;

                let ranges = partition_ranges(
                    breakpoints,
                    lo,
                    hi,
                    self.min_key,
                    shift_u32,
                    self.log_num_bins,
                    self.num_bins,
                );

                let child_shift = shift - i64::from(self.log_num_bins);
                for &(clo, chi) in &ranges {
                    queue.push_back((clo, chi, child_shift));
                }
            }

            cell_idx += 1;
        }

        Cht {
            single_layer: false,
            min_key: self.min_key,
            max_key: self.max_key,
            num_breakpoints,
            num_bins: self.num_bins,
            log_num_bins: self.log_num_bins,
            cht_max_error: self.cht_max_error,
            shift: top_shift,
            table,
        }
    }
}

/// Partitions breakpoints `[lo, hi)` into `num_bins` contiguous sub-ranges
/// by `((x - min_key) >> shift) & (num_bins - 1)`. Breakpoints are sorted by
/// `x`, so the bucket index is non-decreasing over `[lo, hi)` and a single
/// counting pass reproduces the correct boundaries.
fn partition_ranges<K: Key>(
    breakpoints: &[Coord<K>],
    lo: usize,
    hi: usize,
    min_key: K,
    shift: u32,
    log_num_bins: u32,
    num_bins: u32,
) -> Vec<(usize, usize)> {
    let mask = (1u128 << log_num_bins) - 1;
    let mut counts = vec![0usize; num_bins as usize];

    for coord in &breakpoints[lo..hi] {
        let offset = coord.x.as_u128() - min_key.as_u128();
        let bin = ((offset >> shift) & mask) as usize;
        counts[bin] += 1;
    }

    let mut ranges = Vec::with_capacity(num_bins as usize);
    let mut start = lo;
    for count in counts {
        ranges.push((start, start + count));
        start += count;
    }
    ranges
}

/// Smallest `b` such that `2^b >= range`, for `range >= 1`.
fn ceil_log2(range: u128) -> u32 {
    if range <= 1 {
        return 0;
    }
    let v = range - 1;
    128 - v.leading_zeros()
}

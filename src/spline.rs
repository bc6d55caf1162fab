use crate::{
    error::{Error, Result},
    key::Key,
    pod::Pod,
};

/// A breakpoint on the spline: key `x` paired with its rank `y` (the index
/// of `x`'s first occurrence in the input).
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Coord<K: Key> {
    /// The key value.
    pub x: K,
    /// The rank of `x` in the input.
    pub y: u32,
}

#[expect(unsafe_code, reason = "Coord<K> has a stable #[repr(C)] byte layout")]
unsafe impl<K: Key> Pod for Coord<K> {}

#[derive(Clone, Copy)]
struct Cone {
    upper: f64,
    lower: f64,
}

fn slope<K: Key>(from: Coord<K>, to_x: K, to_y: f64) -> f64 {
    let x_diff = to_x.as_u128() as f64 - from.x.as_u128() as f64;
    let y_diff = to_y - f64::from(from.y);
    y_diff / x_diff
}

/// Streams sorted `(key, rank)` pairs and produces the minimal set of
/// breakpoints such that linear interpolation through them never deviates
/// from the true rank by more than `max_error` (the GreedySpline /
/// shrinking-cone construction).
///
/// Consumes itself on [`SplineBuilder::finalize`]; all cone state lives in
/// `self`, there is no hidden global state.
pub struct SplineBuilder<K: Key> {
    min_key: K,
    max_key: K,
    max_error: u32,
    breakpoints: Vec<Coord<K>>,
    last_emitted: Coord<K>,
    cone: Option<Cone>,
    last_candidate: Coord<K>,
    last_key_seen: Option<K>,
    count: u32,
}

impl<K: Key> SplineBuilder<K> {
    /// Creates a new builder. `min_key`/`max_key` must equal the first/last
    /// key that will be fed via [`SplineBuilder::add_key`]; `max_error` must
    /// be at least 1.
    pub fn new(min_key: K, max_key: K, max_error: u32) -> Result<Self> {
        if max_error == 0 {
            return Err(Error::Contract(
                "spline_max_error must be at least 1".to_owned(),
            ));
        }

        Ok(Self {
            min_key,
            max_key,
            max_error,
            breakpoints: Vec::new(),
            last_emitted: Coord { x: min_key, y: 0 },
            cone: None,
            last_candidate: Coord { x: min_key, y: 0 },
            last_key_seen: None,
            count: 0,
        })
    }

    /// Feeds the next key in non-decreasing order.
    pub fn add_key(&mut self, key: K) -> Result<()> {
        if let Some(last) = self.last_key_seen {
            if key < last {
                return Err(Error::Contract(format!(
                    "keys must be non-decreasing: {key:?} follows {last:?}"
                )));
            }
        } else if key != self.min_key {
            return Err(Error::Contract(format!(
                "first key {key:?} does not match min_key {:?}",
                self.min_key
            )));
        }

        let rank = self.count;
        self.count += 1;
        self.last_key_seen = Some(key);

        if self.breakpoints.is_empty() {
            let origin = Coord { x: key, y: rank };
            self.breakpoints.push(origin);
            self.last_emitted = origin;
            self.last_candidate = origin;
            self.cone = None;
            return Ok(());
        }

        if key == self.last_emitted.x {
            // Duplicate of the last emitted breakpoint's key: extends a
            // vertical run, covered by the error bound on first occurrence.
            return Ok(());
        }

        let error = f64::from(self.max_error);
        let new_upper = slope(self.last_emitted, key, f64::from(rank) + error);
        let new_lower = slope(self.last_emitted, key, f64::from(rank) - error);

        match self.cone {
            None => {
                self.cone = Some(Cone {
                    upper: new_upper,
                    lower: new_lower,
                });
                self.last_candidate = Coord { x: key, y: rank };
            }
            Some(cone) => {
                let tightened = Cone {
                    upper: cone.upper.min(new_upper),
                    lower: cone.lower.max(new_lower),
                };

                if tightened.lower > tightened.upper {
                    let breakpoint = self.last_candidate;
                    self.breakpoints.push(breakpoint);
                    self.last_emitted = breakpoint;

                    let upper = slope(breakpoint, key, f64::from(rank) + error);
                    let lower = slope(breakpoint, key, f64::from(rank) - error);
                    self.cone = Some(Cone { upper, lower });
                    self.last_candidate = Coord { x: key, y: rank };
                } else {
                    self.cone = Some(tightened);
                    self.last_candidate = Coord { x: key, y: rank };
                }
            }
        }

        Ok(())
    }

    /// Consumes the builder and returns the final breakpoint sequence.
    pub fn finalize(self) -> Result<Vec<Coord<K>>> {
        if self.count == 0 {
            return Err(Error::Contract(
                "cannot build a spline over an empty input".to_owned(),
            ));
        }

        match self.last_key_seen {
            Some(last) if last == self.max_key => {}
            Some(last) => {
                return Err(Error::Contract(format!(
                    "last key {last:?} does not match max_key {:?}",
                    self.max_key
                )))
            }
            None => unreachable!("count > 0 implies last_key_seen is set"),
        }

        let mut breakpoints = self.breakpoints;

        let final_point = Coord {
            x: self.max_key,
            y: self.count - 1,
        };

        if breakpoints.last().map(|c| c.x) != Some(final_point.x) {
            breakpoints.push(final_point);
        }

        Ok(breakpoints)
    }
}

use crate::error::{Error, Result};

/// Validated, chainable build-time tuning knobs for [`crate::multi_map::MultiMap`].
///
/// Mirrors this corpus's policy-struct configuration style: a small `Copy`
/// value with setter methods that each return `self`, validated once at the
/// point of use rather than on every setter call.
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    num_bins: u32,
    cht_max_error: u32,
    spline_max_error: u32,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            num_bins: 64,
            cht_max_error: 32,
            spline_max_error: 32,
        }
    }
}

impl BuildOptions {
    /// Starts from the default tuning (`num_bins=64`, `cht_max_error=32`, `spline_max_error=32`).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the CHT fan-out per level. Must be a power of two.
    #[must_use]
    pub fn num_bins(mut self, num_bins: u32) -> Self {
        self.num_bins = num_bins;
        self
    }

    /// Sets the maximum number of breakpoints a CHT leaf may cover.
    #[must_use]
    pub fn cht_max_error(mut self, cht_max_error: u32) -> Self {
        self.cht_max_error = cht_max_error;
        self
    }

    /// Sets the maximum deviation of the spline's interpolated rank from the truth.
    #[must_use]
    pub fn spline_max_error(mut self, spline_max_error: u32) -> Self {
        self.spline_max_error = spline_max_error;
        self
    }

    pub(crate) fn validate(self) -> Result<Self> {
        if self.num_bins == 0 || !self.num_bins.is_power_of_two() {
            return Err(Error::Contract(format!(
                "num_bins ({}) must be a non-zero power of two",
                self.num_bins
            )));
        }

        if self.cht_max_error == 0 {
            return Err(Error::Contract(
                "cht_max_error must be at least 1".to_owned(),
            ));
        }

        if self.spline_max_error == 0 {
            return Err(Error::Contract(
                "spline_max_error must be at least 1".to_owned(),
            ));
        }

        Ok(self)
    }

    pub(crate) fn get_num_bins(self) -> u32 {
        self.num_bins
    }

    pub(crate) fn get_cht_max_error(self) -> u32 {
        self.cht_max_error
    }

    pub(crate) fn get_spline_max_error(self) -> u32 {
        self.spline_max_error
    }
}

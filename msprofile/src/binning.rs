use serde::{Deserialize, Serialize};

use crate::error::ProfileError;

/// m/z value the predictor uses to mark fragment slots that cannot exist for a peptide.
pub const INVALID_MARKER: f64 = -1.0;

/// Fixed-width partition of m/z space into bins.
///
/// # Description
///
/// Bin `i` covers `[i * resolution, (i + 1) * resolution)`. Bin 0 doubles as the sentinel bin
/// that invalid (non-positive) m/z values are assigned to, so it never carries a fragment
/// in a binary profile.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BinGrid {
    resolution: f64,
    max_mz: f64,
}

impl BinGrid {
    /// Creates a new grid.
    ///
    /// # Arguments
    ///
    /// * `resolution` - width of a bin in Da, must be positive
    /// * `max_mz` - upper m/z bound of the grid in Da, must be positive
    ///
    /// # Example
    ///
    /// ```
    /// use msprofile::binning::BinGrid;
    ///
    /// let grid = BinGrid::new(1.0, 2500.0).unwrap();
    /// assert_eq!(grid.n_bins(), 2500);
    /// assert_eq!(BinGrid::new(3.0, 2500.0).unwrap().n_bins(), 834);
    /// assert!(BinGrid::new(0.0, 2500.0).is_err());
    /// ```
    pub fn new(resolution: f64, max_mz: f64) -> Result<Self, ProfileError> {
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(ProfileError::Configuration(format!(
                "bin resolution must be positive, got {}", resolution
            )));
        }
        if !(max_mz.is_finite() && max_mz > 0.0) {
            return Err(ProfileError::Configuration(format!(
                "maximum m/z bin must be positive, got {}", max_mz
            )));
        }
        Ok(BinGrid { resolution, max_mz })
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn max_mz(&self) -> f64 {
        self.max_mz
    }

    /// Number of bins, `ceil(max_mz / resolution)`.
    pub fn n_bins(&self) -> usize {
        (self.max_mz / self.resolution).ceil() as usize
    }

    /// True for indices a fragment may occupy in a binary profile, i.e. `0 < index < n_bins`.
    pub fn is_interior(&self, index: i64) -> bool {
        index > 0 && (index as usize) < self.n_bins()
    }
}

/// Options forwarded to [`Binner::bin`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BinningOptions {
    pub grid: BinGrid,
    /// Divide by the most intense bin after binning
    pub max_norm: bool,
    /// Drop fragment slots flagged with [`INVALID_MARKER`]
    pub remove_invalid_marker: bool,
    /// Peaks within one bin width of this m/z are removed
    pub precursor_mz: Option<f64>,
    pub min_intensity: f64,
    pub square_root: bool,
    pub log_scale: bool,
}

impl BinningOptions {
    /// Options for predicted spectra: raw summed intensities, invalid slots dropped.
    pub fn theoretical(grid: BinGrid) -> Self {
        BinningOptions {
            grid,
            max_norm: false,
            remove_invalid_marker: true,
            precursor_mz: None,
            min_intensity: 0.0,
            square_root: false,
            log_scale: false,
        }
    }

    /// Options for observed spectra: max-normalized, precursor peak removed.
    pub fn experimental(grid: BinGrid, precursor_mz: Option<f64>) -> Self {
        BinningOptions {
            grid,
            max_norm: true,
            remove_invalid_marker: false,
            precursor_mz,
            min_intensity: 0.0,
            square_root: false,
            log_scale: false,
        }
    }
}

/// Summary returned next to the bin indices by [`Binner::assign_bins`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BinAssignment {
    pub n_bins: usize,
    /// m/z values that were non-positive or not finite and went to the sentinel bin
    pub invalid: usize,
    /// m/z values at or beyond the upper bound of the grid
    pub out_of_range: usize,
}

/// Maps m/z values onto a [`BinGrid`].
///
/// Implementations must be deterministic: the same input always yields the same bins.
pub trait Binner: Send + Sync {
    /// Dense intensity vector of length `options.grid.n_bins()`.
    fn bin(&self, mz: &[f64], intensity: &[f64], options: &BinningOptions) -> Vec<f64>;

    /// Bin index of every m/z value, in input order.
    fn assign_bins(&self, mz: &[f64], grid: &BinGrid) -> (Vec<i64>, BinAssignment);
}

/// Reference binner, `floor(mz / resolution)` with summed intensities.
#[derive(Clone, Copy, Debug, Default)]
pub struct UniformBinner;

impl UniformBinner {
    fn bin_index(mz: f64, grid: &BinGrid) -> i64 {
        if !(mz.is_finite() && mz > 0.0) {
            return 0;
        }
        (mz / grid.resolution()).floor() as i64
    }
}

impl Binner for UniformBinner {
    /// # Example
    ///
    /// ```
    /// use msprofile::binning::{BinGrid, Binner, BinningOptions, UniformBinner};
    ///
    /// let grid = BinGrid::new(1.0, 10.0).unwrap();
    /// let binned = UniformBinner.bin(&[2.2, 2.7, 5.5, 12.0], &[1.0, 2.0, 4.0, 8.0], &BinningOptions::theoretical(grid));
    /// assert_eq!(binned, vec![0.0, 0.0, 3.0, 0.0, 0.0, 4.0, 0.0, 0.0, 0.0, 0.0]);
    /// ```
    fn bin(&self, mz: &[f64], intensity: &[f64], options: &BinningOptions) -> Vec<f64> {
        let grid = &options.grid;
        let n_bins = grid.n_bins();
        let mut binned = vec![0.0; n_bins];

        for (&mz, &intensity) in mz.iter().zip(intensity.iter()) {
            if options.remove_invalid_marker && (mz == INVALID_MARKER || intensity == INVALID_MARKER) {
                continue;
            }
            if intensity < options.min_intensity {
                continue;
            }
            if let Some(precursor_mz) = options.precursor_mz {
                if (mz - precursor_mz).abs() <= grid.resolution() {
                    continue;
                }
            }
            let index = Self::bin_index(mz, grid);
            if index >= 0 && (index as usize) < n_bins {
                binned[index as usize] += intensity;
            }
        }

        if options.max_norm {
            let max = binned.iter().cloned().fold(0.0, f64::max);
            if max > 0.0 {
                binned.iter_mut().for_each(|value| *value /= max);
            }
        }
        if options.square_root {
            binned.iter_mut().for_each(|value| *value = value.sqrt());
        }
        if options.log_scale {
            binned.iter_mut().for_each(|value| *value = value.ln_1p());
        }
        binned
    }

    /// # Example
    ///
    /// ```
    /// use msprofile::binning::{BinGrid, Binner, UniformBinner};
    ///
    /// let grid = BinGrid::new(0.5, 10.0).unwrap();
    /// let (indices, assignment) = UniformBinner.assign_bins(&[0.0, 1.2, 9.9, 25.0], &grid);
    /// assert_eq!(indices, vec![0, 2, 19, 50]);
    /// assert_eq!(assignment.invalid, 1);
    /// assert_eq!(assignment.out_of_range, 1);
    /// ```
    fn assign_bins(&self, mz: &[f64], grid: &BinGrid) -> (Vec<i64>, BinAssignment) {
        let n_bins = grid.n_bins();
        let mut assignment = BinAssignment { n_bins, ..Default::default() };

        let indices = mz.iter()
            .map(|&mz| {
                let index = Self::bin_index(mz, grid);
                if index == 0 && !(mz.is_finite() && mz > 0.0) {
                    assignment.invalid += 1;
                } else if index as usize >= n_bins {
                    assignment.out_of_range += 1;
                }
                index
            })
            .collect();

        (indices, assignment)
    }
}

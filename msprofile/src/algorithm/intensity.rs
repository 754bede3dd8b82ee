use nalgebra::{DMatrix, RealField};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::binning::{BinGrid, Binner, BinningOptions};
use crate::data::channel::ChannelLayout;
use crate::data::spectrum::{ExperimentalSpectrum, PredictedSpectra};
use crate::data::tensor::Tensor3;
use crate::error::ProfileError;

/// Default epsilon added before taking the logarithm
pub const LOG_EPSILON: f64 = 0.05;

/// Default epsilon of the relative difference denominator
pub const RELATIVE_DIFFERENCE_EPSILON: f64 = 1e-5;

fn to_row<T: RealField + Copy>(binned: &[f64]) -> impl Iterator<Item = T> + '_ {
    binned.iter().map(|&value| nalgebra::convert::<f64, T>(value))
}

/// Binned intensities of one spectrum as a (1 × bins) matrix.
///
/// Fails with `ShapeMismatch` when the binner does not return exactly one value per bin.
pub fn bin_spectrum<T: RealField + Copy, B: Binner + ?Sized>(
    binner: &B,
    mz: &[f64],
    intensity: &[f64],
    options: &BinningOptions,
) -> Result<DMatrix<T>, ProfileError> {
    let n_bins = options.grid.n_bins();
    let binned = binner.bin(mz, intensity, options);
    if binned.len() != n_bins {
        return Err(ProfileError::shape_mismatch(n_bins, binned.len(), "bins returned by the binner"));
    }
    Ok(DMatrix::from_iterator(1, n_bins, to_row(&binned)))
}

/// Summed predicted intensity over all fragments, shape (N, 1, B).
///
/// # Example
///
/// ```
/// use msprofile::algorithm::intensity::build_binned_intensities;
/// use msprofile::binning::{BinGrid, UniformBinner};
/// use msprofile::data::spectrum::{FragmentType, PredictedSpectra, PredictedSpectrum};
///
/// let grid = BinGrid::new(1.0, 100.0).unwrap();
/// let spectra = PredictedSpectra::new(vec![PredictedSpectrum::new(
///     vec![10.2, 10.8, -1.0],
///     vec![0.25, 0.5, -1.0],
///     vec![1, 2, 1],
///     vec![FragmentType::B, FragmentType::Y, FragmentType::Y],
/// )]);
/// let binned = build_binned_intensities::<f32, _>(&UniformBinner, &grid, &spectra).unwrap();
/// assert_eq!(binned.shape(), (1, 1, 100));
/// assert_eq!(binned.get(0, 0, 10), 0.75);
/// ```
pub fn build_binned_intensities<T: RealField + Copy, B: Binner + ?Sized>(
    binner: &B,
    grid: &BinGrid,
    spectra: &PredictedSpectra,
) -> Result<Tensor3<T>, ProfileError> {
    let options = BinningOptions::theoretical(*grid);
    let slices = spectra.spectra.par_iter()
        .map(|spectrum| bin_spectrum(binner, &spectrum.mz, &spectrum.intensity, &options))
        .collect::<Result<Vec<_>, _>>()?;

    Tensor3::from_slices(slices, 1, grid.n_bins())
}

/// Binned predicted intensity per ion type and charge channel, shape (N, C, B).
pub fn build_channel_binned_intensities<T: RealField + Copy, B: Binner + ?Sized>(
    binner: &B,
    grid: &BinGrid,
    layout: &ChannelLayout,
    spectra: &PredictedSpectra,
) -> Result<Tensor3<T>, ProfileError> {
    let options = BinningOptions::theoretical(*grid);
    let slices = spectra.spectra.par_iter()
        .map(|spectrum| -> Result<DMatrix<T>, ProfileError> {
            let mut binned = DMatrix::<T>::zeros(layout.len(), grid.n_bins());
            for (j, channel) in layout.channels().iter().enumerate() {
                let (mz, intensity) = spectrum.subset(channel.kind, channel.charge);
                binned.row_mut(j).copy_from(&bin_spectrum::<T, B>(binner, &mz, &intensity, &options)?);
            }
            Ok(binned)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Tensor3::from_slices(slices, layout.len(), grid.n_bins())
}

/// Max-normalized binned intensity of observed spectra, shape (N, 1, B).
pub fn build_experimental_binned<T: RealField + Copy, B: Binner + ?Sized>(
    binner: &B,
    grid: &BinGrid,
    spectra: &[ExperimentalSpectrum],
) -> Result<Tensor3<T>, ProfileError> {
    for (i, experimental) in spectra.iter().enumerate() {
        let spectrum = &experimental.spectrum;
        if spectrum.mz.len() != spectrum.intensity.len() {
            return Err(ProfileError::shape_mismatch(
                spectrum.mz.len(), spectrum.intensity.len(), format!("intensities of experimental spectrum {}", i),
            ));
        }
    }

    let slices = spectra.par_iter()
        .map(|experimental| {
            let options = BinningOptions::experimental(*grid, experimental.precursor_mz);
            bin_spectrum(binner, &experimental.spectrum.mz, &experimental.spectrum.intensity, &options)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Tensor3::from_slices(slices, 1, grid.n_bins())
}

/// log transform followed by min-max scaling over the whole tensor
///
/// Arguments:
///
/// * `tensor` - intensities, zeros are allowed
/// * `epsilon` - added before the logarithm
///
/// Returns:
///
/// * `tensor` - values in [0, 1], or `DegenerateRange` when all values are equal
///
/// # Examples
///
/// ```
/// use msprofile::algorithm::intensity::log_min_max;
/// use msprofile::data::tensor::Tensor3;
///
/// let tensor = Tensor3::<f64>::zeros(1, 1, 3).map(|_| 1.0);
/// assert!(log_min_max(&tensor, 0.05).is_err());
/// ```
pub fn log_min_max<T: RealField + Copy>(
    tensor: &Tensor3<T>,
    epsilon: f64,
) -> Result<Tensor3<T>, ProfileError> {
    let epsilon: T = nalgebra::convert(epsilon);
    let logged = tensor.map(|value| (value + epsilon).ln());

    let mut values = logged.slices().iter().flat_map(|slice| slice.iter().copied());
    let Some(first) = values.next() else {
        return Ok(logged);
    };
    let (min, max) = values.fold((first, first), |(min, max), value| {
        (if value < min { value } else { min }, if value > max { value } else { max })
    });

    if !(max > min) {
        return Err(ProfileError::DegenerateRange {
            value: nalgebra::try_convert::<T, f64>(min).unwrap_or(f64::NAN),
        });
    }
    let range = max - min;
    Ok(logged.map(|value| (value - min) / range))
}

/// Element-wise square root, inputs must be non-negative.
pub fn square_root<T: RealField + Copy>(tensor: &Tensor3<T>) -> Tensor3<T> {
    tensor.map(|value| value.sqrt())
}

/// The two optional intensity transforms, log-min-max first, then square root.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntensityTransform {
    /// Epsilon of the log transform, `None` disables it
    pub log_epsilon: Option<f64>,
    pub square_root: bool,
}

impl IntensityTransform {
    pub fn new(log_transform: bool, log_epsilon: f64, square_root: bool) -> Self {
        IntensityTransform {
            log_epsilon: log_transform.then_some(log_epsilon),
            square_root,
        }
    }

    pub fn apply<T: RealField + Copy>(&self, tensor: Tensor3<T>) -> Result<Tensor3<T>, ProfileError> {
        let tensor = match self.log_epsilon {
            Some(epsilon) => log_min_max(&tensor, epsilon)?,
            None => tensor,
        };
        Ok(if self.square_root { square_root(&tensor) } else { tensor })
    }
}

impl Default for IntensityTransform {
    fn default() -> Self {
        IntensityTransform::new(false, LOG_EPSILON, true)
    }
}

/// Absolute and relative difference channels between theoretical and experimental intensities.
///
/// `relative = |t - e| / ((t + e) / 2 + epsilon)`
pub fn difference_channels<T: RealField + Copy>(
    theoretical: &Tensor3<T>,
    experimental: &Tensor3<T>,
    epsilon: f64,
) -> Result<(Tensor3<T>, Tensor3<T>), ProfileError> {
    if theoretical.shape() != experimental.shape() {
        let (n, c, b) = theoretical.shape();
        let (m, d, e) = experimental.shape();
        return Err(ProfileError::shape_mismatch(n * c * b, m * d * e, "experimental intensities"));
    }
    let epsilon: T = nalgebra::convert(epsilon);
    let two: T = nalgebra::convert(2.0);

    let (absolute, relative): (Vec<_>, Vec<_>) = theoretical.slices().iter()
        .zip(experimental.slices().iter())
        .map(|(t, e)| {
            let absolute = t.zip_map(e, |t, e| (t - e).abs());
            let relative = t.zip_map(e, |t, e| (t - e).abs() / ((t + e) / two + epsilon));
            (absolute, relative)
        })
        .unzip();

    let (_, n_channels, n_bins) = theoretical.shape();
    Ok((
        Tensor3::from_slices(absolute, n_channels, n_bins)?,
        Tensor3::from_slices(relative, n_channels, n_bins)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binning::{BinAssignment, UniformBinner};
    use crate::data::spectrum::{FragmentType, PredictedSpectrum};

    fn tensor_of(values: &[f64]) -> Tensor3<f64> {
        let slice = DMatrix::from_row_slice(1, values.len(), values);
        Tensor3::from_slices(vec![slice], 1, values.len()).unwrap()
    }

    #[test]
    fn test_difference_channels() {
        let theoretical = tensor_of(&[0.8, 0.0, 0.3]);
        let experimental = tensor_of(&[0.6, 0.0, 0.3]);
        let (absolute, relative) = difference_channels(&theoretical, &experimental, RELATIVE_DIFFERENCE_EPSILON).unwrap();

        assert!((absolute.get(0, 0, 0) - 0.2).abs() < 1e-12);
        assert!((relative.get(0, 0, 0) - 0.2 / (0.7 + 1e-5)).abs() < 1e-12);
        assert!((relative.get(0, 0, 0) - 0.2857).abs() < 1e-4);
        assert_eq!(relative.get(0, 0, 1), 0.0);
        assert_eq!(absolute.get(0, 0, 2), 0.0);
    }

    #[test]
    fn test_difference_channels_reject_mismatched_shapes() {
        let theoretical = tensor_of(&[0.8, 0.0]);
        let experimental = tensor_of(&[0.6, 0.0, 0.3]);
        assert!(difference_channels(&theoretical, &experimental, 1e-5).is_err());
    }

    #[test]
    fn test_log_min_max_spans_unit_interval() {
        let tensor = tensor_of(&[0.0, 1.0, 4.0, 0.5]);
        let scaled = log_min_max(&tensor, LOG_EPSILON).unwrap();
        let values: Vec<f64> = scaled.slice(0).iter().copied().collect();

        assert_eq!(values[0], 0.0);
        assert_eq!(values[2], 1.0);
        assert!(values[3] > 0.0 && values[3] < values[1]);
        let expected = ((1.05f64).ln() - 0.05f64.ln()) / (4.05f64.ln() - 0.05f64.ln());
        assert!((values[1] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_log_min_max_degenerate_range() {
        match log_min_max(&tensor_of(&[0.0, 0.0, 0.0]), LOG_EPSILON) {
            Err(ProfileError::DegenerateRange { value }) => assert!((value - 0.05f64.ln()).abs() < 1e-12),
            other => panic!("expected a degenerate range, got {:?}", other),
        }
    }

    #[test]
    fn test_transform_order() {
        let tensor = tensor_of(&[0.0, 4.0, 16.0]);
        let sqrt_only = IntensityTransform::new(false, LOG_EPSILON, true).apply(tensor.clone()).unwrap();
        assert_eq!(sqrt_only.slice(0).iter().copied().collect::<Vec<_>>(), vec![0.0, 2.0, 4.0]);

        let both = IntensityTransform::new(true, LOG_EPSILON, true).apply(tensor.clone()).unwrap();
        let log_only = IntensityTransform::new(true, LOG_EPSILON, false).apply(tensor.clone()).unwrap();
        assert_eq!(both, square_root(&log_only));

        let none = IntensityTransform::new(false, LOG_EPSILON, false).apply(tensor.clone()).unwrap();
        assert_eq!(none, tensor);
    }

    #[test]
    fn test_channel_binned_intensities() {
        let grid = BinGrid::new(1.0, 50.0).unwrap();
        let layout = ChannelLayout::new(&[1, 2], &[FragmentType::Y, FragmentType::B]).unwrap();
        let spectra = PredictedSpectra::new(vec![PredictedSpectrum::new(
            vec![10.5, 20.5, 30.5, 0.0],
            vec![1.0, 2.0, 3.0, 0.0],
            vec![1, 1, 2, 1],
            vec![FragmentType::Y, FragmentType::B, FragmentType::B, FragmentType::Y],
        )]);

        let binned = build_channel_binned_intensities::<f32, _>(&UniformBinner, &grid, &layout, &spectra).unwrap();
        assert_eq!(binned.shape(), (1, 4, 50));
        assert_eq!(binned.get(0, 0, 10), 1.0);
        assert_eq!(binned.get(0, 1, 20), 2.0);
        assert_eq!(binned.get(0, 3, 30), 3.0);
        assert_eq!(binned.slice(0).row(2).iter().sum::<f32>(), 0.0);
    }

    /// Ignores the grid and always returns three bins.
    struct TruncatingBinner;

    impl Binner for TruncatingBinner {
        fn bin(&self, _mz: &[f64], _intensity: &[f64], _options: &BinningOptions) -> Vec<f64> {
            vec![0.0; 3]
        }

        fn assign_bins(&self, mz: &[f64], grid: &BinGrid) -> (Vec<i64>, BinAssignment) {
            UniformBinner.assign_bins(mz, grid)
        }
    }

    #[test]
    fn test_wrong_bin_count_is_an_error() {
        let grid = BinGrid::new(1.0, 500.0).unwrap();
        let layout = ChannelLayout::new(&[1], &[FragmentType::B]).unwrap();
        let spectra = PredictedSpectra::new(vec![PredictedSpectrum::new(
            vec![100.5],
            vec![4.0],
            vec![1],
            vec![FragmentType::B],
        )]);
        let experimental = vec![ExperimentalSpectrum::new(vec![50.0], vec![1.0], None)];

        let expect_mismatch = |result: Result<Tensor3<f64>, ProfileError>| match result {
            Err(ProfileError::ShapeMismatch { expected, found, .. }) => assert_eq!((expected, found), (500, 3)),
            other => panic!("expected a shape mismatch, got {:?}", other.map(|t| t.shape())),
        };
        expect_mismatch(build_binned_intensities(&TruncatingBinner, &grid, &spectra));
        expect_mismatch(build_channel_binned_intensities(&TruncatingBinner, &grid, &layout, &spectra));
        expect_mismatch(build_experimental_binned(&TruncatingBinner, &grid, &experimental));
    }

    #[test]
    fn test_experimental_binning_is_max_normalized() {
        let grid = BinGrid::new(1.0, 50.0).unwrap();
        let spectra = vec![
            ExperimentalSpectrum::new(vec![10.0, 20.0], vec![50.0, 200.0], None),
            ExperimentalSpectrum::new(vec![5.0], vec![3.0], Some(40.0)),
        ];
        let binned = build_experimental_binned::<f64, _>(&UniformBinner, &grid, &spectra).unwrap();
        assert_eq!(binned.shape(), (2, 1, 50));
        assert_eq!(binned.get(0, 0, 10), 0.25);
        assert_eq!(binned.get(0, 0, 20), 1.0);
        assert_eq!(binned.get(1, 0, 5), 1.0);

        let ragged = vec![ExperimentalSpectrum::new(vec![10.0, 20.0], vec![1.0], None)];
        assert!(build_experimental_binned::<f64, _>(&UniformBinner, &grid, &ragged).is_err());
    }
}

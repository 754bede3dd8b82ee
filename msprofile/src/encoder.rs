use nalgebra::RealField;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::algorithm::intensity::{
    build_binned_intensities, build_channel_binned_intensities, build_experimental_binned, difference_channels,
    IntensityTransform,
};
use crate::algorithm::profile::{
    build_profiles, fragment_position_labels, fragment_positions, precursor_ranges,
};
use crate::binning::{BinGrid, Binner, UniformBinner};
use crate::config::ProfileEncoderConfig;
use crate::data::channel::ChannelLayout;
use crate::data::spectrum::{ExperimentalSpectrum, PredictedSpectra, SpectrumQuery};
use crate::data::tensor::{EncodedBatch, Tensor3};
use crate::error::ProfileError;
use crate::predictor::{PredictionError, PredictionRequest, SpectrumPredictor};

pub const PRECURSOR_RANGE_LABEL: &str = "precursor_range";
pub const ABSOLUTE_DIFFERENCE_LABEL: &str = "abs_diff";
pub const RELATIVE_DIFFERENCE_LABEL: &str = "rel_diff";
pub const THEORETICAL_LABEL: &str = "theoretical";
pub const EXPERIMENTAL_LABEL: &str = "experimental";

/// Optional channels of a combined theoretical/experimental tensor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombineOptions {
    /// Append absolute and relative difference channels
    pub intensity_diff: bool,
    /// Append the precursor range channel
    pub precursor_range: bool,
    /// Return one sparse matrix per spectrum
    pub sparse: bool,
}

/// Turns peptide queries and observed spectra into multi-channel tensors.
///
/// # Description
///
/// The encoder owns the bin grid and channel layout derived from its configuration, a
/// spectrum predictor called once per request, and a binning back-end. Per-spectrum work
/// runs on a dedicated rayon pool of `num_threads` workers.
pub struct ProfileEncoder<P, B = UniformBinner> {
    config: ProfileEncoderConfig,
    grid: BinGrid,
    layout: ChannelLayout,
    transform: IntensityTransform,
    predictor: P,
    binner: B,
    pool: ThreadPool,
}

impl<P: SpectrumPredictor> ProfileEncoder<P, UniformBinner> {
    /// Creates an encoder with the reference [`UniformBinner`].
    pub fn new(config: ProfileEncoderConfig, predictor: P) -> Result<Self, ProfileError> {
        Self::with_binner(config, predictor, UniformBinner)
    }
}

impl<P: SpectrumPredictor, B: Binner> ProfileEncoder<P, B> {
    pub fn with_binner(config: ProfileEncoderConfig, predictor: P, binner: B) -> Result<Self, ProfileError> {
        config.validate()?;
        let grid = config.grid()?;
        let layout = config.layout()?;
        let transform = config.transform();
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.num_threads)
            .build()
            .map_err(|e| ProfileError::Configuration(format!("failed to build thread pool: {}", e)))?;

        debug!(bins = grid.n_bins(), channels = ?layout.labels(), "profile encoder ready");

        Ok(ProfileEncoder { config, grid, layout, transform, predictor, binner, pool })
    }

    pub fn config(&self) -> &ProfileEncoderConfig {
        &self.config
    }

    pub fn grid(&self) -> &BinGrid {
        &self.grid
    }

    pub fn layout(&self) -> &ChannelLayout {
        &self.layout
    }

    pub fn predictor(&self) -> &P {
        &self.predictor
    }

    /// Labels of the binary profile channels, charge-major.
    pub fn channel_labels(&self) -> Vec<String> {
        self.layout.labels()
    }

    /// Labels of every channel of a combined tensor, in channel order.
    ///
    /// Profiles, precursor range, absolute and relative difference, theoretical and
    /// experimental come first. Fragment position channels, if configured, are appended last
    /// so the indices of the other channels do not depend on them.
    pub fn combined_labels(&self, options: &CombineOptions) -> Vec<String> {
        let mut labels = self.layout.labels();
        if options.precursor_range {
            labels.push(PRECURSOR_RANGE_LABEL.to_string());
        }
        if options.intensity_diff {
            labels.push(ABSOLUTE_DIFFERENCE_LABEL.to_string());
            labels.push(RELATIVE_DIFFERENCE_LABEL.to_string());
        }
        labels.push(THEORETICAL_LABEL.to_string());
        labels.push(EXPERIMENTAL_LABEL.to_string());
        if self.config.add_fragment_position {
            labels.extend(fragment_position_labels(&self.layout));
        }
        labels
    }

    /// Single predictor call for the whole batch, checked for count and shape alignment.
    #[instrument(skip_all, level = "trace")]
    pub fn predict(&self, queries: &[SpectrumQuery]) -> Result<PredictedSpectra, ProfileError> {
        let sequences = queries.iter()
            .map(|query| query.sequence.to_prediction_string())
            .collect::<Result<Vec<_>, _>>()?;
        let request = PredictionRequest {
            sequences,
            charges: queries.iter().map(|query| query.charge).collect(),
            collision_energies: queries.iter().map(|query| query.collision_energy).collect(),
        };

        let predicted = self.predictor.predict(&request)?;
        if predicted.len() != queries.len() {
            let (expected, found) = (queries.len(), predicted.len());
            return Err(PredictionError::SpectrumCount { expected, found }.into());
        }
        if predicted.fragment_slots().is_none() {
            return Err(PredictionError::Misaligned.into());
        }
        debug!(spectra = predicted.len(), slots = ?predicted.fragment_slots(), "received predictions");
        Ok(predicted)
    }

    /// Peptide masses used for boundary injection, `None` when injection is disabled.
    ///
    /// A query whose mass cannot be computed is profiled without boundaries.
    pub fn peptide_masses(&self, queries: &[SpectrumQuery]) -> Option<Vec<Option<f64>>> {
        if !self.config.add_leftmost_rightmost {
            return None;
        }
        Some(queries.iter()
            .enumerate()
            .map(|(i, query)| match query.sequence.mono_isotopic_mass() {
                Ok(mass) => Some(mass),
                Err(e) => {
                    warn!(spectrum = i, error = %e, "skipping boundary injection");
                    None
                }
            })
            .collect())
    }

    /// Binary presence profiles, shape (N, C, B).
    #[instrument(skip_all, level = "trace")]
    pub fn peptide_to_profile(
        &self,
        queries: &[SpectrumQuery],
        sparse: bool,
    ) -> Result<EncodedBatch<u8>, ProfileError> {
        let predicted = self.predict(queries)?;
        let profiles = self.profile_from_prediction(queries, &predicted)?;
        Ok(EncodedBatch::from_tensor(profiles, sparse))
    }

    /// Binary profiles of already predicted spectra, `queries` supply the peptide masses.
    pub fn profile_from_prediction(
        &self,
        queries: &[SpectrumQuery],
        predicted: &PredictedSpectra,
    ) -> Result<Tensor3<u8>, ProfileError> {
        if predicted.len() != queries.len() {
            return Err(ProfileError::shape_mismatch(queries.len(), predicted.len(), "predicted spectra"));
        }
        let masses = self.peptide_masses(queries);
        self.profiles_with_masses(predicted, masses.as_deref())
    }

    fn profiles_with_masses(
        &self,
        predicted: &PredictedSpectra,
        masses: Option<&[Option<f64>]>,
    ) -> Result<Tensor3<u8>, ProfileError> {
        let profiles = self.pool.install(|| {
            build_profiles(&self.binner, &self.grid, &self.layout, predicted, masses)
        })?;

        for (j, label) in self.layout.labels().iter().enumerate() {
            let populated: usize = profiles.slices().iter()
                .map(|slice| slice.row(j).iter().filter(|&&v| v > 0).count())
                .sum();
            debug!(channel = %label, populated, "binary profile channel");
        }
        Ok(profiles)
    }

    /// Summed predicted intensity over all fragments, shape (N, 1, B), untransformed.
    #[instrument(skip_all, level = "trace")]
    pub fn peptide_to_binned<T: RealField + Copy>(
        &self,
        queries: &[SpectrumQuery],
        sparse: bool,
    ) -> Result<EncodedBatch<T>, ProfileError> {
        let predicted = self.predict(queries)?;
        let binned = self.pool.install(|| {
            build_binned_intensities::<T, B>(&self.binner, &self.grid, &predicted)
        })?;
        Ok(EncodedBatch::from_tensor(binned, sparse))
    }

    /// Predicted intensity per channel, shape (N, C, B), untransformed.
    #[instrument(skip_all, level = "trace")]
    pub fn peptide_to_channel_binned<T: RealField + Copy>(
        &self,
        queries: &[SpectrumQuery],
        sparse: bool,
    ) -> Result<EncodedBatch<T>, ProfileError> {
        let predicted = self.predict(queries)?;
        let binned = self.pool.install(|| {
            build_channel_binned_intensities::<T, B>(&self.binner, &self.grid, &self.layout, &predicted)
        })?;
        Ok(EncodedBatch::from_tensor(binned, sparse))
    }

    /// Max-normalized observed intensity, shape (N, 1, B).
    pub fn experimental_binned<T: RealField + Copy>(
        &self,
        spectra: &[ExperimentalSpectrum],
    ) -> Result<Tensor3<T>, ProfileError> {
        self.pool.install(|| build_experimental_binned::<T, B>(&self.binner, &self.grid, spectra))
    }

    /// Observed intensity after the configured transforms, shape (N, 1, B).
    pub fn experimental_processed<T: RealField + Copy>(
        &self,
        spectra: &[ExperimentalSpectrum],
    ) -> Result<Tensor3<T>, ProfileError> {
        self.transform.apply(self.experimental_binned(spectra)?)
    }

    /// Profiles and theoretical intensity of the queries next to the observed intensity.
    ///
    /// Channel order as in [`Self::combined_labels`].
    #[instrument(skip_all, level = "trace")]
    pub fn encode_with_experimental<T: RealField + Copy>(
        &self,
        queries: &[SpectrumQuery],
        experimental: &[ExperimentalSpectrum],
        options: &CombineOptions,
    ) -> Result<EncodedBatch<T>, ProfileError> {
        if experimental.len() != queries.len() {
            let found = experimental.len();
            return Err(ProfileError::shape_mismatch(queries.len(), found, "experimental spectra"));
        }
        let predicted = self.predict(queries)?;
        self.combine_from_prediction(queries, &predicted, experimental, options)
    }

    /// Same as [`Self::encode_with_experimental`] for spectra that were already predicted.
    pub fn combine_from_prediction<T: RealField + Copy>(
        &self,
        queries: &[SpectrumQuery],
        predicted: &PredictedSpectra,
        experimental: &[ExperimentalSpectrum],
        options: &CombineOptions,
    ) -> Result<EncodedBatch<T>, ProfileError> {
        if predicted.len() != queries.len() {
            return Err(ProfileError::shape_mismatch(queries.len(), predicted.len(), "predicted spectra"));
        }
        if experimental.len() != predicted.len() {
            let found = experimental.len();
            return Err(ProfileError::shape_mismatch(predicted.len(), found, "experimental spectra"));
        }
        let masses = self.peptide_masses(queries);
        let profiles = self.profiles_with_masses(predicted, masses.as_deref())?;

        let theoretical = self.pool.install(|| {
            build_binned_intensities::<T, B>(&self.binner, &self.grid, predicted)
        })?;
        let theoretical = self.transform.apply(theoretical)?;
        let experimental = self.experimental_processed::<T>(experimental)?;

        let mut parts: Vec<Tensor3<T>> = vec![profiles.map(|v| nalgebra::convert::<f64, T>(v as f64))];
        if options.precursor_range {
            let ranges = self.pool.install(|| precursor_ranges(&profiles))?;
            parts.push(ranges.map(|v| nalgebra::convert::<f64, T>(v as f64)));
        }
        if options.intensity_diff {
            let epsilon = self.config.relative_difference_epsilon;
            let (absolute, relative) = difference_channels(&theoretical, &experimental, epsilon)?;
            parts.push(absolute);
            parts.push(relative);
        }
        parts.push(theoretical);
        parts.push(experimental);
        if self.config.add_fragment_position {
            let masses = masses.as_deref();
            parts.push(self.pool.install(|| {
                fragment_positions::<T, B>(&self.binner, &self.grid, &self.layout, predicted, masses)
            })?);
        }

        let combined = Tensor3::concat_channels(&parts.iter().collect::<Vec<_>>())?;
        debug!(shape = ?combined.shape(), labels = ?self.combined_labels(options), "combined tensor");
        Ok(EncodedBatch::from_tensor(combined, options.sparse))
    }

    /// Raw per-channel theoretical intensity followed by the max-normalized observed
    /// intensity, shape (N, C + 1, B). No intensity transform is applied.
    #[instrument(skip_all, level = "trace")]
    pub fn encode_across_channels<T: RealField + Copy>(
        &self,
        queries: &[SpectrumQuery],
        experimental: &[ExperimentalSpectrum],
        sparse: bool,
    ) -> Result<EncodedBatch<T>, ProfileError> {
        if experimental.len() != queries.len() {
            let found = experimental.len();
            return Err(ProfileError::shape_mismatch(queries.len(), found, "experimental spectra"));
        }
        let predicted = self.predict(queries)?;
        let theoretical = self.pool.install(|| {
            build_channel_binned_intensities::<T, B>(&self.binner, &self.grid, &self.layout, &predicted)
        })?;
        let experimental = self.experimental_binned::<T>(experimental)?;

        let combined = Tensor3::concat_channels(&[&theoretical, &experimental])?;
        Ok(EncodedBatch::from_tensor(combined, sparse))
    }
}

use itertools::Itertools;
use nalgebra::{DMatrix, RealField};
use ordered_float::OrderedFloat;
use rayon::prelude::*;

use crate::binning::{BinGrid, Binner};
use crate::chemistry::constants::{
    B_ION_LEFT_OFFSET, B_ION_RIGHT_OFFSET, Y_ION_LEFT_OFFSET, Y_ION_RIGHT_OFFSET,
};
use crate::data::channel::{Channel, ChannelLayout};
use crate::data::spectrum::{FragmentType, PredictedSpectra, PredictedSpectrum};
use crate::data::tensor::Tensor3;
use crate::error::ProfileError;

/// synthetic m/z values bounding the fragments of one channel
///
/// Arguments:
///
/// * `kind` - ion type of the channel, everything but `b` follows the y-ion convention
/// * `charge` - charge of the channel
/// * `peptide_mass` - neutral mass of the peptide
///
/// Returns:
///
/// * `(leftmost, rightmost)` - m/z of the smallest fragment and of the fragment one residue
///   short of the full peptide
///
/// # Examples
///
/// ```
/// use msprofile::algorithm::profile::terminal_boundaries;
/// use msprofile::data::spectrum::FragmentType;
///
/// assert_eq!(terminal_boundaries(FragmentType::B, 1, 500.0), (1.0, 483.0));
/// assert_eq!(terminal_boundaries(FragmentType::Y, 1, 500.0), (19.0, 501.0));
/// ```
pub fn terminal_boundaries(kind: FragmentType, charge: i32, peptide_mass: f64) -> (f64, f64) {
    let charge = charge as f64;
    match kind {
        FragmentType::B => (B_ION_LEFT_OFFSET / charge, (peptide_mass + B_ION_RIGHT_OFFSET) / charge),
        _ => (Y_ION_LEFT_OFFSET / charge, (peptide_mass + Y_ION_RIGHT_OFFSET) / charge),
    }
}

/// Sorted positive fragment m/z of one channel, wrapped by the terminal boundaries when a
/// peptide mass is given.
pub fn channel_fragment_mzs(
    spectrum: &PredictedSpectrum,
    channel: &Channel,
    peptide_mass: Option<f64>,
) -> Vec<f64> {
    let (mz, _) = spectrum.subset(channel.kind, channel.charge);
    let fragments = mz.into_iter()
        .filter(|&mz| mz > 0.0)
        .sorted_by_key(|&mz| OrderedFloat(mz));

    match peptide_mass {
        Some(mass) => {
            let (leftmost, rightmost) = terminal_boundaries(channel.kind, channel.charge, mass);
            std::iter::once(leftmost).chain(fragments).chain(std::iter::once(rightmost)).collect()
        }
        None => fragments.collect(),
    }
}

/// Bin indices of `mz` that may be set in a binary profile, edge bins removed.
pub fn profile_bins<B: Binner + ?Sized>(binner: &B, grid: &BinGrid, mz: &[f64]) -> Vec<usize> {
    let (indices, _) = binner.assign_bins(mz, grid);
    indices.into_iter()
        .filter(|&index| grid.is_interior(index))
        .map(|index| index as usize)
        .collect()
}

/// Binary (channel × bin) profile of one predicted spectrum.
///
/// # Example
///
/// ```
/// use msprofile::algorithm::profile::build_profile_slice;
/// use msprofile::binning::{BinGrid, UniformBinner};
/// use msprofile::data::channel::ChannelLayout;
/// use msprofile::data::spectrum::{FragmentType, PredictedSpectrum};
///
/// let grid = BinGrid::new(1.0, 100.0).unwrap();
/// let layout = ChannelLayout::new(&[1], &[FragmentType::Y, FragmentType::B]).unwrap();
/// let spectrum = PredictedSpectrum::new(
///     vec![20.5, 30.5, 0.0],
///     vec![1.0, 0.5, 0.0],
///     vec![1, 1, 1],
///     vec![FragmentType::Y, FragmentType::B, FragmentType::B],
/// );
/// let profile = build_profile_slice(&UniformBinner, &grid, &layout, &spectrum, None);
/// assert_eq!(profile[(0, 20)], 1);
/// assert_eq!(profile[(1, 30)], 1);
/// assert_eq!(profile.iter().map(|&v| v as usize).sum::<usize>(), 2);
/// ```
pub fn build_profile_slice<B: Binner + ?Sized>(
    binner: &B,
    grid: &BinGrid,
    layout: &ChannelLayout,
    spectrum: &PredictedSpectrum,
    peptide_mass: Option<f64>,
) -> DMatrix<u8> {
    let mut profile = DMatrix::zeros(layout.len(), grid.n_bins());
    for (j, channel) in layout.channels().iter().enumerate() {
        let mz = channel_fragment_mzs(spectrum, channel, peptide_mass);
        for bin in profile_bins(binner, grid, &mz) {
            profile[(j, bin)] = 1;
        }
    }
    profile
}

/// Binary profiles of a batch, shape (N, C, B), computed per spectrum in parallel.
///
/// `peptide_masses` enables terminal boundary injection, spectra whose mass is `None` are
/// profiled without boundaries.
pub fn build_profiles<B: Binner + ?Sized>(
    binner: &B,
    grid: &BinGrid,
    layout: &ChannelLayout,
    spectra: &PredictedSpectra,
    peptide_masses: Option<&[Option<f64>]>,
) -> Result<Tensor3<u8>, ProfileError> {
    if let Some(masses) = peptide_masses {
        if masses.len() != spectra.len() {
            return Err(ProfileError::shape_mismatch(spectra.len(), masses.len(), "peptide masses"));
        }
    }

    let slices = spectra.spectra.par_iter()
        .enumerate()
        .map(|(i, spectrum)| {
            let mass = peptide_masses.and_then(|masses| masses[i]);
            build_profile_slice(binner, grid, layout, spectrum, mass)
        })
        .collect();

    Tensor3::from_slices(slices, layout.len(), grid.n_bins())
}

/// coverage window of one profile slice
///
/// Returns a single channel set to 1 from the first to the last bin populated in any channel,
/// or `None` when nothing is populated.
///
/// # Examples
///
/// ```
/// use nalgebra::DMatrix;
/// use msprofile::algorithm::profile::precursor_range;
///
/// let mut profile = DMatrix::<u8>::zeros(2, 10);
/// profile[(0, 6)] = 1;
/// profile[(1, 2)] = 1;
/// let range = precursor_range(&profile).unwrap();
/// assert_eq!(range.iter().cloned().collect::<Vec<u8>>(), vec![0, 0, 1, 1, 1, 1, 1, 0, 0, 0]);
/// ```
pub fn precursor_range(profile: &DMatrix<u8>) -> Option<DMatrix<u8>> {
    let populated = |bin: &usize| profile.column(*bin).iter().any(|&v| v > 0);
    let first = (0..profile.ncols()).find(populated)?;
    let last = (0..profile.ncols()).rev().find(populated)?;

    let mut range = DMatrix::zeros(1, profile.ncols());
    range.columns_mut(first, last - first + 1).fill(1);
    Some(range)
}

/// Precursor range channel for every spectrum, shape (N, 1, B).
pub fn precursor_ranges(profiles: &Tensor3<u8>) -> Result<Tensor3<u8>, ProfileError> {
    let slices = profiles.slices().par_iter()
        .enumerate()
        .map(|(spectrum, profile)| precursor_range(profile).ok_or(ProfileError::EmptyProfile { spectrum }))
        .collect::<Result<Vec<_>, _>>()?;

    Tensor3::from_slices(slices, 1, profiles.n_bins())
}

/// Fragment position channels, one per ion type of the layout.
///
/// Each channel is built from the lowest considered charge of its ion type. The k-th of n
/// sorted fragment m/z (boundaries included) writes `k / n` into its bin, so positions lie in
/// (0, 1] and increase along the ion series. Bins shared by several fragments keep the largest
/// position.
pub fn fragment_positions<T: RealField + Copy, B: Binner + ?Sized>(
    binner: &B,
    grid: &BinGrid,
    layout: &ChannelLayout,
    spectra: &PredictedSpectra,
    peptide_masses: Option<&[Option<f64>]>,
) -> Result<Tensor3<T>, ProfileError> {
    let charge = layout.charges().iter().copied().min()
        .ok_or_else(|| ProfileError::Configuration("no charges to consider".to_string()))?;
    let channels: Vec<Channel> = layout.ion_types().iter().map(|&kind| Channel::new(charge, kind)).collect();

    let slices = spectra.spectra.par_iter()
        .enumerate()
        .map(|(i, spectrum)| {
            let mass = peptide_masses.and_then(|masses| masses.get(i).copied().flatten());
            let mut positions = DMatrix::<T>::zeros(channels.len(), grid.n_bins());
            for (j, channel) in channels.iter().enumerate() {
                let mz = channel_fragment_mzs(spectrum, channel, mass);
                let n = mz.len() as f64;
                let (indices, _) = binner.assign_bins(&mz, grid);
                for (k, index) in indices.into_iter().enumerate() {
                    if !grid.is_interior(index) {
                        continue;
                    }
                    let position: T = nalgebra::convert((k + 1) as f64 / n);
                    let entry = &mut positions[(j, index as usize)];
                    if position > *entry {
                        *entry = position;
                    }
                }
            }
            positions
        })
        .collect();

    Tensor3::from_slices(slices, channels.len(), grid.n_bins())
}

/// Labels of the fragment position channels.
pub fn fragment_position_labels(layout: &ChannelLayout) -> Vec<String> {
    layout.ion_types().iter().map(|kind| format!("{}#pos", kind)).collect()
}

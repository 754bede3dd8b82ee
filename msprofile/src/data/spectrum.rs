use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::algorithm::peptide::{
    calculate_peptide_mono_isotopic_mass, peptide_mass_from_residue_ids, residue_ids_to_sequence,
};
use crate::error::ProfileError;

/// Fragment ion series, annotated by the predictor for every fragment slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentType {
    A,
    B,
    C,
    X,
    Y,
    Z,
}

impl FragmentType {
    /// Returns true for ion series carrying the N-terminus of the peptide.
    pub fn is_n_terminal(&self) -> bool {
        matches!(self, FragmentType::A | FragmentType::B | FragmentType::C)
    }
}

impl Display for FragmentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FragmentType::A => write!(f, "a"),
            FragmentType::B => write!(f, "b"),
            FragmentType::C => write!(f, "c"),
            FragmentType::X => write!(f, "x"),
            FragmentType::Y => write!(f, "y"),
            FragmentType::Z => write!(f, "z"),
        }
    }
}

impl FromStr for FragmentType {
    type Err = ProfileError;

    /// Parses a single ion type letter.
    ///
    /// # Example
    ///
    /// ```
    /// use msprofile::data::spectrum::FragmentType;
    ///
    /// assert_eq!("y".parse::<FragmentType>().unwrap(), FragmentType::Y);
    /// assert!("q".parse::<FragmentType>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" => Ok(FragmentType::A),
            "b" => Ok(FragmentType::B),
            "c" => Ok(FragmentType::C),
            "x" => Ok(FragmentType::X),
            "y" => Ok(FragmentType::Y),
            "z" => Ok(FragmentType::Z),
            other => Err(ProfileError::Configuration(format!("unknown ion type '{}'", other))),
        }
    }
}

/// A peptide given either as a modified sequence string or as numeric residue ids.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PeptideSequence {
    /// Sequence with inline modification tokens, e.g. `PEPM(ox)TIDEK` or `PEPTIDES[UNIMOD:21]K`
    Modified(String),
    /// Residue ids of the predictor alphabet, 0 is padding
    ResidueIds(Vec<u8>),
}

impl PeptideSequence {
    /// Neutral monoisotopic mass of the peptide.
    ///
    /// # Example
    ///
    /// ```
    /// use msprofile::data::spectrum::PeptideSequence;
    ///
    /// let by_string = PeptideSequence::Modified("GAK".to_string()).mono_isotopic_mass().unwrap();
    /// let by_ids = PeptideSequence::ResidueIds(vec![6, 1, 9, 0, 0]).mono_isotopic_mass().unwrap();
    /// assert!((by_string - by_ids).abs() < 1e-9);
    /// ```
    pub fn mono_isotopic_mass(&self) -> Result<f64, ProfileError> {
        match self {
            PeptideSequence::Modified(sequence) => calculate_peptide_mono_isotopic_mass(sequence),
            PeptideSequence::ResidueIds(ids) => peptide_mass_from_residue_ids(ids),
        }
    }

    /// Sequence string handed to the spectrum predictor.
    pub fn to_prediction_string(&self) -> Result<String, ProfileError> {
        match self {
            PeptideSequence::Modified(sequence) => Ok(sequence.clone()),
            PeptideSequence::ResidueIds(ids) => residue_ids_to_sequence(ids),
        }
    }
}

impl From<&str> for PeptideSequence {
    fn from(sequence: &str) -> Self {
        PeptideSequence::Modified(sequence.to_string())
    }
}

/// One peptide-spectrum match to encode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpectrumQuery {
    pub sequence: PeptideSequence,
    pub charge: i32,
    pub collision_energy: f64,
}

impl SpectrumQuery {
    pub fn new(sequence: impl Into<PeptideSequence>, charge: i32, collision_energy: f64) -> Self {
        SpectrumQuery {
            sequence: sequence.into(),
            charge,
            collision_energy,
        }
    }
}

/// Predicted fragments of one peptide, one entry per fragment slot.
///
/// Unused slots carry an m/z of zero.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictedSpectrum {
    pub mz: Vec<f64>,
    pub intensity: Vec<f64>,
    pub charge: Vec<i32>,
    pub kind: Vec<FragmentType>,
}

impl PredictedSpectrum {
    pub fn new(mz: Vec<f64>, intensity: Vec<f64>, charge: Vec<i32>, kind: Vec<FragmentType>) -> Self {
        PredictedSpectrum { mz, intensity, charge, kind }
    }

    /// Number of fragment slots.
    pub fn len(&self) -> usize {
        self.mz.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mz.is_empty()
    }

    /// Checks that all per-fragment vectors have the same number of slots.
    pub fn is_aligned(&self) -> bool {
        let n = self.mz.len();
        self.intensity.len() == n && self.charge.len() == n && self.kind.len() == n
    }

    /// Copies of m/z and intensity where every fragment not matching `kind` and `charge` is zeroed.
    ///
    /// # Example
    ///
    /// ```
    /// use msprofile::data::spectrum::{FragmentType, PredictedSpectrum};
    ///
    /// let spectrum = PredictedSpectrum::new(
    ///     vec![100.0, 200.0, 300.0],
    ///     vec![0.5, 1.0, 0.2],
    ///     vec![1, 1, 2],
    ///     vec![FragmentType::B, FragmentType::Y, FragmentType::B],
    /// );
    /// let (mz, intensity) = spectrum.subset(FragmentType::B, 1);
    /// assert_eq!(mz, vec![100.0, 0.0, 0.0]);
    /// assert_eq!(intensity, vec![0.5, 0.0, 0.0]);
    /// ```
    pub fn subset(&self, kind: FragmentType, charge: i32) -> (Vec<f64>, Vec<f64>) {
        self.mz.iter()
            .zip(self.intensity.iter())
            .zip(self.charge.iter().zip(self.kind.iter()))
            .map(|((&mz, &intensity), (&c, &k))| {
                if c == charge && k == kind {
                    (mz, intensity)
                } else {
                    (0.0, 0.0)
                }
            })
            .unzip()
    }
}

/// Output of a spectrum predictor for a batch of queries, one spectrum per query.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictedSpectra {
    pub spectra: Vec<PredictedSpectrum>,
}

impl PredictedSpectra {
    pub fn new(spectra: Vec<PredictedSpectrum>) -> Self {
        PredictedSpectra { spectra }
    }

    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }

    /// Fixed number of fragment slots shared by all spectra, if the batch is shape-aligned.
    pub fn fragment_slots(&self) -> Option<usize> {
        let first = self.spectra.first().map(|s| s.len()).unwrap_or(0);
        self.spectra.iter()
            .all(|s| s.is_aligned() && s.len() == first)
            .then_some(first)
    }
}

/// Represents a mass spectrum with associated m/z values and intensities.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MzSpectrum {
    pub mz: Vec<f64>,
    pub intensity: Vec<f64>,
}

impl MzSpectrum {
    /// Constructs a new `MzSpectrum`.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use msprofile::data::spectrum::MzSpectrum;
    /// let spectrum = MzSpectrum::new(vec![100.0, 200.0], vec![10.0, 20.0]);
    /// assert_eq!(spectrum.mz, vec![100.0, 200.0]);
    /// assert_eq!(spectrum.intensity, vec![10.0, 20.0]);
    /// ```
    pub fn new(mz: Vec<f64>, intensity: Vec<f64>) -> Self {
        MzSpectrum { mz, intensity }
    }
}

/// An observed fragment spectrum together with the m/z of its precursor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentalSpectrum {
    pub spectrum: MzSpectrum,
    pub precursor_mz: Option<f64>,
}

impl ExperimentalSpectrum {
    pub fn new(mz: Vec<f64>, intensity: Vec<f64>, precursor_mz: Option<f64>) -> Self {
        ExperimentalSpectrum {
            spectrum: MzSpectrum::new(mz, intensity),
            precursor_mz,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_type_display_round_trip() {
        for kind in [FragmentType::A, FragmentType::B, FragmentType::C, FragmentType::X, FragmentType::Y, FragmentType::Z] {
            assert_eq!(kind.to_string().parse::<FragmentType>().unwrap(), kind);
        }
        assert!(FragmentType::B.is_n_terminal());
        assert!(!FragmentType::Y.is_n_terminal());
    }

    #[test]
    fn test_fragment_slots_detects_misaligned_batch() {
        let aligned = PredictedSpectrum::new(vec![1.0, 2.0], vec![1.0, 1.0], vec![1, 1], vec![FragmentType::B, FragmentType::Y]);
        let short = PredictedSpectrum::new(vec![1.0], vec![1.0], vec![1], vec![FragmentType::B]);
        let ragged = PredictedSpectrum::new(vec![1.0, 2.0], vec![1.0], vec![1, 1], vec![FragmentType::B, FragmentType::Y]);

        assert_eq!(PredictedSpectra::new(vec![aligned.clone(), aligned.clone()]).fragment_slots(), Some(2));
        assert_eq!(PredictedSpectra::new(vec![aligned.clone(), short]).fragment_slots(), None);
        assert_eq!(PredictedSpectra::new(vec![aligned, ragged]).fragment_slots(), None);
    }

    #[test]
    fn test_residue_ids_to_prediction_string() {
        let sequence = PeptideSequence::ResidueIds(vec![11, 21, 9, 0]);
        assert_eq!(sequence.to_prediction_string().unwrap(), "MM(ox)K");
    }
}

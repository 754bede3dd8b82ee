use std::sync::OnceLock;

use regex::Regex;

use crate::chemistry::amino_acid::{amino_acid_masses, residue_alphabet, OXIDIZED_METHIONINE};
use crate::chemistry::constants::{MASS_PROTON, MASS_WATER};
use crate::chemistry::unimod::unimod_modifications_mass_numerical;
use crate::error::ProfileError;

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\[UNIMOD:(\d+)\]|M\(ox\)|M\(O\)|OxM|[A-Z]").expect("token pattern is a valid regex")
    })
}

/// Splits a modified sequence into residue tokens and UNIMOD ids.
///
/// Oxidized methionine written as `M(ox)`, `M(O)` or `OxM` becomes a single `M(ox)` token.
fn tokenize(sequence: &str) -> Result<Vec<Token>, ProfileError> {
    let mut tokens = Vec::new();
    let mut last_end = 0;

    for captures in token_pattern().captures_iter(sequence) {
        let Some(mat) = captures.get(0) else { continue };
        if mat.start() != last_end {
            return Err(ProfileError::InvalidSequence(format!(
                "unexpected characters '{}' in {}", &sequence[last_end..mat.start()], sequence
            )));
        }
        last_end = mat.end();

        let token = match (captures.get(1), mat.as_str()) {
            (Some(id), _) => {
                let id: u32 = id.as_str().parse()
                    .map_err(|_| ProfileError::InvalidSequence(format!("bad UNIMOD id in {}", sequence)))?;
                Token::Unimod(id)
            }
            (None, "M(ox)") | (None, "M(O)") | (None, "OxM") => Token::Residue(OXIDIZED_METHIONINE.to_string()),
            (None, residue) => Token::Residue(residue.to_string()),
        };
        tokens.push(token);
    }

    if last_end != sequence.len() {
        return Err(ProfileError::InvalidSequence(format!(
            "unexpected characters '{}' in {}", &sequence[last_end..], sequence
        )));
    }
    Ok(tokens)
}

enum Token {
    Residue(String),
    Unimod(u32),
}

/// calculate the neutral monoisotopic mass of a modified peptide sequence
///
/// Arguments:
///
/// * `sequence` - peptide sequence, modifications as `[UNIMOD:ID]` or oxidized methionine tokens
///
/// Returns:
///
/// * `mass` - monoisotopic mass of the peptide including water
///
/// # Examples
///
/// ```
/// use msprofile::algorithm::peptide::calculate_peptide_mono_isotopic_mass;
///
/// let plain = calculate_peptide_mono_isotopic_mass("PEPTMIDEK").unwrap();
/// let oxidized = calculate_peptide_mono_isotopic_mass("PEPTM(ox)IDEK").unwrap();
/// assert!((oxidized - plain - 15.994915).abs() < 1e-4);
/// ```
pub fn calculate_peptide_mono_isotopic_mass(sequence: &str) -> Result<f64, ProfileError> {
    let amino_acid_masses = amino_acid_masses();
    let modifications_mass_numerical = unimod_modifications_mass_numerical();

    let mut mass = MASS_WATER;
    for token in tokenize(sequence)? {
        mass += match token {
            Token::Residue(residue) => *amino_acid_masses.get(residue.as_str()).ok_or_else(|| {
                ProfileError::InvalidSequence(format!("unknown residue '{}' in {}", residue, sequence))
            })?,
            Token::Unimod(id) => *modifications_mass_numerical.get(&id).ok_or_else(|| {
                ProfileError::InvalidSequence(format!("unknown modification UNIMOD:{} in {}", id, sequence))
            })?,
        };
    }
    Ok(mass)
}

/// calculate the neutral monoisotopic mass of a peptide given as residue ids
///
/// Padding ids (0) are ignored, ids outside the alphabet are rejected.
///
/// # Examples
///
/// ```
/// use msprofile::algorithm::peptide::{calculate_peptide_mono_isotopic_mass, peptide_mass_from_residue_ids};
///
/// let mass = peptide_mass_from_residue_ids(&[1, 2, 3, 0, 0]).unwrap();
/// assert!((mass - calculate_peptide_mono_isotopic_mass("ACD").unwrap()).abs() < 1e-9);
/// ```
pub fn peptide_mass_from_residue_ids(ids: &[u8]) -> Result<f64, ProfileError> {
    let amino_acid_masses = amino_acid_masses();
    let alphabet = residue_alphabet();

    ids.iter()
        .filter(|&&id| id != 0)
        .try_fold(MASS_WATER, |mass, &id| {
            alphabet.get(id as usize)
                .and_then(|residue| amino_acid_masses.get(residue))
                .map(|residue_mass| mass + residue_mass)
                .ok_or_else(|| outside_alphabet(id))
        })
}

fn outside_alphabet(id: u8) -> ProfileError {
    ProfileError::InvalidSequence(format!("residue id {} outside of alphabet", id))
}

/// Translates residue ids back to a modified sequence string, dropping padding.
pub fn residue_ids_to_sequence(ids: &[u8]) -> Result<String, ProfileError> {
    let alphabet = residue_alphabet();
    ids.iter()
        .filter(|&&id| id != 0)
        .map(|&id| {
            alphabet.get(id as usize)
                .copied()
                .ok_or_else(|| outside_alphabet(id))
        })
        .collect()
}

/// calculate the neutral peptide mass from a precursor m/z and its charge
///
/// # Examples
///
/// ```
/// use msprofile::algorithm::peptide::{calculate_mz, peptide_mass_from_precursor};
///
/// let mass = peptide_mass_from_precursor(calculate_mz(1000.0, 2), 2);
/// assert!((mass - 1000.0).abs() < 1e-9);
/// ```
pub fn peptide_mass_from_precursor(precursor_mz: f64, charge: i32) -> f64 {
    (precursor_mz - MASS_PROTON) * charge as f64
}

/// calculate the m/z of an ion
///
/// Arguments:
///
/// * `monoisotopic_mass` - monoisotopic mass of the ion
/// * `charge` - charge state of the ion
///
/// Returns:
///
/// * `mz` - mass-over-charge of the ion
///
/// # Examples
///
/// ```
/// use msprofile::algorithm::peptide::calculate_mz;
///
/// let mz = calculate_mz(1000.0, 2);
/// assert_eq!(mz, 501.007276466621);
/// ```
pub fn calculate_mz(monoisotopic_mass: f64, charge: i32) -> f64 {
    (monoisotopic_mass + charge as f64 * MASS_PROTON) / charge as f64
}

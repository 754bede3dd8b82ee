use std::collections::HashMap;

/// Token used for oxidized methionine in residue-id sequences and modified sequence strings
pub const OXIDIZED_METHIONINE: &str = "M(ox)";

/// Amino Acid Residue Masses
///
/// Cysteine is carbamidomethylated, matching the fixed modification the
/// fragment intensity predictors are trained with.
///
/// # Arguments
///
/// None
///
/// # Returns
///
/// * `HashMap<&'static str, f64>` - a map of residue tokens to their monoisotopic masses
///
/// # Example
///
/// ```
/// use msprofile::chemistry::amino_acid::amino_acid_masses;
///
/// let amino_acid_masses = amino_acid_masses();
/// assert_eq!(amino_acid_masses.get("K"), Some(&128.094963));
/// assert_eq!(amino_acid_masses.get("C"), Some(&160.030649));
/// ```
pub fn amino_acid_masses() -> HashMap<&'static str, f64> {
    let mut map = HashMap::new();
    map.insert("A", 71.037114);
    map.insert("R", 156.101111);
    map.insert("N", 114.042927);
    map.insert("D", 115.026943);
    map.insert("C", 160.030649);
    map.insert("E", 129.042593);
    map.insert("Q", 128.058578);
    map.insert("G", 57.021464);
    map.insert("H", 137.058912);
    map.insert("I", 113.084064);
    map.insert("L", 113.084064);
    map.insert("K", 128.094963);
    map.insert("M", 131.040485);
    map.insert("F", 147.068414);
    map.insert("P", 97.052764);
    map.insert("S", 87.032028);
    map.insert("T", 101.047679);
    map.insert("W", 186.079313);
    map.insert("Y", 163.063329);
    map.insert("V", 99.068414);
    map.insert("U", 168.053);
    map.insert(OXIDIZED_METHIONINE, 147.035400);
    map
}

/// Residue alphabet of numeric sequences, index 0 is padding
///
/// # Example
///
/// ```
/// use msprofile::chemistry::amino_acid::residue_alphabet;
///
/// let alphabet = residue_alphabet();
/// assert_eq!(alphabet[1], "A");
/// assert_eq!(alphabet[21], "M(ox)");
/// ```
pub fn residue_alphabet() -> [&'static str; 22] {
    [
        "", "A", "C", "D", "E", "F", "G", "H", "I", "K", "L",
        "M", "N", "P", "Q", "R", "S", "T", "V", "W", "Y", OXIDIZED_METHIONINE,
    ]
}

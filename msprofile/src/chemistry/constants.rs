// Purpose: To store constants that are used for peptide and boundary mass calculations
pub const MASS_PROTON: f64 = 1.007276466621; // Unified atomic mass unit
pub const MASS_WATER: f64 = 18.0105646863; // Unified atomic mass unit

// Rounded offsets used for the synthetic terminal fragments of a binary profile.
// They mark where the smallest and the largest possible b/y fragment would sit,
// they are not meant as exact fragment masses.
pub const B_ION_LEFT_OFFSET: f64 = 1.0;
pub const B_ION_RIGHT_OFFSET: f64 = -17.0;
pub const Y_ION_LEFT_OFFSET: f64 = 19.0;
pub const Y_ION_RIGHT_OFFSET: f64 = 1.0;

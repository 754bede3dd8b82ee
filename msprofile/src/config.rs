use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::algorithm::intensity::{IntensityTransform, LOG_EPSILON, RELATIVE_DIFFERENCE_EPSILON};
use crate::binning::BinGrid;
use crate::data::channel::ChannelLayout;
use crate::data::spectrum::FragmentType;
use crate::error::ProfileError;

/// Configuration of a [`crate::encoder::ProfileEncoder`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileEncoderConfig {
    /// Width of an m/z bin in Da (default: 1.0)
    pub bin_resolution: f64,
    /// Upper m/z bound of the bin grid (default: 2500.0)
    pub max_mz_bin: f64,
    /// Ion types of the channel axis, in channel order (default: y, b)
    pub considered_ion_types: Vec<FragmentType>,
    /// Fragment charges of the channel axis, in channel order (default: 1, 2, 3)
    pub considered_charges: Vec<i32>,
    /// Inject terminal boundary fragments into binary profiles (default: true)
    pub add_leftmost_rightmost: bool,
    /// Append fragment position channels to combined tensors (default: false)
    pub add_fragment_position: bool,
    /// Square root of intensity channels (default: true)
    pub sqrt_transform: bool,
    /// Log-min-max scaling of intensity channels, applied before the square root (default: false)
    pub log_transform: bool,
    /// Added to intensities before the logarithm (default: 0.05)
    pub log_epsilon: f64,
    /// Added to the mean intensity in the relative difference denominator (default: 1e-5)
    pub relative_difference_epsilon: f64,
    /// Worker threads of the encoder pool (default: 4)
    pub num_threads: usize,
}

impl Default for ProfileEncoderConfig {
    fn default() -> Self {
        ProfileEncoderConfig {
            bin_resolution: 1.0,
            max_mz_bin: 2500.0,
            considered_ion_types: vec![FragmentType::Y, FragmentType::B],
            considered_charges: vec![1, 2, 3],
            add_leftmost_rightmost: true,
            add_fragment_position: false,
            sqrt_transform: true,
            log_transform: false,
            log_epsilon: LOG_EPSILON,
            relative_difference_epsilon: RELATIVE_DIFFERENCE_EPSILON,
            num_threads: 4,
        }
    }
}

impl ProfileEncoderConfig {
    /// Parses a JSON document, missing fields take their default.
    ///
    /// # Example
    ///
    /// ```
    /// use msprofile::config::ProfileEncoderConfig;
    /// use msprofile::data::spectrum::FragmentType;
    ///
    /// let config = ProfileEncoderConfig::from_json_str(r#"{"bin_resolution": 0.5, "considered_ion_types": ["b"]}"#).unwrap();
    /// assert_eq!(config.bin_resolution, 0.5);
    /// assert_eq!(config.considered_ion_types, vec![FragmentType::B]);
    /// assert_eq!(config.considered_charges, vec![1, 2, 3]);
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self, ProfileError> {
        let config: ProfileEncoderConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ProfileError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String, ProfileError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks every option eagerly, so encoding never starts on a broken configuration.
    pub fn validate(&self) -> Result<(), ProfileError> {
        self.grid()?;
        self.layout()?;
        if !(self.log_epsilon.is_finite() && self.log_epsilon > 0.0) {
            return Err(ProfileError::Configuration(format!(
                "log epsilon must be positive, got {}", self.log_epsilon
            )));
        }
        if !(self.relative_difference_epsilon.is_finite() && self.relative_difference_epsilon > 0.0) {
            return Err(ProfileError::Configuration(format!(
                "relative difference epsilon must be positive, got {}", self.relative_difference_epsilon
            )));
        }
        if self.num_threads == 0 {
            return Err(ProfileError::Configuration("at least one thread is required".to_string()));
        }
        Ok(())
    }

    pub fn grid(&self) -> Result<BinGrid, ProfileError> {
        BinGrid::new(self.bin_resolution, self.max_mz_bin)
    }

    pub fn layout(&self) -> Result<ChannelLayout, ProfileError> {
        ChannelLayout::new(&self.considered_charges, &self.considered_ion_types)
    }

    pub fn transform(&self) -> IntensityTransform {
        IntensityTransform::new(self.log_transform, self.log_epsilon, self.sqrt_transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        let config = ProfileEncoderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.grid().unwrap().n_bins(), 2500);
        assert_eq!(config.layout().unwrap().len(), 6);
        assert_eq!(config.transform(), IntensityTransform::new(false, 0.05, true));
    }

    #[test]
    fn test_rejects_invalid_options() {
        let broken = [
            ProfileEncoderConfig { bin_resolution: 0.0, ..Default::default() },
            ProfileEncoderConfig { bin_resolution: -1.0, ..Default::default() },
            ProfileEncoderConfig { max_mz_bin: f64::NAN, ..Default::default() },
            ProfileEncoderConfig { considered_charges: vec![], ..Default::default() },
            ProfileEncoderConfig { considered_charges: vec![0, 1], ..Default::default() },
            ProfileEncoderConfig { considered_ion_types: vec![], ..Default::default() },
            ProfileEncoderConfig { log_epsilon: 0.0, ..Default::default() },
            ProfileEncoderConfig { num_threads: 0, ..Default::default() },
        ];
        for config in broken.iter() {
            assert!(matches!(config.validate(), Err(ProfileError::Configuration(_))), "{:?}", config);
        }
    }

    #[test]
    fn test_json_round_trip_through_file() {
        let config = ProfileEncoderConfig {
            considered_ion_types: vec![FragmentType::B],
            considered_charges: vec![2],
            log_transform: true,
            ..Default::default()
        };
        let path = std::env::temp_dir().join(format!("msprofile-config-{}.json", std::process::id()));
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(config.to_json_string().unwrap().as_bytes()).unwrap();

        let loaded = ProfileEncoderConfig::from_json_file(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_json_errors() {
        assert!(matches!(ProfileEncoderConfig::from_json_str("{"), Err(ProfileError::ConfigParse(_))));
        assert!(matches!(
            ProfileEncoderConfig::from_json_str(r#"{"considered_ion_types": ["q"]}"#),
            Err(ProfileError::ConfigParse(_))
        ));
        assert!(matches!(
            ProfileEncoderConfig::from_json_str(r#"{"max_mz_bin": -3.0}"#),
            Err(ProfileError::Configuration(_))
        ));
        assert!(matches!(ProfileEncoderConfig::from_json_file("/nonexistent/msprofile.json"), Err(ProfileError::ConfigIo(_))));
    }
}

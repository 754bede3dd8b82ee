// chemistry module
pub mod chemistry {
    pub mod constants;
    pub mod amino_acid;
    pub mod unimod;
}

// algorithm module
pub mod algorithm {
    pub mod peptide;
    pub mod profile;
    pub mod intensity;
}

// data module
pub mod data {
    pub mod spectrum;
    pub mod channel;
    pub mod tensor;
}

pub mod binning;
pub mod config;
pub mod encoder;
pub mod error;
pub mod predictor;

pub use binning::{BinAssignment, BinGrid, Binner, BinningOptions, UniformBinner};
pub use config::ProfileEncoderConfig;
pub use data::channel::{Channel, ChannelLayout};
pub use data::spectrum::{
    ExperimentalSpectrum, FragmentType, MzSpectrum, PeptideSequence, PredictedSpectra, PredictedSpectrum,
    SpectrumQuery,
};
pub use data::tensor::{EncodedBatch, SparseSlice, Tensor3};
pub use encoder::{CombineOptions, ProfileEncoder};
pub use error::ProfileError;
pub use predictor::{CachedPredictor, PredictionError, PredictionRequest, SpectrumPredictor};

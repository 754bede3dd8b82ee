use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::data::spectrum::{PredictedSpectra, PredictedSpectrum};

/// Errors reported by a spectrum predictor back-end.
#[derive(Debug, Clone, Error)]
pub enum PredictionError {
    #[error("Prediction service failed: {0}")]
    Service(String),
    #[error("Prediction returned {found} spectra for {expected} queries")]
    SpectrumCount { expected: usize, found: usize },
    #[error("Prediction returned fragment arrays that are not shape-aligned")]
    Misaligned,
    #[error("Invalid prediction request: {0}")]
    Request(String),
}

/// Batch request sent to a spectrum predictor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub sequences: Vec<String>,
    pub charges: Vec<i32>,
    pub collision_energies: Vec<f64>,
}

impl PredictionRequest {
    pub fn new(
        sequences: Vec<String>,
        charges: Vec<i32>,
        collision_energies: Vec<f64>,
    ) -> Result<Self, PredictionError> {
        if sequences.len() != charges.len() || sequences.len() != collision_energies.len() {
            return Err(PredictionError::Request(format!(
                "{} sequences, {} charges and {} collision energies",
                sequences.len(), charges.len(), collision_energies.len()
            )));
        }
        Ok(PredictionRequest { sequences, charges, collision_energies })
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
}

/// Fragment intensity prediction back-end.
///
/// Implementations return one spectrum per request entry, in request order, with the same
/// number of fragment slots for every spectrum.
pub trait SpectrumPredictor: Send + Sync {
    fn predict(&self, request: &PredictionRequest) -> Result<PredictedSpectra, PredictionError>;
}

impl<P: SpectrumPredictor + ?Sized> SpectrumPredictor for Box<P> {
    fn predict(&self, request: &PredictionRequest) -> Result<PredictedSpectra, PredictionError> {
        (**self).predict(request)
    }
}

impl<P: SpectrumPredictor + ?Sized> SpectrumPredictor for &P {
    fn predict(&self, request: &PredictionRequest) -> Result<PredictedSpectra, PredictionError> {
        (**self).predict(request)
    }
}

type CacheKey = (String, i32, u64);

/// Memoizes predictions per (sequence, charge, collision energy).
///
/// Only entries missing from the cache are forwarded to the wrapped predictor, the result is
/// stitched back together in request order. Batches that are not shape-aligned are rejected
/// and never cached. The cache is unbounded, call [`CachedPredictor::clear`] to release it.
pub struct CachedPredictor<P> {
    inner: P,
    cache: Mutex<HashMap<CacheKey, PredictedSpectrum>>,
}

impl<P: SpectrumPredictor> CachedPredictor<P> {
    pub fn new(inner: P) -> Self {
        CachedPredictor {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Number of cached spectra.
    pub fn len(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    pub fn into_inner(self) -> P {
        self.inner
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<CacheKey, PredictedSpectrum>>, PredictionError> {
        self.cache.lock().map_err(|_| PredictionError::Service("prediction cache poisoned".to_string()))
    }

    fn key(request: &PredictionRequest, i: usize) -> CacheKey {
        (request.sequences[i].clone(), request.charges[i], request.collision_energies[i].to_bits())
    }
}

impl<P: SpectrumPredictor> SpectrumPredictor for CachedPredictor<P> {
    fn predict(&self, request: &PredictionRequest) -> Result<PredictedSpectra, PredictionError> {
        let keys: Vec<CacheKey> = (0..request.len()).map(|i| Self::key(request, i)).collect();

        let missing: Vec<usize> = {
            let cache = self.lock()?;
            let mut seen = std::collections::HashSet::new();
            (0..keys.len())
                .filter(|&i| !cache.contains_key(&keys[i]) && seen.insert(&keys[i]))
                .collect()
        };
        debug!(requested = request.len(), missing = missing.len(), "prediction cache lookup");

        if !missing.is_empty() {
            let miss_request = PredictionRequest {
                sequences: missing.iter().map(|&i| request.sequences[i].clone()).collect(),
                charges: missing.iter().map(|&i| request.charges[i]).collect(),
                collision_energies: missing.iter().map(|&i| request.collision_energies[i]).collect(),
            };
            let predicted = self.inner.predict(&miss_request)?;
            if predicted.len() != missing.len() {
                let (expected, found) = (missing.len(), predicted.len());
                return Err(PredictionError::SpectrumCount { expected, found });
            }
            if predicted.fragment_slots().is_none() {
                return Err(PredictionError::Misaligned);
            }

            let mut cache = self.lock()?;
            for (&i, spectrum) in missing.iter().zip(predicted.spectra) {
                cache.insert(keys[i].clone(), spectrum);
            }
        }

        let cache = self.lock()?;
        keys.iter()
            .map(|key| {
                cache.get(key)
                    .cloned()
                    .ok_or_else(|| PredictionError::Service("prediction missing from cache".to_string()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(PredictedSpectra::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::spectrum::FragmentType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingPredictor {
        calls: AtomicUsize,
        predicted: AtomicUsize,
    }

    impl SpectrumPredictor for CountingPredictor {
        fn predict(&self, request: &PredictionRequest) -> Result<PredictedSpectra, PredictionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.predicted.fetch_add(request.len(), Ordering::SeqCst);
            Ok(PredictedSpectra::new(
                request.sequences.iter().zip(request.charges.iter())
                    .map(|(sequence, &charge)| PredictedSpectrum::new(
                        vec![sequence.len() as f64 * 100.0],
                        vec![1.0],
                        vec![charge],
                        vec![FragmentType::Y],
                    ))
                    .collect(),
            ))
        }
    }

    fn request(sequences: &[&str], charges: &[i32]) -> PredictionRequest {
        PredictionRequest::new(
            sequences.iter().map(|s| s.to_string()).collect(),
            charges.to_vec(),
            vec![30.0; sequences.len()],
        ).unwrap()
    }

    #[test]
    fn test_cached_predictor_forwards_only_misses() {
        let predictor = CachedPredictor::new(CountingPredictor {
            calls: AtomicUsize::new(0),
            predicted: AtomicUsize::new(0),
        });

        let first = predictor.predict(&request(&["PEPTIDE", "PEPK", "PEPTIDE"], &[2, 2, 2])).unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(first.spectra[0], first.spectra[2]);
        assert_eq!(predictor.len(), 2);

        let second = predictor.predict(&request(&["PEPK", "AAAK", "PEPTIDE"], &[2, 3, 2])).unwrap();
        assert_eq!(second.spectra[0], first.spectra[1]);
        assert_eq!(second.spectra[1].charge, vec![3]);
        assert_eq!(second.spectra[2], first.spectra[0]);

        let inner = predictor.into_inner();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(inner.predicted.load(Ordering::SeqCst), 3);
    }

    /// Returns a ragged spectrum for `BROKENK` and a single y+ fragment otherwise.
    struct RaggedPredictor;

    impl SpectrumPredictor for RaggedPredictor {
        fn predict(&self, request: &PredictionRequest) -> Result<PredictedSpectra, PredictionError> {
            Ok(PredictedSpectra::new(
                request.sequences.iter()
                    .map(|sequence| {
                        let intensity = if sequence == "BROKENK" { vec![] } else { vec![1.0] };
                        PredictedSpectrum::new(vec![300.0], intensity, vec![1], vec![FragmentType::Y])
                    })
                    .collect(),
            ))
        }
    }

    #[test]
    fn test_misaligned_predictions_are_not_cached() {
        let predictor = CachedPredictor::new(RaggedPredictor);

        let result = predictor.predict(&request(&["PEPK", "BROKENK"], &[2, 2]));
        assert!(matches!(result, Err(PredictionError::Misaligned)));
        assert!(predictor.is_empty());

        let clean = predictor.predict(&request(&["PEPK"], &[2])).unwrap();
        assert_eq!(clean.len(), 1);
        assert_eq!(predictor.len(), 1);
    }

    #[test]
    fn test_request_rejects_ragged_input() {
        assert!(PredictionRequest::new(vec!["PEPK".to_string()], vec![2, 3], vec![30.0]).is_err());
    }
}

//! Construction settings.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{PmfgError, Result};

/// Multiple of the edge budget kept when the exhaustive candidate set is
/// replaced by the bounded top-K variant.
pub const DEFAULT_TOP_K_MULTIPLE: usize = 10;

/// How the candidate edge set is materialised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CandidatePolicy {
    /// Every admissible unordered pair, `O(n^2)` memory
    Exhaustive,

    /// Only the best `multiple * (3n - 6)` pairs, `O(K)` memory.
    /// Approximate: pairs outside the top K are never considered.
    TopK { multiple: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PmfgConfig {
    /// Largest accepted `|w[i][j] - w[j][i]|`
    pub symmetry_tolerance: f64,

    /// Average the input matrix with its transpose before validation
    pub symmetrize: bool,

    /// Candidates strictly below this weight are out of domain
    pub min_weight: Option<f64>,

    pub candidates: CandidatePolicy,

    /// Memory guard on the exhaustive candidate count
    pub max_candidates: Option<usize>,

    /// Switch to top-K instead of failing when `max_candidates` is exceeded
    pub fallback_to_top_k: bool,

    /// Worker threads for candidate preprocessing (rayon default if unset)
    pub threads: Option<usize>,

    /// Candidates scanned between progress log lines
    pub progress_interval: usize,
}

impl Default for PmfgConfig {
    fn default() -> Self {
        Self {
            symmetry_tolerance: 1e-9,
            symmetrize: false,
            min_weight: None,
            candidates: CandidatePolicy::Exhaustive,
            max_candidates: None,
            fallback_to_top_k: false,
            threads: None,
            progress_interval: 10_000,
        }
    }
}

impl PmfgConfig {
    /// Config for very large matrices: bounded candidate memory from the start
    pub fn large_input() -> Self {
        Self {
            candidates: CandidatePolicy::TopK {
                multiple: DEFAULT_TOP_K_MULTIPLE,
            },
            progress_interval: 100_000,
            ..Self::default()
        }
    }

    pub fn with_min_weight(mut self, min_weight: f64) -> Self {
        self.min_weight = Some(min_weight);
        self
    }

    pub fn with_candidates(mut self, candidates: CandidatePolicy) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn with_max_candidates(mut self, limit: usize, fallback_to_top_k: bool) -> Self {
        self.max_candidates = Some(limit);
        self.fallback_to_top_k = fallback_to_top_k;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Load a JSON config file; missing fields take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.symmetry_tolerance.is_finite() || self.symmetry_tolerance < 0.0 {
            return Err(PmfgError::invalid_config(format!(
                "symmetry_tolerance must be finite and non-negative, got {}",
                self.symmetry_tolerance
            )));
        }
        if let Some(min) = self.min_weight {
            if min.is_nan() {
                return Err(PmfgError::invalid_config("min_weight must not be NaN"));
            }
        }
        if let CandidatePolicy::TopK { multiple } = self.candidates {
            if multiple == 0 {
                return Err(PmfgError::invalid_config("top-K multiple must be at least 1"));
            }
        }
        if self.threads == Some(0) {
            return Err(PmfgError::invalid_config("threads must be at least 1"));
        }
        if self.progress_interval == 0 {
            return Err(PmfgError::invalid_config("progress_interval must be at least 1"));
        }
        Ok(())
    }
}

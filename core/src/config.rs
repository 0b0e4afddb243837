use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

pub const DEFAULT_MAX_AUX_TERMS: usize = 80_000;
pub const DEFAULT_STEM_CACHE_CAPACITY: usize = 100_000;

/// Tunables for the index manager.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IrConfig {
    /// Auxiliary segment term count above which `add_documents` compacts.
    pub max_aux_terms: usize,
    pub stem_cache_capacity: usize,
    /// Tokenize documents on the rayon pool during bulk builds.
    pub parallel_build: bool,
    pub progress_every: usize,
}

impl Default for IrConfig {
    fn default() -> Self {
        Self {
            max_aux_terms: DEFAULT_MAX_AUX_TERMS,
            stem_cache_capacity: DEFAULT_STEM_CACHE_CAPACITY,
            parallel_build: true,
            progress_every: 10_000,
        }
    }
}

impl IrConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Applies `IR_MAX_AUX_TERMS` and `IR_STEM_CACHE_CAPACITY` when set and numeric.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_usize("IR_MAX_AUX_TERMS") {
            self.max_aux_terms = v;
        }
        if let Some(v) = env_usize("IR_STEM_CACHE_CAPACITY") {
            self.stem_cache_capacity = v;
        }
        self
    }

    pub fn with_max_aux_terms(mut self, max_aux_terms: usize) -> Self {
        self.max_aux_terms = max_aux_terms;
        self
    }
}

fn env_usize(key: &str) -> Option<usize> {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(key, value = %raw, "ignoring non-numeric override");
                None
            }
        },
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{ "max_aux_terms": 12 }}"#).unwrap();
        let cfg = IrConfig::from_file(f.path()).unwrap();
        assert_eq!(cfg.max_aux_terms, 12);
        assert_eq!(cfg.stem_cache_capacity, DEFAULT_STEM_CACHE_CAPACITY);
        assert!(cfg.parallel_build);
    }
}

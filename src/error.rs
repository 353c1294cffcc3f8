//! Error types.

use thiserror::Error;

/// Errors reported by the population store, the operators and the
/// tournament engine.
#[derive(Debug, Error)]
pub enum EvoError {
    /// A checkout found no resident individual to hand out.
    #[error("population pool exhausted: {resident} individual(s) resident")]
    PoolExhausted { resident: usize },

    /// Fixed-length crossover was given parents of different lengths.
    #[error("GA crossover requires equal-length parents, got {left} and {right}")]
    LengthMismatch { left: usize, right: usize },

    /// The configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A return or discard arrived with no checkout outstanding.
    #[error("no checked-out individual to settle")]
    NotCheckedOut,

    /// A snapshot holds a fitness JSON cannot represent.
    #[error("non-finite fitness {0} cannot be exported")]
    NonFiniteFitness(f64),

    /// The store loop is no longer running.
    #[error("population store is closed")]
    StoreClosed,

    /// A worker pool could not be built.
    #[error("thread pool: {0}")]
    ThreadPool(String),

    /// IO error while persisting a snapshot.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot serialization failed.
    #[cfg(feature = "serde")]
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, EvoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let e = EvoError::PoolExhausted { resident: 0 };
        assert_eq!(
            e.to_string(),
            "population pool exhausted: 0 individual(s) resident"
        );

        let e = EvoError::LengthMismatch { left: 3, right: 5 };
        assert!(e.to_string().contains("3 and 5"));

        let e = EvoError::InvalidConfig("gene_length must be at least 2".into());
        assert!(e.to_string().starts_with("invalid configuration"));

        let e = EvoError::NonFiniteFitness(f64::INFINITY);
        assert_eq!(e.to_string(), "non-finite fitness inf cannot be exported");
    }
}

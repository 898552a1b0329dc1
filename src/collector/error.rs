//! Collection error surface.
//!
//! Every failure in the pipeline — discovery, emission, synchronization,
//! assembly — is normalized to a [`CollectError`] and delivered through the
//! same result callback used for success. No variant is recovered or
//! retried; each one is terminal for the collector that produced it.

use thiserror::Error;

/// Errors produced by a collector.
#[derive(Debug, Clone, Error)]
pub enum CollectError {
    /// Target shape is unusable: no fields, a duplicated field name, or no
    /// runtime to schedule the background task on. Detected at collector
    /// construction, before any value is accepted.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An emitted value does not match the field's declared type
    /// (strict mode only).
    #[error("type mismatch on field '{field}': expected {expected}, got {actual}")]
    TypeMismatch {
        /// Field named by the emission.
        field: String,
        /// Declared type of the field.
        expected: &'static str,
        /// Runtime type of the emitted value.
        actual: &'static str,
    },

    /// An emission named a field the target shape does not declare.
    #[error("unknown field '{field}'")]
    UnknownField {
        /// Field named by the emission.
        field: String,
    },

    /// A synchronized value set could not be turned into a target
    /// instance: a constructor slot had no matching entry, or the entry
    /// did not downcast to the declared type.
    #[error("construction failed: field '{field}' missing or not a {expected}")]
    Construction {
        /// Constructor slot that could not be filled.
        field: String,
        /// Declared type of the slot.
        expected: &'static str,
    },

    /// Any other failure inside the background pipeline.
    #[error("execution error: {0}")]
    Execution(String),

    /// The collector is already cancelled; the emission was dropped.
    #[error("collector cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_field() {
        let err = CollectError::TypeMismatch {
            field: "age".to_string(),
            expected: "u32",
            actual: "alloc::string::String",
        };
        let rendered = err.to_string();
        assert!(rendered.contains("age"));
        assert!(rendered.contains("u32"));

        let err = CollectError::Construction {
            field: "name".to_string(),
            expected: "alloc::string::String",
        };
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn test_errors_are_cloneable_for_dual_reporting() {
        let err = CollectError::UnknownField {
            field: "ghost".to_string(),
        };
        assert_eq!(err.to_string(), err.clone().to_string());
    }
}

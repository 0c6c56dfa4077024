//! zkweave runtime
//!
//! Boundary types shared between the zkweave compiler core and the external
//! contract, circuit and orchestration generators that consume its output.

pub mod error;
pub mod types;

pub use error::{Result, ZkWeaveError};
pub use types::{BoilerplateKind, CompilerConfig, StateClassification};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boilerplate_kind_debug_trait() {
        let debug_str = format!("{:?}", BoilerplateKind::Nullification);
        assert!(debug_str.contains("Nullification"));
    }

    #[test]
    fn test_classification_equality() {
        assert_eq!(StateClassification::Whole, StateClassification::Whole);
        assert_ne!(StateClassification::Whole, StateClassification::Partitioned);
    }

    #[test]
    fn test_config_equality() {
        let config1 = CompilerConfig::default();
        let mut config2 = CompilerConfig::default();
        assert_eq!(config1, config2);

        config2.add_param("curve".to_string(), "bn254".to_string());
        assert_ne!(config1, config2);
    }
}

//! PMFM rule engine
//!
//! Rules decide which PMFMs are legal at a given position of the batch tree. Rule sets are
//! cached per path prefix and rebuilt whenever the referential configuration changes.
//!
//! # Key Components
//!
//! - **types**: `Rule` and its operators
//! - **evaluator**: `RuleEvaluator` trait and the dotted-path `AttributeRuleEvaluator`
//! - **cache**: `RuleCache` of shared rule slices
//! - **config**: `ReferentialConfig` snapshots and the `ConfigBus` publishing them
//! - **batch_rules**: landing/discard exclusion rule sets

pub mod batch_rules;

pub mod cache;

pub mod config;

pub mod error;

pub mod evaluator;

pub mod types;

// Re-exports
pub use batch_rules::BatchRules;
pub use cache::RuleCache;
pub use config::{ConfigBus, ReferentialConfig, Subscription};
pub use error::{Result, RuleError};
pub use evaluator::{AttributeRuleEvaluator, RuleErrors, RuleEvaluator};
pub use types::{inverse_operator, Rule, RuleFilter, RuleOperator};

//! Product page parser
//!
//! Scores the nodes of a product page against weighted feature rules and picks
//! the best candidate for each target type:
//! - Title and price text
//! - Main product image
//! - OpenGraph meta tags as a fallback
//!
//! Rulesets are built from coefficient vectors, so a trainer can tune them
//! without touching the rules themselves. A C ABI in [`ffi`] exposes the
//! extraction to non-Rust hosts.

pub mod dom;
pub mod error;
pub mod extractors;
pub mod ffi;
pub mod rules;
pub mod ruleset;
pub mod trainees;

pub use dom::{DomNode, LayoutHint, PageSnapshot, Rect, Viewport};
pub use error::{ConfigurationError, ExtractError};
pub use extractors::*;
pub use ffi::*;
pub use rules::{FeatureRule, RuleId, TargetType, TOPOLOGY};
pub use ruleset::{make_ruleset, Coefficient, CoefficientVector, Ranking, Ruleset, ScoredCandidate};
pub use trainees::{Trainee, TraineeRegistry};

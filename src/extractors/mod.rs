//! Product extraction
//!
//! Each requested target type gets its own ruleset; the winning node of each
//! ranking is read for the value a host displays.

mod opengraph_extractor;
mod product_extractor;

pub use opengraph_extractor::*;
pub use product_extractor::*;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dom::{LayoutHint, NodeId, Viewport};
use crate::rules::TargetType;
use crate::ruleset::{CoefficientVector, ScoredCandidate};

/// Request from the host
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionRequest {
    /// Target types to extract
    pub targets: Vec<TargetType>,
    /// Full-length coefficient vectors per target; `null` entries are
    /// don't-care. Targets left out use the shipped coefficients.
    pub coefficients: BTreeMap<TargetType, CoefficientVector>,
    /// Viewport the page was rendered in
    pub viewport: Viewport,
    /// Host-measured geometry, applied by CSS selector
    pub layout: Vec<LayoutHint>,
    /// Page URL, for resolving relative image sources
    pub base_url: Option<String>,
    /// Fall back to OpenGraph/product meta tags when a ruleset finds nothing
    pub opengraph_fallback: bool,
    /// Also return every ranked candidate
    pub include_rankings: bool,
}

impl Default for ExtractionRequest {
    fn default() -> Self {
        Self {
            targets: TargetType::ALL.to_vec(),
            coefficients: BTreeMap::new(),
            viewport: Viewport::default(),
            layout: Vec::new(),
            base_url: None,
            opengraph_fallback: true,
            include_rankings: false,
        }
    }
}

/// Where an extracted value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldSource {
    Ruleset,
    OpenGraph,
}

/// Single extracted value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedField {
    pub value: String,
    pub source: FieldSource,
    /// Ruleset score of the winning node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeId>,
}

/// What was found for one product page. Missing fields are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedProduct {
    pub title: Option<ExtractedField>,
    pub price: Option<ExtractedField>,
    /// Numeric reading of `price`
    pub price_amount: Option<f64>,
    pub image: Option<ExtractedField>,
}

impl ExtractedProduct {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.price.is_none() && self.image.is_none()
    }
}

/// Result returned to the host
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionResult {
    pub product: ExtractedProduct,
    /// Ranked candidates per target (only when requested)
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub rankings: BTreeMap<TargetType, Vec<ScoredCandidate>>,
}

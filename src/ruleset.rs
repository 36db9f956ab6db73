//! Ruleset construction and evaluation
//!
//! [`make_ruleset`] binds every slot of the shared rule topology to one
//! coefficient and keeps the rules that feed the requested target type. The
//! resulting [`Ruleset`] is immutable and can score any number of pages.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::dom::{DomNode, NodeId, PageSnapshot};
use crate::error::ConfigurationError;
use crate::rules::{FeatureRule, RuleId, TargetType, SLOT_COUNT, TOPOLOGY};

/// Live slots for images, in trainee coefficient order.
const IMAGE_SLOTS: &[RuleId] = &[
    RuleId::IsAboveTheFoldImage,
    RuleId::LargerImage,
    RuleId::HasImageSource,
    RuleId::HasProductImageAttribute,
];

/// Live slots shared by titles and prices, in trainee coefficient order.
const TEXT_SLOTS: &[RuleId] = &[
    RuleId::LargerFontSize,
    RuleId::HasCurrencySymbol,
    RuleId::HasPriceInId,
    RuleId::HasPriceInClassName,
    RuleId::IsAboveTheFold,
    RuleId::HasPriceInParent,
    RuleId::IsNearbyImageXAxis,
    RuleId::IsNearbyImageYAxis,
    RuleId::TextLength,
    RuleId::IsTitleLike,
];

/// Trained weights for [`IMAGE_SLOTS`].
pub const IMAGE_COEFFICIENTS: [f64; 4] = [5.0, 9.0, 3.0, 4.0];

/// Trained weights for [`TEXT_SLOTS`].
pub const TEXT_COEFFICIENTS: [f64; 10] = [2.0, 7.0, 2.0, 5.0, 4.0, 3.0, 1.0, 4.0, 1.0, 10.0];

/// Weight bound to one rule slot.
///
/// `DontCare` forces the rule's contribution to zero whatever it scores. It is
/// written as `null` in JSON, and NaN (or any non-finite number) converts to
/// it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub enum Coefficient {
    Weight(f64),
    DontCare,
}

impl Coefficient {
    /// Weighted contribution of a raw score. Non-finite raw scores count as 0.
    pub fn apply(self, raw: f64) -> f64 {
        match self {
            Coefficient::Weight(weight) if raw.is_finite() => raw * weight,
            _ => 0.0,
        }
    }

    pub fn is_dont_care(&self) -> bool {
        matches!(self, Coefficient::DontCare)
    }
}

impl From<f64> for Coefficient {
    fn from(value: f64) -> Self {
        if value.is_finite() {
            Coefficient::Weight(value)
        } else {
            Coefficient::DontCare
        }
    }
}

impl From<Option<f64>> for Coefficient {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Coefficient::DontCare, Coefficient::from)
    }
}

impl From<Coefficient> for Option<f64> {
    fn from(value: Coefficient) -> Self {
        match value {
            Coefficient::Weight(weight) => Some(weight),
            Coefficient::DontCare => None,
        }
    }
}

/// Coefficients bound positionally to rule slots.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoefficientVector(Vec<Coefficient>);

impl CoefficientVector {
    pub fn new(coefficients: Vec<Coefficient>) -> Self {
        Self(coefficients)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Coefficient] {
        &self.0
    }

    pub fn get(&self, rule: RuleId) -> Option<Coefficient> {
        self.0.get(rule.slot()).copied()
    }

    /// Copy with one slot replaced. Out-of-range slots leave it unchanged.
    pub fn with(mut self, rule: RuleId, coefficient: Coefficient) -> Self {
        if let Some(slot) = self.0.get_mut(rule.slot()) {
            *slot = coefficient;
        }
        self
    }
}

impl From<Vec<f64>> for CoefficientVector {
    fn from(values: Vec<f64>) -> Self {
        values.into_iter().collect()
    }
}

impl From<&[f64]> for CoefficientVector {
    fn from(values: &[f64]) -> Self {
        values.iter().copied().collect()
    }
}

impl FromIterator<f64> for CoefficientVector {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        Self(iter.into_iter().map(Coefficient::from).collect())
    }
}

impl FromIterator<Coefficient> for CoefficientVector {
    fn from_iter<I: IntoIterator<Item = Coefficient>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Slots a target type actually trains, in trainee coefficient order.
pub fn live_slots(target: TargetType) -> &'static [RuleId] {
    match target {
        TargetType::Image => IMAGE_SLOTS,
        TargetType::Title | TargetType::Price => TEXT_SLOTS,
    }
}

/// Full-length vector with `live` values in the target's live slots and
/// `DontCare` everywhere else. Missing trailing live values are `DontCare`;
/// extra values are dropped.
pub fn expand_live(target: TargetType, live: &[f64]) -> CoefficientVector {
    let mut coefficients = vec![Coefficient::DontCare; SLOT_COUNT];
    for (rule, value) in live_slots(target).iter().zip(live) {
        coefficients[rule.slot()] = Coefficient::from(*value);
    }
    CoefficientVector(coefficients)
}

/// Shipped coefficients for a target type.
pub fn default_coefficients(target: TargetType) -> CoefficientVector {
    match target {
        TargetType::Image => expand_live(target, &IMAGE_COEFFICIENTS),
        TargetType::Title | TargetType::Price => expand_live(target, &TEXT_COEFFICIENTS),
    }
}

/// Build the ruleset for `target`, binding `coefficients` to the topology.
///
/// The vector is taken whole or not at all: a length other than
/// [`SLOT_COUNT`] is a [`ConfigurationError`].
pub fn make_ruleset(
    target: TargetType,
    coefficients: &CoefficientVector,
) -> Result<Ruleset, ConfigurationError> {
    if coefficients.len() != SLOT_COUNT {
        return Err(ConfigurationError::CoefficientCount {
            target,
            expected: SLOT_COUNT,
            actual: coefficients.len(),
        });
    }

    let rules = TOPOLOGY
        .iter()
        .zip(coefficients.as_slice())
        .filter(|(rule, _)| rule.feeds().contains(&target))
        .map(|(rule, coefficient)| BoundRule {
            rule: *rule,
            coefficient: *coefficient,
        })
        .collect();

    Ok(Ruleset { target, rules })
}

#[derive(Clone, Copy)]
struct BoundRule {
    rule: &'static dyn FeatureRule,
    coefficient: Coefficient,
}

/// One rule's share of a node's score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Contribution {
    pub rule: RuleId,
    pub raw: f64,
    pub coefficient: Coefficient,
    pub weighted: f64,
}

/// A node judged eligible for a target type, with its summed score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub node: NodeId,
    pub target: TargetType,
    pub score: f64,
}

/// Candidates for one target type, best first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranking {
    pub target: TargetType,
    candidates: Vec<ScoredCandidate>,
}

impl Ranking {
    /// Highest-scoring candidate; `None` when the page has no candidate.
    pub fn best(&self) -> Option<&ScoredCandidate> {
        self.candidates.first()
    }

    pub fn candidates(&self) -> &[ScoredCandidate] {
        &self.candidates
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn into_candidates(self) -> Vec<ScoredCandidate> {
        self.candidates
    }
}

/// Compiled scoring graph for one target type.
#[derive(Clone)]
pub struct Ruleset {
    target: TargetType,
    rules: Vec<BoundRule>,
}

impl Ruleset {
    pub fn target(&self) -> TargetType {
        self.target
    }

    /// Rules feeding this ruleset's type, with their bound coefficients.
    pub fn bindings(&self) -> impl Iterator<Item = (RuleId, Coefficient)> + '_ {
        self.rules.iter().map(|b| (b.rule.id(), b.coefficient))
    }

    /// Per-rule breakdown for every rule that applies to `node`.
    pub fn contributions(&self, node: DomNode<'_>) -> Vec<Contribution> {
        self.rules
            .iter()
            .filter(|bound| bound.rule.applies(node, self.target))
            .map(|bound| {
                let raw = bound.rule.score(node);
                Contribution {
                    rule: bound.rule.id(),
                    raw,
                    coefficient: bound.coefficient,
                    weighted: bound.coefficient.apply(raw),
                }
            })
            .collect()
    }

    /// Summed score of `node`, or `None` when no rule applies to it.
    pub fn score(&self, node: DomNode<'_>) -> Option<f64> {
        let mut applicable = false;
        let mut total = 0.0;
        for bound in &self.rules {
            if !bound.rule.applies(node, self.target) {
                continue;
            }
            applicable = true;
            total += bound.coefficient.apply(bound.rule.score(node));
        }
        applicable.then_some(total)
    }

    /// Score every candidate on the page and rank them, best first.
    ///
    /// Equal scores keep document order.
    pub fn evaluate(&self, page: &PageSnapshot) -> Ranking {
        let mut candidates: Vec<ScoredCandidate> = page
            .nodes()
            .filter_map(|node| {
                let score = self.score(node)?;
                trace!(target_type = %self.target, node = node.id(), tag = node.tag(), score, "Candidate scored");
                Some(ScoredCandidate {
                    node: node.id(),
                    target: self.target,
                    score,
                })
            })
            .collect();

        // Stable, so ties stay in document order.
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

        debug!(
            target_type = %self.target,
            nodes = page.len(),
            candidates = candidates.len(),
            best = ?candidates.first().map(|c| c.score),
            "Ruleset evaluated"
        );

        Ranking {
            target: self.target,
            candidates,
        }
    }

    /// Highest-ranked candidate, or `None` when the page has none.
    pub fn best(&self, page: &PageSnapshot) -> Option<ScoredCandidate> {
        self.evaluate(page).best().copied()
    }
}

impl std::fmt::Debug for Ruleset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ruleset")
            .field("target", &self.target)
            .field("rules", &self.bindings().collect::<Vec<_>>())
            .finish()
    }
}

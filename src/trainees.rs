//! Rulesets to train
//!
//! A registry of target names to the coefficients a trainer starts from, the
//! viewport its training snapshots are rendered at, and a maker that turns a
//! trainer's live coefficients into a full [`Ruleset`]. Extraction never
//! consults the registry; it is handed already-chosen coefficients.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use crate::dom::Viewport;
use crate::error::ConfigurationError;
use crate::rules::TargetType;
use crate::ruleset::{expand_live, live_slots, make_ruleset, Ruleset, IMAGE_COEFFICIENTS, TEXT_COEFFICIENTS};

/// Viewport training snapshots are taken at.
pub const TRAINING_VIEWPORT: Viewport = Viewport {
    width: 1680.0,
    height: 950.0,
};

/// One trainable ruleset.
#[derive(Debug, Clone, Serialize)]
pub struct Trainee {
    pub name: String,
    pub target: TargetType,
    /// Seed values for the target's live slots.
    pub coeffs: Vec<f64>,
    pub viewport_size: Viewport,
}

impl Trainee {
    pub fn new(target: TargetType, coeffs: Vec<f64>) -> Self {
        Self {
            name: target.to_string(),
            target,
            coeffs,
            viewport_size: TRAINING_VIEWPORT,
        }
    }

    /// Names of the live slots, in the order `coeffs` binds to them.
    pub fn slot_names(&self) -> Vec<String> {
        live_slots(self.target)
            .iter()
            .map(|rule| rule.as_str().to_string())
            .collect()
    }

    /// Ruleset using `coeffs` in place of the seed.
    ///
    /// The live values are always expanded to a full-length vector, so a
    /// trainer can never produce a length mismatch here; short input leaves the
    /// remaining slots as don't-care and surplus values are ignored.
    pub fn make_ruleset(&self, coeffs: &[f64]) -> Result<Ruleset, ConfigurationError> {
        let expected = live_slots(self.target).len();
        if coeffs.len() != expected {
            warn!(
                trainee = %self.name,
                expected,
                actual = coeffs.len(),
                "Trainee coefficient count mismatch"
            );
        }
        make_ruleset(self.target, &expand_live(self.target, coeffs))
    }

    /// Ruleset built from the seed coefficients.
    pub fn seed_ruleset(&self) -> Result<Ruleset, ConfigurationError> {
        self.make_ruleset(&self.coeffs)
    }
}

/// Immutable table of trainees, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct TraineeRegistry {
    trainees: BTreeMap<String, Trainee>,
}

impl TraineeRegistry {
    /// The shipped trainees: `image`, plus `title` and `price` starting from
    /// the same shared text coefficients.
    pub fn standard() -> Self {
        Self::from_trainees([
            Trainee::new(TargetType::Image, IMAGE_COEFFICIENTS.to_vec()),
            Trainee::new(TargetType::Title, TEXT_COEFFICIENTS.to_vec()),
            Trainee::new(TargetType::Price, TEXT_COEFFICIENTS.to_vec()),
        ])
    }

    pub fn from_trainees(trainees: impl IntoIterator<Item = Trainee>) -> Self {
        Self {
            trainees: trainees
                .into_iter()
                .map(|t| (t.name.clone(), t))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Trainee> {
        self.trainees.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.trainees.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trainee> {
        self.trainees.values()
    }

    pub fn len(&self) -> usize {
        self.trainees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trainees.is_empty()
    }

    /// What a trainer host needs to list and seed its runs.
    pub fn summaries(&self) -> Vec<TraineeSummary> {
        self.iter()
            .map(|t| TraineeSummary {
                name: t.name.clone(),
                target: t.target,
                coeffs: t.coeffs.clone(),
                slots: t.slot_names(),
                viewport_size: t.viewport_size,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TraineeSummary {
    pub name: String,
    pub target: TargetType,
    pub coeffs: Vec<f64>,
    pub slots: Vec<String>,
    pub viewport_size: Viewport,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::PageSnapshot;
    use crate::rules::RuleId;
    use crate::ruleset::Coefficient;

    #[test]
    fn test_standard_registry() {
        let registry = TraineeRegistry::standard();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["image", "price", "title"]);

        let image = registry.get("image").unwrap();
        assert_eq!(image.coeffs, vec![5.0, 9.0, 3.0, 4.0]);
        assert_eq!(image.viewport_size, TRAINING_VIEWPORT);

        let title = registry.get("title").unwrap();
        let price = registry.get("price").unwrap();
        assert_eq!(title.coeffs, price.coeffs);
        assert_ne!(title.target, price.target);
    }

    #[test]
    fn test_makers_accept_any_length() {
        let registry = TraineeRegistry::standard();
        for trainee in registry.iter() {
            for len in [0, 1, 3, 4, 10, 12, 20] {
                let coeffs: Vec<f64> = (0..len).map(|i| i as f64 - 2.0).collect();
                let ruleset = trainee.make_ruleset(&coeffs).unwrap();
                assert_eq!(ruleset.target(), trainee.target);
            }
        }
    }

    #[test]
    fn test_image_maker_binds_live_slots() {
        let registry = TraineeRegistry::standard();
        let ruleset = registry.get("image").unwrap().make_ruleset(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        let bindings: Vec<_> = ruleset.bindings().collect();
        assert_eq!(
            bindings,
            vec![
                (RuleId::IsAboveTheFoldImage, Coefficient::Weight(1.0)),
                (RuleId::LargerImage, Coefficient::Weight(2.0)),
                (RuleId::HasImageSource, Coefficient::Weight(3.0)),
                (RuleId::HasProductImageAttribute, Coefficient::Weight(4.0)),
            ]
        );
    }

    #[test]
    fn test_seed_rulesets_extract() {
        let page = PageSnapshot::parse(
            r#"<body>
                <img class="logo" src="/logo.png" width="120" height="40">
                <img id="main-image" src="/widget.jpg" width="500" height="500">
                <h1 class="product-title">Acme Widget</h1>
                <p>Free shipping on orders over $50.</p>
                <div class="price-box"><span>$19.99</span></div>
            </body>"#,
        );
        let registry = TraineeRegistry::standard();
        let text_of = |target: &str| {
            let ruleset = registry.get(target).unwrap().seed_ruleset().unwrap();
            let best = ruleset.best(&page).unwrap();
            page.node(best.node).unwrap().text()
        };

        assert_eq!(text_of("title"), "Acme Widget");
        assert_eq!(text_of("price"), "$19.99");

        let image = registry.get("image").unwrap().seed_ruleset().unwrap();
        let best = image.best(&page).unwrap();
        assert_eq!(page.node(best.node).unwrap().attr("id"), Some("main-image"));
    }

    #[test]
    fn test_summaries_serialize() {
        let summaries = TraineeRegistry::standard().summaries();
        let json = serde_json::to_value(&summaries).unwrap();
        assert_eq!(json[0]["name"], "image");
        assert_eq!(json[0]["slots"][1], "larger_image");
        assert_eq!(json[0]["viewport_size"]["width"], 1680.0);
    }
}

//! Feature rules
//!
//! Each rule looks at one node and returns an unweighted score for the target
//! types it feeds. Rules are registered once, in slot order, in [`TOPOLOGY`];
//! a slot's position is the position of its coefficient.

mod image_rules;
mod text_rules;

pub use image_rules::*;
pub use text_rules::*;

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::dom::{DomNode, SHORT_TEXT_LEN};

/// Number of weighted slots in the rule topology.
pub const SLOT_COUNT: usize = 14;

/// Longest text that can still be read as a price.
const MAX_PRICE_TEXT_LEN: usize = 40;

const _: () = assert!(MAX_PRICE_TEXT_LEN <= SHORT_TEXT_LEN);

/// Currency symbols and codes, shared by the marker and price patterns.
const CURRENCY_MARKER: &str =
    r"[$€£¥₹₩]|\b(?:usd|eur|gbp|cad|aud|jpy|chf|sek|nok|dkk|pln|kr|zł)\b";

/// Semantic category being extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Image,
    Title,
    Price,
}

impl TargetType {
    pub const ALL: [TargetType; 3] = [TargetType::Image, TargetType::Title, TargetType::Price];

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Image => "image",
            TargetType::Title => "title",
            TargetType::Price => "price",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TargetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "image" => Ok(TargetType::Image),
            "title" => Ok(TargetType::Title),
            "price" => Ok(TargetType::Price),
            _ => Err(format!("Unknown target type: {}", s)),
        }
    }
}

/// Identity of a rule; the discriminant is its coefficient slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleId {
    LargerFontSize = 0,
    HasCurrencySymbol = 1,
    HasPriceInId = 2,
    HasPriceInClassName = 3,
    IsAboveTheFold = 4,
    HasPriceInParent = 5,
    IsAboveTheFoldImage = 6,
    IsNearbyImageXAxis = 7,
    IsNearbyImageYAxis = 8,
    TextLength = 9,
    IsTitleLike = 10,
    LargerImage = 11,
    HasImageSource = 12,
    HasProductImageAttribute = 13,
}

impl RuleId {
    pub fn slot(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleId::LargerFontSize => "larger_font_size",
            RuleId::HasCurrencySymbol => "has_currency_symbol",
            RuleId::HasPriceInId => "has_price_in_id",
            RuleId::HasPriceInClassName => "has_price_in_class_name",
            RuleId::IsAboveTheFold => "is_above_the_fold",
            RuleId::HasPriceInParent => "has_price_in_parent",
            RuleId::IsAboveTheFoldImage => "is_above_the_fold_image",
            RuleId::IsNearbyImageXAxis => "is_nearby_image_x_axis",
            RuleId::IsNearbyImageYAxis => "is_nearby_image_y_axis",
            RuleId::TextLength => "text_length",
            RuleId::IsTitleLike => "is_title_like",
            RuleId::LargerImage => "larger_image",
            RuleId::HasImageSource => "has_image_source",
            RuleId::HasProductImageAttribute => "has_product_image_attribute",
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A weighted feature of a DOM node.
///
/// Implementations must be pure: they may walk the snapshot but keep no state
/// between calls, and a node missing the shape a rule looks for scores 0.
pub trait FeatureRule: Send + Sync {
    fn id(&self) -> RuleId;

    /// Target types this rule contributes to.
    fn feeds(&self) -> &'static [TargetType];

    /// Whether the rule has an opinion about `node` for `target`. Nodes no
    /// rule applies to are not candidates at all.
    fn applies(&self, node: DomNode<'_>, target: TargetType) -> bool {
        self.feeds().contains(&target) && is_eligible(node, target)
    }

    /// Unweighted score.
    fn score(&self, node: DomNode<'_>) -> f64;
}

/// Every rule, in slot order.
pub static TOPOLOGY: [&dyn FeatureRule; SLOT_COUNT] = [
    &LargerFontSize,
    &HasCurrencySymbol,
    &HasPriceInId,
    &HasPriceInClassName,
    &IsAboveTheFold,
    &HasPriceInParent,
    &IsAboveTheFoldImage,
    &IsNearbyImageXAxis,
    &IsNearbyImageYAxis,
    &TextLength,
    &IsTitleLike,
    &LargerImage,
    &HasImageSource,
    &HasProductImageAttribute,
];

/// Base eligibility of a node for a target type.
pub fn is_eligible(node: DomNode<'_>, target: TargetType) -> bool {
    if !node.is_visible() {
        return false;
    }
    match target {
        TargetType::Image => node.tag() == "img",
        TargetType::Title => node.has_own_text(),
        TargetType::Price => {
            node.has_own_text() && node.short_text().is_some_and(looks_like_price)
        }
    }
}

static CURRENCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("(?i){CURRENCY_MARKER}")).expect("currency regex is valid")
});

static PRICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?ix)
        (?:{CURRENCY_MARKER})\s?\d
        |
        \d(?:[\d.,\x20]*\d)?\s?(?:{CURRENCY_MARKER})
        |
        ^\s*\d{{1,3}}(?:[.,\x20]?\d{{3}})*[.,]\d{{2}}\s*$
        "
    ))
    .expect("price regex is valid")
});

/// Short text holding a currency-marked number or a bare `12.34` amount.
pub fn looks_like_price(text: &str) -> bool {
    let text = text.trim();
    !text.is_empty() && text.chars().nth(MAX_PRICE_TEXT_LEN).is_none() && PRICE.is_match(text)
}

pub fn has_currency_marker(text: &str) -> bool {
    CURRENCY.is_match(text)
}

/// Case-insensitive substring test on one attribute; absent attributes never
/// match.
pub(crate) fn attr_contains(node: DomNode<'_>, attr: &str, needle: &str) -> bool {
    node.attr(attr)
        .is_some_and(|value| value.to_ascii_lowercase().contains(needle))
}

/// Fraction of a box that sits above the bottom of the first screen.
pub(crate) fn above_the_fold(node: DomNode<'_>) -> f64 {
    let Some(rect) = node.rect() else {
        return 0.0;
    };
    let fold = node.page().viewport().height;
    if rect.height <= 0.0 {
        return if rect.y < fold { 1.0 } else { 0.0 };
    }
    ((fold - rect.y) / rect.height).clamp(0.0, 1.0)
}

/// 1.0 when two positions coincide, falling linearly to 0.0 at `span` apart.
pub(crate) fn nearness(a: f64, b: f64, span: f64) -> f64 {
    if span <= 0.0 {
        return 0.0;
    }
    (1.0 - (a - b).abs() / span).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::PageSnapshot;

    #[test]
    fn test_topology_slots_match_ids() {
        for (slot, rule) in TOPOLOGY.iter().enumerate() {
            assert_eq!(rule.id().slot(), slot, "{:?} is registered out of order", rule.id());
            assert!(!rule.feeds().is_empty());
            let json = serde_json::to_value(rule.id()).unwrap();
            assert_eq!(json, rule.id().as_str());
        }
    }

    #[test]
    fn test_price_patterns() {
        for text in ["$19.99", "19,99 €", "USD 1,299.00", "£5", "1.299,00", "Now $4.50", "349 kr", "12,50 zł"] {
            assert!(looks_like_price(text), "{text} should look like a price");
        }
        for text in ["Acme Widget 3000", "Free shipping on orders", "2024", "", "Add to cart"] {
            assert!(!looks_like_price(text), "{text} should not look like a price");
        }
        assert!(!looks_like_price(
            "Save $5 when you buy two or more of these fantastic widgets today"
        ));
    }

    #[test]
    fn test_eligibility() {
        let page = PageSnapshot::parse(
            r#"<body>
                <h1>Widget</h1>
                <span>$19.99</span>
                <img src="/a.jpg">
                <div style="display:none"><img src="/hidden.jpg"></div>
            </body>"#,
        );
        let by_tag = |tag: &str| page.nodes().find(|n| n.tag() == tag).unwrap();

        assert!(is_eligible(by_tag("h1"), TargetType::Title));
        assert!(!is_eligible(by_tag("h1"), TargetType::Price));
        assert!(is_eligible(by_tag("span"), TargetType::Price));
        assert!(is_eligible(by_tag("img"), TargetType::Image));
        assert!(!is_eligible(by_tag("img"), TargetType::Title));

        let hidden_img = page.nodes().filter(|n| n.tag() == "img").nth(1).unwrap();
        assert!(!is_eligible(hidden_img, TargetType::Image));
    }

    #[test]
    fn test_target_type_parsing() {
        assert_eq!("Price".parse::<TargetType>().unwrap(), TargetType::Price);
        assert!("brand".parse::<TargetType>().is_err());
        assert_eq!(TargetType::Image.to_string(), "image");
    }
}

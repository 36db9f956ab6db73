//! Rules scoring text-bearing nodes for the title and price types.

use super::{above_the_fold, attr_contains, has_currency_marker, nearness, FeatureRule, RuleId, TargetType};
use crate::dom::{DomNode, ROOT_FONT_SIZE};

const TEXT_TYPES: &[TargetType] = &[TargetType::Title, TargetType::Price];
const PRICE_ONLY: &[TargetType] = &[TargetType::Price];
const TITLE_ONLY: &[TargetType] = &[TargetType::Title];

/// How many ancestors are searched for price-ish ids and classes.
const PARENT_DEPTH: usize = 3;

/// Bigger text is more prominent.
pub struct LargerFontSize;

impl FeatureRule for LargerFontSize {
    fn id(&self) -> RuleId {
        RuleId::LargerFontSize
    }

    fn feeds(&self) -> &'static [TargetType] {
        TEXT_TYPES
    }

    fn score(&self, node: DomNode<'_>) -> f64 {
        node.font_size() / ROOT_FONT_SIZE
    }
}

pub struct HasCurrencySymbol;

impl FeatureRule for HasCurrencySymbol {
    fn id(&self) -> RuleId {
        RuleId::HasCurrencySymbol
    }

    fn feeds(&self) -> &'static [TargetType] {
        PRICE_ONLY
    }

    fn score(&self, node: DomNode<'_>) -> f64 {
        if has_currency_marker(&node.text_cow()) {
            1.0
        } else {
            0.0
        }
    }
}

pub struct HasPriceInId;

impl FeatureRule for HasPriceInId {
    fn id(&self) -> RuleId {
        RuleId::HasPriceInId
    }

    fn feeds(&self) -> &'static [TargetType] {
        PRICE_ONLY
    }

    fn score(&self, node: DomNode<'_>) -> f64 {
        if attr_contains(node, "id", "price") {
            1.0
        } else {
            0.0
        }
    }
}

pub struct HasPriceInClassName;

impl FeatureRule for HasPriceInClassName {
    fn id(&self) -> RuleId {
        RuleId::HasPriceInClassName
    }

    fn feeds(&self) -> &'static [TargetType] {
        PRICE_ONLY
    }

    fn score(&self, node: DomNode<'_>) -> f64 {
        if attr_contains(node, "class", "price") {
            1.0
        } else {
            0.0
        }
    }
}

pub struct IsAboveTheFold;

impl FeatureRule for IsAboveTheFold {
    fn id(&self) -> RuleId {
        RuleId::IsAboveTheFold
    }

    fn feeds(&self) -> &'static [TargetType] {
        TEXT_TYPES
    }

    fn score(&self, node: DomNode<'_>) -> f64 {
        above_the_fold(node)
    }
}

/// Price markup is often a bare `<span>` inside a `div.price-box`.
pub struct HasPriceInParent;

impl FeatureRule for HasPriceInParent {
    fn id(&self) -> RuleId {
        RuleId::HasPriceInParent
    }

    fn feeds(&self) -> &'static [TargetType] {
        PRICE_ONLY
    }

    fn score(&self, node: DomNode<'_>) -> f64 {
        let found = node.ancestors().take(PARENT_DEPTH).any(|ancestor| {
            attr_contains(ancestor, "id", "price") || attr_contains(ancestor, "class", "price")
        });
        if found {
            1.0
        } else {
            0.0
        }
    }
}

/// Prices tend to sit in the same column as the product image.
pub struct IsNearbyImageXAxis;

impl FeatureRule for IsNearbyImageXAxis {
    fn id(&self) -> RuleId {
        RuleId::IsNearbyImageXAxis
    }

    fn feeds(&self) -> &'static [TargetType] {
        PRICE_ONLY
    }

    fn score(&self, node: DomNode<'_>) -> f64 {
        let page = node.page();
        let (Some(rect), Some(image)) = (node.rect(), page.largest_image().and_then(|i| i.rect()))
        else {
            return 0.0;
        };
        nearness(rect.center_x(), image.center_x(), page.viewport().width)
    }
}

/// Titles tend to sit at the height of the product image.
pub struct IsNearbyImageYAxis;

impl FeatureRule for IsNearbyImageYAxis {
    fn id(&self) -> RuleId {
        RuleId::IsNearbyImageYAxis
    }

    fn feeds(&self) -> &'static [TargetType] {
        TITLE_ONLY
    }

    fn score(&self, node: DomNode<'_>) -> f64 {
        let page = node.page();
        let (Some(rect), Some(image)) = (node.rect(), page.largest_image().and_then(|i| i.rect()))
        else {
            return 0.0;
        };
        nearness(rect.center_y(), image.center_y(), page.viewport().height)
    }
}

/// Log-scaled character count of the rendered text.
pub struct TextLength;

impl FeatureRule for TextLength {
    fn id(&self) -> RuleId {
        RuleId::TextLength
    }

    fn feeds(&self) -> &'static [TargetType] {
        TITLE_ONLY
    }

    fn score(&self, node: DomNode<'_>) -> f64 {
        (node.text_len() as f64).ln_1p()
    }
}

pub struct IsTitleLike;

impl FeatureRule for IsTitleLike {
    fn id(&self) -> RuleId {
        RuleId::IsTitleLike
    }

    fn feeds(&self) -> &'static [TargetType] {
        TITLE_ONLY
    }

    fn score(&self, node: DomNode<'_>) -> f64 {
        let title_like = node.tag() == "h1"
            || node
                .attr("itemprop")
                .is_some_and(|v| v.eq_ignore_ascii_case("name"))
            || ["id", "class"].iter().any(|attr| {
                attr_contains(node, attr, "title") || attr_contains(node, attr, "product-name")
            });
        if title_like {
            1.0
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{LayoutHint, PageSnapshot, Rect, Viewport};
    use crate::rules::is_eligible;

    fn node<'a>(page: &'a PageSnapshot, id: &str) -> DomNode<'a> {
        page.nodes().find(|n| n.attr("id") == Some(id)).unwrap()
    }

    #[test]
    fn test_price_attribute_rules() {
        let page = PageSnapshot::parse(
            r#"<div class="Price-Box"><p><span id="x">$10.00</span></p></div>
               <span id="our-price" class="sale-price">€5,00</span>
               <span id="bare">12.50</span>"#,
        );

        let x = node(&page, "x");
        assert_eq!(HasPriceInParent.score(x), 1.0);
        assert_eq!(HasPriceInId.score(x), 0.0);
        assert_eq!(HasCurrencySymbol.score(x), 1.0);

        let ours = node(&page, "our-price");
        assert_eq!(HasPriceInId.score(ours), 1.0);
        assert_eq!(HasPriceInClassName.score(ours), 1.0);

        let bare = node(&page, "bare");
        assert_eq!(HasCurrencySymbol.score(bare), 0.0);
        assert_eq!(HasPriceInClassName.score(bare), 0.0);
    }

    #[test]
    fn test_nordic_and_polish_currency() {
        let page = PageSnapshot::parse(
            r#"<span id="sek">349 kr</span>
               <span id="pln">12,50 zł</span>
               <span id="word">Kraków</span>"#,
        );

        for id in ["sek", "pln"] {
            let price = node(&page, id);
            assert!(is_eligible(price, TargetType::Price), "{id} should be a candidate");
            assert_eq!(HasCurrencySymbol.score(price), 1.0, "{id} has a currency");
        }
        assert_eq!(HasCurrencySymbol.score(node(&page, "word")), 0.0);
    }

    #[test]
    fn test_geometry_rules_without_layout_score_zero() {
        let page = PageSnapshot::parse(r#"<h1 id="t">Widget</h1><img src="/a.jpg" width="300" height="300">"#);
        let title = node(&page, "t");
        assert_eq!(IsAboveTheFold.score(title), 0.0);
        assert_eq!(IsNearbyImageYAxis.score(title), 0.0);
        assert_eq!(IsNearbyImageXAxis.score(title), 0.0);
    }

    #[test]
    fn test_geometry_rules_with_layout() {
        let hints = vec![
            LayoutHint {
                selector: "#hero".into(),
                rect: Some(Rect::new(100.0, 100.0, 400.0, 400.0)),
                ..Default::default()
            },
            LayoutHint {
                selector: "#t".into(),
                rect: Some(Rect::new(600.0, 280.0, 500.0, 40.0)),
                ..Default::default()
            },
            LayoutHint {
                selector: "#p".into(),
                rect: Some(Rect::new(250.0, 900.0, 100.0, 100.0)),
                ..Default::default()
            },
        ];
        let page = PageSnapshot::parse_with(
            r#"<img id="hero" src="/a.jpg"><h1 id="t">Widget</h1><span id="p">$3.00</span>"#,
            Viewport::default(),
            &hints,
        )
        .unwrap();

        let title = node(&page, "t");
        assert_eq!(IsAboveTheFold.score(title), 1.0);
        assert_eq!(IsNearbyImageYAxis.score(title), 1.0);

        let price = node(&page, "p");
        assert_eq!(IsAboveTheFold.score(price), 0.5);
        assert_eq!(IsNearbyImageXAxis.score(price), 1.0);
    }

    #[test]
    fn test_title_rules() {
        let page = PageSnapshot::parse(
            r#"<h1 id="a">Acme Widget</h1>
               <span id="b" itemprop="name">Widget</span>
               <div id="c" class="product-title">Widget</div>
               <p id="d">Widget</p>"#,
        );
        assert_eq!(IsTitleLike.score(node(&page, "a")), 1.0);
        assert_eq!(IsTitleLike.score(node(&page, "b")), 1.0);
        assert_eq!(IsTitleLike.score(node(&page, "c")), 1.0);
        assert_eq!(IsTitleLike.score(node(&page, "d")), 0.0);

        assert_eq!(LargerFontSize.score(node(&page, "a")), 2.0);
        let length = TextLength.score(node(&page, "a"));
        assert!((length - 12f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_text_length_of_long_text() {
        let words = vec!["widget"; 40].join(" ");
        let html = format!(r#"<p id="long">{words} <b>and  more</b></p>"#);
        let page = PageSnapshot::parse(&html);
        let long = node(&page, "long");

        let expected = words.len() + " and more".len();
        assert_eq!(long.text().chars().count(), expected);
        assert_eq!(long.text_len(), expected);
        let length = TextLength.score(long);
        assert!((length - (expected as f64 + 1.0).ln()).abs() < 1e-12);
    }
}

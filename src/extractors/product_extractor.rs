use std::collections::BTreeMap;

use tracing::debug;
use url::Url;

use super::{
    extract_opengraph, ExtractedField, ExtractedProduct, ExtractionRequest, ExtractionResult,
    FieldSource, OpenGraphProduct,
};
use crate::dom::{DomNode, PageSnapshot};
use crate::error::{ConfigurationError, Result};
use crate::rules::{image_source, TargetType};
use crate::ruleset::{default_coefficients, make_ruleset, Ranking, Ruleset, ScoredCandidate};

/// Runs one ruleset per target type and reads the winners.
#[derive(Debug, Clone)]
pub struct ProductExtractor {
    rulesets: Vec<Ruleset>,
    base_url: Option<Url>,
    opengraph_fallback: bool,
}

impl ProductExtractor {
    pub fn new(rulesets: impl IntoIterator<Item = Ruleset>) -> Self {
        Self {
            rulesets: rulesets.into_iter().collect(),
            base_url: None,
            opengraph_fallback: true,
        }
    }

    /// Every target type with the shipped coefficients.
    pub fn with_defaults() -> std::result::Result<Self, ConfigurationError> {
        let rulesets = TargetType::ALL
            .iter()
            .map(|&target| make_ruleset(target, &default_coefficients(target)))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self::new(rulesets))
    }

    pub fn from_request(request: &ExtractionRequest) -> std::result::Result<Self, ConfigurationError> {
        let mut rulesets: Vec<Ruleset> = Vec::with_capacity(request.targets.len());
        for &target in &request.targets {
            if rulesets.iter().any(|r| r.target() == target) {
                continue;
            }
            let ruleset = match request.coefficients.get(&target) {
                Some(coefficients) => make_ruleset(target, coefficients)?,
                None => make_ruleset(target, &default_coefficients(target))?,
            };
            rulesets.push(ruleset);
        }

        let base_url = request
            .base_url
            .as_deref()
            .map(|raw| Url::parse(raw).map_err(|_| ConfigurationError::InvalidBaseUrl(raw.to_string())))
            .transpose()?;

        Ok(Self {
            rulesets,
            base_url,
            opengraph_fallback: request.opengraph_fallback,
        })
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn with_opengraph_fallback(mut self, enabled: bool) -> Self {
        self.opengraph_fallback = enabled;
        self
    }

    pub fn ruleset(&self, target: TargetType) -> Option<&Ruleset> {
        self.rulesets.iter().find(|r| r.target() == target)
    }

    /// Ranking per configured target type.
    pub fn rank(&self, page: &PageSnapshot) -> BTreeMap<TargetType, Ranking> {
        self.rulesets
            .iter()
            .map(|ruleset| (ruleset.target(), ruleset.evaluate(page)))
            .collect()
    }

    pub fn extract(&self, page: &PageSnapshot) -> ExtractedProduct {
        self.read_product(page, &self.rank(page))
    }

    fn read_product(
        &self,
        page: &PageSnapshot,
        rankings: &BTreeMap<TargetType, Ranking>,
    ) -> ExtractedProduct {
        let mut product = ExtractedProduct::default();
        let winner = |target: TargetType| {
            rankings
                .get(&target)
                .and_then(Ranking::best)
                .and_then(|best| page.node(best.node).map(|node| (node, *best)))
        };

        if let Some((node, best)) = winner(TargetType::Title) {
            product.title = text_field(node, best);
        }
        if let Some((node, best)) = winner(TargetType::Price) {
            product.price = text_field(node, best);
        }
        if let Some((node, best)) = winner(TargetType::Image) {
            product.image = image_source(node).map(|src| ExtractedField {
                value: self.resolve(src),
                source: FieldSource::Ruleset,
                score: Some(best.score),
                node: Some(best.node),
            });
        }

        if self.opengraph_fallback && self.missing_field(&product) {
            let og = extract_opengraph(page);
            self.fill_from_opengraph(&mut product, og);
        }

        product.price_amount = product
            .price
            .as_ref()
            .and_then(|price| parse_price(&price.value));

        debug!(
            title = product.title.is_some(),
            price = product.price.is_some(),
            image = product.image.is_some(),
            "Extracted product"
        );
        product
    }

    fn missing_field(&self, product: &ExtractedProduct) -> bool {
        self.rulesets.iter().any(|ruleset| match ruleset.target() {
            TargetType::Title => product.title.is_none(),
            TargetType::Price => product.price.is_none(),
            TargetType::Image => product.image.is_none(),
        })
    }

    fn fill_from_opengraph(&self, product: &mut ExtractedProduct, og: OpenGraphProduct) {
        let from_meta = |value: String| ExtractedField {
            value,
            source: FieldSource::OpenGraph,
            score: None,
            node: None,
        };

        for ruleset in &self.rulesets {
            match ruleset.target() {
                TargetType::Title if product.title.is_none() => {
                    product.title = og.title.clone().map(from_meta);
                }
                TargetType::Price if product.price.is_none() => {
                    product.price = og.price_amount.as_ref().map(|amount| match &og.price_currency {
                        Some(currency) => from_meta(format!("{amount} {currency}")),
                        None => from_meta(amount.clone()),
                    });
                }
                TargetType::Image if product.image.is_none() => {
                    product.image = og.image.as_deref().map(|src| from_meta(self.resolve(src)));
                }
                _ => continue,
            }
            debug!(target_type = %ruleset.target(), "Fell back to meta tags");
        }
    }

    /// Absolute form of an image source when a base URL is known.
    fn resolve(&self, src: &str) -> String {
        match &self.base_url {
            Some(base) => base
                .join(src)
                .map(|url| url.to_string())
                .unwrap_or_else(|_| src.to_string()),
            None => src.to_string(),
        }
    }
}

fn text_field(node: DomNode<'_>, best: ScoredCandidate) -> Option<ExtractedField> {
    let text = node.text();
    if text.is_empty() {
        return None;
    }
    Some(ExtractedField {
        value: text,
        source: FieldSource::Ruleset,
        score: Some(best.score),
        node: Some(best.node),
    })
}

/// Read the amount out of a price text such as `$1,299.99` or `1.299,00 €`.
///
/// The last `.` or `,` followed by one or two trailing digits is the decimal
/// separator; every other separator groups thousands.
pub fn parse_price(text: &str) -> Option<f64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let number: String = text[start..]
        .chars()
        .take_while(|&c| c.is_ascii_digit() || matches!(c, '.' | ',' | ' ' | '\u{a0}' | '\''))
        .collect();
    let number = number.trim_end_matches(|c: char| !c.is_ascii_digit());

    let decimal = number.rfind(['.', ',']).filter(|&pos| {
        let tail = &number[pos + 1..];
        (1..=2).contains(&tail.len()) && tail.chars().all(|c| c.is_ascii_digit())
    });
    let (whole, fraction) = match decimal {
        Some(pos) => (&number[..pos], &number[pos + 1..]),
        None => (number, ""),
    };

    let mut digits: String = whole.chars().filter(char::is_ascii_digit).collect();
    if !fraction.is_empty() {
        digits.push('.');
        digits.push_str(fraction);
    }
    digits.parse().ok()
}

/// Parse `html` and extract everything `request` asks for.
pub fn extract_product(html: &str, request: &ExtractionRequest) -> Result<ExtractionResult> {
    let extractor = ProductExtractor::from_request(request)?;
    let page = PageSnapshot::parse_with(html, request.viewport, &request.layout)?;

    let rankings = extractor.rank(&page);
    let product = extractor.read_product(&page, &rankings);

    let rankings = if request.include_rankings {
        rankings
            .into_iter()
            .map(|(target, ranking)| (target, ranking.into_candidates()))
            .collect()
    } else {
        BTreeMap::new()
    };

    Ok(ExtractionResult { product, rankings })
}

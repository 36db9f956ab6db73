//! OpenGraph and product meta tags
//!
//! Used when the rulesets find no candidate for a field. Reads `og:*`,
//! `product:price:*` and Twitter Card tags from the page's `<meta>` elements.

use serde::Serialize;

use crate::dom::PageSnapshot;

/// Product fields declared in meta tags
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OpenGraphProduct {
    pub title: Option<String>,
    pub image: Option<String>,
    pub price_amount: Option<String>,
    pub price_currency: Option<String>,
}

/// Collect product meta tags. When a field is declared more than once (e.g.
/// several `og:image` tags) the first tag wins.
pub fn extract_opengraph(page: &PageSnapshot) -> OpenGraphProduct {
    let mut og = OpenGraphProduct::default();

    for node in page.nodes().filter(|n| n.tag() == "meta") {
        let Some(key) = node.attr("property").or_else(|| node.attr("name")) else {
            continue;
        };
        let content = node.attr("content").unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }

        let field = match key.trim().to_ascii_lowercase().as_str() {
            "og:title" | "twitter:title" => &mut og.title,
            "og:image" | "og:image:url" | "og:image:secure_url" | "twitter:image" => &mut og.image,
            "product:price:amount" | "og:price:amount" => &mut og.price_amount,
            "product:price:currency" | "og:price:currency" => &mut og.price_currency,
            _ => continue,
        };
        if field.is_none() {
            *field = Some(content.to_string());
        }
    }

    og
}

//! Rules scoring `<img>` elements for the image type.

use super::{above_the_fold, attr_contains, FeatureRule, RuleId, TargetType};
use crate::dom::DomNode;

const IMAGE_ONLY: &[TargetType] = &[TargetType::Image];

/// Words that mark the main product picture in ids, classes and alt text.
const PRODUCT_IMAGE_HINTS: &[&str] = &["product", "main", "hero", "primary"];

pub struct IsAboveTheFoldImage;

impl FeatureRule for IsAboveTheFoldImage {
    fn id(&self) -> RuleId {
        RuleId::IsAboveTheFoldImage
    }

    fn feeds(&self) -> &'static [TargetType] {
        IMAGE_ONLY
    }

    fn score(&self, node: DomNode<'_>) -> f64 {
        above_the_fold(node)
    }
}

/// Square root of the rendered area, in hundreds of pixels.
pub struct LargerImage;

impl FeatureRule for LargerImage {
    fn id(&self) -> RuleId {
        RuleId::LargerImage
    }

    fn feeds(&self) -> &'static [TargetType] {
        IMAGE_ONLY
    }

    fn score(&self, node: DomNode<'_>) -> f64 {
        match node.size() {
            Some((width, height)) => (width * height).sqrt() / 100.0,
            None => 0.0,
        }
    }
}

/// Whether the image points at something that can actually be loaded.
pub struct HasImageSource;

impl FeatureRule for HasImageSource {
    fn id(&self) -> RuleId {
        RuleId::HasImageSource
    }

    fn feeds(&self) -> &'static [TargetType] {
        IMAGE_ONLY
    }

    fn score(&self, node: DomNode<'_>) -> f64 {
        if image_source(node).is_some() {
            1.0
        } else {
            0.0
        }
    }
}

pub struct HasProductImageAttribute;

impl FeatureRule for HasProductImageAttribute {
    fn id(&self) -> RuleId {
        RuleId::HasProductImageAttribute
    }

    fn feeds(&self) -> &'static [TargetType] {
        IMAGE_ONLY
    }

    fn score(&self, node: DomNode<'_>) -> f64 {
        let itemprop = node
            .attr("itemprop")
            .is_some_and(|v| v.eq_ignore_ascii_case("image"));
        let hinted = ["id", "class", "alt"].iter().any(|attr| {
            PRODUCT_IMAGE_HINTS
                .iter()
                .any(|hint| attr_contains(node, attr, hint))
        });
        if itemprop || hinted {
            1.0
        } else {
            0.0
        }
    }
}

/// URL an image will load: `src`, else lazy-load `data-src`, else the first
/// `srcset` candidate, else the first `<source>` of an enclosing `<picture>`.
/// Inline `data:` placeholders do not count.
pub fn image_source<'a>(node: DomNode<'a>) -> Option<&'a str> {
    node.attr("src")
        .and_then(usable_url)
        .or_else(|| node.attr("data-src").and_then(usable_url))
        .or_else(|| node.attr("srcset").and_then(first_srcset_url))
        .or_else(|| picture_source(node))
}

fn picture_source<'a>(node: DomNode<'a>) -> Option<&'a str> {
    let picture = node.parent().filter(|parent| parent.tag() == "picture")?;
    picture
        .children()
        .filter(|child| child.tag() == "source")
        .find_map(|source| {
            source
                .attr("srcset")
                .and_then(first_srcset_url)
                .or_else(|| source.attr("data-srcset").and_then(first_srcset_url))
        })
}

fn first_srcset_url(set: &str) -> Option<&str> {
    set.split(',')
        .next()
        .and_then(|candidate| candidate.split_whitespace().next())
        .and_then(usable_url)
}

fn usable_url(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty() && !value.to_ascii_lowercase().starts_with("data:")).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::PageSnapshot;

    fn img<'a>(page: &'a PageSnapshot, id: &str) -> DomNode<'a> {
        page.nodes().find(|n| n.attr("id") == Some(id)).unwrap()
    }

    #[test]
    fn test_image_source_fallbacks() {
        let page = PageSnapshot::parse(
            r#"<img id="a" src="/a.jpg">
               <img id="b" src="data:image/gif;base64,R0lGOD" data-src="/b.jpg">
               <img id="c" srcset="/c-1x.jpg 1x, /c-2x.jpg 2x">
               <img id="d">
               <img id="e" src="   ">"#,
        );
        assert_eq!(image_source(img(&page, "a")), Some("/a.jpg"));
        assert_eq!(image_source(img(&page, "b")), Some("/b.jpg"));
        assert_eq!(image_source(img(&page, "c")), Some("/c-1x.jpg"));
        assert_eq!(image_source(img(&page, "d")), None);
        assert_eq!(image_source(img(&page, "e")), None);

        assert_eq!(HasImageSource.score(img(&page, "a")), 1.0);
        assert_eq!(HasImageSource.score(img(&page, "d")), 0.0);
    }

    #[test]
    fn test_picture_sources() {
        let page = PageSnapshot::parse(
            r#"<picture>
                 <source srcset="data:image/gif;base64,R0lGOD">
                 <source type="image/webp" srcset="/p.webp 1x, /p@2x.webp 2x">
                 <img id="lazy" alt="Widget">
               </picture>
               <picture>
                 <source srcset="/q.webp">
                 <img id="fallback" src="/q.jpg">
               </picture>
               <div><source srcset="/stray.webp"><img id="loose"></div>"#,
        );
        assert_eq!(image_source(img(&page, "lazy")), Some("/p.webp"));
        assert_eq!(HasImageSource.score(img(&page, "lazy")), 1.0);
        assert_eq!(image_source(img(&page, "fallback")), Some("/q.jpg"));
        assert_eq!(image_source(img(&page, "loose")), None);
    }

    #[test]
    fn test_larger_image() {
        let page = PageSnapshot::parse(
            r#"<img id="big" src="/a.jpg" width="400" height="400">
               <img id="unsized" src="/b.jpg">"#,
        );
        assert_eq!(LargerImage.score(img(&page, "big")), 4.0);
        assert_eq!(LargerImage.score(img(&page, "unsized")), 0.0);
    }

    #[test]
    fn test_product_image_attributes() {
        let page = PageSnapshot::parse(
            r#"<img id="landingImage" class="a-dynamic-image" itemprop="image" src="/a.jpg">
               <img id="x" alt="Main product photo" src="/b.jpg">
               <img id="logo" class="site-logo" alt="Shop" src="/logo.png">"#,
        );
        assert_eq!(HasProductImageAttribute.score(img(&page, "landingImage")), 1.0);
        assert_eq!(HasProductImageAttribute.score(img(&page, "x")), 1.0);
        assert_eq!(HasProductImageAttribute.score(img(&page, "logo")), 0.0);
    }
}

//! Inline `style` attribute parsing
//!
//! Only the handful of declarations that affect scoring are understood:
//! sizes, offsets, font size and the properties that hide an element.

/// Root font size in CSS pixels.
pub const ROOT_FONT_SIZE: f64 = 16.0;

/// Declarations from a single `style="..."` attribute, in source order.
#[derive(Debug, Clone, Default)]
pub struct InlineStyle {
    declarations: Vec<(String, String)>,
}

impl InlineStyle {
    pub fn parse(style: &str) -> Self {
        let declarations = style
            .split(';')
            .filter_map(|decl| {
                let (name, value) = decl.split_once(':')?;
                let name = name.trim().to_ascii_lowercase();
                let value = value.to_ascii_lowercase();
                let value = value.trim().trim_end_matches("!important").trim().to_string();
                if name.is_empty() || value.is_empty() {
                    None
                } else {
                    Some((name, value))
                }
            })
            .collect();

        Self { declarations }
    }

    /// Last declared value wins, as in CSS.
    pub fn get(&self, property: &str) -> Option<&str> {
        self.declarations
            .iter()
            .rev()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value.as_str())
    }

    /// Whether these declarations hide the element.
    pub fn hides(&self) -> bool {
        if self.get("display") == Some("none") {
            return true;
        }
        if matches!(self.get("visibility"), Some("hidden") | Some("collapse")) {
            return true;
        }
        matches!(self.get("opacity").and_then(|v| v.parse::<f64>().ok()), Some(o) if o <= 0.0)
    }

    pub fn length(&self, property: &str, font_size: f64) -> Option<f64> {
        self.get(property)
            .and_then(|value| parse_length(value, font_size))
    }
}

/// Parse a CSS length into pixels.
///
/// Percentages resolve against `font_size`, which is right for `font-size`
/// itself; for box sizes they are meaningless without layout and callers skip
/// them by checking the unit first.
pub fn parse_length(value: &str, font_size: f64) -> Option<f64> {
    let value = value.trim();
    let (number, factor) = if let Some(n) = value.strip_suffix("px") {
        (n, 1.0)
    } else if let Some(n) = value.strip_suffix("rem") {
        (n, ROOT_FONT_SIZE)
    } else if let Some(n) = value.strip_suffix("em") {
        (n, font_size)
    } else if let Some(n) = value.strip_suffix("pt") {
        (n, 4.0 / 3.0)
    } else if let Some(n) = value.strip_suffix('%') {
        (n, font_size / 100.0)
    } else {
        (value, 1.0)
    };

    let parsed = number.trim().parse::<f64>().ok()?;
    let px = parsed * factor;
    if px.is_finite() && px >= 0.0 {
        Some(px)
    } else {
        None
    }
}

/// Default font size multiplier (in em of the parent) for a tag.
pub fn tag_font_scale(tag: &str) -> f64 {
    match tag {
        "h1" => 2.0,
        "h2" => 1.5,
        "h3" => 1.17,
        "h5" => 0.83,
        "h6" => 0.67,
        "small" | "sub" | "sup" => 0.83,
        "big" => 1.2,
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_declarations() {
        let style = InlineStyle::parse("Width: 400px; height:300PX ;font-size: 2em !important");
        assert_eq!(style.get("width"), Some("400px"));
        assert_eq!(style.length("height", 16.0), Some(300.0));
        assert_eq!(style.length("font-size", 12.0), Some(24.0));
        assert_eq!(style.get("color"), None);
    }

    #[test]
    fn test_hidden_styles() {
        assert!(InlineStyle::parse("display:none").hides());
        assert!(InlineStyle::parse("visibility: hidden").hides());
        assert!(InlineStyle::parse("opacity: 0").hides());
        assert!(!InlineStyle::parse("display:block; opacity: 0.5").hides());
    }

    #[test]
    fn test_units() {
        assert_eq!(parse_length("12pt", 16.0), Some(16.0));
        assert_eq!(parse_length("1.5rem", 10.0), Some(24.0));
        assert_eq!(parse_length("150%", 10.0), Some(15.0));
        assert_eq!(parse_length("auto", 16.0), None);
        assert_eq!(parse_length("-4px", 16.0), None);
    }
}

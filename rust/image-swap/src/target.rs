//! Placeholder URLs and the dimensions that go into them.

use crate::Document;
use crate::constants::{DEFAULT_HEIGHT, DEFAULT_WIDTH, PLACEHOLDER_HOST};

/// Whether `url` already points at the placeholder service.
pub fn is_placeholder_url(url: &str) -> bool {
    url.contains(PLACEHOLDER_HOST)
}

/// Everything needed to address one placeholder image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReplacementTarget {
    /// Deterministic image selector
    pub seed: u32,
    /// Width in CSS pixels, always positive
    pub width: u32,
    /// Height in CSS pixels, always positive
    pub height: u32,
}

impl ReplacementTarget {
    /// A target with the given seed and resolved dimensions.
    pub fn new(seed: u32, dimensions: Dimensions) -> Self {
        Self {
            seed,
            width: dimensions.width,
            height: dimensions.height,
        }
    }

    /// The canonical placeholder URL:
    /// `https://picsum.photos/seed/<seed>/<width>/<height>`.
    pub fn url(&self) -> String {
        format!(
            "https://{PLACEHOLDER_HOST}/seed/{}/{}/{}",
            self.seed, self.width, self.height
        )
    }
}

impl std::fmt::Display for ReplacementTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url())
    }
}

/// Resolved pixel dimensions of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    /// Width in CSS pixels
    pub width: u32,
    /// Height in CSS pixels
    pub height: u32,
}

impl Default for Dimensions {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

impl Dimensions {
    /// Resolve each axis independently: a positive attribute value wins,
    /// then a positive computed length, then the fixed fallback.
    pub fn resolve(
        width_attribute: Option<&str>,
        height_attribute: Option<&str>,
        computed_width: Option<&str>,
        computed_height: Option<&str>,
    ) -> Self {
        let axis = |attribute: Option<&str>, computed: Option<&str>, fallback: u32| {
            attribute
                .and_then(parse_length)
                .or_else(|| computed.and_then(parse_length))
                .unwrap_or(fallback)
        };

        Self {
            width: axis(width_attribute, computed_width, DEFAULT_WIDTH),
            height: axis(height_attribute, computed_height, DEFAULT_HEIGHT),
        }
    }
}

/// Compute the target dimensions for `node` from its `width`/`height`
/// attributes and, failing that, its computed style.
pub fn compute_dimensions<D: Document>(dom: &D, node: &D::Node) -> Dimensions {
    let width = dom.attribute(node, "width");
    let height = dom.attribute(node, "height");
    let computed_width = dom.computed_style(node, "width");
    let computed_height = dom.computed_style(node, "height");

    Dimensions::resolve(
        width.as_deref(),
        height.as_deref(),
        computed_width.as_deref(),
        computed_height.as_deref(),
    )
}

/// Read the leading integer of a length such as `"120"`, `"120px"` or
/// `"99.6px"`, ignoring leading whitespace. Only positive results count;
/// integers past `u32::MAX` saturate.
fn parse_length(value: &str) -> Option<u32> {
    let value = value.trim_start();
    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let digits = &digits[..end];
    if digits.is_empty() {
        return None;
    }
    // Only overflow can fail here
    let parsed = digits.parse::<u32>().unwrap_or(u32::MAX);

    (!negative && parsed > 0).then_some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_formats_the_canonical_url() {
        let target = ReplacementTarget {
            seed: 117_529_463,
            width: 50,
            height: 40,
        };
        assert_eq!(
            target.url(),
            "https://picsum.photos/seed/117529463/50/40"
        );
        assert!(is_placeholder_url(&target.to_string()));
        assert!(!is_placeholder_url("https://cdn.example.com/a.png"));
    }

    #[test]
    fn it_parses_leading_integers() {
        assert_eq!(parse_length("120"), Some(120));
        assert_eq!(parse_length(" 99.6px"), Some(99));
        assert_eq!(parse_length("+7"), Some(7));
        assert_eq!(parse_length("0"), None);
        assert_eq!(parse_length("-5"), None);
        assert_eq!(parse_length("auto"), None);
        assert_eq!(parse_length(""), None);
        assert_eq!(parse_length("px"), None);
    }

    #[test]
    fn it_saturates_oversized_lengths() {
        assert_eq!(parse_length("5000000000"), Some(u32::MAX));
        assert_eq!(parse_length("99999999999999999999px"), Some(u32::MAX));
        assert_eq!(parse_length("-5000000000"), None);
        assert_eq!(parse_length("0000000000000"), None);
    }

    #[test]
    fn it_prefers_attributes_then_computed_style_per_axis() {
        assert_eq!(
            Dimensions::resolve(Some("50"), None, Some("80px"), Some("64px")),
            Dimensions {
                width: 50,
                height: 64
            }
        );
        assert_eq!(
            Dimensions::resolve(Some("0"), Some("abc"), Some("auto"), None),
            Dimensions::default()
        );
        assert_eq!(
            Dimensions::resolve(None, Some("20"), Some("33.3px"), Some("90px")),
            Dimensions {
                width: 33,
                height: 20
            }
        );
    }
}

use crate::Document;
use crate::constants::SEED_DELIMITER;

/// The element attributes that identify an image for seeding purposes.
///
/// Two elements with equal attributes always receive the same seed, on any
/// page load, which is what keeps a placeholder visually stable across
/// reloads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedAttributes {
    /// `alt` text
    pub alt: String,
    /// `id`
    pub id: String,
    /// The full `class` attribute
    pub class_name: String,
    /// Deferred source path from `data-src`, as used by lazy loaders
    pub data_src: String,
    /// `loading` hint
    pub loading: String,
}

impl SeedAttributes {
    /// Read the identifying attributes of `node`. Absent attributes read as
    /// empty strings.
    pub fn read<D: Document>(dom: &D, node: &D::Node) -> Self {
        let attribute = |name: &str| dom.attribute(node, name).unwrap_or_default();
        Self {
            alt: attribute("alt"),
            id: attribute("id"),
            class_name: attribute("class"),
            data_src: attribute("data-src"),
            loading: attribute("loading"),
        }
    }

    /// The hash input: every attribute in fixed order, delimited.
    pub fn key(&self) -> String {
        [
            self.alt.as_str(),
            self.id.as_str(),
            self.class_name.as_str(),
            self.data_src.as_str(),
            self.loading.as_str(),
        ]
        .join(SEED_DELIMITER)
    }

    /// The seed for these attributes.
    pub fn seed(&self) -> u32 {
        hash_seed(&self.key())
    }
}

/// Rolling `hash * 31 + unit` over the UTF-16 code units of `input`,
/// wrapped to a signed 32-bit integer, returned as its absolute value.
pub fn hash_seed(input: &str) -> u32 {
    input
        .encode_utf16()
        .fold(0i32, |hash, unit| {
            hash.wrapping_mul(31).wrapping_add(i32::from(unit))
        })
        .unsigned_abs()
}

/// Compute the placeholder seed for `node`.
pub fn compute_seed<D: Document>(dom: &D, node: &D::Node) -> u32 {
    SeedAttributes::read(dom, node).seed()
}

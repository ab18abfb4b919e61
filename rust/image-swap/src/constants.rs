//! Fixed values shared by the engine and its hosts.

/// Host of the placeholder image service. Any source containing this
/// substring is treated as an already generated placeholder.
pub const PLACEHOLDER_HOST: &str = "picsum.photos";

/// Class added to every replaced image; the injected style rule targets it.
pub const MARKER_CLASS: &str = "image-proxy-override";

/// `id` of the `<style>` element that carries the visibility override.
pub const STYLE_ELEMENT_ID: &str = "image-proxy-styles";

/// Stylesheet injected when the user has not configured any custom CSS.
pub const DEFAULT_CUSTOM_CSS: &str = ".image-proxy-override {
  visibility: visible !important;
}";

/// Width used when neither attributes nor layout yield a positive size.
pub const DEFAULT_WIDTH: u32 = 300;

/// Height used when neither attributes nor layout yield a positive size.
pub const DEFAULT_HEIGHT: u32 = 300;

/// Exclusive upper bound for seeds of `<source>` elements that have no
/// sibling image to derive a seed from.
pub const RANDOM_SEED_BOUND: u32 = 100_000;

/// Separator placed between the attributes that feed the seed hash.
pub const SEED_DELIMITER: &str = "|";

/// Attribute carrying an image's visual source.
pub const SRC_ATTRIBUTE: &str = "src";

/// Attribute carrying a `<source>` element's visual source.
pub const SRCSET_ATTRIBUTE: &str = "srcset";

/// Attributes whose mutation re-routes a node through the policy.
pub const OBSERVED_ATTRIBUTES: [&str; 2] = [SRC_ATTRIBUTE, SRCSET_ATTRIBUTE];

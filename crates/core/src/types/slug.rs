//! URL slugs for products, categories and lookbook posts.

/// Derive a URL slug from a display name.
///
/// ASCII letters and digits are kept (lowercased); every other run of
/// characters collapses into a single `-`, and leading/trailing dashes are
/// dropped.
///
/// ```
/// use atelier_core::slugify;
///
/// assert_eq!(slugify("Linen Shirt (Ivory)"), "linen-shirt-ivory");
/// assert_eq!(slugify("  --Summer '26--  "), "summer-26");
/// ```
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Whether a client-supplied slug is already in canonical form.
#[must_use]
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty() && slugify(slug) == slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_collapses_separators() {
        assert_eq!(slugify("Oversized   Tee / Black"), "oversized-tee-black");
    }

    #[test]
    fn test_slugify_drops_non_ascii() {
        assert_eq!(slugify("Café Crème"), "caf-cr-me");
    }

    #[test]
    fn test_slugify_empty_when_nothing_usable() {
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_is_valid_slug() {
        assert!(is_valid_slug("linen-shirt"));
        assert!(!is_valid_slug("Linen-Shirt"));
        assert!(!is_valid_slug("linen--shirt"));
        assert!(!is_valid_slug(""));
    }
}

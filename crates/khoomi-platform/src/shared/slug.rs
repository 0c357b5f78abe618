//! URL-safe slugs

/// Lowercase, drop apostrophes, collapse runs of anything non-alphanumeric into one hyphen.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.chars() {
        if c == '\'' || c == '\u{2019}' {
            continue;
        }
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Ada's Beads"), "adas-beads");
        assert_eq!(slugify("  Hand--made   Rings!! "), "hand-made-rings");
        assert_eq!(slugify("Kente & Co."), "kente-co");
        assert_eq!(slugify("already-a-slug"), "already-a-slug");
        assert_eq!(slugify("Caf\u{e9} Olé"), "caf-ol");
        assert_eq!(slugify("!!!"), "");
    }
}

/// Whether `slug` can name a function locally, in config, and remotely.
///
/// Equivalent to `^[A-Za-z0-9_-]+$`.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

pub fn validate_slug(slug: &str) -> crate::Result<()> {
    if is_valid_slug(slug) {
        Ok(())
    } else {
        Err(crate::Error::InvalidSlug {
            slug: slug.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_alphanumeric_dash_underscore() {
        assert!(is_valid_slug("hello-world_2"));
    }

    #[test]
    fn rejects_empty() {
        assert!(!is_valid_slug(""));
    }

    #[test]
    fn rejects_path_separators() {
        assert!(!is_valid_slug("a/b"));
        assert!(!is_valid_slug("../etc"));
    }

    #[test]
    fn rejects_trailing_newline() {
        assert!(!is_valid_slug("hello\n"));
    }

    #[test]
    fn validate_reports_slug() {
        let err = validate_slug("no spaces").unwrap_err();
        assert!(matches!(err, crate::Error::InvalidSlug { ref slug } if slug == "no spaces"));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn valid_charset_always_accepted(slug in "[A-Za-z0-9_-]{1,64}") {
                prop_assert!(is_valid_slug(&slug));
            }

            #[test]
            fn any_other_char_rejected(
                head in "[A-Za-z0-9_-]{0,8}",
                bad in "[^A-Za-z0-9_-]",
                tail in "[A-Za-z0-9_-]{0,8}",
            ) {
                let slug = format!("{head}{bad}{tail}");
                prop_assert!(!is_valid_slug(&slug));
            }
        }
    }
}

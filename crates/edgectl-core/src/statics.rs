//! Expansion of `static_files` glob patterns.

use std::path::PathBuf;

/// Expand absolute glob patterns into the files they match.
///
/// A pattern matching nothing is logged and skipped. A matched directory is an
/// error: static files are shipped one by one and directories cannot be.
pub fn expand_static_files(patterns: &[String]) -> crate::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let matches = glob::glob(pattern).map_err(|e| crate::Error::StaticPattern {
            pattern: pattern.clone(),
            source: e,
        })?;
        let before = files.len();
        for entry in matches {
            let path = entry?;
            if path.is_dir() {
                return Err(crate::Error::StaticIsDirectory { path });
            }
            if !files.contains(&path) {
                files.push(path);
            }
        }
        if files.len() == before {
            tracing::warn!(pattern, "no files matched static pattern");
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::to_posix;

    #[test]
    fn expands_globs_and_dedupes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.html"), "a").unwrap();
        std::fs::write(dir.path().join("b.html"), "b").unwrap();
        std::fs::write(dir.path().join("c.css"), "c").unwrap();

        let patterns = vec![
            format!("{}/*.html", to_posix(dir.path())),
            to_posix(&dir.path().join("a.html")),
        ];
        let files = expand_static_files(&patterns).unwrap();

        assert_eq!(
            files,
            vec![dir.path().join("a.html"), dir.path().join("b.html")]
        );
    }

    #[test]
    fn unmatched_pattern_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let files = expand_static_files(&[format!("{}/*.txt", to_posix(dir.path()))]).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn directory_match_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("assets")).unwrap();

        let err = expand_static_files(&[to_posix(&dir.path().join("assets"))]).unwrap_err();
        assert!(matches!(err, crate::Error::StaticIsDirectory { .. }));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = expand_static_files(&["[".to_owned()]).unwrap_err();
        assert!(matches!(err, crate::Error::StaticPattern { ref pattern, .. } if pattern == "["));
    }
}

//! Import graph walker for JavaScript/TypeScript sources.
//!
//! The walker does not parse; it scans for static `import`/`export ... from`
//! clauses and dynamic `import()` calls with a regex, rewrites each specifier
//! through the import map, and follows local paths depth-first. File access
//! goes through a caller-supplied reader so the same traversal can feed an
//! upload stream, compute container mounts, or run against in-memory fixtures.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::import_map::ImportMap;
use crate::paths::clean;

static IMPORT_PATTERN: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(?:import|export)\s+(?:\{[^{}]+\}|.*?)\s*(?:from)?\s*['"](.*?)['"]|import\(\s*['"](.*?)['"]\s*\)"#,
    )
});

/// Walk every local module reachable from `entrypoint`.
///
/// `read_file` writes the contents of one file into the given writer. A
/// `NotFound` error is logged and skipped; any other error aborts the walk.
/// Each path is read at most once. Returns the paths that were read, in
/// visit order.
pub fn walk_import_paths<F>(
    entrypoint: &Path,
    import_map: &ImportMap,
    mut read_file: F,
) -> crate::Result<Vec<PathBuf>>
where
    F: FnMut(&Path, &mut dyn Write) -> std::io::Result<()>,
{
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut visited = Vec::new();
    // LIFO keeps the traversal depth-first
    let mut stack = vec![clean(entrypoint)];

    while let Some(current) = stack.pop() {
        if !seen.insert(current.clone()) {
            continue;
        }

        let mut buf = Vec::new();
        match read_file(&current, &mut buf) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %current.display(), "imported file not found: {e}");
                continue;
            }
            Err(e) => {
                return Err(crate::Error::SourceRead {
                    path: current,
                    source: e,
                });
            }
        }
        tracing::debug!(path = %current.display(), "walked");

        let text = String::from_utf8_lossy(&buf);
        let dir = current.parent().unwrap_or(Path::new("/"));
        for specifier in import_specifiers(&text)? {
            if let Some(next) = resolve_specifier(dir, &import_map.rewrite(specifier)) {
                stack.push(next);
            }
        }
        visited.push(current);
    }

    Ok(visited)
}

/// Module specifiers referenced by `source`, in order of appearance.
pub fn import_specifiers(source: &str) -> crate::Result<Vec<&str>> {
    let pattern = IMPORT_PATTERN
        .as_ref()
        .map_err(|e| crate::Error::ImportPattern { source: e.clone() })?;
    Ok(pattern
        .captures_iter(source)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .collect())
}

/// Local file a (rewritten) specifier points at, if any.
///
/// Relative specifiers resolve against `dir`; absolute ones are taken as-is;
/// bare and remote specifiers, and paths without an extension, are ignored.
fn resolve_specifier(dir: &Path, specifier: &str) -> Option<PathBuf> {
    let path = if specifier.starts_with("./") || specifier.starts_with("../") {
        dir.join(specifier)
    } else if specifier.starts_with('/') {
        PathBuf::from(specifier)
    } else {
        return None;
    };
    path.extension()?;
    Some(clean(&path))
}

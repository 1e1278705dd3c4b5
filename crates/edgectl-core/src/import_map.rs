//! Import maps: `import_map.json`, `deno.json` and `deno.jsonc`.
//!
//! Only the top-level `imports` table is honoured. Values starting with `./`
//! or `../` are resolved against the directory of the file that declares them,
//! so a rewritten specifier is either an absolute path or a remote/bare module.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::paths::{clean, to_posix};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportMap {
    imports: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct RawImportMap {
    #[serde(default)]
    imports: BTreeMap<String, String>,
    /// `deno.json` may point at a separate import map instead of inlining one.
    #[serde(rename = "importMap")]
    import_map: Option<String>,
}

impl ImportMap {
    pub fn new(imports: BTreeMap<String, String>) -> Self {
        Self { imports }
    }

    /// Load an import map from disk, following a `deno.json` `importMap`
    /// redirect once.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let raw = read_raw(path)?;
        let base_dir = path.parent().unwrap_or(Path::new("."));
        match raw.import_map {
            Some(target) if raw.imports.is_empty() => {
                let target = clean(&base_dir.join(target));
                tracing::debug!(from = %path.display(), to = %target.display(), "following importMap");
                let redirected = read_raw(&target)?;
                let target_dir = target.parent().unwrap_or(Path::new("."));
                Ok(Self::resolved(redirected.imports, target_dir))
            }
            _ => Ok(Self::resolved(raw.imports, base_dir)),
        }
    }

    /// Parse import map JSON (comments allowed) declared in `base_dir`.
    pub fn parse(data: &str, base_dir: &Path) -> Result<Self, serde_json::Error> {
        let raw: RawImportMap = serde_json::from_str(&strip_jsonc(data))?;
        Ok(Self::resolved(raw.imports, base_dir))
    }

    fn resolved(imports: BTreeMap<String, String>, base_dir: &Path) -> Self {
        let imports = imports
            .into_iter()
            .map(|(key, value)| {
                let value = if value.starts_with("./") || value.starts_with("../") {
                    let mut resolved = to_posix(&clean(&base_dir.join(&value)));
                    if value.ends_with('/') && !resolved.ends_with('/') {
                        resolved.push('/');
                    }
                    resolved
                } else {
                    value
                };
                (key, value)
            })
            .collect();
        Self { imports }
    }

    pub fn is_empty(&self) -> bool {
        self.imports.is_empty()
    }

    pub fn imports(&self) -> &BTreeMap<String, String> {
        &self.imports
    }

    /// Rewrite `specifier` using the longest matching prefix key.
    pub fn rewrite(&self, specifier: &str) -> String {
        let best = self
            .imports
            .iter()
            .filter(|(key, _)| specifier.starts_with(key.as_str()))
            .max_by_key(|(key, _)| key.len());
        match best {
            Some((key, value)) => format!("{value}{}", &specifier[key.len()..]),
            None => specifier.to_owned(),
        }
    }
}

fn read_raw(path: &Path) -> crate::Result<RawImportMap> {
    let data = std::fs::read_to_string(path).map_err(|e| crate::Error::ImportMapRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&strip_jsonc(&data)).map_err(|e| crate::Error::ImportMapParse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Strip `//` and `/* */` comments and trailing commas so JSONC parses as JSON.
///
/// String literals are copied verbatim, including escaped quotes.
pub fn strip_jsonc(input: &str) -> String {
    let without_comments = strip_comments(input);
    strip_trailing_commas(&without_comments)
}

fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match (c, chars.peek().copied()) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

fn strip_trailing_commas(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if c == '\\' {
                if let Some(&escaped) = chars.get(i + 1) {
                    out.push(escaped);
                    i += 1;
                }
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        if c == '"' {
            in_string = true;
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
            if matches!(next, Some('}' | ']')) {
                i += 1;
                continue;
            }
        }
        out.push(c);
        i += 1;
    }
    out
}

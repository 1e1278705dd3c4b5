use std::path::{Component, Path, PathBuf};

/// Directory under the working directory holding `config.toml` and `functions/`.
pub const PROJECT_DIR: &str = "supabase";
pub const FUNCTIONS_DIR: &str = "functions";
pub const CONFIG_FILE: &str = "config.toml";
pub const DEFAULT_ENTRYPOINT: &str = "index.ts";
pub const FALLBACK_IMPORT_MAP: &str = "import_map.json";

/// Resolved on-disk layout of a project.
///
/// All paths are absolute and lexically clean so they can be compared and
/// prefix-matched without touching the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    pub workdir: PathBuf,
    pub project_dir: PathBuf,
    pub functions_dir: PathBuf,
}

impl ProjectLayout {
    /// Build a layout rooted at `workdir`, made absolute against the process
    /// working directory when relative.
    pub fn discover(workdir: &Path) -> std::io::Result<Self> {
        Ok(Self::new(std::path::absolute(workdir)?))
    }

    pub fn new(workdir: PathBuf) -> Self {
        let workdir = clean(&workdir);
        let project_dir = workdir.join(PROJECT_DIR);
        let functions_dir = project_dir.join(FUNCTIONS_DIR);
        Self {
            workdir,
            project_dir,
            functions_dir,
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.project_dir.join(CONFIG_FILE)
    }

    /// Project-wide import map used when a function has none of its own.
    pub fn fallback_import_map(&self) -> PathBuf {
        self.project_dir.join(FALLBACK_IMPORT_MAP)
    }

    /// File written by `link` holding the remote project ref.
    pub fn project_ref_path(&self) -> PathBuf {
        self.project_dir.join(".temp").join("project-ref")
    }

    pub fn function_dir(&self, slug: &str) -> PathBuf {
        self.functions_dir.join(slug)
    }

    pub fn default_entrypoint(&self, slug: &str) -> PathBuf {
        self.function_dir(slug).join(DEFAULT_ENTRYPOINT)
    }

    /// Resolve a user supplied path against the working directory.
    pub fn absolute(&self, path: &Path) -> PathBuf {
        clean(&self.workdir.join(path))
    }

    /// Resolve a path from `config.toml`, which is relative to the project dir.
    pub fn from_config(&self, path: &str) -> PathBuf {
        clean(&self.project_dir.join(path))
    }

    /// POSIX form of `path`, relative to the working directory when inside it.
    ///
    /// This is the form used for deploy metadata and multipart file names.
    pub fn display_path(&self, path: &Path) -> String {
        match path.strip_prefix(&self.workdir) {
            Ok(relative) if !relative.as_os_str().is_empty() => to_posix(relative),
            _ => to_posix(path),
        }
    }
}

/// Lexically normalise a path: drop `.`, fold `..` into its parent.
///
/// Never touches the filesystem, so symlinks are not resolved.
pub fn clean(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().collect()
}

/// Forward-slash rendering of a path regardless of host OS.
pub fn to_posix(path: &Path) -> String {
    let rendered = path.to_string_lossy();
    if cfg!(windows) {
        rendered.replace('\\', "/")
    } else {
        rendered.into_owned()
    }
}

/// Path of a host file inside a container that bind-mounts it at the same
/// location: the drive prefix is dropped and separators become `/`.
pub fn to_container_path(path: &Path) -> String {
    let mut out = String::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) => {}
            Component::RootDir => out.push('/'),
            Component::CurDir => {}
            Component::ParentDir => {
                push_segment(&mut out, "..");
            }
            Component::Normal(segment) => push_segment(&mut out, &segment.to_string_lossy()),
        }
    }
    out
}

fn push_segment(out: &mut String, segment: &str) {
    if !out.is_empty() && !out.ends_with('/') {
        out.push('/');
    }
    out.push_str(segment);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_folds_parent_and_current() {
        assert_eq!(
            clean(Path::new("/a/b/./../c/index.ts")),
            PathBuf::from("/a/c/index.ts")
        );
    }

    #[test]
    fn clean_keeps_leading_parent_on_relative() {
        assert_eq!(clean(Path::new("../x/../y")), PathBuf::from("../y"));
    }

    #[test]
    fn clean_does_not_escape_root() {
        assert_eq!(clean(Path::new("/../etc")), PathBuf::from("/etc"));
    }

    #[test]
    fn clean_empty_is_dot() {
        assert_eq!(clean(Path::new("a/..")), PathBuf::from("."));
    }

    #[test]
    fn display_path_is_relative_inside_workdir() {
        let layout = ProjectLayout::new(PathBuf::from("/work"));
        assert_eq!(
            layout.display_path(&layout.default_entrypoint("hello")),
            "supabase/functions/hello/index.ts"
        );
    }

    #[test]
    fn display_path_is_absolute_outside_workdir() {
        let layout = ProjectLayout::new(PathBuf::from("/work"));
        assert_eq!(
            layout.display_path(Path::new("/shared/lib.ts")),
            "/shared/lib.ts"
        );
    }

    #[test]
    fn config_paths_resolve_against_project_dir() {
        let layout = ProjectLayout::new(PathBuf::from("/work"));
        assert_eq!(
            layout.from_config("./functions/a/deno.json"),
            PathBuf::from("/work/supabase/functions/a/deno.json")
        );
    }

    #[cfg(unix)]
    #[test]
    fn container_path_matches_host_path() {
        assert_eq!(
            to_container_path(Path::new("/home/me/app/supabase/functions")),
            "/home/me/app/supabase/functions"
        );
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn clean_is_idempotent(segments in proptest::collection::vec("(\\.|\\.\\.|[a-z]{1,6})", 0..8)) {
                let raw = format!("/{}", segments.join("/"));
                let once = clean(Path::new(&raw));
                prop_assert_eq!(clean(&once), once.clone());
            }

            #[test]
            fn clean_output_has_no_dot_segments(segments in proptest::collection::vec("(\\.|\\.\\.|[a-z]{1,6})", 0..8)) {
                let raw = format!("/{}", segments.join("/"));
                let cleaned = clean(Path::new(&raw));
                prop_assert!(cleaned.components().all(|c| !matches!(c, Component::CurDir | Component::ParentDir)));
            }
        }
    }
}

use serde::{Deserialize, Serialize};

use crate::function::Function;
use crate::paths::ProjectLayout;

/// Record uploaded in the `metadata` part of a deploy request.
///
/// Paths are POSIX-style and relative to the working directory when they
/// live under it, so the same function deploys identically from any host OS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployMetadata {
    #[serde(rename = "name")]
    pub slug: String,
    pub entrypoint_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_map_path: Option<String>,
    pub verify_jwt: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub static_patterns: Vec<String>,
}

impl DeployMetadata {
    pub fn for_function(slug: &str, function: &Function, layout: &ProjectLayout) -> Self {
        Self {
            slug: slug.to_owned(),
            entrypoint_path: layout.display_path(&function.entrypoint),
            import_map_path: function
                .import_map
                .as_deref()
                .map(|path| layout.display_path(path)),
            verify_jwt: function.verify_jwt,
            static_patterns: function
                .static_files
                .iter()
                .map(|pattern| layout.display_path(std::path::Path::new(pattern)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn function() -> Function {
        Function {
            enabled: true,
            entrypoint: PathBuf::from("/w/supabase/functions/hello/index.ts"),
            import_map: Some(PathBuf::from("/w/supabase/functions/hello/deno.json")),
            verify_jwt: false,
            static_files: vec!["/w/supabase/functions/hello/assets/*.html".to_owned()],
        }
    }

    #[test]
    fn paths_are_relative_to_workdir() {
        let layout = ProjectLayout::new(PathBuf::from("/w"));
        let meta = DeployMetadata::for_function("hello", &function(), &layout);

        assert_eq!(meta.slug, "hello");
        assert_eq!(meta.entrypoint_path, "supabase/functions/hello/index.ts");
        assert_eq!(
            meta.import_map_path.as_deref(),
            Some("supabase/functions/hello/deno.json")
        );
        assert_eq!(
            meta.static_patterns,
            vec!["supabase/functions/hello/assets/*.html"]
        );
        assert!(!meta.verify_jwt);
    }

    #[test]
    fn json_uses_api_field_names() {
        let layout = ProjectLayout::new(PathBuf::from("/w"));
        let meta = DeployMetadata::for_function("hello", &function(), &layout);
        let json: serde_json::Value = serde_json::to_value(&meta).unwrap();

        assert_eq!(json["name"], "hello");
        assert_eq!(json["entrypoint_path"], "supabase/functions/hello/index.ts");
        assert_eq!(json["verify_jwt"], false);
    }

    #[test]
    fn json_omits_absent_import_map() {
        let layout = ProjectLayout::new(PathBuf::from("/w"));
        let mut f = function();
        f.import_map = None;
        f.static_files.clear();
        let json = serde_json::to_string(&DeployMetadata::for_function("a", &f, &layout)).unwrap();

        assert!(!json.contains("import_map_path"));
        assert!(!json.contains("static_patterns"));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn json_roundtrip_preserves_fields(
                slug in "[A-Za-z0-9_-]{1,32}",
                entry in "[a-z/]{1,40}\\.ts",
                import_map in proptest::option::of("[a-z/]{1,40}\\.json"),
                verify_jwt in any::<bool>(),
                statics in proptest::collection::vec("[a-z/*]{1,20}", 0..4),
            ) {
                let meta = DeployMetadata {
                    slug,
                    entrypoint_path: entry,
                    import_map_path: import_map,
                    verify_jwt,
                    static_patterns: statics,
                };
                let json = serde_json::to_string(&meta).unwrap();
                let parsed: DeployMetadata = serde_json::from_str(&json).unwrap();
                prop_assert_eq!(parsed, meta);
            }
        }
    }
}

use std::path::{Path, PathBuf};

use edgectl_core::{
    Error, FunctionEntry, ProjectConfig, ProjectLayout, ResolveOptions, resolve_functions,
};
use tempfile::TempDir;

fn project() -> (TempDir, ProjectLayout) {
    let tmp = TempDir::new().unwrap();
    let layout = ProjectLayout::new(tmp.path().to_path_buf());
    std::fs::create_dir_all(&layout.functions_dir).unwrap();
    (tmp, layout)
}

fn add_function(layout: &ProjectLayout, slug: &str) -> PathBuf {
    let dir = layout.function_dir(slug);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("index.ts"), "Deno.serve(() => new Response('ok'))").unwrap();
    dir
}

fn touch(path: &Path) {
    std::fs::write(path, r#"{ "imports": {} }"#).unwrap();
}

fn slugs(options: &[&str]) -> ResolveOptions {
    ResolveOptions {
        slugs: options.iter().map(|s| (*s).to_owned()).collect(),
        ..Default::default()
    }
}

// ── Discovery ──

#[test]
fn discovers_directories_with_entrypoint() {
    let (_tmp, layout) = project();
    add_function(&layout, "hello");
    add_function(&layout, "world");
    // No entrypoint, not a function
    std::fs::create_dir_all(layout.function_dir("_shared")).unwrap();

    let functions =
        resolve_functions(&layout, &ProjectConfig::default(), &ResolveOptions::default()).unwrap();

    assert_eq!(functions.keys().collect::<Vec<_>>(), vec!["hello", "world"]);
}

#[test]
fn discovery_skips_invalid_directory_names() {
    let (_tmp, layout) = project();
    add_function(&layout, "ok");
    add_function(&layout, "not ok");

    let functions =
        resolve_functions(&layout, &ProjectConfig::default(), &ResolveOptions::default()).unwrap();

    assert_eq!(functions.keys().collect::<Vec<_>>(), vec!["ok"]);
}

#[test]
fn discovery_includes_config_only_functions() {
    let (_tmp, layout) = project();
    add_function(&layout, "local");
    let mut config = ProjectConfig::default();
    config.functions.insert(
        "remote-only".to_owned(),
        FunctionEntry {
            entrypoint: Some("../elsewhere/main.ts".to_owned()),
            ..Default::default()
        },
    );

    let functions = resolve_functions(&layout, &config, &ResolveOptions::default()).unwrap();

    assert_eq!(
        functions.keys().collect::<Vec<_>>(),
        vec!["local", "remote-only"]
    );
    assert_eq!(
        functions["remote-only"].entrypoint,
        layout.workdir.join("elsewhere/main.ts")
    );
}

#[test]
fn empty_project_is_nothing_to_deploy() {
    let (_tmp, layout) = project();
    let err = resolve_functions(&layout, &ProjectConfig::default(), &ResolveOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::NothingToDeploy { .. }));
}

#[test]
fn missing_functions_dir_is_nothing_to_deploy() {
    let tmp = TempDir::new().unwrap();
    let layout = ProjectLayout::new(tmp.path().to_path_buf());
    let err = resolve_functions(&layout, &ProjectConfig::default(), &ResolveOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::NothingToDeploy { .. }));
}

#[test]
fn explicit_invalid_slug_is_rejected() {
    let (_tmp, layout) = project();
    let err = resolve_functions(&layout, &ProjectConfig::default(), &slugs(&["bad slug"]))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidSlug { ref slug } if slug == "bad slug"));
}

#[test]
fn explicit_slugs_restrict_selection() {
    let (_tmp, layout) = project();
    add_function(&layout, "a");
    add_function(&layout, "b");

    let functions =
        resolve_functions(&layout, &ProjectConfig::default(), &slugs(&["b"])).unwrap();

    assert_eq!(functions.keys().collect::<Vec<_>>(), vec!["b"]);
    assert_eq!(functions["b"].entrypoint, layout.default_entrypoint("b"));
}

// ── Import map precedence ──

#[test]
fn deno_json_wins_over_legacy_import_map() {
    let (_tmp, layout) = project();
    let dir = add_function(&layout, "hello");
    touch(&dir.join("deno.json"));
    touch(&dir.join("import_map.json"));

    let functions =
        resolve_functions(&layout, &ProjectConfig::default(), &slugs(&["hello"])).unwrap();

    assert_eq!(functions["hello"].import_map, Some(dir.join("deno.json")));
}

#[test]
fn deno_jsonc_is_used_without_deno_json() {
    let (_tmp, layout) = project();
    let dir = add_function(&layout, "hello");
    touch(&dir.join("deno.jsonc"));

    let functions =
        resolve_functions(&layout, &ProjectConfig::default(), &slugs(&["hello"])).unwrap();

    assert_eq!(functions["hello"].import_map, Some(dir.join("deno.jsonc")));
}

#[test]
fn legacy_import_map_is_used_last_among_siblings() {
    let (_tmp, layout) = project();
    let dir = add_function(&layout, "hello");
    touch(&dir.join("import_map.json"));

    let functions =
        resolve_functions(&layout, &ProjectConfig::default(), &slugs(&["hello"])).unwrap();

    assert_eq!(
        functions["hello"].import_map,
        Some(dir.join("import_map.json"))
    );
}

#[test]
fn fallback_import_map_applies_when_function_has_none() {
    let (_tmp, layout) = project();
    add_function(&layout, "hello");
    touch(&layout.fallback_import_map());

    let functions =
        resolve_functions(&layout, &ProjectConfig::default(), &slugs(&["hello"])).unwrap();

    assert_eq!(
        functions["hello"].import_map,
        Some(layout.fallback_import_map())
    );
}

#[test]
fn no_import_map_anywhere_is_none() {
    let (_tmp, layout) = project();
    add_function(&layout, "hello");

    let functions =
        resolve_functions(&layout, &ProjectConfig::default(), &slugs(&["hello"])).unwrap();

    assert!(functions["hello"].import_map.is_none());
}

#[test]
fn config_import_map_beats_sibling_files() {
    let (_tmp, layout) = project();
    let dir = add_function(&layout, "hello");
    touch(&dir.join("deno.json"));
    let mut config = ProjectConfig::default();
    config.functions.insert(
        "hello".to_owned(),
        FunctionEntry {
            import_map: Some("./custom_map.json".to_owned()),
            ..Default::default()
        },
    );

    let functions = resolve_functions(&layout, &config, &slugs(&["hello"])).unwrap();

    assert_eq!(
        functions["hello"].import_map,
        Some(layout.project_dir.join("custom_map.json"))
    );
}

#[test]
fn flag_import_map_beats_config() {
    let (_tmp, layout) = project();
    add_function(&layout, "hello");
    let mut config = ProjectConfig::default();
    config.functions.insert(
        "hello".to_owned(),
        FunctionEntry {
            import_map: Some("./custom_map.json".to_owned()),
            ..Default::default()
        },
    );
    let options = ResolveOptions {
        import_map: Some(PathBuf::from("maps/flag.json")),
        ..slugs(&["hello"])
    };

    let functions = resolve_functions(&layout, &config, &options).unwrap();

    assert_eq!(
        functions["hello"].import_map,
        Some(layout.workdir.join("maps/flag.json"))
    );
}

// ── verify_jwt, enabled, static files ──

#[test]
fn verify_jwt_defaults_to_true() {
    let (_tmp, layout) = project();
    add_function(&layout, "hello");

    let functions =
        resolve_functions(&layout, &ProjectConfig::default(), &slugs(&["hello"])).unwrap();

    assert!(functions["hello"].verify_jwt);
    assert!(functions["hello"].enabled);
}

#[test]
fn verify_jwt_flag_overrides_config_both_ways() {
    let (_tmp, layout) = project();
    add_function(&layout, "open");
    add_function(&layout, "closed");
    let mut config = ProjectConfig::default();
    config.functions.insert(
        "open".to_owned(),
        FunctionEntry {
            verify_jwt: Some(false),
            ..Default::default()
        },
    );
    config.functions.insert(
        "closed".to_owned(),
        FunctionEntry {
            verify_jwt: Some(true),
            ..Default::default()
        },
    );

    let keep = resolve_functions(&layout, &config, &ResolveOptions::default()).unwrap();
    assert!(!keep["open"].verify_jwt);
    assert!(keep["closed"].verify_jwt);

    let forced_on = ResolveOptions {
        verify_jwt: Some(true),
        ..Default::default()
    };
    let on = resolve_functions(&layout, &config, &forced_on).unwrap();
    assert!(on["open"].verify_jwt);

    let forced_off = ResolveOptions {
        verify_jwt: Some(false),
        ..Default::default()
    };
    let off = resolve_functions(&layout, &config, &forced_off).unwrap();
    assert!(!off["closed"].verify_jwt);
}

#[test]
fn disabled_and_static_files_come_from_config() {
    let (_tmp, layout) = project();
    add_function(&layout, "hello");
    let mut config = ProjectConfig::default();
    config.functions.insert(
        "hello".to_owned(),
        FunctionEntry {
            enabled: Some(false),
            static_files: vec!["./functions/hello/*.html".to_owned()],
            ..Default::default()
        },
    );

    let functions = resolve_functions(&layout, &config, &slugs(&["hello"])).unwrap();

    let hello = &functions["hello"];
    assert!(!hello.enabled);
    assert_eq!(
        hello.static_files,
        vec![edgectl_core::paths::to_posix(
            &layout.function_dir("hello").join("*.html")
        )]
    );
}

use std::io::Write;
use std::path::Path;

use edgectl_core::paths::DEFAULT_ENTRYPOINT;
use edgectl_core::{ProjectConfig, ProjectLayout, validate_slug};

const INDEX_TS: &str = r#"// Setup type definitions for built-in runtime APIs
import "jsr:@supabase/functions-js/edge-runtime.d.ts";

Deno.serve(async (req) => {
  const { name } = await req.json();
  const data = {
    message: `Hello ${name}!`,
  };

  return new Response(JSON.stringify(data), {
    headers: { "Content-Type": "application/json" },
  });
});
"#;

const DENO_JSON: &str = r#"{
  "imports": {}
}
"#;

/// Scaffold a function directory and register it in `config.toml`.
pub fn new_function(workdir: &Path, slug: &str) -> anyhow::Result<()> {
    validate_slug(slug)?;
    let layout = ProjectLayout::discover(workdir)?;

    let dir = layout.function_dir(slug);
    let entrypoint = dir.join(DEFAULT_ENTRYPOINT);
    if entrypoint.exists() {
        anyhow::bail!("function '{slug}' already exists at {}", entrypoint.display());
    }

    std::fs::create_dir_all(&dir)?;
    std::fs::write(&entrypoint, INDEX_TS)?;
    let deno_json = dir.join("deno.json");
    if !deno_json.exists() {
        std::fs::write(&deno_json, DENO_JSON)?;
    }

    let registered = register_in_config(&layout, slug)?;

    println!("Created new Function at {}", layout.display_path(&dir));
    if registered {
        println!("Added [functions.{slug}] to {}", layout.display_path(&layout.config_path()));
    }
    Ok(())
}

/// Append a `[functions.<slug>]` table when `config.toml` exists and does
/// not already have one. Returns whether the file was changed.
fn register_in_config(layout: &ProjectLayout, slug: &str) -> anyhow::Result<bool> {
    let path = layout.config_path();
    if !path.exists() {
        return Ok(false);
    }
    let config = ProjectConfig::load(&layout.project_dir)?;
    if config.functions.contains_key(slug) {
        return Ok(false);
    }

    let mut file = std::fs::OpenOptions::new().append(true).open(&path)?;
    write!(file, "{}", function_table(slug))?;
    Ok(true)
}

fn function_table(slug: &str) -> String {
    format!(
        r#"
[functions.{slug}]
enabled = true
verify_jwt = true
import_map = "./functions/{slug}/deno.json"
# Uncomment to specify a custom file path to the entrypoint.
# entrypoint = "./functions/{slug}/index.ts"
# Files shipped alongside the function, e.g. ["./functions/{slug}/*.html"]
static_files = []
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_table_parses_back() {
        let config: ProjectConfig = toml::from_str(&function_table("hello")).unwrap();
        let entry = &config.functions["hello"];
        assert_eq!(entry.enabled, Some(true));
        assert_eq!(entry.verify_jwt, Some(true));
        assert_eq!(
            entry.import_map.as_deref(),
            Some("./functions/hello/deno.json")
        );
        assert!(entry.entrypoint.is_none());
    }
}

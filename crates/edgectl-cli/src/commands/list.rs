use std::path::Path;

use edgectl_cloud::{FunctionStatus, FunctionsApi, RemoteFunction};
use edgectl_core::{CancelToken, ProjectLayout};

use super::Remote;

/// Print the functions deployed to the project.
pub async fn list(workdir: &Path, remote: &Remote, cancel: CancelToken) -> anyhow::Result<()> {
    let layout = ProjectLayout::discover(workdir)?;
    let project_ref = remote.project_ref(&layout)?;
    let client = remote.client(&project_ref, cancel)?;

    let functions = client.list_functions().await?;
    print!("{}", render_table(&functions));
    Ok(())
}

fn status_label(status: &FunctionStatus) -> &'static str {
    match status {
        FunctionStatus::Active => "ACTIVE",
        FunctionStatus::Removed => "REMOVED",
        FunctionStatus::Throttled => "THROTTLED",
        FunctionStatus::Unknown => "UNKNOWN",
    }
}

fn render_table(functions: &[RemoteFunction]) -> String {
    let rows: Vec<[String; 5]> = functions
        .iter()
        .map(|f| {
            [
                f.slug.clone(),
                f.name.clone(),
                status_label(&f.status).to_owned(),
                f.version.to_string(),
                f.updated_at.map(|t| t.to_string()).unwrap_or_default(),
            ]
        })
        .collect();

    let header = ["SLUG", "NAME", "STATUS", "VERSION", "UPDATED_AT"];
    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &header.map(str::to_owned), &widths);
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row(out: &mut String, cells: &[String; 5], widths: &[usize; 5]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}

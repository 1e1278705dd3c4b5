use std::path::Path;

use edgectl_cloud::{DeleteOutcome, FunctionsApi};
use edgectl_core::{CancelToken, ProjectLayout, validate_slug};

use super::Remote;

/// Delete one function from the project.
pub async fn delete(
    workdir: &Path,
    remote: &Remote,
    slug: &str,
    cancel: CancelToken,
) -> anyhow::Result<()> {
    validate_slug(slug)?;
    let layout = ProjectLayout::discover(workdir)?;
    let project_ref = remote.project_ref(&layout)?;
    let client = remote.client(&project_ref, cancel)?;

    match client.delete_function(slug).await? {
        DeleteOutcome::Deleted => {
            println!("Deleted Function {slug} from project {project_ref}.");
            Ok(())
        }
        DeleteOutcome::NotFound => {
            anyhow::bail!("Function {slug} does not exist on project {project_ref}")
        }
    }
}

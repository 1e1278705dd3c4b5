mod delete;
mod deploy;
mod deploy_pipeline;
mod list;
mod new;

use std::io::Write;

use anyhow::Context;
use edgectl_cloud::FunctionsClient;
use edgectl_core::{CancelToken, ProjectLayout};
use secrecy::SecretString;

pub use delete::delete;
pub use deploy::{DeployArgs, deploy};
pub use list::list;
pub use new::new_function;

/// Remote API settings shared by every command that talks to the server.
pub struct Remote {
    pub project_ref: Option<String>,
    pub token: Option<String>,
    pub api_url: String,
}

impl Remote {
    /// Project ref from the flag or environment, else the one saved by a
    /// previous link.
    pub(crate) fn project_ref(&self, layout: &ProjectLayout) -> anyhow::Result<String> {
        if let Some(project_ref) = self.project_ref.as_deref().map(str::trim) {
            if !project_ref.is_empty() {
                return Ok(project_ref.to_owned());
            }
        }
        let path = layout.project_ref_path();
        let saved = match std::fs::read_to_string(&path) {
            Ok(saved) => saved,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()));
            }
        };
        let saved = saved.trim();
        if saved.is_empty() {
            anyhow::bail!(
                "project ref not set.\n\
                 Pass --project-ref, set EDGECTL_PROJECT_REF, or write it to {}",
                path.display()
            );
        }
        Ok(saved.to_owned())
    }

    pub(crate) fn client(
        &self,
        project_ref: &str,
        cancel: CancelToken,
    ) -> anyhow::Result<FunctionsClient> {
        let token = match self.token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => token.to_owned(),
            _ => anyhow::bail!(
                "access token not set. Pass --token or set EDGECTL_ACCESS_TOKEN"
            ),
        };
        Ok(FunctionsClient::new(
            &self.api_url,
            project_ref,
            SecretString::from(token),
            cancel,
        )?)
    }
}

/// Ask a yes/no question on stdin. Anything but an explicit yes is a no.
pub(crate) fn confirm(question: &str) -> std::io::Result<bool> {
    print!("{question} [y/N] ");
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(matches!(input.trim(), "y" | "Y" | "yes" | "YES"))
}

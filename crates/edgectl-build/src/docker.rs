//! Thin wrapper over the Docker daemon for one-shot containers.

use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use futures::StreamExt;

use crate::BundleError;

/// Result of running a container to completion.
#[derive(Debug)]
pub struct ContainerExit {
    pub code: i64,
    /// Captured stderr, kept for error reports
    pub stderr: String,
}

#[derive(Debug, Clone)]
pub struct DockerClient {
    docker: Docker,
}

impl DockerClient {
    /// Connect to the local daemon and check that it answers.
    pub async fn connect() -> Result<Self, BundleError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| BundleError::docker("failed to connect to Docker", e))?;
        docker
            .ping()
            .await
            .map_err(|e| BundleError::docker("Docker daemon is not reachable", e))?;
        Ok(Self { docker })
    }

    /// Pull `image` unless it is already present.
    pub async fn ensure_image(&self, image: &str) -> Result<(), BundleError> {
        match self.docker.inspect_image(image).await {
            Ok(_) => {
                tracing::debug!(image, "image available locally");
                return Ok(());
            }
            Err(e) => tracing::debug!(image, "image not available locally: {e}"),
        }

        tracing::info!(image, "pulling image");
        let mut stream = self.docker.create_image(
            Some(CreateImageOptions {
                from_image: image.to_owned(),
                ..Default::default()
            }),
            None,
            None,
        );
        while let Some(progress) = stream.next().await {
            let progress =
                progress.map_err(|e| BundleError::docker(format!("failed to pull {image}"), e))?;
            if let Some(status) = progress.status {
                tracing::trace!(status, "image pull");
            }
        }
        Ok(())
    }

    /// Create, start and wait for a container, then remove it.
    ///
    /// The container is removed on every exit path, including when the
    /// returned future is dropped mid-run by the caller's cancellation.
    pub async fn run_to_completion(
        &self,
        name: &str,
        config: Config<String>,
    ) -> Result<ContainerExit, BundleError> {
        let created = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: name.to_owned(),
                    ..Default::default()
                }),
                config,
            )
            .await
            .map_err(|e| BundleError::docker("failed to create container", e))?;
        let guard = RemoveOnDrop {
            docker: self.docker.clone(),
            id: Some(created.id.clone()),
        };

        let result = self.start_and_wait(&created.id).await;
        guard.remove().await;
        result
    }

    async fn start_and_wait(&self, id: &str) -> Result<ContainerExit, BundleError> {
        tracing::debug!(container = id, "starting container");
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| BundleError::docker("failed to start container", e))?;

        let mut logs = self.docker.logs(
            id,
            Some(LogsOptions::<String> {
                follow: true,
                stdout: true,
                stderr: true,
                ..Default::default()
            }),
        );
        let mut stderr = String::new();
        while let Some(line) = logs.next().await {
            match line {
                Ok(LogOutput::StdErr { message }) => {
                    let text = String::from_utf8_lossy(&message);
                    tracing::debug!(container = id, "{}", text.trim_end());
                    stderr.push_str(&text);
                }
                Ok(other) => tracing::debug!(container = id, "{}", other.to_string().trim_end()),
                Err(e) => {
                    tracing::warn!(container = id, "log stream ended: {e}");
                    break;
                }
            }
        }

        let mut wait = self.docker.wait_container(
            id,
            Some(WaitContainerOptions {
                condition: "not-running",
            }),
        );
        let code = match wait.next().await {
            Some(Ok(response)) => response.status_code,
            // Non-zero exits surface as a wait error carrying the code
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => code,
            Some(Err(e)) => return Err(BundleError::docker("failed to wait for container", e)),
            None => return Err(BundleError::NoExitStatus { id: id.to_owned() }),
        };
        tracing::debug!(container = id, code, "container exited");

        Ok(ContainerExit { code, stderr })
    }
}

/// Force-removes a container, asynchronously if dropped before
/// [`RemoveOnDrop::remove`] runs.
struct RemoveOnDrop {
    docker: Docker,
    id: Option<String>,
}

impl RemoveOnDrop {
    async fn remove(mut self) {
        if let Some(id) = self.id.take() {
            remove_container(&self.docker, &id).await;
        }
    }
}

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        let docker = self.docker.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move { remove_container(&docker, &id).await });
        } else {
            tracing::warn!(container = %id, "no runtime to remove container");
        }
    }
}

async fn remove_container(docker: &Docker, id: &str) {
    if let Err(e) = docker
        .remove_container(
            id,
            Some(RemoveContainerOptions {
                force: true,
                ..Default::default()
            }),
        )
        .await
    {
        tracing::warn!(container = id, "failed to remove container: {e}");
    }
}

use std::future::Future;

use async_trait::async_trait;
use edgectl_core::{CancelToken, DeployMetadata};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use url::Url;

use crate::api::{BulkUpdateResponse, DeleteOutcome, FunctionsApi, RemoteFunction, UploadPayload};
use crate::upload::Pipe;
use crate::ApiError;

/// Functions REST client for one project.
pub struct FunctionsClient {
    http: reqwest::Client,
    /// `{api_url}/v1/projects/{ref}/`
    base: Url,
    token: SecretString,
    cancel: CancelToken,
}

impl FunctionsClient {
    /// Requests are aborted as soon as `cancel` fires.
    pub fn new(
        api_url: &str,
        project_ref: &str,
        token: SecretString,
        cancel: CancelToken,
    ) -> Result<Self, ApiError> {
        let invalid = |e| ApiError::InvalidUrl {
            url: api_url.to_owned(),
            source: e,
        };
        let mut root = Url::parse(api_url).map_err(invalid)?;
        if !root.path().ends_with('/') {
            let path = format!("{}/", root.path());
            root.set_path(&path);
        }
        let base = root
            .join(&format!("v1/projects/{project_ref}/"))
            .map_err(invalid)?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("edgectl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::ClientBuild { source: e })?;

        Ok(Self {
            http,
            base,
            token,
            cancel,
        })
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base.join(path).map_err(|e| ApiError::InvalidUrl {
            url: format!("{}{path}", self.base),
            source: e,
        })
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(self.token.expose_secret())
    }

    /// Run `fut` unless the client's token is cancelled first.
    async fn cancellable<T>(
        &self,
        fut: impl Future<Output = Result<T, ApiError>>,
    ) -> Result<T, ApiError> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(ApiError::Cancelled),
            result = fut => result,
        }
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        method: &Method,
        url: &Url,
    ) -> Result<reqwest::Response, ApiError> {
        tracing::debug!(%method, %url, "request");
        builder.send().await.map_err(|e| ApiError::Transport {
            url: url.to_string(),
            source: e,
        })
    }

    async fn upload(
        &self,
        method: Method,
        url: Url,
        metadata: &DeployMetadata,
        payload: UploadPayload,
        expected: StatusCode,
    ) -> Result<RemoteFunction, ApiError> {
        let slug = metadata.slug.clone();
        let json = serde_json::to_string(metadata).map_err(|e| ApiError::Encode {
            slug: slug.clone(),
            source: e,
        })?;

        let ctx = self.cancel.child();
        let pipe = Pipe::new();
        let content_type = pipe.content_type();
        let body = pipe.start(json, payload, slug.clone(), ctx.clone());

        let exchange = async {
            tracing::debug!(%method, %url, function = %slug, "upload");
            let response = self
                .request(method.clone(), url.clone())
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(body)
                .send()
                .await
                .map_err(|e| match ctx.cause() {
                    Some(cause) => ApiError::Upload {
                        slug: slug.clone(),
                        source: cause,
                    },
                    None => ApiError::Transport {
                        url: url.to_string(),
                        source: e,
                    },
                })?;
            expect_json(response, &method, &url, expected).await
        };

        tokio::select! {
            biased;
            () = ctx.cancelled() => Err(match ctx.cause() {
                Some(cause) => ApiError::Upload { slug: slug.clone(), source: cause },
                None => ApiError::Cancelled,
            }),
            result = exchange => result,
        }
    }
}

#[async_trait]
impl FunctionsApi for FunctionsClient {
    async fn get_function(&self, slug: &str) -> Result<Option<RemoteFunction>, ApiError> {
        let url = self.url(&format!("functions/{slug}"))?;
        self.cancellable(async {
            let response = self
                .send(self.request(Method::GET, url.clone()), &Method::GET, &url)
                .await?;
            if response.status() == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            expect_json(response, &Method::GET, &url, StatusCode::OK)
                .await
                .map(Some)
        })
        .await
    }

    async fn create_function(
        &self,
        metadata: &DeployMetadata,
        payload: UploadPayload,
        bundle_only: bool,
    ) -> Result<RemoteFunction, ApiError> {
        let mut url = self.url("functions")?;
        url.query_pairs_mut().append_pair("slug", &metadata.slug);
        if bundle_only {
            url.query_pairs_mut().append_pair("bundle_only", "true");
        }
        self.upload(Method::POST, url, metadata, payload, StatusCode::CREATED)
            .await
    }

    async fn update_function(
        &self,
        metadata: &DeployMetadata,
        payload: UploadPayload,
    ) -> Result<RemoteFunction, ApiError> {
        let url = self.url(&format!("functions/{}", metadata.slug))?;
        self.upload(Method::PATCH, url, metadata, payload, StatusCode::OK)
            .await
    }

    async fn bulk_update(
        &self,
        functions: &[RemoteFunction],
    ) -> Result<Vec<RemoteFunction>, ApiError> {
        let url = self.url("functions")?;
        self.cancellable(async {
            let response = self
                .send(
                    self.request(Method::PUT, url.clone()).json(functions),
                    &Method::PUT,
                    &url,
                )
                .await?;
            let body: BulkUpdateResponse =
                expect_json(response, &Method::PUT, &url, StatusCode::OK).await?;
            Ok(body.functions)
        })
        .await
    }

    async fn list_functions(&self) -> Result<Vec<RemoteFunction>, ApiError> {
        let url = self.url("functions")?;
        self.cancellable(async {
            let response = self
                .send(self.request(Method::GET, url.clone()), &Method::GET, &url)
                .await?;
            expect_json(response, &Method::GET, &url, StatusCode::OK).await
        })
        .await
    }

    async fn delete_function(&self, slug: &str) -> Result<DeleteOutcome, ApiError> {
        let url = self.url(&format!("functions/{slug}"))?;
        self.cancellable(async {
            let response = self
                .send(
                    self.request(Method::DELETE, url.clone()),
                    &Method::DELETE,
                    &url,
                )
                .await?;
            let status = response.status();
            if status == StatusCode::OK {
                Ok(DeleteOutcome::Deleted)
            } else if status == StatusCode::NOT_FOUND {
                Ok(DeleteOutcome::NotFound)
            } else {
                Err(unexpected(response, &Method::DELETE, &url).await)
            }
        })
        .await
    }
}

async fn expect_json<T: DeserializeOwned>(
    response: reqwest::Response,
    method: &Method,
    url: &Url,
    expected: StatusCode,
) -> Result<T, ApiError> {
    if response.status() != expected {
        return Err(unexpected(response, method, url).await);
    }
    response.json().await.map_err(|e| ApiError::Decode {
        url: url.to_string(),
        source: e,
    })
}

/// Build an [`ApiError::UnexpectedStatus`] carrying the body verbatim.
async fn unexpected(response: reqwest::Response, method: &Method, url: &Url) -> ApiError {
    let status = response.status().as_u16();
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => format!("<failed to read body: {e}>"),
    };
    ApiError::UnexpectedStatus {
        method: method.to_string(),
        url: url.to_string(),
        status,
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(api_url: &str) -> FunctionsClient {
        FunctionsClient::new(
            api_url,
            "abcdefghijklmnopqrst",
            SecretString::from("token".to_owned()),
            CancelToken::new(),
        )
        .unwrap()
    }

    #[test]
    fn base_url_includes_project_ref() {
        let c = client("https://api.example.com");
        assert_eq!(
            c.url("functions/hello").unwrap().as_str(),
            "https://api.example.com/v1/projects/abcdefghijklmnopqrst/functions/hello"
        );
    }

    #[test]
    fn api_url_path_prefix_is_kept() {
        let c = client("http://127.0.0.1:9000/proxy");
        assert_eq!(
            c.url("functions").unwrap().as_str(),
            "http://127.0.0.1:9000/proxy/v1/projects/abcdefghijklmnopqrst/functions"
        );
    }

    #[test]
    fn invalid_api_url_is_rejected() {
        let err = FunctionsClient::new(
            "not a url",
            "ref",
            SecretString::from("t".to_owned()),
            CancelToken::new(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, ApiError::InvalidUrl { .. }));
    }
}

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use url::Url;

use super::{ApiError, ApiRequest, Method, RawResponse, RequestBody, Transport};
use crate::config::ApiOptions;
use crate::form::Submission;

/// `reqwest`-backed transport rooted at the configured base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(options: &ApiOptions) -> Result<Self> {
        let base_url = Url::parse(&options.base_url)
            .with_context(|| format!("parsing api base url {}", options.base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("api base url {} cannot carry a path", options.base_url);
        }
        let mut builder = reqwest::Client::builder().user_agent(options.user_agent.clone());
        if let Some(secs) = options.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build().context("building http client")?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url_for(&self, segments: &[String]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Network(format!("invalid base url {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

fn multipart_form(submission: Submission) -> Result<Form, ApiError> {
    let mut form = Form::new();
    for (name, value) in submission.fields {
        form = form.text(name, value);
    }
    for part in submission.files {
        let file = part.file;
        let mut body = Part::bytes(file.bytes).file_name(file.name.clone());
        if let Some(content_type) = file.content_type.as_deref() {
            body = body.mime_str(content_type).map_err(|err| {
                ApiError::Network(format!("invalid content type for {}: {err}", file.name))
            })?;
        }
        form = form.part(part.field, body);
    }
    Ok(form)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, ApiError> {
        let url = self.url_for(&request.segments)?;
        tracing::debug!(method = %request.method, %url, "sending api request");

        let mut builder = match request.method {
            Method::Get => self.http.get(url.clone()),
            Method::Post => self.http.post(url.clone()),
            Method::Put => self.http.put(url.clone()),
            Method::Delete => self.http.delete(url.clone()),
        };
        if let Some(token) = request.bearer.as_deref() {
            builder = builder.bearer_auth(token);
        }
        if let RequestBody::Multipart(submission) = request.body {
            builder = builder.multipart(multipart_form(submission)?);
        }

        let response = builder.send().await.map_err(|err| {
            tracing::warn!(%url, error = %err, "api request failed before a response");
            ApiError::Network(err.to_string())
        })?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| ApiError::Network(err.to_string()))?;
        tracing::debug!(%url, status, bytes = body.len(), "api response received");
        Ok(RawResponse { status, body })
    }
}

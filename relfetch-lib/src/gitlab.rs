use crate::download_client::{AssetStream, DownloadClient};
use crate::error::{ReleaseError, TransportError};
use crate::logging::spinner_style;
use crate::parser::parse_releases;
use crate::release::Release;
use anyhow::{Context, Result};
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, HeaderValue};
use reqwest::{Client, RequestBuilder, StatusCode, redirect};
use tracing::instrument;
use tracing_indicatif::span_ext::IndicatifSpanExt;

pub const TOKEN_HEADER: &str = "PRIVATE-TOKEN";
const MAX_REDIRECTS: usize = 10;

/// Talks to a GitLab v4 API over HTTPS.
#[derive(Clone)]
pub struct GitLabClient {
    client: Client,
}

impl GitLabClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("relfetch/", env!("CARGO_PKG_VERSION")))
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }

    fn get(&self, url: &str, credential: &str) -> RequestBuilder {
        let request = self.client.get(url);
        if credential.is_empty() {
            request
        } else {
            request.header(TOKEN_HEADER, credential)
        }
    }
}

impl DownloadClient for GitLabClient {
    async fn fetch(&self, endpoint: &str, credential: &str) -> Result<Vec<u8>, TransportError> {
        let response = self
            .get(endpoint, credential)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(TransportError::Status(response.status().as_u16()));
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn open_stream(&self, url: &str, credential: &str) -> Result<AssetStream, TransportError> {
        let response = self.get(url, credential).send().await?;

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }

        let content_length = response.content_length().unwrap_or(0);
        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(TransportError::from))
            .boxed();

        Ok(AssetStream {
            content_length,
            chunks,
        })
    }
}

/// Fetches and parses the release list behind `endpoint`.
///
/// A transport failure and a malformed body are both reported; an empty but
/// well-formed list is `Ok(vec![])`.
#[instrument(skip_all)]
pub async fn fetch_releases<D: DownloadClient>(
    client: &D,
    endpoint: &str,
    credential: &str,
) -> Result<Vec<Release>, ReleaseError> {
    let current_span = tracing::Span::current();
    if let Ok(style) = spinner_style("{msg}") {
        current_span.pb_set_style(&style);
    }
    current_span.pb_set_message("Fetching releases...");
    current_span.pb_set_finish_message("Fetching releases... Done");

    tracing::debug!(endpoint, authenticated = !credential.is_empty(), "requesting releases");
    let body = client.fetch(endpoint, credential).await?;
    let releases = parse_releases(&body)?;
    tracing::debug!(count = releases.len(), "parsed releases");
    Ok(releases)
}

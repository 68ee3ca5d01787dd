use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use thiserror::Error;
use tokio_util::io::ReaderStream;
use tracing::debug;
use url::Url;

use crate::response::{ApiResponse, TransferLink};

pub(crate) const DEFAULT_BASE_URL: &str = "https://cloud-api.yandex.net";

const DISK_ENDPOINT: &str = "/v1/disk";
const RESOURCES_ENDPOINT: &str = "/v1/disk/resources";
const UPLOAD_ENDPOINT: &str = "/v1/disk/resources/upload";
const PUBLISH_ENDPOINT: &str = "/v1/disk/resources/publish";

#[derive(Debug, Error)]
pub enum YadiskError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("token contains characters not allowed in a header")]
    InvalidCredential,
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed response ({status}): {reason}")]
    MalformedResponse { status: StatusCode, reason: String },
}

/// OAuth token for the Disk API. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub(crate) fn header_value(&self) -> Result<HeaderValue, YadiskError> {
        let mut value = HeaderValue::from_str(&format!("OAuth {}", self.0))
            .map_err(|_| YadiskError::InvalidCredential)?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl From<String> for Credential {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for Credential {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

/// Client for the Disk REST API.
///
/// Every method issues exactly one request (two for [`upload_file`]) and
/// hands back the raw [`ApiResponse`]. Status codes are never turned into
/// errors here; see [`crate::outcome`] for how callers interpret them.
///
/// [`upload_file`]: YadiskClient::upload_file
#[derive(Clone)]
pub struct YadiskClient {
    http: Client,
    base_url: Url,
    headers: HeaderMap,
}

impl fmt::Debug for YadiskClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YadiskClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl YadiskClient {
    pub fn new(token: impl Into<Credential>) -> Result<Self, YadiskError> {
        Self::with_base_url(DEFAULT_BASE_URL, token)
    }

    pub fn with_base_url(
        base_url: &str,
        token: impl Into<Credential>,
    ) -> Result<Self, YadiskError> {
        Self::with_http(Client::new(), base_url, token)
    }

    /// Uses a preconfigured HTTP client, e.g. one with a request timeout.
    pub fn with_http(
        http: Client,
        base_url: &str,
        token: impl Into<Credential>,
    ) -> Result<Self, YadiskError> {
        let credential = token.into();
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, credential.header_value()?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
            headers,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn get_disk_info(&self) -> Result<ApiResponse, YadiskError> {
        self.request(Method::GET, DISK_ENDPOINT, &[]).await
    }

    /// Negotiates an upload href for `remote_path` and PUTs the local file
    /// to it. The second request is only sent when negotiation returns
    /// exactly `200`; any other negotiation response is returned as-is.
    pub async fn upload_file(
        &self,
        local_path: &Path,
        remote_path: &str,
        overwrite: bool,
    ) -> Result<ApiResponse, YadiskError> {
        let negotiation = self
            .request(
                Method::GET,
                UPLOAD_ENDPOINT,
                &[("path", remote_path), ("overwrite", bool_param(overwrite))],
            )
            .await?;
        if negotiation.status() != StatusCode::OK {
            debug!(
                status = negotiation.status().as_u16(),
                remote_path, "upload negotiation declined"
            );
            return Ok(negotiation);
        }

        let link: TransferLink = negotiation.json()?;
        let file = tokio::fs::File::open(local_path)
            .await
            .map_err(|source| YadiskError::Io {
                path: local_path.to_path_buf(),
                source,
            })?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        debug!(remote_path, "uploading file to negotiated href");
        let response = self.http.put(link.href).body(body).send().await?;
        ApiResponse::read(response).await
    }

    pub async fn create_folder(&self, path: &str) -> Result<ApiResponse, YadiskError> {
        self.request(Method::PUT, RESOURCES_ENDPOINT, &[("path", path)])
            .await
    }

    pub async fn delete_resource(
        &self,
        path: &str,
        permanently: bool,
    ) -> Result<ApiResponse, YadiskError> {
        self.request(
            Method::DELETE,
            RESOURCES_ENDPOINT,
            &[("path", path), ("permanently", bool_param(permanently))],
        )
        .await
    }

    pub async fn get_resource_info(&self, path: &str) -> Result<ApiResponse, YadiskError> {
        self.request(Method::GET, RESOURCES_ENDPOINT, &[("path", path)])
            .await
    }

    pub async fn publish_resource(&self, path: &str) -> Result<ApiResponse, YadiskError> {
        self.request(Method::PUT, PUBLISH_ENDPOINT, &[("path", path)])
            .await
    }

    /// Sends one authorized request and returns whatever the server said.
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<ApiResponse, YadiskError> {
        let mut url = self.base_url.join(endpoint)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        debug!(%method, endpoint, "sending api request");
        let response = self
            .http
            .request(method, url)
            .headers(self.headers.clone())
            .send()
            .await?;
        ApiResponse::read(response).await
    }
}

fn bool_param(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

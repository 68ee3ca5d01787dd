use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Client, StatusCode};
use tracing::debug;
use url::Url;

use crate::client::{Credential, YadiskError};
use crate::response::{ApiResponse, LoginInfo};

const DEFAULT_BASE_URL: &str = "https://login.yandex.ru";

/// Asks the Yandex ID service which account a token belongs to.
///
/// Useful when the Disk API answers `401`/`403`: a token that is valid here
/// but rejected by Disk was issued without Disk scopes.
#[derive(Clone)]
pub struct AccountClient {
    http: Client,
    base_url: Url,
    authorization: HeaderValue,
}

impl AccountClient {
    pub fn new(token: impl Into<Credential>) -> Result<Self, YadiskError> {
        Self::with_base_url(DEFAULT_BASE_URL, token)
    }

    pub fn with_base_url(
        base_url: &str,
        token: impl Into<Credential>,
    ) -> Result<Self, YadiskError> {
        Self::with_http(Client::new(), base_url, token)
    }

    pub fn with_http(
        http: Client,
        base_url: &str,
        token: impl Into<Credential>,
    ) -> Result<Self, YadiskError> {
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
            authorization: token.into().header_value()?,
        })
    }

    pub async fn get_login_info(&self) -> Result<ApiResponse, YadiskError> {
        let mut url = self.base_url.join("/info")?;
        url.query_pairs_mut().append_pair("format", "json");
        debug!("requesting token account info");
        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, self.authorization.clone())
            .send()
            .await?;
        ApiResponse::read(response).await
    }

    /// Decoded account info, or `None` when the service refused the token.
    pub async fn login_info(&self) -> Result<Option<LoginInfo>, YadiskError> {
        let response = self.get_login_info().await?;
        if response.status() != StatusCode::OK {
            return Ok(None);
        }
        response.json().map(Some)
    }
}

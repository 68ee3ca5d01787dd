use std::collections::BTreeMap;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::client::YadiskError;
use crate::outcome::Outcome;

/// Status and raw body of one API call. The body is decoded only on demand.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub(crate) async fn read(response: reqwest::Response) -> Result<Self, YadiskError> {
        let status = response.status();
        let body = response.bytes().await?;
        Ok(Self::new(status, body.to_vec()))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn outcome(&self) -> Outcome {
        Outcome::from_status(self.status)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, YadiskError> {
        serde_json::from_slice(&self.body).map_err(|err| YadiskError::MalformedResponse {
            status: self.status,
            reason: err.to_string(),
        })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DiskInfo {
    pub total_space: u64,
    pub used_space: u64,
    #[serde(default)]
    pub trash_size: u64,
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default)]
    pub system_folders: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Resource {
    pub path: String,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub modified: Option<String>,
    #[serde(default)]
    pub public_url: Option<String>,
    #[serde(default)]
    pub md5: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    File,
    Dir,
}

/// Link returned by upload negotiation, publishing and async operations.
#[derive(Debug, Deserialize, Serialize)]
pub struct TransferLink {
    pub href: Url,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub templated: bool,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LoginInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

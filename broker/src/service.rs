//! Broker operations: upload and download authorizations and per-owner
//! listing. Every key an owner touches lives under `<userId>/`.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::BrokerError;
use crate::store::{ObjectMethod, ObjectStore};

/// Lifetime of every issued URL.
pub const PRESIGN_TTL: Duration = Duration::from_secs(3600);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadAuthorization {
    pub upload_url: String,
    pub key: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadAuthorization {
    pub download_url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntry {
    pub name: String,
    pub key: String,
}

pub struct Broker {
    store: Arc<dyn ObjectStore>,
}

/// Empty strings count as missing.
fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

pub fn owner_prefix(user_id: &str) -> String {
    format!("{user_id}/")
}

impl Broker {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub fn issue_upload_authorization(
        &self,
        file_name: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<UploadAuthorization, BrokerError> {
        let (Some(file_name), Some(user_id)) = (present(file_name), present(user_id)) else {
            return Err(BrokerError::Validation("Missing fileName or userId"));
        };
        let key = format!("{}{file_name}", owner_prefix(user_id));
        let upload_url = self
            .store
            .presign(ObjectMethod::Put, &key, PRESIGN_TTL)
            .map_err(|source| BrokerError::Storage {
                message: "failed to generate upload url",
                source,
            })?;
        info!(%key, "upload authorized");
        Ok(UploadAuthorization { upload_url, key })
    }

    pub async fn list_objects(&self, user_id: Option<&str>) -> Result<Vec<ListEntry>, BrokerError> {
        let Some(user_id) = present(user_id) else {
            return Err(BrokerError::Validation("Missing userId"));
        };
        let prefix = owner_prefix(user_id);
        let keys = self
            .store
            .list(&prefix)
            .await
            .map_err(|source| BrokerError::Storage {
                message: "failed to list files",
                source,
            })?;
        Ok(keys
            .into_iter()
            .filter_map(|key| {
                let name = key.strip_prefix(&prefix)?.to_string();
                Some(ListEntry { name, key })
            })
            .collect())
    }

    pub fn issue_download_authorization(
        &self,
        key: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<DownloadAuthorization, BrokerError> {
        let (Some(key), Some(user_id)) = (present(key), present(user_id)) else {
            return Err(BrokerError::Validation("Missing key or userId"));
        };
        if !key.starts_with(&owner_prefix(user_id)) {
            warn!(%key, %user_id, "download refused for foreign key");
            return Err(BrokerError::Authorization);
        }
        let download_url = self
            .store
            .presign(ObjectMethod::Get, key, PRESIGN_TTL)
            .map_err(|source| BrokerError::Storage {
                message: "failed to generate download url",
                source,
            })?;
        Ok(DownloadAuthorization { download_url })
    }
}

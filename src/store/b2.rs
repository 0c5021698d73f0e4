//! Backblaze B2 native API client.

use crate::error::{BookvoiceError, Result};
use crate::store::{Authorization, RemoteStore, UploadReceipt, UploadTarget};
use serde::Deserialize;
use std::time::Duration;

const AUTHORIZE_URL: &str = "https://api.backblazeb2.com/b2api/v2/b2_authorize_account";

pub const KEY_ID_ENV: &str = "BOOKVOICE_B2_KEY_ID";
pub const APPLICATION_KEY_ENV: &str = "BOOKVOICE_B2_APPLICATION_KEY";
pub const BUCKET_ID_ENV: &str = "BOOKVOICE_B2_BUCKET_ID";

/// Account credentials and target bucket.
#[derive(Clone, PartialEq, Eq)]
pub struct B2Credentials {
    pub key_id: String,
    pub application_key: String,
    pub bucket_id: String,
}

impl std::fmt::Debug for B2Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("B2Credentials")
            .field("key_id", &self.key_id)
            .field("application_key", &"<redacted>")
            .field("bucket_id", &self.bucket_id)
            .finish()
    }
}

impl B2Credentials {
    /// Read credentials from the environment. `None` if any is missing.
    pub fn from_env() -> Option<Self> {
        let read = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        Some(Self {
            key_id: read(KEY_ID_ENV)?,
            application_key: read(APPLICATION_KEY_ENV)?,
            bucket_id: read(BUCKET_ID_ENV)?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizeResponse {
    api_url: String,
    authorization_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadUrlResponse {
    upload_url: String,
    authorization_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadFileResponse {
    file_id: String,
    content_length: u64,
}

pub struct B2Store {
    client: reqwest::Client,
    credentials: B2Credentials,
    authorize_url: String,
}

impl B2Store {
    pub fn new(credentials: B2Credentials, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            credentials,
            authorize_url: AUTHORIZE_URL.to_string(),
        })
    }

    /// Point authorization at another host.
    pub fn with_authorize_url(mut self, url: &str) -> Self {
        self.authorize_url = url.to_string();
        self
    }
}

async fn error_body(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    format!("status {status}: {}", body.chars().take(300).collect::<String>())
}

#[async_trait::async_trait]
impl RemoteStore for B2Store {
    async fn authorize(&self) -> Result<Authorization> {
        let response = self
            .client
            .get(&self.authorize_url)
            .basic_auth(
                &self.credentials.key_id,
                Some(&self.credentials.application_key),
            )
            .send()
            .await
            .map_err(|e| BookvoiceError::StoreAuthorization {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(BookvoiceError::StoreAuthorization {
                message: error_body(response).await,
            });
        }

        let body: AuthorizeResponse =
            response
                .json()
                .await
                .map_err(|e| BookvoiceError::StoreAuthorization {
                    message: format!("invalid response: {e}"),
                })?;

        Ok(Authorization {
            api_url: body.api_url,
            token: body.authorization_token,
        })
    }

    async fn get_upload_target(&self, auth: &Authorization) -> Result<UploadTarget> {
        let url = format!("{}/b2api/v2/b2_get_upload_url", auth.api_url);
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, &auth.token)
            .json(&serde_json::json!({ "bucketId": self.credentials.bucket_id }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BookvoiceError::StoreUpload {
                message: format!("get_upload_url failed, {}", error_body(response).await),
            });
        }

        let body: UploadUrlResponse = response.json().await?;
        Ok(UploadTarget {
            upload_url: body.upload_url,
            token: body.authorization_token,
        })
    }

    async fn upload(
        &self,
        target: &UploadTarget,
        bytes: Vec<u8>,
        remote_name: &str,
        sha1: &str,
    ) -> Result<UploadReceipt> {
        let length = bytes.len();
        let response = self
            .client
            .post(&target.upload_url)
            .header(reqwest::header::AUTHORIZATION, &target.token)
            .header("X-Bz-File-Name", urlencoding::encode(remote_name).into_owned())
            .header(reqwest::header::CONTENT_TYPE, "b2/x-auto")
            .header(reqwest::header::CONTENT_LENGTH, length)
            .header("X-Bz-Content-Sha1", sha1)
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BookvoiceError::StoreUpload {
                message: format!("upload of {remote_name} failed, {}", error_body(response).await),
            });
        }

        let body: UploadFileResponse = response.json().await?;
        Ok(UploadReceipt {
            remote_size: body.content_length,
            file_id: body.file_id,
        })
    }

    fn name(&self) -> &str {
        "b2"
    }
}

//! Google Cloud Storage adapter over the raw JSON API (no mature async GCS
//! crate in the corpus; `reqwest` + `goauth` for service-account OAuth is
//! the same combination the broader pack reaches for).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use goauth::auth::JwtClaims;
use goauth::credentials::Credentials;
use goauth::scopes::Scope;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use smpl_jwt::Jwt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{ArchiveAdapter, DeleteOutcome, ObjectSummary};
use crate::config::GcsConfig;
use crate::error::{EngineError, Result};

pub struct GcsAdapter {
    http: HttpClient,
    bucket: String,
    credentials: Credentials,
    token: Arc<RwLock<Option<(String, DateTime<Utc>)>>>,
}

impl GcsAdapter {
    pub async fn new(config: &GcsConfig) -> Result<Self> {
        let credentials = Credentials::from_file(&config.service_account_key_path)
            .map_err(|e| EngineError::Validation(format!("invalid GCS service account key: {e}")))?;
        Ok(Self {
            http: HttpClient::new(),
            bucket: config.bucket.clone(),
            credentials,
            token: Arc::new(RwLock::new(None)),
        })
    }

    async fn access_token(&self) -> Result<String> {
        {
            let cached = self.token.read().await;
            if let Some((token, expires_at)) = cached.as_ref() {
                if *expires_at > Utc::now() {
                    return Ok(token.clone());
                }
            }
        }

        let claims = JwtClaims::new(
            self.credentials.iss(),
            &Scope::DevStorageReadWrite,
            self.credentials.token_uri(),
            None,
            None,
        );
        let jwt = Jwt::new(claims, self.credentials.rsa_key().map_err(|e| EngineError::internal(e.to_string()))?, None);
        let token_response = goauth::get_token(&jwt, &self.credentials)
            .await
            .map_err(|e| EngineError::ArchiveAuth { message: e.to_string() })?;

        let access_token = token_response.access_token().to_string();
        let expires_at = Utc::now() + chrono::Duration::seconds(token_response.expires_in() as i64 - 30);
        *self.token.write().await = Some((access_token.clone(), expires_at));
        Ok(access_token)
    }

    fn object_url(&self, key: &str, query: &str) -> String {
        let encoded = urlencoding::encode(key);
        format!(
            "https://storage.googleapis.com/storage/v1/b/{}/o/{}{}",
            self.bucket, encoded, query
        )
    }
}

#[derive(Deserialize)]
struct GcsObject {
    name: String,
    size: Option<String>,
    updated: Option<String>,
}

#[derive(Deserialize)]
struct GcsListResponse {
    items: Option<Vec<GcsObject>>,
}

#[async_trait]
impl ArchiveAdapter for GcsAdapter {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        _metadata: HashMap<String, String>,
    ) -> Result<String> {
        let token = self.access_token().await?;
        let url = format!(
            "https://storage.googleapis.com/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.bucket,
            urlencoding::encode(key)
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(map_gcs_status(response.status().as_u16(), response.text().await.unwrap_or_default()));
        }
        Ok(format!("gs://{}/{}", self.bucket, key))
    }

    async fn list(&self, prefix: &str, since: Option<DateTime<Utc>>) -> Result<Vec<ObjectSummary>> {
        let token = self.access_token().await?;
        let url = format!(
            "https://storage.googleapis.com/storage/v1/b/{}/o?prefix={}",
            self.bucket,
            urlencoding::encode(prefix)
        );
        let response = self.http.get(&url).bearer_auth(token).send().await?;
        if !response.status().is_success() {
            return Err(map_gcs_status(response.status().as_u16(), response.text().await.unwrap_or_default()));
        }
        let body: GcsListResponse = response.json().await?;
        let mut summaries = Vec::new();
        for item in body.items.unwrap_or_default() {
            let last_modified = item
                .updated
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(Utc::now);
            if let Some(since) = since {
                if last_modified < since {
                    continue;
                }
            }
            summaries.push(ObjectSummary {
                key: item.name,
                size: item.size.and_then(|s| s.parse().ok()).unwrap_or(0),
                last_modified,
            });
        }
        Ok(summaries)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let token = self.access_token().await?;
        let url = self.object_url(key, "?alt=media");
        let response = self.http.get(&url).bearer_auth(token).send().await?;
        if !response.status().is_success() {
            return Err(map_gcs_status(response.status().as_u16(), response.text().await.unwrap_or_default()));
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn delete(&self, keys: &[String]) -> Result<Vec<DeleteOutcome>> {
        let token = self.access_token().await?;
        let mut outcomes = Vec::with_capacity(keys.len());
        for key in keys {
            let url = self.object_url(key, "");
            let result = self.http.delete(&url).bearer_auth(token.clone()).send().await;
            outcomes.push(match result {
                Ok(resp) if resp.status().is_success() || resp.status().as_u16() == 404 => DeleteOutcome {
                    key: key.clone(),
                    deleted: resp.status().is_success(),
                    error: None,
                },
                Ok(resp) => DeleteOutcome {
                    key: key.clone(),
                    deleted: false,
                    error: Some(format!("status {}", resp.status())),
                },
                Err(e) => DeleteOutcome {
                    key: key.clone(),
                    deleted: false,
                    error: Some(e.to_string()),
                },
            });
        }
        Ok(outcomes)
    }
}

fn map_gcs_status(status: u16, body: String) -> EngineError {
    if status == 401 || status == 403 {
        EngineError::ArchiveAuth { message: body }
    } else {
        EngineError::ArchiveUnavailable { message: format!("gcs returned {status}: {body}") }
    }
}

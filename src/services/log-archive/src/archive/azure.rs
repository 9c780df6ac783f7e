//! Azure Blob Storage adapter, over `azure_storage`/`azure_storage_blobs`
//! (the same crates the broader pack reaches for GCP/Azure object storage).

use async_trait::async_trait;
use azure_storage::StorageCredentials;
use azure_storage_blobs::prelude::{BlobServiceClient, ClientBuilder};
use chrono::{DateTime, Utc};
use futures::stream::StreamExt;
use std::collections::HashMap;

use super::{ArchiveAdapter, DeleteOutcome, ObjectSummary};
use crate::config::AzureConfig;
use crate::error::{EngineError, Result};

pub struct AzureAdapter {
    service: BlobServiceClient,
    container: String,
}

impl AzureAdapter {
    pub async fn new(config: &AzureConfig) -> Result<Self> {
        let credentials = StorageCredentials::access_key(config.account.clone(), config.access_key.clone());
        let service = ClientBuilder::new(config.account.clone(), credentials).blob_service_client();
        Ok(Self {
            service,
            container: config.container.clone(),
        })
    }

    fn container_client(&self) -> azure_storage_blobs::prelude::ContainerClient {
        self.service.container_client(&self.container)
    }
}

#[async_trait]
impl ArchiveAdapter for AzureAdapter {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        _metadata: HashMap<String, String>,
    ) -> Result<String> {
        let blob = self.container_client().blob_client(key);
        blob.put_block_blob(bytes)
            .content_type(content_type.to_string())
            .await
            .map_err(|e| map_azure_error(e.to_string()))?;
        Ok(format!("https://{}.blob.core.windows.net/{}/{}", self.service.account(), self.container, key))
    }

    async fn list(&self, prefix: &str, since: Option<DateTime<Utc>>) -> Result<Vec<ObjectSummary>> {
        let mut stream = self
            .container_client()
            .list_blobs()
            .prefix(prefix.to_string())
            .into_stream();
        let mut summaries = Vec::new();
        while let Some(page) = stream.next().await {
            let page = page.map_err(|e| map_azure_error(e.to_string()))?;
            for blob in page.blobs.blobs() {
                let last_modified: DateTime<Utc> = blob.properties.last_modified.into();
                if let Some(since) = since {
                    if last_modified < since {
                        continue;
                    }
                }
                summaries.push(ObjectSummary {
                    key: blob.name.clone(),
                    size: blob.properties.content_length,
                    last_modified,
                });
            }
        }
        Ok(summaries)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let blob = self.container_client().blob_client(key);
        let data = blob
            .get_content()
            .await
            .map_err(|e| map_azure_error(e.to_string()))?;
        Ok(data)
    }

    async fn delete(&self, keys: &[String]) -> Result<Vec<DeleteOutcome>> {
        let mut outcomes = Vec::with_capacity(keys.len());
        for key in keys {
            let blob = self.container_client().blob_client(key);
            let result = blob.delete().await;
            outcomes.push(match result {
                Ok(_) => DeleteOutcome {
                    key: key.clone(),
                    deleted: true,
                    error: None,
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

fn map_azure_error(message: String) -> EngineError {
    let lower = message.to_lowercase();
    if lower.contains("auth") || lower.contains("forbidden") || lower.contains("401") {
        EngineError::ArchiveAuth { message }
    } else {
        EngineError::ArchiveUnavailable { message }
    }
}

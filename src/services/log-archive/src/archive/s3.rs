//! S3-compatible archive adapter: one `aws-sdk-s3` client per process,
//! region/endpoint from config, a best-effort connectivity probe on
//! construction.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{info, warn};

use super::{ArchiveAdapter, DeleteOutcome, LifecycleRules, ObjectSummary};
use crate::config::S3Config;
use crate::error::{EngineError, Result};

pub struct S3Adapter {
    client: S3Client,
    bucket: String,
}

impl S3Adapter {
    pub async fn new(config: &S3Config) -> Result<Self> {
        let mut builder = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        let aws_config = builder.load().await;
        let client = S3Client::new(&aws_config);

        if let Err(e) = client.list_buckets().send().await {
            warn!(error = %e, "s3 connectivity probe failed; continuing, uploads will retry");
        } else {
            info!(bucket = %config.bucket, "connected to s3");
        }

        Ok(Self {
            client,
            bucket: config.bucket.clone(),
        })
    }
}

#[async_trait]
impl ArchiveAdapter for S3Adapter {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        metadata: HashMap<String, String>,
    ) -> Result<String> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type);
        for (k, v) in metadata {
            request = request.metadata(k, v);
        }
        request.send().await.map_err(|e| {
            warn!(key = %key, error = %e, "s3 put failed");
            map_sdk_error(e.to_string())
        })?;
        Ok(format!("s3://{}/{}", self.bucket, key))
    }

    async fn list(&self, prefix: &str, since: Option<DateTime<Utc>>) -> Result<Vec<ObjectSummary>> {
        let mut summaries = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket).prefix(prefix);
            if let Some(token) = &continuation {
                request = request.continuation_token(token);
            }
            let response = request.send().await.map_err(|e| map_sdk_error(e.to_string()))?;
            for obj in response.contents() {
                let last_modified = obj
                    .last_modified()
                    .and_then(|dt| DateTime::from_timestamp(dt.secs(), 0))
                    .unwrap_or_else(Utc::now);
                if let Some(since) = since {
                    if last_modified < since {
                        continue;
                    }
                }
                summaries.push(ObjectSummary {
                    key: obj.key().unwrap_or_default().to_string(),
                    size: obj.size().unwrap_or(0) as u64,
                    last_modified,
                });
            }
            if response.is_truncated().unwrap_or(false) {
                continuation = response.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }
        Ok(summaries)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e.to_string()))?;
        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| EngineError::ArchiveUnavailable { message: e.to_string() })?;
        Ok(bytes.into_bytes().to_vec())
    }

    async fn delete(&self, keys: &[String]) -> Result<Vec<DeleteOutcome>> {
        let mut outcomes = Vec::with_capacity(keys.len());
        for key in keys {
            let result = self.client.delete_object().bucket(&self.bucket).key(key).send().await;
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

    async fn set_lifecycle(&self, rules: &LifecycleRules) -> Result<()> {
        use aws_sdk_s3::types::{
            BucketLifecycleConfiguration, ExpirationStatus, LifecycleExpiration, LifecycleRule,
            LifecycleRuleFilter, Transition, TransitionStorageClass,
        };

        let mut transitions = Vec::new();
        if let Some(days) = rules.transition_to_ia_days {
            transitions.push(
                Transition::builder()
                    .days(days as i32)
                    .storage_class(TransitionStorageClass::StandardIa)
                    .build(),
            );
        }
        if let Some(days) = rules.transition_to_glacier_days {
            transitions.push(
                Transition::builder()
                    .days(days as i32)
                    .storage_class(TransitionStorageClass::Glacier)
                    .build(),
            );
        }
        if let Some(days) = rules.transition_to_deep_archive_days {
            transitions.push(
                Transition::builder()
                    .days(days as i32)
                    .storage_class(TransitionStorageClass::DeepArchive)
                    .build(),
            );
        }

        let mut rule_builder = LifecycleRule::builder()
            .id("log-archive-retention")
            .status(ExpirationStatus::Enabled)
            .filter(LifecycleRuleFilter::Prefix(String::new()));
        for t in transitions {
            rule_builder = rule_builder.transitions(t);
        }
        if let Some(days) = rules.expiration_days {
            rule_builder = rule_builder.expiration(LifecycleExpiration::builder().days(days as i32).build());
        }

        let configuration = BucketLifecycleConfiguration::builder()
            .rules(rule_builder.build().map_err(|e| EngineError::internal(e.to_string()))?)
            .build()
            .map_err(|e| EngineError::internal(e.to_string()))?;

        match self
            .client
            .put_bucket_lifecycle_configuration()
            .bucket(&self.bucket)
            .lifecycle_configuration(configuration)
            .send()
            .await
        {
            Ok(_) => {
                info!(bucket = %self.bucket, "s3 lifecycle policy applied");
                Ok(())
            }
            Err(e) => {
                warn!(bucket = %self.bucket, error = %e, "s3 lifecycle setup failed; in-process sweeper remains authoritative");
                Ok(())
            }
        }
    }
}

fn map_sdk_error(message: String) -> EngineError {
    if message.to_lowercase().contains("credential") || message.to_lowercase().contains("auth") {
        EngineError::ArchiveAuth { message }
    } else {
        EngineError::ArchiveUnavailable { message }
    }
}

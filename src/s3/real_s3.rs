use crate::config::S3Config;
use crate::s3::error::StorageError;
use crate::s3::store::{ListPage, ListedObject, ObjectStore};
use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::{config::Region, Client};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// Real S3 implementation of the ObjectStore trait
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Create a new S3Store instance from configuration
    pub async fn new(config: &S3Config) -> Result<Self, StorageError> {
        let config_loader = aws_config::from_env().region(Region::new(config.region.clone()));

        // If access key and secret are provided, use them for credentials;
        // otherwise fall back to the ambient credential chain
        let aws_config = if let (Some(access_key), Some(secret_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            let credentials = Credentials::new(
                access_key,
                secret_key,
                config.session_token.clone(),
                None,
                "StaticCredentialsProvider",
            );

            config_loader.credentials_provider(credentials).load().await
        } else {
            config_loader.load().await
        };

        // Create S3 client with endpoint override if provided
        let mut client_builder = aws_sdk_s3::config::Builder::from(&aws_config);
        if let Some(endpoint) = &config.endpoint {
            client_builder = client_builder.endpoint_url(endpoint);
        }

        let s3_config = client_builder.build();
        let client = Client::from_conf(s3_config);

        info!("Connected to S3 in region {}", config.region);

        Ok(Self {
            client,
            bucket: config.bucket.clone(),
        })
    }
}

fn to_chrono(dt: aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_page(
        &self,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> Result<ListPage, StorageError> {
        debug!("Listing objects under prefix: {}", prefix);

        let mut request = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix);
        if let Some(token) = continuation_token {
            request = request.continuation_token(token);
        }

        let response = request.send().await.map_err(|e| match e {
            _ if e.to_string().contains("AccessDenied") => {
                StorageError::AccessDenied(prefix.to_string(), e.to_string())
            }
            _ => StorageError::ListError(prefix.to_string(), e.to_string()),
        })?;

        let objects = response
            .contents
            .unwrap_or_default()
            .into_iter()
            .filter_map(|object| {
                let key = object.key?;
                Some(ListedObject {
                    key,
                    size_bytes: object.size.unwrap_or(0),
                    last_modified: object.last_modified.and_then(to_chrono),
                })
            })
            .collect();

        let next_continuation_token = if response.is_truncated.unwrap_or(false) {
            response.next_continuation_token
        } else {
            None
        };

        Ok(ListPage {
            objects,
            next_continuation_token,
        })
    }

    async fn list_common_prefixes(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        debug!("Listing common prefixes under: {}", prefix);

        let response = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .delimiter("/")
            .send()
            .await
            .map_err(|e| match e {
                _ if e.to_string().contains("AccessDenied") => {
                    StorageError::AccessDenied(prefix.to_string(), e.to_string())
                }
                _ => StorageError::ListError(prefix.to_string(), e.to_string()),
            })?;

        let names = response
            .common_prefixes
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| p.prefix)
            .filter_map(|p| {
                p.strip_prefix(prefix)
                    .map(|rest| rest.trim_end_matches('/').to_string())
            })
            .filter(|name| !name.is_empty())
            .collect();

        Ok(names)
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, StorageError> {
        debug!("Fetching object from S3: {}", key);

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match e {
                _ if e.to_string().contains("NoSuchKey") => {
                    StorageError::ObjectNotFound(key.to_string())
                }
                _ if e.to_string().contains("AccessDenied") => {
                    StorageError::AccessDenied(key.to_string(), e.to_string())
                }
                _ => StorageError::ReadError(key.to_string(), e.to_string()),
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::ReadError(key.to_string(), e.to_string()))?
            .into_bytes();

        debug!("Successfully fetched object from S3: {}", key);
        Ok(data)
    }
}

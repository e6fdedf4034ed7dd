use std::collections::HashMap;

use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region},
    primitives::ByteStream,
    types::ObjectCannedAcl,
};
use tracing::debug;

use crate::{BlobError, ObjectStore, PutRequest};

/// S3-backed [`ObjectStore`].
pub struct S3Store {
    client: Client,
    bucket: String,
    acl: ObjectCannedAcl,
}

impl S3Store {
    #[must_use]
    pub fn new(
        region: impl Into<String>,
        access_key_id: &str,
        secret_access_key: &str,
        bucket: impl Into<String>,
        acl: &str,
    ) -> Self {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.into()))
            .credentials_provider(Credentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                "mailgate",
            ))
            .build();

        Self {
            client: Client::from_conf(config),
            bucket: bucket.into(),
            acl: ObjectCannedAcl::from(acl),
        }
    }

    fn location(&self, key: &str) -> String {
        format!("https://{}.s3.amazonaws.com/{key}", self.bucket)
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, request: PutRequest) -> Result<String, BlobError> {
        debug!("Uploading object {}", request.key);

        let metadata: HashMap<String, String> = request.metadata.into_iter().collect();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&request.key)
            .acl(self.acl.clone())
            .content_type(&request.content_type)
            .set_metadata(Some(metadata))
            .body(ByteStream::from(request.body))
            .send()
            .await
            .map_err(|err| BlobError::Upload(err.to_string()))?;

        Ok(self.location(&request.key))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, BlobError> {
        debug!("Downloading object {key}");

        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| BlobError::Download(err.to_string()))?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|err| BlobError::Download(err.to_string()))?;

        Ok(body.into_bytes().to_vec())
    }
}

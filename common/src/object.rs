//! Cold-tier object store selection.
//!
//! The cold tier is plain object storage accessed through the
//! `object_store` crate. Services pick a provider via
//! [`ObjectStoreConfig`] (config file or environment) and get back an
//! `Arc<dyn ObjectStore>` constructed once at startup and shared.

use std::sync::Arc;

use object_store::ObjectStore;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use serde::{Deserialize, Serialize};

/// Object store provider configuration.
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ObjectStoreConfig {
    /// In-memory object store (testing and development).
    #[default]
    InMemory,

    /// AWS S3.
    Aws(AwsObjectStoreConfig),

    /// Local filesystem.
    Local(LocalObjectStoreConfig),
}

/// AWS S3 object store configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AwsObjectStoreConfig {
    /// AWS region (e.g., "us-west-2").
    pub region: String,

    /// S3 bucket name.
    pub bucket: String,
}

/// Local filesystem object store configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocalObjectStoreConfig {
    /// Directory the store roots itself in.
    pub path: String,
}

/// Builds an object store from configuration.
///
/// Credentials for the AWS provider come from the usual environment
/// variables and instance metadata, not from the config file.
pub fn create_object_store(
    config: &ObjectStoreConfig,
) -> Result<Arc<dyn ObjectStore>, object_store::Error> {
    match config {
        ObjectStoreConfig::InMemory => Ok(Arc::new(InMemory::new())),
        ObjectStoreConfig::Local(local) => {
            Ok(Arc::new(LocalFileSystem::new_with_prefix(&local.path)?))
        }
        ObjectStoreConfig::Aws(aws) => {
            let store = AmazonS3Builder::from_env()
                .with_region(&aws.region)
                .with_bucket_name(&aws.bucket)
                .build()?;
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_in_memory() {
        // given/when
        let config = ObjectStoreConfig::default();

        // then
        assert_eq!(config, ObjectStoreConfig::InMemory);
    }

    #[test]
    fn should_deserialize_in_memory_config() {
        // given
        let yaml = r#"type: InMemory"#;

        // when
        let config: ObjectStoreConfig = serde_yaml::from_str(yaml).unwrap();

        // then
        assert_eq!(config, ObjectStoreConfig::InMemory);
    }

    #[test]
    fn should_deserialize_local_config() {
        // given
        let yaml = r#"
type: Local
path: /tmp/cold-tier
"#;

        // when
        let config: ObjectStoreConfig = serde_yaml::from_str(yaml).unwrap();

        // then
        assert_eq!(
            config,
            ObjectStoreConfig::Local(LocalObjectStoreConfig {
                path: "/tmp/cold-tier".to_string()
            })
        );
    }

    #[test]
    fn should_deserialize_aws_config() {
        // given
        let yaml = r#"
type: Aws
region: us-west-2
bucket: log-archive
"#;

        // when
        let config: ObjectStoreConfig = serde_yaml::from_str(yaml).unwrap();

        // then
        assert_eq!(
            config,
            ObjectStoreConfig::Aws(AwsObjectStoreConfig {
                region: "us-west-2".to_string(),
                bucket: "log-archive".to_string()
            })
        );
    }

    #[test]
    fn should_create_in_memory_store() {
        // given/when
        let store = create_object_store(&ObjectStoreConfig::InMemory);

        // then
        assert!(store.is_ok());
    }
}

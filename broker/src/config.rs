use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::Level;
use url::Url;

use crate::presign::Credentials;
use crate::store::{MemoryStore, ObjectStore, S3Config, S3Store};

/// Cloudnote broker - issues presigned storage URLs per user
#[derive(Parser, Debug)]
#[command(name = "cloudnote-broker")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Storage region
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// Bucket holding the notes
    #[arg(long, env = "BUCKET_NAME")]
    pub bucket: Option<String>,

    /// Access key id used to sign URLs
    #[arg(long, env = "AWS_ACCESS_KEY_ID")]
    pub access_key_id: Option<String>,

    /// Secret key used to sign URLs
    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub secret_access_key: Option<String>,

    /// Custom S3-compatible endpoint, path-style addressing
    #[arg(long, env = "S3_ENDPOINT")]
    pub endpoint: Option<Url>,

    /// HTTP port
    #[arg(long, default_value = "3000", env = "BROKER_PORT")]
    pub port: u16,

    /// Log level
    #[arg(long, default_value = "info", env = "BROKER_LOG_LEVEL")]
    pub log_level: Level,

    /// Serve from an in-process store instead of S3
    #[arg(long)]
    pub memory_store: bool,
}

fn required(value: &Option<String>, name: &str) -> Result<String> {
    match value.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => bail!("{name} is not set"),
    }
}

impl Args {
    /// Builds the configured object store.
    pub fn object_store(&self) -> Result<Arc<dyn ObjectStore>> {
        if self.memory_store {
            let bucket = self.bucket.as_deref().unwrap_or("cloudnote");
            return Ok(Arc::new(MemoryStore::new(bucket)));
        }
        let config = S3Config {
            region: required(&self.region, "AWS_REGION")?,
            bucket: required(&self.bucket, "BUCKET_NAME")?,
            credentials: Credentials {
                access_key_id: required(&self.access_key_id, "AWS_ACCESS_KEY_ID")?,
                secret_access_key: required(&self.secret_access_key, "AWS_SECRET_ACCESS_KEY")
                    .context("signing credentials are incomplete")?,
            },
            endpoint: self.endpoint.clone(),
        };
        Ok(Arc::new(S3Store::new(config)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_needs_no_credentials() {
        let args =
            Args::try_parse_from(["cloudnote-broker", "--memory-store", "--port", "8081"])
                .unwrap();
        assert_eq!(args.port, 8081);
        assert!(args.object_store().is_ok());
    }

    #[test]
    fn s3_store_requires_every_setting() {
        let args = Args::try_parse_from([
            "cloudnote-broker",
            "--region",
            "ap-south-1",
            "--bucket",
            "notes",
            "--access-key-id",
            "AKID",
            "--secret-access-key",
            " ",
        ])
        .unwrap();
        let err = args.object_store().err().unwrap();
        assert!(format!("{err:#}").contains("AWS_SECRET_ACCESS_KEY is not set"));
    }
}

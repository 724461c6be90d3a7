//! Storage locations (local, S3, R2, GCS, Azure)
//!
//! Shared by the catalog reader, which fetches CSV objects, and the
//! warehouse loader, which stages Parquet files under the temp dir.

use crate::error::{Error, Result};
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::sync::Arc;

/// Split `bucket/rest/of/path` into `("bucket", "rest/of/path")`
fn split_bucket(without_scheme: &str) -> (&str, String) {
    match without_scheme.find('/') {
        Some(idx) => (
            &without_scheme[..idx],
            without_scheme[idx + 1..].trim_end_matches('/').to_string(),
        ),
        None => (without_scheme, String::new()),
    }
}

/// Split a file URL into its directory and file name
pub fn split_file_url(url: &str) -> Result<(&str, &str)> {
    match url.rfind('/') {
        Some(idx) if idx + 1 < url.len() => Ok((&url[..idx], &url[idx + 1..])),
        _ => Err(Error::config(format!("Not a file location: {url}"))),
    }
}

/// A directory-like location parsed from a URL or local path
#[derive(Debug, Clone)]
pub struct StorageLocation {
    /// The object store implementation
    store: Arc<dyn ObjectStore>,
    /// Base path prefix within the bucket/container
    prefix: String,
    /// Bucket, container or absolute local directory
    root: String,
    /// URL scheme (s3, r2, gs, az, file)
    scheme: String,
}

impl StorageLocation {
    /// Open an existing location
    ///
    /// Supported formats:
    /// - `s3://bucket/path/` - AWS S3
    /// - `r2://bucket/path/` - Cloudflare R2 (S3-compatible)
    /// - `gs://bucket/path/` - Google Cloud Storage
    /// - `az://container/path/` - Azure Blob Storage
    /// - `/local/path/`, `./path/` or `file:///path/` - Local filesystem
    pub fn open(url: &str) -> Result<Self> {
        if url.starts_with("s3://") {
            Self::parse_s3(url, false)
        } else if url.starts_with("r2://") {
            Self::parse_s3(url, true)
        } else if url.starts_with("gs://") {
            Self::parse_gcs(url)
        } else if url.starts_with("az://") {
            Self::parse_azure(url)
        } else {
            Self::parse_local(url, false)
        }
    }

    /// Open a location for writing, creating local directories as needed
    pub fn create(url: &str) -> Result<Self> {
        if url.contains("://") && !url.starts_with("file://") {
            Self::open(url)
        } else {
            Self::parse_local(url, true)
        }
    }

    /// Parse S3 or R2 URL
    fn parse_s3(url: &str, is_r2: bool) -> Result<Self> {
        let scheme = if is_r2 { "r2" } else { "s3" };
        let without_scheme = url
            .strip_prefix(&format!("{scheme}://"))
            .ok_or_else(|| Error::config(format!("Invalid {scheme} URL: {url}")))?;
        let (bucket, prefix) = split_bucket(without_scheme);

        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);

        // AWS_ENDPOINT is read by from_env(); R2 may use its own variable
        if is_r2 {
            if let Ok(endpoint) = std::env::var("R2_ENDPOINT_URL") {
                builder = builder.with_endpoint(endpoint);
            }
        }

        let store = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to create {scheme} client: {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            prefix,
            root: bucket.to_string(),
            scheme: scheme.to_string(),
        })
    }

    /// Parse GCS URL
    fn parse_gcs(url: &str) -> Result<Self> {
        let without_scheme = url
            .strip_prefix("gs://")
            .ok_or_else(|| Error::config(format!("Invalid GCS URL: {url}")))?;
        let (bucket, prefix) = split_bucket(without_scheme);

        let store = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(bucket)
            .build()
            .map_err(|e| Error::config(format!("Failed to create GCS client: {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            prefix,
            root: bucket.to_string(),
            scheme: "gs".to_string(),
        })
    }

    /// Parse Azure Blob URL
    fn parse_azure(url: &str) -> Result<Self> {
        let without_scheme = url
            .strip_prefix("az://")
            .ok_or_else(|| Error::config(format!("Invalid Azure URL: {url}")))?;
        let (container, prefix) = split_bucket(without_scheme);

        let store = MicrosoftAzureBuilder::from_env()
            .with_container_name(container)
            .build()
            .map_err(|e| Error::config(format!("Failed to create Azure client: {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            prefix,
            root: container.to_string(),
            scheme: "az".to_string(),
        })
    }

    /// Parse local filesystem path
    fn parse_local(path: &str, create: bool) -> Result<Self> {
        let path = path.strip_prefix("file://").unwrap_or(path);

        if create {
            std::fs::create_dir_all(path)
                .map_err(|e| Error::config(format!("Failed to create directory {path}: {e}")))?;
        }

        let root = std::fs::canonicalize(path)
            .map_err(|e| Error::config(format!("Cannot open directory {path}: {e}")))?;

        let store = LocalFileSystem::new_with_prefix(&root)
            .map_err(|e| Error::config(format!("Failed to create local store: {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            prefix: String::new(),
            root: root.to_string_lossy().trim_end_matches('/').to_string(),
            scheme: "file".to_string(),
        })
    }

    /// Check if this is a cloud location (not local)
    pub fn is_cloud(&self) -> bool {
        self.scheme != "file"
    }

    /// Get the scheme (s3, r2, gs, az, file)
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    fn object_path(&self, filename: &str) -> ObjectPath {
        if self.prefix.is_empty() {
            ObjectPath::from(filename)
        } else {
            ObjectPath::from(format!("{}/{filename}", self.prefix))
        }
    }

    /// Address of `filename` as understood by DuckDB (absolute local path or
    /// object URL; R2 goes through the S3 API)
    pub fn locate(&self, filename: &str) -> String {
        let path = self.object_path(filename);
        match self.scheme.as_str() {
            "file" => format!("{}/{path}", self.root),
            "r2" => format!("s3://{}/{path}", self.root),
            scheme => format!("{scheme}://{}/{path}", self.root),
        }
    }

    /// Read a whole object
    pub async fn read(&self, filename: &str) -> Result<Bytes> {
        let path = self.object_path(filename);
        let result = self
            .store
            .get(&path)
            .await
            .map_err(|e| Error::io(format!("Failed to read {}: {e}", self.locate(filename))))?;
        result
            .bytes()
            .await
            .map_err(|e| Error::io(format!("Failed to read {}: {e}", self.locate(filename))))
    }

    /// Write bytes to an object, returning its full location
    pub async fn write(&self, filename: &str, data: Bytes) -> Result<String> {
        let path = self.object_path(filename);

        self.store
            .put(&path, data.into())
            .await
            .map_err(|e| Error::io(format!("Failed to write {path}: {e}")))?;

        Ok(self.locate(filename))
    }

    /// Remove an object, ignoring objects that are already gone
    pub async fn delete(&self, filename: &str) -> Result<()> {
        let path = self.object_path(filename);
        match self.store.delete(&path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(Error::io(format!("Failed to delete {path}: {e}"))),
        }
    }
}

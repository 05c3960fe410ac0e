//! Object store for published artifacts
//!
//! Keys are `{folder}/{hash}.{ext}`. Artifacts are content addressed, so
//! they are uploaded public-read with `Cache-Control: no-cache` and are
//! never overwritten with different bytes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region, RequestChecksumCalculation};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;

use crate::config::StorageSettings;
use crate::error::StoreError;

pub const GLB_CONTENT_TYPE: &str = "model/gltf-binary";
pub const USDZ_CONTENT_TYPE: &str = "model/vnd.usdz+zip";
pub const NO_CACHE: &str = "no-cache";

/// Headers attached to an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOptions {
    pub content_type: String,
    pub cache_control: String,
    pub public_read: bool,
}

impl PutOptions {
    /// Public-read, no-cache upload of the given content type
    pub fn artifact(content_type: &str) -> Self {
        Self {
            content_type: content_type.to_string(),
            cache_control: NO_CACHE.to_string(),
            public_read: true,
        }
    }
}

/// Bucket-and-key addressed store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// `Ok(false)` only for a definite "not found"; any other failure is an error.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    async fn put(&self, key: &str, body: Vec<u8>, options: &PutOptions) -> Result<(), StoreError>;

    /// Public URL an uploaded object is reachable at
    fn public_url(&self, key: &str) -> String;
}

/// `https://{bucket}.s3.{region}.amazonaws.com/{key}`
pub fn aws_public_url(bucket: &str, region: &str, key: &str) -> String {
    format!("https://{bucket}.s3.{region}.amazonaws.com/{key}")
}

/// Build the store described by the settings: S3 when an endpoint or
/// credentials are configured, in-memory otherwise.
pub async fn from_settings(settings: &StorageSettings) -> Arc<dyn ObjectStore> {
    if settings.endpoint.is_some() || settings.access_key_id.is_some() {
        tracing::info!(
            "Object store: s3 bucket {} at {}",
            settings.bucket,
            settings.endpoint.as_deref().unwrap_or("aws")
        );
        Arc::new(S3Store::connect(settings).await)
    } else {
        tracing::info!("Object store: in-memory (bucket {})", settings.bucket);
        Arc::new(MemoryStore::with_public_base(format!(
            "https://{}.s3.{}.amazonaws.com",
            settings.bucket, settings.region
        )))
    }
}

// ── S3 ───────────────────────────────────────────────────────

/// Signed HEAD/PUT through the AWS SDK, against AWS or an S3-compatible endpoint
#[derive(Debug, Clone)]
pub struct S3Store {
    client: aws_sdk_s3::Client,
    settings: StorageSettings,
}

impl S3Store {
    /// Static keys from the settings when present, the default AWS provider
    /// chain (environment, profile, instance metadata) otherwise.
    pub async fn connect(settings: &StorageSettings) -> Self {
        if let Some(credentials) = static_credentials(settings) {
            return Self::with_credentials(settings, credentials);
        }
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .load()
            .await;
        let builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        Self::from_builder(builder, settings)
    }

    pub fn with_credentials(settings: &StorageSettings, credentials: Credentials) -> Self {
        let builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials);
        Self::from_builder(builder, settings)
    }

    fn from_builder(mut builder: aws_sdk_s3::config::Builder, settings: &StorageSettings) -> Self {
        builder = builder.force_path_style(settings.force_path_style);
        if let Some(endpoint) = &settings.endpoint {
            // third-party stores reject streamed checksum trailers
            builder = builder
                .endpoint_url(endpoint)
                .request_checksum_calculation(RequestChecksumCalculation::WhenRequired);
        }
        Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
            settings: settings.clone(),
        }
    }

    /// URL the store is addressed at for `key`
    pub fn object_url(&self, key: &str) -> String {
        object_url(&self.settings, key)
    }
}

fn static_credentials(settings: &StorageSettings) -> Option<Credentials> {
    let id = settings.access_key_id.as_ref()?;
    let secret = settings.secret_access_key.as_ref()?;
    Some(Credentials::new(id, secret, None, None, "configurator-settings"))
}

fn object_url(s: &StorageSettings, key: &str) -> String {
    match &s.endpoint {
        Some(endpoint) if s.force_path_style => {
            format!("{}/{}/{}", endpoint.trim_end_matches('/'), s.bucket, key)
        }
        Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), key),
        None => aws_public_url(&s.bucket, &s.region, key),
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let result = self
            .client
            .head_object()
            .bucket(&self.settings.bucket)
            .key(key)
            .send()
            .await;
        match result {
            Ok(_) => Ok(true),
            Err(e) => {
                let not_found = e.as_service_error().is_some_and(|s| s.is_not_found())
                    || e.raw_response().is_some_and(|r| r.status().as_u16() == 404);
                if not_found {
                    Ok(false)
                } else {
                    Err(StoreError::Lookup {
                        key: key.to_string(),
                        message: DisplayErrorContext(&e).to_string(),
                    })
                }
            }
        }
    }

    async fn put(&self, key: &str, body: Vec<u8>, options: &PutOptions) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(&self.settings.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(&options.content_type)
            .cache_control(&options.cache_control)
            .set_acl(options.public_read.then_some(ObjectCannedAcl::PublicRead))
            .send()
            .await
            .map_err(|e| StoreError::Upload {
                key: key.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;
        tracing::info!("Uploaded {}", key);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        match &self.settings.public_base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), key),
            None => self.object_url(key),
        }
    }
}

// ── In-memory ────────────────────────────────────────────────

/// An object held by `MemoryStore`
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub options: PutOptions,
}

/// Process-local store; also the test double for publishing.
#[derive(Debug, Default)]
pub struct MemoryStore {
    public_base: String,
    objects: Mutex<HashMap<String, StoredObject>>,
    puts: AtomicUsize,
    lookups: AtomicUsize,
    fail_lookups: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_public_base("memory://artifacts")
    }

    pub fn with_public_base(base: impl Into<String>) -> Self {
        Self {
            public_base: base.into().trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    /// A store whose existence checks fail with a non-404 error
    pub fn failing_lookups() -> Self {
        Self {
            fail_lookups: true,
            ..Self::new()
        }
    }

    /// Seed an object without counting it as an upload.
    pub fn insert(&self, key: &str, body: Vec<u8>, options: PutOptions) {
        if let Ok(mut objects) = self.objects.lock() {
            objects.insert(key.to_string(), StoredObject { body, options });
        }
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().ok()?.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .lock()
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookups {
            return Err(StoreError::Lookup {
                key: key.to_string(),
                message: "HTTP 403 Forbidden".into(),
            });
        }
        let objects = self.objects.lock().map_err(|e| StoreError::Lookup {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(objects.contains_key(key))
    }

    async fn put(&self, key: &str, body: Vec<u8>, options: &PutOptions) -> Result<(), StoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let mut objects = self.objects.lock().map_err(|e| StoreError::Upload {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        objects.insert(
            key.to_string(),
            StoredObject {
                body,
                options: options.clone(),
            },
        );
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base, key)
    }
}

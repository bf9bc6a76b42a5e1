use std::time::Instant;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::adapters::object_store::ObjectStore;
use crate::runtime::attributes::{deserialize_image, AttributeError};
use crate::runtime::category::{classify, Category};
use crate::runtime::contract::{record_id, ChangeRecord, EventName, InvocationResult, StreamEvent};
use crate::runtime::storage_keys::{formatted_object_key, DEFAULT_FORMATTED_PREFIX};

const COMPONENT: &str = "transform_handler";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformConfig {
    pub bucket: String,
    pub prefix: String,
}

impl TransformConfig {
    pub const BUCKET_ENV: &'static str = "raw_source_bucket";
    pub const PREFIX_ENV: &'static str = "FORMATTED_PREFIX";

    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: DEFAULT_FORMATTED_PREFIX.to_string(),
        }
    }

    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let bucket = lookup(Self::BUCKET_ENV)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| format!("{} must be configured", Self::BUCKET_ENV))?;
        let prefix = lookup(Self::PREFIX_ENV)
            .unwrap_or_else(|| DEFAULT_FORMATTED_PREFIX.to_string())
            .trim_matches('/')
            .to_string();

        Ok(Self { bucket, prefix })
    }
}

/// A change record after deserialization and classification, ready to be
/// written.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedObject {
    pub category: Category,
    pub record_id: String,
    pub object: Map<String, Value>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransformError {
    ImageMissing {
        event_name: EventName,
        reason: String,
    },
    Deserialize(AttributeError),
    MissingId,
    StoreWrite {
        key: String,
        message: String,
    },
}

impl TransformError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ImageMissing { .. } => "image_missing",
            Self::Deserialize(_) => "deserialize_error",
            Self::MissingId => "missing_id",
            Self::StoreWrite { .. } => "store_write_error",
        }
    }
}

impl std::fmt::Display for TransformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ImageMissing { event_name, reason } => {
                write!(f, "{} record has no usable new image: {reason}", event_name.as_str())
            }
            Self::Deserialize(error) => write!(f, "failed to deserialize new image: {error}"),
            Self::MissingId => f.write_str("deserialized object has no usable 'id' attribute"),
            Self::StoreWrite { key, message } => {
                write!(f, "failed to write object '{key}': {message}")
            }
        }
    }
}

impl std::error::Error for TransformError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Deserialize(error) => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchError {
    InvalidBatch(String),
    Record(TransformError),
}

impl BatchError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidBatch(_) => "invalid_batch",
            Self::Record(error) => error.kind(),
        }
    }
}

impl std::fmt::Display for BatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidBatch(message) => write!(f, "invalid stream batch: {message}"),
            Self::Record(error) => write!(f, "{error}"),
        }
    }
}

/// Processing stopped at `record_index`; the first `records_written`
/// records are already in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure {
    pub record_index: Option<usize>,
    pub records_written: usize,
    pub written_keys: Vec<String>,
    pub error: BatchError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub records_written: usize,
    pub written_keys: Vec<String>,
}

/// Extracts, untags, classifies and serializes one change record.
pub fn transform_record(record: &ChangeRecord) -> Result<TransformedObject, TransformError> {
    let image = record
        .new_image()
        .ok_or_else(|| TransformError::ImageMissing {
            event_name: record.event_name,
            reason: "dynamodb.NewImage is absent".to_string(),
        })?;

    let object = deserialize_image(image).map_err(TransformError::Deserialize)?;
    let category = classify(&object);
    let record_id = record_id(&object).ok_or(TransformError::MissingId)?;
    let body = Value::Object(object.clone()).to_string().into_bytes();

    Ok(TransformedObject {
        category,
        record_id,
        object,
        body,
    })
}

/// Writes every record of the batch in order, stopping at the first error.
pub fn process_batch(
    event: &Value,
    config: &TransformConfig,
    store: &impl ObjectStore,
) -> Result<BatchSummary, BatchFailure> {
    let started_at = Instant::now();

    let batch = match StreamEvent::deserialize(event) {
        Ok(value) => value,
        Err(decode_error) => {
            let failure = BatchFailure {
                record_index: None,
                records_written: 0,
                written_keys: Vec::new(),
                error: BatchError::InvalidBatch(decode_error.to_string()),
            };
            log_batch_failed(&failure, started_at);
            return Err(failure);
        }
    };

    info!(
        component = COMPONENT,
        event = "batch_started",
        records = batch.records.len(),
        bucket = %config.bucket,
        prefix = %config.prefix,
    );

    let mut written_keys = Vec::with_capacity(batch.records.len());
    for (index, raw_record) in batch.records.iter().enumerate() {
        match process_record(index, raw_record, config, store) {
            Ok(key) => written_keys.push(key),
            Err(record_error) => {
                let failure = BatchFailure {
                    record_index: Some(index),
                    records_written: written_keys.len(),
                    written_keys,
                    error: BatchError::Record(record_error),
                };
                log_batch_failed(&failure, started_at);
                return Err(failure);
            }
        }
    }

    info!(
        component = COMPONENT,
        event = "batch_completed",
        records_written = written_keys.len(),
        duration_ms = started_at.elapsed().as_millis() as u64,
    );

    Ok(BatchSummary {
        records_written: written_keys.len(),
        written_keys,
    })
}

/// Collapses the batch outcome into the `STATUS`/`MESSAGE` invocation
/// result. A failure is reported, never raised.
pub fn handle_stream_event(
    event: Value,
    config: &TransformConfig,
    store: &impl ObjectStore,
) -> InvocationResult {
    match process_batch(&event, config, store) {
        Ok(summary) => InvocationResult::success(summary.records_written),
        Err(failure) => InvocationResult::failure(failure.records_written, failure.error.kind()),
    }
}

fn process_record(
    index: usize,
    raw_record: &Value,
    config: &TransformConfig,
    store: &impl ObjectStore,
) -> Result<String, TransformError> {
    let record = ChangeRecord::deserialize(raw_record).map_err(|decode_error| {
        TransformError::ImageMissing {
            event_name: EventName::Unknown,
            reason: format!("malformed change record: {decode_error}"),
        }
    })?;

    if !record.is_dynamodb_source() {
        warn!(
            component = COMPONENT,
            event = "unexpected_event_source",
            record_index = index,
            event_source = record.event_source.as_deref().unwrap_or_default(),
        );
    }

    let transformed = transform_record(&record)?;
    let key = formatted_object_key(&config.prefix, transformed.category, &transformed.record_id);

    store
        .write_object(&key, &transformed.body)
        .map_err(|message| TransformError::StoreWrite {
            key: key.clone(),
            message,
        })?;

    info!(
        component = COMPONENT,
        event = "record_written",
        record_index = index,
        key = %key,
        category = %transformed.category,
        event_name = record.event_name.as_str(),
        event_id = record.event_id.as_deref().unwrap_or_default(),
        sequence_number = record.sequence_number().unwrap_or_default(),
        approximate_creation_time = %approximate_creation_time(&record).unwrap_or_default(),
    );

    Ok(key)
}

fn approximate_creation_time(record: &ChangeRecord) -> Option<String> {
    let epoch_secs = record.approximate_creation_epoch_secs()?;
    if !epoch_secs.is_finite() {
        return None;
    }
    let millis = (epoch_secs * 1_000.0).round() as i64;
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(millis).map(|time| time.to_rfc3339())
}

fn log_batch_failed(failure: &BatchFailure, started_at: Instant) {
    error!(
        component = COMPONENT,
        event = "batch_failed",
        record_index = failure.record_index,
        records_written = failure.records_written,
        error_kind = failure.error.kind(),
        error = %failure.error,
        duration_ms = started_at.elapsed().as_millis() as u64,
    );
}

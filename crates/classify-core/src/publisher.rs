//! Result publishing seam
//!
//! Every processed output tensor yields one [`MetadataRecord`]. The record is
//! handed to a [`ResultPublisher`]; failures are reported back to the pipeline,
//! which logs them and carries on.

use crate::error::PublishError;
use crate::topk::{ClassScore, Classification};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

/// Render a presentation timestamp (ms since the epoch) as ISO-8601 UTC
///
/// Format: `YYYY-MM-DDTHH:MM:SS.mmmZ`. Timestamps outside chrono's range
/// clamp to the epoch.
pub fn format_timestamp(pts_ms: u64) -> String {
    let millis = i64::try_from(pts_ms).unwrap_or(i64::MAX);
    let time = DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_default();
    time.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Classification payload carried by a metadata record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationPayload {
    /// Network that produced the scores
    pub model: String,
    /// Output tensor the scores were read from
    pub tensor: String,
    pub classes: Vec<ClassScore>,
    pub valid: bool,
    pub pts_ms: u64,
}

impl ClassificationPayload {
    pub fn new(model: &str, tensor: &str, classification: Classification, pts_ms: u64) -> Self {
        Self {
            model: model.to_string(),
            tensor: tensor.to_string(),
            classes: classification.classes,
            valid: classification.valid,
            pts_ms,
        }
    }
}

/// One unit of transport metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub channel: u32,
    /// ISO-8601 UTC timestamp with milliseconds
    pub timestamp: String,
    /// Serialized [`ClassificationPayload`]
    pub payload: String,
}

impl MetadataRecord {
    /// Build a record from a payload, serializing it to JSON
    pub fn from_payload(
        channel: u32,
        payload: &ClassificationPayload,
    ) -> Result<Self, PublishError> {
        Ok(Self {
            channel,
            timestamp: format_timestamp(payload.pts_ms),
            payload: serde_json::to_string(payload)?,
        })
    }

    /// Decode the payload back into its structured form
    pub fn classification(&self) -> Result<ClassificationPayload, PublishError> {
        Ok(serde_json::from_str(&self.payload)?)
    }
}

/// Hands classification metadata to the transport
pub trait ResultPublisher: Send {
    fn publish(&mut self, record: MetadataRecord) -> Result<(), PublishError>;
}

/// Publisher that only logs each record
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPublisher;

impl ResultPublisher for TracingPublisher {
    fn publish(&mut self, record: MetadataRecord) -> Result<(), PublishError> {
        info!(
            channel = record.channel,
            timestamp = %record.timestamp,
            "classification: {}",
            record.payload
        );
        Ok(())
    }
}

/// Publisher that keeps every record in memory
///
/// Clones share the same buffer, so a handle kept by the caller sees what the
/// controller published.
#[derive(Debug, Default, Clone)]
pub struct CollectingPublisher {
    records: Arc<Mutex<Vec<MetadataRecord>>>,
}

impl CollectingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything published so far
    pub fn records(&self) -> Vec<MetadataRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return everything published so far
    pub fn take(&self) -> Vec<MetadataRecord> {
        std::mem::take(&mut *self.records.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl ResultPublisher for CollectingPublisher {
    fn publish(&mut self, record: MetadataRecord) -> Result<(), PublishError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        Ok(())
    }
}

//! Write side of the order-record store: validation, normalization and the
//! routing of each mutation to the owner's database shard.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::db::{RecordData, StoreRegistry};
use crate::domain::{RecordKey, UserSlug};
use crate::entities::order_records;
use crate::parser::cut_time::normalize_cut_time;
use crate::parser::dates::parse_flexible_date;
use crate::parser::money::parse_amount;
use crate::services::queries::QueryService;

/// Errors specific to record mutations.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid record key: {0}")]
    BadKey(String),

    #[error("Record not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sea_orm::DbErr> for RecordError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for RecordError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// A new record as captured by the entry form, all fields still raw text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewRecord {
    pub user: String,
    pub client: String,
    pub order_ref: String,
    pub item_count: String,
    pub entry_date: String,
    pub process_date: String,
    pub cut_time: String,
    pub notes: String,
    pub order_value: String,
}

/// A partial update; only the fields present are re-validated and applied.
/// The owner is fixed at insert time and cannot be patched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPatch {
    pub client: Option<String>,
    pub order_ref: Option<String>,
    pub item_count: Option<String>,
    pub entry_date: Option<String>,
    pub process_date: Option<String>,
    pub cut_time: Option<String>,
    pub notes: Option<String>,
    pub order_value: Option<String>,
}

/// One record as handed to the UI, with its composite routing key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordRow {
    pub key: String,
    pub user: String,
    pub client: String,
    pub order_ref: String,
    pub item_count: i32,
    pub entry_date: chrono::NaiveDate,
    pub process_date: Option<chrono::NaiveDate>,
    pub cut_time: Option<String>,
    pub notes: Option<String>,
    pub order_value: f64,
    pub created_at: String,
}

impl RecordRow {
    #[must_use]
    pub fn from_model(slug: &UserSlug, model: order_records::Model) -> Self {
        Self {
            key: RecordKey::new(slug.clone(), model.id).encode(),
            user: model.user_name,
            client: model.client_name,
            order_ref: model.order_ref,
            item_count: model.item_count,
            entry_date: model.entry_date,
            process_date: model.process_date,
            cut_time: model.cut_time,
            notes: model.notes,
            order_value: model.order_value,
            created_at: model.created_at,
        }
    }
}

pub struct RecordService {
    registry: Arc<StoreRegistry>,
    queries: Arc<QueryService>,
}

impl RecordService {
    #[must_use]
    pub const fn new(registry: Arc<StoreRegistry>, queries: Arc<QueryService>) -> Self {
        Self { registry, queries }
    }

    /// Validates and inserts a new record into the owner's shard, creating
    /// the shard on first write. Returns the composite key of the new row.
    pub async fn add_record(&self, input: NewRecord) -> Result<RecordKey, RecordError> {
        let data = validate_new_record(&input)?;

        let store = self.registry.user_store(&data.user_name).await?;
        let id = store.records().insert(data).await?;

        self.queries.invalidate_all();
        Ok(RecordKey::new(store.slug().clone(), id))
    }

    /// Applies a partial update to the record behind `key`. A key that does
    /// not decode fails before any database is touched.
    pub async fn update_record(&self, key: &str, patch: RecordPatch) -> Result<(), RecordError> {
        let key = RecordKey::decode(key).ok_or_else(|| RecordError::BadKey(key.to_string()))?;

        let store = self.registry.store_for_slug(key.slug()).await?;
        let existing = store
            .records()
            .find(key.id())
            .await?
            .ok_or(RecordError::NotFound)?;

        let merged = apply_patch(&existing, patch)?;
        if !store.records().update(key.id(), merged).await? {
            return Err(RecordError::NotFound);
        }

        self.queries.invalidate_all();
        Ok(())
    }

    /// Deletes the record behind `key`. Deleting an already-gone row is
    /// `NotFound`, not an error in the storage layer.
    pub async fn delete_record(&self, key: &str) -> Result<(), RecordError> {
        let key = RecordKey::decode(key).ok_or_else(|| RecordError::BadKey(key.to_string()))?;

        let store = self.registry.store_for_slug(key.slug()).await?;
        if !store.records().delete(key.id()).await? {
            return Err(RecordError::NotFound);
        }

        self.queries.invalidate_all();
        Ok(())
    }

    /// Fetches one record for the edit dialog.
    pub async fn get_record(&self, key: &str) -> Result<RecordRow, RecordError> {
        let key = RecordKey::decode(key).ok_or_else(|| RecordError::BadKey(key.to_string()))?;

        let store = self.registry.store_for_slug(key.slug()).await?;
        let model = store
            .records()
            .find(key.id())
            .await?
            .ok_or(RecordError::NotFound)?;

        Ok(RecordRow::from_model(key.slug(), model))
    }
}

fn validate_new_record(input: &NewRecord) -> Result<RecordData, RecordError> {
    let user = require_text(&input.user, "User")?;
    let client = require_text(&input.client, "Client")?;
    let order_ref = require_text(&input.order_ref, "Order number")?;
    let item_count = parse_item_count(&input.item_count)?;
    let entry_date = parse_entry_date(&input.entry_date)?;
    let process_date = parse_process_date(&input.process_date);
    let cut_time =
        normalize_cut_time(&input.cut_time).map_err(|e| RecordError::Validation(e.to_string()))?;
    let notes = optional_text(&input.notes);
    let order_value = parse_order_value(&input.order_value)?;

    check_date_order(entry_date, process_date)?;

    Ok(RecordData {
        user_name: user,
        client_name: client,
        order_ref,
        item_count,
        entry_date,
        process_date,
        cut_time,
        notes,
        order_value,
    })
}

/// Merges a patch over the stored row, re-validating exactly the fields the
/// patch provides.
fn apply_patch(
    existing: &order_records::Model,
    patch: RecordPatch,
) -> Result<RecordData, RecordError> {
    let client = match patch.client {
        Some(raw) => require_text(&raw, "Client")?,
        None => existing.client_name.clone(),
    };
    let order_ref = match patch.order_ref {
        Some(raw) => require_text(&raw, "Order number")?,
        None => existing.order_ref.clone(),
    };
    let item_count = match patch.item_count {
        Some(raw) => parse_item_count(&raw)?,
        None => existing.item_count,
    };
    let entry_date = match patch.entry_date {
        Some(raw) => parse_entry_date(&raw)?,
        None => existing.entry_date,
    };
    let process_date = match patch.process_date {
        Some(raw) => parse_process_date(&raw),
        None => existing.process_date,
    };
    let cut_time = match patch.cut_time {
        Some(raw) => {
            normalize_cut_time(&raw).map_err(|e| RecordError::Validation(e.to_string()))?
        }
        None => existing.cut_time.clone(),
    };
    let notes = match patch.notes {
        Some(raw) => optional_text(&raw),
        None => existing.notes.clone(),
    };
    let order_value = match patch.order_value {
        Some(raw) => parse_order_value(&raw)?,
        None => existing.order_value,
    };

    check_date_order(entry_date, process_date)?;

    Ok(RecordData {
        user_name: existing.user_name.clone(),
        client_name: client,
        order_ref,
        item_count,
        entry_date,
        process_date,
        cut_time,
        notes,
        order_value,
    })
}

fn require_text(raw: &str, label: &str) -> Result<String, RecordError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RecordError::Validation(format!("{label} is required.")));
    }
    Ok(trimmed.to_string())
}

fn optional_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_item_count(raw: &str) -> Result<i32, RecordError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RecordError::Validation("Item count is required.".into()));
    }
    let count: i32 = trimmed
        .parse()
        .map_err(|_| RecordError::Validation("Item count must be a valid number.".into()))?;
    if count <= 0 {
        return Err(RecordError::Validation(
            "Item count must be a positive number.".into(),
        ));
    }
    Ok(count)
}

fn parse_entry_date(raw: &str) -> Result<chrono::NaiveDate, RecordError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RecordError::Validation("Entry date is required.".into()));
    }
    parse_flexible_date(trimmed).ok_or_else(|| {
        RecordError::Validation("Entry date must be a valid date (YYYY-MM-DD or DD/MM/YYYY).".into())
    })
}

/// The process date is lenient: blanks, the "not processed" placeholder and
/// anything unparseable all mean the order has not been processed yet.
fn parse_process_date(raw: &str) -> Option<chrono::NaiveDate> {
    parse_flexible_date(raw)
}

fn parse_order_value(raw: &str) -> Result<f64, RecordError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RecordError::Validation("Order value is required.".into()));
    }
    let value = parse_amount(trimmed)
        .ok_or_else(|| RecordError::Validation("Order value must be a valid number.".into()))?;
    if value < 0.0 {
        return Err(RecordError::Validation(
            "Order value cannot be negative.".into(),
        ));
    }
    Ok(value)
}

fn check_date_order(
    entry: chrono::NaiveDate,
    process: Option<chrono::NaiveDate>,
) -> Result<(), RecordError> {
    if let Some(process) = process {
        if process < entry {
            return Err(RecordError::Validation(
                "Process date cannot be earlier than the entry date.".into(),
            ));
        }
    }
    Ok(())
}

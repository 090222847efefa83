use crate::entities::{order_records, prelude::*};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use sea_orm::sea_query::{Condition, Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, Set,
};

/// Filters accepted by the listing and aggregation queries.
///
/// `user` routes the query to a single shard and is resolved above this
/// layer; the remaining fields become SQL conditions inside each shard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RecordFilter {
    pub user: Option<String>,
    pub client_prefix: Option<String>,
    pub order_ref_prefix: Option<String>,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// A validated row ready for insert or update.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordData {
    pub user_name: String,
    pub client_name: String,
    pub order_ref: String,
    pub item_count: i32,
    pub entry_date: NaiveDate,
    pub process_date: Option<NaiveDate>,
    pub cut_time: Option<String>,
    pub notes: Option<String>,
    pub order_value: f64,
}

/// Aggregated totals over a filtered set of records.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RecordTotals {
    pub total_records: u64,
    pub total_items: i64,
    pub total_value: f64,
}

pub struct RecordRepository {
    conn: DatabaseConnection,
}

impl RecordRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn insert(&self, data: RecordData) -> Result<i32> {
        let model = order_records::ActiveModel {
            user_name: Set(data.user_name),
            client_name: Set(data.client_name),
            order_ref: Set(data.order_ref),
            item_count: Set(data.item_count),
            entry_date: Set(data.entry_date),
            process_date: Set(data.process_date),
            cut_time: Set(data.cut_time),
            notes: Set(data.notes),
            order_value: Set(data.order_value),
            created_at: Set(now_timestamp()),
            ..Default::default()
        };

        let result = OrderRecords::insert(model)
            .exec(&self.conn)
            .await
            .context("Failed to insert order record")?;

        Ok(result.last_insert_id)
    }

    /// Applies every field of `data` except the owner to an existing row.
    /// Returns `false` when no row has that id.
    pub async fn update(&self, id: i32, data: RecordData) -> Result<bool> {
        let Some(existing) = OrderRecords::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to load order record for update")?
        else {
            return Ok(false);
        };

        let mut active: order_records::ActiveModel = existing.into();
        active.client_name = Set(data.client_name);
        active.order_ref = Set(data.order_ref);
        active.item_count = Set(data.item_count);
        active.entry_date = Set(data.entry_date);
        active.process_date = Set(data.process_date);
        active.cut_time = Set(data.cut_time);
        active.notes = Set(data.notes);
        active.order_value = Set(data.order_value);

        active
            .update(&self.conn)
            .await
            .context("Failed to update order record")?;

        Ok(true)
    }

    /// Returns `false` when no row has that id.
    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = OrderRecords::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete order record")?;

        Ok(result.rows_affected > 0)
    }

    pub async fn find(&self, id: i32) -> Result<Option<order_records::Model>> {
        OrderRecords::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to load order record")
    }

    pub async fn list(&self, filter: &RecordFilter) -> Result<Vec<order_records::Model>> {
        let mut query = OrderRecords::find().filter(conditions(filter));

        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }
        if let Some(offset) = filter.offset {
            query = query.offset(offset);
        }

        query
            .all(&self.conn)
            .await
            .context("Failed to list order records")
    }

    pub async fn aggregate(&self, filter: &RecordFilter) -> Result<RecordTotals> {
        let rows: Vec<(i32, f64)> = OrderRecords::find()
            .select_only()
            .column(order_records::Column::ItemCount)
            .column(order_records::Column::OrderValue)
            .filter(conditions(filter))
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to aggregate order records")?;

        let mut totals = RecordTotals::default();
        for (items, value) in rows {
            totals.total_records += 1;
            totals.total_items += i64::from(items);
            totals.total_value += value;
        }

        Ok(totals)
    }

    /// Distinct non-empty values of a text column, unsorted.
    pub async fn distinct_values(&self, column: order_records::Column) -> Result<Vec<String>> {
        let values: Vec<String> = OrderRecords::find()
            .select_only()
            .column(column)
            .distinct()
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to collect distinct values")?;

        Ok(values.into_iter().filter(|v| !v.is_empty()).collect())
    }

    /// Distinct process dates, unsorted; rows still awaiting processing are
    /// skipped.
    pub async fn process_dates(&self) -> Result<Vec<NaiveDate>> {
        OrderRecords::find()
            .select_only()
            .column(order_records::Column::ProcessDate)
            .filter(order_records::Column::ProcessDate.is_not_null())
            .distinct()
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to collect process dates")
    }
}

fn now_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Builds the shared WHERE clause for listing and aggregation.
///
/// Prefix matches are case-insensitive. The date range prefers the process
/// date and only falls back to the entry date for rows not yet processed.
fn conditions(filter: &RecordFilter) -> Condition {
    let mut cond = Condition::all();

    if let Some(prefix) = filter.client_prefix.as_deref().filter(|p| !p.is_empty()) {
        cond = cond.add(
            Expr::expr(Func::upper(Expr::col(order_records::Column::ClientName)))
                .like(format!("{}%", prefix.to_uppercase())),
        );
    }

    if let Some(prefix) = filter.order_ref_prefix.as_deref().filter(|p| !p.is_empty()) {
        cond = cond.add(
            Expr::expr(Func::upper(Expr::col(order_records::Column::OrderRef)))
                .like(format!("{}%", prefix.to_uppercase())),
        );
    }

    if let Some((start, end)) = filter.date_range {
        cond = cond.add(
            Condition::any()
                .add(
                    Condition::all()
                        .add(order_records::Column::ProcessDate.is_not_null())
                        .add(order_records::Column::ProcessDate.between(start, end)),
                )
                .add(
                    Condition::all()
                        .add(order_records::Column::ProcessDate.is_null())
                        .add(order_records::Column::EntryDate.between(start, end)),
                ),
        );
    }

    cond
}

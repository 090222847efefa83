//! Read side of the order-record store: cross-shard listings, aggregates,
//! filter combo values and billing-period listings, all memoized.
//!
//! Every cache entry is keyed on `(generation, args)`. Write paths bump the
//! generation, so stale entries are never served again and simply age out of
//! the bounded caches.

use chrono::{Datelike, NaiveDate};
use moka::future::Cache;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::config::CacheConfig;
use crate::db::{RecordFilter, RecordTotals, StoreRegistry};
use crate::domain::billing;
use crate::entities::order_records;
use crate::services::records::{RecordError, RecordRow};

/// One 26th-to-25th billing window as shown in filter combos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillingPeriod {
    /// Ordinal of the window within its label year (January window = 1).
    pub number: u32,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub display: String,
}

/// Which distinct-value list a combo box is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum DistinctKind {
    Clients,
    OrderRefs,
    Months,
    Years,
}

type ScopeKey = (u64, Option<String>);

pub struct QueryService {
    registry: Arc<StoreRegistry>,
    generation: AtomicU64,
    listings: Cache<(u64, RecordFilter), Vec<RecordRow>>,
    stats: Cache<(u64, RecordFilter), RecordTotals>,
    text_lists: Cache<(u64, DistinctKind, Option<String>), Vec<String>>,
    periods_by_year: Cache<(u64, i32, Option<String>), Vec<BillingPeriod>>,
    unique_periods: Cache<ScopeKey, Vec<BillingPeriod>>,
}

impl QueryService {
    #[must_use]
    pub fn new(registry: Arc<StoreRegistry>) -> Self {
        Self::with_cache_config(registry, &CacheConfig::default())
    }

    #[must_use]
    pub fn with_cache_config(registry: Arc<StoreRegistry>, caches: &CacheConfig) -> Self {
        Self {
            registry,
            generation: AtomicU64::new(0),
            listings: Cache::builder()
                .max_capacity(caches.listing_capacity)
                .build(),
            stats: Cache::builder().max_capacity(caches.stats_capacity).build(),
            text_lists: Cache::builder().max_capacity(caches.stats_capacity).build(),
            periods_by_year: Cache::builder()
                .max_capacity(caches.period_capacity)
                .build(),
            unique_periods: Cache::builder()
                .max_capacity(caches.period_capacity)
                .build(),
        }
    }

    /// Drops every memoized result. Called by all write paths; also available
    /// to callers that mutate the database files out of band.
    pub fn invalidate_all(&self) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        self.listings.invalidate_all();
        self.stats.invalidate_all();
        self.text_lists.invalidate_all();
        self.periods_by_year.invalidate_all();
        self.unique_periods.invalidate_all();
        debug!("Query caches invalidated (generation {generation})");
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    /// Lists records matching the filter. A single shard is consulted when a
    /// user is given, otherwise every active shard in turn; rows keep their
    /// per-shard table order and limit/offset apply within each shard.
    pub async fn list_records(&self, filter: &RecordFilter) -> Result<Vec<RecordRow>, RecordError> {
        let key = (self.generation(), filter.clone());
        if let Some(hit) = self.listings.get(&key).await {
            return Ok(hit);
        }

        let stores = self.registry.stores_for_user(filter.user.as_deref()).await?;

        let mut rows = Vec::new();
        for store in stores {
            let models = store.records().list(filter).await?;
            rows.extend(
                models
                    .into_iter()
                    .map(|m| RecordRow::from_model(store.slug(), m)),
            );
        }

        self.listings.insert(key, rows.clone()).await;
        Ok(rows)
    }

    /// Accumulates record/item/value totals across the matched shards.
    /// Limit and offset play no part here.
    pub async fn aggregate_stats(
        &self,
        filter: &RecordFilter,
    ) -> Result<RecordTotals, RecordError> {
        let key = (self.generation(), filter.clone());
        if let Some(hit) = self.stats.get(&key).await {
            return Ok(hit);
        }

        let stores = self.registry.stores_for_user(filter.user.as_deref()).await?;

        let mut totals = RecordTotals::default();
        for store in stores {
            let shard = store.records().aggregate(filter).await?;
            totals.total_records += shard.total_records;
            totals.total_items += shard.total_items;
            totals.total_value += shard.total_value;
        }

        self.stats.insert(key, totals).await;
        Ok(totals)
    }

    /// Sorted distinct client names, scoped to one user or global.
    pub async fn distinct_clients(&self, user: Option<&str>) -> Result<Vec<String>, RecordError> {
        self.distinct_text(DistinctKind::Clients, user).await
    }

    /// Sorted distinct order references, scoped to one user or global.
    pub async fn distinct_order_refs(
        &self,
        user: Option<&str>,
    ) -> Result<Vec<String>, RecordError> {
        self.distinct_text(DistinctKind::OrderRefs, user).await
    }

    /// Months (`MM`, ascending) that have processed records.
    pub async fn distinct_months(&self, user: Option<&str>) -> Result<Vec<String>, RecordError> {
        self.distinct_text(DistinctKind::Months, user).await
    }

    /// Years (`YYYY`, descending) that have processed records.
    pub async fn distinct_years(&self, user: Option<&str>) -> Result<Vec<String>, RecordError> {
        self.distinct_text(DistinctKind::Years, user).await
    }

    async fn distinct_text(
        &self,
        kind: DistinctKind,
        user: Option<&str>,
    ) -> Result<Vec<String>, RecordError> {
        let key = (self.generation(), kind, user.map(str::to_string));
        if let Some(hit) = self.text_lists.get(&key).await {
            return Ok(hit);
        }

        let stores = self.registry.stores_for_user(user).await?;

        let mut set = BTreeSet::new();
        for store in stores {
            match kind {
                DistinctKind::Clients => set.extend(
                    store
                        .records()
                        .distinct_values(order_records::Column::ClientName)
                        .await?,
                ),
                DistinctKind::OrderRefs => set.extend(
                    store
                        .records()
                        .distinct_values(order_records::Column::OrderRef)
                        .await?,
                ),
                DistinctKind::Months => set.extend(
                    store
                        .records()
                        .process_dates()
                        .await?
                        .into_iter()
                        .map(|d| format!("{:02}", d.month())),
                ),
                DistinctKind::Years => set.extend(
                    store
                        .records()
                        .process_dates()
                        .await?
                        .into_iter()
                        .map(|d| d.year().to_string()),
                ),
            }
        }

        let mut values: Vec<String> = set.into_iter().collect();
        if kind == DistinctKind::Years {
            values.reverse();
        }

        self.text_lists.insert(key, values.clone()).await;
        Ok(values)
    }

    /// Billing windows offered for `year`. The current year only lists
    /// windows that actually contain processed data; past years list all
    /// twelve. Sorted by start date descending.
    pub async fn billing_periods_for_year(
        &self,
        year: i32,
        user: Option<&str>,
    ) -> Result<Vec<BillingPeriod>, RecordError> {
        let key = (self.generation(), year, user.map(str::to_string));
        if let Some(hit) = self.periods_by_year.get(&key).await {
            return Ok(hit);
        }

        let current_year = billing::current_window().start.year();
        let periods = if year == current_year {
            let dates = self.process_dates_scoped(user, Some(year), true).await?;
            periods_from_dates(&dates, year)
        } else {
            periods_full_year(year)
        };

        self.periods_by_year.insert(key, periods.clone()).await;
        Ok(periods)
    }

    /// Every billing window that contains processed data, across all years,
    /// labeled with explicit years and sorted by start date descending.
    pub async fn unique_billing_periods(
        &self,
        user: Option<&str>,
    ) -> Result<Vec<BillingPeriod>, RecordError> {
        let key = (self.generation(), user.map(str::to_string));
        if let Some(hit) = self.unique_periods.get(&key).await {
            return Ok(hit);
        }

        let dates = self.process_dates_scoped(user, None, false).await?;
        let periods = unique_periods_from_dates(&dates);

        self.unique_periods.insert(key, periods.clone()).await;
        Ok(periods)
    }

    /// Distinct process dates in scope, ascending. `year` restricts to that
    /// year, optionally extended into the next (for the December window).
    async fn process_dates_scoped(
        &self,
        user: Option<&str>,
        year: Option<i32>,
        include_next_year: bool,
    ) -> Result<Vec<NaiveDate>, RecordError> {
        let stores = self.registry.stores_for_user(user).await?;

        let mut set = BTreeSet::new();
        for store in stores {
            for date in store.records().process_dates().await? {
                if let Some(y) = year {
                    let dy = date.year();
                    let keep = if include_next_year {
                        dy == y || dy == y + 1
                    } else {
                        dy == y
                    };
                    if !keep {
                        continue;
                    }
                }
                set.insert(date);
            }
        }

        Ok(set.into_iter().collect())
    }
}

impl BillingPeriod {
    fn from_window(window: &billing::BillingWindow, display: String) -> Self {
        Self {
            number: window.label_month(),
            start: window.start,
            end: window.end,
            display,
        }
    }
}

/// Prepends the current billing window when the list does not mention it,
/// so the filter combo always offers "now" even before any data lands in it.
pub fn ensure_current_period(periods: &mut Vec<BillingPeriod>) {
    let window = billing::current_window();
    let display = window.display_short();
    if periods.iter().any(|p| p.display == display) {
        return;
    }
    periods.insert(0, BillingPeriod::from_window(&window, display));
}

/// Windows covering the given process dates, kept only when the window
/// starts in `year`, deduplicated and sorted by start descending.
fn periods_from_dates(dates: &[NaiveDate], year: i32) -> Vec<BillingPeriod> {
    let mut seen = HashSet::new();
    let mut periods = Vec::new();

    for &date in dates {
        let window = billing::window_for_date(date);
        if window.start.year() != year {
            continue;
        }
        if !seen.insert((window.start, window.end)) {
            continue;
        }
        let display = window.display_short();
        periods.push(BillingPeriod::from_window(&window, display));
    }

    periods.sort_by(|a, b| b.start.cmp(&a.start));
    periods
}

/// All twelve windows labeled by `year`, sorted by start descending.
fn periods_full_year(year: i32) -> Vec<BillingPeriod> {
    let mut periods: Vec<BillingPeriod> = (1..=12)
        .map(|month| {
            let window = billing::window_for_label(month, year);
            let display = window.display_short();
            BillingPeriod::from_window(&window, display)
        })
        .collect();

    periods.sort_by(|a, b| b.start.cmp(&a.start));
    periods
}

fn unique_periods_from_dates(dates: &[NaiveDate]) -> Vec<BillingPeriod> {
    let mut seen = HashSet::new();
    let mut periods = Vec::new();

    for &date in dates {
        let window = billing::window_for_date(date);
        if !seen.insert((window.start, window.end)) {
            continue;
        }
        let display = window.display_full();
        periods.push(BillingPeriod::from_window(&window, display));
    }

    periods.sort_by(|a, b| b.start.cmp(&a.start));
    periods
}

//! Billing-period calendar.
//!
//! Orders are invoiced in windows running from the 26th of one month to the
//! 25th of the next; the window is named after the month containing the 25th.
//! On the 10th of January the active window is 26/12..25/01, and from the
//! 26th onward a new window opens for the following month.

use chrono::{Datelike, Local, NaiveDate};

/// A single 26th-to-25th billing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl BillingWindow {
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// The month the window is named after (the one holding the 25th).
    #[must_use]
    pub fn label_month(&self) -> u32 {
        self.end.month()
    }

    /// The year of the month the window is named after.
    #[must_use]
    pub fn label_year(&self) -> i32 {
        self.end.year()
    }

    /// `DD/MM a DD/MM`, the short form used inside a single-year listing.
    #[must_use]
    pub fn display_short(&self) -> String {
        format!(
            "{} a {}",
            self.start.format("%d/%m"),
            self.end.format("%d/%m")
        )
    }

    /// `DD/MM/YYYY a DD/MM/YYYY`, used when windows from several years mix.
    #[must_use]
    pub fn display_full(&self) -> String {
        format!(
            "{} a {}",
            self.start.format("%d/%m/%Y"),
            self.end.format("%d/%m/%Y")
        )
    }
}

/// Billing month/year for a given date: day 26 rolls into the next month.
#[must_use]
pub fn period_for_date(date: NaiveDate) -> (u32, i32) {
    if date.day() >= 26 {
        if date.month() == 12 {
            (1, date.year() + 1)
        } else {
            (date.month() + 1, date.year())
        }
    } else {
        (date.month(), date.year())
    }
}

/// Billing month/year containing today.
#[must_use]
pub fn current_period() -> (u32, i32) {
    period_for_date(Local::now().date_naive())
}

/// The billing window containing a given date.
///
/// # Panics
///
/// Never: days 25 and 26 exist in every month.
#[must_use]
pub fn window_for_date(date: NaiveDate) -> BillingWindow {
    let (start, end) = if date.day() >= 26 {
        let start = NaiveDate::from_ymd_opt(date.year(), date.month(), 26)
            .expect("day 26 exists in every month");
        let end = if date.month() == 12 {
            NaiveDate::from_ymd_opt(date.year() + 1, 1, 25)
        } else {
            NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 25)
        }
        .expect("day 25 exists in every month");
        (start, end)
    } else {
        let start = if date.month() == 1 {
            NaiveDate::from_ymd_opt(date.year() - 1, 12, 26)
        } else {
            NaiveDate::from_ymd_opt(date.year(), date.month() - 1, 26)
        }
        .expect("day 26 exists in every month");
        let end = NaiveDate::from_ymd_opt(date.year(), date.month(), 25)
            .expect("day 25 exists in every month");
        (start, end)
    };

    BillingWindow { start, end }
}

/// The billing window containing today.
#[must_use]
pub fn current_window() -> BillingWindow {
    window_for_date(Local::now().date_naive())
}

/// The window labeled `month`/`year`; the January window starts on 26/12 of
/// the previous year.
///
/// # Panics
///
/// Never: days 25 and 26 exist in every month.
#[must_use]
pub fn window_for_label(month: u32, year: i32) -> BillingWindow {
    debug_assert!((1..=12).contains(&month));
    let (start, end) = if month == 1 {
        (
            NaiveDate::from_ymd_opt(year - 1, 12, 26),
            NaiveDate::from_ymd_opt(year, 1, 25),
        )
    } else {
        (
            NaiveDate::from_ymd_opt(year, month - 1, 26),
            NaiveDate::from_ymd_opt(year, month, 25),
        )
    };

    BillingWindow {
        start: start.expect("day 26 exists in every month"),
        end: end.expect("day 25 exists in every month"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_period_before_and_after_cutover() {
        assert_eq!(period_for_date(date(2025, 8, 6)), (8, 2025));
        assert_eq!(period_for_date(date(2025, 8, 25)), (8, 2025));
        assert_eq!(period_for_date(date(2025, 8, 26)), (9, 2025));
    }

    #[test]
    fn test_period_december_rolls_into_next_year() {
        assert_eq!(period_for_date(date(2025, 12, 26)), (1, 2026));
        assert_eq!(period_for_date(date(2025, 12, 25)), (12, 2025));
    }

    #[test]
    fn test_window_for_mid_january() {
        let w = window_for_date(date(2025, 1, 10));
        assert_eq!(w.start, date(2024, 12, 26));
        assert_eq!(w.end, date(2025, 1, 25));
        assert!(w.contains(date(2025, 1, 10)));
    }

    #[test]
    fn test_window_invariants_across_a_year() {
        let mut d = date(2024, 1, 1);
        while d < date(2025, 1, 1) {
            let w = window_for_date(d);
            assert_eq!(w.start.day(), 26);
            assert_eq!(w.end.day(), 25);
            assert!(w.start < w.end);
            assert!(w.contains(d), "window for {d} must contain it");

            // every date maps to exactly one window
            assert_eq!(window_for_date(w.start), w);
            assert_eq!(window_for_date(w.end), w);

            d = d.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_window_spans_roughly_one_month() {
        for m in 1..=12 {
            let w = window_for_label(m, 2024);
            let days = (w.end - w.start).num_days() + 1;
            assert!((28..=31).contains(&days), "window {m} spans {days} days");
        }
    }

    #[test]
    fn test_label_window_matches_date_window() {
        let w = window_for_label(1, 2025);
        assert_eq!(w, window_for_date(date(2025, 1, 10)));
        assert_eq!(w.label_month(), 1);
        assert_eq!(w.label_year(), 2025);
    }

    #[test]
    fn test_display_formats() {
        let w = window_for_label(2, 2025);
        assert_eq!(w.display_short(), "26/01 a 25/02");
        assert_eq!(w.display_full(), "26/01/2025 a 25/02/2025");
    }
}

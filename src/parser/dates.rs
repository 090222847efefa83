use chrono::NaiveDate;

/// Placeholder shown by list views for rows without a process date; it
/// round-trips through edit forms and must read as "no date".
const UNPROCESSED_PLACEHOLDER: &str = "Not processed";

/// Parses a business date from either ISO (`YYYY-MM-DD`) or `DD/MM/YYYY` input.
///
/// Empty input and the list-view placeholder map to `None`.
#[must_use]
pub fn parse_flexible_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == UNPROCESSED_PLACEHOLDER {
        return None;
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%d/%m/%Y"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_iso() {
        assert_eq!(
            parse_flexible_date("2025-11-06"),
            NaiveDate::from_ymd_opt(2025, 11, 6)
        );
    }

    #[test]
    fn test_parse_day_month_year() {
        assert_eq!(
            parse_flexible_date("06/11/2025"),
            NaiveDate::from_ymd_opt(2025, 11, 6)
        );
    }

    #[test]
    fn test_parse_empty_and_placeholder() {
        assert_eq!(parse_flexible_date(""), None);
        assert_eq!(parse_flexible_date("   "), None);
        assert_eq!(parse_flexible_date("Not processed"), None);
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(parse_flexible_date("2025-13-40"), None);
        assert_eq!(parse_flexible_date("11/31/2025"), None);
        assert_eq!(parse_flexible_date("yesterday"), None);
    }
}

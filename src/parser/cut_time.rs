use thiserror::Error;

/// Reasons a cut-time value can be rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CutTimeError {
    #[error("Cut time must use the HH:MM:SS format.")]
    Format,

    #[error("Cut time must contain only numbers.")]
    NonNumeric,
}

/// Normalizes a cut-time value into strict `HH:MM:SS`.
///
/// Hours are unranged (any value >= 0); minutes and seconds must fall in
/// `[0, 60)`. Empty input normalizes to `None` without error, so optional
/// form fields can be passed through untouched.
pub fn normalize_cut_time(raw: &str) -> Result<Option<String>, CutTimeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    if parts.len() != 3 {
        return Err(CutTimeError::Format);
    }

    let mut fields = [0i64; 3];
    for (slot, part) in fields.iter_mut().zip(&parts) {
        *slot = part
            .trim()
            .parse::<i64>()
            .map_err(|_| CutTimeError::NonNumeric)?;
    }
    let [hours, minutes, seconds] = fields;

    if hours < 0 || !(0..60).contains(&minutes) || !(0..60).contains(&seconds) {
        return Err(CutTimeError::Format);
    }

    Ok(Some(format!("{hours:02}:{minutes:02}:{seconds:02}")))
}

/// Converts a normalized `HH:MM:SS` value into whole seconds.
///
/// Malformed or missing values count as zero, matching how duration totals
/// are accumulated in reports.
#[must_use]
pub fn cut_time_seconds(value: Option<&str>) -> i64 {
    let Some(value) = value else {
        return 0;
    };

    let parts: Vec<&str> = value.split(':').collect();
    if parts.len() != 3 {
        return 0;
    }

    let mut fields = [0i64; 3];
    for (slot, part) in fields.iter_mut().zip(&parts) {
        match part.trim().parse::<i64>() {
            Ok(n) => *slot = n,
            Err(_) => return 0,
        }
    }
    let [hours, minutes, seconds] = fields;

    hours * 3600 + minutes * 60 + seconds
}

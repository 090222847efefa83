/// Parses a monetary amount from user input, rounded to two decimal places.
///
/// Accepts the dotted form (`1234.56`) and the Brazilian convention
/// (`1.234,56`). The plain form wins when both interpretations are possible.
#[must_use]
pub fn parse_amount(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let value = match trimmed.parse::<f64>() {
        Ok(v) => v,
        Err(_) => {
            let cleaned = trimmed.replace('.', "").replace(',', ".");
            cleaned.parse::<f64>().ok()?
        }
    };

    Some((value * 100.0).round() / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount_plain() {
        assert_eq!(parse_amount("1234.56"), Some(1234.56));
        assert_eq!(parse_amount("0"), Some(0.0));
        assert_eq!(parse_amount("  42.1  "), Some(42.1));
    }

    #[test]
    fn test_parse_amount_brazilian() {
        assert_eq!(parse_amount("1.234,56"), Some(1234.56));
        assert_eq!(parse_amount("1,5"), Some(1.5));
        assert_eq!(parse_amount("10.000,00"), Some(10000.0));
    }

    #[test]
    fn test_parse_amount_rounding() {
        assert_eq!(parse_amount("3.14159"), Some(3.14));
        assert_eq!(parse_amount("2,999"), Some(3.0));
    }

    #[test]
    fn test_parse_amount_invalid() {
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount("12,34,56"), None);
    }
}

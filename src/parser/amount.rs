/// Convert a locale-formatted amount ("15.000.000,00") to `f64`.
///
/// `.` is the thousands separator and `,` the decimal separator. Returns
/// `f64::NAN` when the token does not parse; callers check with `is_nan()`.
pub fn normalize_amount(raw: &str) -> f64 {
    let cleaned: String = raw
        .trim()
        .trim_end_matches("EUR")
        .trim_end_matches('€')
        .chars()
        .filter(|c| !matches!(c, '.' | ' ' | '\u{a0}' | '\u{202f}'))
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if cleaned.is_empty() {
        return f64::NAN;
    }
    cleaned.parse::<f64>().unwrap_or(f64::NAN)
}

/// Threshold rule: a token is a genuine amount if it carries a thousands
/// separator or its value reaches `min_amount`.
pub fn is_accepted_amount(raw: &str, min_amount: f64) -> bool {
    if raw.contains('.') {
        return true;
    }
    let value = normalize_amount(raw);
    !value.is_nan() && value >= min_amount
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands_and_decimals() {
        assert_eq!(normalize_amount("15.000.000,00"), 15_000_000.0);
        assert_eq!(normalize_amount("25.000.000,00"), 25_000_000.0);
        assert_eq!(normalize_amount("1.234,56"), 1234.56);
    }

    #[test]
    fn non_breaking_spaces_and_currency() {
        assert_eq!(normalize_amount("2\u{a0}500\u{a0}000,50"), 2_500_000.5);
        assert_eq!(normalize_amount(" 7.000 EUR"), 7000.0);
        assert_eq!(normalize_amount("7.000 €"), 7000.0);
    }

    #[test]
    fn reformat_reproduces_value() {
        let raw = "3.450.120,75";
        let value = normalize_amount(raw);
        let whole = value.trunc() as u64;
        let cents = ((value - value.trunc()) * 100.0).round() as u64;
        let digits = whole.to_string();
        let mut grouped = String::new();
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(c);
        }
        let reformatted = format!("{},{:02}", grouped, cents);
        assert_eq!(reformatted, raw);
        assert_eq!(normalize_amount(&reformatted), value);
    }

    #[test]
    fn garbage_is_nan() {
        assert!(normalize_amount("").is_nan());
        assert!(normalize_amount("n/a").is_nan());
        assert!(normalize_amount("1,2,3").is_nan());
    }

    #[test]
    fn threshold_boundary() {
        assert!(!is_accepted_amount("999", 1000.0));
        assert!(!is_accepted_amount("90", 1000.0));
        assert!(is_accepted_amount("1.000", 1000.0));
        assert!(is_accepted_amount("1000", 1000.0));
        assert!(is_accepted_amount("250.000,00", 1000.0));
        assert!(!is_accepted_amount("999,99", 1000.0));
        assert!(is_accepted_amount("999", 500.0));
    }
}

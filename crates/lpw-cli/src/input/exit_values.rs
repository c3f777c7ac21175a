use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::str::FromStr;

/// Parse a human-sized exit value: `500K`, `15M`, `1.5B` (case-insensitive),
/// or a raw number.
pub fn parse_exit_value(raw: &str) -> Result<Decimal, String> {
    let value = raw.trim().to_ascii_uppercase();

    let (digits, factor) = if let Some(base) = value.strip_suffix('B') {
        (base, dec!(1_000_000_000))
    } else if let Some(base) = value.strip_suffix('M') {
        (base, dec!(1_000_000))
    } else if let Some(base) = value.strip_suffix('K') {
        (base, dec!(1_000))
    } else {
        (value.as_str(), Decimal::ONE)
    };

    Decimal::from_str(digits)
        .map(|base| base * factor)
        .map_err(|_| format!("Invalid exit value format: {}", raw.trim()))
}

/// Parse a list of exit values, failing on the first bad entry.
pub fn parse_exit_values(raw: &[String]) -> Result<Vec<Decimal>, String> {
    raw.iter().map(|s| parse_exit_value(s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffixes() {
        assert_eq!(parse_exit_value("15M").unwrap(), dec!(15_000_000));
        assert_eq!(parse_exit_value("15m").unwrap(), dec!(15_000_000));
        assert_eq!(parse_exit_value("1.5B").unwrap(), dec!(1_500_000_000));
        assert_eq!(parse_exit_value("500K").unwrap(), dec!(500_000));
        assert_eq!(parse_exit_value("500k").unwrap(), dec!(500_000));
    }

    #[test]
    fn test_raw_numbers() {
        assert_eq!(parse_exit_value("25000000").unwrap(), dec!(25_000_000));
        assert_eq!(parse_exit_value(" 42.5 ").unwrap(), dec!(42.5));
        assert_eq!(parse_exit_value("0").unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_invalid_values() {
        assert!(parse_exit_value("").is_err());
        assert!(parse_exit_value("M").is_err());
        assert!(parse_exit_value("12Q").is_err());
        assert!(parse_exit_value("abc").is_err());
    }

    #[test]
    fn test_parse_list() {
        let values = parse_exit_values(&["15M".into(), "1.5B".into()]).unwrap();
        assert_eq!(values, vec![dec!(15_000_000), dec!(1_500_000_000)]);

        assert!(parse_exit_values(&["15M".into(), "oops".into()]).is_err());
    }
}

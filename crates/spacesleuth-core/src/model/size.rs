/// Size formatting utilities: human-readable byte counts.
///
/// All sizes are integer bytes. Floating point is only used at the
/// display-formatting boundary.

/// Shown in place of a size that could not be measured.
pub const ACCESS_DENIED: &str = "Access Denied";

const UNITS: [&str; 9] = ["B", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Format a byte count with binary (1024) magnitudes and two decimals.
///
/// Negative values are the "could not be measured" sentinel and map to
/// [`ACCESS_DENIED`]. Zero is `"0 B"`.
pub fn format_bytes(bytes: i64) -> String {
    if bytes < 0 {
        return ACCESS_DENIED.to_string();
    }
    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    // Two-decimal rounding can carry a value up to the next unit.
    if (value * 100.0).round() >= 102_400.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

/// Format a count with thousand separators.
pub fn format_count(count: u64) -> String {
    if count < 1_000 {
        return count.to_string();
    }
    let s = count.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, ch) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes_special_values() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(-5), "Access Denied");
        assert_eq!(format_bytes(-1), ACCESS_DENIED);
    }

    #[test]
    fn test_format_bytes_b() {
        assert_eq!(format_bytes(1), "1.00 B");
        assert_eq!(format_bytes(1023), "1023.00 B");
    }

    #[test]
    fn test_format_bytes_kb() {
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
    }

    #[test]
    fn test_format_bytes_larger_units() {
        assert_eq!(format_bytes(1_048_576), "1.00 MB");
        assert_eq!(format_bytes(1_073_741_824), "1.00 GB");
        assert_eq!(format_bytes(1_099_511_627_776), "1.00 TB");
        assert_eq!(format_bytes(1_125_899_906_842_624), "1.00 PB");
        assert_eq!(format_bytes(i64::MAX), "8.00 EB");
    }

    #[test]
    fn rounding_never_shows_1024_of_a_unit() {
        assert_eq!(format_bytes(1_048_575), "1.00 MB");
        assert_eq!(format_bytes(1_073_741_823), "1.00 GB");
        assert_eq!(format_bytes(1_048_570), "1023.99 KB");
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_000), "1,000");
        assert_eq!(format_count(1_234_567), "1,234,567");
    }
}

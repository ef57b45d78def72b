/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format an optional string, returning a default if None
pub fn format_optional(value: &Option<String>, default: &str) -> String {
    value.as_deref().unwrap_or(default).to_string()
}

/// Format a date string from the server to a more readable format
pub fn format_date(date: &str) -> String {
    // Server timestamps may or may not carry an offset
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(date) {
        dt.format("%d/%m/%Y").to_string()
    } else if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(date, "%Y-%m-%dT%H:%M:%S%.f") {
        dt.format("%d/%m/%Y").to_string()
    } else if let Ok(d) = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        d.format("%d/%m/%Y").to_string()
    } else {
        date.to_string()
    }
}

/// Human readable remaining lifetime, e.g. "2h 5m" or "expired"
pub fn format_remaining(seconds: i64) -> String {
    if seconds <= 0 {
        return "expired".to_string();
    }
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    match (hours, minutes) {
        (0, 0) => format!("{}s", seconds),
        (0, m) => format!("{}m", m),
        (h, m) => format!("{}h {}m", h, m),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
        assert_eq!(truncate_string("Nguyễn Văn An", 9), "Nguyễn...");
    }

    #[test]
    fn test_format_optional() {
        assert_eq!(format_optional(&None, "-"), "-");
        assert_eq!(format_optional(&Some("Huế".to_string()), "-"), "Huế");
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date("2024-03-15T10:30:00Z"), "15/03/2024");
        assert_eq!(format_date("2024-03-15T10:30:00.123456"), "15/03/2024");
        assert_eq!(format_date("1945-09-02"), "02/09/1945");
        assert_eq!(format_date("unknown"), "unknown");
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(-5), "expired");
        assert_eq!(format_remaining(42), "42s");
        assert_eq!(format_remaining(600), "10m");
        assert_eq!(format_remaining(7500), "2h 5m");
    }
}

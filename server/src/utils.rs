use std::time::{Duration, SystemTime, UNIX_EPOCH};

// Wall clock time in milliseconds since the Unix epoch
pub fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis()
        .min(u64::MAX as u128) as u64
}

// Display name for a joining player; blank names fall back to "Anonymous"
pub fn display_name(requested: Option<String>) -> String {
    requested
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "Anonymous".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_is_monotonic_enough() {
        let first = get_timestamp();
        std::thread::sleep(Duration::from_millis(2));
        assert!(get_timestamp() > first);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name(None), "Anonymous");
        assert_eq!(display_name(Some(String::new())), "Anonymous");
        assert_eq!(display_name(Some("skibidi".to_string())), "skibidi");
    }
}

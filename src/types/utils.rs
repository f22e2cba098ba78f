//! Shared utility functions for fallible row iteration.

use std::fmt::Display;

/// Filter an iterator of Results, logging errors at debug level before discarding.
///
/// Use this instead of `.filter_map(|r| r.ok())` when you want visibility into
/// what errors are being discarded.
///
/// # Example
/// ```ignore
/// let alerts: Vec<_> = results
///     .filter_map(|r| log_filter_error(r, "reading alert row"))
///     .collect();
/// ```
pub fn log_filter_error<T, E: Display>(result: Result<T, E>, context: &str) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::debug!("{}: {}", context, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter_error() {
        let ok: Result<i32, String> = Ok(3);
        let err: Result<i32, String> = Err("bad row".to_string());
        assert_eq!(log_filter_error(ok, "ctx"), Some(3));
        assert_eq!(log_filter_error(err, "ctx"), None);
    }
}

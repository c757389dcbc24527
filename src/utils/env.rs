/// Get environment variable with `PAYRUN_` prefix, falling back to the
/// unprefixed version.
///
/// Checks `PAYRUN_{key}` first, then `{key}`, so deployments can scope
/// engine settings without renaming shared variables.
///
/// # Examples
///
/// ```rust
/// use payrun::utils::get_env_with_prefix;
///
/// // Checks PAYRUN_LOG_LEVEL first, then LOG_LEVEL
/// let level = get_env_with_prefix("LOG_LEVEL");
/// ```
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("PAYRUN_{}", key))
        .or_else(|_| std::env::var(key))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_with_prefix() {
        unsafe {
            std::env::set_var("PAYRUN_UTIL_TEST_VAR", "prefixed");
        }
        assert_eq!(
            get_env_with_prefix("UTIL_TEST_VAR"),
            Some("prefixed".to_string())
        );
        unsafe {
            std::env::remove_var("PAYRUN_UTIL_TEST_VAR");
        }

        unsafe {
            std::env::set_var("UTIL_FALLBACK_VAR", "unprefixed");
        }
        assert_eq!(
            get_env_with_prefix("UTIL_FALLBACK_VAR"),
            Some("unprefixed".to_string())
        );
        unsafe {
            std::env::remove_var("UTIL_FALLBACK_VAR");
        }

        assert_eq!(get_env_with_prefix("UTIL_MISSING_VAR"), None);
    }
}

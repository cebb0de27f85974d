use std::path::PathBuf;

/// Normalize a user-provided directory argument into a PathBuf.
///
/// - Trims surrounding whitespace
/// - Strips surrounding single or double quotes if present
/// - Expands a leading '~' to the HOME directory when possible
pub fn normalize_user_input_path(input: &str) -> PathBuf {
    let trimmed = input.trim();

    let unquoted = if trimmed.len() >= 2
        && ((trimmed.starts_with('"') && trimmed.ends_with('"'))
            || (trimmed.starts_with('\'') && trimmed.ends_with('\'')))
    {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };

    if let Some(rest) = unquoted.strip_prefix('~') {
        if rest.is_empty() || rest.starts_with('/') {
            if let Some(home) = dirs::home_dir() {
                let rest = rest.trim_start_matches('/');
                return if rest.is_empty() { home } else { home.join(rest) };
            }
        }
    }

    PathBuf::from(unquoted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_quotes_and_whitespace() {
        assert_eq!(normalize_user_input_path("  downloads "), PathBuf::from("downloads"));
        assert_eq!(normalize_user_input_path("\"my mirror\""), PathBuf::from("my mirror"));
        assert_eq!(normalize_user_input_path("'gems'"), PathBuf::from("gems"));
    }

    #[test]
    fn test_expands_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(normalize_user_input_path("~"), home);
            assert_eq!(normalize_user_input_path("~/mirror"), home.join("mirror"));
        }
        assert_eq!(normalize_user_input_path("~other/x"), PathBuf::from("~other/x"));
    }
}

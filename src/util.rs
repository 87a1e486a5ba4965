// content-index/src/util.rs

use std::{
    borrow::Cow,
    path::{
        Path,
        PathBuf
    }
};


/// Wall clock as UNIX epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// RFC3339 (sortable) rendering of an epoch-millis stamp, in local time.
/// Zero means the index was never built.
pub fn format_millis(ms: i64) -> String {
    use chrono::{Local, SecondsFormat, TimeZone};
    if ms <= 0 {
        return "never".to_string();
    }
    match Local.timestamp_millis_opt(ms).single() {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
        None => format!("{ms}ms"),
    }
}

/// `"JPG"`, `".jpg"` and `" .Jpg "` all become `".jpg"`.
pub fn normalize_extension(ext: &str) -> String {
    let e = ext.trim().trim_start_matches('.').to_ascii_lowercase();
    format!(".{e}")
}

/// Case-insensitive allow-list check against a path's final extension.
/// `allowed` must already be normalized.
pub fn has_allowed_extension(path: &Path, allowed: &[String]) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    allowed
        .iter()
        .any(|a| a.len() == ext.len() + 1 && a[1..].eq_ignore_ascii_case(ext))
}

/// Expand `~` and `$VAR`/`${VAR}` without touching the filesystem.
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Absolute form of `p` without resolving symlinks. Falls back to the
/// input when the current directory is unavailable.
pub fn absolutize(p: &Path) -> PathBuf {
    let expanded = match p.to_str() {
        Some(s) => expand_path(s),
        None => p.to_path_buf(),
    };
    std::path::absolute(&expanded).unwrap_or(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_normalize() {
        assert_eq!(normalize_extension("JPG"), ".jpg");
        assert_eq!(normalize_extension(".Png"), ".png");
        assert_eq!(normalize_extension(" .gif "), ".gif");
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let allow = vec![".jpg".to_string(), ".png".to_string()];
        assert!(has_allowed_extension(Path::new("/a/b.JPG"), &allow));
        assert!(has_allowed_extension(Path::new("c.PNG"), &allow));
        assert!(!has_allowed_extension(Path::new("b.txt"), &allow));
        assert!(!has_allowed_extension(Path::new("jpg"), &allow));
        assert!(!has_allowed_extension(Path::new("x.jpeg"), &allow));
    }

    #[test]
    fn never_built_renders_as_never() {
        assert_eq!(format_millis(0), "never");
        assert!(format_millis(1_700_000_000_000).starts_with("2023-11-1"));
    }

    #[test]
    fn absolutize_keeps_absolute_paths() {
        let p = std::env::temp_dir().join("imgs");
        assert_eq!(absolutize(&p), p);
        assert!(absolutize(Path::new("rel/dir")).is_absolute());
    }
}

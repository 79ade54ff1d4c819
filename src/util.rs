//! Shared utility functions

use serde::Serialize;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Truncate a string to at most `max_chars` characters.
/// Counts characters rather than bytes so Hangul text is never split mid-codepoint.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((end, _)) => s[..end].to_string(),
        None => s.to_string(),
    }
}

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
///
/// The data is written to a temporary file in the destination directory and
/// renamed into place, so readers see either the old file or the complete new one.
/// Parent directories are created as needed. Returns the number of bytes written.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> std::io::Result<u64> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let temp_file = NamedTempFile::new_in(parent)?;
    let mut writer = BufWriter::new(temp_file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;

    let temp_file = writer.into_inner().map_err(|e| e.into_error())?;
    temp_file.as_file().sync_all()?;
    let len = temp_file.as_file().metadata()?.len();

    temp_file.persist(path).map_err(|e| e.error)?;
    Ok(len)
}

/// Format a duration in seconds as a short human string (`1h 5m`, `3m 20s`, `42s`)
pub fn format_eta(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "0s".to_string();
    }
    let secs = seconds.round() as u64;
    if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("한식당 및 분식", 3), "한식당");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 5), "");
    }

    #[test]
    fn test_write_json_atomic_creates_parents() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/dir/out.json");

        let bytes = write_json_atomic(&path, &serde_json::json!({"a": 1})).unwrap();
        assert!(bytes > 0);

        let content = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_write_json_atomic_replaces_existing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.json");

        write_json_atomic(&path, &vec![1, 2, 3]).unwrap();
        write_json_atomic(&path, &vec![4]).unwrap();

        let value: Vec<u32> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value, vec![4]);
        // No stray temp files left behind
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_format_eta() {
        assert_eq!(format_eta(42.0), "42s");
        assert_eq!(format_eta(200.0), "3m 20s");
        assert_eq!(format_eta(3900.0), "1h 5m");
        assert_eq!(format_eta(f64::NAN), "0s");
    }
}

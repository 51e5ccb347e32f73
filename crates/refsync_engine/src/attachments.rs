//! Locating submission attachments in the upload directory.
//!
//! Submissions store attachment names as the client sent them: a bare
//! name, a client-side path (either separator), or a JSON array of those.
//! The intake surface stores files as `<unixtime>_<name>`, so a stored
//! name is matched exactly first and then against that prefix form.
//! Several submissions may name the same file; each stored file is
//! handed to at most one of them per export run.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Parses a persisted attachment list into base names.
///
/// Empty entries are dropped. A value that starts with `[` but is not a
/// valid JSON array is treated as a single name.
pub fn parse_file_names(stored: &str) -> Vec<String> {
    let stored = stored.trim();
    if stored.is_empty() {
        return Vec::new();
    }

    let raw: Vec<String> = if stored.starts_with('[') {
        match serde_json::from_str::<Vec<Value>>(stored) {
            Ok(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            Err(_) => vec![stored.to_string()],
        }
    } else {
        vec![stored.to_string()]
    };

    raw.iter()
        .map(|name| base_name(name.trim()))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Finds the stored file for `name` in `dir`.
///
/// Returns `dir/name` when it exists, otherwise the `<digits>_<name>`
/// file whose stamp is closest to `created_at` (ties go to the first by
/// name). Paths in `claimed` belong to other submissions and are skipped.
pub fn resolve_file(
    dir: &Path,
    name: &str,
    created_at: DateTime<Utc>,
    claimed: &HashSet<PathBuf>,
) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }

    let direct = dir.join(name);
    if direct.is_file() && !claimed.contains(&direct) {
        return Some(direct);
    }

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = ?dir, error = %e, "Cannot list upload directory");
            return None;
        }
    };

    let target = created_at.timestamp();
    let mut candidates: Vec<(u64, PathBuf)> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| {
            let stored = entry.file_name();
            let stamp = stored.to_str().and_then(|stored| prefix_stamp(stored, name))?;
            let distance = stamp.parse::<i64>().map_or(u64::MAX, |s| s.abs_diff(target));
            Some((distance, entry.path()))
        })
        .filter(|(_, path)| !claimed.contains(path))
        .collect();
    candidates.sort();
    candidates.into_iter().next().map(|(_, path)| path)
}

/// Returns the digit prefix of a `<digits>_<name>` file name.
fn prefix_stamp<'a>(stored: &'a str, name: &str) -> Option<&'a str> {
    stored
        .strip_suffix(name)
        .and_then(|prefix| prefix.strip_suffix('_'))
        .filter(|stamp| !stamp.is_empty() && stamp.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use refsync_testkit::UploadDir;

    #[test]
    fn parses_single_names_and_arrays() {
        assert_eq!(parse_file_names("photo.jpg"), vec!["photo.jpg"]);
        assert_eq!(parse_file_names(r"C:\Users\op\i.webp"), vec!["i.webp"]);
        assert_eq!(
            parse_file_names(r#"["/tmp/a.png", "", 7, "b.jpg"]"#),
            vec!["a.png", "b.jpg"]
        );
        assert_eq!(parse_file_names("[broken"), vec!["[broken"]);
        assert!(parse_file_names("   ").is_empty());
        assert!(parse_file_names("[]").is_empty());
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn exact_name_wins_over_prefixed_variant() {
        let dir = UploadDir::new();
        dir.create("1700000000_photo.jpg", b"old");
        let exact = dir.create("photo.jpg", b"new");

        assert_eq!(
            resolve_file(dir.path(), "photo.jpg", at(1_700_000_000), &HashSet::new()),
            Some(exact)
        );
    }

    #[test]
    fn prefixed_variant_is_found() {
        let dir = UploadDir::new();
        dir.create("1700000001_photo.jpg", b"b");
        let first = dir.create("1700000000_photo.jpg", b"a");
        dir.create("draft_photo.jpg", b"c");
        dir.create("1700000000_other.jpg", b"d");

        let none = HashSet::new();
        assert_eq!(resolve_file(dir.path(), "photo.jpg", at(0), &none), Some(first));
        assert_eq!(resolve_file(dir.path(), "missing.jpg", at(0), &none), None);
    }

    #[test]
    fn closest_stamp_wins() {
        let dir = UploadDir::new();
        dir.create("1700000000_photo.jpg", b"a");
        let later = dir.create("1700000050_photo.jpg", b"b");

        assert_eq!(
            resolve_file(dir.path(), "photo.jpg", at(1_700_000_049), &HashSet::new()),
            Some(later)
        );
    }

    #[test]
    fn claimed_files_are_skipped() {
        let dir = UploadDir::new();
        let exact = dir.create("photo.jpg", b"a");
        let prefixed = dir.create("1700000000_photo.jpg", b"b");

        let mut claimed = HashSet::from([exact]);
        assert_eq!(
            resolve_file(dir.path(), "photo.jpg", at(0), &claimed),
            Some(prefixed.clone())
        );
        claimed.insert(prefixed);
        assert_eq!(resolve_file(dir.path(), "photo.jpg", at(0), &claimed), None);
    }

    #[test]
    fn missing_directory_resolves_nothing() {
        let dir = UploadDir::new();
        assert_eq!(
            resolve_file(&dir.path().join("nope"), "photo.jpg", at(0), &HashSet::new()),
            None
        );
    }
}

//! Log file naming, headers and the size-rotating file sink.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use file_rotate::compression::Compression;
use file_rotate::suffix::AppendCount;
use file_rotate::{ContentLimit, FileRotate};

use super::error::LoggingError;
use super::format::csv_record;
use crate::config::LogFormat;

/// Highest numeric suffix tried when choosing a log file name.
pub const MAX_LOG_SUFFIX: u32 = 999;

/// Size at which the active log file is rotated (1 GiB).
pub const MAX_LOG_BYTES: u64 = 1 << 30;

/// Number of rotated files kept next to the active one.
pub const LOG_BACKUP_COUNT: usize = 99;

const CSV_COLUMNS: [&str; 4] = ["Date & Time", "Traceback", "Level", "Message"];
const HTML_HEADER: &str = "<table border=\"1\"  width=\"100%\"><tr><th>Date & Time</th>\
<th>Traceback</th><th>Level</th><th>Message</th></tr>\n";
const HTML_FOOTER: &str = "</table>\n";

/// Substitute the first `$(DATE)` and first `$(TIME)` placeholder.
pub fn resolve_template(template: &str, now: NaiveDateTime) -> String {
    template
        .replacen("$(DATE)", &now.format("%Y-%m-%d").to_string(), 1)
        .replacen("$(TIME)", &now.format("%H-%M-%S").to_string(), 1)
}

/// Pick the first unused `<template>_<n>.<ext>` name, `n` in `1..=999`.
///
/// # Errors
/// Returns `LoggingError::Exhausted` when all names exist.
pub fn select_log_file(
    template: &str,
    format: LogFormat,
    now: NaiveDateTime,
) -> Result<PathBuf, LoggingError> {
    let base = resolve_template(template, now);
    (1..=MAX_LOG_SUFFIX)
        .map(|n| PathBuf::from(format!("{base}_{n}.{}", format.extension())))
        .find(|candidate| !candidate.exists())
        .ok_or_else(|| LoggingError::Exhausted {
            base: PathBuf::from(base),
        })
}

/// Create the log file's directory if needed and write the format header.
pub(crate) fn prepare_log_file(path: &Path, format: LogFormat) -> Result<(), LoggingError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|source| LoggingError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let header = match format {
        LogFormat::Csv => csv_record(CSV_COLUMNS).map_err(|e| LoggingError::Open {
            path: path.to_path_buf(),
            source: io::Error::from(e),
        })?,
        LogFormat::Html => HTML_HEADER.to_string(),
    };
    append(path, &header)
}

/// Close the structure opened by the header, if the format has one.
pub(crate) fn finalize_log_file(path: &Path, format: LogFormat) -> Result<(), LoggingError> {
    match format {
        LogFormat::Html => append(path, HTML_FOOTER),
        LogFormat::Csv => Ok(()),
    }
}

fn append(path: &Path, text: &str) -> Result<(), LoggingError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| file.write_all(text.as_bytes()))
        .map_err(|source| LoggingError::Open {
            path: path.to_path_buf(),
            source,
        })
}

/// Append-only sink that rolls over to `<path>.1 .. <path>.<backups>` once
/// it grows past `max_bytes`. `<path>.1` is always the most recent backup.
pub fn rotating_file(path: &Path, max_bytes: u64, backups: usize) -> FileRotate<AppendCount> {
    FileRotate::new(
        path,
        AppendCount::new(backups),
        ContentLimit::Bytes(usize::try_from(max_bytes).unwrap_or(usize::MAX)),
        Compression::None,
        #[cfg(unix)]
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn new_year() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(13, 5, 9)
            .unwrap()
    }

    #[test]
    fn test_resolve_template_first_occurrence_only() {
        assert_eq!(
            resolve_template("run_$(DATE)_$(TIME)", new_year()),
            "run_2024-01-01_13-05-09"
        );
        assert_eq!(
            resolve_template("$(DATE)/$(DATE)", new_year()),
            "2024-01-01/$(DATE)"
        );
        assert_eq!(resolve_template("plain", new_year()), "plain");
    }

    #[test]
    fn test_select_log_file_skips_existing() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("run_$(DATE)");
        let template = template.to_str().unwrap();

        let first = select_log_file(template, LogFormat::Csv, new_year()).unwrap();
        assert_eq!(first, dir.path().join("run_2024-01-01_1.csv"));

        std::fs::write(&first, "").unwrap();
        let second = select_log_file(template, LogFormat::Csv, new_year()).unwrap();
        assert_eq!(second, dir.path().join("run_2024-01-01_2.csv"));

        // Another format does not collide.
        let html = select_log_file(template, LogFormat::Html, new_year()).unwrap();
        assert_eq!(html, dir.path().join("run_2024-01-01_1.html"));
    }

    #[test]
    fn test_select_log_file_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        for n in 1..=MAX_LOG_SUFFIX {
            std::fs::write(dir.path().join(format!("full_{n}.csv")), "").unwrap();
        }
        let template = dir.path().join("full");

        let err = select_log_file(template.to_str().unwrap(), LogFormat::Csv, new_year())
            .unwrap_err();
        assert!(matches!(err, LoggingError::Exhausted { .. }));
    }

    #[test]
    fn test_prepare_and_finalize_html() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/logs/run_1.html");

        prepare_log_file(&path, LogFormat::Html).unwrap();
        finalize_log_file(&path, LogFormat::Html).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("<table"));
        assert!(content.ends_with("</table>\n"));
    }

    #[test]
    fn test_finalize_csv_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_1.csv");

        prepare_log_file(&path, LogFormat::Csv).unwrap();
        finalize_log_file(&path, LogFormat::Csv).unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Date & Time,Traceback,Level,Message\n"
        );
    }

    #[test]
    fn test_rotating_file_rolls_over() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roll.csv");
        let mut file = rotating_file(&path, 10, 2);

        for _ in 0..5 {
            file.write_all(b"aaaaaaaa\n").unwrap();
        }
        file.flush().unwrap();

        assert!(path.exists());
        assert!(dir.path().join("roll.csv.1").exists());
        assert!(!dir.path().join("roll.csv.3").exists());
        assert!(std::fs::metadata(&path).unwrap().len() <= 10);
    }
}

//! Media-host folder naming for projects.
//!
//! Every project owns one folder on the media host, `{root}/projects/{YYYYMMDD-HHmmss}`. The date
//! half of the suffix is the project's date; the time half is a per-date counter that only needs
//! to be unique, so the first project on a day gets `000000`, the next `000001`, and so on. The
//! unique constraint on `projects.folder` is what actually guarantees uniqueness; these helpers
//! only pick a candidate.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;

const SUFFIX_FORMAT: &str = "%Y%m%d-%H%M%S";
const SUFFIX_LEN: usize = 15;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FolderError {
    /// Every second of the day already has a folder
    #[error("no unused folder left for {0}")]
    DayExhausted(NaiveDate),

    #[error("invalid project date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
}

/// Format a date-time as a folder suffix (`YYYYMMDD-HHmmss`)
pub fn format_suffix(at: NaiveDateTime) -> String {
    at.format(SUFFIX_FORMAT).to_string()
}

/// Parse a folder suffix. Anything that is not exactly `YYYYMMDD-HHmmss` with valid calendar
/// and clock values is rejected.
pub fn parse_suffix(suffix: &str) -> Option<NaiveDateTime> {
    let bytes = suffix.as_bytes();
    if bytes.len() != SUFFIX_LEN || bytes[8] != b'-' {
        return None;
    }
    if !bytes.iter().enumerate().all(|(i, b)| i == 8 || b.is_ascii_digit()) {
        return None;
    }
    NaiveDateTime::parse_from_str(suffix, SUFFIX_FORMAT).ok()
}

/// Last `/`-separated segment of a folder path
pub fn suffix_of(folder: &str) -> &str {
    folder.rsplit('/').next().unwrap_or(folder)
}

/// Full folder path for a project suffix
pub fn project_folder(root: &str, suffix: &str) -> String {
    let root = root.trim_end_matches('/');
    if root.is_empty() {
        format!("projects/{suffix}")
    } else {
        format!("{root}/projects/{suffix}")
    }
}

/// Pick the next suffix for `date` given suffixes already in use.
///
/// The latest time already used on `date` plus one second, or midnight when the date has no
/// folders yet. Suffixes for other dates and strings that do not parse are ignored.
pub fn next_unused_suffix<'a, I>(date: NaiveDate, used: I) -> Result<String, FolderError>
where
    I: IntoIterator<Item = &'a str>,
{
    let latest = used
        .into_iter()
        .filter_map(parse_suffix)
        .filter(|at| at.date() == date)
        .max();

    let next = match latest {
        None => date.and_time(NaiveTime::MIN),
        Some(at) => {
            let next = at + Duration::seconds(1);
            if next.date() != date {
                return Err(FolderError::DayExhausted(date));
            }
            next
        }
    };

    Ok(format_suffix(next))
}

/// Number of days in a month, or `None` for an out-of-range month/year
pub fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((next_month - first).num_days() as u32)
}

/// Clamp `day` into the month, so the 31st of a 30-day month becomes the 30th
pub fn clamp_day(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let last = last_day_of_month(year, month)?;
    NaiveDate::from_ymd_opt(year, month, day.clamp(1, last))
}

/// Parse a `YYYY-MM-DD` project date, clamping the day into the month
pub fn parse_project_date(input: &str) -> Result<NaiveDate, FolderError> {
    let invalid = || FolderError::InvalidDate(input.to_string());

    let parts: Vec<&str> = input.trim().split('-').collect();
    let &[year, month, day] = parts.as_slice() else {
        return Err(invalid());
    };

    let digits = |s: &str, min: usize, max: usize| (min..=max).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit());
    if !digits(year, 4, 4) || !digits(month, 1, 2) || !digits(day, 1, 2) {
        return Err(invalid());
    }

    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    let day: u32 = day.parse().map_err(|_| invalid())?;

    if !(1..=12).contains(&month) {
        return Err(invalid());
    }

    clamp_day(year, month, day).ok_or_else(invalid)
}

/// `YYYYMMDD` of a date, used for log fields
pub fn compact_date(date: NaiveDate) -> String {
    format!("{:04}{:02}{:02}", date.year(), date.month(), date.day())
}

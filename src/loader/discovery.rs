use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::warn;

use crate::error::IngestError;
use crate::models::Period;

/// One discovered sales export and the reporting period it covers.
#[derive(Debug, Clone, PartialEq)]
pub struct SalesSource {
    pub path: PathBuf,
    pub period: Period,
}

impl SalesSource {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Finds the sales exports in a directory, one per reporting period,
/// ordered by period. Files whose names don't carry a period tag are
/// skipped with a warning.
pub fn discover_sales_files(dir: &Path) -> Result<Vec<SalesSource>, IngestError> {
    let mut sources = Vec::new();

    if !dir.exists() {
        return Ok(sources);
    }

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !is_xlsx(&path) {
            continue;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        match period_from_filename(&name) {
            Some(period) => sources.push(SalesSource { path, period }),
            None => warn!("skipping {name}: no period tag in file name"),
        }
    }

    sources.sort_by_key(|s| s.period);
    Ok(sources)
}

/// Extracts the reporting period from an export file name shaped like
/// `銷貨單毛利分析表_20250101_20250131.xlsx` (the first date's year-month).
pub fn period_from_filename(name: &str) -> Option<Period> {
    let stem = name.strip_suffix(".xlsx").unwrap_or(name);
    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() < 3 {
        return None;
    }

    let start = parts[1];
    if start.len() < 6 || !start.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let year: i32 = start[..4].parse().ok()?;
    let month: u32 = start[4..6].parse().ok()?;
    Period::new(year, month)
}

/// The newest inventory snapshot in a directory by modification time,
/// matching the dashboard's "latest file wins" behavior.
pub fn latest_inventory_file(dir: &Path) -> Result<Option<PathBuf>, IngestError> {
    if !dir.exists() {
        return Ok(None);
    }

    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !is_xlsx(&path) {
            continue;
        }
        let modified = entry
            .metadata()?
            .modified()
            .unwrap_or(SystemTime::UNIX_EPOCH);
        if newest.as_ref().is_none_or(|(t, _)| modified > *t) {
            newest = Some((modified, path));
        }
    }

    Ok(newest.map(|(_, p)| p))
}

fn is_xlsx(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_from_export_filename() {
        assert_eq!(
            period_from_filename("銷貨單毛利分析表_20250101_20250131.xlsx"),
            Period::new(2025, 1)
        );
        assert_eq!(
            period_from_filename("report_20241201_20241231.xlsx"),
            Period::new(2024, 12)
        );
    }

    #[test]
    fn test_untagged_names_rejected() {
        assert_eq!(period_from_filename("sales.xlsx"), None);
        assert_eq!(period_from_filename("a_b_c.xlsx"), None);
        assert_eq!(period_from_filename("report_2025_x.xlsx"), None);
        // month 13 is not a period
        assert_eq!(period_from_filename("report_20251301_20251331.xlsx"), None);
    }
}

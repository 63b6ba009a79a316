use std::fs;
use std::path::{Path, PathBuf};

use crate::survey::*;

const SOURCE_EXTENSIONS: [&str; 2] = ["csv", "xlsx"];

pub fn simplify_file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// The .csv and .xlsx files of a directory, sorted by name. Hidden files and
/// the lock files of open workbooks are left out.
pub fn discover_sources(dir: &Path) -> SurveyResult<Vec<PathBuf>> {
    let path = dir.display().to_string();
    let entries = fs::read_dir(dir).context(ListingSourceDirSnafu { path: path.clone() })?;
    let mut res: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let p = entry.context(ListingSourceDirSnafu { path: path.clone() })?.path();
        let name = simplify_file_name(&p);
        if !p.is_file() || name.starts_with('.') || name.starts_with("~$") {
            continue;
        }
        let supported = p
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .map(|e| SOURCE_EXTENSIONS.contains(&e.as_str()))
            .unwrap_or(false);
        if supported {
            res.push(p);
        } else {
            debug!("discover_sources: ignoring {:?}", p);
        }
    }
    res.sort();
    Ok(res)
}

/// Creates the output directory if needed and checks that it accepts files.
pub fn prepare_output_dir(dir: &Path) -> SurveyResult<()> {
    let path = dir.display().to_string();
    fs::create_dir_all(dir).context(OutputNotWritableSnafu { path: path.clone() })?;
    let probe = dir.join(".svrc_probe");
    fs::write(&probe, b"").context(OutputNotWritableSnafu { path: path.clone() })?;
    fs::remove_file(&probe).context(OutputNotWritableSnafu { path })?;
    Ok(())
}

/// Header names for a header row. Blank headers get a positional name.
pub fn header_names(cells: Vec<Cell>) -> Vec<String> {
    cells
        .into_iter()
        .enumerate()
        .map(|(idx, c)| match c {
            Some(s) if !s.trim().is_empty() => s.trim().to_string(),
            _ => format!("column_{}", idx + 1),
        })
        .collect()
}

pub fn cell_from_str(s: &str) -> Cell {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

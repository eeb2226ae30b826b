use anyhow::{anyhow, Context, Result};
use std::io::Write;
use std::path::Path;

use crate::index::Index;
use crate::tiles::{TileBounds, TileCoordinate};

/// Writes one line per indexed run: timestamp, tile count and covered area.
/// With `run`, writes that run's tile file names instead.
pub fn list_runs(index_path: &Path, run: Option<&str>, out: &mut impl Write) -> Result<()> {
    let index = Index::load(index_path)
        .with_context(|| format!("failed to read {}", index_path.display()))?;
    if let Some(run) = run {
        let files = index
            .files(run)
            .ok_or_else(|| anyhow!("run {} is not in {}", run, index_path.display()))?;
        for file in files {
            writeln!(out, "{}", file)?;
        }
        return Ok(());
    }
    if index.is_empty() {
        writeln!(out, "No runs recorded in {}", index_path.display())?;
        return Ok(());
    }
    let latest = index.latest_run();
    for (run, files) in index.runs() {
        let area = TileBounds::covering(
            files
                .iter()
                .filter_map(|name| TileCoordinate::from_file_name(name)),
        )
        .map(|bounds| bounds.to_string())
        .unwrap_or_else(|| "no tiles".to_string());
        let marker = if Some(run) == latest { " (latest)" } else { "" };
        writeln!(out, "{}  {:>5} tiles  {}{}", run, files.len(), area, marker)?;
    }
    writeln!(out, "{} runs", index.len())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarizes_each_run() {
        let root = tempfile::tempdir().unwrap();
        let index_path = root.path().join("index.json");
        let mut index = Index::default();
        index.insert(
            "2025-08-01_10-00-00",
            vec!["1040_728.png".into(), "1041_729.png".into()],
        );
        index.insert("2025-08-02_10-00-00", vec![]);
        index.save(&index_path).unwrap();

        let mut out = Vec::new();
        list_runs(&index_path, None, &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();

        assert_eq!(
            out,
            "2025-08-01_10-00-00      2 tiles  x 1040..=1041, y 728..=729\n\
             2025-08-02_10-00-00      0 tiles  no tiles (latest)\n\
             2 runs\n"
        );
    }

    #[test]
    fn lists_files_of_one_run() {
        let root = tempfile::tempdir().unwrap();
        let index_path = root.path().join("index.json");
        let mut index = Index::default();
        index.insert("2025-08-01_10-00-00", vec!["0_0.png".into(), "0_1.png".into()]);
        index.save(&index_path).unwrap();

        let mut out = Vec::new();
        list_runs(&index_path, Some("2025-08-01_10-00-00"), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "0_0.png\n0_1.png\n");

        let mut out = Vec::new();
        assert!(list_runs(&index_path, Some("2025-08-09_00-00-00"), &mut out).is_err());
    }

    #[test]
    fn reports_missing_index() {
        let root = tempfile::tempdir().unwrap();
        let mut out = Vec::new();
        list_runs(&root.path().join("index.json"), None, &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().starts_with("No runs recorded"));
    }
}

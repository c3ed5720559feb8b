//! Document loading: one task per school file, joined before aggregation.

use anyhow::{bail, Context as AnyhowContext, Result};
use lift_analytics::MissingSource;
use lift_records::{BrandSummaryDocument, SchoolReport, ScopedRecord};
use std::path::{Path, PathBuf};

pub struct LoadedSchool {
    pub source: String,
    pub report: SchoolReport,
}

/// Outcome of one batch: what parsed and what was skipped
#[derive(Default)]
pub struct LoadedBatch {
    pub schools: Vec<LoadedSchool>,
    pub failures: Vec<MissingSource>,
}

/// Load every `*.json` school document in `dir`.
///
/// Files are processed concurrently and reported in file-name order. A file
/// that cannot be read or mapped is logged and listed in `failures`; only an
/// unreadable directory or an empty one is an error.
pub async fn load_school_dir(dir: &Path) -> Result<LoadedBatch> {
    let paths = school_files(dir).await?;
    if paths.is_empty() {
        bail!("No school documents (*.json) found in {}", dir.display());
    }

    let handles: Vec<_> = paths
        .into_iter()
        .map(|path| {
            tokio::spawn(async move {
                let result = load_school(&path).await;
                (path, result)
            })
        })
        .collect();

    let mut batch = LoadedBatch::default();
    for handle in handles {
        let (path, result) = handle.await.context("School loader task failed")?;
        let source = source_name(&path);
        match result {
            Ok(report) => {
                log::debug!("Loaded {source} ({})", report.school);
                batch.schools.push(LoadedSchool { source, report });
            }
            Err(err) => {
                let reason = format!("{err:#}");
                log::warn!("Skipping {source}: {reason}");
                batch.failures.push(MissingSource { source, reason });
            }
        }
    }

    log::info!(
        "Loaded {} school documents from {} ({} skipped)",
        batch.schools.len(),
        dir.display(),
        batch.failures.len()
    );
    Ok(batch)
}

pub async fn load_brand_summary(path: &Path) -> Result<Vec<ScopedRecord>> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read brand summary {}", path.display()))?;
    let doc = BrandSummaryDocument::from_json(&bytes)
        .with_context(|| format!("Invalid brand summary {}", path.display()))?;
    Ok(doc.into_records())
}

async fn school_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to read data directory {}", dir.display()))?;

    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json && entry.file_type().await?.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

async fn load_school(path: &Path) -> Result<SchoolReport> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(SchoolReport::from_json(&bytes)?)
}

fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

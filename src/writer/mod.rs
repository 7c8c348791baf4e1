//! Persisting batch results: workbooks, summary, error log, and a bundle

use crate::core::batch::BatchOutcome;
use crate::core::summary::summary_table;
use crate::error::MergeResult;
use crate::excel::{to_csv_bytes, WorkbookExporter};
use std::collections::HashSet;
use std::fs;
use std::io::{Cursor, Write};
use std::path::PathBuf;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const SUMMARY_WORKBOOK: &str = "summary.xlsx";
pub const SUMMARY_CSV: &str = "summary.csv";
pub const ERROR_LOG: &str = "error_log.txt";
pub const BUNDLE: &str = "all_outputs.zip";

/// Files written for one batch
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WrittenOutputs {
    pub workbooks: Vec<PathBuf>,
    pub summary_workbook: PathBuf,
    pub summary_csv: PathBuf,
    pub error_log: PathBuf,
    pub bundle: PathBuf,
}

/// An output file held in memory before it is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Writes a batch outcome into an output directory
///
/// Layout:
/// - `{container stem}.xlsx`, one sheet per ingested member
/// - `summary.xlsx` with a `Summary` pivot sheet and a `Details` sheet
/// - `summary.csv` with the pivot
/// - `error_log.txt`
/// - `all_outputs.zip` holding all of the above
pub struct OutputWriter {
    dir: PathBuf,
}

impl OutputWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Render every output file of `outcome` in memory, bundle last
    ///
    /// A container whose workbook cannot be rendered is dropped from
    /// `outcome` and logged; the other outputs are still produced.
    pub fn artifacts(outcome: &mut BatchOutcome) -> MergeResult<Vec<Artifact>> {
        let mut artifacts = Vec::new();
        let mut used = HashSet::new();
        let mut failed = Vec::new();

        for (idx, container) in outcome.containers.iter().enumerate() {
            let sheets = container.sheets.iter().map(|(id, table)| (id.as_str(), table));
            match WorkbookExporter::from_sheets(sheets).and_then(WorkbookExporter::to_buffer) {
                Ok(bytes) => {
                    let name = unique_workbook_name(&container.stem(), &mut used);
                    artifacts.push(Artifact { name, bytes });
                }
                Err(e) => failed.push((idx, e)),
            }
        }
        for (idx, error) in failed.iter().rev() {
            outcome.discard_container(*idx, error);
        }

        let details = summary_table(&outcome.summary);
        let summary = WorkbookExporter::from_sheets([("Summary", &outcome.pivot), ("Details", &details)])?
            .to_buffer()?;
        artifacts.push(Artifact {
            name: SUMMARY_WORKBOOK.to_string(),
            bytes: summary,
        });
        artifacts.push(Artifact {
            name: SUMMARY_CSV.to_string(),
            bytes: to_csv_bytes(&outcome.pivot)?,
        });
        artifacts.push(Artifact {
            name: ERROR_LOG.to_string(),
            bytes: outcome.errors.render().into_bytes(),
        });

        let bundle = bundle(&artifacts)?;
        artifacts.push(Artifact {
            name: BUNDLE.to_string(),
            bytes: bundle,
        });
        Ok(artifacts)
    }

    /// Write every output file to the directory, creating it if needed
    pub fn write(&self, outcome: &mut BatchOutcome) -> MergeResult<WrittenOutputs> {
        fs::create_dir_all(&self.dir)?;
        let mut written = WrittenOutputs::default();

        for artifact in Self::artifacts(outcome)? {
            let path = self.dir.join(&artifact.name);
            fs::write(&path, &artifact.bytes)?;
            tracing::debug!(path = %path.display(), bytes = artifact.bytes.len(), "output written");
            match artifact.name.as_str() {
                SUMMARY_WORKBOOK => written.summary_workbook = path,
                SUMMARY_CSV => written.summary_csv = path,
                ERROR_LOG => written.error_log = path,
                BUNDLE => written.bundle = path,
                _ => written.workbooks.push(path),
            }
        }
        Ok(written)
    }
}

/// `{stem}.xlsx`, suffixed `_1`, `_2`, ... if the name is taken or reserved
fn unique_workbook_name(stem: &str, used: &mut HashSet<String>) -> String {
    let reserved = |name: &str| name == SUMMARY_WORKBOOK;
    let mut name = format!("{}.xlsx", stem);
    let mut n = 1;
    while reserved(&name.to_lowercase()) || used.contains(&name.to_lowercase()) {
        name = format!("{}_{}.xlsx", stem, n);
        n += 1;
    }
    used.insert(name.to_lowercase());
    name
}

/// Zip the artifacts, in order, with deflate compression
pub fn bundle(artifacts: &[Artifact]) -> MergeResult<Vec<u8>> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for artifact in artifacts {
        zip.start_file(artifact.name.as_str(), options)?;
        zip.write_all(&artifact.bytes)?;
    }
    Ok(zip.finish()?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BatchOrchestrator, BatchStatus};
    use crate::ingest::{ContainerInput, MemberBlob};
    use zip::ZipArchive;

    const GOOD: &str = "S/N,Name\n1,a\n2,b\n";

    fn outcome() -> BatchOutcome {
        BatchOrchestrator::default().run(vec![
            ContainerInput::new("north.zip", vec![MemberBlob::new("a.csv", GOOD.as_bytes())]),
            ContainerInput::new("other/north.zip", vec![MemberBlob::new("b.csv", GOOD.as_bytes())]),
            ContainerInput::new("summary.zip", vec![MemberBlob::new("c.csv", "x\n")]),
        ])
    }

    #[test]
    fn test_artifact_names() {
        let artifacts = OutputWriter::artifacts(&mut outcome()).unwrap();
        let names: Vec<&str> = artifacts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "north.xlsx",
                "north_1.xlsx",
                "summary.xlsx",
                "summary.csv",
                "error_log.txt",
                "all_outputs.zip"
            ]
        );
    }

    #[test]
    fn test_summary_csv_and_error_log_contents() {
        let artifacts = OutputWriter::artifacts(&mut outcome()).unwrap();
        let find = |name: &str| {
            artifacts
                .iter()
                .find(|a| a.name == name)
                .map(|a| String::from_utf8(a.bytes.clone()).unwrap())
                .unwrap()
        };
        assert_eq!(find("summary.csv"), "Member,north.zip,other/north.zip\na.csv,2,0\nb.csv,0,2\n");
        assert!(find("error_log.txt").contains("c.csv inside summary.zip"));
    }

    #[test]
    fn test_write_creates_directory_and_bundle() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("nested/out");
        let written = OutputWriter::new(&out).write(&mut outcome()).unwrap();

        assert_eq!(written.workbooks.len(), 2);
        assert!(written.summary_workbook.exists());
        assert!(written.error_log.exists());

        let bytes = fs::read(&written.bundle).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 5);
        assert_eq!(archive.by_index(0).unwrap().name(), "north.xlsx");
    }

    #[test]
    fn test_oversized_cell_drops_only_its_container() {
        let long = format!("S/N,Note\n1,{}\n", "x".repeat(40_000));
        let mut outcome = BatchOrchestrator::default().run(vec![
            ContainerInput::new("good.zip", vec![MemberBlob::new("a.csv", GOOD.as_bytes())]),
            ContainerInput::new("bad.zip", vec![MemberBlob::new("b.csv", long.into_bytes())]),
        ]);
        assert_eq!(outcome.status, BatchStatus::Success);

        let artifacts = OutputWriter::artifacts(&mut outcome).unwrap();
        let names: Vec<&str> = artifacts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["good.xlsx", "summary.xlsx", "summary.csv", "error_log.txt", "all_outputs.zip"]
        );
        assert_eq!(outcome.status, BatchStatus::Partial);
        assert_eq!(outcome.containers.len(), 1);

        let log = artifacts
            .iter()
            .find(|a| a.name == ERROR_LOG)
            .map(|a| String::from_utf8_lossy(&a.bytes).into_owned())
            .unwrap();
        assert!(log.contains("bad.zip"));
        assert!(log.contains("Workbook not written"));
    }

    #[test]
    fn test_all_workbooks_failing_is_failure() {
        let long = format!("S/N,Note\n1,{}\n", "x".repeat(40_000));
        let mut outcome = BatchOrchestrator::default().run(vec![ContainerInput::new(
            "bad.zip",
            vec![MemberBlob::new("b.csv", long.into_bytes())],
        )]);
        OutputWriter::artifacts(&mut outcome).unwrap();
        assert_eq!(outcome.status, BatchStatus::Failure);
    }
}

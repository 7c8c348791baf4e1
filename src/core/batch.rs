//! Batch orchestration across containers
//!
//! For every member of every container, in input order:
//! 1. allocate a sheet id
//! 2. decode the bytes into a grid
//! 3. detect the header and extract the data table
//!
//! Failures never escape a run. Each one is logged against
//! `"{member} inside {container}"`; with the default isolation it also ends
//! processing of that container's remaining members.

use crate::config::{Isolation, MergeConfig, SheetIdScope};
use crate::core::summary::pivot_row_counts;
use crate::error::{MergeError, MergeResult};
use crate::excel::GridReader;
use crate::ingest::header::HeaderDetector;
use crate::ingest::sheet_id::SheetIdAllocator;
use crate::ingest::{ContainerInput, MemberBlob};
use crate::types::{file_stem, ErrorLog, SourceDescriptor, SummaryEntry, Table};
use serde::Serialize;

/// One item of batch input
#[derive(Debug)]
pub enum BatchInput {
    Container(ContainerInput),
    /// A container that could not be opened at all
    Unreadable { name: String, error: MergeError },
}

impl From<ContainerInput> for BatchInput {
    fn from(container: ContainerInput) -> Self {
        BatchInput::Container(container)
    }
}

impl BatchInput {
    /// Wrap the result of opening a container
    pub fn from_result(name: impl Into<String>, result: MergeResult<ContainerInput>) -> Self {
        match result {
            Ok(container) => BatchInput::Container(container),
            Err(error) => BatchInput::Unreadable {
                name: name.into(),
                error,
            },
        }
    }
}

/// Sheets produced for one container, in member order
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerOutput {
    pub name: String,
    pub sheets: Vec<(String, Table)>,
}

impl ContainerOutput {
    /// Container name without path or extension, used for its workbook name
    pub fn stem(&self) -> String {
        let stem = file_stem(&self.name);
        if stem.is_empty() {
            "container".to_string()
        } else {
            stem
        }
    }

    pub fn total_rows(&self) -> usize {
        self.sheets.iter().map(|(_, t)| t.row_count()).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    /// Output produced, nothing went wrong
    Success,
    /// Output produced, some members failed
    Partial,
    /// No output at all
    Failure,
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub containers: Vec<ContainerOutput>,
    pub summary: Vec<SummaryEntry>,
    pub pivot: Table,
    pub errors: ErrorLog,
    pub status: BatchStatus,
}

impl BatchOutcome {
    pub fn sheet_count(&self) -> usize {
        self.containers.iter().map(|c| c.sheets.len()).sum()
    }

    pub fn total_rows(&self) -> usize {
        self.summary.iter().map(|e| e.rows).sum()
    }

    /// Drop a container whose output could not be written
    ///
    /// The failure is logged against the container and the status is
    /// derived again from what is left.
    pub fn discard_container(&mut self, idx: usize, error: &MergeError) -> Option<ContainerOutput> {
        if idx >= self.containers.len() {
            return None;
        }
        let container = self.containers.remove(idx);
        tracing::warn!(container = %container.name, error = %error, "container output dropped");
        self.errors
            .error(container.name.as_str(), format!("Workbook not written: {}", error));
        self.status = derive_status(&self.containers, &self.errors);
        Some(container)
    }
}

fn derive_status(containers: &[ContainerOutput], errors: &ErrorLog) -> BatchStatus {
    let produced = containers.iter().any(|c| !c.sheets.is_empty());
    match (produced, errors.has_problems()) {
        (false, _) => BatchStatus::Failure,
        (true, true) => BatchStatus::Partial,
        (true, false) => BatchStatus::Success,
    }
}

/// Mutable state of one run, owned by the orchestrator for its duration
#[derive(Debug, Default)]
pub struct BatchContext {
    pub allocator: SheetIdAllocator,
    pub errors: ErrorLog,
    pub summary: Vec<SummaryEntry>,
    pub containers: Vec<ContainerOutput>,
}

impl BatchContext {
    pub fn new(max_sheet_id_len: usize) -> Self {
        Self {
            allocator: SheetIdAllocator::new(max_sheet_id_len),
            ..Self::default()
        }
    }

    fn into_outcome(self) -> BatchOutcome {
        let status = derive_status(&self.containers, &self.errors);
        BatchOutcome {
            pivot: pivot_row_counts(&self.summary),
            containers: self.containers,
            summary: self.summary,
            errors: self.errors,
            status,
        }
    }
}

pub struct BatchOrchestrator {
    detector: HeaderDetector,
    reader: GridReader,
    isolation: Isolation,
    scope: SheetIdScope,
    max_sheet_id_len: usize,
}

impl Default for BatchOrchestrator {
    fn default() -> Self {
        let config = MergeConfig::default();
        Self {
            detector: HeaderDetector::new(),
            reader: GridReader::new(),
            isolation: config.batch.isolation,
            scope: config.sheet_ids.scope,
            max_sheet_id_len: config.sheet_ids.max_len,
        }
    }
}

impl BatchOrchestrator {
    pub fn new(config: &MergeConfig) -> MergeResult<Self> {
        Ok(Self {
            detector: HeaderDetector::from_config(config)?,
            reader: GridReader::new(),
            isolation: config.batch.isolation,
            scope: config.sheet_ids.scope,
            max_sheet_id_len: config.sheet_ids.max_len,
        })
    }

    pub fn with_isolation(mut self, isolation: Isolation) -> Self {
        self.isolation = isolation;
        self
    }

    /// Process every input in order; never fails
    pub fn run<I, T>(&self, inputs: I) -> BatchOutcome
    where
        I: IntoIterator<Item = T>,
        T: Into<BatchInput>,
    {
        let mut ctx = BatchContext::new(self.max_sheet_id_len);
        for input in inputs {
            match input.into() {
                BatchInput::Container(container) => self.process_container(&mut ctx, &container),
                BatchInput::Unreadable { name, error } => {
                    tracing::warn!(container = %name, error = %error, "container unreadable");
                    ctx.errors.error(name, error.to_string());
                }
            }
        }
        let outcome = ctx.into_outcome();
        tracing::info!(
            containers = outcome.containers.len(),
            sheets = outcome.sheet_count(),
            rows = outcome.total_rows(),
            problems = outcome.errors.error_count(),
            status = ?outcome.status,
            "batch finished"
        );
        outcome
    }

    fn process_container(&self, ctx: &mut BatchContext, container: &ContainerInput) {
        if container.members.is_empty() {
            ctx.errors
                .warning(container.name.as_str(), "No supported files in container");
            return;
        }
        if self.scope == SheetIdScope::Container {
            ctx.allocator.clear();
        }

        tracing::info!(container = %container.name, members = container.members.len(), "processing container");
        let mut output = ContainerOutput {
            name: container.name.clone(),
            sheets: Vec::new(),
        };

        for member in &container.members {
            let source = SourceDescriptor::new(container.name.as_str(), member.name.as_str());

            // Allocated before decoding, so a failed member still holds its id
            let allocation = ctx.allocator.allocate_detailed(&member.name);
            if let Some(base) = &allocation.reused_base {
                ctx.errors.info(
                    source.label(),
                    format!("Sheet name `{}` already used, written as `{}`", base, allocation.id),
                );
            }

            match self.process_member(member, &source) {
                Ok(table) => {
                    tracing::debug!(
                        container = %container.name,
                        member = %member.name,
                        sheet = %allocation.id,
                        rows = table.row_count(),
                        "member ingested"
                    );
                    ctx.summary.push(SummaryEntry::new(
                        container.name.as_str(),
                        member.name.as_str(),
                        table.row_count(),
                    ));
                    output.sheets.push((allocation.id, table));
                }
                Err(error) => {
                    tracing::warn!(source = %source.label(), error = %error, "member failed");
                    ctx.errors.error(source.label(), error.to_string());
                    if self.isolation == Isolation::Container {
                        break;
                    }
                }
            }
        }

        if !output.sheets.is_empty() {
            ctx.containers.push(output);
        }
    }

    /// Decode and detect one member; zero data rows is an error
    pub fn process_member(&self, member: &MemberBlob, source: &SourceDescriptor) -> MergeResult<Table> {
        let grid = self.reader.read(&member.name, &member.bytes)?;
        let mut table = self.detector.analyze(&grid).into_result()?;
        table.name = source.stem();
        Ok(table.with_source(source.clone()))
    }
}

/// Run a batch with the given configuration
pub fn run_batch<I, T>(inputs: I, config: &MergeConfig) -> MergeResult<BatchOutcome>
where
    I: IntoIterator<Item = T>,
    T: Into<BatchInput>,
{
    Ok(BatchOrchestrator::new(config)?.run(inputs))
}

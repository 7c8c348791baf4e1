use crate::config::MergeConfig;
use crate::core::{
    derive_char_column, flag_changes, outer_join, run_batch, select_columns, sort_rows,
    source_template, strict_concat, union_concat, BatchInput, BatchOutcome, BatchStatus,
    ConcatOptions, ProvenanceStyle, BAND_COLUMN, BAND_POSITION,
};
use crate::error::{MergeError, MergeResult};
use crate::excel::{write_csv, GridReader, WorkbookExporter};
use crate::ingest::{
    open_path, table_from_first_row, ContainerInput, Detection, HeaderDetector, MemberBlob,
    SheetIdAllocator,
};
use crate::types::{
    extension, ErrorEntry, ErrorLog, Severity, SourceDescriptor, SummaryEntry, Table,
};
use crate::writer::OutputWriter;
use colored::Colorize;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

//==============================================================================
// Shared helpers
//==============================================================================

/// Reads member files into tables, with or without header detection
struct TableLoader {
    reader: GridReader,
    detector: Option<HeaderDetector>,
    placeholder_prefix: String,
}

impl TableLoader {
    fn new(config: &MergeConfig, detect: bool) -> MergeResult<Self> {
        let detector = if detect {
            Some(HeaderDetector::from_config(config)?)
        } else {
            None
        };
        Ok(Self {
            reader: GridReader::new(),
            detector,
            placeholder_prefix: config.header.placeholder_prefix.clone(),
        })
    }

    fn load_member(&self, container: &ContainerInput, member: &MemberBlob) -> MergeResult<Table> {
        let source = SourceDescriptor::new(container.name.as_str(), member.name.as_str());
        let grid = self.reader.read(&member.name, &member.bytes)?;
        let mut table = match &self.detector {
            Some(detector) => detector.analyze(&grid).into_result()?,
            None => table_from_first_row(&grid, &self.placeholder_prefix),
        };
        table.name = source.stem();
        Ok(table.with_source(source))
    }

    /// Every member behind `path`, failing on the first bad one
    fn load_path(&self, path: &Path) -> MergeResult<Vec<Table>> {
        let container = open_path(path)?;
        container
            .members
            .iter()
            .map(|member| self.load_member(&container, member))
            .collect()
    }

    fn load_all(&self, paths: &[PathBuf]) -> MergeResult<Vec<Table>> {
        let mut tables = Vec::new();
        for path in paths {
            tables.extend(self.load_path(path)?);
        }
        Ok(tables)
    }
}

/// Write a table as CSV or a one-sheet workbook, chosen by extension
fn write_table(table: &Table, output: &Path) -> MergeResult<()> {
    let name = output.to_string_lossy();
    match extension(&name).as_str() {
        "csv" => write_csv(table, output),
        "xlsx" => {
            let sheet = SheetIdAllocator::default().allocate(&name);
            WorkbookExporter::from_sheets([(sheet.as_str(), table)])?.save(output)
        }
        _ => Err(MergeError::Validation(format!(
            "Output file must end in .csv or .xlsx: {}",
            output.display()
        ))),
    }
}

fn print_log(log: &ErrorLog) {
    if log.is_empty() {
        return;
    }
    println!("{}", "📋 Problems:".bold().yellow());
    for entry in log.entries() {
        let line = format!("{}: {}", entry.source, entry.message);
        match entry.severity {
            Severity::Info => println!("   ℹ️  {}", line.dimmed()),
            Severity::Warning => println!("   ⚠️  {}", line.yellow()),
            Severity::Error => println!("   ❌ {}", line.red()),
        }
    }
    println!();
}

fn print_table_stats(table: &Table) {
    println!(
        "   {} rows x {} columns",
        table.row_count().to_string().bold(),
        table.column_count()
    );
}

/// File name a table was read from, or its table name
fn source_name(table: &Table) -> String {
    table
        .source()
        .map(|s| s.file_name().to_string())
        .unwrap_or_else(|| table.name.clone())
}

/// Render a table as aligned text columns
fn format_matrix(table: &Table) -> String {
    let widths: Vec<usize> = table
        .columns()
        .iter()
        .map(|c| {
            c.values
                .iter()
                .map(|v| v.as_text().chars().count())
                .chain(std::iter::once(c.name.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut lines = Vec::with_capacity(table.row_count() + 1);
    let header: Vec<String> = table
        .column_names()
        .iter()
        .zip(&widths)
        .map(|(name, w)| format!("{:<w$}", name, w = *w))
        .collect();
    lines.push(header.join("  "));
    for row in 0..table.row_count() {
        let cells: Vec<String> = table
            .row(row)
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{:<w$}", cell.as_text(), w = *w))
            .collect();
        lines.push(cells.join("  "));
    }
    lines.join("\n")
}

//==============================================================================
// batch
//==============================================================================

/// JSON run report written by `batch --report`
#[derive(Debug, Serialize)]
struct BatchReport<'a> {
    run_id: String,
    generated_at: String,
    status: BatchStatus,
    containers: usize,
    sheets: usize,
    total_rows: usize,
    summary: &'a [SummaryEntry],
    errors: &'a [ErrorEntry],
}

impl<'a> BatchReport<'a> {
    fn new(outcome: &'a BatchOutcome) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            status: outcome.status,
            containers: outcome.containers.len(),
            sheets: outcome.sheet_count(),
            total_rows: outcome.total_rows(),
            summary: &outcome.summary,
            errors: outcome.errors.entries(),
        }
    }
}

/// Execute the batch command
pub fn batch(
    inputs: Vec<PathBuf>,
    output_dir: PathBuf,
    report: Option<PathBuf>,
    config: &MergeConfig,
) -> MergeResult<()> {
    println!("{}", "📦 SheetMerge - Batch consolidation".bold().green());
    println!("   Inputs: {}", inputs.len());
    println!("   Output: {}\n", output_dir.display());

    let batch_inputs: Vec<BatchInput> = inputs
        .iter()
        .map(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            BatchInput::from_result(name, open_path(path))
        })
        .collect();

    let mut outcome = run_batch(batch_inputs, config)?;

    for container in &outcome.containers {
        println!(
            "   📊 {} ({} sheets, {} rows)",
            container.name.bright_blue().bold(),
            container.sheets.len(),
            container.total_rows()
        );
        for (sheet, table) in &container.sheets {
            println!("      {} ({} rows)", sheet.cyan(), table.row_count());
        }
    }
    println!();

    let written = OutputWriter::new(&output_dir).write(&mut outcome)?;

    if outcome.pivot.row_count() > 0 {
        println!("{}", "🔢 Row counts per file per container:".bold().cyan());
        for line in format_matrix(&outcome.pivot).lines() {
            println!("   {}", line);
        }
        println!();
    }

    print_log(&outcome.errors);

    if let Some(report_path) = report {
        let json = serde_json::to_string_pretty(&BatchReport::new(&outcome))?;
        fs::write(&report_path, json)?;
        println!("   Report: {}", report_path.display());
    }

    println!("   Bundle: {}", written.bundle.display());
    match outcome.status {
        BatchStatus::Success => {
            println!("{}", "✅ Batch complete".bold().green());
            Ok(())
        }
        BatchStatus::Partial => {
            println!(
                "{}",
                format!(
                    "⚠️  Batch complete with {} error(s)",
                    outcome.errors.error_count()
                )
                .bold()
                .yellow()
            );
            Ok(())
        }
        BatchStatus::Failure => {
            println!("{}", "❌ No output produced".bold().red());
            Err(MergeError::Validation(
                "Batch produced no output; see error_log.txt".to_string(),
            ))
        }
    }
}

//==============================================================================
// merge
//==============================================================================

/// Execute the merge command: every member becomes one sheet of one workbook
pub fn merge(
    inputs: Vec<PathBuf>,
    output: PathBuf,
    detect: bool,
    config: &MergeConfig,
) -> MergeResult<()> {
    println!("{}", "📊 SheetMerge - Merge into one workbook".bold().green());
    println!("   Output: {}\n", output.display());

    let loader = TableLoader::new(config, detect)?;
    let mut allocator = SheetIdAllocator::new(config.sheet_ids.max_len);
    let mut sheets: Vec<(String, Table)> = Vec::new();
    let mut failure: Option<(String, MergeError)> = None;

    'inputs: for path in &inputs {
        let container = match open_path(path) {
            Ok(container) => container,
            Err(e) => {
                failure = Some((path.display().to_string(), e));
                break;
            }
        };
        if container.members.is_empty() {
            println!("   ⚠️  No supported files in {}", container.name.yellow());
        }
        for member in &container.members {
            let sheet = allocator.allocate(&member.name);
            match loader.load_member(&container, member) {
                Ok(table) => {
                    println!(
                        "   ✅ {} → {} ({} rows)",
                        member.name,
                        sheet.cyan(),
                        table.row_count()
                    );
                    sheets.push((sheet, table));
                }
                Err(e) => {
                    let label = SourceDescriptor::new(container.name.as_str(), member.name.as_str()).label();
                    failure = Some((label, e));
                    break 'inputs;
                }
            }
        }
    }

    if !sheets.is_empty() {
        WorkbookExporter::from_sheets(sheets.iter().map(|(name, table)| (name.as_str(), table)))?
            .save(&output)?;
        println!("\n   Workbook: {} ({} sheets)", output.display(), sheets.len());
    }

    match failure {
        Some((label, e)) => {
            println!("{}", format!("❌ Stopped at {}: {}", label, e).bold().red());
            Err(e)
        }
        None => {
            println!("{}", "✅ Merge complete".bold().green());
            Ok(())
        }
    }
}

//==============================================================================
// concat
//==============================================================================

/// Execute the concat command
pub fn concat(
    files: Vec<PathBuf>,
    output: PathBuf,
    align: bool,
    detect: bool,
    config: &MergeConfig,
) -> MergeResult<()> {
    let mode = if align { "aligned" } else { "strict" };
    println!("{}", format!("🔗 SheetMerge - Concatenate ({})", mode).bold().green());
    println!("   Files:  {}", files.len());
    println!("   Output: {}\n", output.display());

    let tables = TableLoader::new(config, detect)?.load_all(&files)?;
    let options = ConcatOptions::new(config.provenance_column.clone());
    let combined = if align {
        union_concat(&tables, &options)?
    } else {
        strict_concat(&tables, &options)?
    };

    write_table(&combined, &output)?;
    print_table_stats(&combined);
    println!("{}", "✅ Concatenation complete".bold().green());
    Ok(())
}

//==============================================================================
// extract
//==============================================================================

/// Execute the extract command: keep the listed columns of every file
pub fn extract(
    files: Vec<PathBuf>,
    columns: Vec<String>,
    output: PathBuf,
    detect: bool,
    config: &MergeConfig,
) -> MergeResult<()> {
    println!("{}", "✂️  SheetMerge - Extract columns".bold().green());
    println!("   Columns: {}", columns.join(", ").bright_blue());
    println!("   Output:  {}\n", output.display());

    let loader = TableLoader::new(config, detect)?;
    let mut log = ErrorLog::new();
    let mut tables = Vec::new();

    for path in &files {
        let container = match open_path(path) {
            Ok(container) => container,
            Err(e) => {
                log.error(path.display().to_string(), e.to_string());
                continue;
            }
        };
        for member in &container.members {
            let source = SourceDescriptor::new(container.name.as_str(), member.name.as_str());
            match loader
                .load_member(&container, member)
                .and_then(|table| select_columns(&table, &columns))
            {
                Ok(table) => {
                    println!("   ✅ {}", source.label());
                    tables.push(table);
                }
                Err(e) => log.error(source.label(), e.to_string()),
            }
        }
    }
    println!();
    print_log(&log);

    if tables.is_empty() {
        return Err(MergeError::Validation(
            "No files were processed successfully".to_string(),
        ));
    }

    let options = ConcatOptions::new("File").with_style(ProvenanceStyle::FileName);
    let combined = strict_concat(&tables, &options)?;
    write_table(&combined, &output)?;
    print_table_stats(&combined);
    println!("{}", "✅ Extraction complete".bold().green());
    Ok(())
}

//==============================================================================
// join
//==============================================================================

/// Execute the join command
#[allow(clippy::too_many_arguments)]
pub fn join(
    base: PathBuf,
    companions: Vec<PathBuf>,
    key: String,
    extra: Vec<String>,
    base_columns: Vec<String>,
    sort_by: Vec<String>,
    template: bool,
    template_ids: Vec<String>,
    output: PathBuf,
    detect: bool,
    config: &MergeConfig,
) -> MergeResult<()> {
    println!("{}", "🧩 SheetMerge - Join on key".bold().green());
    println!("   Base: {}", base.display());
    println!("   Key:  {}", key.bright_blue());
    println!("   Output: {}\n", output.display());

    let loader = TableLoader::new(config, detect)?;

    let base_table = loader
        .load_path(&base)?
        .into_iter()
        .next()
        .ok_or_else(|| MergeError::Validation(format!("No supported file in {}", base.display())))?;
    let base_table = if base_columns.is_empty() {
        base_table
    } else {
        let mut wanted = vec![key.clone()];
        wanted.extend(base_columns.into_iter().filter(|c| *c != key));
        select_columns(&base_table, &wanted)?
    };

    let companion_tables = loader.load_all(&companions)?;

    // Without an explicit list every non-key companion column is carried over
    let extra = if extra.is_empty() {
        let mut seen = HashSet::new();
        companion_tables
            .iter()
            .flat_map(|t| t.column_names())
            .filter(|name| *name != key && seen.insert(name.to_string()))
            .map(str::to_string)
            .collect()
    } else {
        extra
    };

    let mut log = ErrorLog::new();
    let mut joined = outer_join(&base_table, &companion_tables, &key, &extra, &mut log)?;
    if !sort_by.is_empty() {
        sort_rows(&mut joined, &sort_by)?;
    }

    let result = if template {
        let mut ids = vec![key.clone()];
        for id in template_ids {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        let sources: Vec<String> = companion_tables.iter().map(source_name).collect();
        source_template(&joined, &ids, &source_name(&base_table), &sources)?
    } else {
        joined
    };

    write_table(&result, &output)?;
    print_log(&log);
    print_table_stats(&result);
    println!("{}", "✅ Join complete".bold().green());
    Ok(())
}

//==============================================================================
// flags
//==============================================================================

/// Execute the flags command: concatenate, sort, and flag changed pairings
#[allow(clippy::too_many_arguments)]
pub fn flags(
    files: Vec<PathBuf>,
    group: String,
    compare: String,
    lowercase_headers: bool,
    band: Option<String>,
    output: PathBuf,
    detect: bool,
    config: &MergeConfig,
) -> MergeResult<()> {
    println!("{}", "🚩 SheetMerge - Change flags".bold().green());
    println!("   Group by: {}", group.bright_blue());
    println!("   Compare:  {}", compare.bright_blue());
    println!("   Output:   {}\n", output.display());

    let mut tables = TableLoader::new(config, detect)?.load_all(&files)?;
    if lowercase_headers {
        for table in &mut tables {
            table.rename_columns(|name| name.to_lowercase());
        }
    }

    let options = ConcatOptions::new(config.provenance_column.clone())
        .with_style(ProvenanceStyle::FileName);
    let mut combined = union_concat(&tables, &options)?;
    if let Some(source) = &band {
        combined = derive_char_column(&combined, source, BAND_COLUMN, BAND_POSITION)?;
    }
    sort_rows(&mut combined, &[group.clone(), compare.clone()])?;
    let flagged = flag_changes(&combined, &group, &compare)?;

    write_table(&flagged, &output)?;
    print_table_stats(&flagged);
    println!("{}", "✅ Flags computed".bold().green());
    Ok(())
}

//==============================================================================
// detect
//==============================================================================

/// Execute the detect command: show where the header is in each member
pub fn detect(file: PathBuf, config: &MergeConfig) -> MergeResult<()> {
    println!("{}", "🔍 SheetMerge - Header detection".bold().green());
    println!("   File: {}\n", file.display());

    let reader = GridReader::new();
    let detector = HeaderDetector::from_config(config)?;
    let container = open_path(&file)?;

    for member in &container.members {
        println!("   📄 {}", member.name.bright_blue().bold());
        let grid = match reader.read(&member.name, &member.bytes) {
            Ok(grid) => grid,
            Err(e) => {
                println!("      ❌ {}", e.to_string().red());
                continue;
            }
        };
        println!("      Grid: {} rows x {} columns", grid.height(), grid.width());
        match detector.analyze(&grid) {
            Detection::HeaderNotFound { scanned } => {
                println!(
                    "      ⚠️  {}",
                    format!("No header row in the first {} rows", scanned).yellow()
                );
            }
            Detection::Detected { header_row, table } => {
                println!("      Header row: {}", header_row);
                println!("      Columns: {}", table.column_names().join(", ").cyan());
                if table.is_empty() {
                    println!("      ⚠️  {}", "No data rows below the header".yellow());
                } else {
                    println!("      Data rows: {}", table.row_count().to_string().bold().green());
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;

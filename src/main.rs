use clap::{Parser, Subcommand};
use royalbit_sheetmerge::cli;
use royalbit_sheetmerge::config::MergeConfig;
use royalbit_sheetmerge::error::MergeResult;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sheetmerge")]
#[command(about = "Consolidate messy spreadsheets: detect headers, merge, join, summarize.")]
#[command(long_about = "SheetMerge - Tabular ingestion and consolidation
CSV | XLS | XLSX | ZIP bundles | Header detection | Row-count summaries

COMMANDS:
  batch    - ZIP bundles → one workbook per bundle + summary + error log
  merge    - Every file into one workbook, one sheet per file
  concat   - Stack files with identical (or aligned) columns
  extract  - Keep selected columns from every file
  join     - Outer join companion files onto a base file by key
  flags    - Flag identifiers whose partner value changed
  detect   - Show where the header row was found

EXAMPLES:
  sheetmerge batch north.zip south.zip -o out/
  sheetmerge concat jan.xlsx feb.xlsx --align -o all.csv
  sheetmerge join base.xlsx scores.csv --key MeterNo -o joined.xlsx
  sheetmerge flags *.xlsx --group meterno --compare custacc --lowercase-headers -o flags.xlsx")]
#[command(version)]
struct Cli {
    /// YAML configuration file (header pattern, sheet ids, isolation)
    #[arg(long, global = true, env = "SHEETMERGE_CONFIG")]
    config: Option<PathBuf>,

    /// Log debug detail to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(long_about = "Run the batch pipeline over containers.

Each input is a ZIP bundle (or a single .csv/.xls/.xlsx file). Every member
is decoded, its header row is located (by default: the first row with a
cell starting with S/N or Serial No), and the rows below it are kept.

OUTPUT DIRECTORY:
  {bundle}.xlsx     one sheet per member
  summary.xlsx      row counts per member per bundle
  summary.csv       the same pivot as CSV
  error_log.txt     every member that failed, and why
  all_outputs.zip   everything above

A failing member stops the rest of its bundle unless the configuration sets
batch.isolation: member.")]
    /// Consolidate ZIP bundles into workbooks with a summary
    Batch {
        /// ZIP bundles or single files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Also write a JSON run report
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Write every file into one workbook, one sheet per file
    Merge {
        /// Files or ZIP bundles
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output .xlsx
        #[arg(short, long)]
        output: PathBuf,

        /// Locate the header row instead of using the first row
        #[arg(long)]
        detect: bool,
    },

    #[command(long_about = "Concatenate files into one table.

Strict mode (default) requires every file to have the same columns, in any
order. With --align the columns are unioned and sorted; missing values are
left empty. A provenance column naming the source file is appended.")]
    /// Stack files into one table
    Concat {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output .csv or .xlsx
        #[arg(short, long)]
        output: PathBuf,

        /// Union differing columns instead of requiring identical ones
        #[arg(long)]
        align: bool,

        #[arg(long)]
        detect: bool,
    },

    /// Keep the listed columns from every file, tagged with a File column
    Extract {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Comma-separated column names
        #[arg(short, long, value_delimiter = ',', required = true)]
        columns: Vec<String>,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(long)]
        detect: bool,
    },

    #[command(long_about = "Full outer join companion files onto a base file.

Rows are matched on --key by their text value; every key from every file is
kept. Companion columns whose names are already taken get a _{file name}
suffix. Companions without the key column are reported and skipped.

With --template the joined table is reshaped to one row per key and field,
with one column per source file holding that file's value.")]
    /// Outer join files on a key column
    Join {
        /// Base file
        base: PathBuf,

        /// Companion files
        #[arg(required = true)]
        companions: Vec<PathBuf>,

        /// Join key column
        #[arg(short, long)]
        key: String,

        /// Companion columns to bring over (default: all)
        #[arg(long, value_delimiter = ',')]
        extra: Vec<String>,

        /// Base columns to keep besides the key (default: all)
        #[arg(long, value_delimiter = ',')]
        base_columns: Vec<String>,

        /// Sort the result by these columns
        #[arg(long, value_delimiter = ',')]
        sort_by: Vec<String>,

        /// Write one column per source file instead of the joined table
        #[arg(long)]
        template: bool,

        /// Identifier columns kept beside the key in the template
        #[arg(long, value_delimiter = ',', requires = "template")]
        template_ids: Vec<String>,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(long)]
        detect: bool,
    },

    #[command(long_about = "Flag changed pairings between two identifier columns.

Files are concatenated (columns aligned), sorted by (group, compare), and two
columns are added: {compare}_changed is true where the compare value differs
from the previous row of the same group, and {group}_changed the other way
round.")]
    /// Flag identifiers whose partner value changed
    Flags {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Column to group by
        #[arg(short, long)]
        group: String,

        /// Column compared within each group
        #[arg(long)]
        compare: String,

        /// Lower-case all column names before matching
        #[arg(long)]
        lowercase_headers: bool,

        /// Add a `band` column holding the fifth character of this column
        #[arg(long, value_name = "COLUMN")]
        band: Option<String>,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(long)]
        detect: bool,
    },

    /// Show header detection results for a file or bundle
    Detect {
        file: PathBuf,
    },
}

fn main() -> MergeResult<()> {
    let cli = Cli::parse();
    cli::init_tracing(cli.verbose);
    let config = MergeConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Batch {
            inputs,
            output,
            report,
        } => cli::batch(inputs, output, report, &config),

        Commands::Merge {
            inputs,
            output,
            detect,
        } => cli::merge(inputs, output, detect, &config),

        Commands::Concat {
            files,
            output,
            align,
            detect,
        } => cli::concat(files, output, align, detect, &config),

        Commands::Extract {
            files,
            columns,
            output,
            detect,
        } => cli::extract(files, columns, output, detect, &config),

        Commands::Join {
            base,
            companions,
            key,
            extra,
            base_columns,
            sort_by,
            template,
            template_ids,
            output,
            detect,
        } => cli::join(
            base,
            companions,
            key,
            extra,
            base_columns,
            sort_by,
            template,
            template_ids,
            output,
            detect,
            &config,
        ),

        Commands::Flags {
            files,
            group,
            compare,
            lowercase_headers,
            band,
            output,
            detect,
        } => cli::flags(
            files,
            group,
            compare,
            lowercase_headers,
            band,
            output,
            detect,
            &config,
        ),

        Commands::Detect { file } => cli::detect(file, &config),
    }
}

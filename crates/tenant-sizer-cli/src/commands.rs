use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "tenant-sizer")]
#[command(about = "Estimate mail and file storage footprint and growth for a tenant", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Size all workloads and render the HTML report
    Run(RunArgs),
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Only size mailboxes and personal files owned by members of this group
    #[arg(long)]
    pub group: Option<String>,

    /// Also enumerate archive mailbox sizes
    #[arg(long)]
    pub include_archives: bool,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,

    /// Also print the sizing report as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Where usage reports come from
    #[arg(long, value_enum, default_value_t = Source::Csv)]
    pub source: Source,

    /// Override the configured report export directory
    #[arg(long)]
    pub report_dir: Option<String>,

    /// Override the configured output directory
    #[arg(long)]
    pub output_dir: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Source {
    /// CSV exports in the report directory
    Csv,
    /// Live download using the token in GRAPH_ACCESS_TOKEN
    Graph,
}

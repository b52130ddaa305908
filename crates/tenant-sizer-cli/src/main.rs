mod commands;
mod logging;
mod progress;

use std::env;
use std::process;

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands, RunArgs, Source};
use dotenv::dotenv;
use progress::CliReporter;
use tenant_sizer_core::archive::StatisticsExportConnector;
use tenant_sizer_core::directory::CsvGroupDirectory;
use tenant_sizer_core::render::{format_bytes, HtmlRenderer, Renderer};
use tenant_sizer_core::reports::{CsvDirectorySource, GraphReportSource, ReportSource};
use tenant_sizer_core::session::SessionManager;
use tenant_sizer_core::{
    AppConfig, RunOptions, SizingEngine, SizingReport, Workload, WorkloadSizing,
};
use tracing::{error, info};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let args = Cli::parse();
    let verbose = matches!(&args.command, Some(Commands::Run(run)) if run.verbose);
    let _guard = logging::init_logger(verbose);

    let config = match tenant_sizer_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    match args.command {
        Some(Commands::Run(run)) => {
            if let Err(err) = run_sizing(config, &run) {
                error!("Error: {:#}", err);
                process::exit(1);
            }
        }
        Some(Commands::PrintConfig) => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        None => {
            let _ = Cli::command().print_long_help();
        }
    }

    Ok(())
}

fn run_sizing(mut config: AppConfig, args: &RunArgs) -> anyhow::Result<()> {
    if let Some(dir) = &args.report_dir {
        config.report_dir = dir.clone();
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }

    let source: Box<dyn ReportSource> = match args.source {
        Source::Csv => Box::new(CsvDirectorySource::new(&config.report_dir)),
        Source::Graph => {
            let token = env::var("GRAPH_ACCESS_TOKEN")
                .context("GRAPH_ACCESS_TOKEN must be set to download reports")?;
            if token.trim().is_empty() {
                bail!("GRAPH_ACCESS_TOKEN is empty");
            }
            Box::new(GraphReportSource::new(&config.graph_base_url, token))
        }
    };
    let directory = CsvGroupDirectory::new(&config.group_members_file);
    let engine = SizingEngine::new(config.clone(), source.as_ref()).with_group_directory(&directory);
    let options = RunOptions {
        group: args.group.clone(),
    };
    let reporter = CliReporter::new();

    let report = if args.include_archives {
        let connector = StatisticsExportConnector::new(&config.archive_statistics_file);
        let mut manager = SessionManager::new(connector, config.session.clone());
        engine.run_with_archives(&options, &mut manager, &reporter)
    } else {
        engine.run(&options, &reporter)
    }
    .context("sizing run failed")?;

    let path = HtmlRenderer::new(&config.output_dir)
        .render(&report)
        .context("could not write the HTML report")?;

    print_summary(&report);
    info!("Report: {}", path.display().to_string().cyan());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

fn print_summary(report: &SizingReport) {
    for workload in Workload::ALL {
        let sizing = report.workload(workload);
        info!(
            "{}: {} {}, {} total, {} average, {} growth",
            workload,
            format!("{}", sizing.entity_count).cyan(),
            population(workload, sizing),
            format_bytes(sizing.total_bytes).green(),
            format_bytes(sizing.average_bytes),
            format!("{}%", sizing.growth_percent).yellow(),
        );
    }
    info!(
        "Total {}, projected {} in one year",
        format_bytes(report.total_bytes).green(),
        format_bytes(report.projected_total_bytes).green(),
    );
    for warning in &report.warnings {
        info!("{}", warning.yellow());
    }
}

/// Name of the counted population, e.g. "shared mailboxes".
fn population(workload: Workload, sizing: &WorkloadSizing) -> String {
    if sizing.entity_label.is_empty() {
        workload.entity_noun().to_string()
    } else {
        sizing.entity_label.to_lowercase()
    }
}

mod bootstrap;

use anyhow::{Context, Result};
use etl_core::formatting::format_brl;
use etl_core::settings::Settings;
use etl_core::text::repair_mojibake;
use etl_runtime::pipeline::{summarize, Pipeline, PipelineOptions, Summary};

fn main() -> Result<()> {
    let settings = Settings::load()?;

    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("ANS ETL v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Mode: {}, input: {}, registry: {}, output: {}",
        settings.mode,
        settings.input_dir.display(),
        settings.registry.display(),
        settings.output_dir.display()
    );

    if settings.mode == "summary" {
        let summary = summarize(&settings.output_dir, settings.top, settings.operator.as_deref())
            .context("summary failed")?;
        if settings.report_json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            print_summary(&summary, &settings);
        }
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineOptions {
        input_dir: settings.input_dir.clone(),
        registry: settings.registry.clone(),
        output_dir: settings.output_dir.clone(),
        period_order: settings.period_order()?,
    });

    let report = match settings.mode.as_str() {
        "run" => pipeline.run(),
        "consolidate" => pipeline.consolidate(),
        "transform" => pipeline.transform(),
        unknown => anyhow::bail!("Unknown mode: {}", unknown),
    }
    .with_context(|| format!("{} failed", settings.mode))?;

    report.log();
    if settings.report_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

fn print_summary(summary: &Summary, settings: &Settings) {
    println!("Top {} operators by total expenses", settings.top);
    for (rank, row) in summary.top_operators.iter().enumerate() {
        println!(
            "{:>3}. {:<60} {:<4} {:>22}",
            rank + 1,
            repair_mojibake(&row.legal_name),
            repair_mojibake(&row.state_code),
            format_brl(row.total_expenses)
        );
    }

    println!();
    println!("Expenses by state");
    for state in &summary.states {
        println!(
            "     {:<4} {:>22}",
            repair_mojibake(&state.state_code),
            format_brl(state.total)
        );
    }

    if let (Some(history), Some(operator)) = (&summary.history, &settings.operator) {
        println!();
        println!("Quarterly history of operator {}", operator);
        if history.is_empty() {
            println!("     no records");
        }
        for quarter in history {
            println!(
                "     {:<8} {:>22}",
                quarter.period.to_string(),
                format_brl(quarter.total)
            );
        }
    }
}

use clap::Parser;
use medialink::commands::sync::{self, collecting_sink, format_error_summary, format_summary};
use medialink::config::Cli;
use medialink::executor::{ProgressSink, SyncEvent};
use medialink::ui::ProgressReporter;
use medialink::Config;
use std::sync::{Arc, Mutex};
use tracing::Level;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let json = cli.json;
    let show_progress = !cli.quiet && !json;

    // Convert CLI args to Config - this validates immediately
    let config = Config::try_from(cli)?;
    tracing::info!("medialink v{}", medialink::VERSION);

    let reporter = show_progress.then(|| Arc::new(ProgressReporter::new()));
    let progress_sink: Option<ProgressSink> = reporter.as_ref().map(|reporter| {
        let reporter = Arc::clone(reporter);
        Arc::new(move |event: &SyncEvent| reporter.handle(event)) as ProgressSink
    });
    let error_records = Arc::new(Mutex::new(Vec::new()));
    let sink = collecting_sink(Arc::clone(&error_records), progress_sink);

    let result = sync::run_with_progress(&config, Some(sink));
    if let Some(reporter) = &reporter {
        reporter.finish();
    }
    let summary = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("{}", format_summary(&summary));
    if let Ok(records) = error_records.lock() {
        if !records.is_empty() {
            println!("{}", format_error_summary(&records));
        }
    }

    Ok(())
}

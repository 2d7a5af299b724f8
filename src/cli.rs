//! Command-line shell for the Trend 483 engines.
//!
//! The shell owns presentation: it drives an engine, maps typed outcomes
//! onto the notification sink, and renders the derived views. Engine state
//! never leaks raw transport errors up to here.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use console::style;
use indicatif::ProgressBar;

use crate::api::ApiClient;
use crate::config::{Config, Settings};
use crate::engine::{BrowseEngine, SortKey, TimelineEngine};
use crate::error::EngineError;
use crate::models::{FeiNumber, InspectionDocument, ObservationRow};
use crate::notify::{ConsoleNotifier, NotificationSink};

#[derive(Parser)]
#[command(name = "trend483", version, about = "FDA Form 483 inspection analytics")]
pub struct Cli {
    /// Backend API base URL (overrides config).
    #[arg(long, global = true, env = "TREND483_BASE_URL")]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Browse and filter the inspection document list.
    Browse {
        /// Filter by exact company name.
        #[arg(long, conflicts_with_all = ["fei", "search"])]
        company: Option<String>,
        /// Filter by exact FEI number.
        #[arg(long, conflicts_with = "search")]
        fei: Option<String>,
        /// Free-text search over company name and FEI number.
        #[arg(long)]
        search: Option<String>,
        /// Sort order for the result table.
        #[arg(long, value_enum, default_value = "inspection-date")]
        sort: SortKey,
        /// Download each matched document's PDF.
        #[arg(long)]
        download: bool,
    },
    /// Run a time-windowed aggregation of observations.
    Timeline {
        /// Start of the date range (YYYY-MM-DD).
        #[arg(long)]
        start: Option<NaiveDate>,
        /// End of the date range (YYYY-MM-DD).
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Drill down to one issue category.
        #[arg(long, conflicts_with = "issue")]
        category: Option<String>,
        /// Drill down from a systemic-issue phrase.
        #[arg(long)]
        issue: Option<String>,
    },
}

/// Entry point called by the binary after argument parsing.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings = Settings::default();
    let config = Config::load().await;
    config.apply_to_settings(&mut settings);
    if let Some(base_url) = cli.base_url {
        settings.api_base_url = base_url;
    }

    let api = ApiClient::new(
        &settings.api_base_url,
        Duration::from_secs(settings.request_timeout),
    )
    .context("failed to create API client")?;
    let api = Arc::new(api);

    match cli.command {
        Command::Browse {
            company,
            fei,
            search,
            sort,
            download,
        } => run_browse(api, &settings, company, fei, search, sort, download).await,
        Command::Timeline {
            start,
            end,
            category,
            issue,
        } => run_timeline(api, start, end, category, issue).await,
    }
}

/// Forward an engine outcome to the notifier; silent kinds stay silent.
fn report(notifier: &mut ConsoleNotifier, err: &EngineError) {
    if let Some(severity) = err.severity() {
        notifier.notify(&err.to_string(), severity);
    }
}

fn spinner(message: &'static str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

fn format_date(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| d.format("%b %d %Y").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

#[allow(clippy::too_many_arguments)]
async fn run_browse(
    api: Arc<ApiClient>,
    settings: &Settings,
    company: Option<String>,
    fei: Option<String>,
    search: Option<String>,
    sort: SortKey,
    download: bool,
) -> anyhow::Result<()> {
    let mut notifier = ConsoleNotifier;
    let mut engine = BrowseEngine::new(api);

    let bar = spinner("Loading inspection documents…");
    let loaded = engine.load_all().await;
    bar.finish_and_clear();
    if let Err(err) = loaded {
        report(&mut notifier, &err);
        return Ok(());
    }

    match (&company, &fei, &search) {
        (Some(name), _, _) => engine.filter_by_company(name).await,
        (_, Some(value), _) => {
            let fei = FeiNumber::from(value.as_str());
            engine.filter_by_fei(&fei).await;
        }
        (_, _, Some(text)) => {
            engine.set_search_text(text);
            if let Some(settled) = engine.next_debounced_search().await {
                engine.apply_search(&settled);
            }
        }
        _ => {
            println!(
                "{}",
                style("Select a Company or FEI Number to Begin Analysis").bold()
            );
            println!("Use the filters to analyze FDA 483 trends.");
            return Ok(());
        }
    }

    let view = engine.sorted_view(sort);
    if view.is_empty() {
        println!(
            "{}",
            style("No FDA 483 inspections match the current filter").bold()
        );
        return Ok(());
    }

    println!(
        "{} • {} total observations",
        style(format!("{} FDA 483 inspections found", view.len())).bold(),
        view.len()
    );
    print_document_table(&view);

    if download {
        settings.ensure_directories()?;
        for doc in &view {
            match engine.download_document(doc, &settings.documents_dir).await {
                Ok(path) => println!("saved {}", style(path.display()).green()),
                Err(err) => report(&mut notifier, &err),
            }
        }
    }

    Ok(())
}

fn print_document_table(documents: &[InspectionDocument]) {
    println!(
        "{:<14} {:<32} {:<12} Key Findings",
        style("Date").dim(),
        style("Company").dim(),
        style("FEI").dim()
    );
    for doc in documents {
        let fei = doc
            .fei_number
            .as_ref()
            .map(|f| f.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let findings = match (&doc.category, &doc.summary) {
            (Some(category), Some(summary)) => format!("[{category}] {summary}"),
            (None, Some(summary)) => summary.clone(),
            _ => "-".to_string(),
        };
        println!(
            "{:<14} {:<32} {:<12} {}",
            format_date(doc.date),
            doc.name,
            fei,
            findings
        );
    }
}

async fn run_timeline(
    api: Arc<ApiClient>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    category: Option<String>,
    issue: Option<String>,
) -> anyhow::Result<()> {
    let mut notifier = ConsoleNotifier;
    let mut engine = TimelineEngine::new(api);

    let start_bound = start.map(|d| d.and_time(NaiveTime::MIN).and_utc());
    let end_bound = end.map(|d| d.and_time(NaiveTime::MIN).and_utc());

    let bar = spinner("Running time analysis…");
    let outcome = engine.run_analysis(start_bound, end_bound).await;
    bar.finish_and_clear();

    let summary = match outcome {
        Ok(summary) => summary,
        Err(err) => {
            report(&mut notifier, &err);
            return Ok(());
        }
    };

    let range = start_bound
        .zip(end_bound)
        .map(|(s, e)| format!("{} to {}", format_date(Some(s)), format_date(Some(e))))
        .unwrap_or_default();

    println!("{}", style("Executive Summary").bold());
    println!(
        "Timeline analysis from {range} reveals {} observations across {} FDA 483 \
         inspections involving {} companies.",
        summary.observation_count, summary.file_count, summary.company_count
    );
    println!();

    println!("{}", style("Primary Issue Categories").bold());
    for (idx, tally) in engine.category_tallies().iter().enumerate() {
        println!("  {}. {} ({})", idx + 1, tally.label, tally.count);
    }
    println!();

    println!("{}", style("Systemic Issues Identified").bold());
    if engine.display_repeat_issues().is_empty() {
        println!("  No repetitive issues found");
    } else {
        for entry in engine.display_repeat_issues() {
            println!("  • {}", style(&entry.label).yellow());
        }
    }
    println!();

    if let Some(label) = category {
        engine.filter_by_category(&label);
    } else if let Some(phrase) = issue {
        engine.filter_by_systemic_issue(&phrase);
    }

    let heading = match engine.active_category() {
        Some(label) => format!("Observations — {label} ({})", engine.visible_rows().len()),
        None => format!("All Observations ({})", engine.visible_rows().len()),
    };
    println!("{}", style(heading).bold());
    for row in engine.visible_rows() {
        print_observation(row);
    }

    Ok(())
}

fn print_observation(row: &ObservationRow) {
    let mut header = format!("{} • {}", format_date(row.date), row.company_name);
    if !row.category.is_empty() {
        header.push_str(&format!("  [{}]", row.category));
    }
    if row.issue_identified {
        header.push_str(&format!("  {}", style("repeat finding").yellow()));
    }
    println!("{header}");
    if !row.summary.is_empty() {
        println!("    {}", row.summary);
    }
    if !row.cfr_number.is_empty() {
        println!("    {}", style(&row.cfr_number).dim());
    }
}

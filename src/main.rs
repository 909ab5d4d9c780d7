use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use snapreport::capture::{ConsoleCaptureLayer, ConsoleLog, PageCapturer, RenderMode};
use snapreport::host::HeadlessPage;
use snapreport::report::{
    Collectors, CustomData, FeedbackType, HttpReportTransport, Priority, ReportOptions,
    ReportOutcome,
};
use snapreport::{util, Config, Orchestrator, SystemClock};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

#[derive(Parser, Debug)]
#[command(name = "snapreport", version, about = "Capture and submit bug reports")]
struct Args {
    /// Config file to use instead of ~/.snapreport/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for config and logs (default: ~/.snapreport)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Print the effective configuration as JSON
    Config,
    /// Submit a silent report from a headless page
    Send {
        #[arg(long)]
        description: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, value_enum, default_value_t = PriorityArg::Low)]
        priority: PriorityArg,
        #[arg(long = "type", value_enum, default_value_t = TypeArg::Bug)]
        feedback_type: TypeArg,
        /// Page URL reported in metadata
        #[arg(long)]
        url: Option<String>,
        /// HTML document to attach as a structured screenshot
        #[arg(long)]
        html: Option<PathBuf>,
        /// Custom data entry, repeatable
        #[arg(long = "custom", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        custom: Vec<(String, String)>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PriorityArg {
    Low,
    Medium,
    High,
}

impl From<PriorityArg> for Priority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::Low => Priority::Low,
            PriorityArg::Medium => Priority::Medium,
            PriorityArg::High => Priority::High,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TypeArg {
    Bug,
    Rating,
    FeatureRequest,
}

impl From<TypeArg> for FeedbackType {
    fn from(arg: TypeArg) -> Self {
        match arg {
            TypeArg::Bug => FeedbackType::Bug,
            TypeArg::Rating => FeedbackType::Rating,
            TypeArg::FeatureRequest => FeedbackType::FeatureRequest,
        }
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {raw:?}")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    util::init_data_dir(args.data_dir.clone());

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let console = Arc::new(ConsoleLog::new(config.console.max_entries));
    init_logging(console.clone())?;

    match args.cmd {
        Cmd::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Cmd::Send {
            description,
            email,
            priority,
            feedback_type,
            url,
            html,
            custom,
        } => {
            let mut page = HeadlessPage::default();
            if let Some(url) = url {
                page = page.with_url(url);
            }
            if let Some(path) = &html {
                let document = fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                page = page.with_document(document);
                config.screenshot.render_mode = RenderMode::Structured;
            }
            let page = Arc::new(page);

            let clock = Arc::new(SystemClock);
            let mut collectors =
                Collectors::from_config(&config, clock.clone(), Arc::new(PageCapturer::new(page.clone())));
            collectors.console = console;

            let transport = Arc::new(HttpReportTransport::from_config(&config));
            let orchestrator = Orchestrator::new(config, collectors, transport, page, clock);
            orchestrator.attach_custom_data(
                custom
                    .into_iter()
                    .map(|(key, value)| (key, Value::String(value)))
                    .collect::<CustomData>(),
            );

            let mut options = ReportOptions::silent_report(
                email.unwrap_or_default(),
                description,
                priority.into(),
            )
            .with_feedback_type(feedback_type.into())
            .without_replay();
            if html.is_none() {
                options = options.without_screenshot();
            }

            match orchestrator.start_report(options).await? {
                ReportOutcome::Submitted { report_id } => {
                    println!("Report submitted: {report_id}");
                }
                other => println!("Report not submitted: {other:?}"),
            }
            Ok(())
        }
    }
}

/// Log to ~/.snapreport/logs/snapreport.log and mirror host events into
/// the report console log
fn init_logging(console: Arc<ConsoleLog>) -> Result<()> {
    fs::create_dir_all(util::logs_dir())?;

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(util::log_file_path())?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false)
        .with_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        );

    tracing_subscriber::registry()
        .with(file_layer)
        .with(ConsoleCaptureLayer::new(console))
        .init();
    Ok(())
}

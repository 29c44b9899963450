//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Result, eyre};
use htmlcombine_core::{
    Coordinator, ManifestHost, PipelineOutput, ProgressReporter, prepare_plugins, run_build,
};
use htmlcombine_shared::{
    AppConfig, BuildManifest, GroupId, init_config, load_config, load_manifest,
};
use htmlcombine_tags::LegacyRule;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::render::{render_document, render_json};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// htmlcombine: combine the script references of several builds into one document.
#[derive(Parser)]
#[command(
    name = "htmlcombine",
    version,
    about = "Run several independent build pipelines and combine their script references.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Document output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Html,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run every pipeline of a build manifest and print the combined documents.
    Run {
        /// Path to the build manifest (TOML).
        manifest: PathBuf,

        /// Output format (defaults to the config file's `format`).
        #[arg(short, long)]
        format: Option<OutputFormat>,

        /// Fail stranded barriers after this many milliseconds.
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Also write each HTML document into this directory.
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },

    /// Validate a build manifest and show group membership without running it.
    Check {
        /// Path to the build manifest (TOML).
        manifest: PathBuf,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = ["htmlcombine", "htmlcombine_core", "htmlcombine_shared", "htmlcombine_tags"]
        .map(|target| format!("{target}={level}"))
        .join(",");

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            manifest,
            format,
            timeout_ms,
            out_dir,
        } => cmd_run(&manifest, format, timeout_ms, out_dir.as_deref()).await,
        Command::Check { manifest } => cmd_check(&manifest),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(
    manifest_path: &Path,
    format: Option<OutputFormat>,
    timeout_ms: Option<u64>,
    out_dir: Option<&Path>,
) -> Result<()> {
    let config = load_config()?;
    let mut manifest = load_manifest(manifest_path)?;

    if let Some(ms) = timeout_ms {
        for pipeline in &mut manifest.pipelines {
            pipeline.combine.barrier_timeout_ms = Some(ms);
        }
    }

    let format = match format {
        Some(f) => f,
        None => OutputFormat::from_str(&config.defaults.format, true)
            .map_err(|e| eyre!("invalid format '{}' in config: {e}", config.defaults.format))?,
    };

    info!(
        manifest = %manifest_path.display(),
        pipelines = manifest.pipelines.len(),
        "running build"
    );

    let reporter = Arc::new(CliProgress::new(manifest.pipelines.len()));
    let result = run_build(&manifest, &config, reporter.clone()).await?;
    reporter.finish();

    match format {
        OutputFormat::Html => {
            for output in &result.outputs {
                println!("<!-- {} ({}) -->", output.output, output.name);
                print!("{}", render_document(output));
            }
        }
        OutputFormat::Json => println!("{}", render_json(&result.outputs)?),
    }

    if let Some(dir) = out_dir {
        write_documents(dir, &result.outputs)?;
    }

    if !result.failures.is_empty() {
        for (name, error) in &result.failures {
            eprintln!("  {name}: {error}");
        }
        return Err(eyre!(
            "{} of {} pipeline(s) failed",
            result.failures.len(),
            manifest.pipelines.len()
        ));
    }

    eprintln!(
        "  {} document(s) combined in {:.1}s",
        result.outputs.len(),
        result.elapsed.as_secs_f64()
    );

    Ok(())
}

fn write_documents(dir: &Path, outputs: &[PipelineOutput]) -> Result<()> {
    std::fs::create_dir_all(dir)
        .map_err(|e| eyre!("cannot create output directory '{}': {e}", dir.display()))?;

    for output in outputs {
        let path = dir.join(&output.output);
        std::fs::write(&path, render_document(output))
            .map_err(|e| eyre!("cannot write '{}': {e}", path.display()))?;
        info!(path = %path.display(), pipeline = %output.name, "document written");
    }

    Ok(())
}

fn cmd_check(manifest_path: &Path) -> Result<()> {
    let config = load_config()?;
    let manifest = load_manifest(manifest_path)?;
    print!("{}", check_report(&manifest, &config)?);
    Ok(())
}

/// Group membership and tagging policy of every pipeline, without running.
fn check_report(manifest: &BuildManifest, config: &AppConfig) -> Result<String> {
    let coordinator = Coordinator::new();
    let plugins = prepare_plugins(&coordinator, manifest, config, &ManifestHost)?;

    let mut report = format!("\n  Manifest OK: {} pipeline(s)\n", plugins.len());
    for group in coordinator.group_ids() {
        report.push_str(&format!("\n  Group {group}\n"));
        for plugin in plugins.iter().filter(|p| p.options().group_id == group) {
            report.push_str(&format!(
                "    {:<16} {}\n",
                plugin.participant().label(),
                describe_tagging(plugin.options().alter_tags, plugin.classifier().rule()),
            ));
        }
    }
    report.push('\n');

    Ok(report)
}

fn describe_tagging(alter_tags: bool, rule: &LegacyRule) -> String {
    if !alter_tags {
        return "no tag rewriting".to_string();
    }
    match rule {
        LegacyRule::Substrings { prefix, suffix } => format!(
            "legacy if contains {}",
            [prefix.as_deref(), suffix.as_deref()]
                .into_iter()
                .flatten()
                .map(|s| format!("'{s}'"))
                .collect::<Vec<_>>()
                .join(" or ")
        ),
        LegacyRule::Pattern(re) => format!("legacy if matches /{}/", re.as_str()),
    }
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif bar on stderr.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{pos}/{len}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn pipeline_waiting(&self, name: &str, group: &GroupId) {
        self.bar.set_message(format!("{name} waiting on group {group}"));
    }

    fn pipeline_finished(&self, output: &PipelineOutput) {
        self.bar.inc(1);
        self.bar
            .set_message(format!("{} combined ({} refs)", output.name, output.references.len()));
    }

    fn pipeline_failed(&self, name: &str, _error: &str) {
        self.bar.inc(1);
        self.bar.set_message(format!("{name} failed"));
    }
}

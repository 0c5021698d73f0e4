use anyhow::Result;
use bookvoice::app::run_command;
use bookvoice::cli::{Cli, Commands, ConfigAction};
use bookvoice::config::Config;
use bookvoice::pipeline::artifacts::{ArtifactKind, OutputArea};
use bookvoice::pipeline::controller::{PipelineSettings, RunSummary, status};
use bookvoice::pipeline::ledger::read_records;
use bookvoice::pipeline::merge::merge_resident;
use bookvoice::tts::voices::SweepSpace;
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    bookvoice::logging::init(
        cli.verbose,
        cli.quiet,
        config.logging.format,
        config.logging.file.as_deref(),
    )?;

    match cli.command {
        Commands::Run(args) => {
            let summary = run_command(config, &args, cli.quiet).await?;
            if !cli.quiet {
                print_summary(&summary);
            }
        }
        Commands::Status { source } => {
            handle_status(config, source)?;
        }
        Commands::Fragments { source, show } => {
            handle_fragments(config, source, show)?;
        }
        Commands::Merge { group_size } => {
            handle_merge(&config, group_size)?;
        }
        Commands::Voices => {
            list_voices(&config);
        }
        Commands::Config { action } => {
            handle_config_command(&config, action)?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "bookvoice",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/bookvoice/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path)?
    } else {
        Config::load_or_default(&Config::default_path())?
    };

    Ok(config.with_env_overrides())
}

fn settings_for(mut config: Config, source: Option<PathBuf>) -> Result<PipelineSettings> {
    if let Some(source) = source {
        config.source.path = Some(source);
    }
    Ok(PipelineSettings::from_config(&config)?)
}

fn print_summary(summary: &RunSummary) {
    println!("{}", "Run complete".green().bold());
    println!("  {}          {}", "Fragments:".dimmed(), summary.total);
    println!("  {}            {}", "Skipped:".dimmed(), summary.skipped);
    println!("  {}           {}", "Accepted:".dimmed(), summary.accepted.green());
    if summary.suspicious > 0 {
        println!("  {}         {}", "Suspicious:".dimmed(), summary.suspicious.yellow());
    }
    if summary.exhausted > 0 {
        println!("  {}          {}", "Exhausted:".dimmed(), summary.exhausted.yellow());
    }
    if summary.already_present > 0 {
        println!("  {}    {}", "Already present:".dimmed(), summary.already_present);
    }
    if summary.recovered > 0 {
        println!("  {}          {}", "Recovered:".dimmed(), summary.recovered);
    }
    if summary.failed > 0 {
        println!("  {}             {}", "Failed:".dimmed(), summary.failed.red());
    }
    if summary.archives_uploaded > 0 || summary.archives_failed > 0 {
        println!(
            "  {}           {} uploaded, {} failed",
            "Archives:".dimmed(),
            summary.archives_uploaded,
            summary.archives_failed
        );
    }
    if summary.stopped_early {
        println!("  {}", "Stopped early: resident batch is full".yellow());
    }
}

fn handle_status(config: Config, source: Option<PathBuf>) -> Result<()> {
    let settings = settings_for(config, source)?;
    let report = status(&settings)?;

    println!("{} {}", "Book:".dimmed(), settings.book_name);
    println!("  {}   {}", "Fragments:".dimmed(), report.fragments);
    for (name, watermark) in &report.watermarks {
        println!("  {} {:<13} {}", "Resume:".dimmed(), name, watermark);
    }
    let audio = report
        .disk
        .artifacts
        .iter()
        .filter(|a| a.kind == ArtifactKind::Audio)
        .count();
    let text = report.disk.artifacts.len() - audio;
    let bytes: u64 = report.disk.artifacts.iter().map(|a| a.size_bytes).sum();
    println!(
        "  {}    {} audio, {} text, {} merged ({:.1} MB)",
        "Resident:".dimmed(),
        audio,
        text,
        report.disk.merged.len(),
        bytes as f64 / (1024.0 * 1024.0)
    );
    match &report.marker {
        Some(marker) => println!(
            "  {}    up to {} in {} ({})",
            "Uploaded:".dimmed(),
            marker.last_index,
            marker.archive,
            marker.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => println!("  {}    nothing", "Uploaded:".dimmed()),
    }
    Ok(())
}

fn handle_fragments(config: Config, source: Option<PathBuf>, show: bool) -> Result<()> {
    let settings = settings_for(config, source)?;
    let fragments = settings.fragments()?;

    let longest = fragments.iter().map(|f| f.char_len()).max().unwrap_or(0);
    println!(
        "{} fragments (max {} chars, longest {})",
        fragments.len().green(),
        settings.max_fragment_chars,
        longest
    );
    if show {
        for fragment in &fragments {
            println!(
                "{} {}",
                format!("[{:05}] ({})", fragment.index, fragment.char_len()).dimmed(),
                fragment.text
            );
        }
    }
    Ok(())
}

fn handle_merge(config: &Config, group_size: Option<usize>) -> Result<()> {
    let group_size = group_size.unwrap_or(config.batch.merge_group_size);
    let area = OutputArea::new(&config.output.dir, config.temp_dir());
    let records = read_records(&config.ledger_path())?;
    let merged = merge_resident(&area, &records, group_size)?;

    if merged.is_empty() {
        println!("Nothing to merge");
    }
    for range in &merged {
        println!("{} {}", "Merged".green(), range.path.display());
    }
    Ok(())
}

fn list_voices(config: &Config) {
    let synthesis = &config.synthesis;
    let space = SweepSpace::new(
        &synthesis.voices,
        &synthesis.styles,
        &synthesis.voice,
        &synthesis.style,
    );

    println!("Voices:");
    for (i, voice) in space.voices.iter().enumerate() {
        if i == space.start_voice {
            println!("  {} {}", "●".green(), voice);
        } else {
            println!("  ○ {}", voice);
        }
    }
    println!("Styles:");
    for (i, name) in space.styles.iter().enumerate() {
        let first_line = synthesis
            .styles
            .iter()
            .find(|s| &s.name == name)
            .and_then(|s| s.lines.first())
            .map(String::as_str)
            .unwrap_or("");
        let marker = if i == space.start_style {
            "●".green().to_string()
        } else {
            "○".to_string()
        };
        println!("  {} {:<12} {}", marker, name, first_line.dimmed());
    }
}

fn handle_config_command(config: &Config, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Get { key } => {
            println!("{}", config.get_value_by_path(&key)?);
        }
        ConfigAction::Dump => {
            print!("{}", config.to_toml()?);
        }
    }
    Ok(())
}

//! Binary entry point for the simbook phonebook CLI.
#![forbid(unsafe_code)]

#[path = "simbook/config.rs"]
mod config;
#[path = "simbook/ui.rs"]
mod ui;

use std::error::Error;
use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use simbook::{
    cli::card_file::{capacity_report, list_report, pbr_report, CardFile, UpdateRequest},
    storage::{AuxKind, DEFAULT_PBR_FID},
};
use tracing_subscriber::EnvFilter;

use config::{parse_file_id, CliConfig};
use ui::{Theme, Ui};

#[derive(Parser, Debug)]
#[command(
    name = "simbook",
    version,
    about = "Inspect and edit the USIM phonebook of a card image",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(long, global = true, value_name = "FILE", help = "CLI config file")]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_name = "FILE",
        help = "Card image (JSON); defaults to the configured image"
    )]
    image: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_name = "HEX",
        help = "Phonebook reference file id (default 4F30)"
    )]
    pbr_fid: Option<String>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[arg(long, global = true, value_enum, help = "Color theme for text output")]
    theme: Option<ThemeArg>,

    #[arg(long, short, global = true, help = "Plain output without decorations")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the normalized phonebook entries
    List {
        #[arg(long, help = "Only entries with a name or number")]
        non_empty: bool,
    },
    /// Print free email and additional-number slots
    Free,
    /// Print the parsed reference file
    Pbr,
    /// Add, replace or delete one email address
    SetEmail(SetCmd),
    /// Add, replace or delete one additional number
    SetAnr(SetCmd),
}

#[derive(Args, Debug)]
struct SetCmd {
    #[arg(value_name = "INDEX", help = "Global entry position (0-based)")]
    index: usize,

    #[arg(long, default_value = "", help = "Current value; empty to add")]
    old: String,

    #[arg(long, default_value = "", help = "New value; empty to delete")]
    new: String,

    #[arg(long, help = "Apply to the loaded image without writing it back")]
    dry_run: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum ThemeArg {
    Auto,
    Light,
    Dark,
    Plain,
}

impl From<ThemeArg> for Theme {
    fn from(value: ThemeArg) -> Self {
        match value {
            ThemeArg::Auto => Theme::Auto,
            ThemeArg::Light => Theme::Light,
            ThemeArg::Dark => Theme::Dark,
            ThemeArg::Plain => Theme::Plain,
        }
    }
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("simbook=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.clone())?;
    tracing::debug!(path = ?config.path(), "cli.config_loaded");
    let theme = match cli.theme {
        Some(theme) => theme,
        None => config.theme()?.unwrap_or(ThemeArg::Auto),
    };
    let ui = Ui::new(theme.into(), cli.quiet);

    let image = cli
        .image
        .clone()
        .or_else(|| config.default_image().cloned())
        .ok_or("no card image given; pass --image or set card.image in the config file")?;
    let pbr_fid = match cli.pbr_fid.as_deref() {
        Some(value) => parse_file_id(value)?,
        None => config.pbr_fid()?.unwrap_or(DEFAULT_PBR_FID),
    };

    let loading = ui.loading(format!("loading {}", image.display()));
    let mut file = CardFile::open(&image, pbr_fid)?;
    let elapsed = loading.finish();
    tracing::debug!(elapsed_ms = elapsed.as_millis() as u64, "cli.loaded");

    match cli.command {
        Command::List { non_empty } => {
            let report = list_report(file.phonebook(), non_empty);
            emit(cli.format, &report, || ui.entries(&report))?;
        }
        Command::Free => {
            let report = capacity_report(file.phonebook());
            emit(cli.format, &report, || ui.capacity(&report))?;
        }
        Command::Pbr => {
            let report = pbr_report(file.phonebook()).ok_or("reference file not loaded")?;
            emit(cli.format, &report, || ui.pbr(&report))?;
        }
        Command::SetEmail(cmd) => run_set(&ui, cli.format, &mut file, AuxKind::Email, cmd)?,
        Command::SetAnr(cmd) => run_set(&ui, cli.format, &mut file, AuxKind::Anr, cmd)?,
    }
    Ok(())
}

fn run_set(
    ui: &Ui,
    format: OutputFormat,
    file: &mut CardFile,
    kind: AuxKind,
    cmd: SetCmd,
) -> Result<(), Box<dyn Error>> {
    let request = UpdateRequest {
        index: cmd.index,
        kind,
        old: cmd.old,
        new: cmd.new,
    };
    let report = file.update(&request)?;
    if cmd.dry_run {
        ui.note("dry run: card image left unchanged");
    } else {
        let path = file.save()?;
        if format == OutputFormat::Text {
            ui.done(&format!("wrote {}", path.display()));
        }
    }
    emit(format, &report, || ui.entries(std::slice::from_ref(&report)))
}

fn emit<T, F>(format: OutputFormat, value: &T, text: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize,
    F: FnOnce(),
{
    match format {
        OutputFormat::Text => text(),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

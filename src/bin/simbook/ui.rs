//! Text rendering of phonebook listings, slot counts and reference tables.

use std::fmt::Display;
use std::io::IsTerminal;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use nu_ansi_term::{Color, Style};
use simbook::cli::card_file::{CapacityReport, EntryReport, KindCapacity, PbrReport};
use simbook::storage::Linkage;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Theme {
    Auto,
    Light,
    Dark,
    Plain,
}

struct Styles {
    title: Style,
    position: Style,
    name: Style,
    email: Style,
    number: Style,
    free: Style,
    full: Style,
    note: Style,
}

impl Styles {
    fn for_theme(theme: Theme) -> Self {
        let (accent, text) = match theme {
            Theme::Light => (Color::Blue, Color::Black),
            Theme::Auto | Theme::Dark | Theme::Plain => (Color::LightCyan, Color::White),
        };
        Self {
            title: Style::new().fg(accent).bold(),
            position: Style::new().fg(Color::DarkGray),
            name: Style::new().fg(text).bold(),
            email: Style::new().fg(Color::Green),
            number: Style::new().fg(Color::Yellow),
            free: Style::new().fg(Color::Green).bold(),
            full: Style::new().fg(Color::Red).bold(),
            note: Style::new().fg(Color::DarkGray).italic(),
        }
    }
}

pub struct Ui {
    styles: Styles,
    color: bool,
    quiet: bool,
}

impl Ui {
    pub fn new(theme: Theme, quiet: bool) -> Self {
        let color = theme != Theme::Plain && !quiet && std::io::stdout().is_terminal();
        #[cfg(windows)]
        if color {
            let _ = nu_ansi_term::enable_ansi_support();
        }
        Self {
            styles: Styles::for_theme(theme),
            color,
            quiet,
        }
    }

    fn paint(&self, style: Style, text: impl Display) -> String {
        if self.color {
            style.paint(text.to_string()).to_string()
        } else {
            text.to_string()
        }
    }

    fn title(&self, text: &str) {
        if !self.quiet {
            println!("{}", self.paint(self.styles.title, text));
        }
    }

    /// One line per entry: position, name, number, then `<email>` and `[number]` values.
    pub fn entries(&self, entries: &[EntryReport]) {
        self.title(&format!("{} entries", entries.len()));
        let name_width = entries
            .iter()
            .map(|e| e.alpha.chars().count())
            .max()
            .unwrap_or(0);
        for entry in entries {
            let mut line = format!(
                "{} {} {}",
                self.paint(self.styles.position, format!("#{:<3}", entry.index)),
                self.paint(self.styles.name, format!("{:<name_width$}", entry.alpha)),
                entry.number
            );
            for email in &entry.emails {
                line.push(' ');
                line.push_str(&self.paint(self.styles.email, format!("<{email}>")));
            }
            for number in &entry.additional_numbers {
                line.push(' ');
                line.push_str(&self.paint(self.styles.number, format!("[{number}]")));
            }
            println!("{line}");
        }
    }

    pub fn capacity(&self, report: &CapacityReport) {
        self.title("Free slots");
        self.kind_capacity("email", &report.email);
        self.kind_capacity("anr", &report.anr);
        self.legend();
    }

    fn kind_capacity(&self, label: &str, figures: &KindCapacity) {
        let total = match figures.total {
            Some(count) => self.slot_count(count),
            None => self.paint(self.styles.note, "unbounded"),
        };
        let per_block: Vec<String> = figures
            .blocks
            .iter()
            .enumerate()
            .map(|(block, count)| format!("b{block}={}", self.slot_count(*count)))
            .collect();
        println!(
            "{label:<6} {:<22} {total:>9}  {}",
            linkage_label(figures.linkage),
            per_block.join(" ")
        );
    }

    fn slot_count(&self, count: usize) -> String {
        let style = if count == 0 {
            self.styles.full
        } else {
            self.styles.free
        };
        self.paint(style, count)
    }

    pub fn pbr(&self, report: &PbrReport) {
        self.title("Reference file");
        println!("email  {}", linkage_label(report.email));
        println!("anr    {}", linkage_label(report.anr));
        for block in &report.blocks {
            let files: Vec<String> = block
                .files
                .iter()
                .map(|(tag, fid)| format!("{tag}={fid}"))
                .collect();
            println!(
                "{} {:>3} entries  {}",
                self.paint(self.styles.position, format!("block {}", block.index)),
                block.entries,
                files.join(" ")
            );
        }
        self.legend();
    }

    fn legend(&self) {
        if self.quiet {
            return;
        }
        println!(
            "{}",
            self.paint(
                self.styles.note,
                "type 1: record n belongs to entry n; type 2: the entry's EF_IAP byte names the record"
            )
        );
    }

    pub fn done(&self, message: &str) {
        println!("{message}");
    }

    pub fn note(&self, message: &str) {
        if !self.quiet {
            eprintln!("note: {message}");
        }
    }

    /// Spinner shown while the card image is read and joined.
    pub fn loading(&self, label: String) -> Loading {
        let spinner = self.color.then(|| {
            let bar = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
                bar.set_style(style);
            }
            bar.set_message(label);
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        });
        Loading {
            spinner,
            start: Instant::now(),
        }
    }
}

pub struct Loading {
    spinner: Option<ProgressBar>,
    start: Instant,
}

impl Loading {
    pub fn finish(mut self) -> Duration {
        if let Some(bar) = self.spinner.take() {
            bar.finish_and_clear();
        }
        self.start.elapsed()
    }
}

impl Drop for Loading {
    fn drop(&mut self) {
        if let Some(bar) = self.spinner.take() {
            bar.abandon();
        }
    }
}

pub fn linkage_label(linkage: Linkage) -> String {
    match linkage {
        Linkage::Type1 => "type 1".to_string(),
        Linkage::Type2 { iap_offset } => format!("type 2 (IAP byte {iap_offset})"),
    }
}

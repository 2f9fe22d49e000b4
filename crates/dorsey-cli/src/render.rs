use std::cell::RefCell;
use std::io::IsTerminal;
use std::time::{Duration, Instant};

use anstyle::{AnsiColor, Effects, Style};
use dorsey_exec::DispatchEvents;
use indicatif::{ProgressBar, ProgressStyle};
use semver::Version;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputStyle {
    Plain,
    Rich,
}

pub fn current_output_style() -> OutputStyle {
    if std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none() {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

#[derive(Copy, Clone, Debug)]
pub struct TerminalRenderer {
    style: OutputStyle,
}

pub struct TerminalProgress {
    style: OutputStyle,
    label: String,
    progress_bar: Option<ProgressBar>,
    started_at: Instant,
}

impl TerminalRenderer {
    pub fn from_style(style: OutputStyle) -> Self {
        Self { style }
    }

    pub fn print_status(self, status: &str, message: &str) {
        println!("{}", render_status_line(self.style, status, message));
    }

    pub fn print_warning(self, message: &str) {
        eprintln!("{}", render_status_line(self.style, "warn", message));
    }

    pub fn print_error(self, err: &anyhow::Error) {
        eprintln!("{}", render_error_line(self.style, err));
    }

    pub fn start_progress(self, label: &str, message: &str) -> TerminalProgress {
        let progress_bar = if self.style == OutputStyle::Rich {
            let progress_bar = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan.bold} {msg} {elapsed}") {
                progress_bar.set_style(style.tick_chars(progress_tick_chars(label)));
            }
            progress_bar.set_message(message.to_string());
            progress_bar.enable_steady_tick(Duration::from_millis(80));
            Some(progress_bar)
        } else {
            None
        };

        TerminalProgress {
            style: self.style,
            label: label.to_string(),
            progress_bar,
            started_at: Instant::now(),
        }
    }
}

impl TerminalProgress {
    pub fn finish_success(mut self, message: &str) {
        let Some(progress_bar) = self.progress_bar.take() else {
            return;
        };

        progress_bar.finish_and_clear();
        if let Some(line) = render_progress_line(
            self.style,
            &self.label,
            message,
            Some(self.started_at.elapsed()),
        ) {
            println!("{line}");
        }
    }

    pub fn finish_abandon(mut self) {
        if let Some(progress_bar) = self.progress_bar.take() {
            progress_bar.finish_and_clear();
        }
    }
}

/// Spinner and status lines for one dispatch.
pub struct TerminalEvents {
    renderer: TerminalRenderer,
    progress: RefCell<Option<TerminalProgress>>,
}

impl TerminalEvents {
    pub fn new(renderer: TerminalRenderer) -> Self {
        Self {
            renderer,
            progress: RefCell::new(None),
        }
    }
}

impl DispatchEvents for TerminalEvents {
    fn syncing(&self, package: &str, cached: bool) {
        let (label, message) = if cached {
            ("update", format!("checking {package} for updates"))
        } else {
            ("install", format!("installing {package}"))
        };
        let progress = self.renderer.start_progress(label, &message);
        *self.progress.borrow_mut() = Some(progress);
    }

    fn synced(&self, package: &str, version: Option<&Version>, changed: bool) {
        let progress = self.progress.borrow_mut().take();
        let subject = match version {
            Some(version) => format!("{package}@{version}"),
            None => package.to_string(),
        };
        match (progress, changed) {
            (Some(progress), true) => progress.finish_success(&subject),
            (Some(progress), false) => progress.finish_abandon(),
            (None, true) => self
                .renderer
                .print_status("ok", &format!("installed {subject}")),
            (None, false) => {}
        }
    }

    fn failed(&self, err: &anyhow::Error) {
        if let Some(progress) = self.progress.borrow_mut().take() {
            progress.finish_abandon();
        }
        self.renderer.print_error(err);
    }
}

pub fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => format!("{} {message}", status_badge(status)),
    }
}

/// The whole cause chain on one line, e.g. `failed to install x@1.0.0: timed out`.
pub fn render_error_line(style: OutputStyle, err: &anyhow::Error) -> String {
    let message = format!("{err:#}");
    match style {
        OutputStyle::Plain => format!("error: {message}"),
        OutputStyle::Rich => render_status_line(style, "err", &message),
    }
}

fn status_badge(status: &str) -> &'static str {
    match status {
        "ok" => "[OK]",
        "warn" => "[WARN]",
        "err" => "[ERR]",
        _ => "[..]",
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let millis = elapsed.subsec_millis();
    format!("{secs}.{millis:03}s")
}

fn progress_tick_chars(label: &str) -> &'static str {
    match label {
        "install" => ".oO@* ",
        "update" => "<^>v ",
        _ => "|/-\\ ",
    }
}

fn progress_label_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightCyan.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

fn render_progress_line(
    style: OutputStyle,
    label: &str,
    message: &str,
    elapsed: Option<Duration>,
) -> Option<String> {
    if style == OutputStyle::Plain {
        return None;
    }

    let suffix = elapsed
        .map(|value| format!(" complete in {}", format_elapsed(value)))
        .unwrap_or_default();
    Some(format!(
        "{} {message}{suffix}",
        colorize(progress_label_style(), label)
    ))
}

//! Launcher diagnostics on stderr, colored through `termcolor`.

use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Value of the `--color` flag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ColorWhen {
    /// Color when stderr is a terminal
    #[default]
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

/// Color mode for diagnostics. A set `NO_COLOR` overrides `--color`.
pub fn color_choice(when: ColorWhen, no_color: bool) -> ColorChoice {
    if no_color {
        return ColorChoice::Never;
    }
    match when {
        ColorWhen::Auto => ColorChoice::Auto,
        ColorWhen::Always => ColorChoice::Always,
        ColorWhen::Never => ColorChoice::Never,
    }
}

/// Styled writer for launcher diagnostics. Everything goes to stderr so the
/// hosted program owns stdout.
pub struct Diagnostics {
    stderr: StandardStream,
}

impl Diagnostics {
    pub fn new(choice: ColorChoice) -> Self {
        Self {
            stderr: StandardStream::stderr(choice),
        }
    }

    fn labeled(&mut self, label: &str, color: Color, message: &str) {
        let mut spec = ColorSpec::new();
        spec.set_fg(Some(color)).set_bold(true);
        let _ = self.stderr.set_color(&spec);
        let _ = write!(self.stderr, "{}", label);
        let _ = self.stderr.reset();
        let _ = writeln!(self.stderr, " {}", message);
    }

    /// `error:` in red bold, then the full error chain.
    pub fn error(&mut self, err: &anyhow::Error) {
        self.labeled("error:", Color::Red, &err.to_string());
        for cause in err.chain().skip(1) {
            self.labeled("  caused by:", Color::Yellow, &cause.to_string());
        }
    }
}

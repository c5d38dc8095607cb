//! Console output and error aggregation.
//!
//! Every user-visible line goes through [`say`] or [`say_tagged`], and every
//! non-fatal problem is reported through [`Reporter::log_error`], which is the
//! only place the run's error counter is incremented.

use std::backtrace::Backtrace;
use std::io::{IsTerminal, Write};
use std::panic::Location;
use std::sync::atomic::{AtomicUsize, Ordering};

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Visual weight of a console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Uncoloured text.
    Plain,
    /// Progress notes ("checking ...").
    Progress,
    /// A step or check that succeeded.
    Success,
    /// Something the operator should look at.
    Warning,
    /// A failure.
    Failure,
    /// Secondary detail such as URLs and hints.
    Detail,
    /// Section headings.
    Heading,
    /// Individual pipeline commands.
    Step,
}

impl Tone {
    fn spec(self) -> ColorSpec {
        let mut spec = ColorSpec::new();
        match self {
            Self::Plain => {}
            Self::Progress | Self::Warning => {
                spec.set_fg(Some(Color::Yellow));
            }
            Self::Success => {
                spec.set_fg(Some(Color::Green));
            }
            Self::Failure => {
                spec.set_fg(Some(Color::Red));
            }
            Self::Detail => {
                spec.set_fg(Some(Color::Cyan));
            }
            Self::Heading => {
                spec.set_fg(Some(Color::Cyan)).set_bold(true);
            }
            Self::Step => {
                spec.set_fg(Some(Color::Blue));
            }
        }
        spec
    }
}

/// Prefix attached to every relayed subprocess line, e.g. `[SERVER]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Text shown between the brackets.
    pub label: String,
    /// Colour of the bracketed label.
    pub color: Color,
}

impl Tag {
    /// Creates a tag with the given label and colour.
    pub fn new(label: impl Into<String>, color: Color) -> Self {
        Self {
            label: label.into(),
            color,
        }
    }
}

fn color_choice() -> ColorChoice {
    if std::io::stdout().is_terminal() {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

/// Prints one line to stdout in the given tone.
///
/// The whole line is written under a single lock; write failures are ignored
/// because there is nowhere left to report them.
pub fn say(tone: Tone, text: &str) {
    let stream = StandardStream::stdout(color_choice());
    let mut out = stream.lock();
    let _ = out.set_color(&tone.spec());
    let _ = write!(out, "{text}");
    let _ = out.reset();
    let _ = writeln!(out);
}

/// Prints one subprocess line prefixed with its coloured tag.
pub fn say_tagged(tag: &Tag, text: &str) {
    let stream = StandardStream::stdout(color_choice());
    let mut out = stream.lock();
    let _ = out.set_color(ColorSpec::new().set_fg(Some(tag.color)));
    let _ = write!(out, "[{}]", tag.label);
    let _ = out.reset();
    let _ = writeln!(out, " {text}");
}

/// Prints a boxed banner with a title and subtitle.
pub fn banner(title: &str, subtitle: &str) {
    const WIDTH: usize = 62;
    let border = "═".repeat(WIDTH);
    say(Tone::Heading, "");
    say(Tone::Heading, &format!("╔{border}╗"));
    say(Tone::Heading, &format!("║{:^WIDTH$}║", title));
    say(Tone::Heading, &format!("║{:WIDTH$}║", ""));
    say(Tone::Heading, &format!("║  {:<w$}║", subtitle, w = WIDTH - 2));
    say(Tone::Heading, &format!("╚{border}╝"));
    say(Tone::Plain, "");
}

/// How a reported failure affects the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The caller applies its own recovery and the run continues.
    Recoverable,
    /// The run must stop with a failure exit code.
    Critical,
}

/// Continuation signal returned by [`Reporter::log_error`].
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep going.
    Continue,
    /// Stop the run and exit with code 1.
    Abort,
}

impl Flow {
    /// Returns true for [`Flow::Abort`].
    pub fn is_abort(self) -> bool {
        self == Self::Abort
    }
}

/// Per-run error reporting context.
///
/// Holds the error counter and the debug flag. The counter starts at zero,
/// only ever grows, and is read at reporting points.
#[derive(Debug, Default)]
pub struct Reporter {
    errors: AtomicUsize,
    debug: bool,
}

impl Reporter {
    /// Creates a reporter with a zeroed counter.
    pub fn new(debug: bool) -> Self {
        Self {
            errors: AtomicUsize::new(0),
            debug,
        }
    }

    /// Returns whether detailed error output is enabled.
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Returns the number of failures logged so far.
    pub fn error_count(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }

    /// Logs a failure, increments the counter, and tells the caller whether to continue.
    #[track_caller]
    pub fn log_error(
        &self,
        message: &str,
        detail: Option<&anyhow::Error>,
        severity: Severity,
    ) -> Flow {
        let location = Location::caller();
        let total = self.errors.fetch_add(1, Ordering::SeqCst) + 1;

        tracing::debug!(
            %location,
            total,
            ?severity,
            detail = ?detail.map(|e| format!("{e:#}")),
            "{message}"
        );

        say(Tone::Plain, "");
        say(Tone::Failure, &format!("❌ ERROR: {message}"));
        if let Some(err) = detail {
            say(Tone::Failure, &format!("   Details: {err:#}"));
            if self.debug {
                say(Tone::Warning, "   Cause chain:");
                for cause in err.chain() {
                    say(Tone::Warning, &format!("     - {cause}"));
                }
                say(Tone::Warning, "   Backtrace:");
                say(Tone::Plain, &Backtrace::force_capture().to_string());
            }
        }
        say(Tone::Detail, &format!("   Location: {location}"));

        match severity {
            Severity::Critical => {
                say(Tone::Failure, "⛔ Critical error. Stopping.");
                Flow::Abort
            }
            Severity::Recoverable => {
                say(Tone::Warning, "⚠️  Continuing...");
                say(Tone::Plain, "");
                Flow::Continue
            }
        }
    }

    /// Logs a recoverable failure.
    #[track_caller]
    pub fn error(&self, message: &str, detail: Option<&anyhow::Error>) -> Flow {
        self.log_error(message, detail, Severity::Recoverable)
    }

    /// Logs a failure that ends the run.
    #[track_caller]
    pub fn critical(&self, message: &str, detail: Option<&anyhow::Error>) -> Flow {
        self.log_error(message, detail, Severity::Critical)
    }

    /// Prints the end-of-run error total.
    pub fn summarize(&self) {
        match self.error_count() {
            0 => say(Tone::Detail, "   No errors this run"),
            count => say(
                Tone::Warning,
                &format!("   Total warnings/errors this run: {count}"),
            ),
        }
    }
}

use anyhow::Result;
use tracing::field::{Field, Visit};
use tracing::level_filters::LevelFilter;
use tracing::{Event, Level, Subscriber};
use tracing_indicatif::IndicatifLayer;
use tracing_indicatif::style::ProgressStyle;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::fmt::{self, FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Environment variable holding `EnvFilter` directives for diagnostics,
/// e.g. `relfetch_lib=debug`.
pub const LOG_ENV_VAR: &str = "RELFETCH_LOG";

/// Target of the lines meant for the user. They are always shown, whatever
/// `RELFETCH_LOG` says.
pub const UI_TARGET: &str = "relfetch_ui";

const DEFAULT_DIAGNOSTICS: &str = "warn";

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Byte progress bar for transfers whose size is known.
pub fn progress_bar_style() -> Result<ProgressStyle> {
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] {msg} [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
    )?;
    Ok(style.progress_chars("#>-").tick_strings(TICKS))
}

/// Spinner used while the size of a transfer is still unknown.
pub fn transfer_spinner_style() -> Result<ProgressStyle> {
    spinner_style("{msg} {bytes} ({bytes_per_sec})")
}

pub fn spinner_style(template: &str) -> Result<ProgressStyle> {
    let style = ProgressStyle::with_template(&format!(
        "{{spinner:.green}} [{{elapsed_precise}}] {}",
        template
    ))?;
    Ok(style.tick_strings(TICKS))
}

/// Installs the global subscriber.
///
/// User lines at info go to stdout, warnings and errors to stderr. Other
/// events are diagnostics on stderr, filtered by `RELFETCH_LOG`. Info spans
/// get progress bars.
pub fn initialize_logging() {
    let progress_bar_layer = IndicatifLayer::new();
    let ui_writer = progress_bar_layer
        .get_stderr_writer()
        .with_max_level(Level::WARN)
        .or_else(progress_bar_layer.get_stdout_writer());
    let diagnostics_writer = progress_bar_layer.get_stderr_writer();
    let directives = std::env::var(LOG_ENV_VAR).ok();

    tracing_subscriber::registry()
        .with(ui_layer(ui_writer))
        .with(diagnostics_layer(diagnostics_writer, directives.as_deref()))
        .with(progress_bar_layer.with_filter(LevelFilter::INFO))
        .init();
}

fn ui_layer<S, W>(writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .with_writer(writer)
        .event_format(MessageLine)
        .with_filter(Targets::new().with_target(UI_TARGET, LevelFilter::INFO))
}

fn diagnostics_layer<S, W>(writer: W, directives: Option<&str>) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .with_writer(writer)
        .without_time()
        .with_target(false)
        .with_filter(diagnostics_filter(directives))
}

/// `directives` (default `warn`) with the user lines switched off, so they are
/// never printed twice.
fn diagnostics_filter(directives: Option<&str>) -> EnvFilter {
    let directives = directives
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(DEFAULT_DIAGNOSTICS);
    EnvFilter::try_new(format!("{directives},{UI_TARGET}=off"))
        .unwrap_or_else(|_| EnvFilter::new(format!("{DEFAULT_DIAGNOSTICS},{UI_TARGET}=off")))
}

/// Writes the bare `message` of an event and nothing else.
struct MessageLine;

impl<S, N> FormatEvent<S, N> for MessageLine
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let mut message = Message::default();
        event.record(&mut message);
        writeln!(writer, "{}", message.0)
    }
}

#[derive(Default)]
struct Message(String);

impl Visit for Message {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

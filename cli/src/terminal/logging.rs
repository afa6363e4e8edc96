use colored::{ColoredString, Colorize};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::FormatEvent;
use tracing_subscriber::fmt::format::{self, Writer};
use tracing_subscriber::registry::LookupSpan;

/// Renders an event as a right-aligned level tag followed by the
/// message. Debug and trace output also names the emitting module so
/// engine internals can be told apart from the command itself.
pub struct EngineFormatter;

impl<S, N> FormatEvent<S, N> for EngineFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> format::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();

        write!(writer, "{} ", level_tag(*meta.level()))?;
        if *meta.level() >= Level::DEBUG {
            write!(writer, "{} ", meta.target().dimmed())?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

// tags are padded before colouring so the escape codes do not skew
// the alignment
fn level_tag(level: Level) -> ColoredString {
    match level {
        Level::TRACE => "trace".dimmed(),
        Level::DEBUG => "debug".cyan(),
        Level::INFO => " info".green(),
        Level::WARN => " warn".yellow().bold(),
        Level::ERROR => "error".red().bold(),
    }
}

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .event_format(EngineFormatter)
        .init();
}

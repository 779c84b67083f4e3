//! Subscriber setup: console output plus the size-rotated `monitor_log`.
//!
//! Lines in the rotated file read `YYYY-MM-DD HH:MM:SS | LEVEL | message`,
//! the layout the daily report parses.

use file_rotate::compression::Compression;
use file_rotate::suffix::AppendCount;
use file_rotate::{ContentLimit, FileRotate};
use heartwatch_core::epoch_now;
use std::fmt;
use std::sync::Mutex;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::{DefaultFields, Writer};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LogFileConf;
use crate::display::DisplayClock;

pub const DEFAULT_FILTER: &str = "heartwatch_monitor=info,heartwatch_core=info";

pub type RotatingWriter = Mutex<FileRotate<AppendCount>>;

pub struct ReportLineFormat {
    clock: DisplayClock,
}

impl ReportLineFormat {
    pub fn new(clock: DisplayClock) -> Self {
        Self { clock }
    }
}

fn level_name(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARNING",
        Level::INFO => "INFO",
        Level::DEBUG => "DEBUG",
        Level::TRACE => "TRACE",
    }
}

impl<S, N> FormatEvent<S, N> for ReportLineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> fmt::Result {
        write!(
            writer,
            "{} | {} | ",
            self.clock.format_epoch(epoch_now()),
            level_name(event.metadata().level())
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// `<path>` rotated to `<path>.1` .. `<path>.<backups>` once it passes `max_bytes`.
/// Whole lines are kept together.
pub fn rotating_file(conf: &LogFileConf) -> FileRotate<AppendCount> {
    FileRotate::new(
        &conf.path,
        AppendCount::new(conf.backups),
        ContentLimit::BytesSurpassed(conf.max_bytes),
        Compression::None,
        #[cfg(unix)]
        None,
    )
}

pub fn file_layer<S>(
    conf: &LogFileConf,
    clock: DisplayClock,
) -> tracing_subscriber::fmt::Layer<S, DefaultFields, ReportLineFormat, RotatingWriter>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .event_format(ReportLineFormat::new(clock))
        .with_writer(Mutex::new(rotating_file(conf)))
}

/// Install the global subscriber. `RUST_LOG` overrides [`DEFAULT_FILTER`].
pub fn init(log_file: Option<&LogFileConf>, clock: DisplayClock) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(log_file.map(|conf| file_layer(conf, clock)))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{info, warn};
    use tracing_subscriber::Registry;

    fn conf(dir: &tempfile::TempDir, max_bytes: usize) -> LogFileConf {
        LogFileConf {
            path: dir.path().join("monitor_log").to_string_lossy().into_owned(),
            max_bytes,
            backups: 2,
        }
    }

    #[test]
    fn lines_follow_report_layout() {
        let dir = tempfile::tempdir().unwrap();
        let conf = conf(&dir, 1024 * 1024);
        let subscriber = Registry::default().with(file_layer(&conf, DisplayClock::new(8, 11).unwrap()));

        tracing::subscriber::with_default(subscriber, || {
            warn!(
                "[/SKE_SOLAR/slave_1hour/Morriset/] < Problem: Device Restart Confirmed > mac=D4:AD:20:B7:EA:E2"
            );
            info!("[SLAVE_HEARTBEAT_COLLECT] mac=D4:AD:20:B7:EA:E2 count=1");
        });

        let content = std::fs::read_to_string(&conf.path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let parts: Vec<&str> = lines[0].splitn(3, " | ").collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), "2026-02-04 10:00:00".len());
        assert_eq!(&parts[0][4..5], "-");
        assert_eq!(&parts[0][10..11], " ");
        assert_eq!(parts[1], "WARNING");
        assert!(parts[2].starts_with("[/SKE_SOLAR/slave_1hour/Morriset/] < Problem: Device Restart Confirmed >"));
        assert!(lines[1].contains(" | INFO | [SLAVE_HEARTBEAT_COLLECT]"));
    }

    #[test]
    fn file_rotates_by_size_and_keeps_two_backups() {
        let dir = tempfile::tempdir().unwrap();
        let conf = conf(&dir, 256);
        let subscriber = Registry::default().with(file_layer(&conf, DisplayClock::new(8, 11).unwrap()));

        tracing::subscriber::with_default(subscriber, || {
            for n in 0..100 {
                info!("[SLAVE_HEARTBEAT_OK] mac=D4:AD:20:B7:EA:E2 n={n}");
            }
        });

        let backup = |n: usize| std::path::PathBuf::from(format!("{}.{n}", conf.path));
        assert!(std::path::Path::new(&conf.path).exists());
        assert!(backup(1).exists());
        assert!(backup(2).exists());
        assert!(!backup(3).exists());

        let rotated = std::fs::read_to_string(backup(1)).unwrap();
        assert!(rotated.lines().all(|l| l.splitn(3, " | ").count() == 3));
    }
}

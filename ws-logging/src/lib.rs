//! Process-wide tracing setup for the workspace launcher.
//!
//! Output goes to stdout, a daily-rolling file, or both, formatted either
//! for humans or as JSON lines. `RUST_LOG` takes precedence over the
//! configured level.

use serde::Deserialize;
use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::Directive, fmt::MakeWriter, prelude::*, registry, util::TryInitError, EnvFilter,
};

/// Crates whose chatter is clamped to `warn` regardless of the base level.
const NOISY_TARGETS: [&str; 7] = [
    "hyper=warn",
    "hyper_util=warn",
    "h2=warn",
    "tower=warn",
    "rustls=warn",
    "aws_config=warn",
    "aws_smithy_runtime=warn",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Console,
    File,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub output: LogOutput,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default = "default_file_path")]
    pub file_path: PathBuf,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_file_path() -> PathBuf {
    PathBuf::from("/var/log/ws/ws-api.log")
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            output: LogOutput::default(),
            format: LogFormat::default(),
            file_path: default_file_path(),
        }
    }
}

// Writes every record to two sinks.
struct Tee<A, B> {
    a: A,
    b: B,
}

impl<A: Write, B: Write> Write for Tee<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let res_a = self.a.write(buf);
        let res_b = self.b.write(buf);
        res_a.or(res_b)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.a.flush()?;
        self.b.flush()
    }
}

#[derive(Clone)]
struct MakeTee<A, B> {
    make_a: A,
    make_b: B,
}

impl<'a, A, B> MakeWriter<'a> for MakeTee<A, B>
where
    A: MakeWriter<'a>,
    B: MakeWriter<'a>,
{
    type Writer = Tee<A::Writer, B::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        Tee {
            a: self.make_a.make_writer(),
            b: self.make_b.make_writer(),
        }
    }
}

/// Build the level filter: `RUST_LOG` if set, otherwise the configured level.
pub fn build_filter(level: &str) -> EnvFilter {
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    for target in NOISY_TARGETS {
        if let Ok(directive) = target.parse::<Directive>() {
            filter = filter.add_directive(directive);
        }
    }
    filter
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the life of the process when file output is enabled.
pub fn init_subscriber(settings: &LogSettings) -> Result<Option<WorkerGuard>, TryInitError> {
    let filter = build_filter(&settings.level);
    let json = settings.format == LogFormat::Json;

    match settings.output {
        LogOutput::Console => {
            install(std::io::stdout, json, filter)?;
            Ok(None)
        }
        LogOutput::File => {
            let (writer, guard) = file_writer(&settings.file_path);
            install(writer, json, filter)?;
            Ok(Some(guard))
        }
        LogOutput::Both => {
            let (writer, guard) = file_writer(&settings.file_path);
            let tee = MakeTee {
                make_a: std::io::stdout,
                make_b: writer,
            };
            install(tee, json, filter)?;
            Ok(Some(guard))
        }
    }
}

fn file_writer(path: &Path) -> (tracing_appender::non_blocking::NonBlocking, WorkerGuard) {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path.file_name().unwrap_or("ws-api.log".as_ref());
    let appender = tracing_appender::rolling::daily(dir, file_name);
    tracing_appender::non_blocking(appender)
}

fn install<W>(writer: W, json: bool, filter: EnvFilter) -> Result<(), TryInitError>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer().with_writer(writer);
    let subscriber = registry().with(filter);
    if json {
        subscriber.with(layer.json()).try_init()
    } else {
        subscriber.with(layer.pretty()).try_init()
    }
}

//! Setup routines for tracing and logging of the simulation.
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;

use pennylane::decomposition::LOG_TARGET as DECOMPOSE_TARGET;
use pennylane::simulator::LOG_TARGET as SIMULATE_TARGET;

use tracing::{Metadata, Subscriber};
use tracing_appender::non_blocking;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

fn log_filter(metadata: &Metadata<'_>) -> bool {
    metadata.level() <= &tracing::Level::WARN && metadata.target().starts_with(DECOMPOSE_TARGET)
}

fn verbose_filter(metadata: &Metadata<'_>) -> bool {
    let target = metadata.target();
    target.starts_with(DECOMPOSE_TARGET) || target.starts_with(SIMULATE_TARGET)
}

#[derive(Debug, Default)]
pub struct Tracer {
    pub logfile: Option<non_blocking::WorkerGuard>,
}

impl Tracer {
    /// Setup tracing subscribers for stderr and file logging.
    pub fn setup_tracing(logfile: Option<PathBuf>) -> io::Result<Self> {
        let mut tracer = Self::default();
        let file_layer = logfile.map(|f| tracer.logfile_layer(f)).transpose()?;
        tracing_subscriber::registry()
            .with(tracer.stderr_layer())
            .with(file_layer)
            .init();
        Ok(tracer)
    }

    /// Initialize a file logger handle and non-blocking worker.
    fn init_writer(
        &self,
        file: PathBuf,
    ) -> io::Result<(non_blocking::NonBlocking, non_blocking::WorkerGuard)> {
        let writer = BufWriter::new(File::create(file)?);
        Ok(non_blocking(writer))
    }

    /// Decomposition warnings only. Results go to stdout.
    fn stderr_layer<S>(&mut self) -> impl Layer<S>
    where
        S: Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span>,
    {
        tracing_subscriber::fmt::layer()
            .without_time()
            .with_target(false)
            .with_writer(io::stderr)
            .with_filter(filter_fn(log_filter))
    }

    fn logfile_layer<S>(&mut self, logfile: PathBuf) -> io::Result<impl Layer<S>>
    where
        S: Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span>,
    {
        let (non_blocking, guard) = self.init_writer(logfile)?;
        self.logfile = Some(guard);
        Ok(tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(non_blocking)
            .with_filter(filter_fn(verbose_filter)))
    }
}

// This file is part of Flightdeck.
//
// Flightdeck is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// Flightdeck is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with Flightdeck.  If not, see <http://www.gnu.org/licenses/>.
use anyhow::{Context, Result};
use runtime::{Extension, Runtime};
use std::path::PathBuf;
use structopt::StructOpt;
use tracing_subscriber::{
    fmt::{format::DefaultFields, FormattedFields},
    prelude::*,
    registry::Registry,
    EnvFilter,
};

// Inspired heavily by bevy_log

#[derive(Clone, Debug, StructOpt)]
pub struct TraceLogOpts {
    /// Capture a chrome-format execution trace.
    #[structopt(short = "T", long)]
    trace: bool,

    /// Where to write the chrome trace; defaults to the working directory.
    #[structopt(long, parse(from_os_str))]
    trace_file: Option<PathBuf>,

    /// Log filter to use when RUST_LOG is not set.
    #[structopt(long, default_value = "info")]
    log_filter: String,
}

impl Default for TraceLogOpts {
    fn default() -> Self {
        Self {
            trace: false,
            trace_file: None,
            log_filter: "info".to_owned(),
        }
    }
}

impl TraceLogOpts {
    pub fn trace(&self) -> bool {
        self.trace
    }

    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }
}

/// Installs the global subscriber: `log` records are bridged into `tracing`,
/// filtered, and formatted to stderr. With `--trace`, spans are also written
/// out as a chrome trace; the flush guard lives in the runtime.
#[derive(Debug)]
pub struct TraceLog;

impl Extension for TraceLog {
    fn init(runtime: &mut Runtime) -> Result<()> {
        let opts = runtime
            .maybe_resource::<TraceLogOpts>()
            .cloned()
            .unwrap_or_default();

        tracing_log::LogTracer::init().context("a log backend is already installed")?;

        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&opts.log_filter))
            .with_context(|| format!("invalid log filter: {}", opts.log_filter))?;

        let chrome_layer = if opts.trace {
            let mut builder = tracing_chrome::ChromeLayerBuilder::new().name_fn(Box::new(
                |event_or_span| match event_or_span {
                    tracing_chrome::EventOrSpan::Event(event) => event.metadata().name().into(),
                    tracing_chrome::EventOrSpan::Span(span) => {
                        if let Some(fields) =
                            span.extensions().get::<FormattedFields<DefaultFields>>()
                        {
                            format!("{}: {}", span.metadata().name(), fields.fields.as_str())
                        } else {
                            span.metadata().name().into()
                        }
                    }
                },
            ));
            if let Some(path) = &opts.trace_file {
                builder = builder.file(path.display().to_string());
            }
            let (chrome_layer, guard) = builder.build();
            runtime.insert_non_send(guard);
            Some(chrome_layer)
        } else {
            None
        };

        let subscriber = Registry::default()
            .with(filter)
            .with(tracing_error::ErrorLayer::default())
            .with(tracing_subscriber::fmt::Layer::default().with_writer(std::io::stderr))
            .with(chrome_layer);
        tracing::subscriber::set_global_default(subscriber)
            .context("a tracing subscriber is already installed")?;

        Ok(())
    }
}

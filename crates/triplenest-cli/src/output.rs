//! Output format and sinks.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use clap::ValueEnum;
use flate2::write::GzEncoder;
use flate2::Compression;

/// Output format of the nested result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Nested JSON document
    Json,
    /// One line per collector event
    Trace,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Trace => write!(f, "trace"),
        }
    }
}

type Sink = BufWriter<Box<dyn Write>>;

/// Buffered file or stdout sink, optionally gzip-compressed.
pub enum Output {
    Plain(Sink),
    Gzip(GzEncoder<Sink>),
}

impl Output {
    /// Open `path`, or stdout when `None`.
    pub fn open(path: Option<&Path>, gzip: bool) -> io::Result<Self> {
        let inner: Box<dyn Write> = match path {
            Some(path) => Box::new(File::create(path)?),
            None => Box::new(io::stdout().lock()),
        };
        let sink = BufWriter::new(inner);
        Ok(if gzip {
            Output::Gzip(GzEncoder::new(sink, Compression::default()))
        } else {
            Output::Plain(sink)
        })
    }

    /// Write the gzip trailer, if any, and flush.
    pub fn finish(self) -> io::Result<()> {
        let mut sink = match self {
            Output::Plain(sink) => sink,
            Output::Gzip(encoder) => encoder.finish()?,
        };
        sink.flush()
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Plain(sink) => sink.write(buf),
            Output::Gzip(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Plain(sink) => sink.flush(),
            Output::Gzip(encoder) => encoder.flush(),
        }
    }
}

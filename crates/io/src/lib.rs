use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fmt,
    fs::File,
    io::{BufRead, Write},
    path::{Path, PathBuf},
};
use time::OffsetDateTime;
use tracing::{debug, info};
use model::*;

/// Readings produced before a source reports end-of-stream.
pub const DEFAULT_MAX_READS: u32 = 40;

/// Paths and limits for [`FileDatasource`].
///
/// Column layout, each file starting with one header row:
/// - accelerometer: `x,y,z`
/// - gps: `longitude,latitude`
/// - parking: `length,longitude,latitude`
#[derive(Clone, Debug)]
pub struct SourceConfig {
    pub accelerometer_path: PathBuf,
    pub gps_path: PathBuf,
    pub parking_path: PathBuf,
    pub max_reads: u32,
    pub user_id: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            accelerometer_path: "data/accelerometer.csv".into(),
            gps_path: "data/gps.csv".into(),
            parking_path: "data/parking.csv".into(),
            max_reads: DEFAULT_MAX_READS,
            user_id: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Accelerometer,
    Gps,
    Parking,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stream::Accelerometer => "accelerometer",
            Stream::Gps => "gps",
            Stream::Parking => "parking",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("cannot open {stream} data at {}: {source}", path.display())]
    Open {
        stream: Stream,
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{stream} data, line {line}: column {column} is not a number ({value:?})")]
    Parse {
        stream: Stream,
        line: u64,
        column: usize,
        value: String,
    },
    #[error("{stream} data ran out after {reads} readings")]
    EndOfStream { stream: Stream, reads: u32 },
    #[error("reading {stream} data: {source}")]
    Read {
        stream: Stream,
        #[source]
        source: csv::Error,
    },
}

struct Cursor {
    stream: Stream,
    rdr: csv::Reader<File>,
    rec: csv::StringRecord,
}

impl Cursor {
    fn open(stream: Stream, path: &Path) -> Result<Self, SourceError> {
        let rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|source| SourceError::Open { stream, path: path.to_path_buf(), source })?;
        Ok(Self { stream, rdr, rec: csv::StringRecord::new() })
    }

    fn advance(&mut self, reads: u32) -> Result<(), SourceError> {
        match self.rdr.read_record(&mut self.rec) {
            Ok(true) => Ok(()),
            Ok(false) => Err(SourceError::EndOfStream { stream: self.stream, reads }),
            Err(source) => Err(SourceError::Read { stream: self.stream, source }),
        }
    }

    fn number(&self, column: usize) -> Result<f64, SourceError> {
        let raw = self.rec.get(column).unwrap_or("");
        raw.parse::<f64>().map_err(|_| SourceError::Parse {
            stream: self.stream,
            line: self.rec.position().map(|p| p.line()).unwrap_or(0),
            column,
            value: raw.to_string(),
        })
    }
}

struct Cursors {
    accelerometer: Cursor,
    gps: Cursor,
    parking: Cursor,
}

/// Reads the three telemetry files in lockstep, one [`AggregatedReading`] per row.
///
/// Yields at most `max_reads` readings and then `None`. A file that ends
/// early or a malformed number yields one error and stops the source.
pub struct FileDatasource {
    cfg: SourceConfig,
    cursors: Option<Cursors>,
    reads: u32,
    finished: bool,
}

impl FileDatasource {
    pub fn open(cfg: SourceConfig) -> Result<Self, SourceError> {
        let cursors = Cursors {
            accelerometer: Cursor::open(Stream::Accelerometer, &cfg.accelerometer_path)?,
            gps: Cursor::open(Stream::Gps, &cfg.gps_path)?,
            parking: Cursor::open(Stream::Parking, &cfg.parking_path)?,
        };
        info!(max_reads = cfg.max_reads, user_id = cfg.user_id, "telemetry source opened");
        Ok(Self { cfg, cursors: Some(cursors), reads: 0, finished: false })
    }

    pub fn reads(&self) -> u32 {
        self.reads
    }

    pub fn is_open(&self) -> bool {
        self.cursors.is_some()
    }

    /// Releases the file handles. Safe to call any number of times.
    pub fn close(&mut self) {
        if self.cursors.take().is_some() {
            debug!(reads = self.reads, "telemetry source closed");
        }
    }

    fn read_row(&mut self) -> Result<AggregatedReading, SourceError> {
        let reads = self.reads;
        let Some(c) = self.cursors.as_mut() else {
            return Err(SourceError::EndOfStream { stream: Stream::Accelerometer, reads });
        };
        c.accelerometer.advance(reads)?;
        c.gps.advance(reads)?;
        c.parking.advance(reads)?;

        let accelerometer = AccelerometerReading {
            x: c.accelerometer.number(0)?,
            y: c.accelerometer.number(1)?,
            z: c.accelerometer.number(2)?,
        };
        let gps = GpsReading {
            longitude: c.gps.number(0)?,
            latitude: c.gps.number(1)?,
        };
        let ground_clearance = GroundClearanceReading {
            length: c.parking.number(0)?,
            gps: GpsReading {
                longitude: c.parking.number(1)?,
                latitude: c.parking.number(2)?,
            },
        };
        Ok(AggregatedReading {
            accelerometer,
            gps,
            ground_clearance,
            timestamp: OffsetDateTime::now_utc(),
            user_id: self.cfg.user_id,
        })
    }
}

impl Iterator for FileDatasource {
    type Item = Result<AggregatedReading, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.cursors.is_none() {
            return None;
        }
        if self.reads >= self.cfg.max_reads {
            info!(reads = self.reads, "read limit reached, end of stream");
            self.finished = true;
            self.close();
            return None;
        }
        match self.read_row() {
            Ok(r) => {
                self.reads += 1;
                Some(Ok(r))
            }
            Err(e) => {
                self.finished = true;
                self.close();
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for FileDatasource {}

impl Drop for FileDatasource {
    fn drop(&mut self) {
        self.close();
    }
}

pub fn write_ndjson<W: Write, T: Serialize>(w: &mut W, item: &T) -> Result<()> {
    serde_json::to_writer(&mut *w, item)?;
    writeln!(w)?;
    Ok(())
}

/// One JSON value per line; blank lines are skipped.
pub fn read_ndjson<R: BufRead, T: DeserializeOwned>(r: R) -> impl Iterator<Item = Result<T>> {
    r.lines().filter_map(|line| match line {
        Ok(s) if s.trim().is_empty() => None,
        Ok(s) => Some(serde_json::from_str(&s).map_err(anyhow::Error::from)),
        Err(e) => Some(Err(e.into())),
    })
}

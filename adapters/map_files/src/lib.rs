#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Map-providing services backed by TOML map files or in-memory responses.
//!
//! A map file draws the grid top row first:
//!
//! ```toml
//! version = 1
//! resolution = 0.25
//! origin = [0.0, 0.0]
//! rows = [
//!     "#####",
//!     "#..?#",
//!     "#####",
//! ]
//! ```
//!
//! `.` is free, `#` is occupied and `?` is unknown. The last row drawn is
//! grid row 0, which starts at `origin`.

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

use arena_level_core::{MapResponse, MapService, MapServiceError};
use log::debug;

const SUPPORTED_MAP_VERSION: u32 = 1;
const FREE_VALUE: i8 = 0;
const OCCUPIED_VALUE: i8 = 100;
const UNKNOWN_VALUE: i8 = -1;

/// Errors raised while reading a map file.
#[derive(Debug, thiserror::Error)]
pub enum MapFileError {
    /// The file could not be read.
    #[error("failed to read map file {}", path.display())]
    Io {
        /// Path that failed to load.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The contents are not valid map TOML.
    #[error("failed to parse map toml contents")]
    Parse(#[from] toml::de::Error),
    /// The file declares a version this reader does not understand.
    #[error("unsupported map file version {found}; expected {expected}")]
    UnsupportedVersion {
        /// Version declared by the file.
        found: u32,
        /// Version this reader supports.
        expected: u32,
    },
    /// The file draws no cells.
    #[error("map file contains no rows")]
    NoRows,
    /// A row differs in length from the first row.
    #[error("map row {row} has {actual} cells; expected {expected}")]
    RaggedRow {
        /// Zero-based row index as drawn in the file.
        row: usize,
        /// Length of the first row.
        expected: usize,
        /// Length of the offending row.
        actual: usize,
    },
    /// A row contains a symbol outside the legend.
    #[error("unknown map symbol `{symbol}` at row {row}, column {column}")]
    UnknownSymbol {
        /// Zero-based row index as drawn in the file.
        row: usize,
        /// Zero-based column index.
        column: usize,
        /// Offending symbol.
        symbol: char,
    },
}

#[derive(Debug, serde::Deserialize)]
struct MapFile {
    version: u32,
    resolution: f32,
    #[serde(default)]
    origin: [f32; 2],
    rows: Vec<String>,
}

/// Parses map TOML contents into a service response.
pub fn parse_map(contents: &str) -> Result<MapResponse, MapFileError> {
    let file: MapFile = toml::from_str(contents)?;
    if file.version != SUPPORTED_MAP_VERSION {
        return Err(MapFileError::UnsupportedVersion {
            found: file.version,
            expected: SUPPORTED_MAP_VERSION,
        });
    }

    let width = file.rows.first().ok_or(MapFileError::NoRows)?.chars().count();
    let mut data = Vec::with_capacity(width * file.rows.len());
    for (row, line) in file.rows.iter().enumerate().rev() {
        let actual = line.chars().count();
        if actual != width {
            return Err(MapFileError::RaggedRow {
                row,
                expected: width,
                actual,
            });
        }

        for (column, symbol) in line.chars().enumerate() {
            let value = match symbol {
                '.' => FREE_VALUE,
                '#' => OCCUPIED_VALUE,
                '?' => UNKNOWN_VALUE,
                _ => {
                    return Err(MapFileError::UnknownSymbol {
                        row,
                        column,
                        symbol,
                    })
                }
            };
            data.push(value);
        }
    }

    Ok(MapResponse {
        width: width as u32,
        height: file.rows.len() as u32,
        resolution: file.resolution,
        origin: file.origin,
        data,
    })
}

/// Reads and parses a map file from disk.
pub fn load_map_file(path: &Path) -> Result<MapResponse, MapFileError> {
    let contents = fs::read_to_string(path).map_err(|source| MapFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_map(&contents)
}

/// Serves `<root>/<service_name>.toml` map files.
#[derive(Clone, Debug)]
pub struct TomlMapService {
    root: PathBuf,
}

impl TomlMapService {
    /// Creates a service resolving map names inside `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// File the service reads for `service_name`.
    #[must_use]
    pub fn path_for(&self, service_name: &str) -> PathBuf {
        self.root.join(format!("{service_name}.toml"))
    }
}

impl MapService for TomlMapService {
    fn fetch(&self, service_name: &str) -> Result<MapResponse, MapServiceError> {
        let path = self.path_for(service_name);
        debug!("reading map file {}", path.display());
        load_map_file(&path).map_err(|error| match error {
            MapFileError::NoRows => MapServiceError::EmptyResponse {
                service: service_name.to_owned(),
            },
            other => MapServiceError::Unreachable {
                service: service_name.to_owned(),
                reason: error_chain(&other),
            },
        })
    }
}

/// Serves responses registered ahead of time.
#[derive(Clone, Debug, Default)]
pub struct InMemoryMapService {
    maps: HashMap<String, MapResponse>,
}

impl InMemoryMapService {
    /// Creates a service without any maps.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `response` under `service_name`, replacing any earlier map.
    #[must_use]
    pub fn with_map(mut self, service_name: impl Into<String>, response: MapResponse) -> Self {
        let _ = self.maps.insert(service_name.into(), response);
        self
    }
}

impl MapService for InMemoryMapService {
    fn fetch(&self, service_name: &str) -> Result<MapResponse, MapServiceError> {
        self.maps
            .get(service_name)
            .cloned()
            .ok_or_else(|| MapServiceError::Unreachable {
                service: service_name.to_owned(),
                reason: "no map published under this name".to_owned(),
            })
    }
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

//! Error types for terrabench

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TerrabenchError {
    // Band encoding errors
    #[error("Band {band} has pixel values in [{min}, {max}] outside the int16 range [-32768, 32767]")]
    PixelOutOfRange { band: String, min: f64, max: f64 },

    #[error("Band {band} has values in (1e-6, 0.5] that would round to the nodata value 0 when cast to int16")]
    PrecisionLoss { band: String },

    // Sample indexing and serialization errors
    #[error("Duplicate band {name} for date {date}")]
    DuplicateBand { name: String, date: String },

    #[error("Missing band {band} for date {date} and no fill value given")]
    MissingBand { band: String, date: String },

    #[error("Date {date} is not present in the sample")]
    UnknownDate { date: String },

    #[error("Band {band} has shape {actual:?}, target shape is {expected:?}, but resampling is disabled")]
    ShapeMismatch {
        band: String,
        actual: (usize, usize),
        expected: (usize, usize),
    },

    #[error("Band {band} needs non-uniform zoom factors ({y_factor} x {x_factor}), which is not supported")]
    NonUniformZoom {
        band: String,
        y_factor: f64,
        x_factor: f64,
    },

    #[error("Unsupported resample order {order}: supported orders are 0 (nearest), 1 (linear) and 3 (cubic)")]
    UnsupportedResampleOrder { order: usize },

    #[error("Sample {sample} spans {n_dates} dates, expected exactly one")]
    MultipleDates { sample: String, n_dates: usize },

    #[error("The label is a raster band, but its band info is not a label kind")]
    InvalidLabel,

    #[error("Band info mismatch: expected {expected}, got {got}")]
    BandInfoMismatch { expected: String, got: String },

    #[error("Band {band} has values in [{min}, {max}] outside the class range [0, {n_classes})")]
    ClassIndexOutOfRange {
        band: String,
        min: f64,
        max: f64,
        n_classes: usize,
    },

    #[error("Sample file {path} is corrupted: {reason}")]
    FormatCorruption { path: PathBuf, reason: String },

    // Dataset errors
    #[error("Band {name} does not exist among the dataset band names or their aliases")]
    UnknownBand { name: String },

    #[error("Invalid split name {name}: must be one of 'train', 'valid', 'test'")]
    InvalidSplit { name: String },

    #[error("Unknown partition {name}. Maybe the dataset is missing a default_partition.json?")]
    PartitionNotFound { name: String },

    #[error("No statistics found for band {name} in band_stats.json")]
    StatsNotFound { name: String },

    #[error("Sample index {index} is out of range for the active split of length {len}")]
    SampleIndexOutOfRange { index: usize, len: usize },

    // Configuration errors
    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    #[error("Invalid class names: got {got} names for {expected} classes")]
    ClassNameCount { got: usize, expected: usize },

    // IO and codec errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Geotiff error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("Container error: {0}")]
    SafeTensor(#[from] safetensors::SafeTensorError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Array shape error: {0}")]
    Ndarray(#[from] ndarray::ShapeError),
}

pub type Result<T> = std::result::Result<T, TerrabenchError>;

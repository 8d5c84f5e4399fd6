//! Terrabench Core - Data model and storage for geospatial ML benchmarks
//!
//! This crate contains the band/sample/dataset data model, the persisted
//! sample encodings, partition handling and per-band statistics used to
//! build and consume benchmark datasets.

pub mod config;
pub mod error;
pub mod formats;
pub mod models;
pub mod processing;
pub mod sensors;
pub mod validation;

pub use error::{Result, TerrabenchError};
pub use formats::SampleFormat;
pub use models::{
    AcquisitionDate, Band, BandData, BandInfo, BandKind, Dataset, DatasetOptions, Label,
    LabelType, PackOptions, Partition, Sample, Split, TaskSpecs,
};

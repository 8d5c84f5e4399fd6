pub mod band;
pub mod dataset;
pub mod partition;
pub mod sample;
pub mod stats;

pub use band::{
    format_date, AcquisitionDate, Band, BandData, BandInfo, BandKind, GeoTransform, NODATA,
    NO_DATE,
};
pub use dataset::{Dataset, DatasetIter, DatasetOptions, LabelType, TaskSpecs, Transform};
pub use partition::{partition_file_name, Partition, Split, DEFAULT_PARTITION_NAME};
pub use sample::{Label, PackOptions, Sample};
pub use stats::{compute_dataset_statistics, compute_stats, write_band_stats, BandStats};

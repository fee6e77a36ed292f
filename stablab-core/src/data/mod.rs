//! Dataset sources and row partitioning

pub mod provider;
pub mod split;
pub mod synthetic;

pub use provider::{read_csv_dataset, DataError, DatasetProvider, StandardDatasetProvider};
pub use split::{bootstrap, Partition, SplitError, Splitter};
pub use synthetic::BUILTIN_DATASETS;

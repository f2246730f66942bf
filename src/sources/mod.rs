//! Value sources that produce snapshots for periodic layers.

mod records;
mod value_source;

#[cfg(feature = "remote")]
mod http;

pub use records::{ConfigurationRecord, RecordSource, RecordStore};
pub use value_source::{FnSource, ValueSource};

#[cfg(feature = "remote")]
pub use http::{HttpAuth, HttpSource, HttpSourceBuilder};

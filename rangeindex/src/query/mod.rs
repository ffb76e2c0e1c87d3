//! Boolean filter evaluation over per-property doc bitmaps.

pub mod checksum;
pub mod prop_value_pair;
pub mod searcher;

pub use checksum::{combine_checksums, leaf_checksum};
pub use prop_value_pair::PropValuePair;
pub use searcher::{Bucket, DocBitmap, RangeSearcher, RangeSearcherBuilder, Searcher};

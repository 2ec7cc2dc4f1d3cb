pub mod codes;
pub mod diff;
pub mod extract;
pub mod record;

pub use diff::diff;
pub use extract::{ExtractError, Extractor};
pub use record::{ObservationSet, Record, UpdateSet};

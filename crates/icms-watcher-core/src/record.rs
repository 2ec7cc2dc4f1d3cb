//! Grade records as observed on the portal's grade overview.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One decoded row of the grade table.
///
/// `name` is the stable key; `kind` and `status` hold the decoded labels (or
/// the raw code when the code tables do not know it). `mark` is kept as the
/// portal renders it, e.g. `"1,3"`, `"5,0"` or `"BE"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub name: String,
    pub kind: String,
    pub mark: String,
    pub status: String,
}

impl Record {
    /// The fields compared when deciding whether a record changed.
    pub fn grade_tuple(&self) -> (&str, &str, &str) {
        (&self.mark, &self.kind, &self.status)
    }
}

/// Records produced by one run, keyed by name.
///
/// A `BTreeMap` keeps serialisation stable: the same observation always
/// encodes to the same bytes.
pub type ObservationSet = BTreeMap<String, Record>;

/// Records that are new or changed relative to the baseline.
pub type UpdateSet = BTreeMap<String, Record>;

/// Encode an observation for persistence.
pub fn encode_observation(set: &ObservationSet) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(set)
}

/// Decode a persisted observation.
pub fn decode_observation(bytes: &[u8]) -> serde_json::Result<ObservationSet> {
    serde_json::from_slice(bytes)
}

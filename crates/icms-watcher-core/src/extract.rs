//! Grade table extraction.
//!
//! Turns the cell texts of the grade overview table into an [`ObservationSet`].
//!
//! # Table shape
//!
//! - Row 0 is the header and the last row is the degree summary; both are
//!   dropped unconditionally.
//! - Data rows carry at least five cells: `id`, `name`, `kind code`, `mark`,
//!   `status code` (further columns such as semester or credits are ignored).
//! - Rows with an `id` below the inclusion threshold are structural rows
//!   (account or section headings), not graded units.

use thiserror::Error;
use tracing::{debug, warn};

use crate::codes::{decode_kind, decode_status};
use crate::record::{ObservationSet, Record};

/// Fewest cells a row needs to be read as a graded unit.
pub const MIN_CELLS: usize = 5;

/// Identifiers below this are structural rows on the HsH grade overview.
pub const DEFAULT_INCLUSION_THRESHOLD: i64 = 9999;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("malformed grade table row {row}: identifier {cell:?} is not an integer")]
    MalformedRow { row: usize, cell: String },
}

/// Row filter and decoder for the grade table.
#[derive(Debug, Clone, Copy)]
pub struct Extractor {
    pub inclusion_threshold: i64,
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            inclusion_threshold: DEFAULT_INCLUSION_THRESHOLD,
        }
    }
}

impl Extractor {
    pub fn new(inclusion_threshold: i64) -> Self {
        Self {
            inclusion_threshold,
        }
    }

    /// Build an observation from the table's rows, each given as its cell texts.
    ///
    /// Later rows overwrite earlier rows with the same name. An empty result
    /// is not an error.
    pub fn extract<S: AsRef<str>>(&self, rows: &[Vec<S>]) -> Result<ObservationSet, ExtractError> {
        let mut out = ObservationSet::new();

        if rows.is_empty() {
            warn!("grade table has no rows");
            return Ok(out);
        }
        let body = if rows.len() > 2 {
            &rows[1..rows.len() - 1]
        } else {
            &rows[..0]
        };
        if body.is_empty() {
            warn!(rows = rows.len(), "grade table has no rows between header and summary");
            return Ok(out);
        }

        for (offset, cells) in body.iter().enumerate() {
            let row = offset + 1;
            if cells.len() < MIN_CELLS {
                debug!(row, cells = cells.len(), "skipping short row");
                continue;
            }

            let cell = |i: usize| cells[i].as_ref().trim();
            let id: i64 = cell(0).parse().map_err(|_| ExtractError::MalformedRow {
                row,
                cell: cell(0).to_string(),
            })?;
            if id < self.inclusion_threshold {
                debug!(row, id, "skipping structural row");
                continue;
            }

            let record = Record {
                name: cell(1).to_string(),
                kind: decode_kind(cell(2)),
                mark: cell(3).to_string(),
                status: decode_status(cell(4)),
            };
            out.insert(record.name.clone(), record);
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn header() -> Vec<String> {
        row(&["Nr.", "Name", "Art", "Note", "Status", "CP", "Semester"])
    }

    fn footer() -> Vec<String> {
        row(&["Abschluss 90 Master", "", "", "1,7", ""])
    }

    #[test]
    fn filters_structural_rows_and_decodes_codes() {
        let rows = vec![
            header(),
            row(&["5", "Pflichtbereich", "KO", "", "", ""]),
            row(&["10000", "X", "GE", "1.3", "BE"]),
            footer(),
        ];
        let set = Extractor::new(9999).extract(&rows).unwrap();
        assert_eq!(set.len(), 1);
        let x = &set["X"];
        assert_eq!(x.kind, "Modul");
        assert_eq!(x.mark, "1.3");
        assert_eq!(x.status, "bestanden");
    }

    #[test]
    fn header_and_footer_dropped_even_if_well_formed() {
        let rows = vec![
            row(&["10001", "Header Lookalike", "GE", "1,0", "BE"]),
            row(&["10002", "Real", "PL", "2,0", "BE"]),
            row(&["10003", "Footer Lookalike", "GE", "1,0", "BE"]),
        ];
        let set = Extractor::default().extract(&rows).unwrap();
        assert_eq!(set.keys().collect::<Vec<_>>(), vec!["Real"]);
    }

    #[test]
    fn short_rows_are_skipped_before_parsing() {
        let rows = vec![
            header(),
            row(&["not a number", "Placeholder", "GE", "1,0"]),
            row(&[]),
            footer(),
        ];
        let set = Extractor::default().extract(&rows).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn unparsable_identifier_is_malformed() {
        let rows = vec![
            header(),
            row(&["10000", "Fine", "GE", "1,0", "BE"]),
            row(&["abc", "Broken", "GE", "1,0", "BE"]),
            footer(),
        ];
        let err = Extractor::default().extract(&rows).unwrap_err();
        assert_eq!(
            err,
            ExtractError::MalformedRow {
                row: 2,
                cell: "abc".into()
            }
        );
    }

    #[test]
    fn later_duplicates_win() {
        let rows = vec![
            header(),
            row(&["10000", "Statistik", "GE", "5,0", "NB"]),
            row(&["10001", "Statistik", "GE", "2,3", "BE"]),
            footer(),
        ];
        let set = Extractor::default().extract(&rows).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set["Statistik"].mark, "2,3");
        assert_eq!(set["Statistik"].status, "bestanden");
    }

    #[test]
    fn unknown_codes_and_whitespace() {
        let rows = vec![
            header(),
            row(&[" 12000 ", " Seminar ", "ZZ", " 1,7 ", "QQ", "5"]),
            footer(),
        ];
        let set = Extractor::default().extract(&rows).unwrap();
        let r = &set["Seminar"];
        assert_eq!(r.kind, "ZZ");
        assert_eq!(r.mark, "1,7");
        assert_eq!(r.status, "QQ");
    }

    #[test]
    fn tables_without_body_yield_empty_set() {
        let empty: Vec<Vec<String>> = Vec::new();
        assert!(Extractor::default().extract(&empty).unwrap().is_empty());
        assert!(Extractor::default().extract(&[header()]).unwrap().is_empty());
        assert!(
            Extractor::default()
                .extract(&[header(), footer()])
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn threshold_is_inclusive() {
        let rows = vec![
            header(),
            row(&["9998", "Below", "GE", "1,0", "BE"]),
            row(&["9999", "At", "GE", "1,0", "BE"]),
            footer(),
        ];
        let set = Extractor::new(9999).extract(&rows).unwrap();
        assert_eq!(set.keys().collect::<Vec<_>>(), vec!["At"]);
    }
}

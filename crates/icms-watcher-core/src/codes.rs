/// Lookup tables for the coded columns of the grade overview.
pub mod tables {
    /// Exam status codes (column "Status").
    pub const STATUS_CODES: &[(&str, &str)] = &[
        ("AN", "angemeldet"),
        ("BE", "bestanden"),
        ("NB", "nicht bestanden"),
        ("EN", "endgültig nicht bestanden"),
        ("AB", "abgemeldet"),
        ("KR", "Krankmeldung"),
        ("GR", "genehmigter Rücktritt"),
        ("NGR", "nicht genehmigter Rücktritt"),
        ("NE", "nicht erschienen"),
        ("RT", "abgemeldet über QISPOS"),
        ("ME", "mündl. Ergänzungsprüfung"),
        ("VZ", "Verzicht auf Wiederholung"),
        ("TA", "Täuschungsversuch"),
        ("PV", "Konto/Modul nicht vollständig"),
        ("FAE", "fristgerechte Arbeitsabgabe erfolgt"),
    ];

    /// Unit kind codes (column "Art").
    pub const ART_CODES: &[(&str, &str)] = &[
        ("GE", "Modul"),
        ("PL", "Teilmodul"),
        ("MB", "Modul Bachelorarbeit"),
        ("MM", "Modul Masterarbeit"),
        ("AA", "Abschlussarbeit (Bachelor od. Master)"),
    ];
}

/// Decode `code` through `table`, passing unknown codes through verbatim.
pub fn decode(table: &[(&str, &str)], code: &str) -> String {
    table
        .iter()
        .find(|(k, _)| *k == code)
        .map_or_else(|| code.to_string(), |(_, label)| (*label).to_string())
}

/// Decode a unit kind ("Art") code.
pub fn decode_kind(code: &str) -> String {
    decode(tables::ART_CODES, code)
}

/// Decode an exam status code.
pub fn decode_status(code: &str) -> String {
    decode(tables::STATUS_CODES, code)
}

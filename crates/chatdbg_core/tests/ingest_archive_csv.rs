use chatdbg_core::corpus::load_corpus;
use chatdbg_core::db;
use chatdbg_core::ingest::archive_csv::{
    import_archive_csv, preview_archive_csv, ArchiveCsvMapping,
};
use pretty_assertions::assert_eq;

fn sample() -> &'static str {
    include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../fixtures/demo/archive_sample.csv"
    ))
}

#[test]
fn imports_sample_archive_into_corpus() {
    let mut conn = db::open_in_memory().expect("open");
    db::migrate(&mut conn).expect("migrate");

    let summary =
        import_archive_csv(&mut conn, sample(), &ArchiveCsvMapping::default()).expect("import");
    assert_eq!(summary.inserted, 3);
    assert_eq!(summary.skipped, 2);
    let codes: Vec<&str> = summary.warnings.iter().map(|w| w.code.as_str()).collect();
    assert_eq!(codes, vec!["INGEST_ROW_MISSING_PROVENANCE", "INGEST_ROW_EMPTY"]);

    let corpus = load_corpus(&conn).expect("load");
    let rows: Vec<(u32, &str, &str, &str)> = corpus
        .iter()
        .map(|f| {
            (
                f.sequence_index,
                f.provenance_id.as_str(),
                f.source_id.as_str(),
                f.content.as_str(),
            )
        })
        .collect();
    assert_eq!(
        rows,
        vec![
            (
                0,
                "BG-1001",
                "diary-1948",
                "Headline: הכרזת המדינה. Text: היום הוכרזה מדינת ישראל."
            ),
            (
                1,
                "BG-1002",
                "speeches-1949",
                "Headline: The Negev. Text: In the Negev the people of Israel will be tested.The desert must bloom."
            ),
            // Blank source column falls back to the provenance id.
            (2, "BG-1003", "BG-1003", "Headline: Letter to Paula"),
        ]
    );
}

#[test]
fn import_fails_when_no_rows_survive() {
    let mut conn = db::open_in_memory().expect("open");
    db::migrate(&mut conn).expect("migrate");
    let csv = "book_id,unit,headline,additional_info,additional_info_2\n,,,,\n";
    let err = import_archive_csv(&mut conn, csv, &ArchiveCsvMapping::default()).unwrap_err();
    assert_eq!(err.code, "INGEST_CSV_EMPTY");
}

#[test]
fn preview_returns_headers_and_limited_rows() {
    let preview = preview_archive_csv(sample(), 2).expect("preview");
    assert_eq!(preview.headers[0], "book_id");
    assert_eq!(preview.headers.len(), 8);
    assert_eq!(preview.rows.len(), 2);
    assert_eq!(preview.rows[1][0], "BG-1002");
}

#[test]
fn custom_mapping_without_source_column_uses_provenance() {
    let mut conn = db::open_in_memory().expect("open");
    db::migrate(&mut conn).expect("migrate");
    let csv = "id,title,body\nA,One,first body\nB,Two,\n";
    let mapping = ArchiveCsvMapping {
        provenance_id: "id".to_string(),
        source_id: None,
        headline: "title".to_string(),
        text: vec!["body".to_string()],
    };
    import_archive_csv(&mut conn, csv, &mapping).expect("import");
    let corpus = load_corpus(&conn).expect("load");
    let sources: Vec<&str> = corpus.iter().map(|f| f.source_id.as_str()).collect();
    assert_eq!(sources, vec!["A", "B"]);
}

//! End-to-end ingestion pipeline tests: idempotence, chunk geometry,
//! error isolation, and full reindexing, driven through the library API
//! on a temporary workspace.

use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use ragdesk::config::Config;
use ragdesk::doc_index::DocumentIndex;
use ragdesk::embedding::HashEmbedder;
use ragdesk::ingest::{DocOutcome, Ingestor};
use ragdesk::models::DocStatus;
use ragdesk::vector_index::{SqliteVectorIndex, VectorIndex};

struct TestEnv {
    _tmp: TempDir,
    input_dir: PathBuf,
    doc_index: Arc<DocumentIndex>,
    vectors: Arc<SqliteVectorIndex>,
    ingestor: Ingestor,
}

async fn setup() -> TestEnv {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();
    let input_dir = root.join("input");
    std::fs::create_dir_all(&input_dir).unwrap();

    let config_toml = format!(
        r#"[store]
doc_index_path = "{root}/data/doc_index.json"
vector_db_path = "{root}/data/vectors.sqlite"

[ingest]
input_dir = "{root}/input"

[chunking]
chunk_size = 1000
overlap = 200

[embedding]
provider = "hash"
dims = 64
"#,
        root = root.display()
    );
    let config: Config = toml::from_str(&config_toml).unwrap();
    ragdesk::config::validate(&config).unwrap();

    let doc_index = Arc::new(
        DocumentIndex::open(&config.store.doc_index_path)
            .await
            .unwrap(),
    );
    let vectors = Arc::new(
        SqliteVectorIndex::open(&config.store.vector_db_path)
            .await
            .unwrap(),
    );
    let embedder = Arc::new(HashEmbedder::new(config.embedding.dims));

    let ingestor = Ingestor::new(
        config,
        Arc::clone(&doc_index),
        embedder,
        Arc::clone(&vectors) as Arc<dyn VectorIndex>,
    );

    TestEnv {
        _tmp: tmp,
        input_dir,
        doc_index,
        vectors,
        ingestor,
    }
}

/// 2500 characters with no periods or whitespace, so chunk boundaries and
/// overlaps are exact.
fn text_2500() -> String {
    (0..2500).map(|i| (b'a' + (i % 26) as u8) as char).collect()
}

/// Minimal valid PDF whose single page draws "warranty covers two years".
/// Body is emitted first, then an xref table with correct byte offsets.
fn minimal_pdf() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(b"4 0 obj << /Length 57 >> stream\nBT /F1 12 Tf 100 700 Td (warranty covers two years) Tj ET\nendstream endobj\n");
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

#[tokio::test]
async fn test_2500_char_file_yields_three_bounded_overlapping_chunks() {
    let env = setup().await;
    std::fs::write(env.input_dir.join("long.txt"), text_2500()).unwrap();

    let outcome = env
        .ingestor
        .process_document(&env.input_dir.join("long.txt"))
        .await
        .unwrap();
    assert_eq!(outcome, DocOutcome::Indexed { chunks: 3 });
    assert_eq!(env.vectors.count().await.unwrap(), 3);

    let mut entries = env.vectors.get_all().await.unwrap();
    entries.sort_by_key(|e| e.metadata.chunk_index);

    for entry in &entries {
        assert!(entry.text.chars().count() <= 1000);
        assert_eq!(entry.metadata.filename, "long.txt");
        assert_eq!(entry.metadata.file_type, "txt");
        assert_eq!(entry.text, entry.metadata.text);
    }

    // Consecutive chunks share at least 100 characters.
    for pair in entries.windows(2) {
        let prev = &pair[0].text;
        let tail: String = prev.chars().skip(prev.chars().count() - 100).collect();
        assert!(
            pair[1].text.starts_with(&tail) || pair[1].text.contains(&tail),
            "chunks {} and {} do not overlap",
            pair[0].metadata.chunk_index,
            pair[1].metadata.chunk_index
        );
    }
}

#[tokio::test]
async fn test_reingesting_identical_bytes_is_a_no_op() {
    let env = setup().await;
    let path = env.input_dir.join("doc.txt");
    std::fs::write(&path, text_2500()).unwrap();

    let first = env.ingestor.process_document(&path).await.unwrap();
    assert!(matches!(first, DocOutcome::Indexed { .. }));
    let count_after_first = env.vectors.count().await.unwrap();

    let second = env.ingestor.process_document(&path).await.unwrap();
    assert_eq!(second, DocOutcome::Duplicate);
    assert_eq!(env.vectors.count().await.unwrap(), count_after_first);
    assert_eq!(env.doc_index.len().await, 1);
}

#[tokio::test]
async fn test_duplicate_content_under_new_filename_is_skipped() {
    let env = setup().await;
    std::fs::write(env.input_dir.join("one.txt"), "Identical support notes.").unwrap();
    std::fs::write(env.input_dir.join("two.txt"), "Identical support notes.").unwrap();

    let summary = env.ingestor.process_folder(&env.input_dir).await.unwrap();
    assert_eq!(summary.indexed, 1);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(env.doc_index.len().await, 1);
}

#[tokio::test]
async fn test_idempotence_survives_restart() {
    let env = setup().await;
    let path = env.input_dir.join("doc.txt");
    std::fs::write(&path, "Persistent support answer.").unwrap();
    env.ingestor.process_document(&path).await.unwrap();

    // A fresh index over the same file observes the earlier record.
    let index_path = env._tmp.path().join("data/doc_index.json");
    let reopened = DocumentIndex::open(&index_path).await.unwrap();
    assert_eq!(reopened.len().await, 1);
}

#[tokio::test]
async fn test_corrupt_file_records_error_and_scan_continues() {
    let env = setup().await;
    std::fs::write(env.input_dir.join("bad.pdf"), b"not a valid pdf").unwrap();
    std::fs::write(env.input_dir.join("good.txt"), "A perfectly fine answer.").unwrap();

    let summary = env.ingestor.process_folder(&env.input_dir).await.unwrap();
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.indexed, 1);

    let records = env.doc_index.all().await;
    assert_eq!(records.len(), 2);
    let bad = records
        .iter()
        .find(|(_, r)| r.filename == "bad.pdf")
        .map(|(_, r)| r)
        .unwrap();
    assert_eq!(bad.status, DocStatus::Error);
    assert!(bad.error.is_some());
    assert_eq!(bad.chunk_count, 0);
}

#[tokio::test]
async fn test_error_record_is_keyed_by_the_same_content_hash() {
    let env = setup().await;
    let path = env.input_dir.join("bad.pdf");
    std::fs::write(&path, b"not a valid pdf").unwrap();

    env.ingestor.process_document(&path).await.unwrap();
    // The error record shares the content-hash key, so a direct retry is
    // skipped as already-processed.
    assert_eq!(
        env.ingestor.process_document(&path).await.unwrap(),
        DocOutcome::Duplicate
    );
}

#[tokio::test]
async fn test_unsupported_extension_is_skipped_without_record() {
    let env = setup().await;
    std::fs::write(env.input_dir.join("binary.xyz"), b"whatever").unwrap();
    std::fs::write(env.input_dir.join("notes.txt"), "Supported content.").unwrap();

    let summary = env.ingestor.process_folder(&env.input_dir).await.unwrap();
    assert_eq!(summary.unsupported, 1);
    assert_eq!(summary.indexed, 1);
    assert_eq!(env.doc_index.len().await, 1);
}

#[tokio::test]
async fn test_empty_file_is_skipped_without_record() {
    let env = setup().await;
    let path = env.input_dir.join("empty.txt");
    std::fs::write(&path, "   \n").unwrap();

    let outcome = env.ingestor.process_document(&path).await.unwrap();
    assert_eq!(outcome, DocOutcome::Empty);
    assert_eq!(env.doc_index.len().await, 0);
    assert_eq!(env.vectors.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_markdown_is_ingested_as_plain_text() {
    let env = setup().await;
    std::fs::write(
        env.input_dir.join("faq.md"),
        "# Refund policy\n\nRefunds are processed within **5 business days**.\n",
    )
    .unwrap();

    let summary = env.ingestor.process_folder(&env.input_dir).await.unwrap();
    assert_eq!(summary.indexed, 1);

    let entries = env.vectors.get_all().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].text.contains("Refund policy"));
    assert!(entries[0].text.contains("5 business days"));
    assert!(!entries[0].text.contains("**"));
    assert_eq!(entries[0].metadata.file_type, "md");
}

#[tokio::test]
async fn test_clear_and_reindex_rebuilds_from_scratch() {
    let env = setup().await;
    std::fs::write(env.input_dir.join("a.txt"), "Answer about shipping.").unwrap();
    std::fs::write(env.input_dir.join("b.txt"), "Answer about billing.").unwrap();

    let first = env.ingestor.process_folder(&env.input_dir).await.unwrap();
    assert_eq!(first.indexed, 2);
    let baseline = env.vectors.count().await.unwrap();

    // Without a clear, a second pass indexes nothing new.
    let second = env.ingestor.process_folder(&env.input_dir).await.unwrap();
    assert_eq!(second.indexed, 0);
    assert_eq!(second.duplicates, 2);

    // A reindex wipes both stores and rebuilds to the same state.
    let rebuilt = env.ingestor.clear_and_reindex(&env.input_dir).await.unwrap();
    assert_eq!(rebuilt.indexed, 2);
    assert_eq!(rebuilt.duplicates, 0);
    assert_eq!(env.vectors.count().await.unwrap(), baseline);
    assert_eq!(env.doc_index.len().await, 2);
}

#[tokio::test]
async fn test_chunk_ids_stay_unique_across_duplicate_filenames() {
    let env = setup().await;
    let path = env.input_dir.join("guide.txt");

    std::fs::write(&path, "First revision of the guide.").unwrap();
    env.ingestor.process_document(&path).await.unwrap();

    // Same filename, new bytes: a new document under a new hash, whose
    // chunk ids collide with the first revision's before disambiguation.
    std::fs::write(&path, "Second revision of the guide.").unwrap();
    env.ingestor.process_document(&path).await.unwrap();

    let entries = env.vectors.get_all().await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_ne!(entries[0].id, entries[1].id);
    assert_eq!(entries[0].metadata.chunk_id, entries[1].metadata.chunk_id);
}

#[tokio::test]
async fn test_pdf_text_is_extracted_and_indexed() {
    let env = setup().await;
    std::fs::write(env.input_dir.join("warranty.pdf"), minimal_pdf()).unwrap();

    let summary = env.ingestor.process_folder(&env.input_dir).await.unwrap();
    assert_eq!(summary.indexed, 1);
    assert_eq!(summary.errors, 0);

    let entries = env.vectors.get_all().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].text.contains("warranty covers two years"));
    assert_eq!(entries[0].metadata.file_type, "pdf");
    assert_eq!(entries[0].metadata.filename, "warranty.pdf");
}

#[tokio::test]
async fn test_missing_folder_errors() {
    let env = setup().await;
    let missing = env._tmp.path().join("does-not-exist");
    assert!(env.ingestor.process_folder(&missing).await.is_err());
}

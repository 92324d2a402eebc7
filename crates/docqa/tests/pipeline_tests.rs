//! End-to-end pipeline tests with in-process providers

mod common;

use std::sync::Arc;

use common::*;
use docqa::providers::HashEmbedder;
use docqa::storage::{DocumentRegistry, DocumentStore};
use docqa::types::response::NOT_FOUND_ANSWER;
use docqa::{Error, Orchestrator, PipelineState};

#[tokio::test]
async fn test_answers_from_the_relevant_document_only() {
    let llm = RecordingLlm::new("The sky is blue.");
    let orchestrator = orchestrator(llm.clone());

    let report = orchestrator.ingest(sky_and_grass()).await.unwrap();
    assert_eq!(report.ingested.len(), 2);
    assert!(report.failed.is_empty());
    assert_eq!(orchestrator.state(), PipelineState::Ready);

    let answer = orchestrator.answer("What color is the sky?").await.unwrap();

    assert!(answer.grounded);
    assert!(answer.answer.starts_with("The sky is blue."));
    assert!(answer.answer.contains("[Source: sky.txt]"));
    assert_eq!(answer.citations.len(), 1);
    assert_eq!(answer.citations[0].filename, "sky.txt");

    let prompts = llm.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("[source: sky.txt, page: n/a]\nThe sky is blue."));
    assert!(prompts[0].contains("Question: What color is the sky?"));
    assert!(!prompts[0].contains("grass"));
}

#[tokio::test]
async fn test_unrelated_question_skips_generation() {
    let llm = RecordingLlm::new("should not be used");
    let orchestrator = orchestrator(llm.clone());
    orchestrator.ingest(sky_and_grass()).await.unwrap();

    let answer = orchestrator
        .answer("Quarterly revenue projections?")
        .await
        .unwrap();

    assert!(!answer.grounded);
    assert_eq!(answer.answer, NOT_FOUND_ANSWER);
    assert!(answer.citations.is_empty());
    assert!(llm.prompts().is_empty());
}

#[tokio::test]
async fn test_corrupt_file_does_not_block_the_batch() {
    let orchestrator = orchestrator(RecordingLlm::new("ok"));

    let mut docs = sky_and_grass();
    docs.insert(
        0,
        docqa::SourceDocument::new("broken.pdf", b"this is not a pdf".to_vec()),
    );

    let report = orchestrator.ingest(docs).await.unwrap();

    assert_eq!(report.failed_files(), vec!["broken.pdf".to_string()]);
    assert_eq!(report.ingested.len(), 2);
    assert_eq!(orchestrator.state(), PipelineState::Ready);
    assert_eq!(orchestrator.documents().len(), 2);
}

#[tokio::test]
async fn test_all_files_failing_leaves_error_state() {
    let orchestrator = orchestrator(RecordingLlm::new("ok"));

    let report = orchestrator
        .ingest(vec![
            docqa::SourceDocument::new("broken.pdf", b"garbage".to_vec()),
            text_file("data.csv", "a,b,c"),
        ])
        .await
        .unwrap();

    assert_eq!(report.failed.len(), 2);
    assert!(report.ingested.is_empty());
    assert_eq!(orchestrator.state(), PipelineState::Error);
    assert_eq!(orchestrator.status().status, "error");

    let err = orchestrator.answer("anything?").await.unwrap_err();
    assert!(matches!(err, Error::NotReady { .. }));
}

#[tokio::test]
async fn test_questions_rejected_while_indexing() {
    let embedder = GatedEmbedder::new();
    let orchestrator = Arc::new(orchestrator_with(
        &test_config(),
        embedder.clone(),
        RecordingLlm::new("The sky is blue."),
    ));

    let mut states = orchestrator.subscribe();
    let ingest = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move { orchestrator.ingest(sky_and_grass()).await }
    });

    states
        .wait_for(|s| *s == PipelineState::Indexing)
        .await
        .unwrap();

    let err = orchestrator.answer("What color is the sky?").await.unwrap_err();
    match err {
        Error::NotReady { state } => assert_eq!(state, "indexing"),
        other => panic!("expected NotReady, got {other:?}"),
    }
    assert_eq!(orchestrator.status().status, "initializing");

    embedder.release.notify_one();
    ingest.await.unwrap().unwrap();

    assert_eq!(orchestrator.state(), PipelineState::Ready);
    assert!(orchestrator.answer("What color is the sky?").await.is_ok());
}

#[tokio::test]
async fn test_reingest_replaces_instead_of_duplicating() {
    let llm = RecordingLlm::new("blue");
    let orchestrator = orchestrator(llm.clone());

    orchestrator.ingest(sky_and_grass()).await.unwrap();
    let chunks_before = orchestrator.index().len();
    let first = orchestrator.answer("What color is the sky?").await.unwrap();

    orchestrator
        .ingest(vec![text_file("sky.txt", "The sky is blue.")])
        .await
        .unwrap();
    let second = orchestrator.answer("What color is the sky?").await.unwrap();

    assert_eq!(orchestrator.index().len(), chunks_before);
    assert_eq!(orchestrator.documents().len(), 2);
    assert_eq!(first.citations, second.citations);

    let prompts = llm.prompts();
    assert_eq!(prompts[0], prompts[1]);
}

#[tokio::test]
async fn test_prompt_respects_character_budget() {
    let mut config = test_config();
    config.chunking.chunk_size = 200;
    config.chunking.chunk_overlap = 0;
    config.retrieval.top_k = 4;
    config.retrieval.score_threshold = -1.0;
    config.generation.max_prompt_chars = 600;

    let llm = RecordingLlm::new("Ownership is checked at compile time.");
    let orchestrator = orchestrator_with(
        &config,
        Arc::new(HashEmbedder::new(DIMENSIONS)),
        llm.clone(),
    );

    let docs = (0..4)
        .map(|i| {
            let text = format!(
                "Document {} explains that the borrow checker enforces ownership rules at compile time. {}",
                i,
                "Lifetimes keep references valid. ".repeat(3)
            );
            assert!(text.len() < 200);
            text_file(&format!("notes-{}.txt", i), &text)
        })
        .collect();
    orchestrator.ingest(docs).await.unwrap();

    let answer = orchestrator
        .answer("What does the borrow checker enforce?")
        .await
        .unwrap();

    assert_eq!(answer.chunks_retrieved, 4);
    assert!(answer.chunks_used >= 1);
    assert!(answer.chunks_used < answer.chunks_retrieved);
    assert_eq!(answer.citations.len(), answer.chunks_used);

    let prompt = &llm.prompts()[0];
    assert!(prompt.chars().count() <= 600);
}

#[tokio::test]
async fn test_clear_empties_the_index() {
    let orchestrator = orchestrator(RecordingLlm::new("ok"));
    orchestrator.ingest(sky_and_grass()).await.unwrap();

    let cleared = orchestrator.clear().await.unwrap();
    assert_eq!(cleared, 2);
    assert_eq!(orchestrator.state(), PipelineState::Empty);
    assert!(orchestrator.documents().is_empty());

    let query = HashEmbedder::new(DIMENSIONS).embed_text("sky");
    let err = orchestrator.index().search(&query, 4, 0.0).unwrap_err();
    assert!(matches!(err, Error::IndexNotReady));

    let err = orchestrator.answer("What color is the sky?").await.unwrap_err();
    assert!(matches!(err, Error::NotReady { .. }));
}

#[tokio::test]
async fn test_delete_and_reinitialize_from_storage() {
    let dir = tempfile::tempdir().unwrap();
    let registry_path = dir.path().join("documents.json");
    let docs_dir = dir.path().join("docs");

    let config = test_config();
    let build = || {
        orchestrator_with(
            &config,
            Arc::new(HashEmbedder::new(DIMENSIONS)),
            RecordingLlm::new("ok"),
        )
        .with_storage(
            DocumentRegistry::load(&registry_path),
            DocumentStore::new(&docs_dir).unwrap(),
        )
    };

    let orchestrator = build();
    orchestrator.ingest(sky_and_grass()).await.unwrap();
    assert!(docs_dir.join("sky.txt").exists());

    let removed = orchestrator.delete_document("sky.txt").await.unwrap();
    assert!(removed > 0);
    assert!(!docs_dir.join("sky.txt").exists());
    assert_eq!(orchestrator.state(), PipelineState::Ready);

    let err = orchestrator.delete_document("sky.txt").await.unwrap_err();
    assert!(matches!(err, Error::DocumentNotFound(_)));

    // A fresh process rebuilds from what is on disk
    let restarted: Orchestrator = build();
    assert_eq!(restarted.state(), PipelineState::Empty);
    let report = restarted.reinitialize().await.unwrap();

    assert_eq!(report.ingested.len(), 1);
    assert_eq!(restarted.state(), PipelineState::Ready);
    let names: Vec<_> = restarted
        .documents()
        .into_iter()
        .map(|d| d.filename)
        .collect();
    assert_eq!(names, vec!["grass.txt".to_string()]);

    restarted.delete_document("grass.txt").await.unwrap();
    assert_eq!(restarted.state(), PipelineState::Empty);
}

#[tokio::test]
async fn test_generation_timeout_is_reported() {
    let mut config = test_config();
    config.generation.timeout_secs = 1;

    let orchestrator = orchestrator_with(
        &config,
        Arc::new(HashEmbedder::new(DIMENSIONS)),
        Arc::new(StalledLlm),
    );
    orchestrator.ingest(sky_and_grass()).await.unwrap();

    tokio::time::pause();
    let err = orchestrator.answer("What color is the sky?").await.unwrap_err();

    assert!(matches!(err, Error::GenerationTimeout { secs: 1 }));
    assert_eq!(orchestrator.state(), PipelineState::Ready);
}

#[tokio::test]
async fn test_embedding_failure_leaves_index_and_state_untouched() {
    let llm = RecordingLlm::new("The sky is blue.");
    let orchestrator = orchestrator_with(&test_config(), DriftingEmbedder::new(), llm.clone());
    orchestrator.ingest(sky_and_grass()).await.unwrap();
    let chunks_before = orchestrator.index().len();

    let err = orchestrator
        .ingest(vec![text_file("sky.txt", "The sky has drift now.")])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::DimensionMismatch {
            expected: DIMENSIONS,
            actual: 3
        }
    ));
    assert_eq!(orchestrator.index().len(), chunks_before);
    assert_eq!(orchestrator.state(), PipelineState::Ready);

    let err = orchestrator
        .ingest(vec![text_file("moon.txt", "The moon is unreachable.")])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Embedding(_)));
    assert_eq!(orchestrator.index().len(), chunks_before);
    assert_eq!(orchestrator.state(), PipelineState::Ready);
    assert_eq!(orchestrator.documents().len(), 2);

    // Still answers from the version that was indexed
    orchestrator.answer("What color is the sky?").await.unwrap();
    assert!(llm.prompts()[0].contains("The sky is blue."));
}

#[tokio::test]
async fn test_rejected_upload_keeps_stored_original() {
    let dir = tempfile::tempdir().unwrap();
    let docs_dir = dir.path().join("docs");
    let orchestrator = orchestrator_with(
        &test_config(),
        DriftingEmbedder::new(),
        RecordingLlm::new("ok"),
    )
    .with_storage(
        DocumentRegistry::load(dir.path().join("documents.json")),
        DocumentStore::new(&docs_dir).unwrap(),
    );
    orchestrator.ingest(sky_and_grass()).await.unwrap();

    let result = orchestrator
        .ingest(vec![
            text_file("sky.txt", "The sky has drift now."),
            text_file("sun.txt", "The sun is bright."),
        ])
        .await;
    assert!(result.is_err());

    let stored = std::fs::read_to_string(docs_dir.join("sky.txt")).unwrap();
    assert_eq!(stored, "The sky is blue.");
    assert!(!docs_dir.join("sun.txt").exists());

    let mut names: Vec<String> = std::fs::read_dir(&docs_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["grass.txt".to_string(), "sky.txt".to_string()]);

    // A rebuild from disk sees the accepted version only
    let report = orchestrator.reinitialize().await.unwrap();
    assert_eq!(report.ingested.len(), 2);
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn test_delete_rejects_path_like_names() {
    let dir = tempfile::tempdir().unwrap();
    let docs_dir = dir.path().join("docs");
    let orchestrator = orchestrator(RecordingLlm::new("ok")).with_storage(
        DocumentRegistry::load(dir.path().join("documents.json")),
        DocumentStore::new(&docs_dir).unwrap(),
    );
    orchestrator.ingest(sky_and_grass()).await.unwrap();
    let chunks_before = orchestrator.index().len();

    for name in ["x/sky.txt", "..\\sky.txt", " sky.txt"] {
        let err = orchestrator.delete_document(name).await.unwrap_err();
        assert!(matches!(err, Error::DocumentNotFound(_)), "{name}");
    }

    assert!(docs_dir.join("sky.txt").exists());
    assert_eq!(orchestrator.documents().len(), 2);
    assert_eq!(orchestrator.index().len(), chunks_before);

    orchestrator.delete_document("sky.txt").await.unwrap();
    assert!(!docs_dir.join("sky.txt").exists());
}

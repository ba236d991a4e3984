//! End-to-end scenarios through `HrSystem`.

use super::fixtures::{config, harness, harness_on, write_doc, ANSWER, TABLE_SUMMARY};
use crate::system::{SystemStatus, INGEST_SUCCESS_MESSAGE, NOT_INDEXED_MESSAGE};
use crate::types::UnitKind;
use crate::store::InMemoryStore;
use hr_core::AppError;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_single_article_file_ingests_one_base_unit() {
    let temp = TempDir::new().unwrap();
    let doc = write_doc(temp.path(), "工作規則.txt", &["第一條 試用期為三個月"]);
    let h = harness(&config(temp.path()), None);

    let report = h.system.ingest(&[doc]).await.unwrap();
    assert_eq!(report.fragments, 1);
    assert_eq!(report.base_units, 1);
    assert_eq!(report.object_units, 0);
    assert_eq!(report.table, "hr_test_1");

    let answer = h.system.ask_question("試用期多久？").await;
    let returned = h.reranker.returned.lock().unwrap().clone();
    assert_eq!(returned.len(), 1);
    let unit = &returned[0];
    assert_eq!(unit.kind, UnitKind::Base);
    assert_eq!(unit.metadata.section, "第一條 試用期為三個月");
    assert_eq!(unit.metadata.page, 1);
    assert_eq!(unit.metadata.file_name, "工作規則.txt");

    assert!(answer.starts_with(ANSWER));
    assert!(answer.contains("「參考來源」\n◆ 《工作規則.txt》【第一條 試用期為三個月】 第1頁\n"));
    assert!(answer.contains("  相關內容：第一條 試用期為三個月\n"));
}

#[tokio::test]
async fn test_ask_before_ingest_makes_no_model_calls() {
    let temp = TempDir::new().unwrap();
    let h = harness(&config(temp.path()), None);

    assert_eq!(h.system.ask_question("特休假幾天？").await, NOT_INDEXED_MESSAGE);
    assert_eq!(h.system.status().await, SystemStatus::Ready);
    assert_eq!(h.llm.calls(), 0);
    assert_eq!(h.embedder.calls.load(Ordering::SeqCst), 0);

    let err = h.system.answer("特休假幾天？").await.unwrap_err();
    assert!(matches!(err, AppError::Query(ref m) if m == NOT_INDEXED_MESSAGE));
}

#[tokio::test]
async fn test_same_prefix_on_two_pages_cites_once() {
    let temp = TempDir::new().unwrap();
    let shared = "勞工請假規則".repeat(20);
    let page_a = format!("{}，婚假八日。", shared);
    let page_b = format!("{}，喪假三日。", shared);
    let doc = write_doc(temp.path(), "請假規則.txt", &[&page_a, &page_b]);
    let h = harness(&config(temp.path()), None);

    h.system.ingest(&[doc]).await.unwrap();
    let answer = h.system.ask_question("婚假").await;

    assert_eq!(h.reranker.returned.lock().unwrap().len(), 2);
    assert_eq!(answer.matches("◆").count(), 1);
}

#[tokio::test]
async fn test_units_on_same_page_collapse_to_one_citation() {
    let temp = TempDir::new().unwrap();
    let page = "第三條 特別休假\n依年資給予特別休假。\n| 年資 | 日數 |\n|---|---|\n| 一年以上 | 七日 |";
    let doc = write_doc(temp.path(), "休假.md", &[page]);
    let h = harness(&config(temp.path()), None);

    let report = h.system.ingest(&[doc]).await.unwrap();
    assert_eq!(report.base_units, 1);
    assert_eq!(report.object_units, 1);

    let answer = h.system.ask_question("特別休假幾天").await;
    assert_eq!(h.reranker.returned.lock().unwrap().len(), 2);
    assert_eq!(answer.matches("◆ 《休假.md》【第三條 特別休假】 第1頁").count(), 1);
}

#[tokio::test]
async fn test_synthesizer_receives_exactly_reranked_units() {
    let temp = TempDir::new().unwrap();
    let doc = write_doc(
        temp.path(),
        "規章.txt",
        &["第一條 試用期為三個月", "第二條 婚假八日", "第三條 喪假三日"],
    );
    let h = harness(&config(temp.path()), Some(1));

    h.system.ingest(&[doc]).await.unwrap();
    h.system.ask_question("試用期").await;

    let returned = h.reranker.returned.lock().unwrap().clone();
    assert_eq!(returned.len(), 1);

    let prompt = h.llm.last_prompt();
    assert_eq!(h.llm.calls(), 1);
    assert!(prompt.contains("［來源 1］"));
    assert!(!prompt.contains("［來源 2］"));
    assert!(prompt.contains(&returned[0].text));
}

#[tokio::test]
async fn test_rebuild_replaces_index() {
    let temp = TempDir::new().unwrap();
    let doc = write_doc(temp.path(), "規章.txt", &["第一條 試用期為三個月", "第二條 婚假八日"]);
    let h = harness(&config(temp.path()), None);

    let first = h.system.ingest(&[doc.clone()]).await.unwrap();
    let second = h.system.ingest(&[doc]).await.unwrap();

    assert_eq!(first.unit_count(), second.unit_count());
    assert_eq!(second.table, "hr_test_2");
    assert_eq!(h.store.table_names(), vec!["hr_test_2".to_string()]);
    assert_eq!(
        h.system.status().await,
        SystemStatus::Indexed {
            table: "hr_test_2".to_string(),
            units: 2,
            files: 1,
        }
    );
}

#[tokio::test]
async fn test_failed_rebuild_keeps_previous_index() {
    let temp = TempDir::new().unwrap();
    let doc = write_doc(temp.path(), "規章.txt", &["第一條 試用期為三個月"]);
    let h = harness(&config(temp.path()), None);

    assert_eq!(h.system.process_files(&[doc.clone()]).await, INGEST_SUCCESS_MESSAGE);

    h.embedder.fail.store(true, Ordering::SeqCst);
    let message = h.system.process_files(&[doc]).await;
    assert!(message.starts_with("處理文件時發生錯誤："));
    assert!(message.contains("embedding service unavailable"));

    assert_eq!(h.store.table_names(), vec!["hr_test_1".to_string()]);
    h.embedder.fail.store(false, Ordering::SeqCst);
    let answer = h.system.ask_question("試用期").await;
    assert!(answer.starts_with(ANSWER));
}

#[tokio::test]
async fn test_missing_file_is_ingestion_error() {
    let temp = TempDir::new().unwrap();
    let h = harness(&config(temp.path()), None);

    let err = h
        .system
        .ingest(&[temp.path().join("不存在.pdf")])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Ingestion(_)));
    assert_eq!(h.system.status().await, SystemStatus::Ready);
}

#[tokio::test]
async fn test_rerank_failure_is_reported_and_retryable() {
    let temp = TempDir::new().unwrap();
    let doc = write_doc(temp.path(), "規章.txt", &["第一條 試用期為三個月"]);
    let h = harness(&config(temp.path()), None);
    h.system.ingest(&[doc]).await.unwrap();

    h.reranker.fail.store(true, Ordering::SeqCst);
    let message = h.system.ask_question("試用期").await;
    assert!(message.starts_with("回答問題時發生錯誤："));
    assert!(message.contains("rerank service unavailable"));
    assert_eq!(h.llm.calls(), 0);

    h.reranker.fail.store(false, Ordering::SeqCst);
    assert!(h.system.ask_question("試用期").await.starts_with(ANSWER));
}

#[tokio::test]
async fn test_small_context_budget_uses_tree_summarization() {
    let temp = TempDir::new().unwrap();
    let pages: Vec<String> = (1..=5)
        .map(|i| format!("第{}條 {}", i, "勞工請假應事先以書面敘明理由。".repeat(4)))
        .collect();
    let page_refs: Vec<&str> = pages.iter().map(String::as_str).collect();
    let doc = write_doc(temp.path(), "請假.txt", &page_refs);

    let mut config = config(temp.path());
    config.retrieval.max_context_chars = 120;
    let h = harness(&config, None);

    h.system.ingest(&[doc]).await.unwrap();
    let answer = h.system.ask_question("請假程序").await;

    assert!(answer.starts_with(ANSWER));
    assert!(h.llm.summary_calls() >= 2);
    assert!(h.llm.last_prompt().contains("摘要"));
}

#[tokio::test]
async fn test_empty_selection_is_ingestion_error() {
    let temp = TempDir::new().unwrap();
    let h = harness(&config(temp.path()), None);

    let message = h.system.process_files(&[temp.path().to_path_buf()]).await;
    assert!(message.starts_with("處理文件時發生錯誤："));
}

#[tokio::test]
async fn test_new_requires_every_missing_key() {
    let temp = TempDir::new().unwrap();
    let config = config(temp.path());

    let err = crate::system::HrSystem::new(&config).await.err().unwrap();
    assert_eq!(
        err.to_string(),
        "缺少必要的環境變量: LLAMA_CLOUD_API_KEY, OPENAI_API_KEY, COHERE_API_KEY, HR_VECTOR_STORE_URI"
    );
}

#[tokio::test]
async fn test_restart_drops_generations_of_earlier_process() {
    let temp = TempDir::new().unwrap();
    let doc = write_doc(temp.path(), "規章.txt", &["第一條 試用期為三個月"]);
    let store = Arc::new(InMemoryStore::new());

    let first = harness_on(&config(temp.path()), None, Arc::clone(&store));
    first.system.ingest(&[doc.clone()]).await.unwrap();
    first.system.ingest(&[doc.clone()]).await.unwrap();
    assert_eq!(store.table_names(), vec!["hr_test_2".to_string()]);

    let second = harness_on(&config(temp.path()), None, Arc::clone(&store));
    let report = second.system.ingest(&[doc]).await.unwrap();
    assert_eq!(report.table, "hr_test_1");
    assert_eq!(store.table_names(), vec!["hr_test_1".to_string()]);
    assert!(second.system.ask_question("試用期").await.starts_with(ANSWER));
}

#[tokio::test]
async fn test_table_units_are_embedded_with_summary() {
    let temp = TempDir::new().unwrap();
    let page = "第三條 特別休假\n| 年資 | 日數 |\n|---|---|\n| 一年以上 | 七日 |";
    let doc = write_doc(temp.path(), "休假.md", &[page]);
    let h = harness(&config(temp.path()), None);

    h.system.ingest(&[doc]).await.unwrap();
    assert_eq!(h.llm.table_calls(), 1);

    h.system.ask_question("特別休假幾天").await;
    let returned = h.reranker.returned.lock().unwrap().clone();
    let table = returned
        .iter()
        .find(|u| u.kind == UnitKind::Object)
        .unwrap();
    assert!(table.text.starts_with(&format!("{}\n", TABLE_SUMMARY)));
    assert!(table.text.contains("| 一年以上 | 七日 |"));
}

#[tokio::test]
async fn test_failed_table_summary_keeps_raw_table() {
    let temp = TempDir::new().unwrap();
    let page = "| 假別 | 日數 |\n|---|---|\n| 婚假 | 八日 |";
    let doc = write_doc(temp.path(), "假別.md", &[page]);
    let h = harness(&config(temp.path()), None);
    h.llm.fail_tables.store(true, Ordering::SeqCst);

    let report = h.system.ingest(&[doc]).await.unwrap();
    assert_eq!(report.object_units, 1);

    h.system.ask_question("婚假").await;
    let returned = h.reranker.returned.lock().unwrap().clone();
    assert_eq!(returned.len(), 1);
    assert!(returned[0].text.starts_with("| 假別 | 日數 |"));
}

#[tokio::test]
async fn test_table_summaries_can_be_disabled() {
    let temp = TempDir::new().unwrap();
    let page = "| 假別 | 日數 |\n|---|---|\n| 喪假 | 三日 |";
    let doc = write_doc(temp.path(), "假別.md", &[page]);
    let mut config = config(temp.path());
    config.ingestion.summarize_tables = false;
    let h = harness(&config, None);

    h.system.ingest(&[doc]).await.unwrap();
    assert_eq!(h.llm.calls(), 0);
}

#[tokio::test]
async fn test_error_message_has_single_category() {
    let temp = TempDir::new().unwrap();
    let h = harness(&config(temp.path()), None);

    let message = h.system.process_files(&[temp.path().join("不存在.pdf")]).await;
    assert!(message.starts_with("處理文件時發生錯誤：Parse error: File not found"));
    assert!(!message.contains("Ingestion error"));
}

#[tokio::test]
async fn test_new_rejects_invalid_tunables() {
    let temp = TempDir::new().unwrap();
    let mut config = config(temp.path());
    config.retrieval.similarity_top_k = 0;

    let err = crate::system::HrSystem::new(&config).await.err().unwrap();
    assert!(matches!(err, AppError::Config(_)));
}

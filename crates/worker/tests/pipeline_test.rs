use std::sync::Arc;

use docgen_core::{AnalysisConfig, KnowledgeConfig};
use docgen_domain::{
    task_types, BlockKind, CancellationFlag, TaskContext, TaskRequest, TaskStatus, WorkerAgent,
};
use docgen_infrastructure::{ExtractedJsonParser, KnowledgeStore};
use docgen_worker::{AnalysisPipeline, DocumentAnalysisAgent};

fn span(text: &str, x: f32, y: f32, size: f32) -> serde_json::Value {
    serde_json::json!({"text": text, "bbox": [x, y, 120.0, 16.0], "font_size": size})
}

/// 两页文档：重复页眉、正文、一个logo尺寸的图像
fn sample_document() -> Vec<u8> {
    let header = || span("ACME PTY LTD", 200.0, 40.0, 18.0);
    serde_json::json!({
        "pages": [
            {
                "width": 595.0,
                "height": 842.0,
                "spans": [
                    header(),
                    span("特别决议", 72.0, 200.0, 14.0),
                    span("兹决议对公司进行自愿清算。", 72.0, 260.0, 12.0),
                ],
                "images": [{"bbox": [40.0, 30.0, 90.0, 50.0]}]
            },
            {
                "width": 595.0,
                "height": 842.0,
                "spans": [
                    header(),
                    span("清算人任命", 72.0, 200.0, 14.0),
                    span("签名", 72.0, 790.0, 10.0),
                ]
            }
        ]
    })
    .to_string()
    .into_bytes()
}

/// 4页文档，第3页损坏
fn document_with_corrupt_page() -> Vec<u8> {
    let page = serde_json::json!({
        "width": 595.0,
        "height": 842.0,
        "spans": [span("正文", 72.0, 300.0, 12.0)]
    });
    serde_json::json!({
        "pages": [page.clone(), page.clone(), 42, page]
    })
    .to_string()
    .into_bytes()
}

fn pipeline() -> AnalysisPipeline {
    AnalysisPipeline::new(Arc::new(ExtractedJsonParser::new()), AnalysisConfig::default())
}

async fn store(dir: &tempfile::TempDir) -> Arc<KnowledgeStore> {
    let path = dir.path().join("kb.json");
    KnowledgeStore::open(KnowledgeConfig {
        store_path: path.to_string_lossy().into_owned(),
        flush_interval_seconds: 0,
        ..KnowledgeConfig::default()
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn test_analysis_is_deterministic() {
    let pipeline = pipeline();
    let bytes = sample_document();
    let cancel = CancellationFlag::new();

    let first = pipeline.analyze(&bytes, &cancel).await.unwrap();
    let second = pipeline.analyze(&bytes, &cancel).await.unwrap();

    assert_eq!(first.content_hash, second.content_hash);

    let pattern_a = pipeline.synthesize_template(&first, None);
    let pattern_b = pipeline.synthesize_template(&second, None);

    assert_eq!(pattern_a.pattern_id, pattern_b.pattern_id);
    assert_eq!(pattern_a.pattern_id, first.content_hash);
    let ids_a: Vec<_> = pattern_a.slots.iter().map(|s| s.id.clone()).collect();
    let ids_b: Vec<_> = pattern_b.slots.iter().map(|s| s.id.clone()).collect();
    assert_eq!(ids_a, ids_b);
}

#[tokio::test]
async fn test_corrupt_page_degrades_without_failing() {
    let pipeline = pipeline();
    let cancel = CancellationFlag::new();

    let result = pipeline
        .analyze(&document_with_corrupt_page(), &cancel)
        .await
        .unwrap();

    assert_eq!(result.degraded_pages, vec![3]);
    let covered: Vec<u32> = result.pages.iter().map(|p| p.page_number).collect();
    assert_eq!(covered, vec![1, 2, 4]);
    assert!(result.is_partial());
    assert!(result.flags.multipage);
}

#[tokio::test]
async fn test_content_flags_detect_logo_and_multipage() {
    let pipeline = pipeline();
    let cancel = CancellationFlag::new();

    let result = pipeline.analyze(&sample_document(), &cancel).await.unwrap();

    // 90x50 的图像小于logo阈值
    assert!(result.flags.has_logo);
    assert!(result.flags.multipage);
    assert!(!result.flags.has_forms);
}

#[tokio::test]
async fn test_repeated_header_is_factored_once() {
    let pipeline = pipeline();
    let cancel = CancellationFlag::new();

    let result = pipeline.analyze(&sample_document(), &cancel).await.unwrap();
    let header_motifs: Vec<_> = result
        .design
        .motifs
        .iter()
        .filter(|m| m.kind == BlockKind::Header)
        .collect();
    assert_eq!(header_motifs.len(), 1);
    assert_eq!(header_motifs[0].pages, vec![1, 2]);

    let pattern = pipeline.synthesize_template(&result, None);
    let header_slots: Vec<_> = pattern
        .slots
        .iter()
        .filter(|s| s.style.region == BlockKind::Header)
        .collect();
    assert_eq!(header_slots.len(), 1);
    assert!(header_slots[0].repeat_on_every_page);
}

#[tokio::test]
async fn test_cancellation_yields_truncated_partial_result() {
    let pipeline = pipeline();
    let cancel = CancellationFlag::new();
    cancel.cancel();

    let result = pipeline.analyze(&sample_document(), &cancel).await.unwrap();

    // 结构提取（当前阶段）完成，设计提取被中止
    assert!(result.truncated);
    assert!(!result.pages.is_empty());
    assert!(result.design.motifs.is_empty());
    assert!(result.design.margins.is_none());
}

#[tokio::test]
async fn test_concurrent_template_generation_yields_one_entry() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir).await;

    let file_path = dir.path().join("sample.pdf.json");
    tokio::fs::write(&file_path, sample_document()).await.unwrap();

    let agent = Arc::new(DocumentAnalysisAgent::new(pipeline(), store.clone()));
    let task = |name: &str| {
        TaskRequest::new(
            task_types::GENERATE_TEMPLATE_FROM_PDF,
            serde_json::json!({
                "file_path": file_path.to_string_lossy(),
                "template_name": name,
            }),
        )
    };

    let ctx = TaskContext::new();
    let t1 = task("t1");
    let t2 = task("t2");
    let (a, b) = tokio::join!(
        agent.process(&t1, &ctx),
        agent.process(&t2, &ctx),
    );
    let a = a.unwrap();
    let b = b.unwrap();
    assert_eq!(a.status, TaskStatus::Succeeded);
    assert_eq!(b.status, TaskStatus::Succeeded);

    // 相同内容哈希：恰好一个知识条目，两次写入合并
    assert_eq!(store.len().await, 1);
    let hash = docgen_domain::content_hash(&sample_document());
    let entry = store.get(&hash).await.unwrap();
    assert_eq!(entry.usage_count, 2);
    assert_eq!(entry.version, 2);
}

#[tokio::test]
async fn test_analyze_task_reports_partial_failure() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir).await;

    let file_path = dir.path().join("corrupt.pdf.json");
    tokio::fs::write(&file_path, document_with_corrupt_page())
        .await
        .unwrap();

    let agent = DocumentAnalysisAgent::new(pipeline(), store);
    let task = TaskRequest::new(
        task_types::ANALYZE_PDF_DOCUMENT,
        serde_json::json!({"file_path": file_path.to_string_lossy()}),
    );

    let outcome = agent.process(&task, &TaskContext::new()).await.unwrap();
    assert_eq!(outcome.status, TaskStatus::PartiallyFailed);
    assert!(outcome.error_message.unwrap().contains("部分页面解析失败"));

    // 降级结果仍然携带可用页面
    let degraded: Vec<u32> =
        serde_json::from_value(outcome.output["degraded_pages"].clone()).unwrap();
    assert_eq!(degraded, vec![3]);
}

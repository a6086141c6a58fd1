use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use docgen_core::{DocgenError, DocgenResult};
use docgen_domain::{task_types, TaskOutcome, TaskRequest, TaskStatus};

/// 批量子任务的单项结果
#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    pub index: usize,
    pub task_id: Uuid,
    /// 子任务的可读标识（文件路径或实体名）
    pub label: String,
    pub status: TaskStatus,
    pub error: Option<String>,
    pub output: serde_json::Value,
}

impl BatchItem {
    pub fn is_success(&self) -> bool {
        matches!(
            self.status,
            TaskStatus::Succeeded | TaskStatus::PartiallyFailed
        )
    }
}

/// 批量任务汇总
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub batch_id: Uuid,
    pub total: usize,
    pub successes: usize,
    pub success_rate: f64,
    pub items: Vec<BatchItem>,
}

impl BatchSummary {
    pub fn new(batch_id: Uuid, mut items: Vec<BatchItem>) -> Self {
        // 子任务完成顺序不保证，汇总前恢复提交顺序
        items.sort_by_key(|item| item.index);
        let total = items.len();
        let successes = items.iter().filter(|i| i.is_success()).count();
        let success_rate = if total == 0 {
            1.0
        } else {
            successes as f64 / total as f64
        };
        Self {
            batch_id,
            total,
            successes,
            success_rate,
            items,
        }
    }

    /// 汇总状态：全部成功 / 部分失败 / 全部失败
    pub fn status(&self) -> TaskStatus {
        if self.successes == self.total {
            TaskStatus::Succeeded
        } else if self.successes > 0 {
            TaskStatus::PartiallyFailed
        } else {
            TaskStatus::Failed
        }
    }

    pub fn into_outcome(self, agent: &str, execution_time_ms: u64) -> TaskOutcome {
        let status = self.status();
        let error_message = if status == TaskStatus::Succeeded {
            None
        } else {
            Some(format!(
                "{}/{} 个子任务失败",
                self.total - self.successes,
                self.total
            ))
        };
        let batch_id = self.batch_id;
        TaskOutcome {
            task_id: batch_id,
            status,
            output: serde_json::to_value(&self).unwrap_or(serde_json::Value::Null),
            error_message,
            agent: agent.to_string(),
            execution_time_ms,
        }
    }
}

/// 将批量任务展开为独立子任务
///
/// 子任务彼此独立：单个失败绝不中止兄弟任务。
pub(crate) async fn expand(task: &TaskRequest) -> DocgenResult<Vec<TaskRequest>> {
    match task.task_type.as_str() {
        task_types::BATCH_ANALYZE_FOLDER => expand_folder(task).await,
        task_types::GENERATE_TEMPLATES_FROM_PDFS => expand_file_list(task),
        task_types::PROCESS_MULTI_USER_DOCUMENTS => expand_entities(task),
        other => Err(DocgenError::UnroutableTask {
            task_type: other.to_string(),
        }),
    }
}

async fn expand_folder(task: &TaskRequest) -> DocgenResult<Vec<TaskRequest>> {
    let folder = task
        .payload
        .get("folder_path")
        .and_then(|v| v.as_str())
        .ok_or_else(|| DocgenError::ValidationError("缺少 folder_path 字段".to_string()))?;

    let mut dir = tokio::fs::read_dir(folder)
        .await
        .map_err(|e| DocgenError::ValidationError(format!("无法读取目录 {folder}: {e}")))?;

    let mut files = Vec::new();
    while let Some(entry) = dir
        .next_entry()
        .await
        .map_err(|e| DocgenError::TaskExecution(format!("遍历目录失败: {e}")))?
    {
        let path = entry.path();
        let is_document = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("pdf") || e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if path.is_file() && is_document {
            files.push(path.to_string_lossy().into_owned());
        }
    }
    // 目录遍历顺序不稳定，排序保证子任务顺序确定
    files.sort();

    Ok(files
        .into_iter()
        .map(|file_path| {
            TaskRequest::new(
                task_types::ANALYZE_PDF_DOCUMENT,
                json!({ "file_path": file_path }),
            )
        })
        .collect())
}

fn expand_file_list(task: &TaskRequest) -> DocgenResult<Vec<TaskRequest>> {
    let files = task
        .payload
        .get("file_paths")
        .and_then(|v| v.as_array())
        .ok_or_else(|| DocgenError::ValidationError("缺少 file_paths 字段".to_string()))?;

    files
        .iter()
        .map(|value| {
            let file_path = value.as_str().ok_or_else(|| {
                DocgenError::ValidationError("file_paths 必须是字符串数组".to_string())
            })?;
            let mut payload = json!({ "file_path": file_path });
            if let Some(name) = task.payload.get("template_name") {
                payload["template_name"] = name.clone();
            }
            Ok(TaskRequest::new(
                task_types::GENERATE_TEMPLATE_FROM_PDF,
                payload,
            ))
        })
        .collect()
}

fn expand_entities(task: &TaskRequest) -> DocgenResult<Vec<TaskRequest>> {
    let entities = task
        .payload
        .get("entities")
        .and_then(|v| v.as_array())
        .ok_or_else(|| DocgenError::ValidationError("缺少 entities 字段".to_string()))?;

    if entities.is_empty() {
        return Err(DocgenError::ValidationError(
            "entities 不能为空".to_string(),
        ));
    }

    // 批次级公共字段与实体字段合并，实体字段优先
    let mut common = task.payload.clone();
    if let Some(map) = common.as_object_mut() {
        map.remove("entities");
    }

    Ok(entities
        .iter()
        .map(|entity| {
            let mut payload = common.clone();
            if let (Some(base), Some(overlay)) = (payload.as_object_mut(), entity.as_object()) {
                for (key, value) in overlay {
                    base.insert(key.clone(), value.clone());
                }
            }
            TaskRequest::new(task_types::GENERATE_LIQUIDATION_DOCUMENTS, payload)
        })
        .collect())
}

/// 子任务的可读标识
pub(crate) fn item_label(task: &TaskRequest) -> String {
    task.payload
        .get("file_path")
        .or_else(|| task.payload.get("company_name"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| task.id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_expand_entities_merges_common_fields() {
        let task = TaskRequest::new(
            task_types::PROCESS_MULTI_USER_DOCUMENTS,
            json!({
                "document_type": "liquidation_resolution",
                "entities": [
                    {"company_name": "Alpha Pty Ltd"},
                    {"company_name": "Beta Pty Ltd", "document_type": "creditor_notice"},
                ]
            }),
        );

        let subs = expand(&task).await.unwrap();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].task_type, task_types::GENERATE_LIQUIDATION_DOCUMENTS);
        assert_eq!(
            subs[0].payload["document_type"],
            json!("liquidation_resolution")
        );
        assert_eq!(subs[0].payload["company_name"], json!("Alpha Pty Ltd"));
        // 实体字段覆盖公共字段
        assert_eq!(subs[1].payload["document_type"], json!("creditor_notice"));
        // 公共字段不再携带entities
        assert!(subs[0].payload.get("entities").is_none());
    }

    #[tokio::test]
    async fn test_expand_empty_entities_is_validation_error() {
        let task = TaskRequest::new(
            task_types::PROCESS_MULTI_USER_DOCUMENTS,
            json!({"entities": []}),
        );
        assert!(matches!(
            expand(&task).await,
            Err(DocgenError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_expand_file_list_carries_template_name() {
        let task = TaskRequest::new(
            task_types::GENERATE_TEMPLATES_FROM_PDFS,
            json!({
                "file_paths": ["a.pdf", "b.pdf"],
                "template_name": "resolution",
            }),
        );

        let subs = expand(&task).await.unwrap();
        assert_eq!(subs.len(), 2);
        for sub in &subs {
            assert_eq!(sub.task_type, task_types::GENERATE_TEMPLATE_FROM_PDF);
            assert_eq!(sub.payload["template_name"], json!("resolution"));
        }
        assert_eq!(subs[0].payload["file_path"], json!("a.pdf"));
    }

    #[tokio::test]
    async fn test_expand_folder_sorts_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.pdf", "a.pdf", "ignore.txt"] {
            tokio::fs::write(dir.path().join(name), b"x").await.unwrap();
        }

        let task = TaskRequest::new(
            task_types::BATCH_ANALYZE_FOLDER,
            json!({"folder_path": dir.path().to_string_lossy()}),
        );

        let subs = expand(&task).await.unwrap();
        assert_eq!(subs.len(), 2);
        let first = subs[0].payload["file_path"].as_str().unwrap();
        let second = subs[1].payload["file_path"].as_str().unwrap();
        assert!(first.ends_with("a.pdf"));
        assert!(second.ends_with("b.pdf"));
    }

    #[test]
    fn test_summary_success_rate_and_status() {
        let item = |index: usize, status: TaskStatus| BatchItem {
            index,
            task_id: Uuid::new_v4(),
            label: format!("item-{index}"),
            status,
            error: None,
            output: serde_json::Value::Null,
        };

        let summary = BatchSummary::new(
            Uuid::new_v4(),
            vec![
                item(2, TaskStatus::Succeeded),
                item(0, TaskStatus::Succeeded),
                item(1, TaskStatus::Failed),
            ],
        );

        assert_eq!(summary.total, 3);
        assert_eq!(summary.successes, 2);
        assert!((summary.success_rate - 2.0 / 3.0).abs() < f64::EPSILON);
        assert_eq!(summary.status(), TaskStatus::PartiallyFailed);
        // 恢复提交顺序
        assert_eq!(summary.items[0].index, 0);
        assert_eq!(summary.items[2].index, 2);
    }
}

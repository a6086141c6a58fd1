use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::pattern::TemplatePattern;

/// 知识库条目
///
/// 以模板的 pattern_id（内容哈希）为唯一键，只能通过知识库的
/// upsert 操作修改；版本号每次写入严格递增。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub pattern_id: String,
    pub document_type: String,
    pub compliance_tags: Vec<String>,
    pub usage_count: u64,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
    pub pattern: TemplatePattern,
}

/// 知识库查询
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeQuery {
    pub document_type: String,
    /// 上下文特征过滤器，与条目的合规标签和内容标志求重合度
    pub context_filters: Vec<String>,
    pub limit: Option<usize>,
}

/// 模式推荐结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternSuggestion {
    pub pattern_id: String,
    pub document_type: String,
    pub score: f64,
    pub reasons: Vec<String>,
}

/// 知识库统计信息
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KnowledgeStats {
    pub entries: usize,
    pub total_usage: u64,
    pub last_update: Option<DateTime<Utc>>,
}

/// 知识库磁盘格式
///
/// 整库序列化为单个JSON文档，启动时全量加载，定期刷盘。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBaseFile {
    pub format_version: u32,
    pub entries: Vec<KnowledgeEntry>,
}

impl KnowledgeBaseFile {
    pub const CURRENT_FORMAT: u32 = 1;

    pub fn new(entries: Vec<KnowledgeEntry>) -> Self {
        Self {
            format_version: Self::CURRENT_FORMAT,
            entries,
        }
    }
}

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use docgen_core::{DocgenError, DocgenResult, KnowledgeConfig};
use docgen_domain::{
    AgentHealth, HealthProbe, KnowledgeBaseFile, KnowledgeEntry, KnowledgeQuery, KnowledgeStats,
    PatternSuggestion, TemplatePattern,
};

/// 知识库
///
/// 以模板 pattern_id（内容哈希）为键的去重索引。整库持久化为
/// 单个JSON文档：启动时全量加载，后台定期刷盘，关闭时强制刷盘。
/// 写入采用逐键乐观版本校验：不同文档的并发分析互不竞争，相同
/// 内容的并发写入只在同一个键上通过版本检查串行化。
pub struct KnowledgeStore {
    entries: RwLock<HashMap<String, KnowledgeEntry>>,
    path: PathBuf,
    config: KnowledgeConfig,
}

impl KnowledgeStore {
    /// 打开知识库，存在持久化文件时全量加载
    pub async fn open(config: KnowledgeConfig) -> DocgenResult<Arc<Self>> {
        let path = PathBuf::from(&config.store_path);
        let entries = Self::load_entries(&path).await?;
        if !entries.is_empty() {
            info!("知识库加载完成: {} 个条目 ({})", entries.len(), path.display());
        }
        Ok(Arc::new(Self {
            entries: RwLock::new(entries),
            path,
            config,
        }))
    }

    async fn load_entries(path: &PathBuf) -> DocgenResult<HashMap<String, KnowledgeEntry>> {
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let bytes = tokio::fs::read(path).await?;
        let file: KnowledgeBaseFile = serde_json::from_slice(&bytes)?;
        if file.format_version > KnowledgeBaseFile::CURRENT_FORMAT {
            return Err(DocgenError::Configuration(format!(
                "不支持的知识库格式版本: {}",
                file.format_version
            )));
        }
        Ok(file
            .entries
            .into_iter()
            .map(|e| (e.pattern_id.clone(), e))
            .collect())
    }

    /// 条目当前版本号，供乐观写入的调用方读取
    pub async fn current_version(&self, pattern_id: &str) -> Option<u64> {
        self.entries.read().await.get(pattern_id).map(|e| e.version)
    }

    pub async fn get(&self, pattern_id: &str) -> Option<KnowledgeEntry> {
        self.entries.read().await.get(pattern_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// 插入或更新知识条目
    ///
    /// expected_version 必须等于条目当前版本（新建时为 None 或 0），
    /// 否则返回 ConcurrencyConflict 而不是静默覆盖。相同内容的重复
    /// upsert 只递增使用计数和版本号，不会增加条目数量。
    pub async fn upsert(
        &self,
        pattern: TemplatePattern,
        document_type: &str,
        compliance_tags: Vec<String>,
        expected_version: Option<u64>,
    ) -> DocgenResult<KnowledgeEntry> {
        let mut entries = self.entries.write().await;
        let expected = expected_version.unwrap_or(0);

        match entries.get_mut(&pattern.pattern_id) {
            Some(existing) => {
                if expected != existing.version {
                    return Err(DocgenError::ConcurrencyConflict {
                        key: pattern.pattern_id.clone(),
                        expected,
                        actual: existing.version,
                    });
                }
                existing.usage_count += 1;
                existing.version += 1;
                existing.updated_at = Utc::now();
                if !document_type.is_empty() {
                    existing.document_type = document_type.to_string();
                }
                for tag in compliance_tags {
                    if !existing.compliance_tags.contains(&tag) {
                        existing.compliance_tags.push(tag);
                    }
                }
                existing.pattern = pattern;
                debug!(
                    "知识条目更新: {} -> v{}",
                    existing.pattern_id, existing.version
                );
                Ok(existing.clone())
            }
            None => {
                if expected != 0 {
                    return Err(DocgenError::ConcurrencyConflict {
                        key: pattern.pattern_id.clone(),
                        expected,
                        actual: 0,
                    });
                }
                let entry = KnowledgeEntry {
                    pattern_id: pattern.pattern_id.clone(),
                    document_type: document_type.to_string(),
                    compliance_tags,
                    usage_count: 1,
                    version: 1,
                    updated_at: Utc::now(),
                    pattern,
                };
                debug!("知识条目新建: {}", entry.pattern_id);
                entries.insert(entry.pattern_id.clone(), entry.clone());
                Ok(entry)
            }
        }
    }

    /// 带重试的 upsert：冲突时重新读取当前版本后重试，
    /// 超过配置的重试上限才向调用方暴露冲突错误。
    pub async fn upsert_with_retry(
        &self,
        pattern: TemplatePattern,
        document_type: &str,
        compliance_tags: Vec<String>,
    ) -> DocgenResult<KnowledgeEntry> {
        let mut last_err = None;
        for attempt in 0..=self.config.upsert_retry_limit {
            let observed = self.current_version(&pattern.pattern_id).await;
            match self
                .upsert(
                    pattern.clone(),
                    document_type,
                    compliance_tags.clone(),
                    observed,
                )
                .await
            {
                Ok(entry) => return Ok(entry),
                Err(err @ DocgenError::ConcurrencyConflict { .. }) => {
                    debug!(
                        "知识库写入冲突，第{}次重试: {}",
                        attempt + 1,
                        pattern.pattern_id
                    );
                    last_err = Some(err);
                }
                Err(other) => return Err(other),
            }
        }
        Err(last_err
            .unwrap_or_else(|| DocgenError::Internal("upsert重试后无错误记录".to_string())))
    }

    /// 按文档类型与上下文过滤器查询，返回按加权分数排序的条目
    ///
    /// 分数 = w1·特征重合度 + w2·时效性 + w3·使用频率；
    /// 同分时按 pattern_id 字典序升序，保证结果确定。
    pub async fn query(&self, query: &KnowledgeQuery) -> Vec<KnowledgeEntry> {
        let now = Utc::now();
        let entries = self.entries.read().await;

        let mut matched: Vec<(f64, &KnowledgeEntry)> = entries
            .values()
            .filter(|e| query.document_type.is_empty() || e.document_type == query.document_type)
            .map(|e| (self.score(e, &query.context_filters, now), e))
            .collect();

        matched.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.1.pattern_id.cmp(&b.1.pattern_id))
        });

        let limit = query.limit.unwrap_or(usize::MAX);
        matched
            .into_iter()
            .take(limit)
            .map(|(_, e)| e.clone())
            .collect()
    }

    fn score(&self, entry: &KnowledgeEntry, filters: &[String], now: DateTime<Utc>) -> f64 {
        let overlap = if filters.is_empty() {
            0.0
        } else {
            let features = Self::entry_features(entry);
            let hits = filters.iter().filter(|f| features.contains(*f)).count();
            hits as f64 / filters.len() as f64
        };

        let age_days = (now - entry.updated_at).num_seconds().max(0) as f64 / 86_400.0;
        let recency = 1.0 / (1.0 + age_days);

        let usage = (entry.usage_count as f64).ln_1p();

        self.config.weight_overlap * overlap
            + self.config.weight_recency * recency
            + self.config.weight_usage * usage
    }

    /// 条目参与重合度计算的特征集合：合规标签 + 内容标志
    fn entry_features(entry: &KnowledgeEntry) -> Vec<String> {
        let mut features = entry.compliance_tags.clone();
        let flags = entry.pattern.flags;
        if flags.has_logo {
            features.push("has_logo".to_string());
        }
        if flags.has_tables {
            features.push("has_tables".to_string());
        }
        if flags.multipage {
            features.push("multipage".to_string());
        }
        if flags.has_forms {
            features.push("has_forms".to_string());
        }
        features
    }

    /// 按需求特征与复杂度给出模式推荐
    pub async fn suggestions(
        &self,
        document_type: &str,
        features: &[String],
        complexity: &str,
    ) -> Vec<PatternSuggestion> {
        let entries = self.entries.read().await;
        let mut suggestions: Vec<PatternSuggestion> = entries
            .values()
            .map(|entry| {
                let mut score = 0.0;
                let mut reasons = Vec::new();

                if entry.document_type == document_type {
                    score += 30.0;
                    reasons.push("文档类型匹配".to_string());
                }

                let entry_features = Self::entry_features(entry);
                for feature in features {
                    if entry_features.contains(feature) {
                        score += 15.0;
                        reasons.push(format!("特征匹配: {feature}"));
                    }
                }

                let slot_count = entry.pattern.content_slot_count();
                let complexity_match = match complexity {
                    "complex" => slot_count > 8,
                    "simple" => slot_count <= 8,
                    _ => true,
                };
                if complexity_match {
                    score += 10.0;
                    reasons.push(format!("复杂度匹配: {complexity}"));
                }

                PatternSuggestion {
                    pattern_id: entry.pattern_id.clone(),
                    document_type: entry.document_type.clone(),
                    score,
                    reasons,
                }
            })
            .filter(|s| s.score > 0.0)
            .collect();

        suggestions.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.pattern_id.cmp(&b.pattern_id))
        });
        suggestions
    }

    pub async fn stats(&self) -> KnowledgeStats {
        let entries = self.entries.read().await;
        KnowledgeStats {
            entries: entries.len(),
            total_usage: entries.values().map(|e| e.usage_count).sum(),
            last_update: entries.values().map(|e| e.updated_at).max(),
        }
    }

    /// 全量刷盘
    ///
    /// 条目按 pattern_id 排序后写入临时文件再原子重命名，磁盘上
    /// 始终是完整一致的文档。
    pub async fn flush(&self) -> DocgenResult<()> {
        let snapshot = {
            let entries = self.entries.read().await;
            let mut list: Vec<KnowledgeEntry> = entries.values().cloned().collect();
            list.sort_by(|a, b| a.pattern_id.cmp(&b.pattern_id));
            KnowledgeBaseFile::new(list)
        };

        let json = serde_json::to_vec_pretty(&snapshot)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(
            "知识库刷盘完成: {} 个条目 -> {}",
            snapshot.entries.len(),
            self.path.display()
        );
        Ok(())
    }

    /// 启动后台定期刷盘任务；间隔为0时禁用
    pub fn spawn_flush_task(self: &Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        if self.config.flush_interval_seconds == 0 {
            return None;
        }
        let store = Arc::clone(self);
        Some(tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(store.config.flush_interval_seconds));
            interval.tick().await;
            loop {
                interval.tick().await;
                if let Err(e) = store.flush().await {
                    warn!("知识库后台刷盘失败: {e}");
                }
            }
        }))
    }
}

#[async_trait]
impl HealthProbe for KnowledgeStore {
    fn component(&self) -> &str {
        "knowledge_store"
    }

    async fn health(&self) -> AgentHealth {
        // 持久化目录不可达时知识库视为不可用
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => AgentHealth::Healthy,
            Ok(_) => AgentHealth::Unavailable,
            // 目录还不存在但可以创建时视为降级而非不可用
            Err(_) => match tokio::fs::create_dir_all(&dir).await {
                Ok(()) => AgentHealth::Degraded,
                Err(_) => AgentHealth::Unavailable,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use docgen_domain::ContentFlags;

    use super::*;

    fn test_config(path: &str) -> KnowledgeConfig {
        KnowledgeConfig {
            store_path: path.to_string(),
            flush_interval_seconds: 0,
            upsert_retry_limit: 3,
            weight_overlap: 0.5,
            weight_recency: 0.3,
            weight_usage: 0.2,
        }
    }

    fn pattern(id: &str, flags: ContentFlags) -> TemplatePattern {
        TemplatePattern {
            pattern_id: id.to_string(),
            name: format!("{id}_template"),
            slots: vec![],
            source_hash: id.to_string(),
            page_count: 1,
            flags,
        }
    }

    async fn memory_store(dir: &tempfile::TempDir) -> Arc<KnowledgeStore> {
        let path = dir.path().join("kb.json");
        KnowledgeStore::open(test_config(path.to_str().unwrap()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_upsert_deduplicates_by_pattern_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = memory_store(&dir).await;

        let first = store
            .upsert(pattern("hash-a", ContentFlags::default()), "resolution", vec![], None)
            .await
            .unwrap();
        assert_eq!(first.version, 1);
        assert_eq!(first.usage_count, 1);

        let second = store
            .upsert(
                pattern("hash-a", ContentFlags::default()),
                "resolution",
                vec![],
                Some(1),
            )
            .await
            .unwrap();
        assert_eq!(second.version, 2);
        assert_eq!(second.usage_count, 2);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_stale_write_yields_concurrency_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let store = memory_store(&dir).await;

        store
            .upsert(pattern("hash-a", ContentFlags::default()), "resolution", vec![], None)
            .await
            .unwrap();

        // 使用过期版本写入
        let err = store
            .upsert(
                pattern("hash-a", ContentFlags::default()),
                "resolution",
                vec![],
                Some(0),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DocgenError::ConcurrencyConflict {
                expected: 0,
                actual: 1,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_upsert_with_retry_merges_concurrent_writes() {
        let dir = tempfile::tempdir().unwrap();
        let store = memory_store(&dir).await;

        // 两个并发任务写入相同内容哈希
        let (a, b) = tokio::join!(
            store.upsert_with_retry(
                pattern("hash-race", ContentFlags::default()),
                "resolution",
                vec![]
            ),
            store.upsert_with_retry(
                pattern("hash-race", ContentFlags::default()),
                "resolution",
                vec![]
            ),
        );
        a.unwrap();
        b.unwrap();

        assert_eq!(store.len().await, 1);
        let entry = store.get("hash-race").await.unwrap();
        assert_eq!(entry.usage_count, 2);
        assert_eq!(entry.version, 2);
    }

    #[tokio::test]
    async fn test_query_ranks_by_feature_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let store = memory_store(&dir).await;

        let logo_flags = ContentFlags {
            has_logo: true,
            has_tables: true,
            ..Default::default()
        };
        store
            .upsert(pattern("hash-logo", logo_flags), "resolution", vec![], None)
            .await
            .unwrap();
        store
            .upsert(
                pattern("hash-plain", ContentFlags::default()),
                "resolution",
                vec![],
                None,
            )
            .await
            .unwrap();

        let results = store
            .query(&KnowledgeQuery {
                document_type: "resolution".to_string(),
                context_filters: vec!["has_logo".to_string(), "has_tables".to_string()],
                limit: None,
            })
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].pattern_id, "hash-logo");
    }

    #[tokio::test]
    async fn test_query_tie_break_is_lexicographic() {
        let dir = tempfile::tempdir().unwrap();
        let store = memory_store(&dir).await;

        store
            .upsert(pattern("hash-b", ContentFlags::default()), "t", vec![], None)
            .await
            .unwrap();
        store
            .upsert(pattern("hash-a", ContentFlags::default()), "t", vec![], None)
            .await
            .unwrap();

        // 无过滤特征、同等使用量：得分仅差毫秒级时效，按id升序稳定
        let results = store
            .query(&KnowledgeQuery {
                document_type: "t".to_string(),
                context_filters: vec![],
                limit: None,
            })
            .await;
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.json");
        let config = test_config(path.to_str().unwrap());

        {
            let store = KnowledgeStore::open(config.clone()).await.unwrap();
            store
                .upsert(
                    pattern("hash-persist", ContentFlags { has_logo: true, ..Default::default() }),
                    "resolution",
                    vec!["corporations_act".to_string()],
                    None,
                )
                .await
                .unwrap();
            store.flush().await.unwrap();
        }

        let reloaded = KnowledgeStore::open(config).await.unwrap();
        assert_eq!(reloaded.len().await, 1);
        let entry = reloaded.get("hash-persist").await.unwrap();
        assert_eq!(entry.document_type, "resolution");
        assert_eq!(entry.compliance_tags, vec!["corporations_act".to_string()]);
        assert_eq!(entry.usage_count, 1);
        assert_eq!(entry.version, 1);
        assert!(entry.pattern.flags.has_logo);
    }

    #[tokio::test]
    async fn test_suggestions_scoring() {
        let dir = tempfile::tempdir().unwrap();
        let store = memory_store(&dir).await;

        store
            .upsert(
                pattern(
                    "hash-rich",
                    ContentFlags {
                        has_logo: true,
                        has_tables: true,
                        multipage: true,
                        has_forms: false,
                    },
                ),
                "liquidation_resolution",
                vec![],
                None,
            )
            .await
            .unwrap();

        let suggestions = store
            .suggestions(
                "liquidation_resolution",
                &["has_logo".to_string(), "has_tables".to_string()],
                "simple",
            )
            .await;

        assert_eq!(suggestions.len(), 1);
        // 类型30 + 两个特征各15 + 复杂度10
        assert!((suggestions[0].score - 70.0).abs() < f64::EPSILON);
        assert!(!suggestions[0].reasons.is_empty());
    }
}

use thiserror::Error;

/// 文档生成系统错误类型定义
#[derive(Debug, Error)]
pub enum DocgenError {
    #[error("无法路由的任务类型: {task_type}")]
    UnroutableTask { task_type: String },

    #[error("所有内容生成服务均不可用: [{}]", .attempted.join(", "))]
    ProviderUnavailable { attempted: Vec<String> },

    #[error("文档 {document} 部分页面解析失败: {pages:?}")]
    PartialAnalysisFailure { document: String, pages: Vec<u32> },

    #[error("任务输入校验失败: {0}")]
    ValidationError(String),

    #[error("知识库写入版本冲突: key={key}, 期望版本={expected}, 实际版本={actual}")]
    ConcurrencyConflict {
        key: String,
        expected: u64,
        actual: u64,
    },

    #[error("内容生成服务触发限流: {provider}")]
    RateLimited { provider: String },

    #[error("内容生成服务认证失败: {provider}")]
    AuthRejected { provider: String },

    #[error("任务执行超时")]
    ExecutionTimeout,

    #[error("任务执行错误: {0}")]
    TaskExecution(String),

    #[error("文档解析错误: {0}")]
    DocumentParse(String),

    #[error("文档渲染错误: {0}")]
    Render(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("网络错误: {0}")]
    Network(String),

    #[error("内部错误: {0}")]
    Internal(String),

    #[error("无效的任务参数: {0}")]
    InvalidTaskParams(String),
}

impl From<serde_json::Error> for DocgenError {
    fn from(err: serde_json::Error) -> Self {
        DocgenError::Serialization(err.to_string())
    }
}

impl DocgenError {
    /// 判断错误是否可以通过重试恢复
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DocgenError::Network(_)
                | DocgenError::ExecutionTimeout
                | DocgenError::RateLimited { .. }
                | DocgenError::ConcurrencyConflict { .. }
        )
    }
}

/// 统一的Result类型
pub type Result<T> = std::result::Result<T, DocgenError>;

pub mod circuit_breaker;
pub mod config;
pub mod errors;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot, CircuitState};
pub use config::{
    AnalysisConfig, AppConfig, DispatcherConfig, GatewayConfig, GenerationConfig, KnowledgeConfig,
    ProviderConfig,
};
pub use errors::DocgenError;
pub use retry::BackoffPolicy;

/// 统一的Result类型
pub type DocgenResult<T> = std::result::Result<T, DocgenError>;

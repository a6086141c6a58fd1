use async_trait::async_trait;
use docgen_core::DocgenResult;

use crate::models::{GeneratedContent, GenerationRequest};

/// 单个内容生成后端的调用接口
///
/// 实现方不得在调用生命周期之外保留请求内容或凭据。失败必须
/// 以可区分的错误返回（限流/认证/超时/网络），供网关驱动熔断
/// 状态机。
#[async_trait]
pub trait ContentBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> DocgenResult<GeneratedContent>;
}

use async_trait::async_trait;
use tracing::debug;

use crate::core::error::Result;
use crate::core::model::{Decision, RequestDetails};
use crate::interfaces::RequestInterceptor;

/// 请求日志策略
///
/// 只记录，不表态。注册在安全策略之后时，被取消的请求不会出现在这里。
#[derive(Debug, Default)]
pub struct RequestLogger;

impl RequestLogger {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RequestInterceptor for RequestLogger {
    fn name(&self) -> &str {
        "request-logger"
    }

    async fn on_before_request(&self, details: &RequestDetails) -> Result<Decision> {
        debug!(
            id = details.id,
            method = %details.method,
            resource_type = %details.resource_type,
            initiator = details.initiator.as_deref().unwrap_or("-"),
            url = %details.url,
            "出站请求"
        );
        Ok(Decision::NoOpinion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::ResourceType;

    #[tokio::test]
    async fn logger_never_has_an_opinion() {
        let logger = RequestLogger::new();
        let details = RequestDetails::new(1, "chrome-extension://abc/inject.js")
            .with_resource_type(ResourceType::Script)
            .with_initiator("https://app.test");
        assert_eq!(
            logger.on_before_request(&details).await.unwrap(),
            Decision::NoOpinion
        );
        assert_eq!(logger.name(), "request-logger");
    }
}

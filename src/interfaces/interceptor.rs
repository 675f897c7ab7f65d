use std::fmt;
use std::future::Future;

use async_trait::async_trait;

use crate::core::error::Result;
use crate::core::model::{Decision, RequestDetails};

/// 请求拦截器接口
///
/// - 拦截器负责：针对只读的请求描述符给出判定（无意见 / 取消）。
/// - 拦截器不负责：修改请求、与其他拦截器协商。合并判定由管线完成。
#[async_trait]
pub trait RequestInterceptor: Send + Sync + fmt::Debug {
    /// 拦截器名称 (用于调试/日志)
    fn name(&self) -> &str;

    /// "请求发送前" 事件
    async fn on_before_request(&self, details: &RequestDetails) -> Result<Decision>;
}

/// 闭包拦截器适配器
///
/// 闭包拿到描述符的副本，因此同样无法影响其他拦截器看到的请求。
pub struct FnInterceptor<F> {
    name: String,
    handler: F,
}

impl<F> FnInterceptor<F> {
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }
}

impl<F> fmt::Debug for FnInterceptor<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnInterceptor").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F, Fut> RequestInterceptor for FnInterceptor<F>
where
    F: Fn(RequestDetails) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Decision>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_before_request(&self, details: &RequestDetails) -> Result<Decision> {
        (self.handler)(details.clone()).await
    }
}

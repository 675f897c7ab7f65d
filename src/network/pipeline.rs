//! 有序 Web 请求管线 (Ordered Web Request Pipeline)
//!
//! 宿主运行时对每个出站请求只调用一次派发；管线按注册顺序依次 await 每个拦截器，
//! 遇到第一个 `Cancel` 立即短路，后续拦截器不会看到该请求。
//!
//! 拦截器失败（返回错误、panic、超时）一律按“无意见”处理，并通过诊断通道带外上报，
//! 单个异常策略不会阻断无关流量。

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::core::config::PipelineConfig;
use crate::core::error::{GuardError, Result};
use crate::core::event::EventSender;
use crate::core::model::{Decision, RequestDetails};
use crate::interfaces::{FnInterceptor, RequestInterceptor};

/// 单个生命周期事件的有序订阅列表
#[derive(Debug, Default)]
pub struct OrderedEvent {
    listeners: RwLock<Vec<Arc<dyn RequestInterceptor>>>,
    handler_timeout: Option<Duration>,
    events: Option<EventSender>,
}

impl OrderedEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册拦截器。重复注册会导致重复执行，调用方需保证每个拦截器只注册一次。
    pub fn add_event_listener(&self, handler: Arc<dyn RequestInterceptor>) {
        debug!(handler = handler.name(), "注册拦截器");
        self.listeners.write().push(handler);
    }

    /// 以异步闭包注册拦截器
    pub fn add_fn<F, Fut>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(RequestDetails) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Decision>> + Send + 'static,
    {
        self.add_event_listener(Arc::new(FnInterceptor::new(name, handler)));
    }

    /// 移除该实例最早的一次注册，返回是否有注册被移除
    pub fn remove_event_listener(&self, handler: &Arc<dyn RequestInterceptor>) -> bool {
        let mut listeners = self.listeners.write();
        match listeners.iter().position(|h| Arc::ptr_eq(h, handler)) {
            Some(index) => {
                listeners.remove(index);
                debug!(handler = handler.name(), "移除拦截器");
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// 派发一次请求并返回合并后的判定
    pub async fn dispatch(&self, details: &RequestDetails) -> Decision {
        // 快照后释放锁，await 期间不持有
        let listeners: Vec<_> = self.listeners.read().clone();

        for handler in &listeners {
            match self.run_handler(handler.as_ref(), details).await {
                Ok(Decision::Cancel) => {
                    info!(
                        id = details.id,
                        handler = handler.name(),
                        url = %details.url,
                        "请求已拦截"
                    );
                    if let Some(events) = &self.events {
                        events.request_cancelled(details.id, &details.url, handler.name());
                    }
                    return Decision::Cancel;
                }
                Ok(Decision::NoOpinion) => {}
                Err(e) => {
                    warn!(
                        id = details.id,
                        handler = handler.name(),
                        error = %e,
                        "拦截器执行失败，按无意见处理"
                    );
                    if let Some(events) = &self.events {
                        events.handler_failed(details.id, &details.url, handler.name(), &e);
                    }
                }
            }
        }

        Decision::NoOpinion
    }

    async fn run_handler(
        &self,
        handler: &dyn RequestInterceptor,
        details: &RequestDetails,
    ) -> Result<Decision> {
        let guarded = AssertUnwindSafe(handler.on_before_request(details)).catch_unwind();

        let outcome = match self.handler_timeout {
            Some(after) => tokio::time::timeout(after, guarded)
                .await
                .map_err(|_| GuardError::Timeout {
                    handler: handler.name().to_string(),
                    after,
                })?,
            None => guarded.await,
        };

        outcome.unwrap_or_else(|payload| {
            Err(GuardError::Panicked {
                handler: handler.name().to_string(),
                message: panic_message(payload.as_ref()),
            })
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// 宿主运行时使用的请求拦截入口
///
/// 每个生命周期事件一个 [`OrderedEvent`]，目前只有“请求发送前”。
/// 管线不持有跨请求的可变状态，`Arc<OrderedWebRequest>` 可被并发派发。
#[derive(Debug, Default)]
pub struct OrderedWebRequest {
    pub on_before_request: OrderedEvent,
}

impl OrderedWebRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按配置构建（拦截器超时）
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new().with_handler_timeout(config.handler_timeout())
    }

    /// 设置诊断事件发送器
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.on_before_request.events = Some(events);
        self
    }

    /// 设置单个拦截器的判定超时，`None` 表示不限时
    pub fn with_handler_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.on_before_request.handler_timeout = timeout;
        self
    }

    /// "请求发送前" 派发
    pub async fn dispatch(&self, details: &RequestDetails) -> Decision {
        self.on_before_request.dispatch(details).await
    }
}

//! 诊断事件系统 (Diagnostics Channel)
//!
//! 管线与外部观察者之间的带外通信：拦截器故障、请求被取消等都通过这里上报，
//! 不会影响派发本身。

use flume::{Receiver, Sender};

/// 管线事件类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardEvent {
    /// 请求被某个拦截器取消
    RequestCancelled {
        request_id: u64,
        url: String,
        handler: String,
    },

    /// 拦截器执行失败（返回错误 / panic / 超时），已按“无意见”处理
    HandlerFailed {
        request_id: u64,
        url: String,
        handler: String,
        error: String,
    },
}

/// 事件发送器
#[derive(Clone, Debug)]
pub struct EventSender {
    tx: Sender<GuardEvent>,
}

impl EventSender {
    pub fn new(tx: Sender<GuardEvent>) -> Self {
        Self { tx }
    }

    /// 发送事件；接收端已关闭时静默丢弃
    pub fn emit(&self, event: GuardEvent) {
        let _ = self.tx.send(event);
    }

    pub fn request_cancelled(&self, request_id: u64, url: &str, handler: &str) {
        self.emit(GuardEvent::RequestCancelled {
            request_id,
            url: url.to_string(),
            handler: handler.to_string(),
        });
    }

    pub fn handler_failed(&self, request_id: u64, url: &str, handler: &str, error: impl ToString) {
        self.emit(GuardEvent::HandlerFailed {
            request_id,
            url: url.to_string(),
            handler: handler.to_string(),
            error: error.to_string(),
        });
    }
}

/// 事件接收器
pub struct EventReceiver {
    rx: Receiver<GuardEvent>,
}

impl EventReceiver {
    pub fn new(rx: Receiver<GuardEvent>) -> Self {
        Self { rx }
    }

    /// 非阻塞接收事件
    pub fn try_recv(&self) -> Option<GuardEvent> {
        self.rx.try_recv().ok()
    }

    /// 异步接收事件；所有发送端释放后返回 `None`
    pub async fn recv_async(&self) -> Option<GuardEvent> {
        self.rx.recv_async().await.ok()
    }

    /// 取出当前已缓冲的全部事件
    pub fn drain(&self) -> Vec<GuardEvent> {
        self.rx.try_iter().collect()
    }
}

/// 创建事件通道
pub fn create_event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = flume::unbounded();
    (EventSender::new(tx), EventReceiver::new(rx))
}

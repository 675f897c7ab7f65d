//! 批量派发器
//!
//! 将一批请求描述符并发送入管线。同一请求内拦截器严格串行，不同请求之间并发；
//! 输出顺序与输入顺序一致。收到退出信号后不再派发新的请求。

use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::config::DispatchConfig;
use crate::core::error::{GuardError, Result};
use crate::core::model::{Decision, RequestDetails};
use crate::network::pipeline::OrderedWebRequest;

/// 单个请求的派发结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub details: RequestDetails,
    pub decision: Decision,
}

/// 批量派发统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub cancelled: usize,
    pub allowed: usize,
    /// 是否因退出信号提前结束
    pub interrupted: bool,
}

pub struct BatchRunner {
    web_request: Arc<OrderedWebRequest>,
    concurrency: usize,
    shutdown: CancellationToken,
}

impl BatchRunner {
    pub fn new(web_request: Arc<OrderedWebRequest>, config: &DispatchConfig) -> Self {
        Self {
            web_request,
            concurrency: config.effective_concurrency(),
            shutdown: CancellationToken::new(),
        }
    }

    /// 使用外部的退出令牌
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// 派发全部请求，每得到一个结果（按输入顺序）回调一次
    pub async fn run<F>(&self, requests: Vec<RequestDetails>, mut on_outcome: F) -> BatchSummary
    where
        F: FnMut(&BatchOutcome),
    {
        let total = requests.len();
        debug!(total, concurrency = self.concurrency, "开始批量派发");

        let web_request = self.web_request.clone();
        let stream = futures::stream::iter(requests)
            .map(move |details| {
                let web_request = web_request.clone();
                async move {
                    let decision = web_request.dispatch(&details).await;
                    BatchOutcome { details, decision }
                }
            })
            .buffered(self.concurrency)
            .take_until(self.shutdown.cancelled());
        let mut stream = std::pin::pin!(stream);

        let mut summary = BatchSummary {
            total,
            ..Default::default()
        };

        while let Some(outcome) = stream.next().await {
            match outcome.decision {
                Decision::Cancel => summary.cancelled += 1,
                Decision::NoOpinion => summary.allowed += 1,
            }
            on_outcome(&outcome);
        }

        summary.interrupted = summary.cancelled + summary.allowed < total;
        if summary.interrupted {
            warn!(
                processed = summary.cancelled + summary.allowed,
                total, "收到退出信号，批量派发提前结束"
            );
        } else {
            info!(
                total,
                cancelled = summary.cancelled,
                allowed = summary.allowed,
                "批量派发完成"
            );
        }
        summary
    }
}

/// 解析 JSON Lines 格式的请求描述符
///
/// 空行忽略；未携带 `id` 的请求使用行号。解析失败的行以 `(行号, 错误)` 返回，不中断整体解析。
pub fn parse_requests(content: &str) -> (Vec<RequestDetails>, Vec<(usize, GuardError)>) {
    let mut requests = Vec::new();
    let mut errors = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let line_no = index + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_line(line) {
            Ok(mut details) => {
                if details.id == 0 {
                    details.id = line_no as u64;
                }
                requests.push(details);
            }
            Err(e) => errors.push((line_no, e)),
        }
    }

    (requests, errors)
}

fn parse_line(line: &str) -> Result<RequestDetails> {
    let details: RequestDetails = serde_json::from_str(line)?;
    if details.url.is_empty() {
        return Err(GuardError::InvalidRequest("empty url".into()));
    }
    Ok(details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::policies::install_extension_blocking_filter;

    fn runner(concurrency: usize) -> BatchRunner {
        let web_request = OrderedWebRequest::new();
        install_extension_blocking_filter(&web_request);
        BatchRunner::new(
            Arc::new(web_request),
            &DispatchConfig::builder().concurrency(concurrency).build(),
        )
    }

    #[tokio::test]
    async fn outcomes_follow_input_order() {
        let urls = [
            "chrome-extension://abc/inject.js",
            "http://localhost:3000/vendor.bundle.js",
            "https://evil.example.com/vendor.bundle.js",
            "https://evil.example.com/vendor.bundle.js?x=1",
            "http://[::1]:8080/content.bundle.js",
        ];
        let requests = urls
            .iter()
            .enumerate()
            .map(|(i, url)| RequestDetails::new(i as u64 + 1, *url))
            .collect();

        let mut seen = Vec::new();
        let summary = runner(4)
            .run(requests, |outcome| {
                seen.push((outcome.details.id, outcome.decision))
            })
            .await;

        assert_eq!(
            seen,
            vec![
                (1, Decision::Cancel),
                (2, Decision::NoOpinion),
                (3, Decision::Cancel),
                (4, Decision::NoOpinion),
                (5, Decision::NoOpinion),
            ]
        );
        assert_eq!(
            summary,
            BatchSummary {
                total: 5,
                cancelled: 2,
                allowed: 3,
                interrupted: false,
            }
        );
    }

    #[tokio::test]
    async fn zero_concurrency_still_dispatches() {
        let summary = runner(0)
            .run(vec![RequestDetails::new(1, "https://example.com/")], |_| {})
            .await;
        assert_eq!(summary.allowed, 1);
    }

    #[tokio::test]
    async fn cancelled_shutdown_stops_dispatch() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let runner = runner(2).with_shutdown(shutdown);

        let requests = (1..=10)
            .map(|id| RequestDetails::new(id, "https://example.com/"))
            .collect();
        let summary = runner.run(requests, |_| {}).await;

        assert!(summary.interrupted);
        assert_eq!(summary.cancelled + summary.allowed, 0);
        assert_eq!(summary.total, 10);
    }

    #[test]
    fn parse_requests_skips_blank_and_reports_bad_lines() {
        let content = r#"
{"url":"chrome-extension://abc/inject.js","resourceType":"script"}
not json
{"id":77,"url":"https://example.com/","method":"POST"}
{"url":""}
"#;
        let (requests, errors) = parse_requests(content);

        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].id, 2);
        assert_eq!(requests[0].resource_type, crate::core::model::ResourceType::Script);
        assert_eq!(requests[1].id, 77);
        assert_eq!(requests[1].method, "POST");

        let lines: Vec<usize> = errors.iter().map(|(line, _)| *line).collect();
        assert_eq!(lines, vec![3, 5]);
        assert!(matches!(errors[0].1, GuardError::Serialization(_)));
        assert!(matches!(errors[1].1, GuardError::InvalidRequest(_)));
    }
}

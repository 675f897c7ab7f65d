//! 浏览器扩展拦截策略
//!
//! 浏览器扩展（密码管理器等）会尝试向内嵌渲染进程注入 content script，
//! 导致页面初始化失败。该策略拦截扩展协议请求以及来自外部来源的扩展 bundle，
//! 同时放行本地开发流量（file:// 与回环地址）。
//!
//! 判定顺序固定：扩展协议 -> 本地放行 -> bundle 文件名。本地判定先于文件名判定，
//! 本地提供的同名文件永远不会被拦截。

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use async_trait::async_trait;
use url::{Host, Url};

use crate::core::error::Result;
use crate::core::model::{Decision, RequestDetails};
use crate::interfaces::RequestInterceptor;
use crate::network::pipeline::OrderedWebRequest;

/// 扩展协议前缀（Chromium / Firefox）
pub const EXTENSION_SCHEMES: [&str; 2] = ["chrome-extension://", "moz-extension://"];

/// 扩展 content script 常用的 bundle 文件名
pub const BLOCKED_BUNDLES: [&str; 2] = ["content.bundle.js", "vendor.bundle.js"];

const FILE_SCHEME: &str = "file://";
const NETWORK_SCHEMES: [&str; 2] = ["http://", "https://"];
const LOOPBACK_NAME: &str = "localhost";

/// 浏览器扩展拦截策略
#[derive(Debug, Default)]
pub struct ExtensionBlockingPolicy;

impl ExtensionBlockingPolicy {
    pub fn new() -> Self {
        Self
    }

    /// 纯函数判定：同一地址总是得到同一结果
    pub fn evaluate(&self, url: &str) -> Decision {
        if is_extension_protocol(url) {
            return Decision::Cancel;
        }

        if is_local(url) {
            return Decision::NoOpinion;
        }

        if is_network(url) && is_extension_bundle(url) {
            return Decision::Cancel;
        }

        Decision::NoOpinion
    }
}

#[async_trait]
impl RequestInterceptor for ExtensionBlockingPolicy {
    fn name(&self) -> &str {
        "extension-blocking"
    }

    async fn on_before_request(&self, details: &RequestDetails) -> Result<Decision> {
        Ok(self.evaluate(&details.url))
    }
}

/// 向管线注册扩展拦截策略（启动时调用一次）
pub fn install_extension_blocking_filter(web_request: &OrderedWebRequest) {
    web_request
        .on_before_request
        .add_event_listener(Arc::new(ExtensionBlockingPolicy::new()));
}

fn starts_with_ignore_case(url: &str, prefix: &str) -> bool {
    url.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

pub fn is_extension_protocol(url: &str) -> bool {
    EXTENSION_SCHEMES
        .iter()
        .any(|scheme| starts_with_ignore_case(url, scheme))
}

fn is_network(url: &str) -> bool {
    NETWORK_SCHEMES
        .iter()
        .any(|scheme| starts_with_ignore_case(url, scheme))
}

/// file:// 或主机为回环地址的 http(s) 地址
///
/// 主机按解析结果精确比较，`localhost.evil.com` 与 `localhost@evil.com` 都不算本地。
pub fn is_local(url: &str) -> bool {
    if starts_with_ignore_case(url, FILE_SCHEME) {
        return true;
    }
    if !is_network(url) {
        return false;
    }

    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    match parsed.host() {
        Some(Host::Domain(name)) => name.eq_ignore_ascii_case(LOOPBACK_NAME),
        Some(Host::Ipv4(addr)) => addr == Ipv4Addr::LOCALHOST,
        Some(Host::Ipv6(addr)) => addr == Ipv6Addr::LOCALHOST,
        None => false,
    }
}

/// 最后一个路径段与 bundle 文件名完全相同，且地址以该文件名结尾
///
/// 带查询串或片段的地址不满足后缀匹配；`vendor.bundle.js.map`、`myvendor.bundle.js`
/// 之类的地址也不会命中。
pub fn is_extension_bundle(url: &str) -> bool {
    let Some(bundle) = BLOCKED_BUNDLES.iter().find(|name| url.ends_with(*name)) else {
        return false;
    };
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .is_some_and(|last| last == *bundle)
}

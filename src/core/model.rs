//! 核心数据模型
//!
//! 请求描述符与拦截判定。描述符在拦截期间只读，拦截器只产出判定。

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// 资源类型，名称与浏览器运行时的 webRequest 保持一致
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ResourceType {
    MainFrame,
    SubFrame,
    Stylesheet,
    Script,
    Image,
    Font,
    Object,
    Xhr,
    Ping,
    CspReport,
    Media,
    WebSocket,
    #[default]
    #[serde(other)]
    Other,
}

impl ResourceType {
    /// 宽松解析：无法识别的名称归入 `Other`
    pub fn parse_lossy(s: &str) -> Self {
        s.parse().unwrap_or(ResourceType::Other)
    }
}

/// 单个出站请求的描述符 (Request Descriptor)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDetails {
    #[serde(default)]
    pub id: u64,
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub resource_type: ResourceType,
    /// 发起请求的上下文（页面 origin 等）
    #[serde(default)]
    pub initiator: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl RequestDetails {
    pub fn new(id: u64, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            method: default_method(),
            resource_type: ResourceType::Other,
            initiator: None,
        }
    }

    pub fn with_resource_type(mut self, resource_type: ResourceType) -> Self {
        self.resource_type = resource_type;
        self
    }

    pub fn with_initiator(mut self, initiator: impl Into<String>) -> Self {
        self.initiator = Some(initiator.into());
        self
    }
}

/// 拦截判定
///
/// `NoOpinion` 即空判定（放行，交给下一个拦截器）；`Cancel` 在发送前中止请求。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Decision {
    #[default]
    NoOpinion,
    Cancel,
}

impl Decision {
    pub fn is_cancel(self) -> bool {
        matches!(self, Decision::Cancel)
    }
}

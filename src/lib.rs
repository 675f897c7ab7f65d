//! # webguard — 有序 Web 请求拦截管线
//!
//! 为内嵌浏览器运行时提供“请求发送前”拦截：按注册顺序串行执行异步拦截器，
//! 第一个取消判定即短路，拦截器故障不会影响其他流量。
//!
//! ## 模块
//!
//! - [`core`] : 配置、错误、诊断事件与数据模型
//! - [`interfaces`] : 拦截器接口 (`RequestInterceptor`) 与闭包适配器
//! - [`network`] : 管线 (`OrderedWebRequest`) 及内置策略（扩展拦截、请求日志）
//! - [`engine`] : 批量派发（CLI 重放使用）

pub mod core;
pub mod engine;
pub mod interfaces;
pub mod network;

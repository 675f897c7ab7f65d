pub mod interceptor;

pub use interceptor::{FnInterceptor, RequestInterceptor};

pub mod extension;
pub mod logger;

pub use extension::{ExtensionBlockingPolicy, install_extension_blocking_filter};
pub use logger::RequestLogger;

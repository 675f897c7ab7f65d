pub mod pipeline;
pub mod policies;

pub use pipeline::{OrderedEvent, OrderedWebRequest};

pub mod batch;

pub use batch::{BatchOutcome, BatchRunner, BatchSummary, parse_requests};

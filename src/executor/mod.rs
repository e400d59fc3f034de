mod preprocess;
mod request;
mod resolve;

pub use preprocess::preprocess;
pub use request::{execute, CapturedResponse, Exchange};
pub use resolve::resolve_url;

mod model;
mod reader;

pub use model::{Action, Expect, Method, Spec, VarEntry, Variables, LOCATION_SENTINEL};
pub use reader::parse_spec;

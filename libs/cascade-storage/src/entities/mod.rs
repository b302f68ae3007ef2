pub mod prelude;

pub mod function_edges;
pub mod functions;

pub use super::function_edges::Entity as FunctionEdges;
pub use super::functions::Entity as Functions;

mod edges;
mod entities;
mod functions;
mod graph;
mod runner;

use super::*;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

pub use edges::MemoryEdgeStorage;
pub use entities::MemoryEntityStorage;
pub use functions::MemoryFunctionStorage;
pub use graph::MemoryStorage;
pub use runner::ClosureScriptRunner;

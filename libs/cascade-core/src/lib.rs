mod cascade;
mod config;
mod extractor;
mod graph;
mod memory;
mod types;

pub use cascade::{CascadeExecutor, CascadeReport, ChangeSet, FunctionRun, FunctionState};
pub use config::CascadeConfig;
pub use extractor::{
    extract_blockly_references, extract_function_references, extract_references,
    extract_script_references, AttributeRead, FunctionReferences,
};
pub use graph::{order_functions, FunctionGraph, GraphBuilder, SyncedFunction};
pub use memory::{
    ClosureScriptRunner, MemoryEdgeStorage, MemoryEntityStorage, MemoryFunctionStorage,
    MemoryStorage,
};
pub use tokio_util::sync::CancellationToken;
pub use types::*;

use cascade_logger::{debug, error, info, trace, warn};

mod entities;
mod rate_limiter;
mod storage;
mod types;

use async_trait::async_trait;
use cascade_core::{
    AttributeRef, CascadeError, DependencyEdge, EdgeStorage, ErrorReport, Function,
    FunctionStorage, GraphStorage, Removal, ResourceKind, ResourceReference,
};
use cascade_logger::{debug, error, info, trace};
use chrono::Utc;
use path_ext::PathExt;
use rate_limiter::{get_bucket, is_sqlite, Bucket};
use sea_orm::{prelude::*, ConnectionTrait, Database, TransactionTrait};
use std::{future::Future, path::PathBuf, sync::Arc};

pub use storage::{CascadeStorage, EdgeDBStorage, FunctionDBStorage};
pub use types::{CascadeStorageError, CascadeStorageResult};

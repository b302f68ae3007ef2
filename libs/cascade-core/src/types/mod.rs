mod edge;
mod error;
mod function;
mod reference;
mod rule;
mod script;
mod storage;

use super::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub use edge::DependencyEdge;
pub use error::{CascadeError, CascadeResult};
pub use function::{ErrorReport, Function};
pub use reference::{AttributeRef, KnownResources, ResourceKind, ResourceReference};
pub use rule::{
    AutoLinkRule, BlocklyRule, BlocklySource, CronRule, CronUnit, Rule, RuleEvent, RuleKind,
    RuleTiming, ZapierRule,
};
pub use script::{ScriptBindings, ScriptInput, ScriptOutcome, ScriptRunner, ScriptWrite};
pub use storage::{EdgeStorage, EntityStorage, FunctionStorage, GraphStorage, Removal};

use super::*;
use futures::future::{BoxFuture, FutureExt};
use std::{future::Future, time::Duration};

type RunFn = dyn Fn(String, ScriptBindings) -> BoxFuture<'static, CascadeResult<ScriptOutcome>>
    + Send
    + Sync;

/// Runs scripts through an async closure instead of an interpreter.
pub struct ClosureScriptRunner {
    run: Box<RunFn>,
}

impl ClosureScriptRunner {
    pub fn new<F, Fut>(run: F) -> Self
    where
        F: Fn(String, ScriptBindings) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CascadeResult<ScriptOutcome>> + Send + 'static,
    {
        Self {
            run: Box::new(move |script, bindings| run(script, bindings).boxed()),
        }
    }
}

#[async_trait]
impl ScriptRunner for ClosureScriptRunner {
    async fn run(
        &self,
        script: &str,
        bindings: ScriptBindings,
        _timeout: Duration,
    ) -> CascadeResult<ScriptOutcome> {
        (self.run)(script.to_owned(), bindings).await
    }
}

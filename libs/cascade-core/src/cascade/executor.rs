use super::{mapping, *};
use crate::graph::{FunctionGraph, GraphBuilder};
use chrono::Utc;
use std::{collections::HashMap, sync::Arc};
use tokio_util::sync::CancellationToken;

/// Result of one function run for one entity.
struct Execution {
    run: FunctionRun,
    changed: Vec<(AttributeRef, String)>,
    created: Vec<(ResourceReference, String)>,
}

impl Execution {
    fn new(run: FunctionRun) -> Self {
        Self {
            run,
            changed: vec![],
            created: vec![],
        }
    }
}

/// Work left in the current pass, keyed by function.
type Pending = BTreeMap<AttributeRef, BTreeSet<String>>;

/// Drives cascades of function runs triggered by entity writes.
pub struct CascadeExecutor {
    builder: GraphBuilder,
    storage: Arc<dyn GraphStorage>,
    entities: Arc<dyn EntityStorage>,
    runner: Arc<dyn ScriptRunner>,
    config: CascadeConfig,
}

impl CascadeExecutor {
    pub fn new(
        storage: Arc<dyn GraphStorage>,
        entities: Arc<dyn EntityStorage>,
        runner: Arc<dyn ScriptRunner>,
        config: CascadeConfig,
    ) -> Self {
        Self {
            builder: GraphBuilder::new(storage.clone()),
            storage,
            entities,
            runner,
            config,
        }
    }

    pub fn builder(&self) -> &GraphBuilder {
        &self.builder
    }

    pub fn config(&self) -> &CascadeConfig {
        &self.config
    }

    /// Computes every function of `resource` for a freshly created entity.
    pub async fn on_entity_created(
        &self,
        resource: &ResourceReference,
        entity_id: &str,
    ) -> CascadeResult<CascadeReport> {
        let mut changes = ChangeSet::new();
        for function in self.builder.resource_functions(resource).await? {
            changes.insert_function(function, entity_id);
        }
        self.execute(changes, &CancellationToken::new()).await
    }

    pub async fn on_value_changed(&self, changes: ChangeSet) -> CascadeResult<CascadeReport> {
        self.execute(changes, &CancellationToken::new()).await
    }

    /// Recomputes `target` for every entity of its resource.
    pub async fn on_function_changed(&self, target: &AttributeRef) -> CascadeResult<CascadeReport> {
        let mut changes = ChangeSet::new();
        for entity_id in self.entities.list_entities(&target.resource()).await? {
            changes.insert_function(target.clone(), entity_id);
        }
        self.execute(changes, &CancellationToken::new()).await
    }

    /// Runs passes until nothing changes, the pass bound is hit or `cancel` fires.
    pub async fn execute(
        &self,
        changes: ChangeSet,
        cancel: &CancellationToken,
    ) -> CascadeResult<CascadeReport> {
        let mut report = CascadeReport::default();
        let mut changes = changes;

        while !changes.is_empty() {
            let (graph, pending) = match self.prepare(&changes).await {
                Ok(prepared) => prepared,
                Err(e) if report.passes == 0 => return Err(e),
                Err(e) => {
                    error!("cascade stopped after pass {}: {}", report.passes, e);
                    break;
                }
            };
            if pending.is_empty() {
                break;
            }
            if report.passes >= self.config.max_passes {
                self.fail_too_deep(&graph, pending, &mut report).await;
                break;
            }

            report.passes += 1;
            debug!(
                "cascade pass {}: {} functions in graph, {} scheduled",
                report.passes,
                graph.len(),
                pending.len()
            );
            changes = self.run_pass(&graph, pending, cancel, &mut report).await;
            if report.cancelled {
                break;
            }
        }

        info!(
            "cascade finished: {} passes, {} applied, {} failed{}{}",
            report.passes,
            report.count(FunctionState::Applied),
            report.count(FunctionState::Failed),
            if report.cancelled { ", cancelled" } else { "" },
            if report.depth_exceeded { ", too deep" } else { "" },
        );
        Ok(report)
    }

    /// Loads the pass graph once and maps the changes onto function entities.
    async fn prepare(&self, changes: &ChangeSet) -> CascadeResult<(FunctionGraph, Pending)> {
        let graph = self
            .builder
            .affected_graph(&changes.attributes(), &changes.seeds())
            .await?;

        let mut pending = Pending::new();
        for (function, entities) in &changes.functions {
            if graph.contains(function) {
                pending
                    .entry(function.clone())
                    .or_default()
                    .extend(entities.iter().cloned());
            }
        }
        for (attribute, entities) in &changes.values {
            for row in graph.readers(attribute) {
                let targets = mapping::dependents(self.entities.as_ref(), row, entities).await?;
                if !targets.is_empty() {
                    pending.entry(row.function.clone()).or_default().extend(targets);
                }
            }
        }

        Ok((graph, pending))
    }

    async fn run_pass(
        &self,
        graph: &FunctionGraph,
        mut pending: Pending,
        cancel: &CancellationToken,
        report: &mut CascadeReport,
    ) -> ChangeSet {
        let pass = report.passes;
        let order = graph.order();
        let position: HashMap<&AttributeRef, usize> =
            order.iter().enumerate().map(|(index, f)| (f, index)).collect();
        let mut next = ChangeSet::new();

        for (index, function) in order.iter().enumerate() {
            let Some(entities) = pending.remove(function) else {
                continue;
            };

            let mut stored = match self.storage.get_function(function).await {
                Ok(Some(stored)) => stored,
                Ok(None) => {
                    let message = CascadeError::FunctionNotFound(function.clone()).to_string();
                    warn!("{}", message);
                    report.executed.extend(entities.iter().map(|entity| {
                        FunctionRun::new(pass, function, entity).failed(message.clone())
                    }));
                    continue;
                }
                Err(e) => {
                    error!("failed to load function {}: {}", function, e);
                    report.executed.extend(entities.iter().map(|entity| {
                        FunctionRun::new(pass, function, entity).failed(e.to_string())
                    }));
                    continue;
                }
            };

            let mut entities = entities.into_iter();
            while let Some(entity) = entities.next() {
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    let remaining = std::iter::once(entity)
                        .chain(entities)
                        .map(|entity| (function.clone(), entity))
                        .chain(order[index + 1..].iter().flat_map(|later| {
                            pending
                                .remove(later)
                                .into_iter()
                                .flatten()
                                .map(move |entity| (later.clone(), entity))
                        }))
                        .collect::<Vec<_>>();
                    debug!("cascade cancelled with {} runs left", remaining.len());
                    report
                        .executed
                        .extend(remaining.into_iter().map(|(function, entity)| {
                            let mut run = FunctionRun::new(pass, &function, &entity);
                            run.transition(FunctionState::Ordered);
                            run.error = Some(CascadeError::Cancelled.to_string());
                            run
                        }));
                    return next;
                }

                let created_so_far = report.created.len();
                let execution = self
                    .run_function(pass, graph, function, &mut stored, &entity, created_so_far)
                    .await;

                if execution.run.state == FunctionState::Applied {
                    for (attribute, written) in &execution.changed {
                        let feed = (&mut pending, &mut next);
                        self.route(graph, &position, index, attribute, written, feed)
                            .await;
                    }
                    for (resource, created) in &execution.created {
                        match self.builder.resource_functions(resource).await {
                            Ok(functions) => {
                                for function in functions {
                                    next.insert_function(function, created.clone());
                                }
                            }
                            Err(e) => error!("failed to load functions of {}: {}", resource, e),
                        }
                    }
                }
                report.created.extend(execution.created);
                report.executed.push(execution.run);
            }
        }

        next
    }

    /// Feeds a write to functions later in this pass, or defers it to the next pass.
    async fn route(
        &self,
        graph: &FunctionGraph,
        position: &HashMap<&AttributeRef, usize>,
        index: usize,
        attribute: &AttributeRef,
        entity_id: &str,
        (pending, next): (&mut Pending, &mut ChangeSet),
    ) {
        let changed = BTreeSet::from([entity_id.to_owned()]);
        let mut deferred = true;
        let mut earlier = false;

        for row in graph.readers(attribute) {
            let later = position.get(&row.function).is_some_and(|p| *p > index);
            if !later {
                earlier = true;
                continue;
            }
            deferred = false;
            match mapping::dependents(self.entities.as_ref(), row, &changed).await {
                Ok(targets) => pending.entry(row.function.clone()).or_default().extend(targets),
                Err(e) => {
                    warn!("failed to map {} onto {}: {}", attribute, row.function, e);
                    earlier = true;
                }
            }
        }

        if deferred || earlier {
            next.insert_value(attribute.clone(), entity_id);
        }
    }

    async fn run_function(
        &self,
        pass: usize,
        graph: &FunctionGraph,
        function: &AttributeRef,
        stored: &mut Function,
        entity_id: &str,
        created_so_far: usize,
    ) -> Execution {
        let mut run = FunctionRun::new(pass, function, entity_id);
        run.transition(FunctionState::Ordered);

        let bindings = match self.bindings(graph, function, entity_id).await {
            Ok(bindings) => bindings,
            Err(e) => return self.fail(Execution::new(run), stored, e.to_string()).await,
        };

        run.transition(FunctionState::Executing);
        debug!("executing {} on {}", function, entity_id);
        let timeout = self.config.script_timeout;
        let script = self.runner.run(&stored.js, bindings, timeout);
        let outcome = match tokio::time::timeout(timeout, script).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => return self.fail(Execution::new(run), stored, e.to_string()).await,
            Err(_) => {
                let message = CascadeError::ScriptTimeout(timeout).to_string();
                return self.fail(Execution::new(run), stored, message).await;
            }
        };
        if let Some(message) = outcome.error {
            return self.fail(Execution::new(run), stored, message).await;
        }

        let limit = self.config.max_created_entities;
        if created_so_far + outcome.created.len() > limit {
            let message = CascadeError::CreatedEntityLimit(limit).to_string();
            return self.fail(Execution::new(run), stored, message).await;
        }

        let mut execution = Execution::new(run);
        if stored.dry_run {
            debug!(
                "dry run of {} on {}, {} writes skipped",
                function,
                entity_id,
                outcome.writes.len()
            );
        } else {
            for resource in &outcome.created {
                match self.entities.create_entity(resource).await {
                    Ok(id) => execution.created.push((resource.clone(), id)),
                    Err(e) => return self.fail(execution, stored, e.to_string()).await,
                }
            }
            for write in &outcome.writes {
                let target = write.entity_id.as_deref().unwrap_or(entity_id);
                // only real changes feed readers
                let current = self.entities.get_attribute_value(&write.attribute, target).await;
                if matches!(&current, Ok(Some(value)) if *value == write.value) {
                    trace!("{} on {} unchanged", write.attribute, target);
                    continue;
                }
                let written = self
                    .entities
                    .set_attribute_value(&write.attribute, target, write.value.clone())
                    .await;
                if let Err(e) = written {
                    let message =
                        format!("failed to write {} on {}: {}", write.attribute, target, e);
                    return self.fail(execution, stored, message).await;
                }
                execution
                    .changed
                    .push((write.attribute.clone(), target.to_owned()));
            }
        }
        execution.run.writes = outcome.writes;

        execution.run.transition(FunctionState::Applied);
        if stored.clear_stale_error(Utc::now(), self.config.error_retention) {
            if let Err(e) = self.storage.set_error_report(function, None).await {
                error!("failed to clear error report of {}: {}", function, e);
            }
        }
        execution
    }

    async fn bindings(
        &self,
        graph: &FunctionGraph,
        function: &AttributeRef,
        entity_id: &str,
    ) -> CascadeResult<ScriptBindings> {
        let mut inputs = vec![];
        for row in graph.rows_of(function) {
            for source in mapping::dependencies(self.entities.as_ref(), row, entity_id).await? {
                let value = self
                    .entities
                    .get_attribute_value(&row.dependency, &source)
                    .await?;
                inputs.push(ScriptInput {
                    attribute: row.dependency.clone(),
                    entity_id: source,
                    value,
                });
            }
        }
        Ok(ScriptBindings {
            function: function.clone(),
            entity_id: entity_id.to_owned(),
            inputs,
        })
    }

    /// Records `message` on the function, keeping entities already created.
    async fn fail(
        &self,
        execution: Execution,
        stored: &mut Function,
        message: String,
    ) -> Execution {
        let function = &execution.run.function;
        warn!(
            "function {} failed on {}: {}",
            function, execution.run.entity_id, message
        );
        let report = stored.record_error(message.as_str()).clone();
        if let Err(e) = self.storage.set_error_report(function, Some(report)).await {
            error!("failed to record error of {}: {}", function, e);
        }

        Execution {
            run: execution.run.failed(message),
            changed: vec![],
            created: execution.created,
        }
    }

    /// Marks everything the next pass would run as failed.
    async fn fail_too_deep(
        &self,
        graph: &FunctionGraph,
        mut pending: Pending,
        report: &mut CascadeReport,
    ) {
        report.depth_exceeded = true;
        let pass = report.passes + 1;
        let message = CascadeError::CascadeTooDeep.to_string();
        warn!(
            "cascade exceeded {} passes, {} functions not run",
            self.config.max_passes,
            pending.len()
        );

        for function in graph.order() {
            let Some(entities) = pending.remove(&function) else {
                continue;
            };
            let error_report = ErrorReport::new(message.as_str());
            if let Err(e) = self.storage.set_error_report(&function, Some(error_report)).await {
                error!("failed to record error of {}: {}", function, e);
            }
            report.executed.extend(entities.iter().map(|entity| {
                FunctionRun::new(pass, &function, entity).failed(message.as_str())
            }));
        }
    }
}

use cascade_core::*;
use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;

struct Fixture {
    executor: CascadeExecutor,
    storage: Arc<MemoryStorage>,
    entities: Arc<MemoryEntityStorage>,
}

/// Interprets the compiled script as one command name.
fn calculator() -> ClosureScriptRunner {
    ClosureScriptRunner::new(|script: String, bindings: ScriptBindings| async move {
        let total: i64 = bindings
            .inputs
            .iter()
            .filter_map(|input| input.value.as_ref()?.as_i64())
            .sum();
        let write = |value: i64| {
            let write = ScriptWrite::new(bindings.function.clone(), json!(value));
            ScriptOutcome::default().write(write)
        };
        match script.as_str() {
            "sum" => Ok(write(total)),
            "increment" => Ok(write(total + 1)),
            "fail" => Ok(ScriptOutcome::failed("boom")),
            "crash" => Err(CascadeError::Script("interpreter crashed".into())),
            "sleep" => {
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                Ok(write(total))
            }
            "create" => Ok(ScriptOutcome {
                created: vec![ResourceReference::collection("c2")],
                ..Default::default()
            }),
            _ => Ok(ScriptOutcome::default()),
        }
    })
}

fn fixture(config: CascadeConfig) -> Fixture {
    cascade_logger::init_logger();

    let storage = Arc::new(MemoryStorage::default());
    let entities = Arc::new(MemoryEntityStorage::default());
    let executor = CascadeExecutor::new(
        storage.clone(),
        entities.clone(),
        Arc::new(calculator()),
        config,
    );

    Fixture {
        executor,
        storage,
        entities,
    }
}

fn get_attribute(attribute: &str, document: &str) -> String {
    format!(
        r#"<block type="get_attribute"><field name="ATTR">{attribute}</field><value name="DOCUMENT">{document}</value></block>"#
    )
}

/// Reads attributes of the function's own collection.
fn reads(collection: &str, attributes: &[&str]) -> String {
    let document = format!(r#"<block type="variables_get_{collection}_document"/>"#);
    let blocks: String = attributes
        .iter()
        .map(|attribute| get_attribute(attribute, &document))
        .collect();
    format!("<xml>{blocks}</xml>")
}

/// Reads `attribute` of the documents linked to `collection` through `link_type`.
fn reads_linked(link_type: &str, collection: &str, other: &str, attribute: &str) -> String {
    let document = format!(
        r#"<block type="{link_type}-{collection}_{other}_link"><value name="DOCUMENT"><block type="variables_get_{collection}_document"/></value></block>"#
    );
    format!("<xml>{}</xml>", get_attribute(attribute, &document))
}

impl Fixture {
    async fn attach(&self, target: &AttributeRef, function: Function) -> anyhow::Result<()> {
        self.executor
            .builder()
            .sync_function(target, function, &KnownResources::default())
            .await?;
        Ok(())
    }

    async fn write(
        &self,
        attribute: &AttributeRef,
        entity: &str,
        value: serde_json::Value,
    ) -> anyhow::Result<()> {
        self.entities.set_attribute_value(attribute, entity, value).await?;
        Ok(())
    }
}

#[tokio::test]
async fn chained_functions_run_in_one_pass() -> anyhow::Result<()> {
    let fixture = fixture(CascadeConfig::default());
    let (a1, a2, a3) = (
        AttributeRef::collection("c1", "a1"),
        AttributeRef::collection("c1", "a2"),
        AttributeRef::collection("c1", "a3"),
    );
    fixture.attach(&a3, Function::new(reads("c1", &["a1", "a2"]), "sum")).await?;
    fixture.attach(&a2, Function::new(reads("c1", &["a1"]), "sum")).await?;
    fixture.entities.insert_document("c1", "d1").await;
    fixture.write(&a1, "d1", json!(2)).await?;

    let report = fixture
        .executor
        .on_value_changed(ChangeSet::new().with_value(a1, "d1"))
        .await?;

    assert_eq!(report.passes, 1);
    assert_eq!(report.order(), vec![&a2, &a3]);
    assert_eq!(report.count(FunctionState::Applied), 2);
    assert_eq!(fixture.entities.value(&a2, "d1").await, Some(json!(2)));
    assert_eq!(fixture.entities.value(&a3, "d1").await, Some(json!(4)));

    Ok(())
}

#[tokio::test]
async fn cycles_stop_at_the_pass_bound() -> anyhow::Result<()> {
    let fixture = fixture(CascadeConfig {
        max_passes: 3,
        ..Default::default()
    });
    let (a1, a2) = (
        AttributeRef::collection("c1", "a1"),
        AttributeRef::collection("c1", "a2"),
    );
    fixture.attach(&a1, Function::new(reads("c1", &["a2"]), "increment")).await?;
    fixture.attach(&a2, Function::new(reads("c1", &["a1"]), "increment")).await?;
    fixture.entities.insert_document("c1", "d1").await;
    fixture.write(&a1, "d1", json!(1)).await?;

    let report = fixture
        .executor
        .on_value_changed(ChangeSet::new().with_value(a1.clone(), "d1"))
        .await?;

    assert!(report.depth_exceeded);
    assert_eq!(report.passes, 3);
    assert_eq!(report.count(FunctionState::Applied), 6);

    let failed: Vec<_> = report
        .executed
        .iter()
        .filter(|run| run.state == FunctionState::Failed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].function, a2);
    assert_eq!(failed[0].pass, 4);
    assert_eq!(failed[0].error.as_deref(), Some("cascade too deep"));

    let stored = fixture.storage.get_function(&a2).await?.unwrap();
    assert_eq!(stored.error_report.unwrap().message, "cascade too deep");

    Ok(())
}

#[tokio::test]
async fn converged_cycles_stop_early() -> anyhow::Result<()> {
    let fixture = fixture(CascadeConfig::default());
    let (a1, a2) = (
        AttributeRef::collection("c1", "a1"),
        AttributeRef::collection("c1", "a2"),
    );
    fixture.attach(&a1, Function::new(reads("c1", &["a2"]), "sum")).await?;
    fixture.attach(&a2, Function::new(reads("c1", &["a1"]), "sum")).await?;
    fixture.entities.insert_document("c1", "d1").await;
    fixture.write(&a1, "d1", json!(7)).await?;
    fixture.write(&a2, "d1", json!(7)).await?;

    let report = fixture
        .executor
        .on_value_changed(ChangeSet::new().with_value(a1.clone(), "d1"))
        .await?;

    assert!(!report.depth_exceeded);
    assert_eq!(report.passes, 1);
    assert_eq!(report.count(FunctionState::Applied), 1);
    assert_eq!(report.count(FunctionState::Failed), 0);
    assert_eq!(report.runs_of(&a2).next().unwrap().writes.len(), 1);
    assert_eq!(fixture.entities.value(&a2, "d1").await, Some(json!(7)));

    let stored = fixture.storage.get_function(&a2).await?.unwrap();
    assert!(stored.error_report.is_none());

    Ok(())
}

#[tokio::test]
async fn failures_stay_local() -> anyhow::Result<()> {
    let fixture = fixture(CascadeConfig::default());
    let a1 = AttributeRef::collection("c1", "a1");
    let (broken, crashed, fine) = (
        AttributeRef::collection("c1", "broken"),
        AttributeRef::collection("c1", "crashed"),
        AttributeRef::collection("c1", "fine"),
    );
    let downstream = AttributeRef::collection("c1", "downstream");
    fixture.attach(&broken, Function::new(reads("c1", &["a1"]), "fail")).await?;
    fixture.attach(&crashed, Function::new(reads("c1", &["a1"]), "crash")).await?;
    fixture.attach(&fine, Function::new(reads("c1", &["a1"]), "sum")).await?;
    fixture.attach(&downstream, Function::new(reads("c1", &["broken"]), "sum")).await?;
    fixture.entities.insert_document("c1", "d1").await;
    fixture.write(&a1, "d1", json!(7)).await?;

    let report = fixture
        .executor
        .on_value_changed(ChangeSet::new().with_value(a1, "d1"))
        .await?;

    assert_eq!(report.count(FunctionState::Failed), 2);
    assert_eq!(report.count(FunctionState::Applied), 1);
    assert_eq!(report.runs_of(&downstream).count(), 0);
    assert_eq!(fixture.entities.value(&fine, "d1").await, Some(json!(7)));

    let broken = fixture.storage.get_function(&broken).await?.unwrap();
    assert_eq!(broken.error_report.unwrap().message, "boom");
    let crashed = fixture.storage.get_function(&crashed).await?.unwrap();
    assert!(crashed.error_report.unwrap().message.contains("interpreter crashed"));

    Ok(())
}

#[tokio::test]
async fn slow_scripts_time_out() -> anyhow::Result<()> {
    let fixture = fixture(CascadeConfig {
        script_timeout: std::time::Duration::from_millis(20),
        ..Default::default()
    });
    let (a1, a2) = (
        AttributeRef::collection("c1", "a1"),
        AttributeRef::collection("c1", "a2"),
    );
    fixture.attach(&a2, Function::new(reads("c1", &["a1"]), "sleep")).await?;
    fixture.entities.insert_document("c1", "d1").await;

    let report = fixture
        .executor
        .on_value_changed(ChangeSet::new().with_value(a1, "d1"))
        .await?;

    let run = report.runs_of(&a2).next().unwrap();
    assert_eq!(run.state, FunctionState::Failed);
    assert!(run.error.as_deref().unwrap().contains("timed out"));
    assert_eq!(fixture.entities.value(&a2, "d1").await, None);

    Ok(())
}

#[tokio::test]
async fn linked_documents_are_recomputed() -> anyhow::Result<()> {
    let fixture = fixture(CascadeConfig::default());
    let price = AttributeRef::collection("c1", "price");
    let total = AttributeRef::collection("c2", "total");
    fixture
        .attach(&total, Function::new(reads_linked("l1", "c2", "c1", "price"), "sum"))
        .await?;

    for id in ["d1", "d2", "d3"] {
        fixture.entities.insert_document("c1", id).await;
    }
    fixture.entities.insert_document("c2", "e1").await;
    fixture.entities.insert_document("c2", "e2").await;
    fixture.entities.link_documents("l1", "d1", "e1").await?;
    fixture.entities.link_documents("l1", "d2", "e1").await?;
    fixture.entities.link_documents("l1", "d3", "e2").await?;
    fixture.write(&price, "d1", json!(3)).await?;
    fixture.write(&price, "d2", json!(4)).await?;

    let report = fixture
        .executor
        .on_value_changed(ChangeSet::new().with_value(price, "d1"))
        .await?;

    assert_eq!(report.executed.len(), 1);
    assert_eq!(report.executed[0].entity_id, "e1");
    assert_eq!(fixture.entities.value(&total, "e1").await, Some(json!(7)));
    assert_eq!(fixture.entities.value(&total, "e2").await, None);

    Ok(())
}

#[tokio::test]
async fn created_entities_run_their_functions() -> anyhow::Result<()> {
    let fixture = fixture(CascadeConfig::default());
    let (a1, a2) = (
        AttributeRef::collection("c1", "a1"),
        AttributeRef::collection("c1", "a2"),
    );
    let b1 = AttributeRef::collection("c2", "b1");
    fixture.attach(&a2, Function::new(reads("c1", &["a1"]), "create")).await?;
    fixture.attach(&b1, Function::new("<xml/>", "sum")).await?;
    fixture.entities.insert_document("c1", "d1").await;

    let report = fixture
        .executor
        .on_value_changed(ChangeSet::new().with_value(a1.clone(), "d1"))
        .await?;

    assert_eq!(report.passes, 2);
    assert_eq!(report.created.len(), 1);
    let (resource, id) = &report.created[0];
    assert_eq!(resource, &ResourceReference::collection("c2"));
    assert_eq!(fixture.entities.value(&b1, id).await, Some(json!(0)));

    let limited = self::fixture(CascadeConfig {
        max_created_entities: 0,
        ..Default::default()
    });
    limited.attach(&a2, Function::new(reads("c1", &["a1"]), "create")).await?;
    limited.entities.insert_document("c1", "d1").await;
    let report = limited
        .executor
        .on_value_changed(ChangeSet::new().with_value(a1, "d1"))
        .await?;
    assert!(report.created.is_empty());
    assert_eq!(report.count(FunctionState::Failed), 1);

    Ok(())
}

#[tokio::test]
async fn cancelled_cascade_leaves_functions_ordered() -> anyhow::Result<()> {
    let fixture = fixture(CascadeConfig::default());
    let a1 = AttributeRef::collection("c1", "a1");
    let (a2, a3) = (
        AttributeRef::collection("c1", "a2"),
        AttributeRef::collection("c1", "a3"),
    );
    fixture.attach(&a2, Function::new(reads("c1", &["a1"]), "sum")).await?;
    fixture.attach(&a3, Function::new(reads("c1", &["a1"]), "sum")).await?;
    fixture.entities.insert_document("c1", "d1").await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = fixture
        .executor
        .execute(ChangeSet::new().with_value(a1, "d1"), &cancel)
        .await?;

    assert!(report.cancelled);
    assert_eq!(report.count(FunctionState::Ordered), 2);
    assert_eq!(fixture.entities.value(&a2, "d1").await, None);

    Ok(())
}

#[tokio::test]
async fn entry_points() -> anyhow::Result<()> {
    let fixture = fixture(CascadeConfig::default());
    let (a1, a2) = (
        AttributeRef::collection("c1", "a1"),
        AttributeRef::collection("c1", "a2"),
    );
    fixture.entities.insert_document("c1", "d1").await;
    fixture.entities.insert_document("c1", "d2").await;
    fixture.write(&a1, "d1", json!(5)).await?;
    fixture.write(&a1, "d2", json!(6)).await?;
    fixture.attach(&a2, Function::new(reads("c1", &["a1"]), "sum")).await?;

    let report = fixture.executor.on_function_changed(&a2).await?;
    assert_eq!(report.count(FunctionState::Applied), 2);
    assert_eq!(fixture.entities.value(&a2, "d2").await, Some(json!(6)));

    fixture.entities.insert_document("c1", "d3").await;
    fixture.write(&a1, "d3", json!(1)).await?;
    let report = fixture
        .executor
        .on_entity_created(&ResourceReference::collection("c1"), "d3")
        .await?;
    assert_eq!(report.executed.len(), 1);
    assert_eq!(fixture.entities.value(&a2, "d3").await, Some(json!(1)));

    let report = fixture
        .executor
        .on_value_changed(ChangeSet::new().with_value(AttributeRef::collection("c9", "x"), "z"))
        .await?;
    assert_eq!(report.passes, 0);
    assert!(report.executed.is_empty());

    Ok(())
}

#[tokio::test]
async fn dry_runs_and_error_retention() -> anyhow::Result<()> {
    let fixture = fixture(CascadeConfig::default());
    let (a1, a2, a3) = (
        AttributeRef::collection("c1", "a1"),
        AttributeRef::collection("c1", "a2"),
        AttributeRef::collection("c1", "a3"),
    );
    fixture
        .attach(&a2, Function::new(reads("c1", &["a1"]), "sum").with_dry_run(true))
        .await?;
    fixture.attach(&a3, Function::new(reads("c1", &["a1"]), "sum")).await?;
    fixture.entities.insert_document("c1", "d1").await;
    fixture.write(&a1, "d1", json!(9)).await?;

    let stale = ErrorReport::at("old", Utc::now() - Duration::hours(2));
    fixture.storage.set_error_report(&a3, Some(stale)).await?;
    fixture
        .storage
        .set_error_report(&a2, Some(ErrorReport::new("fresh")))
        .await?;

    let report = fixture
        .executor
        .on_value_changed(ChangeSet::new().with_value(a1, "d1"))
        .await?;

    let dry = report.runs_of(&a2).next().unwrap();
    assert_eq!(dry.state, FunctionState::Applied);
    assert_eq!(dry.writes.len(), 1);
    assert_eq!(fixture.entities.value(&a2, "d1").await, None);
    assert_eq!(fixture.entities.value(&a3, "d1").await, Some(json!(9)));

    let a2 = fixture.storage.get_function(&a2).await?.unwrap();
    assert_eq!(a2.error_report.unwrap().message, "fresh");
    let a3 = fixture.storage.get_function(&a3).await?.unwrap();
    assert!(a3.error_report.is_none());

    Ok(())
}

use super::*;
use crate::entities::{functions, prelude::*};
use sea_orm::{sea_query::OnConflict, ActiveModelTrait, Condition, QueryOrder, Set};

type FunctionsModel = <Functions as EntityTrait>::Model;
type FunctionsActiveModel = functions::ActiveModel;
type FunctionsColumn = <Functions as EntityTrait>::Column;

pub struct FunctionDBStorage {
    bucket: Arc<Bucket>,
    pool: DatabaseConnection,
}

impl FunctionDBStorage {
    pub async fn init_with_pool(
        pool: DatabaseConnection,
        bucket: Arc<Bucket>,
    ) -> CascadeStorageResult<Self> {
        Ok(Self { bucket, pool })
    }

    fn key(target: &AttributeRef) -> (String, String, String) {
        (
            target.kind.as_str().into(),
            target.resource_id.clone(),
            target.attribute_id.clone(),
        )
    }

    fn into_function(model: FunctionsModel) -> Function {
        let error_report = model
            .error_message
            .zip(model.error_timestamp)
            .map(|(message, timestamp)| ErrorReport::at(message, timestamp.with_timezone(&Utc)));

        Function {
            xml: model.xml,
            js: model.js,
            error_report,
            editable: model.editable,
            dry_run: model.dry_run,
        }
    }

    async fn find<C>(
        conn: &C,
        target: &AttributeRef,
    ) -> CascadeStorageResult<Option<FunctionsModel>>
    where
        C: ConnectionTrait,
    {
        Ok(Functions::find_by_id(Self::key(target)).one(conn).await?)
    }

    fn resource_condition(resource: &ResourceReference) -> Condition {
        Condition::all()
            .add(FunctionsColumn::Kind.eq(resource.kind.as_str()))
            .add(FunctionsColumn::ResourceId.eq(resource.resource_id.as_str()))
    }

    pub(super) async fn upsert<C>(
        conn: &C,
        target: &AttributeRef,
        function: Function,
    ) -> CascadeStorageResult<()>
    where
        C: ConnectionTrait,
    {
        let (kind, resource_id, attribute_id) = Self::key(target);
        let (error_message, error_timestamp) = match function.error_report {
            Some(report) => (Some(report.message), Some(report.timestamp.into())),
            None => (None, None),
        };

        Functions::insert(FunctionsActiveModel {
            kind: Set(kind),
            resource_id: Set(resource_id),
            attribute_id: Set(attribute_id),
            xml: Set(function.xml),
            js: Set(function.js),
            error_message: Set(error_message),
            error_timestamp: Set(error_timestamp),
            editable: Set(function.editable),
            dry_run: Set(function.dry_run),
        })
        .on_conflict(
            OnConflict::columns([
                FunctionsColumn::Kind,
                FunctionsColumn::ResourceId,
                FunctionsColumn::AttributeId,
            ])
            .update_columns([
                FunctionsColumn::Xml,
                FunctionsColumn::Js,
                FunctionsColumn::ErrorMessage,
                FunctionsColumn::ErrorTimestamp,
                FunctionsColumn::Editable,
                FunctionsColumn::DryRun,
            ])
            .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;
        Ok(())
    }

    pub(super) async fn remove<C>(conn: &C, target: &AttributeRef) -> CascadeStorageResult<u64>
    where
        C: ConnectionTrait,
    {
        let result = Functions::delete_by_id(Self::key(target)).exec(conn).await?;
        Ok(result.rows_affected)
    }

    pub(super) async fn remove_resource<C>(
        conn: &C,
        resource: &ResourceReference,
    ) -> CascadeStorageResult<u64>
    where
        C: ConnectionTrait,
    {
        let result = Functions::delete_many()
            .filter(Self::resource_condition(resource))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }
}

#[async_trait]
impl FunctionStorage<CascadeStorageError> for FunctionDBStorage {
    async fn get_function(&self, target: &AttributeRef) -> CascadeStorageResult<Option<Function>> {
        let _lock = self.bucket.read().await?;
        trace!("get function: {target}");
        Ok(Self::find(&self.pool, target).await?.map(Self::into_function))
    }

    async fn set_function(
        &self,
        target: &AttributeRef,
        function: Function,
    ) -> CascadeStorageResult<()> {
        let _lock = self.bucket.write().await?;
        trace!("start set function: {target}");
        Self::upsert(&self.pool, target, function).await?;
        trace!("end set function: {target}");
        Ok(())
    }

    async fn delete_function(&self, target: &AttributeRef) -> CascadeStorageResult<bool> {
        let _lock = self.bucket.write().await?;
        let rows = Self::remove(&self.pool, target).await?;
        trace!("delete function: {target}, {rows}");
        Ok(rows > 0)
    }

    async fn set_error_report(
        &self,
        target: &AttributeRef,
        report: Option<ErrorReport>,
    ) -> CascadeStorageResult<()> {
        let _lock = self.bucket.write().await?;

        let trx = self.pool.begin().await?;
        let Some(model) = Self::find(&trx, target).await? else {
            return Err(CascadeError::FunctionNotFound(target.clone()).into());
        };

        let mut model: FunctionsActiveModel = model.into();
        match report {
            Some(report) => {
                model.error_message = Set(Some(report.message));
                model.error_timestamp = Set(Some(report.timestamp.into()));
            }
            None => {
                model.error_message = Set(None);
                model.error_timestamp = Set(None);
            }
        }
        model.update(&trx).await?;
        trx.commit().await?;

        trace!("error report of {target} updated");
        Ok(())
    }

    async fn resource_functions(
        &self,
        resource: &ResourceReference,
    ) -> CascadeStorageResult<Vec<AttributeRef>> {
        let _lock = self.bucket.read().await?;
        let models = Functions::find()
            .filter(Self::resource_condition(resource))
            .order_by_asc(FunctionsColumn::AttributeId)
            .all(&self.pool)
            .await?;

        Ok(models
            .into_iter()
            .map(|model| {
                AttributeRef::new(resource.kind, resource.resource_id.clone(), model.attribute_id)
            })
            .collect())
    }

    async fn delete_resource_functions(
        &self,
        resource: &ResourceReference,
    ) -> CascadeStorageResult<u64> {
        let _lock = self.bucket.write().await?;
        let rows = Self::remove_resource(&self.pool, resource).await?;
        debug!("delete functions of {resource}: {rows}");
        Ok(rows)
    }
}

#[cfg(test)]
pub(super) async fn functions_storage_test(storage: &FunctionDBStorage) -> anyhow::Result<()> {
    let target = AttributeRef::collection("c1", "a3");
    let other = AttributeRef::collection("c1", "a2");
    let linked = AttributeRef::link("l1", "a1");

    assert_eq!(storage.get_function(&target).await?, None);

    let function = Function::new("<xml/>", "sum");
    storage.set_function(&target, function.clone()).await?;
    assert_eq!(storage.get_function(&target).await?, Some(function));

    // overwriting keeps a single row
    let function = Function::new("<xml></xml>", "product").with_dry_run(true);
    storage.set_function(&target, function.clone()).await?;
    assert_eq!(storage.get_function(&target).await?, Some(function));

    let report = ErrorReport::new("boom");
    storage.set_error_report(&target, Some(report.clone())).await?;
    let stored = storage.get_function(&target).await?.and_then(|f| f.error_report);
    assert_eq!(stored.map(|r| r.message), Some(report.message));

    storage.set_error_report(&target, None).await?;
    let stored = storage.get_function(&target).await?;
    assert!(stored.is_some_and(|f| f.error_report.is_none()));

    assert!(matches!(
        storage.set_error_report(&other, None).await,
        Err(CascadeStorageError::Core(CascadeError::FunctionNotFound(_)))
    ));

    storage.set_function(&other, Function::new("", "")).await?;
    storage.set_function(&linked, Function::new("", "")).await?;
    assert_eq!(
        storage
            .resource_functions(&ResourceReference::collection("c1"))
            .await?,
        vec![other.clone(), target.clone()]
    );

    assert!(storage.delete_function(&other).await?);
    assert!(!storage.delete_function(&other).await?);
    assert_eq!(
        storage
            .delete_resource_functions(&ResourceReference::collection("c1"))
            .await?,
        1
    );
    assert_eq!(
        storage
            .resource_functions(&ResourceReference::link("l1"))
            .await?,
        vec![linked]
    );

    Ok(())
}

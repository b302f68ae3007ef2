use super::*;
use crate::entities::{function_edges, prelude::*};
use sea_orm::{Condition, QueryOrder, Set};

type EdgesModel = <FunctionEdges as EntityTrait>::Model;
type EdgesActiveModel = function_edges::ActiveModel;
type EdgesColumn = <FunctionEdges as EntityTrait>::Column;

pub struct EdgeDBStorage {
    bucket: Arc<Bucket>,
    pool: DatabaseConnection,
}

impl EdgeDBStorage {
    pub async fn init_with_pool(
        pool: DatabaseConnection,
        bucket: Arc<Bucket>,
    ) -> CascadeStorageResult<Self> {
        Ok(Self { bucket, pool })
    }

    fn function_condition(function: &AttributeRef) -> Condition {
        Condition::all()
            .add(EdgesColumn::Kind.eq(function.kind.as_str()))
            .add(EdgesColumn::ResourceId.eq(function.resource_id.as_str()))
            .add(EdgesColumn::AttributeId.eq(function.attribute_id.as_str()))
    }

    fn dependency_condition(dependency: &AttributeRef) -> Condition {
        Condition::all()
            .add(EdgesColumn::DependencyKind.eq(dependency.kind.as_str()))
            .add(EdgesColumn::DependencyResourceId.eq(dependency.resource_id.as_str()))
            .add(EdgesColumn::DependencyAttributeId.eq(dependency.attribute_id.as_str()))
    }

    fn resource_condition(resource: &ResourceReference) -> Condition {
        let condition = Condition::any()
            .add(
                Condition::all()
                    .add(EdgesColumn::Kind.eq(resource.kind.as_str()))
                    .add(EdgesColumn::ResourceId.eq(resource.resource_id.as_str())),
            )
            .add(
                Condition::all()
                    .add(EdgesColumn::DependencyKind.eq(resource.kind.as_str()))
                    .add(EdgesColumn::DependencyResourceId.eq(resource.resource_id.as_str())),
            );

        match resource.kind {
            ResourceKind::Link => {
                condition.add(EdgesColumn::ViaLinkType.eq(resource.resource_id.as_str()))
            }
            ResourceKind::Collection => condition,
        }
    }

    fn into_edge(model: EdgesModel) -> CascadeStorageResult<DependencyEdge> {
        Ok(DependencyEdge {
            function: AttributeRef::new(
                parse_kind(&model.kind)?,
                model.resource_id,
                model.attribute_id,
            ),
            dependency: AttributeRef::new(
                parse_kind(&model.dependency_kind)?,
                model.dependency_resource_id,
                model.dependency_attribute_id,
            ),
            via_link_type: model.via_link_type,
        })
    }

    async fn all<C>(conn: &C, condition: Condition) -> CascadeStorageResult<Vec<DependencyEdge>>
    where
        C: ConnectionTrait,
    {
        FunctionEdges::find()
            .filter(condition)
            .order_by_asc(EdgesColumn::Id)
            .all(conn)
            .await?
            .into_iter()
            .map(Self::into_edge)
            .collect()
    }

    /// Rows matching any of `conditions`, queried chunk by chunk.
    async fn any<C>(
        conn: &C,
        conditions: Vec<Condition>,
    ) -> CascadeStorageResult<Vec<DependencyEdge>>
    where
        C: ConnectionTrait,
    {
        let mut edges = Vec::new();
        for chunk in conditions.chunks(QUERY_CHUNK) {
            let condition = chunk
                .iter()
                .cloned()
                .fold(Condition::any(), |any, condition| any.add(condition));
            edges.extend(Self::all(conn, condition).await?);
        }
        Ok(edges)
    }

    async fn insert<C>(conn: &C, edges: Vec<DependencyEdge>) -> CascadeStorageResult<()>
    where
        C: ConnectionTrait,
    {
        if edges.is_empty() {
            return Ok(());
        }

        FunctionEdges::insert_many(edges.into_iter().map(|edge| EdgesActiveModel {
            kind: Set(edge.function.kind.as_str().into()),
            resource_id: Set(edge.function.resource_id),
            attribute_id: Set(edge.function.attribute_id),
            dependency_kind: Set(edge.dependency.kind.as_str().into()),
            dependency_resource_id: Set(edge.dependency.resource_id),
            dependency_attribute_id: Set(edge.dependency.attribute_id),
            via_link_type: Set(edge.via_link_type),
            ..Default::default()
        }))
        .exec(conn)
        .await?;
        Ok(())
    }

    async fn delete<C>(conn: &C, condition: Condition) -> CascadeStorageResult<u64>
    where
        C: ConnectionTrait,
    {
        let result = FunctionEdges::delete_many()
            .filter(condition)
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }

    pub(super) async fn replace<C>(
        conn: &C,
        function: &AttributeRef,
        edges: Vec<DependencyEdge>,
    ) -> CascadeStorageResult<()>
    where
        C: ConnectionTrait,
    {
        Self::delete(conn, Self::function_condition(function)).await?;
        Self::insert(conn, edges).await
    }

    pub(super) async fn remove_function<C>(
        conn: &C,
        function: &AttributeRef,
    ) -> CascadeStorageResult<u64>
    where
        C: ConnectionTrait,
    {
        Self::delete(conn, Self::function_condition(function)).await
    }

    pub(super) async fn remove_attribute<C>(
        conn: &C,
        attribute: &AttributeRef,
    ) -> CascadeStorageResult<u64>
    where
        C: ConnectionTrait,
    {
        let condition = Condition::any()
            .add(Self::function_condition(attribute))
            .add(Self::dependency_condition(attribute));
        Self::delete(conn, condition).await
    }

    pub(super) async fn remove_resource<C>(
        conn: &C,
        resource: &ResourceReference,
    ) -> CascadeStorageResult<u64>
    where
        C: ConnectionTrait,
    {
        Self::delete(conn, Self::resource_condition(resource)).await
    }

    pub async fn count(&self) -> CascadeStorageResult<u64> {
        let _lock = self.bucket.read().await?;
        Ok(FunctionEdges::find().count(&self.pool).await?)
    }
}

#[async_trait]
impl EdgeStorage<CascadeStorageError> for EdgeDBStorage {
    async fn replace_edges(
        &self,
        function: &AttributeRef,
        edges: Vec<DependencyEdge>,
    ) -> CascadeStorageResult<()> {
        trace!("start replace edges: {function}");
        let _lock = self.bucket.write().await?;
        let rows = edges.len();

        let trx = self.pool.begin().await?;
        Self::replace(&trx, function, edges).await?;
        trx.commit().await?;

        trace!("end replace edges: {function}, {rows}");
        Ok(())
    }

    async fn get_edges(
        &self,
        functions: &[AttributeRef],
    ) -> CascadeStorageResult<Vec<DependencyEdge>> {
        if functions.is_empty() {
            return Ok(vec![]);
        }
        let _lock = self.bucket.read().await?;
        let conditions = functions.iter().map(Self::function_condition).collect();
        Self::any(&self.pool, conditions).await
    }

    async fn get_dependents(
        &self,
        dependencies: &[AttributeRef],
    ) -> CascadeStorageResult<Vec<DependencyEdge>> {
        if dependencies.is_empty() {
            return Ok(vec![]);
        }
        let _lock = self.bucket.read().await?;
        let conditions = dependencies
            .iter()
            .map(Self::dependency_condition)
            .collect();
        Self::any(&self.pool, conditions).await
    }

    async fn delete_function_edges(&self, function: &AttributeRef) -> CascadeStorageResult<u64> {
        let _lock = self.bucket.write().await?;
        let rows = Self::remove_function(&self.pool, function).await?;
        trace!("delete edges of {function}: {rows}");
        Ok(rows)
    }

    async fn delete_attribute_edges(&self, attribute: &AttributeRef) -> CascadeStorageResult<u64> {
        let _lock = self.bucket.write().await?;
        let rows = Self::remove_attribute(&self.pool, attribute).await?;
        trace!("delete edges touching {attribute}: {rows}");
        Ok(rows)
    }

    async fn delete_resource_edges(
        &self,
        resource: &ResourceReference,
    ) -> CascadeStorageResult<u64> {
        let _lock = self.bucket.write().await?;
        let rows = Self::remove_resource(&self.pool, resource).await?;
        debug!("delete edges touching {resource}: {rows}");
        Ok(rows)
    }
}

#[cfg(test)]
pub(super) async fn edges_storage_test(storage: &EdgeDBStorage) -> anyhow::Result<()> {
    let (a1, a2, a3) = (
        AttributeRef::collection("c1", "a1"),
        AttributeRef::collection("c1", "a2"),
        AttributeRef::collection("c1", "a3"),
    );
    let linked = AttributeRef::collection("c2", "b1");

    storage
        .replace_edges(
            &a3,
            vec![
                DependencyEdge::new(a3.clone(), a1.clone()),
                DependencyEdge::new(a3.clone(), a2.clone()),
                DependencyEdge::new(a3.clone(), linked.clone()).via("l1"),
            ],
        )
        .await?;
    storage
        .replace_edges(&a2, vec![DependencyEdge::new(a2.clone(), a1.clone())])
        .await?;
    assert_eq!(storage.count().await?, 4);

    // replacing drops the previous rows of the function only
    storage
        .replace_edges(
            &a3,
            vec![
                DependencyEdge::new(a3.clone(), a2.clone()),
                DependencyEdge::new(a3.clone(), linked.clone()).via("l1"),
            ],
        )
        .await?;
    assert_eq!(storage.count().await?, 3);

    let edges = storage.get_edges(&[a3.clone()]).await?;
    assert_eq!(
        edges,
        vec![
            DependencyEdge::new(a3.clone(), a2.clone()),
            DependencyEdge::new(a3.clone(), linked.clone()).via("l1"),
        ]
    );

    let dependents = storage.get_dependents(&[a1.clone()]).await?;
    assert_eq!(dependents, vec![DependencyEdge::new(a2.clone(), a1.clone())]);
    assert_eq!(storage.get_dependents(&[a2.clone(), linked.clone()]).await?.len(), 2);
    assert!(storage.get_edges(&[]).await?.is_empty());

    // a link type is removed from rows traversing it as well
    assert_eq!(
        storage
            .delete_resource_edges(&ResourceReference::link("l1"))
            .await?,
        1
    );
    assert_eq!(storage.delete_attribute_edges(&a2).await?, 2);
    assert_eq!(storage.count().await?, 0);

    storage
        .replace_edges(&a2, vec![DependencyEdge::new(a2.clone(), a1.clone())])
        .await?;
    assert_eq!(storage.delete_function_edges(&a2).await?, 1);
    assert_eq!(storage.delete_function_edges(&a2).await?, 0);

    Ok(())
}

mod edges;
mod functions;
#[cfg(test)]
mod test;

use super::*;
use cascade_core::CascadeResult;
use cascade_storage_migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, DatabaseTransaction};
use std::time::Duration;

pub use edges::EdgeDBStorage;
pub use functions::FunctionDBStorage;

/// Rows are matched in chunks to stay below the expression depth of sqlite.
const QUERY_CHUNK: usize = 100;

fn parse_kind(kind: &str) -> CascadeStorageResult<ResourceKind> {
    kind.parse()
        .map_err(|_| CascadeStorageError::InvalidKind(kind.into()))
}

async fn create_connection(
    database: &str,
    single_thread: bool,
) -> CascadeStorageResult<DatabaseConnection> {
    let mut options = ConnectOptions::new(database.to_owned());
    if single_thread {
        // an in-memory database only lives as long as its connection
        options.max_connections(1).min_connections(1);
    } else {
        options
            .max_connections(50)
            .min_connections(10)
            .acquire_timeout(Duration::from_secs(2))
            .connect_timeout(Duration::from_secs(2))
            .idle_timeout(Duration::from_secs(5))
            .max_lifetime(Duration::from_secs(30));
    }
    options.sqlx_logging(false);

    Ok(Database::connect(options).await?)
}

/// Commits `trx` when `result` is ok and rolls it back otherwise.
async fn finish<T>(
    trx: DatabaseTransaction,
    result: CascadeStorageResult<T>,
) -> CascadeStorageResult<T> {
    match result {
        Ok(value) => {
            trx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = trx.rollback().await {
                error!("failed to roll back: {rollback}");
            }
            Err(e)
        }
    }
}

/// Database backed function and dependency row storage sharing one pool.
pub struct CascadeStorage {
    bucket: Arc<Bucket>,
    pool: DatabaseConnection,
    edges: EdgeDBStorage,
    functions: FunctionDBStorage,
}

impl CascadeStorage {
    pub async fn new(database: &str) -> CascadeStorageResult<Self> {
        let is_sqlite = is_sqlite(database);
        let pool = create_connection(database, is_sqlite).await?;
        let bucket = get_bucket(is_sqlite);

        if is_sqlite {
            pool.execute_unprepared("PRAGMA journal_mode=WAL;").await?;
        }

        let edges = EdgeDBStorage::init_with_pool(pool.clone(), bucket.clone()).await?;
        let functions = FunctionDBStorage::init_with_pool(pool.clone(), bucket.clone()).await?;

        Ok(Self {
            bucket,
            pool,
            edges,
            functions,
        })
    }

    pub async fn new_with_migration(database: &str) -> CascadeStorageResult<Self> {
        let storage = Self::new(database).await?;

        storage.db_migrate().await?;

        Ok(storage)
    }

    async fn db_migrate(&self) -> CascadeStorageResult<()> {
        Migrator::up(&self.pool, None).await?;
        info!("cascade storage migrated: {}", self.database());
        Ok(())
    }

    /// Opens `./data/<file>.db`, creating the folder and the schema when missing.
    pub async fn new_with_sqlite(file: &str) -> CascadeStorageResult<Self> {
        use std::fs::create_dir;

        let data = PathBuf::from("./data");
        if !data.exists() {
            create_dir(&data).map_err(CascadeStorageError::CreateDataFolder)?;
        }

        Self::new_with_migration(&format!(
            "sqlite:{}?mode=rwc",
            data.join(PathBuf::from(file).name_str())
                .with_extension("db")
                .display()
        ))
        .await
    }

    pub fn database(&self) -> String {
        format!("{:?}", self.pool.get_database_backend())
    }

    pub fn edges(&self) -> &EdgeDBStorage {
        &self.edges
    }

    pub fn functions(&self) -> &FunctionDBStorage {
        &self.functions
    }

    async fn replace_function_with_edges(
        &self,
        target: &AttributeRef,
        function: Function,
        edges: Vec<DependencyEdge>,
    ) -> CascadeStorageResult<()> {
        let _lock = self.bucket.write().await?;
        let rows = edges.len();

        let trx = self.pool.begin().await?;
        let result = async {
            FunctionDBStorage::upsert(&trx, target, function).await?;
            EdgeDBStorage::replace(&trx, target, edges).await
        }
        .await;
        finish(trx, result).await?;

        trace!("replace function {target} with {rows} rows");
        Ok(())
    }

    async fn remove_function_with_edges(
        &self,
        target: &AttributeRef,
    ) -> CascadeStorageResult<Removal> {
        let _lock = self.bucket.write().await?;

        let trx = self.pool.begin().await?;
        let result = async {
            Ok::<_, CascadeStorageError>(Removal {
                functions: FunctionDBStorage::remove(&trx, target).await?,
                rows: EdgeDBStorage::remove_function(&trx, target).await?,
            })
        }
        .await;
        finish(trx, result).await
    }

    async fn remove_attribute_with_edges(
        &self,
        attribute: &AttributeRef,
    ) -> CascadeStorageResult<Removal> {
        let _lock = self.bucket.write().await?;

        let trx = self.pool.begin().await?;
        let result = async {
            Ok::<_, CascadeStorageError>(Removal {
                functions: FunctionDBStorage::remove(&trx, attribute).await?,
                rows: EdgeDBStorage::remove_attribute(&trx, attribute).await?,
            })
        }
        .await;
        finish(trx, result).await
    }

    async fn remove_resource_with_edges(
        &self,
        resource: &ResourceReference,
    ) -> CascadeStorageResult<Removal> {
        let _lock = self.bucket.write().await?;

        let trx = self.pool.begin().await?;
        let result = async {
            Ok::<_, CascadeStorageError>(Removal {
                functions: FunctionDBStorage::remove_resource(&trx, resource).await?,
                rows: EdgeDBStorage::remove_resource(&trx, resource).await?,
            })
        }
        .await;
        let removal = finish(trx, result).await?;

        debug!(
            "delete {resource}: {} functions, {} rows",
            removal.functions, removal.rows
        );
        Ok(removal)
    }

    pub async fn with_pool<R, F, Fut>(&self, func: F) -> CascadeStorageResult<R>
    where
        F: Fn(DatabaseConnection) -> Fut,
        Fut: Future<Output = CascadeStorageResult<R>>,
    {
        func(self.pool.clone()).await
    }
}

#[async_trait]
impl EdgeStorage for CascadeStorage {
    async fn replace_edges(
        &self,
        function: &AttributeRef,
        edges: Vec<DependencyEdge>,
    ) -> CascadeResult<()> {
        Ok(self.edges.replace_edges(function, edges).await?)
    }

    async fn get_edges(&self, functions: &[AttributeRef]) -> CascadeResult<Vec<DependencyEdge>> {
        Ok(self.edges.get_edges(functions).await?)
    }

    async fn get_dependents(
        &self,
        dependencies: &[AttributeRef],
    ) -> CascadeResult<Vec<DependencyEdge>> {
        Ok(self.edges.get_dependents(dependencies).await?)
    }

    async fn delete_function_edges(&self, function: &AttributeRef) -> CascadeResult<u64> {
        Ok(self.edges.delete_function_edges(function).await?)
    }

    async fn delete_attribute_edges(&self, attribute: &AttributeRef) -> CascadeResult<u64> {
        Ok(self.edges.delete_attribute_edges(attribute).await?)
    }

    async fn delete_resource_edges(&self, resource: &ResourceReference) -> CascadeResult<u64> {
        Ok(self.edges.delete_resource_edges(resource).await?)
    }
}

#[async_trait]
impl FunctionStorage for CascadeStorage {
    async fn get_function(&self, target: &AttributeRef) -> CascadeResult<Option<Function>> {
        Ok(self.functions.get_function(target).await?)
    }

    async fn set_function(&self, target: &AttributeRef, function: Function) -> CascadeResult<()> {
        Ok(self.functions.set_function(target, function).await?)
    }

    async fn delete_function(&self, target: &AttributeRef) -> CascadeResult<bool> {
        Ok(self.functions.delete_function(target).await?)
    }

    async fn set_error_report(
        &self,
        target: &AttributeRef,
        report: Option<ErrorReport>,
    ) -> CascadeResult<()> {
        Ok(self.functions.set_error_report(target, report).await?)
    }

    async fn resource_functions(
        &self,
        resource: &ResourceReference,
    ) -> CascadeResult<Vec<AttributeRef>> {
        Ok(self.functions.resource_functions(resource).await?)
    }

    async fn delete_resource_functions(&self, resource: &ResourceReference) -> CascadeResult<u64> {
        Ok(self.functions.delete_resource_functions(resource).await?)
    }
}

#[async_trait]
impl GraphStorage for CascadeStorage {
    async fn replace_function(
        &self,
        target: &AttributeRef,
        function: Function,
        edges: Vec<DependencyEdge>,
    ) -> CascadeResult<()> {
        Ok(self
            .replace_function_with_edges(target, function, edges)
            .await?)
    }

    async fn delete_function_with_edges(&self, target: &AttributeRef) -> CascadeResult<Removal> {
        Ok(self.remove_function_with_edges(target).await?)
    }

    async fn delete_attribute_with_edges(
        &self,
        attribute: &AttributeRef,
    ) -> CascadeResult<Removal> {
        Ok(self.remove_attribute_with_edges(attribute).await?)
    }

    async fn delete_resource_with_edges(
        &self,
        resource: &ResourceReference,
    ) -> CascadeResult<Removal> {
        Ok(self.remove_resource_with_edges(resource).await?)
    }
}

pub use sea_orm_migration::prelude::*;

mod m20231016_000001_initial_function_table;
mod m20231016_000002_initial_function_edge_table;
mod schema;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20231016_000001_initial_function_table::Migration),
            Box::new(m20231016_000002_initial_function_edge_table::Migration),
        ]
    }
}

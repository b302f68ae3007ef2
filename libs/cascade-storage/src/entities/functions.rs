use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "functions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub kind: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub resource_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub attribute_id: String,
    #[sea_orm(column_type = "Text")]
    pub xml: String,
    #[sea_orm(column_type = "Text")]
    pub js: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
    pub error_timestamp: Option<DateTimeWithTimeZone>,
    pub editable: bool,
    pub dry_run: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

use sea_orm::entity::prelude::*;

/// One order entry in a user's shard database.
///
/// Row ids are only unique within a shard; the composite `slug:id` key in
/// `domain::RecordKey` is what leaves this layer.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "order_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Owner's display name, denormalized so shard rows stay self-describing.
    pub user_name: String,

    pub client_name: String,

    pub order_ref: String,

    pub item_count: i32,

    pub entry_date: Date,

    /// Set once the order enters processing; range filters prefer this over
    /// `entry_date` when present.
    pub process_date: Option<Date>,

    /// Normalized `HH:MM:SS` machining duration.
    pub cut_time: Option<String>,

    pub notes: Option<String>,

    pub order_value: f64,

    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

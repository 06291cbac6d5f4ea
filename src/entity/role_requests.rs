use sea_orm::entity::prelude::*;

/// One row per seller/admin promotion request. The `kind` column
/// discriminates the two request types; a partial unique index on
/// (user_id, kind) WHERE status = 'pending' backs the at-most-one-pending
/// rule at the database level.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "role_requests")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub status: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub categories: Option<Json>,
    pub reason: Option<String>,
    pub requested_at: DateTimeWithTimeZone,
    pub reviewed_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id"
    )]
    Users,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

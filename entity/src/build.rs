use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Copy, Clone, PartialEq, Eq, DeriveActiveEnum, EnumIter, Deserialize, Serialize)]
#[sea_orm(rs_type = "i16", db_type = "Integer")]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    #[sea_orm(num_value = 0)]
    Pending,
    #[sea_orm(num_value = 1)]
    Cloning,
    #[sea_orm(num_value = 2)]
    Building,
    #[sea_orm(num_value = 3)]
    Deploying,
    #[sea_orm(num_value = 4)]
    Success,
    #[sea_orm(num_value = 5)]
    Failed,
    #[sea_orm(num_value = 6)]
    Cancelled,
}

impl BuildStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BuildStatus::Success | BuildStatus::Failed | BuildStatus::Cancelled
        )
    }

    /// Legal transitions of the build state machine. Phases never skip
    /// forward; any active phase may fail; terminal states are final.
    pub fn can_transition_to(&self, next: BuildStatus) -> bool {
        match (self, next) {
            (BuildStatus::Pending, BuildStatus::Cloning) => true,
            (BuildStatus::Pending, BuildStatus::Cancelled) => true,
            (BuildStatus::Cloning, BuildStatus::Building) => true,
            (BuildStatus::Building, BuildStatus::Deploying) => true,
            (BuildStatus::Deploying, BuildStatus::Success) => true,
            (
                BuildStatus::Cloning | BuildStatus::Building | BuildStatus::Deploying,
                BuildStatus::Failed,
            ) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, DeriveActiveEnum, EnumIter, Deserialize, Serialize)]
#[sea_orm(rs_type = "i16", db_type = "Integer")]
#[serde(rename_all = "lowercase")]
pub enum BuildTrigger {
    #[sea_orm(num_value = 0)]
    Webhook,
    #[sea_orm(num_value = 1)]
    Manual,
    #[sea_orm(num_value = 2)]
    Rollback,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "build")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub app: Uuid,
    pub status: BuildStatus,
    pub trigger: BuildTrigger,
    pub commit_hash: Option<String>,
    pub commit_message: Option<String>,
    pub commit_author: Option<String>,
    pub image_reference: Option<String>,
    pub error_message: Option<String>,
    pub created_at: NaiveDateTime,
    pub started_at: Option<NaiveDateTime>,
    pub finished_at: Option<NaiveDateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::app::Entity",
        from = "Column::App",
        to = "super::app::Column::Id"
    )]
    App,
    #[sea_orm(has_many = "super::build_log::Entity")]
    BuildLog,
}

impl Related<super::app::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::App.def()
    }
}

impl Related<super::build_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BuildLog.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

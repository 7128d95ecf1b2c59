use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Copy, Clone, PartialEq, Eq, DeriveActiveEnum, EnumIter, Deserialize, Serialize)]
#[sea_orm(rs_type = "i16", db_type = "Integer")]
#[serde(rename_all = "lowercase")]
pub enum BuildStrategyKind {
    #[sea_orm(num_value = 0)]
    Autodetect,
    #[sea_orm(num_value = 1)]
    Dockerfile,
    #[sea_orm(num_value = 2)]
    Compose,
    #[sea_orm(num_value = 3)]
    Buildpacks,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "app")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub repository: String,
    pub branch: String,
    pub strategy: BuildStrategyKind,
    pub dockerfile: String,
    pub compose_file: Option<String>,
    pub build_context: Option<String>,
    pub container_name: String,
    pub image_name: String,
    pub environment: Json,
    pub webhook_secret: Option<String>,
    pub enabled: bool,
    pub auto_deploy: bool,
    pub subdomain: Option<String>,
    pub container_port: Option<i32>,
    pub created_at: NaiveDateTime,
}

impl Model {
    /// Environment variables as declared on the app; non-string values are skipped.
    pub fn environment_vars(&self) -> Vec<(String, String)> {
        self.environment
            .as_object()
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::build::Entity")]
    Build,
}

impl Related<super::build::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Build.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

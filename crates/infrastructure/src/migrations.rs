use sqlx::migrate::Migrator;

/// 仓库根目录 `migrations/` 下的表结构迁移
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

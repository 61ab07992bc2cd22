use crate::entities::processed_files;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::time::Duration;
use tracing::info;

pub async fn setup_database(db_url: &str) -> anyhow::Result<DatabaseConnection> {
    info!("📂 Database: {}", db_url);

    let mut opt = ConnectOptions::new(db_url);
    opt.max_connections(20)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db = Database::connect(opt).await?;

    info!("✅ Database connected successfully");

    run_migrations(&db).await?;

    Ok(db)
}

pub async fn run_migrations(db: &DatabaseConnection) -> anyhow::Result<()> {
    info!("🔄 Running SeaORM auto-migrations...");
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let stmt = schema
        .create_table_from_entity(processed_files::Entity)
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&stmt)).await?;

    db.execute(sea_orm::Statement::from_string(
        builder,
        "CREATE INDEX IF NOT EXISTS idx_processed_files_expires_at ON processed_files(expires_at);"
            .to_string(),
    ))
    .await?;

    Ok(())
}

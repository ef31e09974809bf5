use std::env;

use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;

use mindspend::{backend, database};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool = database::db::connection::get_db_pool().await?;
    database::db::connection::run_migrations(&pool).await?;

    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    backend::run_server(pool, port).await
}

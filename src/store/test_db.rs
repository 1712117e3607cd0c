//! Throwaway Postgres databases for adapter tests
//!
//! One container is started per test binary and every caller gets a fresh database in it, with the
//! migrations applied. When no container runtime is reachable, [`pool`] returns `None` and the
//! calling test returns early.

use once_cell::sync::Lazy;
use sqlx::{Connection, PgConnection, PgPool};
use testcontainers::{runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::postgres::Postgres as PostgresImage;
use tokio::sync::OnceCell;
use uuid::Uuid;

struct Server {
    _container: ContainerAsync<PostgresImage>,
    base_url: String,
}

static SERVER: Lazy<OnceCell<Option<Server>>> = Lazy::new(OnceCell::new);

async fn start() -> Option<Server> {
    let image = PostgresImage::default().with_user("market").with_password("market").with_db_name("market");
    let container = match image.start().await {
        Ok(container) => container,
        Err(e) => {
            eprintln!("postgres container unavailable, skipping database tests: {e}");
            return None;
        }
    };
    let host = container.get_host().await.ok()?;
    let port = container.get_host_port_ipv4(5432).await.ok()?;
    Some(Server { base_url: format!("postgresql://market:market@{host}:{port}"), _container: container })
}

pub(crate) async fn pool() -> Option<PgPool> {
    let base_url = &SERVER.get_or_init(start).await.as_ref()?.base_url;
    let name = format!("market_{}", Uuid::new_v4().simple());

    let mut admin = PgConnection::connect(&format!("{base_url}/postgres")).await.expect("connect to postgres");
    sqlx::query(&format!("CREATE DATABASE \"{name}\"")).execute(&mut admin).await.expect("create test database");
    admin.close().await.expect("close admin connection");

    let pool = PgPool::connect(&format!("{base_url}/{name}")).await.expect("connect to test database");
    sqlx::migrate!("./migrations").run(&pool).await.expect("run migrations");
    Some(pool)
}

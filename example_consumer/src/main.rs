//! Example consumer: a separate Rust project that embeds steward-sdk.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! With DATABASE_URL set the admin runs against PostgreSQL; without it a
//! seeded in-memory store is used so the surface can be explored directly.

use std::sync::Arc;
use steward_sdk::{
    admin_routes, common_routes, resolve, AdminOptions, AdminState, DataStore, FieldOptions,
    FieldValue, LocalFileStorage, MemoryStore, PgStore, RouterOptions, SchemaDescriptor,
};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("steward_sdk=info")),
        )
        .init();

    let schema: SchemaDescriptor = serde_json::from_str(include_str!("schema.json"))?;
    let options = AdminOptions::default().field(
        "Post",
        "title",
        FieldOptions {
            formatter: Some(Arc::new(|raw, _| {
                Ok(FieldValue::Text(
                    raw.as_text().unwrap_or_default().trim().to_string(),
                ))
            })),
            ..FieldOptions::default()
        },
    );
    let registry = Arc::new(resolve(&schema, &options)?);

    let store: Arc<dyn DataStore> = match std::env::var("DATABASE_URL") {
        Ok(url) => {
            tracing::info!("using PostgreSQL store");
            Arc::new(PgStore::connect(&url, registry.clone()).await?)
        }
        Err(_) => {
            tracing::info!("DATABASE_URL not set; using seeded in-memory store");
            let memory = MemoryStore::new(registry.clone());
            memory.seed(
                "User",
                vec![
                    serde_json::json!({"id": 1, "email": "alice@example.com"}),
                    serde_json::json!({"id": 2, "email": "bob@example.com"}),
                ],
            );
            memory.seed(
                "Post",
                vec![serde_json::json!({
                    "id": 1,
                    "title": "Hello world",
                    "published": true,
                    "author_id": 1,
                    "cover": null
                })],
            );
            Arc::new(memory)
        }
    };

    let upload_dir = std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".into());
    let state = AdminState::new(
        registry,
        store,
        Arc::new(LocalFileStorage::new(upload_dir)),
        RouterOptions {
            base_path: "/admin".into(),
            dev_mode: std::env::var("DEV_MODE").is_ok(),
        },
    );

    let app = axum::Router::new()
        .merge(common_routes())
        .nest("/admin", admin_routes(state));

    let listener = TcpListener::bind("127.0.0.1:3000").await?;
    tracing::info!(
        "example consumer listening on http://{}",
        listener.local_addr()?
    );
    axum::serve(listener, app).await?;
    Ok(())
}

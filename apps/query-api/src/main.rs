// [apps/query-api/src/main.rs]
mod handlers;
mod state;

use anyhow::Result;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use flowmap_domain_metadata::MetadataEditor;
use flowmap_infra_store::{StoreClient, TableNames};
use state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "query-api", version, about = "Read-only HTTP surface over the node/link tables.")]
struct Args {
    #[arg(long, env = "FLOWMAP_SUBSCRIPTION", default_value = "1")]
    subscription: String,

    #[arg(long, env = "FLOWMAP_DATASOURCE", default_value = "1")]
    datasource: String,

    #[arg(long, env = "FLOWMAP_DATABASE_URL", default_value = "flowmap.db")]
    database_url: String,

    #[arg(long, env = "FLOWMAP_AUTH_TOKEN")]
    auth_token: Option<String>,

    #[arg(long, env = "FLOWMAP_LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    listen_addr: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let tables = TableNames::new(&args.subscription, &args.datasource)?;
    let store = StoreClient::connect(&args.database_url, args.auth_token, tables).await?;
    let editor = MetadataEditor::new(store);

    let state = AppState { editor: Arc::new(editor) };

    let router = Router::new()
        .route("/health", get(handlers::health))
        .route("/nodes", get(handlers::get_nodes))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!(addr = %args.listen_addr, "query-api listening");
    let listener = tokio::net::TcpListener::bind(args.listen_addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

pub mod db;
pub mod err;
pub mod models;

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::handler::Handler;
use axum::routing::get;
use axum::{Extension, Json, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::db::{Disconnected, DynStudentStore, MongoStore};
use crate::err::Error;
use crate::models::Student;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let port = env::var("PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(3000);

    let store = match env::var("MONGO_URI") {
        Ok(uri) => connect_store(&uri).await,
        Err(_) => {
            log::error!("MongoDB connection error: MONGO_URI is not set");
            Arc::new(Disconnected) as DynStudentStore
        }
    };

    let app = app(store);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    log::info!("Server running on port {}", port);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

// A failed connection leaves the process serving requests with no working
// data layer; the listing route then fails at query time.
async fn connect_store(uri: &str) -> DynStudentStore {
    match MongoStore::connect(uri).await {
        Ok(store) => {
            let probe = store.clone();
            tokio::spawn(async move {
                match probe.ensure_ready().await {
                    Ok(()) => log::info!("MongoDB connected!"),
                    Err(err) => log::error!("MongoDB connection error: {}", err),
                }
            });
            Arc::new(store)
        }
        Err(err) => {
            log::error!("MongoDB connection error: {}", err);
            Arc::new(Disconnected)
        }
    }
}

fn app(store: DynStudentStore) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    Router::new()
        .route("/", get(hello))
        .route("/api/students", get(list_students))
        .fallback(err::handler404.into_service())
        .layer(cors)
        .layer(Extension(store))
}

async fn hello() -> &'static str {
    "Hello from the Hackathon Backend!"
}

async fn list_students(
    Extension(store): Extension<DynStudentStore>,
) -> Result<Json<Vec<Student>>, Error> {
    let students = store.find_all().await?;
    Ok(Json(students))
}

//! Session demo server.
//!
//! ```text
//! REDIS_ADDRESS=127.0.0.1:6379 cargo run --example counter
//! COFFER_DEMO_BACKEND=memory cargo run --example counter   # no Redis needed
//! ```
//!
//! Then:
//!
//! ```text
//! curl -c jar -b jar 'localhost:8000/s?name=alice'   # {"s":null}
//! curl -c jar -b jar 'localhost:8000/s?name=bob'     # {"s":"alice"}
//! curl -c jar -b jar 'localhost:8000/out'            # {"s":"success"}
//! ```

use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use coffer::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct Hello {
    hello: &'static str,
}

#[derive(Serialize)]
struct Reply {
    s: Option<String>,
}

#[derive(Serialize)]
struct Failure {
    err: String,
}

#[derive(Deserialize)]
struct NameQuery {
    #[serde(default)]
    name: String,
}

type HandlerResult = Result<Json<Reply>, (StatusCode, Json<Failure>)>;

fn failure(e: SessionError) -> (StatusCode, Json<Failure>) {
    tracing::error!(error = %e, "Failed to save session");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(Failure { err: e.to_string() }),
    )
}

async fn hello() -> Json<Hello> {
    Json(Hello { hello: "world" })
}

async fn remember(mut session: Session, Query(query): Query<NameQuery>) -> HandlerResult {
    let previous = session.get("name").and_then(Value::as_str).map(str::to_string);
    session.set("name", query.name);
    session.save().await.map_err(failure)?;
    Ok(Json(Reply { s: previous }))
}

async fn logout(mut session: Session) -> HandlerResult {
    session.clear();
    session.save().await.map_err(failure)?;
    Ok(Json(Reply {
        s: Some("success".to_string()),
    }))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    coffer::coffer_log::init()?;

    let config = SessionConfig::from_env();
    let manager = match std::env::var("COFFER_DEMO_BACKEND").as_deref() {
        Ok("memory") => {
            let pool = RedisPool::new(MemoryServer::new().connector(), config.redis.clone())?;
            SessionManager::with_backend(config, pool)?
        }
        _ => SessionManager::new(config)?,
    };

    let app = Router::new()
        .route("/hello", get(hello))
        .route("/s", get(remember))
        .route("/out", get(logout))
        .layer(SessionLayer::new(manager));

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
    tracing::info!(address = %listener.local_addr()?, "Listening");
    axum::serve(listener, app).await?;
    Ok(())
}

//! MongoDB session store example
//!
//! Session values live in the `sessions` collection as
//! `{ _id, data, modified }` documents; a TTL index on `modified` lets
//! MongoDB remove abandoned sessions on its own.

use chrono::Utc;
use salvo::prelude::*;
use salvo_mongo_session::{
    MongoCollection, MongoStore, SessionDepotExt, SessionHandler, SessionStore, StoreConfig,
    DEFAULT_COLLECTION,
};

type Store = MongoStore<MongoCollection>;

#[handler]
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[handler]
async fn index(req: &mut Request, depot: &mut Depot) -> String {
    let store = depot.session_store::<Store>().expect("Session store not found");
    let (session, _) = store.get(req, "sid").await;
    let mut session = session.write();

    let views: i32 = session.get("views").unwrap_or(0);
    session.set("views", views + 1).expect("views serialize");

    format!("Hello from Rust + MongoDB!\nViews: {}", views + 1)
}

#[handler]
async fn session_info(req: &mut Request, depot: &mut Depot) -> Json<serde_json::Value> {
    let store = depot.session_store::<Store>().expect("Session store not found");
    let (session, error) = store.get(req, "sid").await;
    let session = session.read();

    Json(serde_json::json!({
        "sessionId": session.id,
        "isNew": session.is_new,
        "data": session.values,
        "tokenError": error.map(|e| e.to_string()),
    }))
}

/// Keep the session alive: the TTL clock restarts at the pinned time
#[handler]
async fn touch(req: &mut Request, depot: &mut Depot) -> &'static str {
    let store = depot.session_store::<Store>().expect("Session store not found");
    let (session, _) = store.get(req, "sid").await;
    session
        .write()
        .pin_modified(Utc::now())
        .expect("modified serialize");
    "touched"
}

#[handler]
async fn logout(req: &mut Request, depot: &mut Depot) -> &'static str {
    let store = depot.session_store::<Store>().expect("Session store not found");
    let (session, _) = store.get(req, "sid").await;
    session.write().expire();
    "Logged out"
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let mongo_url =
        std::env::var("MONGODB_URL").unwrap_or_else(|_| "mongodb://127.0.0.1:27017".to_string());
    println!("Connecting to MongoDB at {}", mongo_url);

    let coll = MongoCollection::from_url(&mongo_url, "salvo_sessions", DEFAULT_COLLECTION)
        .await
        .expect("Failed to connect to MongoDB");

    let secret = std::env::var("SESSION_SECRET")
        .unwrap_or_else(|_| "change-me-change-me-change-me-32".to_string());
    let config = StoreConfig::new(secret)
        .with_max_age(86400)
        .with_ttl_index(true)
        .with_http_only(true);
    let store = MongoStore::from_config(coll, config)
        .await
        .expect("Failed to create session store");

    let router = Router::new()
        .push(Router::with_path("health").get(health))
        .push(
            Router::new()
                .hoop(SessionHandler::new(store))
                .get(index)
                .push(Router::with_path("session").get(session_info))
                .push(Router::with_path("touch").get(touch))
                .push(Router::with_path("logout").get(logout)),
        );

    let port = std::env::var("PORT").unwrap_or_else(|_| "5800".to_string());
    let addr = format!("127.0.0.1:{}", port);

    let acceptor = TcpListener::new(addr.clone()).bind().await;
    println!("Server running at http://{}", addr);
    println!("  GET /health  - Health check (no session)");
    println!("  GET /        - View counter");
    println!("  GET /session - Session info");
    println!("  GET /touch   - Pin the modified time");
    println!("  GET /logout  - Delete session");

    Server::new(acceptor).serve(router).await;
}

//! Basic example using the in-memory collection

use salvo::prelude::*;
use salvo_mongo_session::{
    MemoryCollection, MongoStore, SameSite, SessionDepotExt, SessionHandler, SessionStore,
    StoreConfig,
};

type Store = MongoStore<MemoryCollection>;

const SESSION_NAME: &str = "sid";

#[handler]
async fn index(req: &mut Request, depot: &mut Depot) -> String {
    let store = depot.session_store::<Store>().expect("Session store not found");
    let (session, _) = store.get(req, SESSION_NAME).await;
    let mut session = session.write();

    // Get current view count
    let views: i32 = session.get("views").unwrap_or(0);
    session.set("views", views + 1).expect("views serialize");

    format!(
        "Hello! You have viewed this page {} time(s).\nSession ID: {}",
        views + 1,
        if session.id.is_empty() { "(assigned on save)" } else { session.id.as_str() }
    )
}

#[handler]
async fn get_user(req: &mut Request, depot: &mut Depot) -> String {
    let store = depot.session_store::<Store>().expect("Session store not found");
    let (session, error) = store.get(req, SESSION_NAME).await;
    if let Some(e) = error {
        tracing::warn!("session token rejected: {}", e);
    }

    let msg = match session.read().get::<String>("user") {
        Some(user) => format!("Logged in as: {}", user),
        None => "Not logged in".to_string(),
    };
    msg
}

#[handler]
async fn login(req: &mut Request, depot: &mut Depot) -> String {
    let store = depot.session_store::<Store>().expect("Session store not found");
    let username = req.query::<String>("name").unwrap_or_else(|| "anonymous".to_string());

    let (session, _) = store.get(req, SESSION_NAME).await;
    session.write().set("user", &username).expect("user serialize");

    format!("User set to: {}", username)
}

#[handler]
async fn logout(req: &mut Request, depot: &mut Depot) -> &'static str {
    let store = depot.session_store::<Store>().expect("Session store not found");
    let (session, _) = store.get(req, SESSION_NAME).await;

    // Deletes the record and clears the cookie when the handler saves
    session.write().expire();

    "Logged out successfully"
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = StoreConfig::new("your-super-secret-key-change-in-production")
        .with_max_age(3600)
        .with_ttl_index(true)
        .with_http_only(true)
        .with_same_site(SameSite::Lax);
    let store = MongoStore::from_config(MemoryCollection::new(), config)
        .await
        .expect("Failed to create session store");

    let router = Router::new()
        .hoop(SessionHandler::new(store))
        .get(index)
        .push(Router::with_path("user").get(get_user))
        .push(Router::with_path("login").get(login))
        .push(Router::with_path("logout").get(logout));

    let acceptor = TcpListener::new("127.0.0.1:5800").bind().await;
    println!("Server running at http://127.0.0.1:5800");
    println!("Try these endpoints:");
    println!("  GET /                 - View counter");
    println!("  GET /user             - Get current user");
    println!("  GET /login?name=alice - Set user");
    println!("  GET /logout           - Delete session");

    Server::new(acceptor).serve(router).await;
}

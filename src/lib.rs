//! # salvo-mongo-session
//!
//! Server-side session store for the Salvo web framework, backed by a
//! MongoDB collection.
//!
//! Session values never leave the server: each session is a document
//! `{ _id, data, modified }`, and the client only holds a cookie carrying the
//! session id, authenticated (and optionally encrypted) under the session name.
//!
//! ## Features
//!
//! - **Authenticated cookies with key rotation**: HMAC-SHA256 bound to the session name,
//!   optional encryption, the first key pair encodes and every pair decodes
//! - **Opaque ids**: 32 random bytes in unpadded base32
//! - **Database-side expiry**: optional TTL index on `modified`, with a way to pin it
//! - **Pluggable transports**: cookies by default, or a header such as `Authorization: Bearer`
//! - **Pluggable collections**: MongoDB, in-memory, or custom gateways
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use salvo::prelude::*;
//! use salvo_mongo_session::{
//!     MongoCollection, MongoStore, SessionDepotExt, SessionHandler, SessionStore,
//! };
//!
//! type Store = MongoStore<MongoCollection>;
//!
//! #[handler]
//! async fn index(req: &mut Request, depot: &mut Depot) -> String {
//!     let store = depot.session_store::<Store>().unwrap();
//!     let (session, _) = store.get(req, "sid").await;
//!     let mut session = session.write();
//!     let views: i32 = session.get("views").unwrap_or(0);
//!     session.set("views", views + 1).unwrap();
//!     format!("views: {}", views + 1)
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let coll = MongoCollection::from_url("mongodb://127.0.0.1:27017", "app", "sessions")
//!         .await
//!         .unwrap();
//!     let store = MongoStore::new(coll, 86400, true, &[b"your-hash-key"]).await.unwrap();
//!
//!     let router = Router::new().hoop(SessionHandler::new(store)).get(index);
//!     let acceptor = TcpListener::new("127.0.0.1:5800").bind().await;
//!     Server::new(acceptor).serve(router).await;
//! }
//! ```

pub mod codec;
pub mod collection;
pub mod config;
pub mod error;
pub mod handler;
pub mod registry;
pub mod session;
pub mod store;
pub mod token;

pub use codec::{Codec, CodecSet, SecureCookie};
pub use collection::{MemoryCollection, SessionCollection, SessionDocument, TtlIndex};
pub use config::{SameSite, SessionOptions, StoreConfig};
pub use error::SessionError;
pub use handler::SessionHandler;
pub use registry::Registry;
pub use session::{generate_session_id, Session, SharedSession, MODIFIED_KEY};
pub use store::{MongoStore, SessionStore};
pub use token::{CookieToken, HeaderToken, TokenCarrier};

#[cfg(feature = "mongodb-store")]
pub use collection::{MongoCollection, DEFAULT_COLLECTION};

/// Extension trait for Depot to easily access the store
pub mod depot_ext;
pub use depot_ext::SessionDepotExt;

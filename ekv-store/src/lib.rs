//! # EdgeKV Store
//!
//! An edge-style key-value API (`put` with expiration, typed `get`,
//! cursor-paginated `list`, `get_ttl`, `delete`, `ping`) translated onto a
//! RESP backing store.
//!
//! ```ignore
//! use ekv_client::{ClientConfig, Connection};
//! use ekv_store::{KvNamespace, ListOptions, PutOptions, ValueKind};
//!
//! let conn = Connection::connect(&ClientConfig::from_url("redis://127.0.0.1:6379")?).await?;
//! let kv = KvNamespace::new(conn);
//!
//! kv.put("user:1", r#"{"name":"ada"}"#, PutOptions::ttl(3600)).await?;
//! let user = kv.get("user:1", ValueKind::Json).await?;
//!
//! let page = kv.list(ListOptions::default().with_prefix("user:").with_limit(100)).await?;
//! if !page.list_complete {
//!     let next = kv.list(ListOptions::default().with_prefix("user:").with_cursor(page.cursor)).await?;
//! }
//! ```

pub mod expiry;
pub mod listing;
pub mod namespace;
pub mod value;

pub use expiry::{ExpiryPlan, PutOptions};
pub use listing::{
    CURSOR_START, DEFAULT_LIST_LIMIT, KeyInfo, ListOptions, ListPage, PendingKey, TtlLookup,
};
pub use namespace::KvNamespace;
pub use value::{KvValue, ValueKind, ValueStream};

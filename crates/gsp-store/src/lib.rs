//! Durable Store (C1): batches, orders, products and the per-order audit
//! log. Backed by Postgres in production; an in-memory fake is provided
//! for tests.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{NewOrder, NewProduct, Store};

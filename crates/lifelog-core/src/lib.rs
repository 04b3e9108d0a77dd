//! Core types and the aggregation engine for the lifelog store.
//!
//! This crate is deliberately free of database dependencies. Storage backends
//! implement [`store::LifeStore`]; everything else here is pure computation
//! over snapshots read from a store.

// Store traits use native `async fn`; the `Send` bound advisory does not apply.
#![allow(async_fn_in_trait)]

pub mod aggregate;
pub mod alias;
pub mod category;
pub mod counter;
pub mod error;
pub mod record;
pub mod recorder;
pub mod sleep;
pub mod store;
pub mod table;
pub mod time;

pub use error::{Error, Result};

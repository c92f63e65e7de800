//! Abstract data store consumed by the dispatcher, plus the shipped
//! adapters. Every adapter reports failures through [`StoreError`] so the
//! dispatcher can classify them uniformly.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::payload::{FormattedPayload, RecordId};
use crate::request::ListQuery;
use crate::schema::Resource;
use async_trait::async_trait;
use thiserror::Error;

/// One record as the store returns it: a JSON object keyed by column name.
pub type Row = serde_json::Value;

#[derive(Clone, Debug)]
pub struct ListPage {
    pub rows: Vec<Row>,
    pub total: u64,
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// The targeted record does not exist (delete/update of a missing row).
    #[error("record not found")]
    NotFound,
    /// The store rejected the operation: uniqueness, foreign key, bad data.
    #[error("constraint violated: {0}")]
    Constraint(String),
    /// Infrastructure failure; fatal for the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Recoverable errors render as an error message; the rest abort the
    /// request.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, StoreError::Unavailable(_))
    }
}

#[async_trait]
pub trait DataStore: Send + Sync {
    async fn find(&self, resource: &Resource, query: &ListQuery) -> Result<ListPage, StoreError>;

    async fn find_by_id(
        &self,
        resource: &Resource,
        id: &RecordId,
    ) -> Result<Option<Row>, StoreError>;

    /// Insert a new record and return it, identifier included.
    async fn insert(
        &self,
        resource: &Resource,
        payload: &FormattedPayload,
    ) -> Result<Row, StoreError>;

    /// Mutate the record matching the identifier. Ok(None) when no row
    /// matches.
    async fn update(
        &self,
        resource: &Resource,
        id: &RecordId,
        payload: &FormattedPayload,
    ) -> Result<Option<Row>, StoreError>;

    /// Remove one record; Err(NotFound) when the row no longer exists.
    async fn remove(&self, resource: &Resource, id: &RecordId) -> Result<Row, StoreError>;

    /// Remove all matching records in one batched operation, returning the
    /// number removed. Identifiers with no matching row are skipped.
    async fn remove_many(&self, resource: &Resource, ids: &[RecordId])
        -> Result<u64, StoreError>;
}

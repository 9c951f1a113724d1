pub mod connection;
pub mod migrations;
pub mod repositories;
pub mod store;

pub use connection::{connect, connect_with_settings, DbPool};
pub use repositories::{
    EventRepository, InMemoryEventRepository, InMemoryRuleRepository, RepositoryError,
    RuleRepository, SqlEventRepository, SqlRuleRepository,
};
pub use store::{
    DeltaKind, Document, DocumentDelta, DocumentStore, Filter, FilterOp, InMemoryDocumentStore,
    SqlDocumentStore, StoreError, SERVER_TIMESTAMP,
};

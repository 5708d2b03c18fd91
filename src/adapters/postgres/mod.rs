//! PostgreSQL adapters implementing the persistence ports.

mod event_store;
mod invoice_repository;
mod profile_repository;
mod subscription_repository;

pub use event_store::PostgresEventStore;
pub use invoice_repository::PostgresInvoiceRepository;
pub use profile_repository::PostgresProfileRepository;
pub use subscription_repository::PostgresSubscriptionRepository;

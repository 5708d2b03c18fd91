//! Ports: trait boundaries between the application layer and adapters.

mod event_store;
mod invoice_repository;
mod profile_repository;
mod subscription_repository;

pub use event_store::{EventStore, InsertOutcome, NewEvent};
pub use invoice_repository::InvoiceRepository;
pub use profile_repository::ProfileRepository;
pub use subscription_repository::SubscriptionRepository;

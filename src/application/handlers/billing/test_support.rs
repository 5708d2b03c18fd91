//! In-memory port implementations for handler tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::domain::billing::{InvoiceSnapshot, StoredEvent, Subscription, SubscriptionChange};
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{
    EventStore, InsertOutcome, InvoiceRepository, NewEvent, ProfileRepository,
    SubscriptionRepository,
};

pub struct EventRow {
    pub event: StoredEvent,
    pub digest: String,
    pub error_detail: Option<String>,
}

#[derive(Default)]
pub struct InMemoryEventStore {
    pub rows: Mutex<Vec<EventRow>>,
    next_id: AtomicI64,
}

impl InMemoryEventStore {
    pub fn status_of(&self, id: i64) -> Option<String> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.event.id == id)
            .map(|r| r.event.status.clone())
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn find_by_provider_event_id(
        &self,
        provider_event_id: &str,
    ) -> Result<Option<StoredEvent>, DomainError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.event.provider_event_id.as_deref() == Some(provider_event_id))
            .map(|r| r.event.clone()))
    }

    async fn insert(&self, event: NewEvent) -> Result<InsertOutcome, DomainError> {
        // The lock stands in for the unique constraint: of two concurrent
        // inserts with the same digest, exactly one wins.
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|r| r.digest == event.digest) {
            return Ok(InsertOutcome::DuplicateDigest);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        rows.push(EventRow {
            event: StoredEvent {
                id,
                provider_event_id: event.provider_event_id,
                event_type: event.event_type,
                payload: event.payload,
                status: "received".to_string(),
            },
            digest: event.digest,
            error_detail: None,
        });
        Ok(InsertOutcome::Inserted(id))
    }

    async fn mark_processed(&self, id: i64) -> Result<(), DomainError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|r| r.event.id == id)
            .ok_or_else(|| DomainError::new(ErrorCode::EventNotFound, "no such event"))?;
        row.event.status = "processed".to_string();
        Ok(())
    }

    async fn mark_error(&self, id: i64, detail: &str) -> Result<(), DomainError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|r| r.event.id == id)
            .ok_or_else(|| DomainError::new(ErrorCode::EventNotFound, "no such event"))?;
        row.event.status = "error".to_string();
        row.error_detail = Some(detail.to_string());
        Ok(())
    }

    async fn load(&self, id: i64) -> Result<Option<StoredEvent>, DomainError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.event.id == id)
            .map(|r| r.event.clone()))
    }
}

#[derive(Default)]
pub struct InMemorySubscriptionRepo {
    pub rows: Mutex<Vec<Subscription>>,
    clock: AtomicI64,
}

impl InMemorySubscriptionRepo {
    // Monotonic timestamps so "latest by updated_at" is deterministic.
    fn tick(&self) -> DateTime<Utc> {
        let n = self.clock.fetch_add(1, Ordering::SeqCst);
        Utc.timestamp_opt(1_700_000_000 + n, 0).single().unwrap()
    }

    fn apply(&self, row: &mut Subscription, change: &SubscriptionChange) {
        if let Some(user_id) = &change.user_id {
            row.user_id = Some(user_id.clone());
        }
        if let Some(sid) = &change.patch.subscription_id {
            row.subscription_id = Some(sid.clone());
        }
        if let Some(cid) = &change.patch.customer_id {
            row.customer_id = Some(cid.clone());
        }
        if let Some(plan) = change.patch.plan {
            row.plan = Some(plan.as_str().to_string());
        }
        if let Some(status) = &change.patch.status {
            row.status = Some(status.clone());
        }
        if let Some(period_end) = change.patch.current_period_end {
            row.current_period_end = Some(period_end);
        }
        if let Some(at) = change.cancellation.requested_at {
            row.cancellation_requested_at = Some(at);
        }
        if let Some(mode) = &change.cancellation.mode {
            row.cancellation_mode = Some(mode.clone());
        }
        if let Some(at) = change.cancellation.effective_at {
            row.cancellation_effective_at = Some(at);
        }
        row.updated_at = self.tick();
    }

    fn fresh_row(&self, change: &SubscriptionChange) -> Subscription {
        let mut row = Subscription {
            id: Uuid::new_v4(),
            user_id: None,
            subscription_id: None,
            customer_id: None,
            plan: None,
            status: None,
            current_period_end: None,
            cancellation_requested_at: None,
            cancellation_mode: None,
            cancellation_effective_at: None,
            updated_at: self.tick(),
        };
        self.apply(&mut row, change);
        row
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepo {
    async fn upsert_by_subscription_id(
        &self,
        change: &SubscriptionChange,
    ) -> Result<Uuid, DomainError> {
        let sid = change.patch.subscription_id.clone().ok_or_else(|| {
            DomainError::new(ErrorCode::ValidationFailed, "missing subscription id")
        })?;
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows
            .iter_mut()
            .find(|r| r.subscription_id.as_deref() == Some(sid.as_str()))
        {
            self.apply(row, change);
            return Ok(row.id);
        }
        let row = self.fresh_row(change);
        let id = row.id;
        rows.push(row);
        Ok(id)
    }

    async fn find_id_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Uuid>, DomainError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.subscription_id.as_deref() == Some(subscription_id))
            .map(|r| r.id))
    }

    async fn find_id_by_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<Uuid>, DomainError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.customer_id.as_deref() == Some(customer_id))
            .map(|r| r.id))
    }

    async fn find_latest_id_by_user_id(&self, user_id: &str) -> Result<Option<Uuid>, DomainError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id.as_deref() == Some(user_id))
            .max_by_key(|r| r.updated_at)
            .map(|r| r.id))
    }

    async fn update_by_id(&self, id: Uuid, change: &SubscriptionChange) -> Result<(), DomainError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| DomainError::new(ErrorCode::SubscriptionNotFound, "no such row"))?;
        self.apply(row, change);
        Ok(())
    }

    async fn insert(&self, change: &SubscriptionChange) -> Result<Uuid, DomainError> {
        let row = self.fresh_row(change);
        let id = row.id;
        self.rows.lock().unwrap().push(row);
        Ok(id)
    }

    async fn find_latest_for_user(
        &self,
        user_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id.as_deref() == Some(user_id))
            .max_by_key(|r| r.updated_at)
            .cloned())
    }
}

/// Repository that refuses every call, for failure-path tests.
#[derive(Default)]
pub struct FailingSubscriptionRepo;

#[async_trait]
impl SubscriptionRepository for FailingSubscriptionRepo {
    async fn upsert_by_subscription_id(
        &self,
        _change: &SubscriptionChange,
    ) -> Result<Uuid, DomainError> {
        Err(DomainError::database("simulated outage"))
    }

    async fn find_id_by_subscription_id(
        &self,
        _subscription_id: &str,
    ) -> Result<Option<Uuid>, DomainError> {
        Err(DomainError::database("simulated outage"))
    }

    async fn find_id_by_customer_id(
        &self,
        _customer_id: &str,
    ) -> Result<Option<Uuid>, DomainError> {
        Err(DomainError::database("simulated outage"))
    }

    async fn find_latest_id_by_user_id(
        &self,
        _user_id: &str,
    ) -> Result<Option<Uuid>, DomainError> {
        Err(DomainError::database("simulated outage"))
    }

    async fn update_by_id(
        &self,
        _id: Uuid,
        _change: &SubscriptionChange,
    ) -> Result<(), DomainError> {
        Err(DomainError::database("simulated outage"))
    }

    async fn insert(&self, _change: &SubscriptionChange) -> Result<Uuid, DomainError> {
        Err(DomainError::database("simulated outage"))
    }

    async fn find_latest_for_user(
        &self,
        _user_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        Err(DomainError::database("simulated outage"))
    }
}

#[derive(Default)]
pub struct InMemoryProfileRepo {
    pub emails: Mutex<HashMap<String, String>>,
    pub users: Mutex<HashSet<String>>,
    pub plans: Mutex<HashMap<String, (String, Option<DateTime<Utc>>)>>,
}

impl InMemoryProfileRepo {
    pub fn with_user(self, email: &str, user_id: &str) -> Self {
        self.emails
            .lock()
            .unwrap()
            .insert(email.to_ascii_lowercase(), user_id.to_string());
        self.users.lock().unwrap().insert(user_id.to_string());
        self
    }

    /// Registers a profile row that has no email mapping.
    pub fn with_profile(self, user_id: &str) -> Self {
        self.users.lock().unwrap().insert(user_id.to_string());
        self
    }

    pub fn plan_of(&self, user_id: &str) -> Option<String> {
        self.plans
            .lock()
            .unwrap()
            .get(user_id)
            .map(|(plan, _)| plan.clone())
    }
}

#[async_trait]
impl ProfileRepository for InMemoryProfileRepo {
    async fn find_user_id_by_email(&self, email: &str) -> Result<Option<String>, DomainError> {
        Ok(self
            .emails
            .lock()
            .unwrap()
            .get(&email.to_ascii_lowercase())
            .cloned())
    }

    async fn set_plan(
        &self,
        user_id: &str,
        plan: &str,
        plan_expires: Option<DateTime<Utc>>,
    ) -> Result<bool, DomainError> {
        // An update against a missing profile row matches nothing.
        if !self.users.lock().unwrap().contains(user_id) {
            return Ok(false);
        }
        self.plans
            .lock()
            .unwrap()
            .insert(user_id.to_string(), (plan.to_string(), plan_expires));
        Ok(true)
    }
}

#[derive(Default)]
pub struct InMemoryInvoiceRepo {
    pub rows: Mutex<HashMap<String, InvoiceSnapshot>>,
    pub fail: AtomicBool,
}

impl InMemoryInvoiceRepo {
    pub fn failing(self) -> Self {
        self.fail.store(true, Ordering::SeqCst);
        self
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl InvoiceRepository for InMemoryInvoiceRepo {
    async fn upsert(&self, snapshot: &InvoiceSnapshot) -> Result<(), DomainError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DomainError::database("simulated invoice failure"));
        }
        self.rows
            .lock()
            .unwrap()
            .insert(snapshot.invoice_id.clone(), snapshot.clone());
        Ok(())
    }
}

//! CRM lookup collaborator.
//!
//! Supplies customer-data enrichment for routing context, keyed by phone
//! number. A lookup failure must degrade to routing without enrichment;
//! the facade logs it and carries on, it never aborts an evaluation.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::attributes::AttributeBag;
use crate::error::Result;

/// Customer-data lookup keyed by phone number.
#[async_trait]
pub trait CrmLookup: Send + Sync {
    async fn lookup_by_phone(&self, phone_number: &str) -> Result<Option<AttributeBag>>;
}

/// CRM that knows nobody. The default when no CRM is wired in.
pub struct NullCrm;

#[async_trait]
impl CrmLookup for NullCrm {
    async fn lookup_by_phone(&self, _phone_number: &str) -> Result<Option<AttributeBag>> {
        Ok(None)
    }
}

/// Fixed in-memory CRM records, for tests and standalone deployments.
#[derive(Default)]
pub struct StaticCrm {
    records: DashMap<String, AttributeBag>,
}

impl StaticCrm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, phone_number: impl Into<String>, data: AttributeBag) {
        self.records.insert(phone_number.into(), data);
    }
}

#[async_trait]
impl CrmLookup for StaticCrm {
    async fn lookup_by_phone(&self, phone_number: &str) -> Result<Option<AttributeBag>> {
        Ok(self
            .records
            .get(phone_number)
            .map(|entry| entry.value().clone()))
    }
}

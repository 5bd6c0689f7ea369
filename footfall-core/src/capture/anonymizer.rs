//! Event anonymization and persistence.
//!
//! Raw events carry the client address and user agent only for the few
//! seconds they sit in the capture buffer. At flush time this module folds
//! them into a salted pseudonymous id and a coarse device type; nothing
//! identifying reaches storage.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::capture::batcher::BatchSink;
use crate::capture::salt::SaltService;
use crate::db::Database;
use crate::error::Result;
use crate::types::{AnonymizedRecord, DeviceType, RawEvent};

/// Turns raw request events into anonymized records and writes them.
pub struct Anonymizer {
    db: Arc<Database>,
    salt: Arc<SaltService>,
}

impl Anonymizer {
    pub fn new(db: Arc<Database>, salt: Arc<SaltService>) -> Self {
        Self { db, salt }
    }

    /// Salted hash of address and user agent. Stable within one salt
    /// rotation period, unlinkable across periods.
    fn pseudonymous_id(client_address: &str, user_agent: &str, salt: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(client_address.as_bytes());
        hasher.update(user_agent.as_bytes());
        hasher.update(salt.as_bytes());
        let result = hasher.finalize();
        hex::encode(result)
    }

    /// Anonymize a batch under a single salt lookup.
    ///
    /// A salt store failure fails the whole batch so the caller can retry it;
    /// no event is ever written un-anonymized.
    pub fn anonymize(&self, events: &[RawEvent]) -> Result<Vec<AnonymizedRecord>> {
        let salt = self.salt.current_salt()?;

        Ok(events
            .iter()
            .map(|event| AnonymizedRecord {
                id: 0,
                pseudonymous_id: Self::pseudonymous_id(
                    &event.client_address,
                    &event.user_agent,
                    &salt,
                ),
                device_type: DeviceType::from_user_agent(&event.user_agent),
                channel_token: event.channel_token.clone(),
                created_at: event.received_at,
            })
            .collect())
    }
}

impl BatchSink for Anonymizer {
    fn persist(&self, batch: &[RawEvent]) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        let records = self.anonymize(batch)?;
        self.db.insert_records(&records)
    }
}

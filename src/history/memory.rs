// ABOUTME: Bounded in-memory history sink
// ABOUTME: Keeps the most recent records in a ring, evicting the oldest past the retention limit

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::{HistoryQuery, HistoryRecord, HistorySink, Result};

pub struct InMemoryHistory {
    records: RwLock<VecDeque<HistoryRecord>>,
    retention_limit: usize,
}

impl InMemoryHistory {
    pub fn new(retention_limit: usize) -> Self {
        Self {
            records: RwLock::new(VecDeque::new()),
            retention_limit: retention_limit.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl Default for InMemoryHistory {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl HistorySink for InMemoryHistory {
    async fn append(&self, record: HistoryRecord) -> Result<()> {
        let mut records = self.records.write();
        records.push_back(record);
        while records.len() > self.retention_limit {
            records.pop_front();
        }
        debug!(count = records.len(), "history record appended");
        Ok(())
    }

    async fn query(&self, query: &HistoryQuery) -> Result<Vec<HistoryRecord>> {
        let records = self.records.read();
        Ok(records
            .iter()
            .rev()
            .filter(|r| query.matches(r))
            .take(query.effective_limit())
            .cloned()
            .collect())
    }
}

use snip_core::{
    AddOutcome, DeleteOutcome, DeleteRequest, Result, ShortCode, Stats, StorageError, UrlRecord,
};
use std::collections::HashMap;

/// The three cross-referenced indices over one set of records.
///
/// `by_code` owns the records; `by_owner` and `by_url` refer to them by code.
/// Callers hold their own lock around every method so that no reader ever
/// sees the maps out of step.
#[derive(Debug, Default)]
pub(crate) struct UrlIndex {
    by_code: HashMap<ShortCode, UrlRecord>,
    by_owner: HashMap<String, Vec<ShortCode>>,
    by_url: HashMap<String, ShortCode>,
}

impl UrlIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the indices from previously persisted records.
    pub(crate) fn from_records(records: impl IntoIterator<Item = UrlRecord>) -> Result<Self> {
        let mut index = Self::new();
        for record in records {
            let code = record.code.clone();
            if let AddOutcome::Duplicate(existing) = index.insert(record)? {
                return Err(StorageError::InvalidData(format!(
                    "records {existing} and {code} share the same url"
                )));
            }
        }
        Ok(index)
    }

    pub(crate) fn get(&self, code: &ShortCode) -> Option<&UrlRecord> {
        self.by_code.get(code)
    }

    pub(crate) fn by_owner(&self, owner: &str) -> Vec<UrlRecord> {
        self.by_owner
            .get(owner)
            .map(|codes| {
                codes
                    .iter()
                    .filter_map(|code| self.by_code.get(code).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn insert(&mut self, record: UrlRecord) -> Result<AddOutcome> {
        if let Some(existing) = self.by_url.get(&record.original_url) {
            return Ok(AddOutcome::Duplicate(existing.clone()));
        }
        if self.by_code.contains_key(&record.code) {
            return Err(StorageError::Conflict(record.code.to_string()));
        }

        let code = record.code.clone();
        self.by_url
            .insert(record.original_url.clone(), code.clone());
        self.by_owner
            .entry(record.owner.clone())
            .or_default()
            .push(code.clone());
        self.by_code.insert(code.clone(), record);
        Ok(AddOutcome::Inserted(code))
    }

    /// Inserts every record or none of them.
    pub(crate) fn insert_batch(&mut self, records: Vec<UrlRecord>) -> Result<Vec<AddOutcome>> {
        let mut outcomes = Vec::with_capacity(records.len());
        let mut inserted = Vec::new();

        for record in records {
            match self.insert(record) {
                Ok(outcome) => {
                    if let AddOutcome::Inserted(code) = &outcome {
                        inserted.push(code.clone());
                    }
                    outcomes.push(outcome);
                }
                Err(err) => {
                    for code in inserted.iter().rev() {
                        self.forget(code);
                    }
                    return Err(err);
                }
            }
        }

        Ok(outcomes)
    }

    pub(crate) fn tombstone(&mut self, items: &[DeleteRequest]) -> DeleteOutcome {
        let flags = items
            .iter()
            .map(|item| match self.by_code.get_mut(&item.code) {
                Some(record) if record.owner == item.owner && !record.deleted => {
                    record.deleted = true;
                    true
                }
                _ => false,
            })
            .collect();
        DeleteOutcome::new(flags)
    }

    pub(crate) fn stats(&self) -> Stats {
        Stats {
            urls: self.by_code.len() as u64,
            users: self.by_owner.len() as u64,
        }
    }

    /// All records, ordered by code.
    pub(crate) fn records(&self) -> Vec<&UrlRecord> {
        let mut records: Vec<_> = self.by_code.values().collect();
        records.sort_by(|a, b| a.code.cmp(&b.code));
        records
    }

    pub(crate) fn len(&self) -> usize {
        self.by_code.len()
    }

    pub(crate) fn clear(&mut self) {
        self.by_code.clear();
        self.by_owner.clear();
        self.by_url.clear();
    }

    fn forget(&mut self, code: &ShortCode) {
        let Some(record) = self.by_code.remove(code) else {
            return;
        };
        self.by_url.remove(&record.original_url);
        if let Some(codes) = self.by_owner.get_mut(&record.owner) {
            if let Some(pos) = codes.iter().rposition(|c| c == code) {
                codes.remove(pos);
            }
            if codes.is_empty() {
                self.by_owner.remove(&record.owner);
            }
        }
    }
}

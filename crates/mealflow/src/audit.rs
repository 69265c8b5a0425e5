//! Append-only audit trail.
//!
//! Every state change writes exactly one [`AuditEntry`] in the same storage
//! unit as the change itself. Partial cancellations also write an entry,
//! recording the unchanged state and the dates cancelled. The trail is the
//! only reconstructible history of a request: [`AuditTrail::replay`] folds it
//! back into the current state.

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::actor::Actor;
use crate::definition::{Action, State};
use crate::error::{Error, Result};
use crate::subject::SubjectId;

/// One recorded state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub subject_id: SubjectId,
    /// 1-based position in the subject's trail.
    pub sequence: u64,
    pub actor: Actor,
    pub action: Action,
    pub justification: Option<String>,
    /// Yes/no answer given by the vendor to a CODAE question.
    pub vendor_answer: Option<bool>,
    /// Dates cancelled by this operation, if any.
    #[serde(default)]
    pub cancelled_dates: Vec<Date>,
    pub timestamp: OffsetDateTime,
    pub from_state: State,
    pub resulting_state: State,
}

/// Ordered audit entries of one subject.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditTrail {
    entries: Vec<AuditEntry>,
}

impl AuditTrail {
    /// Rebuild a trail from stored entries, ordered by sequence.
    pub fn from_entries(mut entries: Vec<AuditEntry>) -> Self {
        entries.sort_by_key(|e| e.sequence);
        Self { entries }
    }

    /// Sequence number the next entry must carry.
    pub fn next_sequence(&self) -> u64 {
        self.entries.last().map_or(1, |e| e.sequence + 1)
    }

    /// Append an entry. Entries are never edited or removed.
    pub fn append(&mut self, entry: AuditEntry) -> Result<()> {
        let expected = self.next_sequence();
        if entry.sequence != expected {
            return Err(Error::AuditWriteFailure(format!(
                "out of order entry for {}: got sequence {}, expected {expected}",
                entry.subject_id, entry.sequence
            )));
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn last(&self) -> Option<&AuditEntry> {
        self.entries.last()
    }

    /// Most recent entry that moved the subject to a different state.
    ///
    /// Partial cancellations record `from_state == resulting_state` and are
    /// skipped.
    pub fn last_state_change(&self) -> Option<&AuditEntry> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.from_state != e.resulting_state)
    }

    /// All entries, oldest first.
    pub fn all(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reconstruct the current state by folding the trail from `initial`.
    ///
    /// Fails if a sequence number is skipped or an entry does not start
    /// where the previous one ended.
    pub fn replay(&self, initial: State) -> Result<State> {
        self.entries
            .iter()
            .enumerate()
            .try_fold(initial, |state, (i, entry)| {
                let expected = i as u64 + 1;
                if entry.sequence != expected {
                    return Err(Error::AuditWriteFailure(format!(
                        "gap in trail of {}: sequence {} where {expected} was expected",
                        entry.subject_id, entry.sequence
                    )));
                }
                if entry.from_state != state {
                    return Err(Error::AuditWriteFailure(format!(
                        "entry {} of {} starts at {} but the trail was at {state}",
                        entry.sequence, entry.subject_id, entry.from_state
                    )));
                }
                Ok(entry.resulting_state)
            })
    }
}

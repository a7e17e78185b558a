use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use wd_core::types::{AgentId, ExecApproval};

// ---------------------------------------------------------------------------
// PendingApprovalState
// ---------------------------------------------------------------------------

/// Local mirror of every approval still awaiting a decision.
///
/// Approvals bound to a known agent live in that agent's ordered list;
/// approvals not yet bound to one live in the unscoped list. An approval id
/// occupies at most one slot across both collections: upserting an id that
/// already sits elsewhere evicts the old copy first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PendingApprovalState {
    scoped: HashMap<AgentId, Vec<ExecApproval>>,
    unscoped: Vec<ExecApproval>,
}

impl PendingApprovalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove the approval with `id` from wherever it currently sits.
    pub fn remove(&mut self, id: &str) -> Option<ExecApproval> {
        for list in self.scoped.values_mut() {
            if let Some(pos) = list.iter().position(|a| a.id == id) {
                let removed = list.remove(pos);
                self.scoped.retain(|_, l| !l.is_empty());
                return Some(removed);
            }
        }
        self.unscoped
            .iter()
            .position(|a| a.id == id)
            .map(|pos| self.unscoped.remove(pos))
    }

    /// Insert-or-replace into `agent_id`'s list. A replacement keeps its
    /// position; a new entry is appended.
    pub fn upsert_scoped(&mut self, agent_id: &str, approval: ExecApproval) {
        if let Some(list) = self.scoped.get_mut(agent_id) {
            if let Some(slot) = list.iter_mut().find(|a| a.id == approval.id) {
                *slot = approval;
                return;
            }
        }
        self.remove(&approval.id);
        self.scoped
            .entry(agent_id.to_string())
            .or_default()
            .push(approval);
    }

    /// Insert-or-replace into the unscoped list.
    pub fn upsert_unscoped(&mut self, approval: ExecApproval) {
        if let Some(slot) = self.unscoped.iter_mut().find(|a| a.id == approval.id) {
            *slot = approval;
            return;
        }
        self.remove(&approval.id);
        self.unscoped.push(approval);
    }

    pub fn get(&self, id: &str) -> Option<&ExecApproval> {
        self.iter().find(|a| a.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ExecApproval> {
        for list in self.scoped.values_mut() {
            if let Some(a) = list.iter_mut().find(|a| a.id == id) {
                return Some(a);
            }
        }
        self.unscoped.iter_mut().find(|a| a.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Pending approvals scoped to `agent_id`, oldest first.
    pub fn scoped(&self, agent_id: &str) -> &[ExecApproval] {
        self.scoped
            .get(agent_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn unscoped(&self) -> &[ExecApproval] {
        &self.unscoped
    }

    /// True when `agent_id` has a scoped approval other than `excluding_id`.
    pub fn has_other_scoped(&self, agent_id: &str, excluding_id: &str) -> bool {
        self.scoped(agent_id).iter().any(|a| a.id != excluding_id)
    }

    /// All pending approvals, scoped lists first, then unscoped.
    pub fn iter(&self) -> impl Iterator<Item = &ExecApproval> {
        self.scoped
            .values()
            .flat_map(|l| l.iter())
            .chain(self.unscoped.iter())
    }

    /// Drop every approval failing `keep`, preserving the relative order of
    /// survivors. Returns the removed approvals.
    pub fn retain_approvals(&mut self, mut keep: impl FnMut(&ExecApproval) -> bool) -> Vec<ExecApproval> {
        let mut removed = Vec::new();
        for list in self.scoped.values_mut() {
            let mut kept = Vec::with_capacity(list.len());
            for approval in list.drain(..) {
                if keep(&approval) {
                    kept.push(approval);
                } else {
                    removed.push(approval);
                }
            }
            *list = kept;
        }
        self.scoped.retain(|_, l| !l.is_empty());

        let mut kept = Vec::with_capacity(self.unscoped.len());
        for approval in self.unscoped.drain(..) {
            if keep(&approval) {
                kept.push(approval);
            } else {
                removed.push(approval);
            }
        }
        self.unscoped = kept;
        removed
    }

    pub fn len(&self) -> usize {
        self.scoped.values().map(Vec::len).sum::<usize>() + self.unscoped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

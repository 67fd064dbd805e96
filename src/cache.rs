use std::sync::Arc;

use dashmap::DashMap;

use crate::compile::CompiledRuleSet;
use crate::{TypeSignature, WorkflowDefinition};

/// One registered workflow together with every rule set compiled from it.
///
/// The compiled map is owned by the entry, not by the cache: replacing the
/// entry replaces both levels in one swap, so a reader can never pair a new
/// definition with a rule set compiled from an old one.
#[derive(Debug)]
pub(crate) struct WorkflowEntry {
    pub(crate) definition: Arc<WorkflowDefinition>,
    pub(crate) compiled: DashMap<Vec<TypeSignature>, Arc<CompiledRuleSet>>,
}

/// Shared store of workflow definitions and their compiled rule sets.
///
/// Safe under arbitrary concurrent readers and writers. Concurrent first
/// compilations of the same key may race; last write wins, and every stored
/// set is fully built before publication.
#[derive(Debug, Default)]
pub struct RulesCache {
    workflows: DashMap<String, Arc<WorkflowEntry>>,
}

impl RulesCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a workflow by name, dropping any compiled rule sets built
    /// from a previous version. Idempotent.
    pub fn add_or_update(&self, workflow: WorkflowDefinition) {
        let name = workflow.workflow_name.clone();
        let entry = Arc::new(WorkflowEntry {
            definition: Arc::new(workflow),
            compiled: DashMap::new(),
        });
        self.workflows.insert(name, entry);
    }

    /// Remove a workflow and all its compiled rule sets. Returns whether
    /// the workflow was present.
    pub fn remove(&self, name: &str) -> bool {
        self.workflows.remove(name).is_some()
    }

    /// Empty both cache levels.
    pub fn clear(&self) {
        self.workflows.clear();
    }

    #[must_use]
    pub fn get_workflow(&self, name: &str) -> Option<Arc<WorkflowDefinition>> {
        self.workflows
            .get(name)
            .map(|entry| Arc::clone(&entry.definition))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.workflows.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }

    /// Number of compiled rule sets currently cached for a workflow, one
    /// per distinct input-type signature.
    #[must_use]
    pub fn compiled_len(&self, name: &str) -> usize {
        self.workflows
            .get(name)
            .map_or(0, |entry| entry.compiled.len())
    }

    pub(crate) fn entry(&self, name: &str) -> Option<Arc<WorkflowEntry>> {
        self.workflows.get(name).map(|entry| Arc::clone(entry.value()))
    }
}

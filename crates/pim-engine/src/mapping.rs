//! Source element id to target element id

use pim_model::MappingInstruction;
use std::collections::HashMap;

/// Total lookup from every mapped source element id to its target element id
///
/// Built from instructions that already passed the precondition checks, so
/// source ids are unique. The process root is always present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementIdMapping {
    entries: HashMap<String, String>,
}

impl ElementIdMapping {
    /// The root entry `source_root -> target_root` is added last and replaces
    /// an explicit instruction for the same source id.
    #[must_use]
    pub fn build(
        instructions: &[MappingInstruction],
        source_root: &str,
        target_root: &str,
    ) -> Self {
        let mut entries: HashMap<String, String> = instructions
            .iter()
            .map(|i| (i.source_element_id.clone(), i.target_element_id.clone()))
            .collect();
        entries.insert(source_root.to_string(), target_root.to_string());
        Self { entries }
    }

    /// Target element id for a source element id
    #[must_use]
    pub fn target_of(&self, source_element_id: &str) -> Option<&str> {
        self.entries.get(source_element_id).map(String::as_str)
    }

    /// Number of mapped source ids, the root included
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

//! Dependency group identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of hex characters kept from the group hash.
const GROUP_HASH_LEN: usize = 32;

/// Identifier of a scheduler dependency group.
///
/// The generic group is shared by every job of a function for a run; the
/// specific group additionally carries the job's slot index. Rendering is
/// a pure function of the fields.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId {
    function: String,
    id_run: u64,
    slot: Option<usize>,
}

impl GroupId {
    /// Group shared by all jobs of `function` for `id_run`.
    pub fn generic(function: impl Into<String>, id_run: u64) -> Self {
        Self {
            function: function.into(),
            id_run,
            slot: None,
        }
    }

    /// Group unique to the job in `slot`.
    pub fn specific(function: impl Into<String>, id_run: u64, slot: usize) -> Self {
        Self {
            function: function.into(),
            id_run,
            slot: Some(slot),
        }
    }

    /// Function this group belongs to.
    pub fn function(&self) -> &str {
        &self.function
    }

    /// Run identifier.
    pub fn id_run(&self) -> u64 {
        self.id_run
    }

    /// Slot index, `None` for a generic group.
    pub fn slot(&self) -> Option<usize> {
        self.slot
    }

    /// Whether this is a generic group.
    pub fn is_generic(&self) -> bool {
        self.slot.is_none()
    }

    /// The generic group of the same function and run.
    pub fn to_generic(&self) -> Self {
        Self::generic(self.function.clone(), self.id_run)
    }

    /// Render the scheduler-facing identifier.
    pub fn render(&self) -> String {
        let digest = blake3::hash(format!("{}\0{}", self.function, self.id_run).as_bytes());
        let hex = digest.to_hex();
        let generic = &hex.as_str()[..GROUP_HASH_LEN];
        match self.slot {
            None => generic.to_string(),
            Some(slot) => format!("{}-{}", generic, slot),
        }
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_is_stable() {
        let a = GroupId::generic("bam2fastq", 26219);
        let b = GroupId::generic("bam2fastq", 26219);
        assert_eq!(a.render(), b.render());
        assert_eq!(a.render().len(), GROUP_HASH_LEN);
    }

    #[test]
    fn test_render_differs_by_function_and_run() {
        let base = GroupId::generic("f1", 1).render();
        assert_ne!(base, GroupId::generic("f2", 1).render());
        assert_ne!(base, GroupId::generic("f1", 2).render());
    }

    #[test]
    fn test_specific_extends_generic() {
        let specific = GroupId::specific("f1", 1, 3);
        let generic = specific.to_generic();
        assert!(generic.is_generic());
        assert_eq!(specific.render(), format!("{}-3", generic.render()));
    }

    #[test]
    fn test_ordering_generic_first() {
        let mut ids = vec![
            GroupId::specific("f", 1, 1),
            GroupId::generic("f", 1),
            GroupId::specific("f", 1, 0),
        ];
        ids.sort();
        assert_eq!(ids[0], GroupId::generic("f", 1));
        assert_eq!(ids[1].slot(), Some(0));
    }
}

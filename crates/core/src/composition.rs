//! Data compositions: which lanes and tags of a run a job addresses.

use crate::{ModelError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// One addressed piece of run data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Component {
    /// Run identifier
    pub id_run: u64,
    /// Lane position
    pub position: u32,
    /// Tag index, `None` for the whole lane
    #[serde(default)]
    pub tag_index: Option<u32>,
}

impl Component {
    /// Create a lane-level component.
    pub fn lane(id_run: u64, position: u32) -> Self {
        Self { id_run, position, tag_index: None }
    }

    /// Create a tag-level component.
    pub fn tag(id_run: u64, position: u32, tag_index: u32) -> Self {
        Self { id_run, position, tag_index: Some(tag_index) }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id_run, self.position)?;
        if let Some(tag) = self.tag_index {
            write!(f, ":{}", tag)?;
        }
        Ok(())
    }
}

impl FromStr for Component {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ModelError::InvalidComponent(s.to_string());
        let fields: Vec<&str> = s.trim().split(':').collect();
        let number = |field: &str| field.parse::<u64>().map_err(|_| invalid());

        match *fields.as_slice() {
            [run, position] => Ok(Self::lane(
                number(run)?,
                u32::try_from(number(position)?).map_err(|_| invalid())?,
            )),
            [run, position, tag] => Ok(Self::tag(
                number(run)?,
                u32::try_from(number(position)?).map_err(|_| invalid())?,
                u32::try_from(number(tag)?).map_err(|_| invalid())?,
            )),
            _ => Err(invalid()),
        }
    }
}

/// A set of components, compared by content.
///
/// Insertion order is irrelevant: two compositions holding the same
/// components are equal. An empty composition addresses the whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Composition(BTreeSet<Component>);

impl Composition {
    /// Create an empty (whole-run) composition.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component.
    pub fn with(mut self, component: Component) -> Self {
        self.0.insert(component);
        self
    }

    /// Whether this composition is the whole-run marker.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of distinct components.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate components in canonical order.
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.0.iter()
    }
}

impl FromIterator<Component> for Composition {
    fn from_iter<I: IntoIterator<Item = Component>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Composition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
        f.write_str(&parts.join(";"))
    }
}

impl FromStr for Composition {
    type Err = ModelError;

    /// Parse `run:position[:tag]` components separated by `;`.
    fn from_str(s: &str) -> Result<Self> {
        s.split(';')
            .filter(|part| !part.trim().is_empty())
            .map(str::parse::<Component>)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_ignores_order() {
        let a = Composition::new()
            .with(Component::tag(26219, 1, 2))
            .with(Component::tag(26219, 1, 1));
        let b = Composition::new()
            .with(Component::tag(26219, 1, 1))
            .with(Component::tag(26219, 1, 2));
        assert_eq!(a, b);
    }

    #[test]
    fn test_duplicates_collapse() {
        let c: Composition = vec![Component::lane(5, 1), Component::lane(5, 1)]
            .into_iter()
            .collect();
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_lane_differs_from_tag() {
        let lane: Composition = "26219:1".parse().unwrap();
        let tag: Composition = "26219:1:0".parse().unwrap();
        assert_ne!(lane, tag);
    }

    #[test]
    fn test_subset_is_not_equal() {
        let small: Composition = "7:1:1".parse().unwrap();
        let large: Composition = "7:1:1;7:1:2".parse().unwrap();
        assert_ne!(small, large);
    }

    #[test]
    fn test_parse_and_display() {
        let c: Composition = "26219:2:3; 26219:1".parse().unwrap();
        assert_eq!(c.to_string(), "26219:1;26219:2:3");
        assert!(Composition::from_str("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("26219".parse::<Composition>().is_err());
        assert!("a:1".parse::<Composition>().is_err());
        assert!("1:2:3:4".parse::<Composition>().is_err());
    }

    #[test]
    fn test_serde_as_list() {
        let c: Composition = "3:1:4".parse().unwrap();
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json, serde_json::json!([{"id_run": 3, "position": 1, "tag_index": 4}]));

        let back: Composition =
            serde_json::from_value(serde_json::json!([{"id_run": 3, "position": 1}])).unwrap();
        assert_eq!(back, "3:1".parse().unwrap());
    }
}

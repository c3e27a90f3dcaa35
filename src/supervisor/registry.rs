//! Host registry - last known host list per module.
//!
//! NOT shared - owned by the supervisor event loop and mutated only there.

use std::collections::BTreeMap;

use crate::types::ModuleName;

/// Module name → most recently received host list.
#[derive(Debug, Default, Clone)]
pub struct HostRegistry {
    modules: BTreeMap<ModuleName, Vec<String>>,
}

impl HostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the stored list for `module`.
    pub fn set(&mut self, module: ModuleName, hosts: Vec<String>) {
        self.modules.insert(module, hosts);
    }

    /// Copy of the whole registry, ordered by module name.
    pub fn snapshot_all(&self) -> Vec<(ModuleName, Vec<String>)> {
        self.modules
            .iter()
            .map(|(module, hosts)| (module.clone(), hosts.clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn module(name: &str) -> ModuleName {
        ModuleName::from_string(name.to_string()).unwrap()
    }

    #[test]
    fn test_set_overwrites() {
        let mut registry = HostRegistry::new();
        registry.set(module("auth"), vec!["h1:9000".into()]);
        registry.set(module("auth"), vec!["h2:9000".into(), "h3:9000".into()]);

        assert_eq!(
            registry.snapshot_all(),
            vec![(module("auth"), vec!["h2:9000".to_string(), "h3:9000".to_string()])]
        );
    }

    #[test]
    fn test_empty_list_is_kept() {
        let mut registry = HostRegistry::new();
        registry.set(module("billing"), vec![]);
        assert_eq!(registry.snapshot_all(), vec![(module("billing"), vec![])]);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut registry = HostRegistry::new();
        registry.set(module("b"), vec!["b1".into()]);
        registry.set(module("a"), vec!["a1".into()]);

        let snapshot = registry.snapshot_all();
        registry.set(module("a"), vec!["a2".into()]);

        assert_eq!(
            snapshot,
            vec![
                (module("a"), vec!["a1".to_string()]),
                (module("b"), vec!["b1".to_string()]),
            ]
        );
    }

    proptest! {
        #[test]
        fn prop_last_write_wins(
            updates in proptest::collection::vec(
                (0usize..4, proptest::collection::vec("[a-z]{1,6}:[0-9]{2,4}", 0..4)),
                1..40,
            )
        ) {
            let names = ["auth", "billing", "search", "mail"];
            let mut registry = HostRegistry::new();
            let mut expected: BTreeMap<ModuleName, Vec<String>> = BTreeMap::new();

            for (idx, hosts) in &updates {
                registry.set(module(names[*idx]), hosts.clone());
                expected.insert(module(names[*idx]), hosts.clone());
            }

            prop_assert_eq!(registry.snapshot_all(), expected.into_iter().collect::<Vec<_>>());
        }
    }
}

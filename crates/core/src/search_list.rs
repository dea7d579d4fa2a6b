//! The ordered list of locations a factory searches.
//!
//! Built when the factory is built, sorted by scope precedence and then by
//! storage priority. It may be extended until the first configuration is
//! resolved; from then on it is frozen.

use crate::error::ConfigError;
use crate::location::Location;
use crate::scope::{Scope, ScopeOrder};

#[derive(Debug, Clone, Default)]
pub struct SearchList {
    locations: Vec<Location>,
    frozen: bool,
}

impl SearchList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `location` unless an equal one is present.
    pub fn push(&mut self, location: Location) -> Result<bool, ConfigError> {
        if self.frozen {
            return Err(ConfigError::InvalidUse(
                "the search list is frozen once a configuration was resolved".to_string(),
            ));
        }
        if self.locations.contains(&location) {
            return Ok(false);
        }
        self.locations.push(location);
        Ok(true)
    }

    /// Stable sort by scope precedence, then by `storage_rank` of the storage id.
    pub fn sort(&mut self, order: &ScopeOrder, storage_rank: impl Fn(&str) -> usize) {
        self.locations.sort_by(|a, b| {
            order
                .compare(a.scope(), b.scope())
                .then_with(|| storage_rank(a.storage_id()).cmp(&storage_rank(b.storage_id())))
        });
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Locations in resolution order, highest priority first.
    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn in_scope(&self, scope: Scope) -> impl Iterator<Item = &Location> {
        self.locations
            .iter()
            .filter(move |location| location.scope() == scope)
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(scope: Scope, storage: &str) -> Location {
        let uri = Location::opaque_uri("test", &[storage, scope.as_str()]).unwrap();
        Location::new(scope, storage, uri)
    }

    #[test]
    fn test_sorts_by_scope_then_storage_rank() {
        let mut list = SearchList::new();
        list.push(location(Scope::Host, "files")).unwrap();
        list.push(location(Scope::User, "files")).unwrap();
        list.push(location(Scope::User, "memory")).unwrap();
        list.sort(&ScopeOrder::default(), |id| if id == "memory" { 0 } else { 1 });

        let order: Vec<_> = list
            .locations()
            .iter()
            .map(|l| (l.scope(), l.storage_id().to_string()))
            .collect();
        assert_eq!(
            order,
            vec![
                (Scope::User, "memory".to_string()),
                (Scope::User, "files".to_string()),
                (Scope::Host, "files".to_string()),
            ]
        );
        assert_eq!(list.in_scope(Scope::User).count(), 2);
    }

    #[test]
    fn test_frozen_list_rejects_push() {
        let mut list = SearchList::new();
        assert!(list.push(location(Scope::User, "a")).unwrap());
        assert!(!list.push(location(Scope::User, "a")).unwrap());
        list.freeze();
        assert!(matches!(
            list.push(location(Scope::Host, "a")),
            Err(ConfigError::InvalidUse(_))
        ));
        assert_eq!(list.len(), 1);
    }
}

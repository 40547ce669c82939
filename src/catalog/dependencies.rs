use super::entities::{get_entity, ALL_ENTITIES};
use super::types::EntitySchema;
use std::collections::{HashMap, HashSet, VecDeque};

/// Resolves entity dependencies for include/exclude filtering
pub struct DependencyResolver {
    /// Map of entity name -> entities it references
    deps: HashMap<&'static str, HashSet<&'static str>>,
    /// Map of entity name -> entities that reference it
    reverse_deps: HashMap<&'static str, HashSet<&'static str>>,
}

impl DependencyResolver {
    /// Build the graph over the whole catalog
    pub fn new() -> Self {
        let mut deps: HashMap<&'static str, HashSet<&'static str>> = HashMap::new();
        let mut reverse_deps: HashMap<&'static str, HashSet<&'static str>> = HashMap::new();

        for entity in ALL_ENTITIES {
            let entity_deps = entity.dependencies();
            for dep in &entity_deps {
                reverse_deps.entry(dep).or_default().insert(entity.name);
            }
            deps.insert(entity.name, entity_deps);
        }

        Self { deps, reverse_deps }
    }

    /// Given a set of requested entities, add everything they depend on.
    /// Returns entities in dependency order (parents before children)
    pub fn resolve_includes(&self, requested: &[&str]) -> Result<Vec<&'static EntitySchema>, String> {
        let mut included: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = requested.iter().copied().collect();

        while let Some(name) = queue.pop_front() {
            if included.contains(name) {
                continue;
            }

            if get_entity(name).is_none() {
                return Err(format!("Unknown entity: {}", name));
            }

            included.insert(name);

            if let Some(entity_deps) = self.deps.get(name) {
                for dep in entity_deps {
                    if !included.contains(dep) {
                        queue.push_back(dep);
                    }
                }
            }
        }

        self.topological_sort(&included)
    }

    /// Drop the excluded entities and everything that transitively depends on them
    pub fn resolve_excludes(&self, excluded: &[&str]) -> Result<Vec<&'static EntitySchema>, String> {
        for name in excluded {
            if get_entity(name).is_none() {
                return Err(format!("Unknown entity: {}", name));
            }
        }

        let mut removed: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = excluded.iter().copied().collect();

        while let Some(name) = queue.pop_front() {
            if !removed.insert(name) {
                continue;
            }
            if let Some(children) = self.reverse_deps.get(name) {
                queue.extend(children.iter().copied());
            }
        }

        let included: HashSet<&str> = ALL_ENTITIES
            .iter()
            .map(|e| e.name)
            .filter(|name| !removed.contains(name))
            .collect();

        self.topological_sort(&included)
    }

    /// Return all entities in dependency order
    pub fn all_entities_ordered(&self) -> Vec<&'static EntitySchema> {
        ALL_ENTITIES.to_vec()
    }

    /// Entities that reference `name`
    pub fn dependents(&self, name: &str) -> Vec<&'static str> {
        let mut children: Vec<_> = self
            .reverse_deps
            .get(name)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        children.sort_unstable();
        children
    }

    /// Topological sort; ties keep registry order so output is deterministic
    fn topological_sort(&self, included: &HashSet<&str>) -> Result<Vec<&'static EntitySchema>, String> {
        let mut result = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut temp_visited: HashSet<&str> = HashSet::new();

        for entity in ALL_ENTITIES {
            if included.contains(entity.name) && !visited.contains(entity.name) {
                self.visit(entity.name, included, &mut visited, &mut temp_visited, &mut result)?;
            }
        }

        Ok(result)
    }

    fn visit<'a>(
        &self,
        name: &'a str,
        included: &HashSet<&'a str>,
        visited: &mut HashSet<&'a str>,
        temp_visited: &mut HashSet<&'a str>,
        result: &mut Vec<&'static EntitySchema>,
    ) -> Result<(), String> {
        if temp_visited.contains(name) {
            return Err(format!("Circular dependency detected at: {}", name));
        }
        if visited.contains(name) {
            return Ok(());
        }

        temp_visited.insert(name);

        if let Some(deps) = self.deps.get(name) {
            let mut deps: Vec<&str> = deps.iter().copied().collect();
            deps.sort_unstable();
            for dep in deps {
                if included.contains(dep) {
                    self.visit(dep, included, visited, temp_visited, result)?;
                }
            }
        }

        temp_visited.remove(name);
        visited.insert(name);

        if let Some(entity) = get_entity(name) {
            result.push(entity);
        }

        Ok(())
    }
}

impl Default for DependencyResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(entities: &[&EntitySchema]) -> Vec<&'static str> {
        entities.iter().map(|e| e.name).collect()
    }

    fn pos(names: &[&str], name: &str) -> usize {
        names.iter().position(|&n| n == name).unwrap()
    }

    #[test]
    fn test_resolve_sales_includes_all_parents() {
        let resolver = DependencyResolver::new();
        let entities = resolver.resolve_includes(&["sales"]).unwrap();
        let names = names(&entities);

        for parent in ["country", "region", "store", "category", "subcategory", "product", "customer"] {
            assert!(names.contains(&parent), "missing {}", parent);
        }
        assert!(!names.contains(&"location_hierarchy"));

        assert!(pos(&names, "country") < pos(&names, "region"));
        assert!(pos(&names, "region") < pos(&names, "store"));
        assert!(pos(&names, "category") < pos(&names, "subcategory"));
        assert!(pos(&names, "subcategory") < pos(&names, "product"));
        assert!(pos(&names, "store") < pos(&names, "sales"));
        assert!(pos(&names, "customer") < pos(&names, "sales"));
    }

    #[test]
    fn test_resolve_region_only_pulls_country() {
        let resolver = DependencyResolver::new();
        let entities = resolver.resolve_includes(&["region"]).unwrap();
        assert_eq!(names(&entities), vec!["country", "region"]);
    }

    #[test]
    fn test_exclude_removes_dependents_transitively() {
        let resolver = DependencyResolver::new();
        let entities = resolver.resolve_excludes(&["region"]).unwrap();
        let names = names(&entities);

        assert_eq!(
            names,
            vec!["country", "category", "subcategory", "product", "customer"]
        );
    }

    #[test]
    fn test_dependents() {
        let resolver = DependencyResolver::new();
        assert_eq!(resolver.dependents("store"), vec!["location_hierarchy", "sales"]);
        assert!(resolver.dependents("location_hierarchy").is_empty());
    }

    #[test]
    fn test_graph_covers_whole_catalog() {
        let resolver = DependencyResolver::new();
        assert_eq!(resolver.deps.len(), ALL_ENTITIES.len());
        for entity in ALL_ENTITIES {
            for parent in entity.dependencies() {
                assert!(
                    resolver.dependents(parent).contains(&entity.name),
                    "{} not listed under {}",
                    entity.name,
                    parent
                );
            }
        }
    }

    #[test]
    fn test_unknown_entity_error() {
        let resolver = DependencyResolver::new();
        assert!(resolver.resolve_includes(&["nonexistent"]).is_err());
        assert!(resolver.resolve_excludes(&["nonexistent"]).is_err());
    }
}

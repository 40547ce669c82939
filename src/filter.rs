use crate::catalog::{DependencyResolver, EntitySchema};
use anyhow::{anyhow, bail, Result};
use tracing::{debug, info};

/// Resolves which entities to process based on include/exclude filters
pub fn resolve_entities(
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
) -> Result<Vec<&'static EntitySchema>> {
    let resolver = DependencyResolver::new();

    match (include, exclude) {
        (Some(_), Some(_)) => {
            bail!("Cannot use both --include and --exclude at the same time");
        }
        (Some(include_list), None) => {
            let refs: Vec<&str> = include_list.iter().map(|s| s.as_str()).collect();
            debug!("Resolving dependencies for: {:?}", refs);
            let entities = resolver.resolve_includes(&refs).map_err(|e| anyhow!(e))?;

            info!(
                "Including {} entities: {}",
                entities.len(),
                names(&entities)
            );
            Ok(entities)
        }
        (None, Some(exclude_list)) => {
            let refs: Vec<&str> = exclude_list.iter().map(|s| s.as_str()).collect();
            debug!("Excluding entities: {:?}", refs);
            let entities = resolver.resolve_excludes(&refs).map_err(|e| anyhow!(e))?;

            info!(
                "Including {} entities after exclusions: {}",
                entities.len(),
                names(&entities)
            );
            Ok(entities)
        }
        (None, None) => {
            let entities = resolver.all_entities_ordered();
            info!("Including all {} entities", entities.len());
            Ok(entities)
        }
    }
}

fn names(entities: &[&EntitySchema]) -> String {
    entities
        .iter()
        .map(|e| e.name)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_include_and_exclude_conflict() {
        let err = resolve_entities(Some(vec!["store".into()]), Some(vec!["sales".into()]));
        assert!(err.is_err());
    }

    #[test]
    fn test_include_pulls_parents() {
        let entities = resolve_entities(Some(vec!["store".into()]), None).unwrap();
        let names: Vec<&str> = entities.iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["country", "region", "store"]);
    }

    #[test]
    fn test_unknown_entity_is_an_error() {
        let err = resolve_entities(Some(vec!["warehouse".into()]), None).unwrap_err();
        assert!(err.to_string().contains("warehouse"));
    }
}

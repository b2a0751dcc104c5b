//! Built-in index functions over canonical cluster-aware keys

use weft_shared::{ClusterKey, Result, WeftError};

/// Maps a queued key to the index values it files under. Returning an error
/// logs and skips that (index, key) pair without failing the add.
pub type IndexFunc = Box<dyn Fn(&str) -> Result<Vec<String>> + Send + Sync>;

fn parse(key: &str) -> Result<ClusterKey> {
    ClusterKey::parse(key).map_err(WeftError::from)
}

/// Index keys by their workspace path.
pub fn by_workspace() -> IndexFunc {
    Box::new(|key| Ok(vec![parse(key)?.workspace().to_string()]))
}

/// Index namespaced keys by namespace; cluster-scoped keys are not filed.
pub fn by_namespace() -> IndexFunc {
    Box::new(|key| {
        Ok(parse(key)?
            .namespace()
            .map(|ns| vec![ns.to_string()])
            .unwrap_or_default())
    })
}

/// Index namespaced keys by `workspace/namespace`.
pub fn by_workspace_and_namespace() -> IndexFunc {
    Box::new(|key| {
        let parsed = parse(key)?;
        Ok(parsed
            .namespace()
            .map(|ns| vec![format!("{}/{}", parsed.workspace(), ns)])
            .unwrap_or_default())
    })
}

/// Index every key under the resource kind this queue serves.
pub fn by_resource_type(kind: &'static str) -> IndexFunc {
    Box::new(move |key| {
        parse(key)?;
        Ok(vec![kind.to_string()])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_and_namespace_indexing() {
        let ws = by_workspace();
        assert_eq!(ws("root:org|default/web").unwrap(), vec!["root:org"]);

        let ns = by_namespace();
        assert_eq!(ns("root:org|default/web").unwrap(), vec!["default"]);
        assert!(ns("root:org|west-coast").unwrap().is_empty());

        let both = by_workspace_and_namespace();
        assert_eq!(both("root:org|default/web").unwrap(), vec!["root:org/default"]);
    }

    #[test]
    fn resource_type_indexing_is_constant() {
        let index = by_resource_type("SyncTarget");
        assert_eq!(index("root|west").unwrap(), vec!["SyncTarget"]);
        assert!(index("malformed").is_err());
    }
}

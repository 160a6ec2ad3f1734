//! Item sources: the JSON manifest and the filesystem connector.

use anyhow::Result;
use rag_relay_core::RetrievableItem;
use std::path::Path;

use crate::config::Config;
use crate::connector_fs;
use crate::manifest;

/// Status line for one item source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStatus {
    pub name: &'static str,
    pub status: String,
    pub healthy: bool,
}

pub fn source_statuses(config: &Config) -> Vec<SourceStatus> {
    let manifest = match &config.items.manifest {
        Some(path) if path.is_file() => ("OK".to_string(), true),
        Some(_) => ("NOT CONFIGURED (manifest does not exist)".to_string(), false),
        None => ("NOT CONFIGURED".to_string(), false),
    };
    let filesystem = match &config.connectors.filesystem {
        Some(fs) if fs.root.exists() => ("OK".to_string(), true),
        Some(_) => ("NOT CONFIGURED (root does not exist)".to_string(), false),
        None => ("NOT CONFIGURED".to_string(), false),
    };

    vec![
        SourceStatus {
            name: "manifest",
            status: manifest.0,
            healthy: manifest.1,
        },
        SourceStatus {
            name: "filesystem",
            status: filesystem.0,
            healthy: filesystem.1,
        },
    ]
}

pub fn list_sources(config: &Config) -> Result<()> {
    println!("{:<16} {:<12} HEALTHY", "SOURCE", "STATUS");
    for s in source_statuses(config) {
        println!("{:<16} {:<12} {}", s.name, s.status, s.healthy);
    }
    Ok(())
}

/// Gather the items to answer over.
///
/// An explicit `--items` manifest replaces every configured source.
/// Otherwise the configured manifest and filesystem connector are combined,
/// manifest items first.
pub fn collect_items(config: &Config, items_override: Option<&Path>) -> Result<Vec<RetrievableItem>> {
    if let Some(path) = items_override {
        return manifest::load_manifest(path);
    }

    let mut items = Vec::new();
    if let Some(path) = &config.items.manifest {
        items.extend(manifest::load_manifest(path)?);
    }
    if config.connectors.filesystem.is_some() {
        items.extend(connector_fs::scan_filesystem(config)?);
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilesystemConnectorConfig;
    use tempfile::TempDir;

    #[test]
    fn unconfigured_sources_are_unhealthy() {
        let statuses = source_statuses(&Config::minimal());
        assert_eq!(statuses.len(), 2);
        assert!(statuses.iter().all(|s| !s.healthy));
    }

    #[test]
    fn combines_manifest_and_filesystem() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("items.json");
        std::fs::write(
            &manifest,
            r#"{"pages": [{"title": "T", "url": "u", "content": "c"}]}"#,
        )
        .unwrap();
        let docs = dir.path().join("docs");
        std::fs::create_dir_all(&docs).unwrap();
        std::fs::write(docs.join("a.md"), "alpha").unwrap();

        let mut config = Config::minimal();
        config.items.manifest = Some(manifest.clone());
        config.connectors.filesystem = Some(FilesystemConnectorConfig {
            root: docs,
            include_globs: vec!["**/*.md".into()],
            exclude_globs: vec![],
            follow_symlinks: false,
        });

        let names: Vec<String> = collect_items(&config, None)
            .unwrap()
            .iter()
            .map(|i| i.name().to_string())
            .collect();
        assert_eq!(names, vec!["Page_1", "a.md"]);

        assert!(source_statuses(&config).iter().all(|s| s.healthy));

        let only_manifest = collect_items(&config, Some(&manifest)).unwrap();
        assert_eq!(only_manifest.len(), 1);
    }
}

//! Snapshot viewer: load a store snapshot, log its inconsistencies and
//! render one projected collection as JSON.

mod config;

pub use config::ViewConfig;

use kb_graph::{InMemoryKnowledgeBase, KnowledgeStore, Snapshot};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid snapshot json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no focus configured and the snapshot has no root collection")]
    NoRoot,
}

pub async fn load_snapshot(path: &Path) -> Result<Snapshot, ViewError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ViewError::Io {
            path: path.display().to_string(),
            source,
        })?;
    Ok(serde_json::from_str(&raw)?)
}

/// Focus id and ancestor chain to project. Without an explicit chain the
/// focus is viewed through its first membership route.
fn resolve_focus(snapshot: &Snapshot, config: &ViewConfig) -> Result<(String, Vec<String>), ViewError> {
    let focus = match &config.focus {
        Some(f) => f.clone(),
        None => snapshot.root().ok_or(ViewError::NoRoot)?.id.clone(),
    };
    if !config.ancestor_chain.is_empty() {
        return Ok((focus, config.ancestor_chain.clone()));
    }
    let mut chain = snapshot
        .node(&focus)
        .and_then(|n| n.collection_chains.first().cloned())
        .unwrap_or_default();
    chain.push(focus.clone());
    Ok((focus, chain))
}

/// Load, diagnose and project according to `config`; returns the view as JSON.
pub async fn render(config: &ViewConfig) -> Result<String, ViewError> {
    let snapshot = load_snapshot(&config.snapshot_path).await?;
    let (focus, chain) = resolve_focus(&snapshot, config)?;

    let kb = InMemoryKnowledgeBase::from_snapshot(snapshot);
    for diagnostic in kb.diagnostics().await {
        tracing::warn!(%diagnostic, "snapshot inconsistency");
    }

    let view = kb.project(&focus, &chain).await;
    tracing::info!(
        focus = %focus,
        nodes = view.nodes.len(),
        collections = view.collections.len(),
        edges = view.edges.len(),
        "rendered view"
    );
    let out = if config.pretty {
        serde_json::to_string_pretty(view.as_ref())?
    } else {
        serde_json::to_string(view.as_ref())?
    };
    Ok(out)
}

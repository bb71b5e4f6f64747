use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::Context;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, warn};

use crate::model::DailyAggregate;

/// Reads the aggregate persisted by a previous run, if any.
pub async fn load(path: &Path) -> anyhow::Result<Option<DailyAggregate>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("read mirror {}", path.display())),
    };
    serde_json::from_slice(&bytes).with_context(|| format!("parse mirror {}", path.display()))
}

/// Writes every store change to `path` from a background task.
///
/// Write failures are logged and skipped; the in-memory store never waits on
/// the mirror. Intermediate values may be coalesced, the latest one always
/// lands.
pub fn spawn(mut changes: watch::Receiver<Option<DailyAggregate>>, path: PathBuf) -> JoinHandle<()> {
    tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let value = changes.borrow_and_update().clone();
            match write(&path, value.as_ref()).await {
                Ok(()) => debug!(path = %path.display(), "store mirrored"),
                Err(e) => warn!(error = %e, path = %path.display(), "store mirror write failed"),
            }
        }
    })
}

async fn write(path: &Path, value: Option<&DailyAggregate>) -> anyhow::Result<()> {
    let body = serde_json::to_vec_pretty(&value)?;
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, body)
        .await
        .with_context(|| format!("write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("rename {} to {}", tmp.display(), path.display()))?;
    Ok(())
}

pub mod history;
pub mod tokens;

use crate::error::{PaymentsSdkError, Result};
use std::path::Path;

/// Replace `path` with `contents` through a sibling temp file and a rename,
/// so readers see either the old file or the new one.
pub(crate) async fn write_atomically(path: &Path, contents: String) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");

    tokio::fs::write(&tmp, contents).await.map_err(|e| {
        PaymentsSdkError::Store(format!("failed to write {}: {}", path.display(), e))
    })?;
    tokio::fs::rename(&tmp, path).await.map_err(|e| {
        PaymentsSdkError::Store(format!("failed to replace {}: {}", path.display(), e))
    })
}

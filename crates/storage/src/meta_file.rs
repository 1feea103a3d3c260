//! The `meta.json` file embedded in every package archive.

use crate::error::{StorageError, StorageResult};
use depot_core::{META_FILE_NAME, PackageId, PackageMeta};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::instrument;

/// Parsed `meta.json`: always a JSON object.
pub type MetaObject = Map<String, Value>;

/// Read and parse `<dir>/meta.json`, refusing files larger than `max` bytes.
#[instrument(skip(dir), fields(dir = %dir.display()))]
pub async fn load_meta(dir: &Path, max: u64) -> StorageResult<MetaObject> {
    let path = dir.join(META_FILE_NAME);
    let file = fs::File::open(&path)
        .await
        .map_err(|e| StorageError::from_io(e, META_FILE_NAME))?;

    // Bound the read itself; the file may grow after a stat.
    let mut raw = Vec::new();
    file.take(max.saturating_add(1)).read_to_end(&mut raw).await?;
    if raw.len() as u64 > max {
        let size = fs::metadata(&path)
            .await
            .map(|m| m.len())
            .unwrap_or(raw.len() as u64);
        return Err(StorageError::MetaTooLarge { size, max });
    }

    match serde_json::from_slice::<Value>(&raw) {
        Ok(Value::Object(obj)) => Ok(obj),
        Ok(other) => Err(StorageError::MetaCorrupt(format!(
            "expected a JSON object, found {}",
            json_kind(&other)
        ))),
        Err(e) => Err(StorageError::MetaCorrupt(e.to_string())),
    }
}

/// Stamp `id` and `meta` into `<dir>/meta.json` and rewrite it.
///
/// Keys the file already carries are kept unless they collide with a
/// stamped field. Returns the object that was written.
#[instrument(skip(dir, meta), fields(dir = %dir.display(), package_id = %id))]
pub async fn rewrite_meta(
    dir: &Path,
    max: u64,
    id: &PackageId,
    meta: &PackageMeta,
) -> StorageResult<MetaObject> {
    let mut obj = load_meta(dir, max).await?;
    obj.insert("package_id".to_string(), Value::from(id.as_str()));
    obj.insert("owner_id".to_string(), Value::from(meta.owner_id.as_str()));
    obj.insert("created_at".to_string(), Value::from(meta.created_at));
    obj.insert("expires_at".to_string(), Value::from(meta.expires_at));

    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    obj.serialize(&mut ser)
        .map_err(|e| StorageError::MetaCorrupt(e.to_string()))?;

    fs::write(dir.join(META_FILE_NAME), out).await?;
    Ok(obj)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

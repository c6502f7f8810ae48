//! Reads and normalizes a bundle's `config/keter.yaml`.

mod model;
mod normalize;

use std::path::Path;

use crate::error::{ErrorExt, ErrorKind, Result};
use crate::model::Config;

/// Read and normalize `work_dir/config/keter.yaml`.
///
/// `ConfigMissing` if the file is absent, `ConfigMalformed` if it fails to
/// parse.
#[tracing::instrument(level = "debug", skip_all, fields(work_dir = %work_dir.display()))]
pub async fn load_config(work_dir: &Path) -> Result<Config> {
    let config_dir = work_dir.join("config");
    let doc_path = config_dir.join("keter.yaml");

    let contents = tokio::fs::read(&doc_path)
        .await
        .reason(ErrorKind::ConfigMissing)?;

    let raw: model::RawConfig =
        serde_yaml::from_slice(&contents).reason(ErrorKind::ConfigMalformed)?;

    Ok(normalize::normalize(raw, &config_dir))
}

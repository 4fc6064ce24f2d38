use std::path::Path;

use anyhow::{Context, Result};
use tokio::fs;

use crate::error::{AppError, FileError};
use crate::models::profile::PortalProfile;

/// 从 TOML 文件加载门户配置
pub async fn load_profile_from_toml(toml_file_path: &Path) -> Result<PortalProfile> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .map_err(|e| AppError::file_read_failed(toml_file_path.display().to_string(), e))?;

    let profile: PortalProfile = toml::from_str(&content).map_err(|e| {
        AppError::File(FileError::TomlParseFailed {
            path: toml_file_path.display().to_string(),
            source: Box::new(e),
        })
    })?;

    tracing::info!(
        "已加载门户配置 '{}' ({} 个定位器): {}",
        profile.name,
        profile.locators.len(),
        toml_file_path.display()
    );
    Ok(profile)
}

/// 按配置选择门户：有 TOML 文件就用文件，否则用内置配置
pub async fn resolve_profile(
    builtin_name: &str,
    profile_file: Option<&str>,
    portal_url: Option<&str>,
) -> Result<PortalProfile> {
    let mut profile = match profile_file {
        Some(path) => load_profile_from_toml(Path::new(path))
            .await
            .with_context(|| format!("无法加载门户配置文件: {}", path))?,
        None => PortalProfile::builtin(builtin_name)?,
    };

    if let Some(url) = portal_url {
        profile.entry_url = url.to_string();
    }
    Ok(profile)
}

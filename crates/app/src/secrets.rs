use anyhow::{anyhow, Context, Result};
use bagwatch_config::DispatchConfig;
use std::fs;
use std::path::{Path, PathBuf};

/// Loads `dispatch.telegram_token_file` into `dispatch.telegram_token`. Relative paths
/// resolve against the directory of the loaded config file.
pub(crate) fn resolve_dispatch_secrets(
    config: &mut DispatchConfig,
    loaded_config_path: &Path,
) -> Result<()> {
    let token_file = config.telegram_token_file.trim();
    if token_file.is_empty() {
        return Ok(());
    }
    if !config.telegram_token.trim().is_empty() {
        return Err(anyhow!(
            "dispatch.telegram_token and dispatch.telegram_token_file cannot be set at the same time"
        ));
    }
    let resolved = resolve_secret_file_path(token_file, loaded_config_path);
    config.telegram_token = read_trimmed_secret_file(resolved.as_path()).with_context(|| {
        format!(
            "failed loading dispatch.telegram_token_file from {} (resolved path: {})",
            token_file,
            resolved.display()
        )
    })?;
    Ok(())
}

fn resolve_secret_file_path(path: &str, loaded_config_path: &Path) -> PathBuf {
    let value = Path::new(path.trim());
    if value.is_absolute() {
        return value.to_path_buf();
    }
    match loaded_config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(value),
        _ => value.to_path_buf(),
    }
}

fn read_trimmed_secret_file(path: &Path) -> Result<String> {
    let value = fs::read_to_string(path)
        .with_context(|| format!("failed reading secret file {}", path.display()))?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("secret file {} is empty", path.display()));
    }
    Ok(trimmed.to_string())
}

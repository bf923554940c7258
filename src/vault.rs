use std::path::PathBuf;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::rngs::SysRng;
use rand::TryRng;

use crate::error::{Result, StudioError};

pub const TOKEN_ENV: &str = "STUDIO_DAEMON_TOKEN";
pub const OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";

fn daemon_auth_token_file() -> PathBuf {
    crate::runtime_paths::secrets_dir().join("daemon_auth_token")
}

fn read_daemon_auth_token_file() -> Option<String> {
    let raw = std::fs::read_to_string(daemon_auth_token_file()).ok()?;
    non_empty(&raw)
}

fn write_daemon_auth_token_file(token: &str) -> Result<()> {
    let path = daemon_auth_token_file();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            StudioError::Runtime(format!(
                "Failed to create secrets directory {}: {e}",
                parent.to_string_lossy()
            ))
        })?;
    }
    std::fs::write(&path, token).map_err(|e| {
        StudioError::Runtime(format!(
            "Failed to write token file {}: {e}",
            path.to_string_lossy()
        ))
    })?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600));
    }
    Ok(())
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn env_secret(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|value| non_empty(&value))
}

pub fn generate_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    let mut rng = SysRng;
    rng.try_fill_bytes(&mut bytes)
        .map_err(|e| StudioError::Runtime(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Resolves the daemon bearer token: environment, then the configured
/// value, then the token file. Generates and persists a fresh token when
/// none exists.
pub fn ensure_daemon_auth_token(configured: Option<&str>) -> Result<String> {
    if let Some(token) = env_secret(TOKEN_ENV) {
        return Ok(token);
    }
    if let Some(token) = configured.and_then(non_empty) {
        return Ok(token);
    }
    if let Some(token) = read_daemon_auth_token_file() {
        return Ok(token);
    }

    let generated = generate_token()?;
    write_daemon_auth_token_file(&generated)?;
    tracing::info!(
        path = %daemon_auth_token_file().to_string_lossy(),
        "Generated daemon auth token"
    );
    Ok(generated)
}

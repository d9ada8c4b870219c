// ABOUTME: Writes client configs and QR images produced by the API to disk
// ABOUTME: QR images arrive base64-encoded and are decoded to PNG files

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::{Path, PathBuf};

use crate::wizard::validate_client_name;

/// Files are named after the client, so the name must stay a plain file stem
/// inside `dir`.
fn target(dir: &Path, name: &str, extension: &str) -> Result<PathBuf> {
    validate_client_name(name).context("Refusing to write profile")?;
    Ok(dir.join(format!("{}.{}", name, extension)))
}

pub fn save_config(dir: &Path, name: &str, config: &str) -> Result<PathBuf> {
    let path = target(dir, name, "conf")?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    std::fs::write(&path, config)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// Returns `None` when the service sent no image.
pub fn save_qr(dir: &Path, name: &str, qr_png_base64: &str) -> Result<Option<PathBuf>> {
    let path = target(dir, name, "png")?;
    let encoded = qr_png_base64.trim();
    if encoded.is_empty() {
        return Ok(None);
    }
    let png = STANDARD
        .decode(encoded)
        .context("QR image from the server is not valid base64")?;

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    std::fs::write(&path, png).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_config_names_file_after_client() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_config(dir.path(), "client1", "[Interface]\n").unwrap();
        assert_eq!(path.file_name().unwrap(), "client1.conf");
        assert_eq!(std::fs::read_to_string(path).unwrap(), "[Interface]\n");
    }

    #[test]
    fn test_save_qr_decodes_base64() {
        let dir = tempfile::tempdir().unwrap();
        let png_header = [0x89u8, b'P', b'N', b'G'];
        let encoded = STANDARD.encode(png_header);

        let path = save_qr(dir.path(), "phone", &encoded).unwrap().unwrap();
        assert_eq!(std::fs::read(path).unwrap(), png_header);
    }

    #[test]
    fn test_save_qr_skips_empty_and_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        assert!(save_qr(dir.path(), "phone", "").unwrap().is_none());
        assert!(save_qr(dir.path(), "phone", "***").is_err());
    }

    #[test]
    fn test_unsafe_names_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");

        assert!(save_config(&out, "", "cfg").is_err());
        assert!(save_config(&out, "../escaped", "cfg").is_err());
        assert!(save_qr(&out, "../escaped", "AA==").is_err());

        assert!(!dir.path().join("escaped.conf").exists());
        assert!(!dir.path().join("escaped.png").exists());
        assert!(!out.exists());
    }
}

use std::{fs, path::Path};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

/// Reads the signing secret persisted at `path`, generating and storing a new
/// one when the file is missing or empty.
pub(super) fn load_or_create_jwt_secret(path: &Path) -> String {
    if let Some(existing) = read_secret(path) {
        return existing;
    }

    let new_secret = generate_secret();

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        if let Err(err) = fs::create_dir_all(parent) {
            tracing::warn!(error = %err, path = %parent.display(), "Failed to create JWT secret directory");
        }
    }

    match fs::OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut file) => {
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;

                if let Err(err) = file.set_permissions(fs::Permissions::from_mode(0o600)) {
                    tracing::warn!(error = %err, path = %path.display(), "Failed to restrict JWT secret file");
                }
            }

            if let Err(err) = std::io::Write::write_all(&mut file, new_secret.as_bytes()) {
                tracing::warn!(error = %err, path = %path.display(), "Failed to persist JWT secret");
            } else {
                tracing::warn!(path = %path.display(), "JWT_SECRET not set; generated a local signing secret");
            }
        }
        // Another process won the race; use whatever it wrote.
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
            if let Some(existing) = read_secret(path) {
                return existing;
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, path = %path.display(), "Failed to create JWT secret file");
        }
    }

    new_secret
}

fn read_secret(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn generate_secret() -> String {
    let mut bytes = [0u8; 64];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir()
            .join(format!("exam-portal-secret-{}-{name}", std::process::id()))
            .join(".jwt_secret")
    }

    #[test]
    fn generated_secret_is_persisted_and_reused() {
        let path = scratch_path("reuse");
        let _ = fs::remove_file(&path);

        let first = load_or_create_jwt_secret(&path);
        let second = load_or_create_jwt_secret(&path);

        assert_eq!(first, second);
        assert!(first.len() >= 64);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn existing_secret_is_trimmed() {
        let path = scratch_path("trim");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "  preset-secret \n").unwrap();

        assert_eq!(load_or_create_jwt_secret(&path), "preset-secret");

        let _ = fs::remove_file(&path);
    }
}

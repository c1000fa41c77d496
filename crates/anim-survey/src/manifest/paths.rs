use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use std::path::{Component, Path, PathBuf};

/// Rehome a manifest image path onto `provider_root`.
///
/// Manifests are written on the generation machine and may carry absolute
/// Windows paths. Resolution order: the path segment after the provider's own
/// directory name, then a trailing `images/...` segment, then a relative
/// join, then the bare file name under `images/`.
pub(crate) fn normalize_image_path(raw: &str, provider_root: &Path) -> PathBuf {
    let forward = raw.trim().replace('\\', "/");
    let lowered = forward.to_ascii_lowercase();

    let provider = provider_root
        .file_name()
        .map(|name| name.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    if !provider.is_empty() {
        let needle = format!("/{provider}/");
        if let Some(at) = lowered.find(&needle) {
            return provider_root.join(&forward[at + needle.len()..]);
        }
    }

    if let Some(at) = lowered.find("/images/") {
        return provider_root.join(&forward[at + 1..]);
    }

    if !forward.starts_with('/') {
        return provider_root.join(&forward);
    }

    let basename = forward.rsplit('/').next().unwrap_or_default();
    provider_root.join("images").join(basename)
}

/// Opaque, URL-safe token for an image path, so responses and the image
/// endpoint never exchange raw filesystem paths.
pub fn encode_image_token(path: &Path) -> String {
    URL_SAFE_NO_PAD.encode(path.to_string_lossy().as_bytes())
}

pub fn decode_image_token(token: &str) -> Option<PathBuf> {
    let bytes = URL_SAFE_NO_PAD.decode(token.trim()).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    if text.is_empty() {
        return None;
    }
    Some(PathBuf::from(text))
}

/// Lexically resolve `.` and `..` so traversal cannot escape a root without
/// touching the filesystem.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Whether `path` lies under one of the allowed provider roots.
pub fn is_under_allowed_roots(path: &Path, roots: &[PathBuf]) -> bool {
    let candidate = lexical_normalize(path);
    roots
        .iter()
        .any(|root| candidate.starts_with(lexical_normalize(root)))
}

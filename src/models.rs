use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

/// Prefix carried by every Local reference, in the root-relative
/// backslash-separated shape the catalog has always persisted.
pub const LOCAL_REFERENCE_PREFIX: &str = r"\images\products\";

/// Type tag persisted alongside a reference so key extraction never has
/// to sniff string shapes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    Local,
    Cloud,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::Local => "local",
            ReferenceKind::Cloud => "cloud",
        }
    }
}

impl FromStr for ReferenceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(ReferenceKind::Local),
            "cloud" => Ok(ReferenceKind::Cloud),
            other => Err(format!("unknown reference kind: {:?}", other)),
        }
    }
}

/// Metadata row for one stored product image.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProductImage {
    pub id: Uuid,
    pub product_id: i64,
    /// Local: root-relative path like `\images\products\product-7\<uuid>.png`.
    /// Cloud: the blob's canonical URL.
    pub reference: String,
    pub kind: ReferenceKind,
}

/// Builds a fresh blob key for an upload: `product-{id}/{uuid}{.ext}`.
/// Random-identifier-based so concurrent uploads for one product cannot
/// collide; the original file extension is preserved (lowercased).
pub fn generate_blob_key(product_id: i64, filename: &str) -> String {
    let file_id = Uuid::new_v4();
    match Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
    {
        Some(ext) if !ext.is_empty() => format!("product-{}/{}.{}", product_id, file_id, ext),
        _ => format!("product-{}/{}", product_id, file_id),
    }
}

/// The persisted Local reference for a blob key.
pub fn local_reference_for_key(key: &str) -> String {
    format!("{}{}", LOCAL_REFERENCE_PREFIX, key.replace('/', "\\"))
}

/// Extracts the blob key from a persisted reference, parsing strictly
/// under the record's kind tag. Returns `None` when the reference does
/// not have the shape its tag promises (a data-integrity fault the
/// caller surfaces; the record must not be guessed at or deleted).
pub fn blob_key_from_reference(kind: ReferenceKind, reference: &str) -> Option<String> {
    match kind {
        ReferenceKind::Local => {
            let normalized = reference.replace('\\', "/");
            let key = normalized
                .strip_prefix('/')
                .unwrap_or(&normalized)
                .strip_prefix("images/products/")?;
            if key.is_empty() {
                return None;
            }
            Some(key.to_string())
        }
        ReferenceKind::Cloud => {
            let rest = reference
                .strip_prefix("https://")
                .or_else(|| reference.strip_prefix("http://"))?;
            let (host, path) = rest.split_once('/')?;
            if host.is_empty() {
                return None;
            }
            // First path segment is the container; the remainder is the key.
            let (container, key) = path.split_once('/')?;
            if container.is_empty() || key.is_empty() {
                return None;
            }
            Some(key.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_keeps_extension() {
        let key = generate_blob_key(7, "Holiday Photo.PNG");
        assert!(key.starts_with("product-7/"));
        assert!(key.ends_with(".png"));
    }

    #[test]
    fn generated_key_without_extension() {
        let key = generate_blob_key(7, "raw-bytes");
        assert!(key.starts_with("product-7/"));
        assert!(!key.contains('.'));
    }

    #[test]
    fn generated_keys_do_not_collide() {
        let a = generate_blob_key(1, "a.png");
        let b = generate_blob_key(1, "a.png");
        assert_ne!(a, b);
    }

    #[test]
    fn local_reference_round_trip() {
        let key = "product-42/3fae21.png";
        let reference = local_reference_for_key(key);
        assert_eq!(reference, r"\images\products\product-42\3fae21.png");
        assert_eq!(
            blob_key_from_reference(ReferenceKind::Local, &reference).as_deref(),
            Some(key)
        );
    }

    #[test]
    fn local_reference_without_leading_separator_still_parses() {
        // Tag-driven parsing is tolerant of the one historical ambiguity:
        // a Local reference missing its leading backslash.
        assert_eq!(
            blob_key_from_reference(ReferenceKind::Local, r"images\products\product-1\a.png")
                .as_deref(),
            Some("product-1/a.png")
        );
    }

    #[test]
    fn cloud_reference_extraction() {
        let reference = "https://acct.blob.core.windows.net/product-images/product-7/3fae21.png";
        assert_eq!(
            blob_key_from_reference(ReferenceKind::Cloud, reference).as_deref(),
            Some("product-7/3fae21.png")
        );
    }

    #[test]
    fn malformed_references_are_rejected() {
        assert_eq!(blob_key_from_reference(ReferenceKind::Local, "garbage"), None);
        assert_eq!(blob_key_from_reference(ReferenceKind::Local, r"\images\products\"), None);
        assert_eq!(blob_key_from_reference(ReferenceKind::Cloud, "not-a-url"), None);
        assert_eq!(
            blob_key_from_reference(ReferenceKind::Cloud, "https://host/container-only"),
            None
        );
        // A Local-shaped string under a Cloud tag is a fault, not a fallback.
        assert_eq!(
            blob_key_from_reference(ReferenceKind::Cloud, r"\images\products\product-1\a.png"),
            None
        );
    }
}

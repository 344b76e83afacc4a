use sha2::{Digest, Sha256};
use url::Url;

/// Digest used as a secondary duplicate signal alongside the unique
/// constraint on `original_url`: SHA-256 of `lowercase(title)|hostname`.
pub fn dedup_hash(title: &str, original_url: &str) -> anyhow::Result<String> {
    let parsed = Url::parse(original_url)?;
    let hostname = parsed
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("URL has no hostname: {original_url}"))?;

    let mut hasher = Sha256::new();
    hasher.update(title.to_lowercase().as_bytes());
    hasher.update(b"|");
    hasher.update(hostname.as_bytes());
    let digest = hasher.finalize();

    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    Ok(out)
}

//! Object key layout.

use chrono::{DateTime, Utc};

/// `videos/{project}/{product}/{job}_{unix_millis}.mp4`
pub fn video_key(project_ref: &str, product_ref: &str, job_id: &str, at: DateTime<Utc>) -> String {
    format!(
        "videos/{}/{}/{}_{}.mp4",
        sanitize(project_ref),
        sanitize(product_ref),
        sanitize(job_id),
        at.timestamp_millis()
    )
}

/// Recover the object key from a public or `s3://` URL produced by this crate.
pub fn key_from_url(media_url: &str, bucket: &str) -> Option<String> {
    let parsed = url::Url::parse(media_url).ok()?;
    let path = urlencoding::decode(parsed.path()).ok()?.into_owned();
    let path = path.trim_start_matches('/');

    let key = if parsed.scheme() == "s3" {
        if parsed.host_str() != Some(bucket) {
            return None;
        }
        path
    } else {
        path.strip_prefix(&format!("{bucket}/")).unwrap_or(path)
    };

    (!key.is_empty()).then(|| key.to_string())
}

/// Keep keys to a safe character set; refs come from external collaborators.
fn sanitize(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

//! Optional lead-image download.
//!
//! Images are stored as `<image_dir>/<date>/<record id><ext>` and fetched
//! through the same throttled, retrying [`Fetch`] stack as pages. A file that
//! already exists is reused without a request.

use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::dates;
use crate::error::{FetchError, ImageError};
use crate::fetch::Fetch;
use crate::models::ArticleRecord;

/// Largest image body accepted, in bytes.
pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

const KNOWN_EXTENSIONS: [&str; 5] = [".jpg", ".jpeg", ".png", ".gif", ".webp"];

/// File extension for an image URL, `.jpg` when the path has no known one.
pub fn extension_for(url: &str) -> &'static str {
    let path = Url::parse(url)
        .map(|u| u.path().to_lowercase())
        .unwrap_or_else(|_| url.to_lowercase());
    KNOWN_EXTENSIONS
        .iter()
        .find(|ext| path.ends_with(*ext))
        .copied()
        .unwrap_or(".jpg")
}

/// Where the image for record `id` on `date` lives.
pub fn image_path(image_dir: &Path, date: NaiveDate, id: &str, url: &str) -> PathBuf {
    image_dir
        .join(dates::canonical(date))
        .join(format!("{id}{}", extension_for(url)))
}

/// Download one image, returning the local path.
///
/// # Errors
///
/// Non-http(s) URL, a failed fetch, a non-image content type, an oversized
/// body, or a failed write.
#[instrument(level = "info", skip_all, fields(%url, %date))]
pub async fn download_image<F: Fetch>(
    fetcher: &F,
    url: &str,
    id: &str,
    date: NaiveDate,
    image_dir: &Path,
) -> Result<PathBuf, ImageError> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ImageError::UnsupportedUrl(url.to_string()));
    }

    let path = image_path(image_dir, date, id, url);
    if fs::try_exists(&path).await.unwrap_or(false) {
        debug!(path = %path.display(), "Image already on disk");
        return Ok(path);
    }

    let response = fetcher
        .fetch_limited(url, Some(MAX_IMAGE_BYTES))
        .await
        .map_err(|e| match e {
            FetchError::BodyTooLarge { url, size, limit } => {
                ImageError::TooLarge { url, size, limit }
            }
            other => ImageError::Fetch(other),
        })?;
    let content_type = response.content_type().unwrap_or_default().to_string();
    if !content_type.starts_with("image/") {
        return Err(ImageError::NotAnImage {
            url: url.to_string(),
            content_type,
        });
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|source| ImageError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    fs::write(&path, &response.body)
        .await
        .map_err(|source| ImageError::Write {
            path: path.clone(),
            source,
        })?;
    info!(path = %path.display(), bytes = response.body.len(), "Saved image");
    Ok(path)
}

/// Download the lead image of every record that has one.
///
/// Failures are logged and skipped. Returns the number of images on disk.
pub async fn download_all<F: Fetch>(
    fetcher: &F,
    records: &[ArticleRecord],
    date: NaiveDate,
    image_dir: &Path,
) -> usize {
    let mut saved = 0;
    for record in records {
        let Some(url) = record.image_url.as_deref() else {
            continue;
        };
        match download_image(fetcher, url, &record.id, date, image_dir).await {
            Ok(_) => saved += 1,
            Err(e) => warn!(article = %record.url, error = %e, "Image download failed"),
        }
    }
    saved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchResponse;
    use crate::fetch::testing::FakeFetcher;
    use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderValue};

    const IMG: &str = "https://n.sinaimg.cn/tech/photo.png";

    fn image_response(content_type: &str, body: Vec<u8>) -> FetchResponse {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        FetchResponse {
            status: 200,
            headers,
            body,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, 14).unwrap()
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("https://x.cn/a/photo.PNG"), ".png");
        assert_eq!(extension_for("https://x.cn/a/photo.webp?w=300"), ".webp");
        assert_eq!(extension_for("https://x.cn/a/photo.jpeg"), ".jpeg");
        assert_eq!(extension_for("https://x.cn/a/photo"), ".jpg");
        assert_eq!(extension_for("https://x.cn/a/photo.bmp"), ".jpg");
    }

    #[tokio::test]
    async fn test_download_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher =
            FakeFetcher::new().with_response(IMG, image_response("image/png", vec![1, 2, 3]));

        let path = download_image(&fetcher, IMG, "abc", date(), dir.path())
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("2024-11-14").join("abc.png"));
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_existing_file_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let existing = image_path(dir.path(), date(), "abc", IMG);
        std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
        std::fs::write(&existing, b"old").unwrap();
        let fetcher = FakeFetcher::new();

        let path = download_image(&fetcher, IMG, "abc", date(), dir.path())
            .await
            .unwrap();
        assert_eq!(path, existing);
        assert_eq!(fetcher.request_count(IMG), 0);
    }

    #[tokio::test]
    async fn test_rejects_non_image_and_oversized() {
        let dir = tempfile::tempdir().unwrap();
        let big = "https://n.sinaimg.cn/big.jpg";
        let fetcher = FakeFetcher::new()
            .with_response(IMG, image_response("text/html", b"<html>".to_vec()))
            .with_response(
                big,
                image_response("image/jpeg", vec![0; (MAX_IMAGE_BYTES + 1) as usize]),
            );

        assert!(matches!(
            download_image(&fetcher, IMG, "a", date(), dir.path()).await,
            Err(ImageError::NotAnImage { .. })
        ));
        assert!(matches!(
            download_image(&fetcher, big, "b", date(), dir.path()).await,
            Err(ImageError::TooLarge { .. })
        ));
        assert!(!image_path(dir.path(), date(), "b", big).exists());
    }

    #[tokio::test]
    async fn test_declared_length_refused_before_body() {
        let dir = tempfile::tempdir().unwrap();
        let mut response = image_response("image/jpeg", Vec::new());
        response
            .headers
            .insert(CONTENT_LENGTH, HeaderValue::from_static("20971520"));
        let fetcher = FakeFetcher::new().with_response(IMG, response);

        match download_image(&fetcher, IMG, "a", date(), dir.path()).await {
            Err(ImageError::TooLarge { size, limit, .. }) => {
                assert_eq!(size, 20 * 1024 * 1024);
                assert_eq!(limit, MAX_IMAGE_BYTES);
            }
            other => panic!("expected size rejection, got {other:?}"),
        }
        assert!(!image_path(dir.path(), date(), "a", IMG).exists());
    }

    #[tokio::test]
    async fn test_rejects_non_http_url() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FakeFetcher::new();
        assert!(matches!(
            download_image(
                &fetcher,
                "data:image/png;base64,AAAA",
                "a",
                date(),
                dir.path()
            )
            .await,
            Err(ImageError::UnsupportedUrl(_))
        ));
        assert!(fetcher.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_download_all_skips_failures() {
        let dir = tempfile::tempdir().unwrap();
        let ok = ArticleRecord::new(
            "https://tech.sina.com.cn/i/1.shtml",
            "t".into(),
            "<p>c</p>".into(),
            "c".into(),
            date(),
            Some(IMG.into()),
        );
        let broken = ArticleRecord::new(
            "https://tech.sina.com.cn/i/2.shtml",
            "t".into(),
            "<p>c</p>".into(),
            "c".into(),
            date(),
            Some("https://n.sinaimg.cn/missing.jpg".into()),
        );
        let none = ArticleRecord::new(
            "https://tech.sina.com.cn/i/3.shtml",
            "t".into(),
            "<p>c</p>".into(),
            "c".into(),
            date(),
            None,
        );
        let fetcher = FakeFetcher::new()
            .with_response(IMG, image_response("image/png", vec![9]))
            .with_failure(
                "https://n.sinaimg.cn/missing.jpg",
                FetchError::Timeout {
                    url: "https://n.sinaimg.cn/missing.jpg".into(),
                    attempts: 3,
                },
            );

        let saved = download_all(&fetcher, &[ok, broken, none], date(), dir.path()).await;
        assert_eq!(saved, 1);
    }
}

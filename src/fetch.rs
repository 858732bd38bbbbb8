use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;
use std::sync::LazyLock;

use camino::Utf8PathBuf;
use regex::Regex;
use tracing::{info, warn};

use crate::domain::{DownloadArtifact, ShareLinkId};
use crate::error::{OtfsError, VerificationFailure};
use crate::fs_util;
use crate::share::{ConfirmToken, HostResponse, ShareHost};

const INTERSTITIAL_LIMIT: u64 = 4 * 1024 * 1024;
const SNIFF_LEN: usize = 512;

static CONFIRM_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"confirm=([0-9A-Za-z_\-]+)").expect("valid regex"));
static CONFIRM_INPUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"name="confirm"\s+value="([0-9A-Za-z_\-]+)""#).expect("valid regex")
});
static UUID_INPUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"name="uuid"\s+value="([0-9A-Za-z_\-]+)""#).expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SniffedType {
    Zip,
    Html,
    Other,
}

impl SniffedType {
    pub fn mime(self) -> &'static str {
        match self {
            SniffedType::Zip => "application/zip",
            SniffedType::Html => "text/html",
            SniffedType::Other => "application/octet-stream",
        }
    }
}

/// Classifies a payload by its leading bytes, ignoring whatever the server declared.
pub fn sniff(head: &[u8]) -> SniffedType {
    if head.starts_with(b"PK\x03\x04") || head.starts_with(b"PK\x05\x06") {
        return SniffedType::Zip;
    }
    let text = String::from_utf8_lossy(head);
    let lowered = text.trim_start_matches('\u{feff}').trim_start().to_ascii_lowercase();
    if lowered.starts_with("<!doctype html")
        || lowered.starts_with("<html")
        || lowered.starts_with("<head")
        || (lowered.starts_with('<') && lowered.contains("<html"))
    {
        return SniffedType::Html;
    }
    SniffedType::Other
}

pub fn extract_confirm_token(html: &str, cookies: &[(String, String)]) -> Option<ConfirmToken> {
    let confirm = CONFIRM_PARAM
        .captures(html)
        .or_else(|| CONFIRM_INPUT.captures(html))
        .map(|caps| caps[1].to_string())
        .or_else(|| {
            cookies
                .iter()
                .find(|(name, value)| name.starts_with("download_warning") && !value.is_empty())
                .map(|(_, value)| value.clone())
        })?;
    let uuid = UUID_INPUT.captures(html).map(|caps| caps[1].to_string());
    Some(ConfirmToken { confirm, uuid })
}

pub struct VerifiedFetcher<'a, H: ShareHost> {
    host: &'a H,
}

impl<'a, H: ShareHost> VerifiedFetcher<'a, H> {
    pub fn new(host: &'a H) -> Self {
        Self { host }
    }

    pub fn fetch(
        &self,
        link: &ShareLinkId,
        destination: &Path,
    ) -> Result<DownloadArtifact, OtfsError> {
        let url = self.host.download_url(link, None);
        let first = self.host.get(&url)?;
        let response = if first.is_html() {
            let cookies = first.cookies.clone();
            let html = read_interstitial(first)?;
            let Some(token) = extract_confirm_token(&html, &cookies) else {
                if mentions_quota(&html) {
                    warn!("share host reports an exceeded download quota");
                    return Err(VerificationFailure::QuotaExceeded.into());
                }
                return Err(OtfsError::ConfirmationTokenMissing {
                    link: link.to_string(),
                });
            };
            info!("share host returned a confirmation page, retrying with token");
            let confirmed = self.host.download_url(link, Some(&token));
            self.host.get(&confirmed)?
        } else {
            first
        };

        write_body(response, destination)?;
        let mut artifact = verify_archive(destination)?;
        artifact.source_link_id = Some(link.to_string());
        Ok(artifact)
    }
}

/// Empty check, content sniff and zip integrity, in that order.
pub fn verify_archive(path: &Path) -> Result<DownloadArtifact, OtfsError> {
    let size_bytes = fs::metadata(path)
        .map_err(|err| OtfsError::Filesystem(format!("{}: {err}", path.display())))?
        .len();
    if size_bytes == 0 {
        return Err(OtfsError::EmptyDownload(path.to_path_buf()));
    }

    let mut head = Vec::with_capacity(SNIFF_LEN);
    File::open(path)
        .and_then(|file| file.take(SNIFF_LEN as u64).read_to_end(&mut head))
        .map_err(|err| OtfsError::Filesystem(err.to_string()))?;
    let sniffed = sniff(&head);
    if sniffed == SniffedType::Html {
        let page = fs::read(path).map_err(|err| OtfsError::Filesystem(err.to_string()))?;
        warn!("payload is an HTML page");
        if mentions_quota(&String::from_utf8_lossy(&page)) {
            return Err(VerificationFailure::QuotaExceeded.into());
        }
        return Err(VerificationFailure::HtmlPayload.into());
    }

    let entries = fs_util::validate_zip(path)?;
    info!(bytes = size_bytes, entries, "archive verified");

    let local_path = Utf8PathBuf::from_path_buf(path.to_path_buf())
        .map_err(|_| OtfsError::Filesystem("non-utf8 download path".to_string()))?;
    Ok(DownloadArtifact {
        source_link_id: None,
        local_path,
        content_type: SniffedType::Zip.mime().to_string(),
        size_bytes,
        verified: true,
    })
}

fn mentions_quota(html: &str) -> bool {
    let lowered = html.to_ascii_lowercase();
    lowered.contains("quota exceeded") || lowered.contains("too many users have viewed or downloaded")
}

fn read_interstitial(response: HostResponse) -> Result<String, OtfsError> {
    let mut body = String::new();
    response
        .body
        .take(INTERSTITIAL_LIMIT)
        .read_to_string(&mut body)
        .map_err(|err| OtfsError::Download(err.to_string()))?;
    Ok(body)
}

fn write_body(response: HostResponse, destination: &Path) -> Result<(), OtfsError> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|err| OtfsError::Filesystem(err.to_string()))?;
    }
    let mut body = response.body;
    let mut file =
        File::create(destination).map_err(|err| OtfsError::Filesystem(err.to_string()))?;
    io::copy(&mut body, &mut file).map_err(|err| OtfsError::Download(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniff_detects_zip_and_html() {
        assert_eq!(sniff(b"PK\x03\x04rest"), SniffedType::Zip);
        assert_eq!(sniff(b"  <!DOCTYPE html><html>"), SniffedType::Html);
        assert_eq!(sniff(b"<HTML><body>"), SniffedType::Html);
        assert_eq!(sniff(b"\x00\x01binary"), SniffedType::Other);
    }

    #[test]
    fn token_from_query_parameter() {
        let html = r#"<a href="/uc?export=download&amp;confirm=AbC_12-x&amp;id=1">Download anyway</a>"#;
        let token = extract_confirm_token(html, &[]).unwrap();
        assert_eq!(token.confirm, "AbC_12-x");
        assert_eq!(token.uuid, None);
    }

    #[test]
    fn token_from_hidden_form_fields() {
        let html = r#"<form><input type="hidden" name="confirm" value="t"><input type="hidden" name="uuid" value="5f-2"></form>"#;
        let token = extract_confirm_token(html, &[]).unwrap();
        assert_eq!(token.confirm, "t");
        assert_eq!(token.uuid.as_deref(), Some("5f-2"));
    }

    #[test]
    fn token_from_cookie_fallback() {
        let cookies = vec![
            ("NID".to_string(), "x".to_string()),
            ("download_warning_123_abc".to_string(), "ckT".to_string()),
        ];
        let token = extract_confirm_token("<html>virus scan warning</html>", &cookies).unwrap();
        assert_eq!(token.confirm, "ckT");
    }

    #[test]
    fn no_token_anywhere() {
        assert!(extract_confirm_token("<html>Sign in</html>", &[]).is_none());
    }
}

//! Page fetching and lightweight HTML extraction.

use super::{Navigator, PageLink, PageSnapshot};
use crate::error::{QuizError, Result};
use async_trait::async_trait;
use base64::Engine;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, instrument};
use url::Url;

/// Link text or href fragments that suggest downloadable quiz data.
const DATA_LINK_HINTS: &[&str] = &["csv", "pdf", "json", "download", "api"];

static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<!--.*?-->").unwrap()
});
static BLOCK_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(p|div|li|tr|h[1-6]|pre|section|article)\s*>").unwrap()
});
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a\s*>"#).unwrap()
});
static AUDIO_SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<audio\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#).unwrap()
});
static AUDIO_SOURCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<audio\b.*?<source\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#).unwrap()
});
static FORM_ACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<form\b[^>]*?\baction\s*=\s*["']([^"']+)["']"#).unwrap()
});
static INLINE_SCRIPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b[^>]*>(.*?)</script\s*>").unwrap());
static ATOB_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"atob\(\s*["'`]([A-Za-z0-9+/=\s]+)["'`]\s*\)"#).unwrap()
});
static SUBMIT_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https://[^\s"'<>]+submit"#).unwrap());

/// Navigator that fetches pages over plain HTTP.
///
/// No JavaScript is executed. Markup a script decodes from an `atob("...")`
/// literal is recovered and treated as part of the page.
pub struct HttpNavigator {
    http: reqwest::Client,
}

impl HttpNavigator {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (compatible; quizbot/0.1)")
            .timeout(timeout)
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Navigator for HttpNavigator {
    #[instrument(skip(self))]
    async fn navigate(&self, url: &str) -> Result<PageSnapshot> {
        info!("Navigating to {}", url);

        let base = Url::parse(url).map_err(|e| QuizError::Navigation(format!("{}: {}", url, e)))?;

        let response = self.http.get(base.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(QuizError::Navigation(format!("HTTP {} for {}", status, url)));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_default();

        let body = response.text().await?;
        debug!("Fetched {} bytes ({})", body.len(), content_type);

        if content_type.is_empty() || content_type.contains("html") {
            Ok(extract_page(&body, &base))
        } else {
            Ok(PageSnapshot {
                text: body,
                ..PageSnapshot::default()
            })
        }
    }
}

/// Extract visible text, data links, audio and submission URL from HTML.
pub fn extract_page(html: &str, base: &Url) -> PageSnapshot {
    let mut cleaned = SCRIPT_OR_STYLE.replace_all(html, " ").into_owned();
    for fragment in script_fragments(html) {
        cleaned.push('\n');
        cleaned.push_str(&fragment);
    }

    let links = ANCHOR
        .captures_iter(&cleaned)
        .filter_map(|caps| {
            let href = resolve(base, caps.get(1)?.as_str())?;
            let text = collapse_whitespace(&html_decode(&TAG.replace_all(&caps[2], " ")));
            Some(PageLink { href, text })
        })
        .filter(|link| is_data_link(link))
        .collect();

    let audio = AUDIO_SRC
        .captures(&cleaned)
        .or_else(|| AUDIO_SOURCE.captures(&cleaned))
        .and_then(|caps| resolve(base, &caps[1]));

    let text = visible_text(&cleaned);

    let submission_url = FORM_ACTION
        .captures(&cleaned)
        .and_then(|caps| resolve(base, &caps[1]))
        .or_else(|| SUBMIT_URL.find(&text).map(|m| m.as_str().to_string()));

    PageSnapshot {
        text,
        links,
        audio,
        submission_url,
    }
}

/// Decode base64 literals passed to `atob` in inline scripts.
fn script_fragments(html: &str) -> Vec<String> {
    INLINE_SCRIPT
        .captures_iter(html)
        .flat_map(|script| {
            ATOB_LITERAL
                .captures_iter(script.get(1).map_or("", |m| m.as_str()))
                .filter_map(|caps| {
                    let encoded: String =
                        caps[1].chars().filter(|c| !c.is_whitespace()).collect();
                    let bytes = base64::engine::general_purpose::STANDARD
                        .decode(encoded)
                        .ok()?;
                    String::from_utf8(bytes).ok()
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

fn visible_text(html: &str) -> String {
    let with_breaks = BLOCK_BREAK.replace_all(html, "\n");
    let stripped = TAG.replace_all(&with_breaks, " ");
    html_decode(&stripped)
        .lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_data_link(link: &PageLink) -> bool {
    let text = link.text.to_lowercase();
    let href = link.href.to_lowercase();
    DATA_LINK_HINTS
        .iter()
        .any(|hint| text.contains(hint) || href.contains(hint))
}

fn resolve(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    base.join(&html_decode(href)).ok().map(|u| u.to_string())
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Basic HTML entity decoding.
fn html_decode(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

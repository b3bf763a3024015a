//! Captcha and Cloudflare challenge detection
//!
//! Indexer responses that are really challenge pages surface as typed
//! protocol failures so the orchestrator can pause the indexer instead of
//! retrying into a wall.

use cinephage_core::IndexerErrorKind;
use once_cell::sync::Lazy;
use regex::Regex;

/// The challenge wall a response turned out to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeKind {
    RecaptchaV2,
    RecaptchaV3,
    Hcaptcha,
    Turnstile,
    ImageCaptcha,
    Cloudflare,
}

impl ChallengeKind {
    pub fn error_kind(&self) -> IndexerErrorKind {
        match self {
            ChallengeKind::Cloudflare => IndexerErrorKind::Cloudflare,
            _ => IndexerErrorKind::Captcha,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ChallengeKind::RecaptchaV2 => "reCAPTCHA v2 challenge",
            ChallengeKind::RecaptchaV3 => "reCAPTCHA v3 challenge",
            ChallengeKind::Hcaptcha => "hCaptcha challenge",
            ChallengeKind::Turnstile => "Cloudflare Turnstile challenge",
            ChallengeKind::ImageCaptcha => "image captcha challenge",
            ChallengeKind::Cloudflare => "Cloudflare browser challenge",
        }
    }
}

static RECAPTCHA_V3: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)recaptcha/api\.js\?render=|grecaptcha\.execute"#).unwrap());
static RECAPTCHA_V2: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)g-recaptcha|recaptcha/api\.js|data-sitekey"#).unwrap());
static HCAPTCHA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)h-captcha|hcaptcha\.com/1/api\.js"#).unwrap());
static TURNSTILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)cf-turnstile|challenges\.cloudflare\.com/turnstile"#).unwrap()
});
static IMAGE_CAPTCHA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)captcha\.(php|png|jpg|gif)|id="captcha"|name="captcha""#).unwrap()
});

static CLOUDFLARE_BODY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)cf-browser-verification|cf_chl_|challenge-platform|ddos-guard|checking your browser")
        .unwrap()
});
static JUST_A_MOMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<title>\s*just a moment").unwrap());

const CHALLENGE_SERVERS: &[&str] = &["cloudflare", "cloudflare-nginx", "ddos-guard"];
const CHALLENGE_STATUSES: &[u16] = &[503, 403, 429];

/// Inspect a provider response for a challenge wall.
///
/// Cloudflare is recognized either by the (server header, status, body
/// pattern) triple or by the "Just a moment..." title alone; the latter
/// catches challenge pages served with a 200 status.
pub fn detect_challenge(status: u16, server: Option<&str>, body: &str) -> Option<ChallengeKind> {
    let server_matches = server
        .map(|value| {
            let value = value.to_ascii_lowercase();
            CHALLENGE_SERVERS.iter().any(|known| value.contains(known))
        })
        .unwrap_or(false);

    if server_matches && CHALLENGE_STATUSES.contains(&status) && CLOUDFLARE_BODY.is_match(body) {
        return Some(ChallengeKind::Cloudflare);
    }
    if JUST_A_MOMENT.is_match(body) {
        return Some(ChallengeKind::Cloudflare);
    }

    if TURNSTILE.is_match(body) {
        return Some(ChallengeKind::Turnstile);
    }
    if RECAPTCHA_V3.is_match(body) {
        return Some(ChallengeKind::RecaptchaV3);
    }
    if RECAPTCHA_V2.is_match(body) {
        return Some(ChallengeKind::RecaptchaV2);
    }
    if HCAPTCHA.is_match(body) {
        return Some(ChallengeKind::Hcaptcha);
    }
    if IMAGE_CAPTCHA.is_match(body) {
        return Some(ChallengeKind::ImageCaptcha);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cloudflare_challenge_with_blocking_status() {
        let body = r#"<html><body>cf-browser-verification in progress</body></html>"#;
        assert_eq!(
            detect_challenge(503, Some("cloudflare"), body),
            Some(ChallengeKind::Cloudflare)
        );
        assert_eq!(
            detect_challenge(429, Some("ddos-guard"), "DDoS-Guard checking your browser"),
            Some(ChallengeKind::Cloudflare)
        );
    }

    #[test]
    fn just_a_moment_page_with_200_status() {
        // challenge pages are sometimes served with a 200
        let body = "<html><head><title>Just a moment...</title></head></html>";
        assert_eq!(
            detect_challenge(200, None, body),
            Some(ChallengeKind::Cloudflare)
        );
    }

    #[test]
    fn status_alone_is_not_a_challenge() {
        assert_eq!(detect_challenge(503, Some("cloudflare"), "plain error"), None);
        assert_eq!(detect_challenge(503, Some("nginx"), "cf_chl_ stuff"), None);
    }

    #[test]
    fn captcha_variants() {
        assert_eq!(
            detect_challenge(200, None, r#"<script src="https://www.google.com/recaptcha/api.js?render=sitekey">"#),
            Some(ChallengeKind::RecaptchaV3)
        );
        assert_eq!(
            detect_challenge(200, None, r#"<div class="g-recaptcha" data-sitekey="x">"#),
            Some(ChallengeKind::RecaptchaV2)
        );
        assert_eq!(
            detect_challenge(200, None, r#"<script src="https://hcaptcha.com/1/api.js">"#),
            Some(ChallengeKind::Hcaptcha)
        );
        assert_eq!(
            detect_challenge(200, None, r#"<div class="cf-turnstile" data-sitekey="x">"#),
            Some(ChallengeKind::Turnstile)
        );
        assert_eq!(
            detect_challenge(200, None, r#"<img src="/captcha.php?id=3">"#),
            Some(ChallengeKind::ImageCaptcha)
        );
    }

    #[test]
    fn clean_page_passes() {
        let body = "<html><body><table><tr><td>Movie.2024.1080p</td></tr></table></body></html>";
        assert_eq!(detect_challenge(200, Some("nginx"), body), None);
    }

    #[test]
    fn error_kinds_map_to_protocol_failures() {
        assert_eq!(
            ChallengeKind::Cloudflare.error_kind(),
            IndexerErrorKind::Cloudflare
        );
        assert_eq!(
            ChallengeKind::RecaptchaV2.error_kind(),
            IndexerErrorKind::Captcha
        );
    }
}

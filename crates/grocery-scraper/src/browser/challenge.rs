use futures::FutureExt;
use grocery_core::StoreId;

use super::poll::{poll_until, PollOutcome, PollPolicy};
use super::BrowserSession;
use crate::error::ScraperError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interstitial {
    /// Store picker or location-permission overlay.
    LocationConsent,
    /// Automated-traffic check (Cloudflare, Akamai, Incapsula).
    TrafficChallenge,
}

const CHALLENGE_TITLES: &[&str] = &[
    "just a moment",
    "attention required",
    "access denied",
    "pardon our interruption",
    "security check",
];

const CHALLENGE_BODY: &[&str] = &[
    "connection needs to be verified",
    "verify you are human",
    "checking your browser",
    "unusual traffic",
    "press & hold",
    "enable javascript and cookies to continue",
];

const LOCATION_BODY: &[&str] = &[
    "choose your store",
    "select your store",
    "select a store",
    "set your location",
    "share your location",
    "enter your postcode",
];

/// Buttons that dismiss a location overlay when clicked.
const DISMISS_SELECTORS: &[&str] = &[
    "button[aria-label='Close']",
    "button[aria-label='close']",
    "[data-testid='close-button']",
    "[class*='modal'] button[class*='close']",
];

/// Classify the current page by its title and visible text.
#[must_use]
pub fn detect_interstitial(title: &str, body: &str) -> Option<Interstitial> {
    let title = title.to_lowercase();
    let body = body.to_lowercase();

    if CHALLENGE_TITLES.iter().any(|s| title.contains(s))
        || CHALLENGE_BODY.iter().any(|s| body.contains(s))
    {
        return Some(Interstitial::TrafficChallenge);
    }
    if LOCATION_BODY.iter().any(|s| body.contains(s)) {
        return Some(Interstitial::LocationConsent);
    }
    None
}

/// Raw-HTML check for a challenge page served in place of content.
#[must_use]
pub fn looks_like_bot_challenge(body: &str) -> bool {
    let lowered = body.to_ascii_lowercase();
    let has_cloudflare_banner = lowered.contains("attention required! | cloudflare");
    let has_challenge_platform = lowered.contains("/cdn-cgi/challenge-platform/");
    let has_just_a_moment = lowered.contains("just a moment...");
    let has_cookie_gate = lowered.contains("please enable cookies");
    let has_cf_chl = lowered.contains("cf-chl-");
    let has_verify_gate = lowered.contains("connection needs to be verified");

    has_cloudflare_banner
        || has_challenge_platform
        || has_verify_gate
        || (has_just_a_moment && has_cookie_gate)
        || (has_just_a_moment && has_cf_chl)
}

async fn current_interstitial(session: &mut dyn BrowserSession) -> Option<Interstitial> {
    let title = session.title().await.unwrap_or_default();
    let body = session.body_text().await.unwrap_or_default();
    detect_interstitial(&title, &body)
}

/// Wait out any interstitial on the freshly loaded page.
///
/// Best effort: when the wait times out the [`ScraperError::ChallengeTimeout`]
/// is logged and the caller proceeds with whatever rendered.
pub async fn settle(session: &mut dyn BrowserSession, store: StoreId, policy: &PollPolicy) {
    let Some(kind) = current_interstitial(session).await else {
        return;
    };
    tracing::info!(store = %store, interstitial = ?kind, "interstitial detected, waiting for it to clear");

    if kind == Interstitial::LocationConsent {
        for selector in DISMISS_SELECTORS {
            match session.click_first(selector).await {
                Ok(true) => break,
                Ok(false) => {}
                Err(e) => tracing::debug!(store = %store, selector, error = %e, "dismiss click failed"),
            }
        }
    }

    let outcome = poll_until(session, policy, |s| {
        async move { current_interstitial(s).await.is_none() }.boxed()
    })
    .await;

    if let PollOutcome::TimedOut { polls, waited } = outcome {
        let err = ScraperError::ChallengeTimeout {
            store,
            waited_secs: waited.as_secs(),
        };
        tracing::warn!(store = %store, polls, error = %err, "continuing with best-effort extraction");
    }
}

//! Engine failure classification
//!
//! The engine reports failures as free text. [`classify`] maps that text to a
//! stable [`ErrorCategory`] plus a human-readable message so callers can tell
//! transient conditions (rate limiting, network) from permanent ones
//! (private, age-restricted, members-only) without parsing the raw output.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Stable failure category attached to a task in `error`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The host is throttling requests
    RateLimited,
    /// Host refused to serve the content right now (often throttling in disguise)
    ContentUnavailable,
    /// Video removed, hidden or otherwise unavailable
    VideoUnavailable,
    /// Private video
    Private,
    /// Age-restricted, needs a signed-in credential
    AgeRestricted,
    /// Channel membership required
    MembersOnly,
    /// Blocked in the server's region
    GeoRestricted,
    /// Connectivity failure
    Network,
    /// Extraction/merge step failed
    Transcoding,
    /// Engine reported success but the artifact could not be located
    FileMissing,
    /// Nothing matched; the message carries the raw text
    Unknown,
}

impl ErrorCategory {
    /// Whether retrying the same request later may succeed
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorCategory::RateLimited | ErrorCategory::ContentUnavailable | ErrorCategory::Network
        )
    }
}

/// Category and caller-facing message for one failure
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassifiedError {
    /// Stable category
    pub category: ErrorCategory,
    /// Human-readable message
    pub message: String,
}

/// How a rule's needles are matched against the lowercased message
enum Pattern {
    /// Any needle present
    Any(&'static [&'static str]),
    /// Every needle present
    All(&'static [&'static str]),
}

impl Pattern {
    fn matches(&self, haystack: &str) -> bool {
        match self {
            Pattern::Any(needles) => needles.iter().any(|n| haystack.contains(n)),
            Pattern::All(needles) => needles.iter().all(|n| haystack.contains(n)),
        }
    }
}

// Messages often satisfy several rules; the first match wins.
const RULES: &[(Pattern, ErrorCategory, &str)] = &[
    (
        Pattern::Any(&["rate-limit", "rate limit"]),
        ErrorCategory::RateLimited,
        "The host's rate limit was reached. Wait about an hour and try again.",
    ),
    (
        Pattern::Any(&["this content isn't available"]),
        ErrorCategory::ContentUnavailable,
        "This video is not available right now, possibly due to rate limiting. Wait a while and try again.",
    ),
    (
        Pattern::Any(&["video unavailable", "not available"]),
        ErrorCategory::VideoUnavailable,
        "This video is unavailable. It may have been removed or made private.",
    ),
    (
        Pattern::Any(&["private video"]),
        ErrorCategory::Private,
        "This video is private.",
    ),
    (
        Pattern::All(&["age", "restrict"]),
        ErrorCategory::AgeRestricted,
        "This video is age-restricted. Upload a cookie file from a signed-in account and try again.",
    ),
    (
        Pattern::Any(&["members-only", "member"]),
        ErrorCategory::MembersOnly,
        "This video is for channel members only. Upload a cookie file from an account with membership.",
    ),
    (
        Pattern::Any(&["geo", "country"]),
        ErrorCategory::GeoRestricted,
        "This video is not available in the server's region.",
    ),
    (
        Pattern::Any(&["network", "connection"]),
        ErrorCategory::Network,
        "A network error occurred. Check the connection and try again.",
    ),
    (
        Pattern::Any(&["ffmpeg"]),
        ErrorCategory::Transcoding,
        "Converting the media failed. Check that FFmpeg is installed correctly.",
    ),
];

/// Classify raw engine failure text
///
/// Matching is case-insensitive substring matching in priority order:
/// rate-limit, content-unavailable, video-unavailable, private,
/// age-restricted, members-only, geo-restricted, network, transcoding.
/// Unmatched text yields [`ErrorCategory::Unknown`] with the raw text embedded.
pub fn classify(raw: &str) -> ClassifiedError {
    let lower = raw.to_lowercase();

    RULES
        .iter()
        .find(|(pattern, _, _)| pattern.matches(&lower))
        .map(|(_, category, message)| ClassifiedError {
            category: *category,
            message: (*message).to_string(),
        })
        .unwrap_or_else(|| ClassifiedError {
            category: ErrorCategory::Unknown,
            message: format!("Download failed: {}", raw.trim()),
        })
}

/// Failure recorded when the engine succeeded but no artifact was found
pub fn file_missing(expected: &str) -> ClassifiedError {
    ClassifiedError {
        category: ErrorCategory::FileMissing,
        message: format!("Downloaded file could not be found after the engine finished ({expected})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_messages_map_to_distinct_categories() {
        let cases = [
            ("rate-limit exceeded", ErrorCategory::RateLimited),
            ("Private video", ErrorCategory::Private),
            ("age-restricted content", ErrorCategory::AgeRestricted),
            ("members-only video", ErrorCategory::MembersOnly),
        ];

        for (raw, expected) in cases {
            assert_eq!(classify(raw).category, expected, "classifying {raw:?}");
        }
    }

    #[test]
    fn unknown_message_keeps_raw_text() {
        let classified = classify("ERROR: something odd happened");
        assert_eq!(classified.category, ErrorCategory::Unknown);
        assert!(classified.message.contains("ERROR: something odd happened"));
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(
            classify("HTTP Error 429: RATE LIMIT").category,
            ErrorCategory::RateLimited
        );
        assert_eq!(
            classify("ERROR: Postprocessing: FFMPEG exited").category,
            ErrorCategory::Transcoding
        );
    }

    #[test]
    fn earlier_rules_win_ties() {
        // Contains both "video unavailable" and "private video"
        let raw = "Video unavailable. This is a private video";
        assert_eq!(classify(raw).category, ErrorCategory::VideoUnavailable);

        // Rate limiting outranks everything
        let raw = "rate limit hit while fetching members-only video";
        assert_eq!(classify(raw).category, ErrorCategory::RateLimited);

        // Content-unavailable outranks the generic "not available"
        let raw = "This content isn't available, try again later";
        assert_eq!(classify(raw).category, ErrorCategory::ContentUnavailable);
    }

    #[test]
    fn private_outranks_age_restriction() {
        let raw = "Private video; sign in to confirm your age, restricted";
        assert_eq!(classify(raw).category, ErrorCategory::Private);
    }

    #[test]
    fn age_restriction_outranks_members_only() {
        let raw = "Sign in to confirm your age. This video may be restricted to members";
        assert_eq!(classify(raw).category, ErrorCategory::AgeRestricted);
    }

    #[test]
    fn remaining_rules_match() {
        assert_eq!(
            classify("ERROR: [youtube] abc: Video unavailable").category,
            ErrorCategory::VideoUnavailable
        );
        assert_eq!(
            classify("The uploader has not made this video available in your country").category,
            ErrorCategory::GeoRestricted
        );
        assert_eq!(
            classify("Connection reset by peer").category,
            ErrorCategory::Network
        );
    }

    #[test]
    fn transient_categories() {
        assert!(ErrorCategory::RateLimited.is_transient());
        assert!(ErrorCategory::Network.is_transient());
        assert!(!ErrorCategory::Private.is_transient());
        assert!(!ErrorCategory::FileMissing.is_transient());
    }

    #[test]
    fn file_missing_has_its_own_category() {
        let classified = file_missing("Song-abc.m4a");
        assert_eq!(classified.category, ErrorCategory::FileMissing);
        assert!(classified.message.contains("Song-abc.m4a"));
    }
}

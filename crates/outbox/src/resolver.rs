//! Destination and consent resolution.
//!
//! Given a channel and either an explicit destination or a user id, produce the
//! concrete address to send to, or a block with a human-readable reason.
//!
//! - An explicit destination is used as-is with no consent check; the caller
//!   has already validated it (e.g. an OTP sent before a profile exists).
//! - Email resolves to the verified account email.
//! - SMS and voice resolve to the verified profile phone, then pass the consent
//!   gate: consent granted and not opted out.
//! - Voice is blocked as a consent block while no live voice sender exists,
//!   after the phone has been resolved.
//!
//! A consent block always carries the resolved destination; only a
//! no-destination block leaves it empty.
//!
//! Resolution only reads the profile snapshot; it never changes consent state.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use draftbell_common::error::AppError;
use draftbell_common::types::{Channel, NotificationStatus, UserProfile};

use crate::profile::ProfileStore;

/// Why a notification cannot be dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    NoDestination,
    NoConsent,
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockReason::NoDestination => "no_destination",
            BlockReason::NoConsent => "no_consent",
        }
    }

    /// Terminal status a blocked record is created in.
    pub fn status(&self) -> NotificationStatus {
        match self {
            BlockReason::NoDestination => NotificationStatus::BlockedNoDestination,
            BlockReason::NoConsent => NotificationStatus::BlockedNoConsent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved { destination: String },
    Blocked {
        reason: BlockReason,
        details: String,
        destination: Option<String>,
    },
}

impl Resolution {
    fn no_destination(details: &str) -> Self {
        Resolution::Blocked {
            reason: BlockReason::NoDestination,
            details: details.to_string(),
            destination: None,
        }
    }

    fn no_consent(destination: &str, details: impl Into<String>) -> Self {
        Resolution::Blocked {
            reason: BlockReason::NoConsent,
            details: details.into(),
            destination: Some(destination.to_string()),
        }
    }
}

const VOICE_UNSUPPORTED: &str = "Voice notifications are not supported yet";

/// Profile data the policy needs, fetched up front.
#[derive(Debug, Clone, Default)]
pub struct ProfileSnapshot {
    pub verified_email: Option<String>,
    pub profile: Option<UserProfile>,
}

/// Pure resolution policy.
pub fn decide(
    channel: Channel,
    explicit_destination: Option<&str>,
    has_user: bool,
    snapshot: &ProfileSnapshot,
    voice_supported: bool,
) -> Resolution {
    let voice_blocked = channel == Channel::Voice && !voice_supported;

    if let Some(destination) = explicit_destination.filter(|d| !d.trim().is_empty()) {
        if voice_blocked {
            return Resolution::no_consent(destination, VOICE_UNSUPPORTED);
        }
        return Resolution::Resolved {
            destination: destination.to_string(),
        };
    }

    if !has_user {
        return Resolution::no_destination("No destination or user id supplied");
    }

    match channel {
        Channel::Email => match snapshot.verified_email.as_deref() {
            Some(email) if !email.is_empty() => Resolution::Resolved {
                destination: email.to_string(),
            },
            _ => Resolution::no_destination("No verified email on file"),
        },
        Channel::Sms | Channel::Voice => {
            let Some(profile) = snapshot.profile.as_ref() else {
                return Resolution::no_destination("No notification settings found");
            };
            let phone = match profile.phone_e164.as_deref() {
                Some(phone) if !phone.is_empty() => phone,
                _ => return Resolution::no_destination("No phone number on file"),
            };
            if !profile.phone_verified {
                return Resolution::no_destination("Phone number not verified");
            }
            if voice_blocked {
                return Resolution::no_consent(phone, VOICE_UNSUPPORTED);
            }

            let (consent, opted_out, label) = if channel == Channel::Sms {
                (profile.sms_consent, profile.opted_out_sms, "SMS")
            } else {
                (profile.voice_consent, profile.opted_out_voice, "voice")
            };
            if !consent {
                return Resolution::no_consent(phone, format!("{} consent not granted", label));
            }
            if opted_out {
                return Resolution::no_consent(phone, format!("User opted out of {}", label));
            }

            Resolution::Resolved {
                destination: phone.to_string(),
            }
        }
        Channel::Push => {
            Resolution::no_destination("Push destinations cannot be resolved from a user profile")
        }
    }
}

/// Resolver bound to a profile store.
#[derive(Clone)]
pub struct Resolver {
    profiles: Arc<dyn ProfileStore>,
    voice_supported: bool,
}

impl Resolver {
    pub fn new(profiles: Arc<dyn ProfileStore>, voice_supported: bool) -> Self {
        Self {
            profiles,
            voice_supported,
        }
    }

    pub async fn resolve(
        &self,
        channel: Channel,
        explicit_destination: Option<&str>,
        user_id: Option<Uuid>,
    ) -> Result<Resolution, AppError> {
        let needs_lookup = explicit_destination.is_none_or(|d| d.trim().is_empty());

        let mut snapshot = ProfileSnapshot::default();
        if let (true, Some(user_id)) = (needs_lookup, user_id) {
            match channel {
                Channel::Email => {
                    snapshot.verified_email = self.profiles.verified_email(user_id).await?;
                }
                Channel::Sms | Channel::Voice => {
                    snapshot.profile = self.profiles.profile(user_id).await?;
                }
                Channel::Push => {}
            }
        }

        Ok(decide(
            channel,
            explicit_destination,
            user_id.is_some(),
            &snapshot,
            self.voice_supported,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verified_phone() -> UserProfile {
        UserProfile {
            phone_e164: Some("+15551234567".to_string()),
            phone_verified: true,
            sms_consent: true,
            opted_out_sms: false,
            voice_consent: true,
            opted_out_voice: false,
        }
    }

    fn with_profile(profile: UserProfile) -> ProfileSnapshot {
        ProfileSnapshot {
            verified_email: None,
            profile: Some(profile),
        }
    }

    fn blocked_reason(resolution: Resolution) -> BlockReason {
        match resolution {
            Resolution::Blocked { reason, .. } => reason,
            other => panic!("expected block, got {:?}", other),
        }
    }

    #[test]
    fn test_explicit_destination_skips_consent() {
        let snapshot = with_profile(UserProfile::default());
        let res = decide(Channel::Sms, Some("+15559990000"), true, &snapshot, false);
        assert_eq!(
            res,
            Resolution::Resolved {
                destination: "+15559990000".to_string()
            }
        );
    }

    #[test]
    fn test_blank_explicit_destination_falls_back_to_profile() {
        let snapshot = with_profile(verified_phone());
        let res = decide(Channel::Sms, Some("  "), true, &snapshot, false);
        assert_eq!(
            res,
            Resolution::Resolved {
                destination: "+15551234567".to_string()
            }
        );
    }

    #[test]
    fn test_email_requires_verified_address() {
        let empty = ProfileSnapshot::default();
        assert_eq!(
            blocked_reason(decide(Channel::Email, None, true, &empty, false)),
            BlockReason::NoDestination
        );

        let snapshot = ProfileSnapshot {
            verified_email: Some("gm@example.com".to_string()),
            profile: None,
        };
        assert_eq!(
            decide(Channel::Email, None, true, &snapshot, false),
            Resolution::Resolved {
                destination: "gm@example.com".to_string()
            }
        );
    }

    #[test]
    fn test_sms_unverified_phone_is_no_destination() {
        let mut profile = verified_phone();
        profile.phone_verified = false;
        let res = decide(Channel::Sms, None, true, &with_profile(profile), false);
        assert_eq!(blocked_reason(res), BlockReason::NoDestination);
    }

    #[test]
    fn test_sms_missing_settings_is_no_destination() {
        let res = decide(Channel::Sms, None, true, &ProfileSnapshot::default(), false);
        assert_eq!(blocked_reason(res), BlockReason::NoDestination);
    }

    #[test]
    fn test_sms_without_consent_keeps_resolved_phone() {
        let mut profile = verified_phone();
        profile.sms_consent = false;
        let res = decide(Channel::Sms, None, true, &with_profile(profile), false);
        assert_eq!(
            res,
            Resolution::Blocked {
                reason: BlockReason::NoConsent,
                details: "SMS consent not granted".to_string(),
                destination: Some("+15551234567".to_string()),
            }
        );
    }

    #[test]
    fn test_sms_opted_out_is_no_consent() {
        let mut profile = verified_phone();
        profile.opted_out_sms = true;
        match decide(Channel::Sms, None, true, &with_profile(profile), false) {
            Resolution::Blocked {
                reason,
                details,
                destination,
            } => {
                assert_eq!(reason, BlockReason::NoConsent);
                assert!(details.contains("opted out"));
                assert_eq!(destination.as_deref(), Some("+15551234567"));
            }
            other => panic!("expected block, got {:?}", other),
        }
    }

    #[test]
    fn test_voice_blocked_while_unsupported() {
        let snapshot = with_profile(verified_phone());
        match decide(Channel::Voice, None, true, &snapshot, false) {
            Resolution::Blocked {
                reason, destination, ..
            } => {
                assert_eq!(reason, BlockReason::NoConsent);
                assert_eq!(destination.as_deref(), Some("+15551234567"));
            }
            other => panic!("expected block, got {:?}", other),
        }

        let res = decide(Channel::Voice, Some("+15559990000"), false, &snapshot, false);
        assert_eq!(
            res,
            Resolution::Blocked {
                reason: BlockReason::NoConsent,
                details: VOICE_UNSUPPORTED.to_string(),
                destination: Some("+15559990000".to_string()),
            }
        );
    }

    #[test]
    fn test_voice_without_phone_is_no_destination() {
        let mut profile = verified_phone();
        profile.phone_verified = false;
        let res = decide(Channel::Voice, None, true, &with_profile(profile), false);
        assert_eq!(
            res,
            Resolution::Blocked {
                reason: BlockReason::NoDestination,
                details: "Phone number not verified".to_string(),
                destination: None,
            }
        );
    }

    #[test]
    fn test_voice_uses_voice_flags_when_supported() {
        let mut profile = verified_phone();
        profile.voice_consent = false;
        let res = decide(Channel::Voice, None, true, &with_profile(profile.clone()), true);
        assert_eq!(blocked_reason(res), BlockReason::NoConsent);

        profile.voice_consent = true;
        let res = decide(Channel::Voice, None, true, &with_profile(profile), true);
        assert!(matches!(res, Resolution::Resolved { .. }));
    }

    #[test]
    fn test_push_needs_explicit_destination() {
        let res = decide(Channel::Push, None, true, &ProfileSnapshot::default(), false);
        assert_eq!(blocked_reason(res), BlockReason::NoDestination);

        let res = decide(Channel::Push, Some("device-token"), true, &ProfileSnapshot::default(), false);
        assert!(matches!(res, Resolution::Resolved { .. }));
    }
}

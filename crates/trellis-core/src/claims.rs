//! LTI claim vocabulary and the id_token payload model.
//!
//! Claim names in LTI 1.3 are full IMS purl URIs; the constants here are
//! the ones this library reads or writes. The payload model keeps every
//! claim optional so that parsing never fails on an absent claim - the
//! validator decides which absences are errors and with which code.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// LTI version asserted by the version claim.
pub const LTI_VERSION_1P3: &str = "1.3.0";

// Message claims
pub const CLAIM_MESSAGE_TYPE: &str = "https://purl.imsglobal.org/spec/lti/claim/message_type";
pub const CLAIM_VERSION: &str = "https://purl.imsglobal.org/spec/lti/claim/version";
pub const CLAIM_DEPLOYMENT_ID: &str = "https://purl.imsglobal.org/spec/lti/claim/deployment_id";
pub const CLAIM_TARGET_LINK_URI: &str = "https://purl.imsglobal.org/spec/lti/claim/target_link_uri";
pub const CLAIM_RESOURCE_LINK: &str = "https://purl.imsglobal.org/spec/lti/claim/resource_link";
pub const CLAIM_ROLES: &str = "https://purl.imsglobal.org/spec/lti/claim/roles";
pub const CLAIM_FOR_USER: &str = "https://purl.imsglobal.org/spec/lti/claim/for_user";
pub const CLAIM_CONTEXT: &str = "https://purl.imsglobal.org/spec/lti/claim/context";
pub const CLAIM_CUSTOM: &str = "https://purl.imsglobal.org/spec/lti/claim/custom";
pub const CLAIM_LAUNCH_PRESENTATION: &str =
    "https://purl.imsglobal.org/spec/lti/claim/launch_presentation";
pub const CLAIM_TOOL_PLATFORM: &str = "https://purl.imsglobal.org/spec/lti/claim/tool_platform";

// Deep linking claims
pub const CLAIM_DL_SETTINGS: &str =
    "https://purl.imsglobal.org/spec/lti-dl/claim/deep_linking_settings";
pub const CLAIM_DL_CONTENT_ITEMS: &str =
    "https://purl.imsglobal.org/spec/lti-dl/claim/content_items";
pub const CLAIM_DL_DATA: &str = "https://purl.imsglobal.org/spec/lti-dl/claim/data";

// Service claims and scopes
pub const CLAIM_NRPS: &str = "https://purl.imsglobal.org/spec/lti-nrps/claim/namesroleservice";
pub const SCOPE_NRPS_MEMBERSHIP_READONLY: &str =
    "https://purl.imsglobal.org/spec/lti-nrps/scope/contextmembership.readonly";
pub const CLAIM_AGS: &str = "https://purl.imsglobal.org/spec/lti-ags/claim/endpoint";
pub const SCOPE_AGS_LINEITEM: &str = "https://purl.imsglobal.org/spec/lti-ags/scope/lineitem";
pub const SCOPE_AGS_LINEITEM_READONLY: &str =
    "https://purl.imsglobal.org/spec/lti-ags/scope/lineitem.readonly";
pub const SCOPE_AGS_RESULT_READONLY: &str =
    "https://purl.imsglobal.org/spec/lti-ags/scope/result.readonly";
pub const SCOPE_AGS_SCORE: &str = "https://purl.imsglobal.org/spec/lti-ags/scope/score";
pub const CLAIM_GS: &str = "https://purl.imsglobal.org/spec/lti-gs/claim/groupsservice";

/// Role vocabulary (LIS v2 URIs).
pub mod roles {
    pub const SYSTEM_ADMINISTRATOR: &str =
        "http://purl.imsglobal.org/vocab/lis/v2/system/person#Administrator";
    pub const SYSTEM_USER: &str = "http://purl.imsglobal.org/vocab/lis/v2/system/person#User";
    pub const SYSTEM_NONE: &str = "http://purl.imsglobal.org/vocab/lis/v2/system/person#None";

    pub const INSTITUTION_ADMINISTRATOR: &str =
        "http://purl.imsglobal.org/vocab/lis/v2/institution/person#Administrator";
    pub const INSTITUTION_FACULTY: &str =
        "http://purl.imsglobal.org/vocab/lis/v2/institution/person#Faculty";
    pub const INSTITUTION_GUEST: &str =
        "http://purl.imsglobal.org/vocab/lis/v2/institution/person#Guest";
    pub const INSTITUTION_STAFF: &str =
        "http://purl.imsglobal.org/vocab/lis/v2/institution/person#Staff";
    pub const INSTITUTION_STUDENT: &str =
        "http://purl.imsglobal.org/vocab/lis/v2/institution/person#Student";
    pub const INSTITUTION_INSTRUCTOR: &str =
        "http://purl.imsglobal.org/vocab/lis/v2/institution/person#Instructor";
    pub const INSTITUTION_LEARNER: &str =
        "http://purl.imsglobal.org/vocab/lis/v2/institution/person#Learner";
    pub const INSTITUTION_MENTOR: &str =
        "http://purl.imsglobal.org/vocab/lis/v2/institution/person#Mentor";

    pub const MEMBERSHIP_ADMINISTRATOR: &str =
        "http://purl.imsglobal.org/vocab/lis/v2/membership#Administrator";
    pub const MEMBERSHIP_CONTENT_DEVELOPER: &str =
        "http://purl.imsglobal.org/vocab/lis/v2/membership#ContentDeveloper";
    pub const MEMBERSHIP_INSTRUCTOR: &str =
        "http://purl.imsglobal.org/vocab/lis/v2/membership#Instructor";
    pub const MEMBERSHIP_LEARNER: &str =
        "http://purl.imsglobal.org/vocab/lis/v2/membership#Learner";
    pub const MEMBERSHIP_MENTOR: &str =
        "http://purl.imsglobal.org/vocab/lis/v2/membership#Mentor";
}

/// Context type vocabulary.
pub mod context_types {
    pub const COURSE_TEMPLATE: &str =
        "http://purl.imsglobal.org/vocab/lis/v2/course#CourseTemplate";
    pub const COURSE_OFFERING: &str =
        "http://purl.imsglobal.org/vocab/lis/v2/course#CourseOffering";
    pub const COURSE_SECTION: &str = "http://purl.imsglobal.org/vocab/lis/v2/course#CourseSection";
    pub const GROUP: &str = "http://purl.imsglobal.org/vocab/lis/v2/course#Group";
}

/// The LTI message types accepted by the launch validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    LtiResourceLinkRequest,
    LtiDeepLinkingRequest,
    LtiSubmissionReviewRequest,
}

impl MessageType {
    /// Parse a message_type claim value. Returns `None` for values this
    /// library does not launch (including LtiDeepLinkingResponse, which
    /// travels tool-to-platform).
    #[must_use]
    pub fn from_claim(value: &str) -> Option<Self> {
        match value {
            "LtiResourceLinkRequest" => Some(Self::LtiResourceLinkRequest),
            "LtiDeepLinkingRequest" => Some(Self::LtiDeepLinkingRequest),
            "LtiSubmissionReviewRequest" => Some(Self::LtiSubmissionReviewRequest),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LtiResourceLinkRequest => "LtiResourceLinkRequest",
            Self::LtiDeepLinkingRequest => "LtiDeepLinkingRequest",
            Self::LtiSubmissionReviewRequest => "LtiSubmissionReviewRequest",
        }
    }
}

impl Display for MessageType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded id_token header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenHeader {
    pub alg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

/// Resource link claim - required for resource-link and submission-review
/// launches.
///
/// `id` is optional at the parsing layer; message validation requires it
/// and reports its absence as an invalid message, not a malformed token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLinkClaim {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Context (course/section) claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextClaim {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", rename = "type")]
    pub context_types: Vec<String>,
}

/// Launch presentation claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchPresentationClaim {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
}

/// Subject of a submission review (the user whose work is reviewed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForUserClaim {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
}

/// Deep linking settings claim - required for deep-linking launches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepLinkingSettingsClaim {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deep_link_return_url: Option<String>,
    #[serde(default)]
    pub accept_types: Vec<String>,
    #[serde(default)]
    pub accept_presentation_document_targets: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept_multiple: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_create: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Opaque platform value; must be echoed back in the deep-linking
    /// response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// Names and Role Provisioning Service claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NrpsClaim {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_memberships_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_versions: Vec<String>,
}

/// Assignment and Grade Services endpoint claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgsClaim {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineitems: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineitem: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scope: Vec<String>,
}

/// Groups Service claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupsServiceClaim {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_groups_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_group_sets_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scope: Vec<String>,
}

/// Decoded id_token payload: standard OIDC claims plus the LTI claims
/// under their full purl URIs.
///
/// Every claim is optional at the parsing layer; required-claim decisions
/// belong to the validator, which maps each absence to its taxonomy code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LtiClaims {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Audience - a single string or an array of strings.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub aud: serde_json::Value,

    /// Authorized party; when present it must equal the client_id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azp: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/message_type")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,

    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/version")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/deployment_id")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_id: Option<String>,

    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/target_link_uri")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_link_uri: Option<String>,

    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/roles")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,

    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/resource_link")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_link: Option<ResourceLinkClaim>,

    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/context")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextClaim>,

    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/custom")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<HashMap<String, serde_json::Value>>,

    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/launch_presentation")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch_presentation: Option<LaunchPresentationClaim>,

    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/for_user")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub for_user: Option<ForUserClaim>,

    #[serde(rename = "https://purl.imsglobal.org/spec/lti-dl/claim/deep_linking_settings")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deep_linking_settings: Option<DeepLinkingSettingsClaim>,

    #[serde(rename = "https://purl.imsglobal.org/spec/lti-nrps/claim/namesroleservice")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nrps: Option<NrpsClaim>,

    #[serde(rename = "https://purl.imsglobal.org/spec/lti-ags/claim/endpoint")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ags: Option<AgsClaim>,

    #[serde(rename = "https://purl.imsglobal.org/spec/lti-gs/claim/groupsservice")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gs: Option<GroupsServiceClaim>,

    /// Claims this library does not model (lti1p1 migration, tool_platform,
    /// vendor extensions).
    #[serde(flatten)]
    pub additional: HashMap<String, serde_json::Value>,
}

impl LtiClaims {
    /// Check whether the audience claim contains the given client id,
    /// accepting both the single-string and array forms.
    #[must_use]
    pub fn audience_contains(&self, client_id: &str) -> bool {
        match &self.aud {
            serde_json::Value::String(s) => s == client_id,
            serde_json::Value::Array(arr) => arr.iter().any(|v| v.as_str() == Some(client_id)),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> serde_json::Value {
        serde_json::json!({
            "iss": "https://platform.example",
            "sub": "user-42",
            "aud": "tool-1",
            "exp": 2_000_000_000i64,
            "iat": 1_000_000_000i64,
            "nonce": "nonce-value",
            "https://purl.imsglobal.org/spec/lti/claim/message_type": "LtiResourceLinkRequest",
            "https://purl.imsglobal.org/spec/lti/claim/version": "1.3.0",
            "https://purl.imsglobal.org/spec/lti/claim/deployment_id": "dep-1",
            "https://purl.imsglobal.org/spec/lti/claim/roles": [
                roles::MEMBERSHIP_LEARNER,
            ],
            "https://purl.imsglobal.org/spec/lti/claim/resource_link": {
                "id": "link-1",
                "title": "Quiz 3"
            },
            "https://purl.imsglobal.org/spec/lti-nrps/claim/namesroleservice": {
                "context_memberships_url": "https://platform.example/nrps/1",
                "service_versions": ["2.0"]
            },
            "https://example.com/ext/vendor": {"k": "v"}
        })
    }

    #[test]
    fn test_deserialize_full_claim_uris() {
        let claims: LtiClaims = serde_json::from_value(sample_payload()).unwrap();

        assert_eq!(claims.iss.as_deref(), Some("https://platform.example"));
        assert_eq!(
            claims.message_type.as_deref(),
            Some("LtiResourceLinkRequest")
        );
        assert_eq!(claims.deployment_id.as_deref(), Some("dep-1"));
        assert_eq!(
            claims.resource_link.as_ref().unwrap().id.as_deref(),
            Some("link-1")
        );
        assert_eq!(
            claims
                .nrps
                .as_ref()
                .unwrap()
                .context_memberships_url
                .as_deref(),
            Some("https://platform.example/nrps/1")
        );
        // Unmodeled claims land in `additional`
        assert!(claims.additional.contains_key("https://example.com/ext/vendor"));
    }

    #[test]
    fn test_audience_string_and_array() {
        let mut claims: LtiClaims = serde_json::from_value(sample_payload()).unwrap();
        assert!(claims.audience_contains("tool-1"));
        assert!(!claims.audience_contains("tool-2"));

        claims.aud = serde_json::json!(["other", "tool-1"]);
        assert!(claims.audience_contains("tool-1"));

        claims.aud = serde_json::Value::Null;
        assert!(!claims.audience_contains("tool-1"));
    }

    #[test]
    fn test_serialize_round_trip() {
        let claims: LtiClaims = serde_json::from_value(sample_payload()).unwrap();
        let value = serde_json::to_value(&claims).unwrap();
        let back: LtiClaims = serde_json::from_value(value).unwrap();
        assert_eq!(back.nonce, claims.nonce);
        assert_eq!(back.roles, claims.roles);
        assert_eq!(
            back.resource_link.unwrap().title,
            Some("Quiz 3".to_string())
        );
    }

    #[test]
    fn test_message_type_parse() {
        assert_eq!(
            MessageType::from_claim("LtiDeepLinkingRequest"),
            Some(MessageType::LtiDeepLinkingRequest)
        );
        assert_eq!(MessageType::from_claim("LtiDeepLinkingResponse"), None);
        assert_eq!(MessageType::from_claim(""), None);
        assert_eq!(
            MessageType::LtiSubmissionReviewRequest.as_str(),
            "LtiSubmissionReviewRequest"
        );
    }

    #[test]
    fn test_missing_claims_parse_as_none() {
        let claims: LtiClaims = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(claims.iss.is_none());
        assert!(claims.message_type.is_none());
        assert!(claims.aud.is_null());
    }
}

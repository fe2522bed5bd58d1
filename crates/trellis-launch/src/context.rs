//! The validated, queryable view over a launch.
//!
//! A [`LaunchContext`] only exists after the validator pipeline has
//! accepted a launch (or after trusted reconstruction from the launch
//! cache). Its accessors perform no further verification. The message
//! variant is resolved once, at construction, so callers branch on a
//! typed value instead of re-checking claims.

use trellis_core::claims::{
    roles, ContextClaim, DeepLinkingSettingsClaim, ForUserClaim, ResourceLinkClaim,
    LTI_VERSION_1P3, SCOPE_NRPS_MEMBERSHIP_READONLY,
};
use trellis_core::{
    CachedLaunch, LaunchCache, LaunchId, LtiClaims, LtiError, LtiResult, MessageType,
    Registration, RegistrationDirectory,
};

use std::collections::HashMap;

/// The launch message, fully validated at construction.
#[derive(Debug, Clone)]
pub enum LaunchMessage {
    ResourceLink {
        resource_link: ResourceLinkClaim,
    },
    DeepLinking {
        settings: DeepLinkingSettingsClaim,
    },
    SubmissionReview {
        resource_link: ResourceLinkClaim,
        for_user: ForUserClaim,
    },
}

impl LaunchMessage {
    /// Resolve and validate the message variant from a claim set.
    ///
    /// Checks the message type, the LTI version, the roles claim, and the
    /// sub-claims the variant requires.
    pub fn from_claims(claims: &LtiClaims) -> LtiResult<Self> {
        let message_type = match claims.message_type.as_deref() {
            None | Some("") => return Err(LtiError::InvalidMessageType),
            Some(value) => MessageType::from_claim(value).ok_or_else(|| {
                LtiError::UnrecognizedMessageType {
                    message_type: value.to_string(),
                }
            })?,
        };

        match claims.version.as_deref() {
            Some(LTI_VERSION_1P3) => {}
            Some(other) => {
                return Err(LtiError::InvalidMessage {
                    claim: "version",
                    message: format!("unsupported LTI version {other}"),
                })
            }
            None => {
                return Err(LtiError::InvalidMessage {
                    claim: "version",
                    message: "missing".to_string(),
                })
            }
        }

        // The roles claim is required; an empty array is valid.
        if claims.roles.is_none() {
            return Err(LtiError::InvalidMessage {
                claim: "roles",
                message: "missing".to_string(),
            });
        }

        match message_type {
            MessageType::LtiResourceLinkRequest => Ok(Self::ResourceLink {
                resource_link: required_resource_link(claims)?,
            }),
            MessageType::LtiDeepLinkingRequest => {
                let settings = claims.deep_linking_settings.clone().ok_or(
                    LtiError::InvalidMessage {
                        claim: "deep_linking_settings",
                        message: "missing".to_string(),
                    },
                )?;
                if settings
                    .deep_link_return_url
                    .as_deref()
                    .map_or(true, str::is_empty)
                {
                    return Err(LtiError::InvalidMessage {
                        claim: "deep_linking_settings",
                        message: "missing deep_link_return_url".to_string(),
                    });
                }
                Ok(Self::DeepLinking { settings })
            }
            MessageType::LtiSubmissionReviewRequest => {
                let resource_link = required_resource_link(claims)?;
                let for_user = claims.for_user.clone().ok_or(LtiError::InvalidMessage {
                    claim: "for_user",
                    message: "missing".to_string(),
                })?;
                if for_user.user_id.as_deref().map_or(true, str::is_empty) {
                    return Err(LtiError::InvalidMessage {
                        claim: "for_user",
                        message: "missing user_id".to_string(),
                    });
                }
                Ok(Self::SubmissionReview {
                    resource_link,
                    for_user,
                })
            }
        }
    }

    #[must_use]
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::ResourceLink { .. } => MessageType::LtiResourceLinkRequest,
            Self::DeepLinking { .. } => MessageType::LtiDeepLinkingRequest,
            Self::SubmissionReview { .. } => MessageType::LtiSubmissionReviewRequest,
        }
    }
}

fn required_resource_link(claims: &LtiClaims) -> LtiResult<ResourceLinkClaim> {
    let resource_link = claims.resource_link.clone().ok_or(LtiError::InvalidMessage {
        claim: "resource_link",
        message: "missing".to_string(),
    })?;
    if resource_link.id.as_deref().map_or(true, str::is_empty) {
        return Err(LtiError::InvalidMessage {
            claim: "resource_link",
            message: "missing id".to_string(),
        });
    }
    Ok(resource_link)
}

/// Typed accessor for the Names and Role Provisioning Service.
#[derive(Debug, Clone)]
pub struct NrpsAccessor {
    pub context_memberships_url: String,
    pub service_versions: Vec<String>,
    /// Scopes to request when calling the service.
    pub scopes: Vec<String>,
}

/// Typed accessor for Assignment and Grade Services endpoints.
#[derive(Debug, Clone)]
pub struct AgsAccessor {
    pub lineitems: Option<String>,
    pub lineitem: Option<String>,
    /// Scopes granted by the platform for this launch.
    pub scopes: Vec<String>,
}

/// Typed accessor for the Groups Service.
#[derive(Debug, Clone)]
pub struct GroupsAccessor {
    pub context_groups_url: String,
    pub context_group_sets_url: Option<String>,
    pub scopes: Vec<String>,
}

/// Typed accessor for composing a deep-linking response.
#[derive(Debug, Clone)]
pub struct DeepLinkAccessor {
    pub return_url: String,
    pub accept_types: Vec<String>,
    pub accept_presentation_document_targets: Vec<String>,
    pub accept_multiple: bool,
    pub auto_create: bool,
    /// Opaque platform value to echo back in the response.
    pub data: Option<String>,
}

/// A validated launch.
#[derive(Debug, Clone)]
pub struct LaunchContext {
    launch_id: LaunchId,
    registration: Registration,
    deployment_id: String,
    claims: LtiClaims,
    message: LaunchMessage,
}

impl LaunchContext {
    pub(crate) fn new(
        launch_id: LaunchId,
        registration: Registration,
        deployment_id: String,
        claims: LtiClaims,
        message: LaunchMessage,
    ) -> Self {
        Self {
            launch_id,
            registration,
            deployment_id,
            claims,
            message,
        }
    }

    /// Reconstruct a context from a previously cached launch.
    ///
    /// This trusts the cache: signature and claim verification are NOT
    /// re-run. Callers must only pass launch ids they themselves issued
    /// via a successful `validate()`; it is not a substitute for
    /// validation.
    pub async fn from_cache(
        launch_id: LaunchId,
        cache: &dyn LaunchCache,
        directory: &dyn RegistrationDirectory,
    ) -> LtiResult<Self> {
        let cached = cache
            .get(&launch_id)
            .await?
            .ok_or(LtiError::LaunchNotFound { launch_id })?;

        let registration = directory
            .find(&cached.registration_id)
            .await?
            .ok_or_else(|| LtiError::NoRegistration {
                issuer: cached.claims.iss.clone(),
                client_id: None,
            })?;

        let message = LaunchMessage::from_claims(&cached.claims)?;

        Ok(Self::new(
            launch_id,
            registration,
            cached.deployment_id,
            cached.claims,
            message,
        ))
    }

    /// The payload persisted to the launch cache.
    #[must_use]
    pub fn to_cached(&self) -> CachedLaunch {
        CachedLaunch {
            registration_id: self.registration.id,
            deployment_id: self.deployment_id.clone(),
            claims: self.claims.clone(),
        }
    }

    #[must_use]
    pub fn launch_id(&self) -> LaunchId {
        self.launch_id
    }

    #[must_use]
    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    #[must_use]
    pub fn deployment_id(&self) -> &str {
        &self.deployment_id
    }

    /// The full validated claim set.
    #[must_use]
    pub fn claims(&self) -> &LtiClaims {
        &self.claims
    }

    #[must_use]
    pub fn message(&self) -> &LaunchMessage {
        &self.message
    }

    #[must_use]
    pub fn is_resource_launch(&self) -> bool {
        matches!(self.message, LaunchMessage::ResourceLink { .. })
    }

    #[must_use]
    pub fn is_deep_link_launch(&self) -> bool {
        matches!(self.message, LaunchMessage::DeepLinking { .. })
    }

    #[must_use]
    pub fn is_submission_review_launch(&self) -> bool {
        matches!(self.message, LaunchMessage::SubmissionReview { .. })
    }

    /// Subject (platform user id) of the launch.
    #[must_use]
    pub fn sub(&self) -> Option<&str> {
        self.claims.sub.as_deref()
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.registration.platform.issuer
    }

    #[must_use]
    pub fn context(&self) -> Option<&ContextClaim> {
        self.claims.context.as_ref()
    }

    #[must_use]
    pub fn custom(&self) -> Option<&HashMap<String, serde_json::Value>> {
        self.claims.custom.as_ref()
    }

    #[must_use]
    pub fn target_link_uri(&self) -> Option<&str> {
        self.claims.target_link_uri.as_deref()
    }

    #[must_use]
    pub fn roles(&self) -> &[String] {
        self.claims.roles.as_deref().unwrap_or(&[])
    }

    #[must_use]
    pub fn has_role(&self, role_uri: &str) -> bool {
        self.roles().iter().any(|r| r == role_uri)
    }

    #[must_use]
    pub fn is_instructor(&self) -> bool {
        self.has_role(roles::MEMBERSHIP_INSTRUCTOR) || self.has_role(roles::INSTITUTION_INSTRUCTOR)
    }

    #[must_use]
    pub fn is_learner(&self) -> bool {
        self.has_role(roles::MEMBERSHIP_LEARNER) || self.has_role(roles::INSTITUTION_LEARNER)
    }

    #[must_use]
    pub fn is_administrator(&self) -> bool {
        self.has_role(roles::MEMBERSHIP_ADMINISTRATOR)
            || self.has_role(roles::INSTITUTION_ADMINISTRATOR)
            || self.has_role(roles::SYSTEM_ADMINISTRATOR)
    }

    /// True when the launch carries a usable NRPS claim.
    #[must_use]
    pub fn has_nrps(&self) -> bool {
        self.claims
            .nrps
            .as_ref()
            .and_then(|c| c.context_memberships_url.as_deref())
            .is_some_and(|u| !u.is_empty())
    }

    #[must_use]
    pub fn get_nrps(&self) -> Option<NrpsAccessor> {
        let claim = self.claims.nrps.as_ref()?;
        let context_memberships_url = claim
            .context_memberships_url
            .as_deref()
            .filter(|u| !u.is_empty())?
            .to_string();
        Some(NrpsAccessor {
            context_memberships_url,
            service_versions: claim.service_versions.clone(),
            scopes: vec![SCOPE_NRPS_MEMBERSHIP_READONLY.to_string()],
        })
    }

    /// True when the launch carries a usable AGS endpoint claim.
    #[must_use]
    pub fn has_ags(&self) -> bool {
        self.claims
            .ags
            .as_ref()
            .is_some_and(|c| c.lineitems.is_some() || c.lineitem.is_some())
    }

    #[must_use]
    pub fn get_ags(&self) -> Option<AgsAccessor> {
        let claim = self.claims.ags.as_ref()?;
        if claim.lineitems.is_none() && claim.lineitem.is_none() {
            return None;
        }
        Some(AgsAccessor {
            lineitems: claim.lineitems.clone(),
            lineitem: claim.lineitem.clone(),
            scopes: claim.scope.clone(),
        })
    }

    /// True when the launch carries a usable Groups Service claim.
    #[must_use]
    pub fn has_gs(&self) -> bool {
        self.claims
            .gs
            .as_ref()
            .and_then(|c| c.context_groups_url.as_deref())
            .is_some_and(|u| !u.is_empty())
    }

    #[must_use]
    pub fn get_gs(&self) -> Option<GroupsAccessor> {
        let claim = self.claims.gs.as_ref()?;
        let context_groups_url = claim
            .context_groups_url
            .as_deref()
            .filter(|u| !u.is_empty())?
            .to_string();
        Some(GroupsAccessor {
            context_groups_url,
            context_group_sets_url: claim.context_group_sets_url.clone(),
            scopes: claim.scope.clone(),
        })
    }

    /// Deep-linking accessor; present only for deep-linking launches.
    #[must_use]
    pub fn get_deep_link(&self) -> Option<DeepLinkAccessor> {
        match &self.message {
            LaunchMessage::DeepLinking { settings } => Some(DeepLinkAccessor {
                return_url: settings.deep_link_return_url.clone()?,
                accept_types: settings.accept_types.clone(),
                accept_presentation_document_targets: settings
                    .accept_presentation_document_targets
                    .clone(),
                accept_multiple: settings.accept_multiple.unwrap_or(false),
                auto_create: settings.auto_create.unwrap_or(false),
                data: settings.data.clone(),
            }),
            _ => None,
        }
    }
}

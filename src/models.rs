// ABOUTME: Core domain models for tenants, principals, tokens, and authentication events
// ABOUTME: Principals are a tagged union carried through claims and lineage records
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Limsgate Developers

//! Domain models for the tenant-scoped authentication subsystem.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Discriminant for the two principal kinds sharing the login/refresh shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    /// A user scoped to one or more tenant workspaces
    TenantUser,
    /// A global platform operator
    PlatformOperator,
}

impl PrincipalKind {
    /// Database/text discriminant
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TenantUser => "tenant_user",
            Self::PlatformOperator => "platform_operator",
        }
    }

    /// Parse from the stored discriminant
    #[must_use]
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "tenant_user" => Some(Self::TenantUser),
            "platform_operator" => Some(Self::PlatformOperator),
            _ => None,
        }
    }
}

impl std::fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Platform operator roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorRole {
    /// Full platform control, may open tenant workspaces via the bridge
    SuperOperator,
    /// Read-only forensic access, may not impersonate
    Auditor,
}

impl OperatorRole {
    /// Whether this role may mint impersonation bridge tokens
    #[must_use]
    pub const fn can_impersonate(self) -> bool {
        matches!(self, Self::SuperOperator)
    }

    /// Database/text representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SuperOperator => "super_operator",
            Self::Auditor => "auditor",
        }
    }

    /// Parse from the stored representation, defaulting to the least
    /// privileged role on unknown input
    #[must_use]
    pub fn from_db_string(s: &str) -> Self {
        match s {
            "super_operator" => Self::SuperOperator,
            _ => Self::Auditor,
        }
    }
}

/// A named, independently isolated laboratory workspace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    /// Unique tenant identifier
    pub id: Uuid,
    /// Unique short code (e.g. "labA")
    pub code: String,
    /// Display name
    pub name: String,
    /// Subdomain the tenant's workspace is served on
    pub subdomain: Option<String>,
    /// Inactive tenants reject all authentication
    pub is_active: bool,
    /// When the tenant was created
    pub created_at: DateTime<Utc>,
    /// When the tenant was last updated
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    /// Create a new active tenant
    #[must_use]
    pub fn new(code: String, name: String, subdomain: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            code,
            name,
            subdomain,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A user belonging to one or more tenant workspaces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantUser {
    /// Unique user identifier, immutable once created
    pub id: Uuid,
    /// Login identifier
    pub email: String,
    /// Password hash - never the cleartext
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// Optional display name
    pub display_name: Option<String>,
    /// Designated default tenant
    pub default_tenant_id: Uuid,
    /// Inactive users cannot authenticate
    pub is_active: bool,
    /// When the user was created
    pub created_at: DateTime<Utc>,
    /// Last successful authentication
    pub last_login_at: Option<DateTime<Utc>>,
}

impl TenantUser {
    /// Create a new active tenant user
    #[must_use]
    pub fn new(
        email: String,
        password_hash: String,
        display_name: Option<String>,
        default_tenant_id: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            password_hash,
            display_name,
            default_tenant_id,
            is_active: true,
            created_at: Utc::now(),
            last_login_at: None,
        }
    }
}

/// A global platform operator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformOperator {
    /// Unique operator identifier, immutable once created
    pub id: Uuid,
    /// Login identifier
    pub email: String,
    /// Password hash - never the cleartext
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// Optional display name
    pub display_name: Option<String>,
    /// Operator role; mutable
    pub role: OperatorRole,
    /// Inactive operators cannot authenticate
    pub is_active: bool,
    /// When the operator was created
    pub created_at: DateTime<Utc>,
    /// Last successful authentication
    pub last_login_at: Option<DateTime<Utc>>,
}

impl PlatformOperator {
    /// Create a new active operator
    #[must_use]
    pub fn new(
        email: String,
        password_hash: String,
        display_name: Option<String>,
        role: OperatorRole,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            password_hash,
            display_name,
            role,
            is_active: true,
            created_at: Utc::now(),
            last_login_at: None,
        }
    }
}

/// Either side of the principal union, resolved after lookup
#[derive(Debug, Clone)]
pub enum Principal {
    /// A tenant-scoped user
    TenantUser(TenantUser),
    /// A platform operator
    PlatformOperator(PlatformOperator),
}

impl Principal {
    /// Principal identifier
    #[must_use]
    pub const fn id(&self) -> Uuid {
        match self {
            Self::TenantUser(u) => u.id,
            Self::PlatformOperator(o) => o.id,
        }
    }

    /// Discriminant for claims and lineage records
    #[must_use]
    pub const fn kind(&self) -> PrincipalKind {
        match self {
            Self::TenantUser(_) => PrincipalKind::TenantUser,
            Self::PlatformOperator(_) => PrincipalKind::PlatformOperator,
        }
    }

    /// Role string carried in access-token claims
    #[must_use]
    pub fn role_str(&self) -> String {
        match self {
            Self::TenantUser(_) => "member".into(),
            Self::PlatformOperator(o) => o.role.as_str().into(),
        }
    }

    /// Stored password hash for verification
    #[must_use]
    pub fn password_hash(&self) -> &str {
        match self {
            Self::TenantUser(u) => &u.password_hash,
            Self::PlatformOperator(o) => &o.password_hash,
        }
    }

    /// Whether the principal may authenticate at all
    #[must_use]
    pub const fn is_active(&self) -> bool {
        match self {
            Self::TenantUser(u) => u.is_active,
            Self::PlatformOperator(o) => o.is_active,
        }
    }

    /// Login identifier
    #[must_use]
    pub fn email(&self) -> &str {
        match self {
            Self::TenantUser(u) => &u.email,
            Self::PlatformOperator(o) => &o.email,
        }
    }

    /// Display name if set
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        match self {
            Self::TenantUser(u) => u.display_name.as_deref(),
            Self::PlatformOperator(o) => o.display_name.as_deref(),
        }
    }
}

/// One link in a refresh-token rotation chain.
///
/// The secret itself is never stored; `secret_hash` is a one-way digest.
/// `lineage_id` is shared by every token descended from the same original
/// issuance. A token is *live* while `revoked_at` is null and `expires_at`
/// is in the future; `replaced_by_id` points forward once rotated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    /// Token identifier (the public half of the raw `id.secret` token)
    pub id: Uuid,
    /// Which principal kind owns this lineage
    pub principal_kind: PrincipalKind,
    /// Owning principal
    pub principal_id: Uuid,
    /// Rotation-chain identifier
    pub lineage_id: Uuid,
    /// One-way digest of the token secret
    pub secret_hash: String,
    /// Tenant this session is bound to; none for platform-operator sessions
    pub tenant_id: Option<Uuid>,
    /// Expiry timestamp
    pub expires_at: DateTime<Utc>,
    /// Revocation timestamp, null while live
    pub revoked_at: Option<DateTime<Utc>>,
    /// The token that replaced this one, null until rotated
    pub replaced_by_id: Option<Uuid>,
    /// When this link was issued
    pub created_at: DateTime<Utc>,
    /// Issuance origin address
    pub created_from_ip: Option<String>,
    /// Issuance client string
    pub client_info: Option<String>,
}

impl RefreshTokenRecord {
    /// Whether the token is expired at `now`
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Whether the token is live (unrevoked and unexpired) at `now`
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && !self.is_expired(now)
    }
}

/// A one-time impersonation bridge token minted by a platform operator.
///
/// Redeemable at most once; `consumed_at` transitions from null exactly
/// once via a conditional update and is never cleared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeTokenRecord {
    /// Token identifier
    pub id: Uuid,
    /// Issuing operator
    pub operator_id: Uuid,
    /// Target tenant
    pub tenant_id: Uuid,
    /// One-way digest of the token secret
    pub secret_hash: String,
    /// Expiry timestamp; short and capped
    pub expires_at: DateTime<Utc>,
    /// Consumption timestamp, null until redeemed
    pub consumed_at: Option<DateTime<Utc>>,
    /// When the token was issued
    pub created_at: DateTime<Utc>,
    /// Issuance origin address
    pub issued_from_ip: Option<String>,
    /// Consumption origin address, recorded at redemption
    pub consumed_from_ip: Option<String>,
}

impl BridgeTokenRecord {
    /// Whether the token is expired at `now`
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Whether the token has already been redeemed
    #[must_use]
    pub const fn is_consumed(&self) -> bool {
        self.consumed_at.is_some()
    }
}

/// Kinds of authentication events in the append-only log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthEventKind {
    /// Successful login
    LoginSuccess,
    /// Failed login (unknown principal or bad secret - indistinguishable)
    LoginFailure,
    /// Successful refresh-token rotation
    TokenRefreshed,
    /// An already-dead refresh token was presented again
    ReuseDetected,
    /// Explicit logout
    Logout,
    /// Bridge token minted
    BridgeIssued,
    /// Bridge token redeemed
    BridgeRedeemed,
}

impl AuthEventKind {
    /// Database/text representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LoginSuccess => "login_success",
            Self::LoginFailure => "login_failure",
            Self::TokenRefreshed => "token_refreshed",
            Self::ReuseDetected => "reuse_detected",
            Self::Logout => "logout",
            Self::BridgeIssued => "bridge_issued",
            Self::BridgeRedeemed => "bridge_redeemed",
        }
    }

    /// Whether this event counts toward the volume gate
    #[must_use]
    pub const fn is_login_attempt(self) -> bool {
        matches!(self, Self::LoginSuccess | Self::LoginFailure)
    }
}

/// One append-only authentication event record.
///
/// The attempted identifier and tenant scope are dedicated indexed columns
/// so the rate limiter can count without parsing payloads. The attempted
/// secret is never recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthEvent {
    /// Row id, assigned by the store
    pub id: Option<i64>,
    /// What happened
    pub kind: AuthEventKind,
    /// Which principal kind was involved, if known
    pub principal_kind: Option<PrincipalKind>,
    /// Attempted login identifier (indexed for the per-identifier gate)
    pub identifier: Option<String>,
    /// Tenant scope of the attempt, if any
    pub tenant_id: Option<Uuid>,
    /// Origin address of the request
    pub origin_ip: Option<String>,
    /// Structured payload for forensics
    pub detail: serde_json::Value,
    /// When the event occurred
    pub created_at: DateTime<Utc>,
}

impl AuthEvent {
    /// Build an event stamped with the current instant
    #[must_use]
    pub fn now(kind: AuthEventKind) -> Self {
        Self {
            id: None,
            kind,
            principal_kind: None,
            identifier: None,
            tenant_id: None,
            origin_ip: None,
            detail: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    /// Attach the attempted identifier
    #[must_use]
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Attach the tenant scope
    #[must_use]
    pub const fn with_tenant(mut self, tenant_id: Uuid) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    /// Attach the principal kind
    #[must_use]
    pub const fn with_principal_kind(mut self, kind: PrincipalKind) -> Self {
        self.principal_kind = Some(kind);
        self
    }

    /// Attach the request origin
    #[must_use]
    pub fn with_origin(mut self, origin: &RequestOrigin) -> Self {
        self.origin_ip.clone_from(&origin.ip);
        self
    }

    /// Attach a structured payload
    #[must_use]
    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }
}

/// Request provenance built once at the transport boundary and passed into
/// handlers explicitly
#[derive(Debug, Clone, Default)]
pub struct RequestOrigin {
    /// Client address as seen by the edge
    pub ip: Option<String>,
    /// Client software string
    pub user_agent: Option<String>,
}

impl RequestOrigin {
    /// Origin with only an address
    #[must_use]
    pub fn from_ip(ip: impl Into<String>) -> Self {
        Self {
            ip: Some(ip.into()),
            user_agent: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_principal_kind_roundtrip() {
        for kind in [PrincipalKind::TenantUser, PrincipalKind::PlatformOperator] {
            assert_eq!(PrincipalKind::from_db_string(kind.as_str()), Some(kind));
        }
        assert_eq!(PrincipalKind::from_db_string("nonsense"), None);
    }

    #[test]
    fn test_operator_role_defaults_least_privileged() {
        assert_eq!(
            OperatorRole::from_db_string("super_operator"),
            OperatorRole::SuperOperator
        );
        assert_eq!(OperatorRole::from_db_string("bogus"), OperatorRole::Auditor);
        assert!(!OperatorRole::Auditor.can_impersonate());
        assert!(OperatorRole::SuperOperator.can_impersonate());
    }

    #[test]
    fn test_refresh_token_liveness() {
        let now = Utc::now();
        let mut record = RefreshTokenRecord {
            id: Uuid::new_v4(),
            principal_kind: PrincipalKind::TenantUser,
            principal_id: Uuid::new_v4(),
            lineage_id: Uuid::new_v4(),
            secret_hash: "h".into(),
            tenant_id: None,
            expires_at: now + Duration::days(30),
            revoked_at: None,
            replaced_by_id: None,
            created_at: now,
            created_from_ip: None,
            client_info: None,
        };
        assert!(record.is_live(now));

        record.revoked_at = Some(now);
        assert!(!record.is_live(now));

        record.revoked_at = None;
        record.expires_at = now - Duration::seconds(1);
        assert!(!record.is_live(now));
    }

    #[test]
    fn test_bridge_token_terminal_states() {
        let now = Utc::now();
        let record = BridgeTokenRecord {
            id: Uuid::new_v4(),
            operator_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            secret_hash: "h".into(),
            expires_at: now + Duration::seconds(90),
            consumed_at: Some(now),
            created_at: now,
            issued_from_ip: None,
            consumed_from_ip: None,
        };
        assert!(record.is_consumed());
        assert!(!record.is_expired(now));
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = TenantUser::new("a@lab.example".into(), "hash".into(), None, Uuid::new_v4());
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("hash"));
    }
}

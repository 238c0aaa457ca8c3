//! # gatehouse-types: Core types for `Gatehouse`
//!
//! This crate contains shared types used across the `Gatehouse` system:
//! - Entity IDs ([`VisitorId`], [`UnitId`], [`VisitId`])
//! - Credential value types ([`Nonce`], [`struct@Signature`])
//! - Visit lifecycle types ([`VisitStatus`], [`VisitKind`], [`AuthorizationMethod`])
//! - Records ([`Visitor`], [`Visit`])
//! - Wire payloads ([`Credential`], [`PresentedCredential`])
//! - Audit actions ([`AuditAction`])

use std::fmt::{Debug, Display};
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

// ============================================================================
// Entity IDs - All Copy (16-byte UUID values)
// ============================================================================

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a fresh random (v4) identifier.
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id! {
    /// Unique identifier for a visitor.
    VisitorId
}

uuid_id! {
    /// Unique identifier for a facility unit (apartment, office, suite).
    UnitId
}

uuid_id! {
    /// Unique identifier for a visit record.
    VisitId
}

// ============================================================================
// Nonce - single-use random value binding a credential to one visit
// ============================================================================

/// Single-use random value embedded in a credential.
///
/// Generated from the OS CSPRNG with 128 bits of entropy and encoded
/// URL-safely (see `gatehouse-crypto`). Together with the signature it
/// uniquely identifies one issued credential.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nonce(String);

impl Nonce {
    /// Wraps an already-encoded nonce string.
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Returns the encoded nonce.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Nonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Signature - 256-bit credential digest
// ============================================================================

/// Length of a credential signature in bytes (SHA-256 output).
pub const SIGNATURE_LENGTH: usize = 32;

/// A credential signature: a 256-bit digest carried as lowercase hex.
///
/// The digest is computed by the signer in `gatehouse-crypto`; this type
/// only stores the resulting 32 bytes. Presented signatures must be compared
/// in constant time (`gatehouse_crypto::signatures_match`), never with `==`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Signature([u8; SIGNATURE_LENGTH]);

impl Signature {
    /// Creates a signature from raw digest bytes.
    pub fn from_bytes(bytes: [u8; SIGNATURE_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Returns the signature as a byte array.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.0
    }

    /// Parses a hex-encoded signature. Accepts upper or lower case.
    pub fn from_hex(s: &str) -> Option<Self> {
        if s.len() != SIGNATURE_LENGTH * 2 {
            return None;
        }
        let mut bytes = [0u8; SIGNATURE_LENGTH];
        for (i, chunk) in s.as_bytes().chunks_exact(2).enumerate() {
            let hi = (chunk[0] as char).to_digit(16)?;
            let lo = (chunk[1] as char).to_digit(16)?;
            bytes[i] = ((hi << 4) | lo) as u8;
        }
        Some(Self(bytes))
    }
}

impl Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 8 bytes in hex for debugging without exposing the full digest
        write!(
            f,
            "Signature({:02x}{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}...)",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5], self.0[6], self.0[7]
        )
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Full lowercase hex representation, the wire form
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; SIGNATURE_LENGTH]> for Signature {
    fn from(bytes: [u8; SIGNATURE_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl From<Signature> for [u8; SIGNATURE_LENGTH] {
    fn from(sig: Signature) -> Self {
        sig.0
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Signature::from_hex(&s)
            .ok_or_else(|| serde::de::Error::custom("expected 64 hex characters"))
    }
}

// ============================================================================
// Visit lifecycle enums
// ============================================================================

/// Lifecycle status of a visit.
///
/// Transitions are one-directional and go exclusively through
/// `gatehouse_kernel::apply`; no other code writes this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitStatus {
    /// Scheduled, no credential issued yet.
    Pending,
    /// Credential issued, visitor not yet admitted.
    Authorized,
    /// Issuance refused (blacklisted visitor).
    Denied,
    /// Visitor admitted and currently on the premises.
    Inside,
    /// Visitor has exited.
    Finished,
    /// Administratively cancelled before entry.
    Cancelled,
}

impl VisitStatus {
    /// Returns true if no further transitions are possible from this status.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            VisitStatus::Denied | VisitStatus::Finished | VisitStatus::Cancelled
        )
    }
}

impl Display for VisitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            VisitStatus::Pending => "pending",
            VisitStatus::Authorized => "authorized",
            VisitStatus::Denied => "denied",
            VisitStatus::Inside => "inside",
            VisitStatus::Finished => "finished",
            VisitStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// The kind of visit being authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitKind {
    /// A one-off personal visit.
    #[default]
    Ordinary,
    /// A standing visitor (cleaner, relative) expected repeatedly.
    Recurring,
    /// Courier or food delivery.
    Delivery,
    /// Contracted service provider (plumber, electrician).
    ServiceProvider,
}

/// How the resident authorized the visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationMethod {
    Push,
    #[serde(rename = "whatsapp")]
    WhatsApp,
    Sms,
    Phone,
    /// Issued directly by staff without resident confirmation.
    Auto,
}

/// Identity document kinds accepted at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentType {
    #[default]
    Cpf,
    Rg,
    Cnh,
    Passport,
    Rne,
}

// ============================================================================
// Visitor record
// ============================================================================

/// A registered visitor.
///
/// The blacklist flag is set externally (administrative action); the engine
/// only reads it. `visit_count` is incremented by the runtime when the state
/// machine admits the visitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visitor {
    pub id: VisitorId,
    pub full_name: String,
    pub document_type: DocumentType,
    pub document_number: String,
    pub phone: Option<String>,

    pub is_blacklisted: bool,
    pub blacklist_reason: Option<String>,
    pub blacklisted_at: Option<DateTime<Utc>>,

    pub first_visit_at: Option<DateTime<Utc>>,
    pub visit_count: u32,
}

impl Visitor {
    /// Creates a visitor record with a clean history.
    pub fn new(
        id: VisitorId,
        full_name: impl Into<String>,
        document_type: DocumentType,
        document_number: impl Into<String>,
    ) -> Self {
        Self {
            id,
            full_name: full_name.into(),
            document_type,
            document_number: document_number.into(),
            phone: None,
            is_blacklisted: false,
            blacklist_reason: None,
            blacklisted_at: None,
            first_visit_at: None,
            visit_count: 0,
        }
    }

    /// Marks the visitor as blacklisted with the given reason.
    pub fn blacklist(mut self, reason: impl Into<String>, at: DateTime<Utc>) -> Self {
        self.is_blacklisted = true;
        self.blacklist_reason = Some(reason.into());
        self.blacklisted_at = Some(at);
        self
    }
}

// ============================================================================
// Visit record
// ============================================================================

/// The authorization / occupancy record for one visit.
///
/// Invariants (enforced by the kernel):
/// - `nonce` and `signature` are set together at issuance and never change.
/// - `entered_at` is written at most once; `exited_at` at most once and only
///   after `entered_at`.
/// - `duration_minutes` is always derived from the two timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
    pub id: VisitId,
    pub visitor_id: VisitorId,
    pub unit_id: UnitId,
    pub kind: VisitKind,
    pub status: VisitStatus,

    /// Free-form purpose supplied at scheduling ("mudança", "entrega" ...).
    pub reason: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,

    // Credential fields, set together at issuance
    pub nonce: Option<Nonce>,
    pub signature: Option<Signature>,
    pub valid_until: Option<DateTime<Utc>>,
    pub authorized_at: Option<DateTime<Utc>>,
    pub authorization_method: Option<AuthorizationMethod>,
    pub denial_reason: Option<String>,

    // Occupancy fields, written only by the state machine
    pub entered_at: Option<DateTime<Utc>>,
    pub exited_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,

    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Visit {
    /// Creates a visit in the initial PENDING state.
    pub fn scheduled(
        id: VisitId,
        visitor_id: VisitorId,
        unit_id: UnitId,
        kind: VisitKind,
        scheduled_at: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            visitor_id,
            unit_id,
            kind,
            status: VisitStatus::Pending,
            reason: None,
            scheduled_at,
            nonce: None,
            signature: None,
            valid_until: None,
            authorized_at: None,
            authorization_method: None,
            denial_reason: None,
            entered_at: None,
            exited_at: None,
            duration_minutes: None,
            cancelled_at: None,
            created_at,
        }
    }

    /// Sets the free-form visit purpose.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Returns the credential key, if one has been issued.
    pub fn credential_key(&self) -> Option<(&Nonce, &Signature)> {
        match (&self.nonce, &self.signature) {
            (Some(nonce), Some(signature)) => Some((nonce, signature)),
            _ => None,
        }
    }
}

// ============================================================================
// Credential wire payloads
// ============================================================================

/// Canonical wire form of a credential timestamp.
///
/// RFC 3339 UTC with microsecond precision and a `Z` suffix. The signature is
/// computed over exactly this string, so issuance and verification agree on a
/// single byte representation.
pub fn canonical_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

mod canonical_time {
    use super::{DateTime, Utc, canonical_timestamp};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&canonical_timestamp(*ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(D::Error::custom)
    }
}

/// A signed, time-boxed credential as issued to the visitor.
///
/// This is the bit-exact wire contract: five fields, ISO-8601 expiry string,
/// URL-safe nonce, lowercase hex signature. It is transported and rendered by
/// external collaborators; the engine only produces and verifies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub visitor_id: VisitorId,
    pub unit_id: UnitId,
    #[serde(with = "canonical_time")]
    pub valid_until: DateTime<Utc>,
    pub nonce: Nonce,
    pub signature: Signature,
}

impl Credential {
    /// Returns the expiry in the canonical string form the signature covers.
    pub fn canonical_valid_until(&self) -> String {
        canonical_timestamp(self.valid_until)
    }

    /// Converts to the presented form, as a gate scanner would submit it.
    pub fn to_presented(&self) -> PresentedCredential {
        PresentedCredential {
            visitor_id: Some(self.visitor_id.to_string()),
            unit_id: Some(self.unit_id.to_string()),
            valid_until: Some(self.canonical_valid_until()),
            nonce: Some(self.nonce.to_string()),
            signature: Some(self.signature.to_string()),
        }
    }
}

/// A credential payload as presented at the gate, before any validation.
///
/// Every field is optional: the validator's first duty is to reject payloads
/// with missing fields as malformed. Field values are raw strings; the
/// signature check runs over them verbatim, before any parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentedCredential {
    #[serde(default)]
    pub visitor_id: Option<String>,
    #[serde(default)]
    pub unit_id: Option<String>,
    #[serde(default)]
    pub valid_until: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
}

impl PresentedCredential {
    /// Returns all five fields if none is missing.
    pub fn fields(&self) -> Option<(&str, &str, &str, &str, &str)> {
        Some((
            self.visitor_id.as_deref()?,
            self.unit_id.as_deref()?,
            self.valid_until.as_deref()?,
            self.nonce.as_deref()?,
            self.signature.as_deref()?,
        ))
    }
}

// ============================================================================
// Audit actions
// ============================================================================

/// Actions recorded in the audit trail.
///
/// Produced as kernel effects and by the issuance path; the runtime decides
/// where they land (structured log today, immutable audit store later).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    /// A visit was pre-booked without a credential.
    VisitScheduled {
        visit_id: VisitId,
        visitor_id: VisitorId,
        unit_id: UnitId,
    },
    /// A credential was issued and the visit authorized.
    CredentialIssued {
        visit_id: VisitId,
        visitor_id: VisitorId,
        unit_id: UnitId,
        valid_until: DateTime<Utc>,
    },
    /// Issuance was refused by the blacklist guard.
    IssuanceDenied {
        visit_id: VisitId,
        visitor_id: VisitorId,
        reason: String,
    },
    /// A visitor was admitted through the gate.
    EntryRecorded {
        visit_id: VisitId,
        visitor_id: VisitorId,
        entered_at: DateTime<Utc>,
    },
    /// A visitor exited the premises.
    ExitRecorded {
        visit_id: VisitId,
        exited_at: DateTime<Utc>,
        duration_minutes: i64,
    },
    /// A visit was cancelled before entry.
    VisitCancelled {
        visit_id: VisitId,
        cancelled_at: DateTime<Utc>,
    },
}

// ============================================================================
// Tests
// ============================================================================

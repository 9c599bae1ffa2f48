//! Row models and shared enums for the cancellation flow
//!
//! The cancellation draft is a single row keyed by (user, subscription).
//! Every mutable answer field is a last-write-wins scalar; `DraftPatch` is
//! the explicit allowlist of fields a client may write.

use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Highest valid bucketed range index (buckets are 0, 1–5, 6–20, 20+ style)
pub const MAX_RANGE_INDEX: i64 = 3;

/// Sticky A/B experiment assignment for a draft
///
/// A = reasons first, no upfront offer. B = discount offer shown before
/// reason collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum Variant {
    A,
    B,
}

impl Variant {
    /// Draw a uniform variant from a cryptographically strong source
    ///
    /// Assignment must be unpredictable; OsRng, not a seeded PRNG.
    pub fn draw() -> Self {
        if OsRng.gen::<bool>() {
            Variant::A
        } else {
            Variant::B
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::A => "A",
            Variant::B => "B",
        }
    }
}

/// Draft lifecycle state: monotonic, draft → committed only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum DraftStatus {
    Draft,
    Committed,
}

impl DraftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftStatus::Draft => "draft",
            DraftStatus::Committed => "committed",
        }
    }
}

/// Subscription billing state (owned by the billing collaborator)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    PendingCancellation,
    Cancelled,
}

/// Why the subscriber is cancelling (still-looking branch)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ReasonCode {
    TooExpensive,
    PlatformNotHelpful,
    NotEnoughRelevantJobs,
    DecidedNotToMove,
    Other,
}

impl ReasonCode {
    /// Reasons that require a free-text elaboration of at least 25 characters
    pub fn needs_elaboration(&self) -> bool {
        !matches!(self, ReasonCode::TooExpensive)
    }

    /// Reasons that require a willingness-to-pay amount
    pub fn needs_amount(&self) -> bool {
        matches!(self, ReasonCode::TooExpensive)
    }
}

/// Interview screens, one tagged enum for every UI variant
///
/// The many near-duplicate screens of the UI collapse onto this enum; the
/// single ordered inference function in `steps` decides which one a
/// persisted row resumes at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// "Have you found a job yet?"
    Entry,
    /// Found-job path: program usage + range counters
    JobDetails,
    /// Found-job path: free-text feedback
    Feedback,
    /// Found-job path: lawyer + visa type
    Visa,
    /// Found-job completion screen
    FoundDone,
    /// Still-looking: reason selection + follow-ups
    Reason,
    /// Still-looking: usage range counters
    Usage,
    /// Variant B only: discount offer before reasons
    DownsellOffer,
    /// Pre-commit confirmation
    Confirm,
    /// Cancellation processed
    CancelDone,
    /// Discount accepted, subscription continues
    DiscountDone,
}

impl Step {
    /// Terminal screens are idempotent to revisit; re-rendering never
    /// re-commits.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Step::FoundDone | Step::CancelDone | Step::DiscountDone)
    }
}

/// One cancellation draft row, keyed by (user_id, subscription_id)
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CancellationRow {
    pub id: String,
    pub user_id: String,
    pub subscription_id: String,
    pub downsell_variant: Variant,
    pub status: DraftStatus,
    // Job-found branch
    pub found_job: Option<bool>,
    pub found_via_program: Option<bool>,
    pub applied_range: Option<i64>,
    pub emailed_range: Option<i64>,
    pub interviewed_range: Option<i64>,
    pub feedback_text: Option<String>,
    pub lawyer_provided: Option<bool>,
    pub visa_type: Option<String>,
    // Still-looking branch
    pub reason_code: Option<ReasonCode>,
    pub reason_text: Option<String>,
    pub willing_to_pay_cents: Option<i64>,
    pub usage_applied: Option<i64>,
    pub usage_emailed: Option<i64>,
    pub usage_interviewed: Option<i64>,
    pub accepted_downsell: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Subscription row (referenced, not owned; price is never touched here)
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: String,
    pub user_id: String,
    pub status: SubscriptionStatus,
    pub monthly_price_cents: i64,
    pub updated_at: String,
}

/// Allowlisted draft mutation
///
/// This is the entire set of client-writable fields. Unknown JSON keys are
/// dropped during deserialization rather than rejected, so a stray key can
/// never become an uncontrolled write. Identity, variant, status and
/// timestamps are system-assigned and deliberately absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DraftPatch {
    pub found_job: Option<bool>,
    pub found_via_program: Option<bool>,
    pub applied_range: Option<i64>,
    pub emailed_range: Option<i64>,
    pub interviewed_range: Option<i64>,
    pub feedback_text: Option<String>,
    pub lawyer_provided: Option<bool>,
    pub visa_type: Option<String>,
    pub reason_code: Option<ReasonCode>,
    pub reason_text: Option<String>,
    pub willing_to_pay_cents: Option<i64>,
    pub usage_applied: Option<i64>,
    pub usage_emailed: Option<i64>,
    pub usage_interviewed: Option<i64>,
    pub accepted_downsell: Option<bool>,
}

impl DraftPatch {
    /// True when no field is set (applying it only refreshes updated_at)
    pub fn is_empty(&self) -> bool {
        self.found_job.is_none()
            && self.found_via_program.is_none()
            && self.applied_range.is_none()
            && self.emailed_range.is_none()
            && self.interviewed_range.is_none()
            && self.feedback_text.is_none()
            && self.lawyer_provided.is_none()
            && self.visa_type.is_none()
            && self.reason_code.is_none()
            && self.reason_text.is_none()
            && self.willing_to_pay_cents.is_none()
            && self.usage_applied.is_none()
            && self.usage_emailed.is_none()
            && self.usage_interviewed.is_none()
            && self.accepted_downsell.is_none()
    }
}

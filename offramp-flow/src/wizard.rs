//! Wizard controller: the screen-sequencing state machine
//!
//! Drives the interview over the draft store: each submission is validated
//! for the current step, persisted as an allowlisted patch, and only then
//! advances the local step. A persistence failure leaves the step where it
//! was; resuming later re-infers the step from whatever was last saved.

use sqlx::SqlitePool;

use crate::store::drafts;
use offramp_common::steps::{
    amount_to_cents, is_valid_range_index, meets_min_elaboration, validate_patch,
    MIN_ELABORATION_CHARS,
};
use offramp_common::types::{DraftPatch, ReasonCode, Step, Variant};
use offramp_common::{infer_step, Error, Result};

/// Input for one wizard step submission
#[derive(Debug, Clone)]
pub enum StepInput {
    /// Entry screen: has the subscriber found a job?
    FoundJob { found: bool },
    /// Job-details screen: program usage plus the three range counters
    JobDetails {
        found_via_program: bool,
        applied: i64,
        emailed: i64,
        interviewed: i64,
    },
    /// Feedback screen free text
    Feedback { text: String },
    /// Visa screen
    Visa {
        lawyer_provided: bool,
        visa_type: String,
    },
    /// Discount offer decision (variant B)
    Downsell { accept: bool },
    /// Reason screen; amount is the raw user entry, validated here
    Reason {
        code: ReasonCode,
        elaboration: Option<String>,
        amount: Option<String>,
    },
    /// Usage screen range counters
    Usage {
        applied: i64,
        emailed: i64,
        interviewed: i64,
    },
    /// Pre-commit confirmation
    ConfirmCancel,
}

/// Per-subscriber wizard session
///
/// Holds the draft key and the current step; all durable state lives in
/// the store, so a dropped session is rebuilt by `start` via step
/// inference.
#[derive(Debug)]
pub struct Wizard {
    draft_id: String,
    user_id: String,
    variant: Variant,
    step: Step,
}

impl Wizard {
    /// Start or resume the wizard for (user, subscription)
    pub async fn start(pool: &SqlitePool, user_id: &str, subscription_id: &str) -> Result<Self> {
        let row = drafts::start_draft(pool, user_id, subscription_id).await?;
        Ok(Self {
            draft_id: row.id.clone(),
            user_id: user_id.to_string(),
            variant: row.downsell_variant,
            step: infer_step(&row),
        })
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn draft_id(&self) -> &str {
        &self.draft_id
    }

    /// Submit the current screen's input
    ///
    /// Validates, persists, then advances. Terminal screens accept any
    /// re-submission as an idempotent revisit and never re-commit.
    pub async fn submit(&mut self, pool: &SqlitePool, input: StepInput) -> Result<Step> {
        if self.step.is_terminal() {
            return Ok(self.step);
        }

        let next = match (self.step, input) {
            (Step::Entry, StepInput::FoundJob { found }) => {
                let patch = DraftPatch {
                    found_job: Some(found),
                    ..DraftPatch::default()
                };
                drafts::apply_patch(pool, &self.draft_id, &self.user_id, &patch).await?;
                if found {
                    Step::JobDetails
                } else {
                    match self.variant {
                        Variant::B => Step::DownsellOffer,
                        Variant::A => Step::Reason,
                    }
                }
            }

            (
                Step::JobDetails,
                StepInput::JobDetails {
                    found_via_program,
                    applied,
                    emailed,
                    interviewed,
                },
            ) => {
                for index in [applied, emailed, interviewed] {
                    if !is_valid_range_index(index) {
                        return Err(Error::Validation(
                            "All three range selections are required".to_string(),
                        ));
                    }
                }
                let patch = DraftPatch {
                    found_via_program: Some(found_via_program),
                    applied_range: Some(applied),
                    emailed_range: Some(emailed),
                    interviewed_range: Some(interviewed),
                    ..DraftPatch::default()
                };
                drafts::apply_patch(pool, &self.draft_id, &self.user_id, &patch).await?;
                Step::Feedback
            }

            (Step::Feedback, StepInput::Feedback { text }) => {
                if !meets_min_elaboration(&text) {
                    return Err(Error::Validation(format!(
                        "Feedback must be at least {} characters",
                        MIN_ELABORATION_CHARS
                    )));
                }
                let patch = DraftPatch {
                    feedback_text: Some(text),
                    ..DraftPatch::default()
                };
                validate_patch(&patch)?;
                drafts::apply_patch(pool, &self.draft_id, &self.user_id, &patch).await?;
                Step::Visa
            }

            (
                Step::Visa,
                StepInput::Visa {
                    lawyer_provided,
                    visa_type,
                },
            ) => {
                if visa_type.trim().is_empty() {
                    return Err(Error::Validation("Visa type is required".to_string()));
                }
                let patch = DraftPatch {
                    lawyer_provided: Some(lawyer_provided),
                    visa_type: Some(visa_type),
                    ..DraftPatch::default()
                };
                drafts::apply_patch(pool, &self.draft_id, &self.user_id, &patch).await?;
                // Found-job path completes here; this is the commit
                drafts::commit_by_id(pool, &self.draft_id, &self.user_id).await?;
                Step::FoundDone
            }

            (Step::DownsellOffer, StepInput::Downsell { accept }) => {
                if accept {
                    self.accept_and_finalize(pool).await?;
                    Step::DiscountDone
                } else {
                    Step::Reason
                }
            }

            (
                Step::Reason,
                StepInput::Reason {
                    code,
                    elaboration,
                    amount,
                },
            ) => {
                let willing_to_pay_cents = if code.needs_amount() {
                    let raw = amount.as_deref().ok_or_else(|| {
                        Error::Validation("An amount is required for this reason".to_string())
                    })?;
                    Some(amount_to_cents(raw).ok_or_else(|| {
                        Error::Validation("Enter a valid amount (e.g., 15 or 19.99)".to_string())
                    })?)
                } else {
                    None
                };
                if code.needs_elaboration() {
                    let text = elaboration.as_deref().unwrap_or("");
                    if !meets_min_elaboration(text) {
                        return Err(Error::Validation(format!(
                            "Tell us a little more (at least {} characters)",
                            MIN_ELABORATION_CHARS
                        )));
                    }
                }
                let patch = DraftPatch {
                    reason_code: Some(code),
                    reason_text: elaboration,
                    willing_to_pay_cents,
                    ..DraftPatch::default()
                };
                validate_patch(&patch)?;
                drafts::apply_patch(pool, &self.draft_id, &self.user_id, &patch).await?;
                Step::Usage
            }

            (
                Step::Usage,
                StepInput::Usage {
                    applied,
                    emailed,
                    interviewed,
                },
            ) => {
                for index in [applied, emailed, interviewed] {
                    if !is_valid_range_index(index) {
                        return Err(Error::Validation(
                            "All three range selections are required".to_string(),
                        ));
                    }
                }
                let patch = DraftPatch {
                    usage_applied: Some(applied),
                    usage_emailed: Some(emailed),
                    usage_interviewed: Some(interviewed),
                    ..DraftPatch::default()
                };
                drafts::apply_patch(pool, &self.draft_id, &self.user_id, &patch).await?;
                Step::Confirm
            }

            // Variant B shows the inline offer again on the usage screen
            (Step::Usage, StepInput::Downsell { accept: true }) if self.variant == Variant::B => {
                self.accept_and_finalize(pool).await?;
                Step::DiscountDone
            }

            (Step::Confirm, StepInput::ConfirmCancel) => {
                drafts::commit_by_id(pool, &self.draft_id, &self.user_id).await?;
                Step::CancelDone
            }

            (step, input) => {
                return Err(Error::Validation(format!(
                    "Input {:?} does not match the current step {:?}",
                    input, step
                )));
            }
        };

        self.step = next;
        Ok(self.step)
    }

    /// Navigate backward to the entry or branch-root screen
    ///
    /// Not a full undo: persisted answers stay, only the screen changes.
    /// Terminal screens do not navigate back.
    pub fn back(&mut self) {
        let branch_root = match self.variant {
            Variant::B => Step::DownsellOffer,
            Variant::A => Step::Reason,
        };
        self.step = match self.step {
            Step::JobDetails | Step::Feedback | Step::Visa => Step::Entry,
            Step::DownsellOffer => Step::Entry,
            step if step == branch_root => Step::Entry,
            Step::Reason | Step::Usage | Step::Confirm => branch_root,
            other => other,
        };
    }

    /// Accept the discount and finalize: the subscription continues
    /// untouched and the draft commits with accepted_downsell set.
    async fn accept_and_finalize(&self, pool: &SqlitePool) -> Result<()> {
        drafts::accept_downsell(pool, &self.draft_id, &self.user_id).await?;
        drafts::commit_by_id(pool, &self.draft_id, &self.user_id).await?;
        Ok(())
    }
}

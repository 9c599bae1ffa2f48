//! Step inference and per-step validation rules
//!
//! `infer_step` is the single source of truth for "which screen does this
//! row resume at". It is a pure function over the persisted row, evaluated
//! as an ordered decision list (first match wins). The ordering is a
//! contract: reordering the checks changes observable resume behavior and
//! must be treated as a breaking change.

use crate::types::{CancellationRow, DraftPatch, Step, Variant, MAX_RANGE_INDEX};
use crate::{Error, Result};

/// Minimum trimmed length for required free-text elaborations
pub const MIN_ELABORATION_CHARS: usize = 25;

/// Maximum accepted length for the found-job feedback text
pub const FEEDBACK_MAX_CHARS: usize = 2000;

/// Maximum accepted length for the still-looking elaboration text
pub const ELABORATION_MAX_CHARS: usize = 1000;

/// Infer the current screen from a persisted draft row
///
/// Decision list, first match wins:
/// 1. no found-job answer yet → entry
/// 2. found a job → walk the job-details / feedback / visa chain
/// 3. still looking → accepted discount short-circuits everything, then
///    reason (variant B sees the offer first), usage, confirm
pub fn infer_step(row: &CancellationRow) -> Step {
    let found_job = match row.found_job {
        None => return Step::Entry,
        Some(v) => v,
    };

    if found_job {
        if row.found_via_program.is_none()
            || row.applied_range.is_none()
            || row.emailed_range.is_none()
            || row.interviewed_range.is_none()
        {
            return Step::JobDetails;
        }
        if !has_text(&row.feedback_text) {
            return Step::Feedback;
        }
        if row.lawyer_provided.is_none() || !has_text(&row.visa_type) {
            return Step::Visa;
        }
        return Step::FoundDone;
    }

    // Still-looking path
    if row.accepted_downsell {
        return Step::DiscountDone;
    }
    if row.reason_code.is_none() {
        return match row.downsell_variant {
            Variant::B => Step::DownsellOffer,
            Variant::A => Step::Reason,
        };
    }
    if row.usage_applied.is_none() || row.usage_emailed.is_none() || row.usage_interviewed.is_none()
    {
        return Step::Usage;
    }
    Step::Confirm
}

/// Empty or whitespace-only text counts as absent
fn has_text(value: &Option<String>) -> bool {
    value.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false)
}

/// Trimmed minimum-length check for required elaborations
pub fn meets_min_elaboration(text: &str) -> bool {
    text.trim().chars().count() >= MIN_ELABORATION_CHARS
}

/// Bucketed range index must name one of the four buckets
pub fn is_valid_range_index(index: i64) -> bool {
    (0..=MAX_RANGE_INDEX).contains(&index)
}

/// Willingness-to-pay amount: digits with an optional 1-2 digit decimal part
///
/// Accepts "15", "19.99", "0.5"; rejects "", ".", "15.", "1.234", "abc".
pub fn is_valid_amount(amount: &str) -> bool {
    let mut parts = amount.splitn(2, '.');
    let whole = parts.next().unwrap_or("");
    if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    match parts.next() {
        None => true,
        Some(frac) => {
            (1..=2).contains(&frac.len()) && frac.chars().all(|c| c.is_ascii_digit())
        }
    }
}

/// Parse a validated amount into integer cents
///
/// Returns None for malformed input and for amounts too large to count in
/// i64 cents, so an oversized entry is a validation failure, not a wrap.
pub fn amount_to_cents(amount: &str) -> Option<i64> {
    if !is_valid_amount(amount) {
        return None;
    }
    let mut parts = amount.splitn(2, '.');
    let whole: i64 = parts.next()?.parse().ok()?;
    let cents = match parts.next() {
        None => 0,
        Some(frac) => {
            let n: i64 = frac.parse().ok()?;
            if frac.len() == 1 {
                n * 10
            } else {
                n
            }
        }
    };
    whole.checked_mul(100)?.checked_add(cents)
}

/// Server-side validation backstop for an incoming patch
///
/// The wizard blocks invalid transitions client-side; this is the
/// authoritative check, applied before any persistence write.
pub fn validate_patch(patch: &DraftPatch) -> Result<()> {
    let ranges = [
        ("applied_range", patch.applied_range),
        ("emailed_range", patch.emailed_range),
        ("interviewed_range", patch.interviewed_range),
        ("usage_applied", patch.usage_applied),
        ("usage_emailed", patch.usage_emailed),
        ("usage_interviewed", patch.usage_interviewed),
    ];
    for (name, value) in ranges {
        if let Some(index) = value {
            if !is_valid_range_index(index) {
                return Err(Error::Validation(format!(
                    "{} must be between 0 and {}",
                    name, MAX_RANGE_INDEX
                )));
            }
        }
    }

    if let Some(text) = &patch.feedback_text {
        if !meets_min_elaboration(text) {
            return Err(Error::Validation(format!(
                "feedback_text must be at least {} characters",
                MIN_ELABORATION_CHARS
            )));
        }
        if text.chars().count() > FEEDBACK_MAX_CHARS {
            return Err(Error::Validation(format!(
                "feedback_text must be at most {} characters",
                FEEDBACK_MAX_CHARS
            )));
        }
    }

    if let Some(text) = &patch.reason_text {
        if !meets_min_elaboration(text) {
            return Err(Error::Validation(format!(
                "reason_text must be at least {} characters",
                MIN_ELABORATION_CHARS
            )));
        }
        if text.chars().count() > ELABORATION_MAX_CHARS {
            return Err(Error::Validation(format!(
                "reason_text must be at most {} characters",
                ELABORATION_MAX_CHARS
            )));
        }
    }

    if let Some(visa) = &patch.visa_type {
        if visa.trim().is_empty() {
            return Err(Error::Validation("visa_type must not be empty".to_string()));
        }
    }

    if let Some(code) = patch.reason_code {
        if code.needs_amount() && patch.willing_to_pay_cents.is_none() {
            return Err(Error::Validation(
                "willing_to_pay_cents is required for the too_expensive reason".to_string(),
            ));
        }
        if code.needs_elaboration() && patch.reason_text.is_none() {
            return Err(Error::Validation(
                "reason_text is required for this reason".to_string(),
            ));
        }
    }

    if let Some(cents) = patch.willing_to_pay_cents {
        if cents < 0 {
            return Err(Error::Validation(
                "willing_to_pay_cents must not be negative".to_string(),
            ));
        }
    }

    Ok(())
}

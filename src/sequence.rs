//! Receipt and invoice numbering
//!
//! Numbers are derived optimistically: read the last issued identifier, bump its
//! trailing integer, and let the unique constraint catch collisions. Derivation is kept
//! pure here; [`retry_on_conflict`] is the bounded recovery loop wrapped around the
//! persistence call.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::error::ApiError;

/// Prefix shared by every payment receipt
pub const RECEIPT_PREFIX: &str = "PR";

/// Department code used when a department has no entry in the lookup table
pub const GENERIC_DEPARTMENT_CODE: &str = "GEN";

/// Attempts allowed for the invoice uniqueness re-check loop
pub const INVOICE_RECHECK_LIMIT: u32 = 100;

const SEPARATOR: char = '-';

/// Sequence that follows `last`, or 1 when there is no previous number
/// or its trailing segment is not an integer.
pub fn next_sequence(last: Option<&str>) -> u64 {
    last.and_then(|number| number.rsplit(SEPARATOR).next())
        .and_then(|tail| tail.trim().parse::<u64>().ok())
        .map(|n| n + 1)
        .unwrap_or(1)
}

/// `PR-<loan id>-` prefix that scopes receipts to one loan
pub fn receipt_prefix(loan_id: i64) -> String {
    format!("{}-{}-", RECEIPT_PREFIX, loan_id)
}

/// `PR-<loan id>-<4-digit sequence>`
pub fn receipt_number(loan_id: i64, sequence: u64) -> String {
    format!("{}{:04}", receipt_prefix(loan_id), sequence)
}

/// Printed department code for a department name
pub fn department_code(department: &str) -> &'static str {
    match department.trim().to_lowercase().as_str() {
        "ayuntamiento" => "AYU",
        "ferquido" => "FER",
        _ => GENERIC_DEPARTMENT_CODE,
    }
}

/// `<DEPT>-<YEAR>-` prefix that scopes invoices to a department and year
pub fn invoice_prefix(department: &str, year: i32) -> String {
    format!("{}-{}-", department_code(department), year)
}

/// `<DEPT>-<YEAR>-<6-digit sequence>` for an invoice prefix
pub fn invoice_number(prefix: &str, sequence: u64) -> String {
    format!("{}{:06}", prefix, sequence)
}

/// Candidate tried on the given re-check attempt. The step grows with each
/// collision: offsets 0, 1, 3, 6, 10, ...
pub fn escalated_sequence(base: u64, attempt: u32) -> u64 {
    let attempt = u64::from(attempt);
    base + attempt * (attempt + 1) / 2
}

/// Last-resort invoice number once the re-check loop is exhausted
pub fn timestamp_invoice_number(prefix: &str, now: DateTime<Utc>) -> String {
    format!("{}{}", prefix, now.timestamp_micros())
}

/// Errors that can tell a uniqueness collision apart from other failures
pub trait ConflictError {
    fn is_conflict(&self) -> bool;
}

impl ConflictError for ApiError {
    fn is_conflict(&self) -> bool {
        matches!(self, ApiError::UniqueViolation(_))
    }
}

impl ConflictError for sqlx::Error {
    fn is_conflict(&self) -> bool {
        matches!(self, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
    }
}

/// How many times a colliding insert is attempted and how long to wait between tries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("still conflicting after {attempts} attempts")]
    Exhausted { attempts: u32 },

    #[error(transparent)]
    Failed(E),
}

impl From<RetryError<ApiError>> for ApiError {
    fn from(err: RetryError<ApiError>) -> Self {
        match err {
            RetryError::Exhausted { attempts } => ApiError::SequenceExhausted(format!(
                "no unique number after {} attempts",
                attempts
            )),
            RetryError::Failed(inner) => inner,
        }
    }
}

/// Run `op` until it succeeds, fails with a non-conflict error, or the policy runs out.
///
/// `op` receives the 1-based attempt number.
pub async fn retry_on_conflict<T, E, F, Fut>(
    policy: RetryPolicy,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    E: ConflictError + std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_conflict() => {
                if attempt >= policy.max_attempts {
                    tracing::error!(attempts = attempt, error = %err, "Giving up on conflicting insert");
                    return Err(RetryError::Exhausted { attempts: attempt });
                }
                tracing::warn!(attempt, error = %err, "Number already taken, retrying");
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(err) => return Err(RetryError::Failed(err)),
        }
    }
}

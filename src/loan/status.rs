//! Loan lifecycle
//!
//! ```text
//! ACTIVO --(paid in full)--> PAGADO
//! ACTIVO --(void)----------> ANULADO
//! ACTIVO <--(toggle)-------> INACTIVO
//! ```
//!
//! ATRASADO is never stored; [`display_status`] projects it from the due date and the
//! outstanding balance.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ApiError;

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "loan_status")]
pub enum LoanStatus {
    #[sqlx(rename = "ACTIVO")]
    #[serde(rename = "ACTIVO")]
    Active,
    #[sqlx(rename = "PAGADO")]
    #[serde(rename = "PAGADO")]
    Paid,
    #[sqlx(rename = "ANULADO")]
    #[serde(rename = "ANULADO")]
    Voided,
    #[sqlx(rename = "INACTIVO")]
    #[serde(rename = "INACTIVO")]
    Inactive,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "ACTIVO",
            LoanStatus::Paid => "PAGADO",
            LoanStatus::Voided => "ANULADO",
            LoanStatus::Inactive => "INACTIVO",
        }
    }

    /// Whether new payments may be recorded against a loan in this state
    pub fn accepts_payments(&self) -> bool {
        matches!(self, LoanStatus::Active | LoanStatus::Paid)
    }

    pub fn apply(self, event: LoanEvent) -> Result<LoanStatus, TransitionError> {
        match (self, event) {
            (LoanStatus::Active, LoanEvent::PaidInFull) => Ok(LoanStatus::Paid),
            (LoanStatus::Active, LoanEvent::Void) => Ok(LoanStatus::Voided),
            (LoanStatus::Active, LoanEvent::ToggleActivity) => Ok(LoanStatus::Inactive),
            (LoanStatus::Inactive, LoanEvent::ToggleActivity) => Ok(LoanStatus::Active),
            (from, event) => Err(TransitionError { from, event }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanEvent {
    PaidInFull,
    Void,
    ToggleActivity,
}

impl LoanEvent {
    fn describe(&self) -> &'static str {
        match self {
            LoanEvent::PaidInFull => "marcar como pagado",
            LoanEvent::Void => "anular",
            LoanEvent::ToggleActivity => "activar/desactivar",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("cannot {} a loan in state {}", .event.describe(), .from.as_str())]
pub struct TransitionError {
    pub from: LoanStatus,
    pub event: LoanEvent,
}

impl From<TransitionError> for ApiError {
    fn from(err: TransitionError) -> Self {
        ApiError::BusinessRule(format!(
            "No se puede {} un préstamo en estado {}",
            err.event.describe(),
            err.from.as_str()
        ))
    }
}

/// Status as shown to users
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum DisplayStatus {
    #[serde(rename = "ACTIVO")]
    Active,
    #[serde(rename = "PAGADO")]
    Paid,
    #[serde(rename = "ANULADO")]
    Voided,
    #[serde(rename = "INACTIVO")]
    Inactive,
    #[serde(rename = "ATRASADO")]
    Overdue,
}

impl From<LoanStatus> for DisplayStatus {
    fn from(status: LoanStatus) -> Self {
        match status {
            LoanStatus::Active => DisplayStatus::Active,
            LoanStatus::Paid => DisplayStatus::Paid,
            LoanStatus::Voided => DisplayStatus::Voided,
            LoanStatus::Inactive => DisplayStatus::Inactive,
        }
    }
}

/// Outstanding balance, floored at zero
pub fn outstanding_balance(principal: Decimal, paid: Decimal) -> Decimal {
    (principal - paid).max(Decimal::ZERO)
}

/// Whether a cumulative paid total settles the principal
pub fn settles(principal: Decimal, paid: Decimal) -> bool {
    paid >= principal
}

pub fn display_status(
    status: LoanStatus,
    due_on: NaiveDate,
    today: NaiveDate,
    outstanding: Decimal,
) -> DisplayStatus {
    let overdue = matches!(status, LoanStatus::Active | LoanStatus::Paid)
        && due_on < today
        && outstanding > Decimal::ZERO;

    if overdue {
        DisplayStatus::Overdue
    } else {
        status.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_allowed_transitions() {
        assert_eq!(LoanStatus::Active.apply(LoanEvent::PaidInFull), Ok(LoanStatus::Paid));
        assert_eq!(LoanStatus::Active.apply(LoanEvent::Void), Ok(LoanStatus::Voided));
        assert_eq!(
            LoanStatus::Active.apply(LoanEvent::ToggleActivity),
            Ok(LoanStatus::Inactive)
        );
        assert_eq!(
            LoanStatus::Inactive.apply(LoanEvent::ToggleActivity),
            Ok(LoanStatus::Active)
        );
    }

    #[test]
    fn test_rejected_transitions() {
        for (from, event) in [
            (LoanStatus::Paid, LoanEvent::Void),
            (LoanStatus::Paid, LoanEvent::ToggleActivity),
            (LoanStatus::Voided, LoanEvent::ToggleActivity),
            (LoanStatus::Voided, LoanEvent::PaidInFull),
            (LoanStatus::Inactive, LoanEvent::Void),
            (LoanStatus::Inactive, LoanEvent::PaidInFull),
        ] {
            assert_eq!(from.apply(event), Err(TransitionError { from, event }));
        }
    }

    #[test]
    fn test_transition_error_is_business_rule() {
        let err: ApiError = LoanStatus::Voided
            .apply(LoanEvent::Void)
            .unwrap_err()
            .into();
        assert!(matches!(err, ApiError::BusinessRule(msg) if msg.contains("ANULADO")));
    }

    #[test]
    fn test_balance_and_settlement() {
        let principal = Decimal::new(10_000, 0);
        assert_eq!(outstanding_balance(principal, Decimal::new(4_000, 0)), Decimal::new(6_000, 0));
        assert_eq!(outstanding_balance(principal, Decimal::new(12_000, 0)), Decimal::ZERO);
        assert!(!settles(principal, Decimal::new(9_999, 0)));
        assert!(settles(principal, principal));
    }

    #[test]
    fn test_overdue_projection() {
        let today = date(2024, 6, 1);
        let past = date(2024, 5, 1);
        let future = date(2024, 7, 1);
        let owed = Decimal::new(500, 0);

        assert_eq!(display_status(LoanStatus::Active, past, today, owed), DisplayStatus::Overdue);
        assert_eq!(display_status(LoanStatus::Paid, past, today, owed), DisplayStatus::Overdue);
        assert_eq!(display_status(LoanStatus::Active, future, today, owed), DisplayStatus::Active);
        assert_eq!(
            display_status(LoanStatus::Active, past, today, Decimal::ZERO),
            DisplayStatus::Active
        );
        assert_eq!(display_status(LoanStatus::Inactive, past, today, owed), DisplayStatus::Inactive);
        assert_eq!(display_status(LoanStatus::Active, today, today, owed), DisplayStatus::Active);
    }

    #[test]
    fn test_status_wire_values() {
        assert_eq!(serde_json::to_value(LoanStatus::Voided).unwrap(), "ANULADO");
        assert_eq!(serde_json::to_value(DisplayStatus::Overdue).unwrap(), "ATRASADO");
        let parsed: LoanStatus = serde_json::from_str("\"PAGADO\"").unwrap();
        assert_eq!(parsed, LoanStatus::Paid);
    }
}

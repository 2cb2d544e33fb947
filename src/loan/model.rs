use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::client::ClientSummary;
use crate::error::FieldErrors;
use crate::forms::{self, optional_date, optional_text, positive_amount, required_choice, required_date, required_text};
use crate::loan::status::{display_status, outstanding_balance, DisplayStatus, LoanStatus};
use crate::models::PaymentMethod;
use crate::payment::Payment;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Loan {
    pub id: i64,
    pub client_id: i64,
    pub amount: Decimal,
    pub disbursed_on: NaiveDate,
    pub due_on: NaiveDate,
    pub payment_method: PaymentMethod,
    pub department: String,
    pub notes: Option<String>,
    pub invoice_number: Option<String>,
    pub status: LoanStatus,
    pub phone: Option<String>,
    pub registered_at: DateTime<Utc>,
}

impl Loan {
    /// Printed invoice number; loans created before numbering get `P-<id>`
    pub fn invoice_label(&self) -> String {
        self.invoice_number
            .clone()
            .unwrap_or_else(|| format!("P-{}", self.id))
    }
}

/// Loan row joined with the sum of its non-voided payments
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LoanWithPaid {
    #[sqlx(flatten)]
    pub loan: Loan,
    pub paid: Decimal,
}

/// Loan with its balance summary and display status
#[derive(Debug, Clone, Serialize)]
pub struct LoanView {
    #[serde(flatten)]
    pub loan: Loan,
    pub paid: Decimal,
    pub outstanding: Decimal,
    pub display_status: DisplayStatus,
}

impl LoanView {
    pub fn project(row: LoanWithPaid, today: NaiveDate) -> Self {
        let outstanding = outstanding_balance(row.loan.amount, row.paid);
        let display_status = display_status(row.loan.status, row.loan.due_on, today, outstanding);
        Self {
            loan: row.loan,
            paid: row.paid,
            outstanding,
            display_status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceView {
    pub invoice_number: String,
    pub loan: LoanView,
    pub client: ClientSummary,
    pub payments: Vec<Payment>,
}

/// Raw disbursement payload
#[derive(Debug, Default, Deserialize, Validate)]
pub struct DisburseLoanRequest {
    #[serde(default, deserialize_with = "forms::lenient")]
    pub client_document: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    pub amount: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    pub disbursed_on: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    pub due_on: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    pub payment_method: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    #[validate(length(max = 20, message = "Máximo 20 caracteres"))]
    pub department: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    #[validate(length(max = 2000, message = "Máximo 2000 caracteres"))]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    #[validate(length(max = 15, message = "Máximo 15 caracteres"))]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLoan {
    pub client_document: String,
    pub amount: Decimal,
    pub disbursed_on: NaiveDate,
    pub due_on: NaiveDate,
    pub payment_method: PaymentMethod,
    pub department: String,
    pub notes: Option<String>,
    pub phone: Option<String>,
}

impl NewLoan {
    pub fn invoice_year(&self) -> i32 {
        self.disbursed_on.year()
    }
}

impl DisburseLoanRequest {
    /// Parse the payload; a missing due date becomes `disbursed_on + default_term_days`
    pub fn parse(&self, errors: &mut FieldErrors, default_term_days: i64) -> Option<NewLoan> {
        let client_document = required_text(
            errors,
            "client_document",
            &self.client_document,
            "La cédula del cliente es requerida",
        );
        let amount = positive_amount(errors, "amount", &self.amount);
        let disbursed_on = required_date(errors, "disbursed_on", &self.disbursed_on);
        let due_on = optional_date(errors, "due_on", &self.due_on);
        let payment_method = required_choice::<PaymentMethod>(
            errors,
            "payment_method",
            &self.payment_method,
            "El método de pago es requerido",
        );
        let department = required_text(
            errors,
            "department",
            &self.department,
            "El departamento es requerido",
        );

        if let (Some(disbursed), Some(due)) = (disbursed_on, due_on) {
            if due < disbursed {
                errors.add(
                    "due_on",
                    "La fecha de vencimiento no puede ser anterior al desembolso",
                );
                return None;
            }
        }

        let disbursed_on = disbursed_on?;
        Some(NewLoan {
            client_document: client_document?,
            amount: amount?,
            disbursed_on,
            due_on: due_on.unwrap_or(disbursed_on + Duration::days(default_term_days)),
            payment_method: payment_method?,
            department: department?,
            notes: optional_text(&self.notes),
            phone: optional_text(&self.phone),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListLoansQuery {
    pub status: Option<LoanStatus>,
    pub client_id: Option<i64>,
    pub department: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub loan_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct BulkDeleteResult {
    pub deleted: u64,
}

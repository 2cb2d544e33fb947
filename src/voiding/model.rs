use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::Actor;
use crate::error::FieldErrors;
use crate::forms::{self, optional_date, optional_text, required_choice, required_text};
use crate::models::PaymentMethod;
use crate::payment::{Payment, PaymentType};

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "void_reason", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoidReason {
    ErrorMonto,
    ErrorCliente,
    PagoDuplicado,
    SolicitudCliente,
    Otro,
}

impl VoidReason {
    pub fn label(&self) -> &'static str {
        match self {
            VoidReason::ErrorMonto => "Error en el monto",
            VoidReason::ErrorCliente => "Error en el cliente",
            VoidReason::PagoDuplicado => "Pago duplicado",
            VoidReason::SolicitudCliente => "Solicitud del cliente",
            VoidReason::Otro => "Otro",
        }
    }
}

impl std::str::FromStr for VoidReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ERROR_MONTO" => Ok(VoidReason::ErrorMonto),
            "ERROR_CLIENTE" => Ok(VoidReason::ErrorCliente),
            "PAGO_DUPLICADO" => Ok(VoidReason::PagoDuplicado),
            "SOLICITUD_CLIENTE" => Ok(VoidReason::SolicitudCliente),
            "OTRO" => Ok(VoidReason::Otro),
            other => Err(format!("unknown void reason '{}'", other)),
        }
    }
}

/// Archived copy of a voided payment. Rows are write-once.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VoidedReceipt {
    pub id: i64,
    pub payment_id: i64,
    pub loan_id: Option<i64>,
    pub receipt_number: String,
    pub amount: Decimal,
    pub paid_on: NaiveDate,
    pub payment_method: PaymentMethod,
    pub payment_type: PaymentType,
    pub notes: Option<String>,
    pub payment_created_at: DateTime<Utc>,
    pub void_reason: VoidReason,
    pub void_date: NaiveDate,
    pub void_notes: Option<String>,
    pub voided_by_id: Uuid,
    pub voided_by: String,
    pub archived_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct VoidReceiptRequest {
    #[serde(default, deserialize_with = "forms::lenient")]
    pub receipt_number: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    pub reason: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    #[validate(length(max = 1000, message = "Máximo 1000 caracteres"))]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    pub void_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoidDetails {
    pub receipt_number: String,
    pub reason: VoidReason,
    pub notes: Option<String>,
    pub void_date: NaiveDate,
}

impl VoidReceiptRequest {
    /// A missing void date means `today`
    pub fn parse(&self, errors: &mut FieldErrors, today: NaiveDate) -> Option<VoidDetails> {
        let receipt_number = required_text(
            errors,
            "receipt_number",
            &self.receipt_number,
            "El número de recibo es requerido",
        );
        let reason = required_choice::<VoidReason>(
            errors,
            "reason",
            &self.reason,
            "El motivo de anulación es requerido",
        );
        let void_date = optional_date(errors, "void_date", &self.void_date);
        if errors.contains("void_date") {
            return None;
        }

        Some(VoidDetails {
            receipt_number: receipt_number?,
            reason: reason?,
            notes: optional_text(&self.notes),
            void_date: void_date.unwrap_or(today),
        })
    }
}

/// Archive row to insert for a payment being voided
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveEntry {
    pub payment_id: i64,
    pub loan_id: Option<i64>,
    pub receipt_number: String,
    pub amount: Decimal,
    pub paid_on: NaiveDate,
    pub payment_method: PaymentMethod,
    pub payment_type: PaymentType,
    pub notes: Option<String>,
    pub payment_created_at: DateTime<Utc>,
    pub void_reason: VoidReason,
    pub void_date: NaiveDate,
    pub void_notes: Option<String>,
    pub voided_by_id: Uuid,
    pub voided_by: String,
}

impl ArchiveEntry {
    pub fn capture(payment: &Payment, details: &VoidDetails, actor: &Actor) -> Self {
        Self {
            payment_id: payment.id,
            loan_id: payment.loan_id,
            receipt_number: payment.receipt_number.clone(),
            amount: payment.amount,
            paid_on: payment.paid_on,
            payment_method: payment.payment_method,
            payment_type: payment.payment_type,
            notes: payment.notes.clone(),
            payment_created_at: payment.created_at,
            void_reason: details.reason,
            void_date: details.void_date,
            void_notes: details.notes.clone(),
            voided_by_id: actor.user_id,
            voided_by: actor.username.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ArchiveQuery {
    pub loan_id: Option<i64>,
    pub receipt_number: Option<String>,
}

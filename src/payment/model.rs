use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::FieldErrors;
use crate::forms::{self, optional_text, positive_amount, required_choice, required_date, required_id};
use crate::loan::LoanStatus;
use crate::models::PaymentMethod;
use crate::voiding::VoidReason;

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "payment_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Completo,
    Parcial,
}

impl PaymentType {
    pub fn label(&self) -> &'static str {
        match self {
            PaymentType::Completo => "Pago Completo",
            PaymentType::Parcial => "Pago Parcial",
        }
    }
}

impl std::str::FromStr for PaymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "completo" => Ok(PaymentType::Completo),
            "parcial" => Ok(PaymentType::Parcial),
            other => Err(format!("unknown payment type '{}'", other)),
        }
    }
}

/// A payment ("ingreso") and its receipt
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub id: i64,
    pub loan_id: Option<i64>,
    pub receipt_number: String,
    pub amount: Decimal,
    pub paid_on: NaiveDate,
    pub payment_method: PaymentMethod,
    pub payment_type: PaymentType,
    pub notes: Option<String>,
    pub voided: bool,
    pub void_reason: Option<VoidReason>,
    pub void_date: Option<NaiveDate>,
    pub void_notes: Option<String>,
    pub voided_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Raw payment payload
#[derive(Debug, Default, Deserialize, Validate)]
pub struct RegisterPaymentRequest {
    #[serde(default, deserialize_with = "forms::lenient")]
    pub client_id: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    pub loan_id: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    pub amount: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    pub paid_on: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    pub payment_method: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    pub payment_type: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    #[validate(length(max = 1000, message = "Máximo 1000 caracteres"))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub client_id: i64,
    pub loan_id: i64,
    pub amount: Decimal,
    pub paid_on: NaiveDate,
    pub payment_method: PaymentMethod,
    pub payment_type: PaymentType,
    pub notes: Option<String>,
}

impl RegisterPaymentRequest {
    pub fn parse(&self, errors: &mut FieldErrors) -> Option<NewPayment> {
        let client_id = required_id(errors, "client_id", &self.client_id, "Seleccione un cliente");
        let loan_id = required_id(errors, "loan_id", &self.loan_id, "Seleccione un préstamo");
        let amount = positive_amount(errors, "amount", &self.amount);
        let paid_on = required_date(errors, "paid_on", &self.paid_on);
        let payment_method = required_choice::<PaymentMethod>(
            errors,
            "payment_method",
            &self.payment_method,
            "El método de pago es requerido",
        );
        let payment_type = required_choice::<PaymentType>(
            errors,
            "payment_type",
            &self.payment_type,
            "El tipo de pago es requerido",
        );

        Some(NewPayment {
            client_id: client_id?,
            loan_id: loan_id?,
            amount: amount?,
            paid_on: paid_on?,
            payment_method: payment_method?,
            payment_type: payment_type?,
            notes: optional_text(&self.notes),
        })
    }
}

/// Confirmation returned after a payment is recorded
#[derive(Debug, Serialize)]
pub struct PaymentReceipt {
    pub payment: Payment,
    pub method_label: &'static str,
    pub type_label: &'static str,
    pub remaining_balance: Decimal,
    pub loan_status: LoanStatus,
}

impl PaymentReceipt {
    pub fn new(payment: Payment, remaining_balance: Decimal, loan_status: LoanStatus) -> Self {
        Self {
            method_label: payment.payment_method.label(),
            type_label: payment.payment_type.label(),
            payment,
            remaining_balance,
            loan_status,
        }
    }
}

/// Receipt lookup result
#[derive(Debug, Serialize)]
pub struct ReceiptView {
    pub payment: Payment,
    pub method_label: &'static str,
    pub type_label: &'static str,
    pub invoice_number: Option<String>,
    pub client_name: Option<String>,
    pub loan_amount: Option<Decimal>,
    pub remaining_balance: Option<Decimal>,
}

/// Loan context joined onto a receipt lookup
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReceiptLoanContext {
    pub loan_id: i64,
    pub invoice_number: Option<String>,
    pub client_name: String,
    pub loan_amount: Decimal,
    pub paid: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    #[test]
    fn test_payment_request_parses() {
        let request = RegisterPaymentRequest {
            client_id: text("3"),
            loan_id: text("5"),
            amount: text("4000"),
            paid_on: text("2024-03-15"),
            payment_method: text("transferencia"),
            payment_type: text("parcial"),
            notes: text("  "),
        };
        let mut errors = FieldErrors::new();
        let payment = request.parse(&mut errors).unwrap();

        assert!(errors.is_empty());
        assert_eq!(payment.loan_id, 5);
        assert_eq!(payment.amount, Decimal::new(4_000, 0));
        assert_eq!(payment.payment_type, PaymentType::Parcial);
        assert!(payment.notes.is_none());
    }

    #[test]
    fn test_zero_amount_is_field_error() {
        let request = RegisterPaymentRequest {
            client_id: text("3"),
            loan_id: text("5"),
            amount: text("0"),
            paid_on: text("2024-03-15"),
            payment_method: text("efectivo"),
            payment_type: text("completo"),
            ..Default::default()
        };
        let mut errors = FieldErrors::new();

        assert!(request.parse(&mut errors).is_none());
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["amount"]);
    }

    #[test]
    fn test_amount_beyond_cents_or_column_is_field_error() {
        for amount in ["0.001", "150.255", "10000000000"] {
            let request = RegisterPaymentRequest {
                client_id: text("3"),
                loan_id: text("5"),
                amount: text(amount),
                paid_on: text("2024-03-15"),
                payment_method: text("efectivo"),
                payment_type: text("parcial"),
                ..Default::default()
            };
            let mut errors = FieldErrors::new();

            assert!(request.parse(&mut errors).is_none(), "{} accepted", amount);
            assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["amount"]);
        }
    }

    #[test]
    fn test_receipt_labels() {
        assert_eq!(PaymentType::Completo.label(), "Pago Completo");
        assert_eq!(PaymentType::Parcial.label(), "Pago Parcial");
        assert!("mensual".parse::<PaymentType>().is_err());
    }
}

use rust_decimal::Decimal;
use sqlx::PgPool;
use validator::Validate;

use crate::error::{ApiError, FieldErrors};
use crate::loan::{outstanding_balance, settles, Loan, LoanEvent, LoanStatus};
use crate::payment::model::{
    NewPayment, Payment, PaymentReceipt, ReceiptLoanContext, ReceiptView, RegisterPaymentRequest,
};
use crate::sequence::{next_sequence, receipt_number, retry_on_conflict, RetryPolicy};

/// Payment ledger: registration, receipt numbering and lookups
#[derive(Clone)]
pub struct PaymentService {
    db_pool: PgPool,
    retry: RetryPolicy,
}

impl PaymentService {
    pub fn new(db_pool: PgPool, retry: RetryPolicy) -> Self {
        Self { db_pool, retry }
    }

    /// Record a payment against a client's loan.
    ///
    /// The loan row is locked while the balance is computed, so concurrent payments
    /// cannot jointly overpay it. Receipt collisions retry the whole transaction.
    pub async fn register_payment(
        &self,
        request: RegisterPaymentRequest,
    ) -> Result<PaymentReceipt, ApiError> {
        let mut errors = FieldErrors::new();
        if let Err(e) = request.validate() {
            errors.extend_from(e);
        }
        let parsed = request.parse(&mut errors);
        errors.into_result()?;
        let new_payment = parsed.ok_or_else(|| {
            ApiError::InternalError("payment parsed without errors but incomplete".to_string())
        })?;

        let new_payment = &new_payment;
        let receipt = retry_on_conflict(self.retry, |attempt| async move {
            self.insert_payment(new_payment, attempt).await
        })
        .await?;

        tracing::info!(
            loan_id = new_payment.loan_id,
            receipt = %receipt.payment.receipt_number,
            amount = %receipt.payment.amount,
            remaining = %receipt.remaining_balance,
            "Payment registered"
        );

        Ok(receipt)
    }

    async fn insert_payment(
        &self,
        new_payment: &NewPayment,
        attempt: u32,
    ) -> Result<PaymentReceipt, ApiError> {
        let mut tx = self.db_pool.begin().await?;

        let loan = sqlx::query_as::<_, Loan>(
            "SELECT * FROM loans WHERE id = $1 AND client_id = $2 FOR UPDATE",
        )
        .bind(new_payment.loan_id)
        .bind(new_payment.client_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound("Préstamo no encontrado para este cliente".to_string())
        })?;

        if !loan.status.accepts_payments() {
            tracing::warn!(loan_id = loan.id, status = loan.status.as_str(), "Payment on closed loan rejected");
            return Err(ApiError::BusinessRule(format!(
                "No se pueden registrar pagos en un préstamo {}",
                loan.status.as_str()
            )));
        }

        let paid: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE loan_id = $1 AND NOT voided",
        )
        .bind(loan.id)
        .fetch_one(&mut *tx)
        .await?;

        let outstanding = outstanding_balance(loan.amount, paid);
        if new_payment.amount > outstanding {
            tracing::warn!(
                loan_id = loan.id,
                amount = %new_payment.amount,
                %outstanding,
                "Payment exceeds outstanding balance"
            );
            return Err(ApiError::BusinessRule(format!(
                "El monto excede el saldo pendiente de {}",
                outstanding
            )));
        }

        let last: Option<String> = sqlx::query_scalar(
            "SELECT receipt_number FROM payments WHERE loan_id = $1 ORDER BY receipt_number DESC LIMIT 1",
        )
        .bind(loan.id)
        .fetch_optional(&mut *tx)
        .await?;
        let number = receipt_number(loan.id, next_sequence(last.as_deref()));
        tracing::debug!(attempt, %number, "Receipt number selected");

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (
                loan_id, receipt_number, amount, paid_on, payment_method, payment_type, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(loan.id)
        .bind(&number)
        .bind(new_payment.amount)
        .bind(new_payment.paid_on)
        .bind(new_payment.payment_method)
        .bind(new_payment.payment_type)
        .bind(&new_payment.notes)
        .fetch_one(&mut *tx)
        .await?;

        let total_paid = paid + payment.amount;
        let mut status = loan.status;
        if status == LoanStatus::Active && settles(loan.amount, total_paid) {
            status = status.apply(LoanEvent::PaidInFull)?;
            sqlx::query("UPDATE loans SET status = $1 WHERE id = $2")
                .bind(status)
                .bind(loan.id)
                .execute(&mut *tx)
                .await?;
            tracing::info!(loan_id = loan.id, "Loan paid in full");
        }

        tx.commit().await?;

        Ok(PaymentReceipt::new(
            payment,
            outstanding_balance(loan.amount, total_paid),
            status,
        ))
    }

    pub async fn get_receipt(&self, receipt_number: &str) -> Result<ReceiptView, ApiError> {
        let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE receipt_number = $1")
            .bind(receipt_number.trim())
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::NotFound("Recibo no encontrado".to_string()))?;

        let context = match payment.loan_id {
            Some(loan_id) => {
                sqlx::query_as::<_, ReceiptLoanContext>(
                    r#"
                    SELECT l.id AS loan_id, l.invoice_number,
                           c.first_names || ' ' || c.last_names AS client_name,
                           l.amount AS loan_amount,
                           COALESCE((SELECT SUM(p.amount) FROM payments p
                                     WHERE p.loan_id = l.id AND NOT p.voided), 0) AS paid
                    FROM loans l
                    JOIN clients c ON c.id = l.client_id
                    WHERE l.id = $1
                    "#,
                )
                .bind(loan_id)
                .fetch_optional(&self.db_pool)
                .await?
            }
            None => None,
        };

        Ok(ReceiptView {
            method_label: payment.payment_method.label(),
            type_label: payment.payment_type.label(),
            payment,
            invoice_number: context.as_ref().and_then(|c| c.invoice_number.clone()),
            client_name: context.as_ref().map(|c| c.client_name.clone()),
            loan_amount: context.as_ref().map(|c| c.loan_amount),
            remaining_balance: context
                .as_ref()
                .map(|c| outstanding_balance(c.loan_amount, c.paid)),
        })
    }

    /// Payments of a loan, oldest receipt first
    pub async fn payments_for_loan(&self, loan_id: i64) -> Result<Vec<Payment>, ApiError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM loans WHERE id = $1)")
            .bind(loan_id)
            .fetch_one(&self.db_pool)
            .await?;

        if !exists {
            return Err(ApiError::NotFound("Préstamo no encontrado".to_string()));
        }

        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE loan_id = $1 ORDER BY receipt_number",
        )
        .bind(loan_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(payments)
    }
}

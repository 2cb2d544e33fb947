use chrono::{NaiveDate, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use validator::Validate;

use crate::client::ClientSummary;
use crate::error::{ApiError, FieldErrors};
use crate::loan::model::{
    BulkDeleteResult, DisburseLoanRequest, InvoiceView, ListLoansQuery, Loan, LoanView,
    LoanWithPaid, NewLoan,
};
use crate::loan::status::{LoanEvent, LoanStatus};
use crate::models::{page_window, PaginatedResponse};
use crate::payment::Payment;
use crate::sequence::{
    escalated_sequence, invoice_number, invoice_prefix, next_sequence, retry_on_conflict,
    timestamp_invoice_number, RetryPolicy, INVOICE_RECHECK_LIMIT,
};

/// Loan columns plus the sum of non-voided payments
const LOAN_WITH_PAID: &str = r#"
    SELECT l.*,
           COALESCE((SELECT SUM(p.amount) FROM payments p
                     WHERE p.loan_id = l.id AND NOT p.voided), 0) AS paid
    FROM loans l
"#;

const INVOICE_SEQUENCE_WIDTH: i32 = 6;

fn loan_not_found() -> ApiError {
    ApiError::NotFound("Préstamo no encontrado".to_string())
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Loan service for disbursement, lookups and lifecycle changes
#[derive(Clone)]
pub struct LoanService {
    db_pool: PgPool,
    retry: RetryPolicy,
    default_term_days: i64,
}

impl LoanService {
    pub fn new(db_pool: PgPool, retry: RetryPolicy, default_term_days: i64) -> Self {
        Self {
            db_pool,
            retry,
            default_term_days,
        }
    }

    /// Disburse a loan to the client holding `client_document`, assigning the next
    /// invoice number for the department and disbursement year.
    pub async fn disburse_loan(&self, request: DisburseLoanRequest) -> Result<Loan, ApiError> {
        let mut errors = FieldErrors::new();
        if let Err(e) = request.validate() {
            errors.extend_from(e);
        }
        let parsed = request.parse(&mut errors, self.default_term_days);
        errors.into_result()?;
        let new_loan = parsed.ok_or_else(|| {
            ApiError::InternalError("loan parsed without errors but incomplete".to_string())
        })?;

        let client_id: i64 =
            sqlx::query_scalar("SELECT id FROM clients WHERE identity_number = $1")
                .bind(&new_loan.client_document)
                .fetch_optional(&self.db_pool)
                .await?
                .ok_or_else(|| ApiError::NotFound("Cliente no encontrado".to_string()))?;

        let new_loan = &new_loan;
        let loan = retry_on_conflict(self.retry, |attempt| async move {
            self.insert_with_invoice(client_id, new_loan, attempt).await
        })
        .await?;

        tracing::info!(
            loan_id = loan.id,
            client_id,
            invoice = ?loan.invoice_number,
            amount = %loan.amount,
            "Loan disbursed"
        );

        Ok(loan)
    }

    async fn insert_with_invoice(
        &self,
        client_id: i64,
        new_loan: &NewLoan,
        attempt: u32,
    ) -> Result<Loan, ApiError> {
        let mut tx = self.db_pool.begin().await?;

        let prefix = invoice_prefix(&new_loan.department, new_loan.invoice_year());
        let last: Option<String> = sqlx::query_scalar(
            r#"
            SELECT invoice_number FROM loans
            WHERE invoice_number LIKE $1 AND length(invoice_number) = $2
            ORDER BY invoice_number DESC
            LIMIT 1
            "#,
        )
        .bind(format!("{}%", prefix))
        .bind(prefix.len() as i32 + INVOICE_SEQUENCE_WIDTH)
        .fetch_optional(&mut *tx)
        .await?;

        let base = next_sequence(last.as_deref());
        let number = Self::free_invoice_number(&mut tx, &prefix, base).await?;
        tracing::debug!(attempt, %number, "Invoice number selected");

        let loan = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (
                client_id, amount, disbursed_on, due_on, payment_method,
                department, notes, invoice_number, status, phone
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(client_id)
        .bind(new_loan.amount)
        .bind(new_loan.disbursed_on)
        .bind(new_loan.due_on)
        .bind(new_loan.payment_method)
        .bind(&new_loan.department)
        .bind(&new_loan.notes)
        .bind(&number)
        .bind(LoanStatus::Active)
        .bind(&new_loan.phone)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(loan)
    }

    /// First candidate at or after `base` not already issued
    async fn free_invoice_number(
        tx: &mut Transaction<'_, Postgres>,
        prefix: &str,
        base: u64,
    ) -> Result<String, ApiError> {
        for attempt in 0..INVOICE_RECHECK_LIMIT {
            let candidate = invoice_number(prefix, escalated_sequence(base, attempt));
            let taken: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM loans WHERE invoice_number = $1)",
            )
            .bind(&candidate)
            .fetch_one(&mut **tx)
            .await?;

            if !taken {
                return Ok(candidate);
            }
        }

        let fallback = timestamp_invoice_number(prefix, Utc::now());
        tracing::warn!(%prefix, %fallback, "Invoice re-check exhausted, using timestamp number");
        Ok(fallback)
    }

    pub async fn get_loan(&self, id: i64) -> Result<LoanView, ApiError> {
        let row = self.fetch_with_paid(id).await?;
        Ok(LoanView::project(row, today()))
    }

    async fn fetch_with_paid(&self, id: i64) -> Result<LoanWithPaid, ApiError> {
        sqlx::query_as::<_, LoanWithPaid>(&format!("{} WHERE l.id = $1", LOAN_WITH_PAID))
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(loan_not_found)
    }

    pub async fn list_loans(
        &self,
        query: ListLoansQuery,
    ) -> Result<PaginatedResponse<LoanView>, ApiError> {
        let (page, limit, offset) = page_window(query.page, query.limit);

        let mut query_builder = QueryBuilder::<Postgres>::new(format!("{} WHERE 1=1", LOAN_WITH_PAID));
        let mut count_builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM loans l WHERE 1=1");
        push_filters(&mut query_builder, &query);
        push_filters(&mut count_builder, &query);

        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.db_pool)
            .await?;

        query_builder.push(" ORDER BY l.registered_at DESC, l.id DESC LIMIT ");
        query_builder.push_bind(limit);
        query_builder.push(" OFFSET ");
        query_builder.push_bind(offset);

        let rows = query_builder
            .build_query_as::<LoanWithPaid>()
            .fetch_all(&self.db_pool)
            .await?;

        let today = today();
        Ok(PaginatedResponse {
            data: rows.into_iter().map(|row| LoanView::project(row, today)).collect(),
            total,
            page,
            limit,
        })
    }

    pub async fn loans_for_client(&self, client_id: i64) -> Result<Vec<LoanView>, ApiError> {
        let rows = sqlx::query_as::<_, LoanWithPaid>(&format!(
            "{} WHERE l.client_id = $1 ORDER BY l.registered_at DESC, l.id DESC",
            LOAN_WITH_PAID
        ))
        .bind(client_id)
        .fetch_all(&self.db_pool)
        .await?;

        let today = today();
        Ok(rows.into_iter().map(|row| LoanView::project(row, today)).collect())
    }

    pub async fn invoice_for_loan(&self, id: i64) -> Result<InvoiceView, ApiError> {
        let row = self.fetch_with_paid(id).await?;
        self.assemble_invoice(row).await
    }

    /// Look up by issued invoice number, or by the `P-<id>` label of an unnumbered loan
    pub async fn invoice_by_number(&self, number: &str) -> Result<InvoiceView, ApiError> {
        let number = number.trim();
        let by_number = sqlx::query_as::<_, LoanWithPaid>(&format!(
            "{} WHERE l.invoice_number = $1",
            LOAN_WITH_PAID
        ))
        .bind(number)
        .fetch_optional(&self.db_pool)
        .await?;

        let row = match by_number {
            Some(row) => row,
            None => {
                let fallback_id = number
                    .strip_prefix("P-")
                    .and_then(|id| id.parse::<i64>().ok())
                    .ok_or_else(|| ApiError::NotFound("Factura no encontrada".to_string()))?;
                sqlx::query_as::<_, LoanWithPaid>(&format!(
                    "{} WHERE l.id = $1 AND l.invoice_number IS NULL",
                    LOAN_WITH_PAID
                ))
                .bind(fallback_id)
                .fetch_optional(&self.db_pool)
                .await?
                .ok_or_else(|| ApiError::NotFound("Factura no encontrada".to_string()))?
            }
        };

        self.assemble_invoice(row).await
    }

    async fn assemble_invoice(&self, row: LoanWithPaid) -> Result<InvoiceView, ApiError> {
        let client = sqlx::query_as::<_, ClientSummary>(
            r#"
            SELECT id, first_names || ' ' || last_names AS name,
                   identity_number, primary_phone, address
            FROM clients WHERE id = $1
            "#,
        )
        .bind(row.loan.client_id)
        .fetch_one(&self.db_pool)
        .await?;

        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT * FROM payments
            WHERE loan_id = $1 AND NOT voided
            ORDER BY paid_on, receipt_number
            "#,
        )
        .bind(row.loan.id)
        .fetch_all(&self.db_pool)
        .await?;

        let loan = LoanView::project(row, today());
        Ok(InvoiceView {
            invoice_number: loan.loan.invoice_label(),
            loan,
            client,
            payments,
        })
    }

    pub async fn void_loan(&self, id: i64) -> Result<Loan, ApiError> {
        self.transition(id, LoanEvent::Void).await
    }

    pub async fn toggle_activity(&self, id: i64) -> Result<Loan, ApiError> {
        self.transition(id, LoanEvent::ToggleActivity).await
    }

    async fn transition(&self, id: i64, event: LoanEvent) -> Result<Loan, ApiError> {
        let mut tx = self.db_pool.begin().await?;

        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(loan_not_found)?;

        let next = loan.status.apply(event).map_err(|e| {
            tracing::warn!(loan_id = id, error = %e, "Loan transition rejected");
            ApiError::from(e)
        })?;

        let loan = sqlx::query_as::<_, Loan>("UPDATE loans SET status = $1 WHERE id = $2 RETURNING *")
            .bind(next)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(loan_id = id, status = next.as_str(), "Loan status changed");
        Ok(loan)
    }

    /// Delete loans by id. Payments go with them; archive rows keep a null loan reference.
    pub async fn bulk_delete(&self, loan_ids: &[i64]) -> Result<BulkDeleteResult, ApiError> {
        if loan_ids.is_empty() {
            return Err(ApiError::BadRequest(
                "Seleccione al menos un préstamo".to_string(),
            ));
        }

        let result = sqlx::query("DELETE FROM loans WHERE id = ANY($1)")
            .bind(loan_ids)
            .execute(&self.db_pool)
            .await?;

        tracing::info!(
            requested = loan_ids.len(),
            deleted = result.rows_affected(),
            "Loans deleted"
        );

        Ok(BulkDeleteResult {
            deleted: result.rows_affected(),
        })
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &ListLoansQuery) {
    if let Some(status) = query.status {
        builder.push(" AND l.status = ");
        builder.push_bind(status);
    }

    if let Some(client_id) = query.client_id {
        builder.push(" AND l.client_id = ");
        builder.push_bind(client_id);
    }

    if let Some(department) = query.department.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        builder.push(" AND LOWER(l.department) = LOWER(");
        builder.push_bind(department.to_string());
        builder.push(")");
    }
}

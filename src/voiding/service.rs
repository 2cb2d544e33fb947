use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::auth::Actor;
use crate::error::{ApiError, FieldErrors};
use crate::payment::Payment;
use crate::voiding::model::{ArchiveEntry, ArchiveQuery, VoidReceiptRequest, VoidedReceipt};

/// Moves voided payments into the archive
#[derive(Clone)]
pub struct VoidService {
    db_pool: PgPool,
}

impl VoidService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Void a receipt: lock the payment, archive a copy, delete the original.
    ///
    /// The owning loan's status is left untouched.
    pub async fn void_receipt(
        &self,
        request: VoidReceiptRequest,
        actor: &Actor,
    ) -> Result<VoidedReceipt, ApiError> {
        let mut errors = FieldErrors::new();
        if let Err(e) = request.validate() {
            errors.extend_from(e);
        }
        let parsed = request.parse(&mut errors, Utc::now().date_naive());
        errors.into_result()?;
        let details = parsed.ok_or_else(|| {
            ApiError::InternalError("void request parsed without errors but incomplete".to_string())
        })?;

        let mut tx = self.db_pool.begin().await?;

        let payment = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE receipt_number = $1 AND NOT voided FOR UPDATE",
        )
        .bind(&details.receipt_number)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "No existe un recibo activo con número {}",
                details.receipt_number
            ))
        })?;

        let entry = ArchiveEntry::capture(&payment, &details, actor);

        let archived = sqlx::query_as::<_, VoidedReceipt>(
            r#"
            INSERT INTO voided_receipts (
                payment_id, loan_id, receipt_number, amount, paid_on,
                payment_method, payment_type, notes, payment_created_at,
                void_reason, void_date, void_notes, voided_by_id, voided_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(entry.payment_id)
        .bind(entry.loan_id)
        .bind(&entry.receipt_number)
        .bind(entry.amount)
        .bind(entry.paid_on)
        .bind(entry.payment_method)
        .bind(entry.payment_type)
        .bind(&entry.notes)
        .bind(entry.payment_created_at)
        .bind(entry.void_reason)
        .bind(entry.void_date)
        .bind(&entry.void_notes)
        .bind(entry.voided_by_id)
        .bind(&entry.voided_by)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM payments WHERE id = $1")
            .bind(payment.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            receipt = %archived.receipt_number,
            loan_id = ?archived.loan_id,
            reason = ?archived.void_reason,
            actor = %actor.username,
            "Receipt voided and archived"
        );

        Ok(archived)
    }

    /// Archive entries, newest first
    pub async fn list_archive(&self, query: ArchiveQuery) -> Result<Vec<VoidedReceipt>, ApiError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT * FROM voided_receipts WHERE 1=1");

        if let Some(loan_id) = query.loan_id {
            builder.push(" AND loan_id = ");
            builder.push_bind(loan_id);
        }

        if let Some(number) = query.receipt_number.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            builder.push(" AND receipt_number = ");
            builder.push_bind(number.to_string());
        }

        builder.push(" ORDER BY archived_at DESC, id DESC");

        let entries = builder
            .build_query_as::<VoidedReceipt>()
            .fetch_all(&self.db_pool)
            .await?;

        Ok(entries)
    }
}

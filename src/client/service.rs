use sqlx::PgPool;
use validator::Validate;

use crate::client::model::{
    Client, ClientSearchRequest, ClientSearchResult, NewClient, RegisterClientRequest,
    UpdateContactRequest,
};
use crate::error::{ApiError, FieldErrors};
use crate::forms;
use crate::models::like_pattern;

const SEARCH_LIMIT: i64 = 10;
const DUPLICATE_IDENTITY: &str = "Este número de identificación ya existe";

#[derive(Clone)]
pub struct ClientService {
    db_pool: PgPool,
}

impl ClientService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Validate and insert a client. Every field error is collected before anything
    /// is written; a duplicate identity number is reported on that field.
    pub async fn register_client(&self, request: RegisterClientRequest) -> Result<Client, ApiError> {
        let mut errors = FieldErrors::new();
        if let Err(e) = request.validate() {
            errors.extend_from(e);
        }
        let parsed = request.parse(&mut errors);

        if let Some(identity) = forms::present(&request.identity_number) {
            if !errors.contains("identity_number") && self.identity_exists(identity).await? {
                errors.add("identity_number", DUPLICATE_IDENTITY);
            }
        }

        errors.into_result()?;
        let new_client = parsed.ok_or_else(|| {
            ApiError::InternalError("client parsed without errors but incomplete".to_string())
        })?;

        match self.insert_client(&new_client).await {
            Ok(client) => {
                tracing::info!(client_id = client.id, identity = %client.identity_number, "Client registered");
                Ok(client)
            }
            Err(ApiError::UniqueViolation(constraint)) => {
                tracing::warn!(%constraint, "Identity number taken concurrently");
                let mut errors = FieldErrors::new();
                errors.add("identity_number", DUPLICATE_IDENTITY);
                Err(ApiError::Validation(errors))
            }
            Err(e) => Err(e),
        }
    }

    async fn identity_exists(&self, identity_number: &str) -> Result<bool, ApiError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM clients WHERE identity_number = $1)")
                .bind(identity_number)
                .fetch_one(&self.db_pool)
                .await?;
        Ok(exists)
    }

    async fn insert_client(&self, client: &NewClient) -> Result<Client, ApiError> {
        let client = sqlx::query_as::<_, Client>(
            r#"
            INSERT INTO clients (
                first_names, last_names, identity_number, gender, nationality,
                primary_phone, secondary_phone, address, city, province,
                account_type, monthly_income, employer, work_phone, primary_bank,
                account_number
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING *
            "#,
        )
        .bind(&client.first_names)
        .bind(&client.last_names)
        .bind(&client.identity_number)
        .bind(client.gender)
        .bind(&client.nationality)
        .bind(&client.primary_phone)
        .bind(&client.secondary_phone)
        .bind(&client.address)
        .bind(&client.city)
        .bind(&client.province)
        .bind(client.account_type)
        .bind(client.monthly_income)
        .bind(&client.employer)
        .bind(&client.work_phone)
        .bind(&client.primary_bank)
        .bind(&client.account_number)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(client)
    }

    pub async fn search_clients(
        &self,
        request: ClientSearchRequest,
    ) -> Result<Vec<ClientSearchResult>, ApiError> {
        let request = request.trimmed();
        request.validate()?;

        let results = sqlx::query_as::<_, ClientSearchResult>(
            r#"
            SELECT id,
                   first_names || ' ' || last_names AS name,
                   identity_number AS document,
                   address
            FROM clients
            WHERE first_names ILIKE $1
               OR last_names ILIKE $1
               OR identity_number ILIKE $1
            ORDER BY first_names
            LIMIT $2
            "#,
        )
        .bind(like_pattern(&request.query))
        .bind(SEARCH_LIMIT)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(results)
    }

    pub async fn get_client(&self, id: i64) -> Result<Client, ApiError> {
        sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::NotFound("Cliente no encontrado".to_string()))
    }

    pub async fn find_by_identity(&self, identity_number: &str) -> Result<Option<Client>, ApiError> {
        let client = sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE identity_number = $1")
            .bind(identity_number)
            .fetch_optional(&self.db_pool)
            .await?;
        Ok(client)
    }

    /// Patch contact fields; identity fields are never touched
    pub async fn update_contact(
        &self,
        id: i64,
        request: UpdateContactRequest,
    ) -> Result<Client, ApiError> {
        let mut errors = FieldErrors::new();
        if let Err(e) = request.validate() {
            errors.extend_from(e);
        }
        let update = request.parse(&mut errors);
        errors.into_result()?;

        if update.is_empty() {
            return Err(ApiError::BadRequest(
                "No se recibieron campos para actualizar".to_string(),
            ));
        }

        let client = sqlx::query_as::<_, Client>(
            r#"
            UPDATE clients SET
                primary_phone = COALESCE($2, primary_phone),
                secondary_phone = COALESCE($3, secondary_phone),
                address = COALESCE($4, address),
                city = COALESCE($5, city),
                province = COALESCE($6, province),
                employer = COALESCE($7, employer),
                work_phone = COALESCE($8, work_phone),
                primary_bank = COALESCE($9, primary_bank),
                account_number = COALESCE($10, account_number)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.primary_phone)
        .bind(&update.secondary_phone)
        .bind(&update.address)
        .bind(&update.city)
        .bind(&update.province)
        .bind(&update.employer)
        .bind(&update.work_phone)
        .bind(&update.primary_bank)
        .bind(&update.account_number)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Cliente no encontrado".to_string()))?;

        tracing::info!(client_id = id, "Client contact updated");
        Ok(client)
    }

    /// Remove a client that has no loans
    pub async fn delete_client(&self, id: i64) -> Result<(), ApiError> {
        let loan_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM loans WHERE client_id = $1")
            .bind(id)
            .fetch_one(&self.db_pool)
            .await?;

        if loan_count > 0 {
            tracing::warn!(client_id = id, loan_count, "Refusing to delete client with loans");
            return Err(ApiError::BusinessRule(format!(
                "No se puede eliminar el cliente: tiene {} préstamo(s) registrado(s)",
                loan_count
            )));
        }

        let result = sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(id)
            .execute(&self.db_pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("Cliente no encontrado".to_string()));
        }

        tracing::info!(client_id = id, "Client deleted");
        Ok(())
    }
}

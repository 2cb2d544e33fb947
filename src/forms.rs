//! Request body extraction and field parsing
//!
//! Mutating endpoints accept either JSON or url-encoded form bodies. Incoming values
//! are kept as raw text until validation so that every bad field can be reported at
//! once instead of failing on the first deserialization error.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::{header, request::Parts},
    Form, Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Deserializer};

use crate::error::{ApiError, FieldErrors};

/// Body extractor that dispatches on `Content-Type`
#[derive(Debug, Clone)]
pub struct FormOrJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for FormOrJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("application/json"))
            .unwrap_or(false);

        if is_json {
            let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| {
                tracing::debug!(error = %e.body_text(), "Rejected JSON body");
                ApiError::BadRequest("Formato JSON inválido".to_string())
            })?;
            Ok(Self(value))
        } else {
            let Form(value) = Form::<T>::from_request(req, state).await.map_err(|e| {
                tracing::debug!(error = %e.body_text(), "Rejected form body");
                ApiError::BadRequest("Formato de formulario inválido".to_string())
            })?;
            Ok(Self(value))
        }
    }
}

/// `Path` whose rejection is the JSON error body
#[derive(Debug, Clone)]
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| {
                tracing::debug!(error = %e.body_text(), "Rejected path parameter");
                ApiError::BadRequest("Identificador inválido en la ruta".to_string())
            })?;
        Ok(Self(value))
    }
}

/// `Query` whose rejection is the JSON error body
#[derive(Debug, Clone)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| {
                tracing::debug!(error = %e.body_text(), "Rejected query string");
                ApiError::BadRequest("Parámetros de consulta inválidos".to_string())
            })?;
        Ok(Self(value))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Flag(bool),
}

/// Accept a string, number or boolean and keep it as trimmed text.
///
/// Use with `#[serde(default, deserialize_with = "forms::lenient")]` on `Option<String>`.
pub fn lenient<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawValue>::deserialize(deserializer)?;
    Ok(raw.map(|value| match value {
        RawValue::Text(text) => text.trim().to_string(),
        RawValue::Integer(n) => n.to_string(),
        RawValue::Float(n) => n.to_string(),
        RawValue::Flag(b) => b.to_string(),
    }))
}

/// Trimmed value, treating blank input as absent
pub fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Required text field; records `message` when missing
pub fn required_text(
    errors: &mut FieldErrors,
    field: &str,
    value: &Option<String>,
    message: &str,
) -> Option<String> {
    match present(value) {
        Some(text) => Some(text.to_string()),
        None => {
            errors.add(field, message);
            None
        }
    }
}

/// Optional text field, blank becomes `None`
pub fn optional_text(value: &Option<String>) -> Option<String> {
    present(value).map(str::to_string)
}

/// Largest amount a `NUMERIC(12, 2)` ledger column holds
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

/// Required amount that must be strictly positive and fit a ledger column
pub fn positive_amount(
    errors: &mut FieldErrors,
    field: &str,
    value: &Option<String>,
) -> Option<Decimal> {
    bounded_amount(errors, field, value, MAX_AMOUNT)
}

/// Required amount in cents, strictly positive and at most `max`
pub fn bounded_amount(
    errors: &mut FieldErrors,
    field: &str,
    value: &Option<String>,
    max: Decimal,
) -> Option<Decimal> {
    let Some(text) = present(value) else {
        errors.add(field, "El monto es requerido");
        return None;
    };

    let Ok(amount) = text.replace(',', "").parse::<Decimal>() else {
        errors.add(field, "Ingrese un valor numérico válido");
        return None;
    };

    if amount <= Decimal::ZERO {
        errors.add(field, "El monto debe ser mayor a 0");
        None
    } else if amount.normalize().scale() > 2 {
        errors.add(field, "El monto admite como máximo 2 decimales");
        None
    } else if amount > max {
        errors.add(field, format!("El monto no puede exceder {}", max));
        None
    } else {
        Some(amount)
    }
}

/// Required `YYYY-MM-DD` date
pub fn required_date(
    errors: &mut FieldErrors,
    field: &str,
    value: &Option<String>,
) -> Option<NaiveDate> {
    let Some(text) = present(value) else {
        errors.add(field, "La fecha es requerida");
        return None;
    };
    parse_date(errors, field, text)
}

/// Optional `YYYY-MM-DD` date; malformed input is still an error
pub fn optional_date(
    errors: &mut FieldErrors,
    field: &str,
    value: &Option<String>,
) -> Option<NaiveDate> {
    present(value).and_then(|text| parse_date(errors, field, text))
}

fn parse_date(errors: &mut FieldErrors, field: &str, text: &str) -> Option<NaiveDate> {
    match NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            errors.add(field, "Fecha inválida, use el formato AAAA-MM-DD");
            None
        }
    }
}

/// Required positive record id
pub fn required_id(
    errors: &mut FieldErrors,
    field: &str,
    value: &Option<String>,
    message: &str,
) -> Option<i64> {
    let Some(text) = present(value) else {
        errors.add(field, message);
        return None;
    };
    match text.parse::<i64>() {
        Ok(id) if id > 0 => Some(id),
        _ => {
            errors.add(field, "Identificador inválido");
            None
        }
    }
}

/// Required choice parsed through `FromStr`
pub fn required_choice<T: std::str::FromStr>(
    errors: &mut FieldErrors,
    field: &str,
    value: &Option<String>,
    missing: &str,
) -> Option<T> {
    let Some(text) = present(value) else {
        errors.add(field, missing);
        return None;
    };
    match text.parse::<T>() {
        Ok(choice) => Some(choice),
        Err(_) => {
            errors.add(field, format!("'{}' no es una opción válida", text));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct AmountField {
        #[serde(default, deserialize_with = "lenient")]
        amount: Option<String>,
    }

    #[test]
    fn test_lenient_accepts_numbers_and_text() {
        let field: AmountField = serde_json::from_str(r#"{"amount": 6000}"#).unwrap();
        assert_eq!(field.amount.as_deref(), Some("6000"));

        let field: AmountField = serde_json::from_str(r#"{"amount": "6000.50"}"#).unwrap();
        assert_eq!(field.amount.as_deref(), Some("6000.50"));

        let field: AmountField = serde_json::from_str(r#"{}"#).unwrap();
        assert!(field.amount.is_none());

        let field: AmountField = serde_json::from_str(r#"{"amount": null}"#).unwrap();
        assert!(field.amount.is_none());
    }

    #[test]
    fn test_positive_amount() {
        let mut errors = FieldErrors::new();
        assert_eq!(
            positive_amount(&mut errors, "amount", &Some("10,000.00".to_string())),
            Some(Decimal::new(1_000_000, 2))
        );
        assert!(errors.is_empty());

        assert!(positive_amount(&mut errors, "amount", &Some("0".to_string())).is_none());
        assert!(positive_amount(&mut errors, "other", &Some("abc".to_string())).is_none());
        assert!(positive_amount(&mut errors, "missing", &Some("  ".to_string())).is_none());
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_amount_must_fit_a_ledger_column() {
        let mut errors = FieldErrors::new();
        let text = |v: &str| Some(v.to_string());

        assert_eq!(MAX_AMOUNT, "9999999999.99".parse::<Decimal>().unwrap());
        assert_eq!(
            positive_amount(&mut errors, "max", &text("9999999999.99")),
            Some(MAX_AMOUNT)
        );
        assert_eq!(
            positive_amount(&mut errors, "trailing", &text("150.500")),
            Some(Decimal::new(150_500, 3))
        );
        assert!(errors.is_empty());

        assert!(positive_amount(&mut errors, "sub_cent", &text("0.001")).is_none());
        assert!(positive_amount(&mut errors, "too_big", &text("10000000000000")).is_none());
        assert!(
            positive_amount(&mut errors, "huge", &text("1000000000000000000000000000")).is_none()
        );
        assert_eq!(
            errors.fields().collect::<Vec<_>>(),
            vec!["huge", "sub_cent", "too_big"]
        );
    }

    #[test]
    fn test_bounded_amount_uses_the_given_cap() {
        let mut errors = FieldErrors::new();
        let cap = Decimal::new(10_000, 2);

        assert!(bounded_amount(&mut errors, "income", &Some("100.01".to_string()), cap).is_none());
        assert_eq!(
            bounded_amount(&mut errors, "other", &Some("100".to_string()), cap),
            Some(Decimal::from(100))
        );
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["income"]);
    }

    #[test]
    fn test_lenient_trims_text() {
        let field: AmountField = serde_json::from_str(r#"{"amount": "  250  "}"#).unwrap();
        assert_eq!(field.amount.as_deref(), Some("250"));
    }

    #[test]
    fn test_dates() {
        let mut errors = FieldErrors::new();
        assert_eq!(
            required_date(&mut errors, "paid_on", &Some("2024-03-01".to_string())),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
        assert!(required_date(&mut errors, "paid_on", &Some("01/03/2024".to_string())).is_none());
        assert!(optional_date(&mut errors, "due_on", &None).is_none());
        assert_eq!(errors.len(), 1);
        assert!(errors.contains("paid_on"));
    }

    #[test]
    fn test_required_id() {
        let mut errors = FieldErrors::new();
        assert_eq!(
            required_id(&mut errors, "loan_id", &Some("5".to_string()), "requerido"),
            Some(5)
        );
        assert!(required_id(&mut errors, "loan_id", &Some("-1".to_string()), "requerido").is_none());
        assert!(required_id(&mut errors, "client_id", &None, "requerido").is_none());
        assert_eq!(errors.get("client_id"), Some(&["requerido".to_string()][..]));
    }

    #[test]
    fn test_present_trims() {
        assert_eq!(present(&Some("  Juan ".to_string())), Some("Juan"));
        assert_eq!(present(&Some("   ".to_string())), None);
        assert_eq!(optional_text(&None), None);
    }
}

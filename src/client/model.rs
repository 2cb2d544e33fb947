use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::FieldErrors;
use crate::forms::{self, bounded_amount, optional_text, required_choice, required_text};

/// Province codes accepted on a client record
pub const PROVINCES: &[(&str, &str)] = &[
    ("DN", "Distrito Nacional"),
    ("SD", "Santo Domingo"),
    ("SDE", "Santo Domingo Este"),
    ("SA", "Santiago"),
    ("PU", "Puerto Plata"),
    ("LA", "La Altagracia"),
    ("VE", "La Vega"),
    ("SP", "San Pedro de Macorís"),
    ("SC", "San Cristóbal"),
    ("HR", "Hermanas Mirabal"),
];

pub const DEFAULT_NATIONALITY: &str = "Dominicana";

/// Largest monthly income the `NUMERIC(10, 2)` column holds
pub const MAX_MONTHLY_INCOME: Decimal = Decimal::from_parts(1_410_065_407, 2, 0, false, 2);

/// Canonical province code, if `code` is in the table
pub fn province_code(code: &str) -> Option<&'static str> {
    let code = code.trim().to_uppercase();
    PROVINCES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(known, _)| *known)
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "gender", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl std::str::FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            "other" | "o" => Ok(Gender::Other),
            other => Err(format!("unknown gender '{}'", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "account_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Corriente,
    Ahorro,
}

impl std::str::FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "corriente" => Ok(AccountType::Corriente),
            "ahorro" => Ok(AccountType::Ahorro),
            other => Err(format!("unknown account type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Client {
    pub id: i64,
    pub first_names: String,
    pub last_names: String,
    pub identity_number: String,
    pub gender: Gender,
    pub nationality: String,
    pub primary_phone: String,
    pub secondary_phone: Option<String>,
    pub address: String,
    pub city: String,
    pub province: String,
    pub account_type: AccountType,
    pub monthly_income: Decimal,
    pub employer: Option<String>,
    pub work_phone: Option<String>,
    pub primary_bank: Option<String>,
    pub account_number: Option<String>,
    pub registered_at: DateTime<Utc>,
}

impl Client {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_names, self.last_names)
    }
}

/// Short client block printed on invoices and receipts
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ClientSummary {
    pub id: i64,
    pub name: String,
    pub identity_number: String,
    pub primary_phone: String,
    pub address: String,
}

/// Raw registration payload; every field stays text until validated
#[derive(Debug, Default, Deserialize, Validate)]
pub struct RegisterClientRequest {
    #[serde(default, deserialize_with = "forms::lenient")]
    #[validate(length(max = 100, message = "Máximo 100 caracteres"))]
    pub first_names: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    #[validate(length(max = 100, message = "Máximo 100 caracteres"))]
    pub last_names: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    #[validate(length(max = 20, message = "Máximo 20 caracteres"))]
    pub identity_number: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    pub gender: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    #[validate(length(max = 50, message = "Máximo 50 caracteres"))]
    pub nationality: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    #[validate(length(max = 15, message = "Máximo 15 caracteres"))]
    pub primary_phone: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    #[validate(length(max = 15, message = "Máximo 15 caracteres"))]
    pub secondary_phone: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    #[validate(length(max = 50, message = "Máximo 50 caracteres"))]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    pub province: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    pub account_type: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    pub monthly_income: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    #[validate(length(max = 100, message = "Máximo 100 caracteres"))]
    pub employer: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    #[validate(length(max = 15, message = "Máximo 15 caracteres"))]
    pub work_phone: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    #[validate(length(max = 50, message = "Máximo 50 caracteres"))]
    pub primary_bank: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    #[validate(length(max = 20, message = "Máximo 20 caracteres"))]
    pub account_number: Option<String>,
}

/// Client fields ready to insert
#[derive(Debug, Clone, PartialEq)]
pub struct NewClient {
    pub first_names: String,
    pub last_names: String,
    pub identity_number: String,
    pub gender: Gender,
    pub nationality: String,
    pub primary_phone: String,
    pub secondary_phone: Option<String>,
    pub address: String,
    pub city: String,
    pub province: String,
    pub account_type: AccountType,
    pub monthly_income: Decimal,
    pub employer: Option<String>,
    pub work_phone: Option<String>,
    pub primary_bank: Option<String>,
    pub account_number: Option<String>,
}

fn required_message(label: &str) -> String {
    format!("El campo {} es requerido", label)
}

fn province(errors: &mut FieldErrors, value: &Option<String>) -> Option<String> {
    let Some(text) = forms::present(value) else {
        errors.add("province", required_message("Provincia"));
        return None;
    };
    match province_code(text) {
        Some(code) => Some(code.to_string()),
        None => {
            errors.add("province", format!("'{}' no es una provincia válida", text));
            None
        }
    }
}

impl RegisterClientRequest {
    /// Parse every field, recording one message per bad field.
    /// Returns `Some` only when all required fields parsed.
    pub fn parse(&self, errors: &mut FieldErrors) -> Option<NewClient> {
        let first_names = required_text(
            errors,
            "first_names",
            &self.first_names,
            &required_message("Nombre(s)"),
        );
        let last_names = required_text(
            errors,
            "last_names",
            &self.last_names,
            &required_message("Apellido(s)"),
        );
        let identity_number = required_text(
            errors,
            "identity_number",
            &self.identity_number,
            &required_message("Cédula"),
        );
        let gender = required_choice::<Gender>(
            errors,
            "gender",
            &self.gender,
            &required_message("Sexo"),
        );
        let primary_phone = required_text(
            errors,
            "primary_phone",
            &self.primary_phone,
            &required_message("Teléfono"),
        );
        let address = required_text(
            errors,
            "address",
            &self.address,
            &required_message("Dirección"),
        );
        let city = required_text(errors, "city", &self.city, &required_message("Ciudad"));
        let province = province(errors, &self.province);
        let account_type = required_choice::<AccountType>(
            errors,
            "account_type",
            &self.account_type,
            &required_message("Tipo de cuenta"),
        );
        let monthly_income = if forms::present(&self.monthly_income).is_none() {
            errors.add("monthly_income", required_message("Ingresos mensuales"));
            None
        } else {
            bounded_amount(errors, "monthly_income", &self.monthly_income, MAX_MONTHLY_INCOME)
        };

        Some(NewClient {
            first_names: first_names?,
            last_names: last_names?,
            identity_number: identity_number?,
            gender: gender?,
            nationality: optional_text(&self.nationality)
                .unwrap_or_else(|| DEFAULT_NATIONALITY.to_string()),
            primary_phone: primary_phone?,
            secondary_phone: optional_text(&self.secondary_phone),
            address: address?,
            city: city?,
            province: province?,
            account_type: account_type?,
            monthly_income: monthly_income?,
            employer: optional_text(&self.employer),
            work_phone: optional_text(&self.work_phone),
            primary_bank: optional_text(&self.primary_bank),
            account_number: optional_text(&self.account_number),
        })
    }
}

/// Contact fields that may change after registration; absent fields are left as-is
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateContactRequest {
    #[serde(default, deserialize_with = "forms::lenient")]
    #[validate(length(max = 15, message = "Máximo 15 caracteres"))]
    pub primary_phone: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    #[validate(length(max = 15, message = "Máximo 15 caracteres"))]
    pub secondary_phone: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    #[validate(length(max = 50, message = "Máximo 50 caracteres"))]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    pub province: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    #[validate(length(max = 100, message = "Máximo 100 caracteres"))]
    pub employer: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    #[validate(length(max = 15, message = "Máximo 15 caracteres"))]
    pub work_phone: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    #[validate(length(max = 50, message = "Máximo 50 caracteres"))]
    pub primary_bank: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    #[validate(length(max = 20, message = "Máximo 20 caracteres"))]
    pub account_number: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ContactUpdate {
    pub primary_phone: Option<String>,
    pub secondary_phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub employer: Option<String>,
    pub work_phone: Option<String>,
    pub primary_bank: Option<String>,
    pub account_number: Option<String>,
}

impl UpdateContactRequest {
    pub fn parse(&self, errors: &mut FieldErrors) -> ContactUpdate {
        let province = forms::present(&self.province).and_then(|text| match province_code(text) {
            Some(code) => Some(code.to_string()),
            None => {
                errors.add("province", format!("'{}' no es una provincia válida", text));
                None
            }
        });

        ContactUpdate {
            primary_phone: optional_text(&self.primary_phone),
            secondary_phone: optional_text(&self.secondary_phone),
            address: optional_text(&self.address),
            city: optional_text(&self.city),
            province,
            employer: optional_text(&self.employer),
            work_phone: optional_text(&self.work_phone),
            primary_bank: optional_text(&self.primary_bank),
            account_number: optional_text(&self.account_number),
        }
    }
}

impl ContactUpdate {
    pub fn is_empty(&self) -> bool {
        *self == ContactUpdate::default()
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ClientSearchRequest {
    #[serde(default)]
    #[validate(length(min = 3, message = "Ingrese al menos 3 caracteres para buscar"))]
    pub query: String,
}

impl ClientSearchRequest {
    pub fn trimmed(self) -> Self {
        Self {
            query: self.query.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ClientSearchResult {
    pub id: i64,
    pub name: String,
    pub document: String,
    pub address: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    fn complete_request() -> RegisterClientRequest {
        RegisterClientRequest {
            first_names: text("Ana María"),
            last_names: text("Pérez"),
            identity_number: text("001-1234567-8"),
            gender: text("female"),
            primary_phone: text("809-555-0101"),
            address: text("Calle 1 #2"),
            city: text("Santo Domingo"),
            province: text("dn"),
            account_type: text("ahorro"),
            monthly_income: text("35,000.00"),
            ..Default::default()
        }
    }

    #[test]
    fn test_complete_request_parses() {
        let mut errors = FieldErrors::new();
        let client = complete_request().parse(&mut errors).unwrap();

        assert!(errors.is_empty());
        assert_eq!(client.province, "DN");
        assert_eq!(client.gender, Gender::Female);
        assert_eq!(client.nationality, DEFAULT_NATIONALITY);
        assert_eq!(client.monthly_income, Decimal::new(3_500_000, 2));
        assert!(client.employer.is_none());
    }

    #[test]
    fn test_every_missing_field_is_reported() {
        let mut errors = FieldErrors::new();
        let parsed = RegisterClientRequest::default().parse(&mut errors);

        assert!(parsed.is_none());
        for field in [
            "first_names",
            "last_names",
            "identity_number",
            "gender",
            "primary_phone",
            "address",
            "city",
            "province",
            "account_type",
            "monthly_income",
        ] {
            assert!(errors.contains(field), "missing error for {}", field);
        }
        assert_eq!(errors.len(), 10);
    }

    #[test]
    fn test_bad_choices_and_income() {
        let request = RegisterClientRequest {
            gender: text("x"),
            province: text("ZZ"),
            monthly_income: text("-5"),
            ..complete_request()
        };
        let mut errors = FieldErrors::new();

        assert!(request.parse(&mut errors).is_none());
        assert_eq!(
            errors.fields().collect::<Vec<_>>(),
            vec!["gender", "monthly_income", "province"]
        );
    }

    #[test]
    fn test_length_limits_come_from_validator() {
        let request = RegisterClientRequest {
            identity_number: text(&"9".repeat(25)),
            ..complete_request()
        };
        let errors: FieldErrors = request.validate().unwrap_err().into();
        assert!(errors.contains("identity_number"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_income_must_fit_its_column() {
        let mut errors = FieldErrors::new();
        let at_cap = RegisterClientRequest {
            monthly_income: text("99,999,999.99"),
            ..complete_request()
        };
        assert_eq!(
            at_cap.parse(&mut errors).map(|c| c.monthly_income),
            Some(MAX_MONTHLY_INCOME)
        );

        for income in ["100000000", "35000.125"] {
            let request = RegisterClientRequest {
                monthly_income: text(income),
                ..complete_request()
            };
            let mut errors = FieldErrors::new();
            assert!(request.parse(&mut errors).is_none());
            assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["monthly_income"]);
        }
    }

    #[test]
    fn test_padded_input_is_trimmed_before_length_checks() {
        let identity = "1".repeat(20);
        let body = serde_json::json!({
            "first_names": "  Ana María  ",
            "last_names": "Pérez",
            "identity_number": format!("   {}   ", identity),
            "gender": "female",
            "primary_phone": " 809-555-0101 ",
            "address": "Calle 1 #2",
            "city": "Santo Domingo",
            "province": "dn",
            "account_type": "ahorro",
            "monthly_income": 35000,
        });
        let request: RegisterClientRequest = serde_json::from_value(body).unwrap();

        assert!(request.validate().is_ok());
        let mut errors = FieldErrors::new();
        let client = request.parse(&mut errors).unwrap();
        assert_eq!(client.identity_number, identity);
        assert_eq!(client.first_names, "Ana María");
    }

    #[test]
    fn test_contact_update_keeps_absent_fields() {
        let request = UpdateContactRequest {
            city: text("Santiago"),
            province: text("sa"),
            ..Default::default()
        };
        let mut errors = FieldErrors::new();
        let update = request.parse(&mut errors);

        assert!(errors.is_empty());
        assert_eq!(update.city.as_deref(), Some("Santiago"));
        assert_eq!(update.province.as_deref(), Some("SA"));
        assert!(update.primary_phone.is_none());
        assert!(ContactUpdate::default().is_empty());
    }

    #[test]
    fn test_search_query_minimum() {
        let short = ClientSearchRequest {
            query: "  ab  ".to_string(),
        }
        .trimmed();
        assert!(short.validate().is_err());

        let ok = ClientSearchRequest {
            query: " ana ".to_string(),
        }
        .trimmed();
        assert!(ok.validate().is_ok());
        assert_eq!(ok.query, "ana");
    }
}

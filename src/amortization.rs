//! Flat-interest amortization preview
//!
//! total interest = principal x monthly rate x term; every period pays the same share of
//! principal and interest. Amounts are rounded to cents and the last row absorbs the
//! rounding so the balance closes at exactly zero.

use chrono::{Duration, Months, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::FieldErrors;
use crate::forms::{self, optional_date, positive_amount};

const MAX_TERM_MONTHS: u32 = 360;

/// 100% a month
const MAX_MONTHLY_RATE: Decimal = Decimal::ONE;

/// Payments per month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Mensual,
    Quincenal,
    Semanal,
}

impl Frequency {
    pub fn per_month(&self) -> u32 {
        match self {
            Frequency::Mensual => 1,
            Frequency::Quincenal => 2,
            Frequency::Semanal => 4,
        }
    }

    /// Due date of the `period`-th payment (1-based) counted from `start`
    fn due_date(&self, start: NaiveDate, period: u32) -> Option<NaiveDate> {
        match self {
            Frequency::Mensual => start.checked_add_months(Months::new(period)),
            Frequency::Quincenal => start.checked_add_signed(Duration::days(15 * i64::from(period))),
            Frequency::Semanal => start.checked_add_signed(Duration::days(7 * i64::from(period))),
        }
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1" | "mensual" => Ok(Frequency::Mensual),
            "2" | "quincenal" => Ok(Frequency::Quincenal),
            "4" | "semanal" => Ok(Frequency::Semanal),
            other => Err(format!("unknown frequency '{}'", other)),
        }
    }
}

/// Schedule inputs. [`AmortizationRequest::parse`] keeps them within bounds
/// where every product fits a `Decimal`.
#[derive(Debug, Clone, PartialEq)]
pub struct AmortizationInput {
    pub principal: Decimal,
    /// Monthly rate as a fraction, `0.05` for 5%
    pub monthly_rate: Decimal,
    pub term_months: u32,
    pub frequency: Frequency,
    pub start_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmortizationRow {
    pub number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_on: Option<NaiveDate>,
    pub payment: Decimal,
    pub principal: Decimal,
    pub interest: Decimal,
    pub balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmortizationSchedule {
    pub principal: Decimal,
    pub total_interest: Decimal,
    pub total_payable: Decimal,
    pub periods: u32,
    pub payment: Decimal,
    pub rows: Vec<AmortizationRow>,
}

fn cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn build_schedule(input: &AmortizationInput) -> AmortizationSchedule {
    let periods = input.term_months * input.frequency.per_month();
    let period_count = Decimal::from(periods);

    let total_interest = cents(input.principal * input.monthly_rate * Decimal::from(input.term_months));
    let total_payable = input.principal + total_interest;
    let payment = cents(total_payable / period_count);
    let principal_share = cents(input.principal / period_count);
    let interest_share = payment - principal_share;

    let mut rows = Vec::with_capacity(periods as usize);
    let mut balance = input.principal;
    let mut interest_so_far = Decimal::ZERO;

    for number in 1..=periods {
        let (principal, interest) = if number == periods {
            (balance, total_interest - interest_so_far)
        } else {
            (principal_share, interest_share)
        };

        balance -= principal;
        interest_so_far += interest;

        rows.push(AmortizationRow {
            number,
            due_on: input
                .start_date
                .and_then(|start| input.frequency.due_date(start, number)),
            payment: principal + interest,
            principal,
            interest,
            balance,
        });
    }

    AmortizationSchedule {
        principal: input.principal,
        total_interest,
        total_payable,
        periods,
        payment,
        rows,
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AmortizationRequest {
    #[serde(default, deserialize_with = "forms::lenient")]
    pub principal: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    pub monthly_rate: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    pub term_months: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    pub frequency: Option<String>,
    #[serde(default, deserialize_with = "forms::lenient")]
    pub start_date: Option<String>,
}

impl AmortizationRequest {
    pub fn parse(&self) -> Result<AmortizationInput, FieldErrors> {
        let mut errors = FieldErrors::new();

        let principal = positive_amount(&mut errors, "principal", &self.principal);

        let monthly_rate = match forms::present(&self.monthly_rate).map(str::parse::<Decimal>) {
            Some(Ok(rate)) if rate > Decimal::ZERO && rate <= MAX_MONTHLY_RATE => Some(rate),
            Some(Ok(rate)) if rate > Decimal::ZERO => {
                errors.add("monthly_rate", "La tasa mensual no puede exceder 1 (100%)");
                None
            }
            Some(Ok(_)) => {
                errors.add("monthly_rate", "La tasa debe ser mayor a 0");
                None
            }
            Some(Err(_)) => {
                errors.add("monthly_rate", "Ingrese una tasa numérica válida");
                None
            }
            None => {
                errors.add("monthly_rate", "La tasa es requerida");
                None
            }
        };

        let term_months = match forms::present(&self.term_months).map(str::parse::<u32>) {
            Some(Ok(term)) if (1..=MAX_TERM_MONTHS).contains(&term) => Some(term),
            Some(_) => {
                errors.add(
                    "term_months",
                    format!("El plazo debe estar entre 1 y {} meses", MAX_TERM_MONTHS),
                );
                None
            }
            None => {
                errors.add("term_months", "El plazo es requerido");
                None
            }
        };

        let frequency = match forms::present(&self.frequency) {
            None => Some(Frequency::Mensual),
            Some(text) => match text.parse::<Frequency>() {
                Ok(frequency) => Some(frequency),
                Err(_) => {
                    errors.add("frequency", "La frecuencia debe ser 1, 2 o 4 pagos por mes");
                    None
                }
            },
        };

        let start_date = optional_date(&mut errors, "start_date", &self.start_date);

        match (principal, monthly_rate, term_months, frequency) {
            (Some(principal), Some(monthly_rate), Some(term_months), Some(frequency))
                if errors.is_empty() =>
            {
                Ok(AmortizationInput {
                    principal,
                    monthly_rate,
                    term_months,
                    frequency,
                    start_date,
                })
            }
            _ => Err(errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(principal: i64, rate: &str, term: u32, frequency: Frequency) -> AmortizationInput {
        AmortizationInput {
            principal: Decimal::from(principal),
            monthly_rate: rate.parse().unwrap(),
            term_months: term,
            frequency,
            start_date: None,
        }
    }

    #[test]
    fn test_monthly_schedule() {
        let schedule = build_schedule(&input(12_000, "0.05", 12, Frequency::Mensual));

        assert_eq!(schedule.total_interest, Decimal::from(7_200));
        assert_eq!(schedule.periods, 12);
        assert_eq!(schedule.payment, Decimal::from(1_600));
        assert_eq!(schedule.rows[0].principal, Decimal::from(1_000));
        assert_eq!(schedule.rows[0].interest, Decimal::from(600));
        assert_eq!(schedule.rows[0].balance, Decimal::from(11_000));
        assert_eq!(schedule.rows[11].balance, Decimal::ZERO);
    }

    #[test]
    fn test_last_row_absorbs_rounding() {
        let schedule = build_schedule(&input(1_000, "0.03", 3, Frequency::Mensual));

        let principal_sum: Decimal = schedule.rows.iter().map(|r| r.principal).sum();
        let interest_sum: Decimal = schedule.rows.iter().map(|r| r.interest).sum();

        assert_eq!(schedule.rows[0].principal, "333.33".parse::<Decimal>().unwrap());
        assert_eq!(schedule.rows[2].principal, "333.34".parse::<Decimal>().unwrap());
        assert_eq!(principal_sum, Decimal::from(1_000));
        assert_eq!(interest_sum, schedule.total_interest);
        assert_eq!(schedule.rows.last().unwrap().balance, Decimal::ZERO);
    }

    #[test]
    fn test_weekly_periods_and_due_dates() {
        let mut weekly = input(4_000, "0.1", 2, Frequency::Semanal);
        weekly.start_date = NaiveDate::from_ymd_opt(2024, 1, 1);
        let schedule = build_schedule(&weekly);

        assert_eq!(schedule.periods, 8);
        assert_eq!(schedule.rows[0].due_on, NaiveDate::from_ymd_opt(2024, 1, 8));
        assert_eq!(schedule.rows[7].due_on, NaiveDate::from_ymd_opt(2024, 2, 26));
    }

    #[test]
    fn test_monthly_due_dates_clamp_to_month_end() {
        let mut monthly = input(3_000, "0.05", 2, Frequency::Mensual);
        monthly.start_date = NaiveDate::from_ymd_opt(2024, 1, 31);
        let schedule = build_schedule(&monthly);

        assert_eq!(schedule.rows[0].due_on, NaiveDate::from_ymd_opt(2024, 2, 29));
        assert_eq!(schedule.rows[1].due_on, NaiveDate::from_ymd_opt(2024, 3, 31));
    }

    #[test]
    fn test_request_rejects_non_positive_inputs() {
        let request = AmortizationRequest {
            principal: Some("0".to_string()),
            monthly_rate: Some("-0.05".to_string()),
            term_months: Some("0".to_string()),
            frequency: Some("3".to_string()),
            start_date: None,
        };
        let errors = request.parse().unwrap_err();

        assert_eq!(
            errors.fields().collect::<Vec<_>>(),
            vec!["frequency", "monthly_rate", "principal", "term_months"]
        );
    }

    #[test]
    fn test_request_rejects_out_of_range_principal_and_rate() {
        let request = AmortizationRequest {
            principal: Some("1000000000000000000000000000".to_string()),
            monthly_rate: Some("1.5".to_string()),
            term_months: Some("360".to_string()),
            ..Default::default()
        };
        let errors = request.parse().unwrap_err();

        assert_eq!(
            errors.fields().collect::<Vec<_>>(),
            vec!["monthly_rate", "principal"]
        );
    }

    #[test]
    fn test_largest_accepted_inputs_build_a_schedule() {
        let request = AmortizationRequest {
            principal: Some("9999999999.99".to_string()),
            monthly_rate: Some("1".to_string()),
            term_months: Some("360".to_string()),
            frequency: Some("4".to_string()),
            start_date: None,
        };
        let schedule = build_schedule(&request.parse().unwrap());

        assert_eq!(schedule.periods, 1_440);
        assert_eq!(schedule.rows.last().unwrap().balance, Decimal::ZERO);
        assert_eq!(
            schedule.total_interest,
            "3599999999996.40".parse::<Decimal>().unwrap()
        );
    }

    #[test]
    fn test_request_defaults_to_monthly() {
        let request = AmortizationRequest {
            principal: Some("5000".to_string()),
            monthly_rate: Some("0.04".to_string()),
            term_months: Some("6".to_string()),
            ..Default::default()
        };
        let input = request.parse().unwrap();
        assert_eq!(input.frequency, Frequency::Mensual);
        assert_eq!(input.term_months, 6);
    }
}

//! Immutable, self-validating value types shared by the aggregates.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

use super::errors::{DomainError, DomainResult};

// ============================================================================
// Money
// ============================================================================

/// Non-negative amount in a single ISO-4217 style currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Money {
    amount: Decimal,
    currency: String,
}

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> DomainResult<Self> {
        if amount < Decimal::ZERO {
            return Err(DomainError::InvalidAmount(amount));
        }
        let currency = normalize_currency(currency)?;
        Ok(Self { amount, currency })
    }

    pub fn zero(currency: &str) -> DomainResult<Self> {
        Self::new(Decimal::ZERO, currency)
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn add(&self, other: &Money) -> DomainResult<Money> {
        self.ensure_same_currency(other)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or(DomainError::AmountOverflow { operation: "addition" })?;
        Money::new(amount, &self.currency)
    }

    pub fn subtract(&self, other: &Money) -> DomainResult<Money> {
        self.ensure_same_currency(other)?;
        let amount = self
            .amount
            .checked_sub(other.amount)
            .ok_or(DomainError::AmountOverflow { operation: "subtraction" })?;
        Money::new(amount, &self.currency)
    }

    pub fn multiply(&self, quantity: u32) -> DomainResult<Money> {
        if quantity == 0 {
            return Err(DomainError::invalid_argument(
                "quantity",
                "must be greater than zero",
            ));
        }
        let amount = self
            .amount
            .checked_mul(Decimal::from(quantity))
            .ok_or(DomainError::AmountOverflow { operation: "multiplication" })?;
        Money::new(amount, &self.currency)
    }

    pub fn is_same_currency(&self, other: &Money) -> bool {
        self.currency == other.currency
    }

    fn ensure_same_currency(&self, other: &Money) -> DomainResult<()> {
        if !self.is_same_currency(other) {
            return Err(DomainError::CurrencyMismatch {
                expected: self.currency.clone(),
                found: other.currency.clone(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

fn normalize_currency(currency: &str) -> DomainResult<String> {
    let code = currency.trim().to_ascii_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(DomainError::InvalidCurrency(currency.to_string()));
    }
    Ok(code)
}

// ============================================================================
// Email
// ============================================================================

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("email pattern is a valid regex")
});

/// Syntactically valid address. No deliverability check is made.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    pub fn new(value: &str) -> DomainResult<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(DomainError::InvalidEmail("email cannot be empty".into()));
        }
        if !EMAIL_PATTERN.is_match(value) {
            return Err(DomainError::InvalidEmail(format!(
                "'{value}' is not a valid email address"
            )));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Email {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for Email {}

impl Hash for Email {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_ascii_lowercase().hash(state);
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Address
// ============================================================================

/// Postal address. Presence of the parts is checked by callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub zip_code: String,
}

impl Address {
    pub fn new(
        street: impl Into<String>,
        city: impl Into<String>,
        state: impl Into<String>,
        country: impl Into<String>,
        zip_code: impl Into<String>,
    ) -> Self {
        Self {
            street: street.into(),
            city: city.into(),
            state: state.into(),
            country: country.into(),
            zip_code: zip_code.into(),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use std::collections::HashSet;

    fn usd(amount: &str) -> Money {
        Money::new(amount.parse().unwrap(), "USD").unwrap()
    }

    #[test]
    fn test_money_rejects_negative_amount() {
        let result = Money::new(Decimal::new(-1, 2), "USD");
        assert!(matches!(result, Err(DomainError::InvalidAmount(_))));
    }

    #[test]
    fn test_money_rejects_blank_currency() {
        assert!(matches!(
            Money::new(Decimal::ONE, "  "),
            Err(DomainError::InvalidCurrency(_))
        ));
        assert!(matches!(
            Money::new(Decimal::ONE, "DOLLARS"),
            Err(DomainError::InvalidCurrency(_))
        ));
    }

    #[test]
    fn test_money_normalizes_currency_code() {
        let money = Money::new(Decimal::ONE, " usd ").unwrap();
        assert_eq!(money.currency(), "USD");
    }

    #[test]
    fn test_money_addition_sums_amounts() {
        let total = usd("10.25").add(&usd("4.75")).unwrap();
        assert_eq!(total, usd("15.00"));
    }

    #[test]
    fn test_money_addition_rejects_mixed_currencies() {
        let eur = Money::new(Decimal::ONE, "EUR").unwrap();
        let err = usd("1").add(&eur).unwrap_err();
        assert!(matches!(err, DomainError::CurrencyMismatch { .. }));
        assert_eq!(err.kind(), crate::domain::ErrorKind::InvalidOperation);
    }

    #[test]
    fn test_money_subtraction_cannot_go_negative() {
        assert_eq!(usd("10").subtract(&usd("2.5")).unwrap(), usd("7.5"));
        assert!(matches!(
            usd("1").subtract(&usd("2")),
            Err(DomainError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_money_equality_ignores_scale() {
        assert_eq!(usd("10.0"), usd("10.00"));
        assert_ne!(usd("10"), Money::new(Decimal::TEN, "EUR").unwrap());
    }

    #[test]
    fn test_money_multiply() {
        assert_eq!(usd("5.50").multiply(3).unwrap(), usd("16.50"));
        assert!(usd("5.50").multiply(0).is_err());
    }

    #[test]
    fn test_money_overflow_is_an_error() {
        let huge = Money::new(Decimal::MAX, "USD").unwrap();
        assert_eq!(
            huge.multiply(2).unwrap_err(),
            DomainError::AmountOverflow { operation: "multiplication" }
        );
        assert_eq!(
            huge.add(&usd("1")).unwrap_err().kind(),
            crate::domain::ErrorKind::InvalidArgument
        );
        assert_eq!(huge.multiply(1).unwrap(), huge);
    }

    #[quickcheck]
    fn prop_negative_money_always_fails(cents: i64) -> bool {
        let cents = -(cents.unsigned_abs().clamp(1, i64::MAX as u64) as i64);
        Money::new(Decimal::new(cents, 2), "USD").is_err()
    }

    #[quickcheck]
    fn prop_same_currency_addition_sums(a: u32, b: u32) -> bool {
        let left = Money::new(Decimal::new(a as i64, 2), "USD").unwrap();
        let right = Money::new(Decimal::new(b as i64, 2), "USD").unwrap();
        left.add(&right).unwrap().amount() == Decimal::new(a as i64 + b as i64, 2)
    }

    #[test]
    fn test_email_validation() {
        assert!(Email::new("buyer@agency.gov").is_ok());
        assert!(matches!(Email::new(""), Err(DomainError::InvalidEmail(_))));
        assert!(matches!(
            Email::new("not-an-email"),
            Err(DomainError::InvalidEmail(_))
        ));
        assert!(Email::new("missing@tld").is_err());
    }

    #[test]
    fn test_email_equality_is_case_insensitive() {
        let a = Email::new("Procurement@City.org").unwrap();
        let b = Email::new("procurement@city.org").unwrap();
        assert_eq!(a, b);

        let set: HashSet<Email> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_address_structural_equality() {
        let a = Address::new("1 Main St", "Springfield", "IL", "US", "62701");
        let b = Address::new("1 Main St", "Springfield", "IL", "US", "62701");
        assert_eq!(a, b);
        assert_ne!(a, Address::new("2 Main St", "Springfield", "IL", "US", "62701"));
    }
}

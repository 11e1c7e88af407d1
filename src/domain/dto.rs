//! Transport shapes for the value objects.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::value_objects::{Address, Money};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoneyDto {
    pub amount: Decimal,
    pub currency: String,
}

impl TryFrom<MoneyDto> for Money {
    type Error = DomainError;

    fn try_from(dto: MoneyDto) -> Result<Self, Self::Error> {
        Money::new(dto.amount, &dto.currency)
    }
}

impl From<&Money> for MoneyDto {
    fn from(m: &Money) -> Self {
        Self {
            amount: m.amount(),
            currency: m.currency().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressDto {
    pub street: String,
    pub city: String,
    #[serde(default)]
    pub state: String,
    pub country: String,
    #[serde(default)]
    pub zip_code: String,
}

impl From<AddressDto> for Address {
    fn from(dto: AddressDto) -> Self {
        Address::new(dto.street, dto.city, dto.state, dto.country, dto.zip_code)
    }
}

impl From<&Address> for AddressDto {
    fn from(a: &Address) -> Self {
        Self {
            street: a.street.clone(),
            city: a.city.clone(),
            state: a.state.clone(),
            country: a.country.clone(),
            zip_code: a.zip_code.clone(),
        }
    }
}

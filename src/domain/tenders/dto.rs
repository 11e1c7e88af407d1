use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::aggregate::{Tender, TenderDetails, TenderStatus, TenderType};
use super::entities::{Deliverable, EligibilityCriteria, PaymentTerm, TenderActivity, TenderDocument};
use crate::domain::documents::DocumentResponse;
use crate::domain::dto::MoneyDto;
use crate::domain::errors::DomainResult;
use crate::domain::value_objects::Email;

/// Name/description pair used for criteria and deliverables
#[derive(Debug, Clone, Deserialize)]
pub struct NamedItemRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimelineActivityRequest {
    pub activity_name: String,
    pub expected_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentTermRequest {
    #[serde(default)]
    pub description: String,
    pub percentage: Decimal,
}

/// Request DTO for creating a tender
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTenderRequest {
    pub title: String,
    pub reference_number: String,
    #[serde(default)]
    pub description: String,
    pub issue_date: DateTime<Utc>,
    pub closing_date: DateTime<Utc>,
    #[serde(default)]
    pub tender_type: TenderType,
    #[serde(default)]
    pub category: String,
    pub budget_range: MoneyDto,
    pub contact_email: String,
    #[serde(default)]
    pub issued_by_organization: String,
    #[serde(default)]
    pub eligibility_criteria: Vec<NamedItemRequest>,
    #[serde(default)]
    pub deliverables: Vec<NamedItemRequest>,
    #[serde(default)]
    pub timeline: Vec<TimelineActivityRequest>,
    #[serde(default)]
    pub payment_terms: Vec<PaymentTermRequest>,
}

impl CreateTenderRequest {
    pub fn details(&self) -> DomainResult<TenderDetails> {
        Ok(TenderDetails {
            title: self.title.clone(),
            description: self.description.clone(),
            issue_date: self.issue_date,
            closing_date: self.closing_date,
            tender_type: self.tender_type,
            category: self.category.clone(),
            budget_range: self.budget_range.clone().try_into()?,
            contact_email: Email::new(&self.contact_email)?,
            issued_by_organization: self.issued_by_organization.clone(),
        })
    }
}

/// Request DTO for updating a draft tender. Absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTenderRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub issue_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closing_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tender_type: Option<TenderType>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub budget_range: Option<MoneyDto>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub issued_by_organization: Option<String>,
}

impl UpdateTenderRequest {
    /// Overlays the provided fields on `current`.
    pub fn apply_to(self, current: &TenderDetails) -> DomainResult<TenderDetails> {
        let mut next = current.clone();
        if let Some(title) = self.title {
            next.title = title;
        }
        if let Some(description) = self.description {
            next.description = description;
        }
        if let Some(issue_date) = self.issue_date {
            next.issue_date = issue_date;
        }
        if let Some(closing_date) = self.closing_date {
            next.closing_date = closing_date;
        }
        if let Some(tender_type) = self.tender_type {
            next.tender_type = tender_type;
        }
        if let Some(category) = self.category {
            next.category = category;
        }
        if let Some(budget) = self.budget_range {
            next.budget_range = budget.try_into()?;
        }
        if let Some(email) = self.contact_email {
            next.contact_email = Email::new(&email)?;
        }
        if let Some(organization) = self.issued_by_organization {
            next.issued_by_organization = organization;
        }
        Ok(next)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AwardTenderRequest {
    pub bid_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelTenderRequest {
    #[serde(default)]
    pub reason: String,
}

/// Response DTO for a child record with a name and description
#[derive(Debug, Clone, Serialize)]
pub struct NamedItemResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
}

impl From<&EligibilityCriteria> for NamedItemResponse {
    fn from(c: &EligibilityCriteria) -> Self {
        Self {
            id: c.id,
            name: c.name.clone(),
            description: c.description.clone(),
        }
    }
}

impl From<&Deliverable> for NamedItemResponse {
    fn from(d: &Deliverable) -> Self {
        Self {
            id: d.id,
            name: d.name.clone(),
            description: d.description.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineActivityResponse {
    pub id: Uuid,
    pub activity_name: String,
    pub expected_date: DateTime<Utc>,
}

impl From<&TenderActivity> for TimelineActivityResponse {
    fn from(a: &TenderActivity) -> Self {
        Self {
            id: a.id,
            activity_name: a.activity_name.clone(),
            expected_date: a.expected_date,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentTermResponse {
    pub id: Uuid,
    pub description: String,
    pub percentage: Decimal,
}

impl From<&PaymentTerm> for PaymentTermResponse {
    fn from(t: &PaymentTerm) -> Self {
        Self {
            id: t.id,
            description: t.description.clone(),
            percentage: t.percentage,
        }
    }
}

impl From<&TenderDocument> for DocumentResponse {
    fn from(d: &TenderDocument) -> Self {
        Self {
            id: d.id,
            name: d.name.clone(),
            file_url: d.file_url.clone(),
            description: d.description.clone(),
            document_type: String::new(),
            file_type: d.file_type.clone(),
            file_size: d.file_size,
            created_at: d.audit.created_at(),
            created_by: d.audit.created_by().to_string(),
        }
    }
}

/// Response DTO for tender
#[derive(Debug, Clone, Serialize)]
pub struct TenderResponse {
    pub id: Uuid,
    pub title: String,
    pub reference_number: String,
    pub description: String,
    pub issue_date: DateTime<Utc>,
    pub closing_date: DateTime<Utc>,
    pub tender_type: TenderType,
    pub category: String,
    pub budget_range: MoneyDto,
    pub contact_email: String,
    pub issued_by_organization: String,
    pub status: TenderStatus,
    pub winning_bid_id: Option<Uuid>,
    pub cancellation_reason: Option<String>,
    pub documents: Vec<DocumentResponse>,
    pub eligibility_criteria: Vec<NamedItemResponse>,
    pub deliverables: Vec<NamedItemResponse>,
    pub timeline: Vec<TimelineActivityResponse>,
    pub payment_terms: Vec<PaymentTermResponse>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
}

impl From<&Tender> for TenderResponse {
    fn from(t: &Tender) -> Self {
        let d = t.details();
        Self {
            id: t.id(),
            title: d.title.clone(),
            reference_number: t.reference_number().to_string(),
            description: d.description.clone(),
            issue_date: d.issue_date,
            closing_date: d.closing_date,
            tender_type: d.tender_type,
            category: d.category.clone(),
            budget_range: MoneyDto::from(&d.budget_range),
            contact_email: d.contact_email.to_string(),
            issued_by_organization: d.issued_by_organization.clone(),
            status: t.status(),
            winning_bid_id: t.winning_bid_id(),
            cancellation_reason: t.cancellation_reason().map(str::to_string),
            documents: t.documents().iter().map(Into::into).collect(),
            eligibility_criteria: t.eligibility_criteria().iter().map(Into::into).collect(),
            deliverables: t.deliverables().iter().map(Into::into).collect(),
            timeline: t.timeline().iter().map(Into::into).collect(),
            payment_terms: t.payment_terms().iter().map(Into::into).collect(),
            created_at: t.audit().created_at(),
            created_by: t.audit().created_by().to_string(),
            updated_at: t.audit().updated_at(),
            updated_by: t.audit().updated_by().map(str::to_string),
        }
    }
}

impl From<Tender> for TenderResponse {
    fn from(t: Tender) -> Self {
        Self::from(&t)
    }
}

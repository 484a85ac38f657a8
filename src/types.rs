//! Typed records for the subscription document and the dashboard aggregate.

use serde::{Deserialize, Serialize};

/// Service categories used for dashboard bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCategory {
    Coding,
    Art,
    Music,
    General,
}

impl ServiceCategory {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "coding" => Some(Self::Coding),
            "art" => Some(Self::Art),
            "music" => Some(Self::Music),
            "general" => Some(Self::General),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Paused,
    Cancelled,
}

impl AccountStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// A tracked AI service (the product a subscription belongs to).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub category: ServiceCategory,
    pub provider: String,
    pub website_url: String,
    #[serde(default)]
    pub docs_url: Option<String>,
    #[serde(default)]
    pub billing_url: Option<String>,
}

/// A subscription instance of a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub service_id: String,
    pub email: String,
    pub plan_name: String,
    pub monthly_cost_usd: f64,
    #[serde(default)]
    pub renewal_day: Option<u8>,
    pub status: AccountStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Monthly usage budget for one account (at most one per account).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageBudget {
    pub id: String,
    pub account_id: String,
    pub monthly_budget_usd: f64,
    pub alert_threshold_percent: f64,
    pub current_month_spend_usd: f64,
}

/// A prioritized note attached to an account and/or a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub service_id: Option<String>,
    pub title: String,
    pub body: String,
    pub priority: u8,
}

/// The whole on-disk document: the unit of atomic persistence.
///
/// `usage_budgets` and `recommendations` default to empty so documents
/// written before those collections existed still load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub services: Vec<Service>,
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub usage_budgets: Vec<UsageBudget>,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
}

/// Per-category spend buckets; all four are always present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub coding: f64,
    pub art: f64,
    pub music: f64,
    pub general: f64,
}

impl CategoryBreakdown {
    pub fn bucket_mut(&mut self, category: ServiceCategory) -> &mut f64 {
        match category {
            ServiceCategory::Coding => &mut self.coding,
            ServiceCategory::Art => &mut self.art,
            ServiceCategory::Music => &mut self.music,
            ServiceCategory::General => &mut self.general,
        }
    }
}

/// Emitted when an active account's budget crosses its alert threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetAlert {
    pub account_id: String,
    pub email: String,
    pub percent_used: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_monthly_spend_usd: f64,
    pub category_breakdown_usd: CategoryBreakdown,
    pub budget_alerts: Vec<BudgetAlert>,
}

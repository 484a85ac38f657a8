//! Single-file JSON document store for subscription data.
//!
//! All reads and writes go through [`Store`]. Every operation reloads the
//! document from disk, validates and mutates an in-memory copy, and persists
//! it with a temp-file + rename write, so a crash never leaves a partial
//! document behind and a failed validation never touches the file.
//!
//! An internal mutex serializes operations within a process. There is no
//! cross-process locking: two processes sharing one file cannot corrupt it
//! (the rename is atomic) but can lose each other's updates.

use crate::errors::StoreError;
use crate::types::{
    Account, AccountStatus, BudgetAlert, CategoryBreakdown, DashboardSummary, Document,
    Recommendation, Service, ServiceCategory, UsageBudget,
};
use crate::validation;
use serde_json::Value;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub struct Store {
    path: PathBuf,
    lock: Mutex<()>,
}

impl Store {
    /// Opens a store backed by `path`, seeding the default empty document
    /// (and any missing parent directories) if the file does not exist yet.
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        let store = Self {
            path,
            lock: Mutex::new(()),
        };
        if !store.path.exists() {
            store.write_document(&Document::default())?;
        }
        Ok(store)
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reads and parses the backing file. A missing file is re-seeded with
    /// the default document; missing required collections are a format
    /// error; missing optional collections are backfilled in memory only.
    fn read_document(&self) -> Result<Document, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                let document = Document::default();
                self.write_document(&document)?;
                return Ok(document);
            }
            Err(err) => return Err(err.into()),
        };

        let value: Value = serde_json::from_str(&raw).map_err(|err| {
            StoreError::StorageFormat(format!("{}: not valid JSON: {err}", self.path.display()))
        })?;
        let map = value.as_object().ok_or_else(|| {
            StoreError::StorageFormat(format!(
                "{}: expected a top-level JSON object",
                self.path.display()
            ))
        })?;
        if !map.contains_key("services") || !map.contains_key("accounts") {
            return Err(StoreError::StorageFormat(format!(
                "{}: missing required 'services'/'accounts' collections",
                self.path.display()
            )));
        }

        serde_json::from_value(value).map_err(|err| {
            StoreError::StorageFormat(format!("{}: {err}", self.path.display()))
        })
    }

    /// Atomic durable write: serialize to a temp file in the same directory,
    /// force it to stable storage, then rename over the destination.
    fn write_document(&self, document: &Document) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(document).map_err(|err| {
            StoreError::StorageFormat(format!("failed to serialize document: {err}"))
        })?;

        let tmp_path = self.path.with_extension("json.tmp");
        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(content.as_bytes())?;
        tmp.sync_all()?;
        fs::rename(&tmp_path, &self.path)?;
        tracing::debug!("wrote {} ({} bytes)", self.path.display(), content.len());
        Ok(())
    }

    // ----- whole document -----

    pub fn get_config(&self) -> Result<Document, StoreError> {
        let _guard = self.guard();
        self.read_document()
    }

    /// Whole-document import: replaces the entire store contents in one
    /// atomic write. The payload must carry the required collections; the
    /// records inside are taken as-is, matching the export format.
    pub fn replace_config(&self, payload: &Value) -> Result<(), StoreError> {
        let map = payload.as_object().ok_or_else(|| {
            StoreError::Validation("config import payload must be a JSON object".to_string())
        })?;
        if !map.contains_key("services") || !map.contains_key("accounts") {
            return Err(StoreError::Validation(
                "config import payload must contain 'services' and 'accounts'".to_string(),
            ));
        }
        let document: Document = serde_json::from_value(payload.clone()).map_err(|err| {
            StoreError::Validation(format!("config import payload is malformed: {err}"))
        })?;

        let _guard = self.guard();
        self.write_document(&document)?;
        tracing::info!(
            "imported config: {} services, {} accounts, {} budgets, {} recommendations",
            document.services.len(),
            document.accounts.len(),
            document.usage_budgets.len(),
            document.recommendations.len()
        );
        Ok(())
    }

    // ----- services -----

    pub fn list_services(
        &self,
        category: Option<ServiceCategory>,
    ) -> Result<Vec<Service>, StoreError> {
        let _guard = self.guard();
        let mut services = self.read_document()?.services;
        if let Some(category) = category {
            services.retain(|service| service.category == category);
        }
        Ok(services)
    }

    pub fn get_service(&self, service_id: &str) -> Result<Option<Service>, StoreError> {
        let _guard = self.guard();
        let document = self.read_document()?;
        Ok(document
            .services
            .into_iter()
            .find(|service| service.id == service_id))
    }

    pub fn create_service(&self, payload: &Value) -> Result<Service, StoreError> {
        let _guard = self.guard();
        let mut document = self.read_document()?;
        let service = validation::parse_service(payload)?;
        if document
            .services
            .iter()
            .any(|existing| existing.id == service.id)
        {
            return Err(StoreError::Validation(format!(
                "service '{}' already exists",
                service.id
            )));
        }
        document.services.push(service.clone());
        self.write_document(&document)?;
        Ok(service)
    }

    pub fn update_service(
        &self,
        service_id: &str,
        payload: &Value,
    ) -> Result<Service, StoreError> {
        let _guard = self.guard();
        let mut document = self.read_document()?;
        let service = validation::parse_service(payload)?;
        if service.id != service_id {
            return Err(StoreError::Validation(
                "service id in path and payload must match".to_string(),
            ));
        }
        let slot = document
            .services
            .iter_mut()
            .find(|existing| existing.id == service_id)
            .ok_or_else(|| {
                StoreError::Validation(format!("service '{service_id}' was not found"))
            })?;
        *slot = service.clone();
        self.write_document(&document)?;
        Ok(service)
    }

    /// Fails while any account still references the service.
    pub fn delete_service(&self, service_id: &str) -> Result<(), StoreError> {
        let _guard = self.guard();
        let mut document = self.read_document()?;
        if document
            .accounts
            .iter()
            .any(|account| account.service_id == service_id)
        {
            return Err(StoreError::Validation(
                "cannot delete a service that an account still uses".to_string(),
            ));
        }
        let before = document.services.len();
        document.services.retain(|service| service.id != service_id);
        if document.services.len() == before {
            return Err(StoreError::Validation(format!(
                "service '{service_id}' was not found"
            )));
        }
        self.write_document(&document)
    }

    // ----- accounts -----

    pub fn list_accounts(
        &self,
        category: Option<ServiceCategory>,
        status: Option<AccountStatus>,
    ) -> Result<Vec<Account>, StoreError> {
        let _guard = self.guard();
        let document = self.read_document()?;
        let services = document.services;
        let mut accounts = document.accounts;
        if let Some(status) = status {
            accounts.retain(|account| account.status == status);
        }
        if let Some(category) = category {
            accounts.retain(|account| {
                services
                    .iter()
                    .find(|service| service.id == account.service_id)
                    .is_some_and(|service| service.category == category)
            });
        }
        Ok(accounts)
    }

    pub fn get_account(&self, account_id: &str) -> Result<Option<Account>, StoreError> {
        let _guard = self.guard();
        let document = self.read_document()?;
        Ok(document
            .accounts
            .into_iter()
            .find(|account| account.id == account_id))
    }

    pub fn create_account(&self, payload: &Value) -> Result<Account, StoreError> {
        let _guard = self.guard();
        let mut document = self.read_document()?;
        let account = validation::parse_account(payload, &document.services)?;
        if document
            .accounts
            .iter()
            .any(|existing| existing.id == account.id)
        {
            return Err(StoreError::Validation(format!(
                "account '{}' already exists",
                account.id
            )));
        }
        document.accounts.push(account.clone());
        self.write_document(&document)?;
        Ok(account)
    }

    pub fn update_account(
        &self,
        account_id: &str,
        payload: &Value,
    ) -> Result<Account, StoreError> {
        let _guard = self.guard();
        let mut document = self.read_document()?;
        let account = validation::parse_account(payload, &document.services)?;
        if account.id != account_id {
            return Err(StoreError::Validation(
                "account id in path and payload must match".to_string(),
            ));
        }
        let slot = document
            .accounts
            .iter_mut()
            .find(|existing| existing.id == account_id)
            .ok_or_else(|| {
                StoreError::Validation(format!("account '{account_id}' was not found"))
            })?;
        *slot = account.clone();
        self.write_document(&document)?;
        Ok(account)
    }

    /// Deleting an account cascades: its budget (if any) and the
    /// recommendations pointing at it go too. Recommendations that only
    /// reference a service survive.
    pub fn delete_account(&self, account_id: &str) -> Result<(), StoreError> {
        let _guard = self.guard();
        let mut document = self.read_document()?;
        let before = document.accounts.len();
        document.accounts.retain(|account| account.id != account_id);
        if document.accounts.len() == before {
            return Err(StoreError::Validation(format!(
                "account '{account_id}' was not found"
            )));
        }
        document
            .usage_budgets
            .retain(|budget| budget.account_id != account_id);
        document
            .recommendations
            .retain(|rec| rec.account_id.as_deref() != Some(account_id));
        self.write_document(&document)
    }

    // ----- budgets -----

    pub fn list_budgets(&self) -> Result<Vec<UsageBudget>, StoreError> {
        let _guard = self.guard();
        Ok(self.read_document()?.usage_budgets)
    }

    pub fn get_budget(&self, budget_id: &str) -> Result<Option<UsageBudget>, StoreError> {
        let _guard = self.guard();
        let document = self.read_document()?;
        Ok(document
            .usage_budgets
            .into_iter()
            .find(|budget| budget.id == budget_id))
    }

    pub fn create_budget(&self, payload: &Value) -> Result<UsageBudget, StoreError> {
        let _guard = self.guard();
        let mut document = self.read_document()?;
        let budget = validation::parse_budget(payload, &document.accounts)?;
        if document
            .usage_budgets
            .iter()
            .any(|existing| existing.id == budget.id)
        {
            return Err(StoreError::Validation(format!(
                "budget '{}' already exists",
                budget.id
            )));
        }
        if document
            .usage_budgets
            .iter()
            .any(|existing| existing.account_id == budget.account_id)
        {
            return Err(StoreError::Validation(format!(
                "account '{}' already has a budget",
                budget.account_id
            )));
        }
        document.usage_budgets.push(budget.clone());
        self.write_document(&document)?;
        Ok(budget)
    }

    pub fn update_budget(
        &self,
        budget_id: &str,
        payload: &Value,
    ) -> Result<UsageBudget, StoreError> {
        let _guard = self.guard();
        let mut document = self.read_document()?;
        let budget = validation::parse_budget(payload, &document.accounts)?;
        if budget.id != budget_id {
            return Err(StoreError::Validation(
                "budget id in path and payload must match".to_string(),
            ));
        }
        let index = document
            .usage_budgets
            .iter()
            .position(|existing| existing.id == budget_id)
            .ok_or_else(|| {
                StoreError::Validation(format!("budget '{budget_id}' was not found"))
            })?;
        if document
            .usage_budgets
            .iter()
            .any(|existing| existing.id != budget_id && existing.account_id == budget.account_id)
        {
            return Err(StoreError::Validation(format!(
                "account '{}' already has a budget",
                budget.account_id
            )));
        }
        document.usage_budgets[index] = budget.clone();
        self.write_document(&document)?;
        Ok(budget)
    }

    pub fn delete_budget(&self, budget_id: &str) -> Result<(), StoreError> {
        let _guard = self.guard();
        let mut document = self.read_document()?;
        let before = document.usage_budgets.len();
        document.usage_budgets.retain(|budget| budget.id != budget_id);
        if document.usage_budgets.len() == before {
            return Err(StoreError::Validation(format!(
                "budget '{budget_id}' was not found"
            )));
        }
        self.write_document(&document)
    }

    // ----- recommendations -----

    /// Returns recommendations sorted ascending by priority (1 first);
    /// insertion order breaks ties.
    pub fn list_recommendations(&self) -> Result<Vec<Recommendation>, StoreError> {
        let _guard = self.guard();
        let mut recommendations = self.read_document()?.recommendations;
        recommendations.sort_by_key(|rec| rec.priority);
        Ok(recommendations)
    }

    pub fn get_recommendation(
        &self,
        recommendation_id: &str,
    ) -> Result<Option<Recommendation>, StoreError> {
        let _guard = self.guard();
        let document = self.read_document()?;
        Ok(document
            .recommendations
            .into_iter()
            .find(|rec| rec.id == recommendation_id))
    }

    pub fn create_recommendation(&self, payload: &Value) -> Result<Recommendation, StoreError> {
        let _guard = self.guard();
        let mut document = self.read_document()?;
        let rec =
            validation::parse_recommendation(payload, &document.accounts, &document.services)?;
        if document
            .recommendations
            .iter()
            .any(|existing| existing.id == rec.id)
        {
            return Err(StoreError::Validation(format!(
                "recommendation '{}' already exists",
                rec.id
            )));
        }
        document.recommendations.push(rec.clone());
        self.write_document(&document)?;
        Ok(rec)
    }

    pub fn update_recommendation(
        &self,
        recommendation_id: &str,
        payload: &Value,
    ) -> Result<Recommendation, StoreError> {
        let _guard = self.guard();
        let mut document = self.read_document()?;
        let rec =
            validation::parse_recommendation(payload, &document.accounts, &document.services)?;
        if rec.id != recommendation_id {
            return Err(StoreError::Validation(
                "recommendation id in path and payload must match".to_string(),
            ));
        }
        let slot = document
            .recommendations
            .iter_mut()
            .find(|existing| existing.id == recommendation_id)
            .ok_or_else(|| {
                StoreError::Validation(format!(
                    "recommendation '{recommendation_id}' was not found"
                ))
            })?;
        *slot = rec.clone();
        self.write_document(&document)?;
        Ok(rec)
    }

    pub fn delete_recommendation(&self, recommendation_id: &str) -> Result<(), StoreError> {
        let _guard = self.guard();
        let mut document = self.read_document()?;
        let before = document.recommendations.len();
        document
            .recommendations
            .retain(|rec| rec.id != recommendation_id);
        if document.recommendations.len() == before {
            return Err(StoreError::Validation(format!(
                "recommendation '{recommendation_id}' was not found"
            )));
        }
        self.write_document(&document)
    }

    // ----- dashboard -----

    pub fn dashboard_summary(&self) -> Result<DashboardSummary, StoreError> {
        let _guard = self.guard();
        let document = self.read_document()?;
        Ok(summarize(&document))
    }
}

/// Derives the spending dashboard from current state. Only active accounts
/// count; alerts come out in account insertion order.
fn summarize(document: &Document) -> DashboardSummary {
    let mut total = 0.0;
    let mut breakdown = CategoryBreakdown::default();
    let mut budget_alerts = Vec::new();

    for account in document
        .accounts
        .iter()
        .filter(|account| account.status == AccountStatus::Active)
    {
        total += account.monthly_cost_usd;
        let category = document
            .services
            .iter()
            .find(|service| service.id == account.service_id)
            .map_or(ServiceCategory::General, |service| service.category);
        *breakdown.bucket_mut(category) += account.monthly_cost_usd;

        let budget = document
            .usage_budgets
            .iter()
            .find(|budget| budget.account_id == account.id)
            .filter(|budget| budget.monthly_budget_usd > 0.0);
        if let Some(budget) = budget {
            let percent_used =
                round_cents(budget.current_month_spend_usd / budget.monthly_budget_usd * 100.0);
            if percent_used >= budget.alert_threshold_percent {
                budget_alerts.push(BudgetAlert {
                    account_id: account.id.clone(),
                    email: account.email.clone(),
                    percent_used,
                });
            }
        }
    }

    DashboardSummary {
        total_monthly_spend_usd: round_cents(total),
        category_breakdown_usd: CategoryBreakdown {
            coding: round_cents(breakdown.coding),
            art: round_cents(breakdown.art),
            music: round_cents(breakdown.music),
            general: round_cents(breakdown.general),
        },
        budget_alerts,
    }
}

/// Rounds to two decimal places, half away from zero.
fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;

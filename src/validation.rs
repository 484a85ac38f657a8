//! Payload validation: parses loosely-typed JSON payloads into typed records.
//!
//! Each function is pure. It checks shape, types, ranges, and references
//! against the collections it is handed, and never touches storage. The same
//! checks run in full on both create and update.

use crate::errors::StoreError;
use crate::types::{Account, AccountStatus, Recommendation, Service, ServiceCategory, UsageBudget};
use serde_json::{Map, Value};

type Payload = Map<String, Value>;

fn as_payload(value: &Value) -> Result<&Payload, StoreError> {
    value
        .as_object()
        .ok_or_else(|| StoreError::Validation("payload must be a JSON object".to_string()))
}

/// Secrets never belong in the document; any key that even looks like a
/// password field is rejected outright, regardless of value.
fn reject_password_fields(payload: &Payload) -> Result<(), StoreError> {
    for key in payload.keys() {
        if key.to_lowercase().contains("password") {
            return Err(StoreError::Validation(format!(
                "field '{key}' is not allowed; password-like fields are never stored"
            )));
        }
    }
    Ok(())
}

fn missing(field: &str) -> StoreError {
    StoreError::Validation(format!("missing required field '{field}'"))
}

fn require_string(payload: &Payload, field: &str) -> Result<String, StoreError> {
    match payload.get(field) {
        None => Err(missing(field)),
        Some(Value::String(value)) => Ok(value.clone()),
        Some(_) => Err(StoreError::Validation(format!(
            "field '{field}' must be a string"
        ))),
    }
}

fn optional_string(payload: &Payload, field: &str) -> Result<Option<String>, StoreError> {
    match payload.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(StoreError::Validation(format!(
            "field '{field}' must be a string or null"
        ))),
    }
}

fn require_non_negative_number(payload: &Payload, field: &str) -> Result<f64, StoreError> {
    let value = payload.get(field).ok_or_else(|| missing(field))?;
    value
        .as_f64()
        .filter(|number| *number >= 0.0)
        .ok_or_else(|| {
            StoreError::Validation(format!("field '{field}' must be a non-negative number"))
        })
}

fn optional_renewal_day(payload: &Payload) -> Result<Option<u8>, StoreError> {
    match payload.get("renewal_day") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            let day = value.as_i64().filter(|day| (1..=31).contains(day)).ok_or_else(|| {
                StoreError::Validation(
                    "field 'renewal_day' must be an integer between 1 and 31".to_string(),
                )
            })?;
            Ok(Some(day as u8))
        }
    }
}

fn tags_list(payload: &Payload) -> Result<Vec<String>, StoreError> {
    let invalid =
        || StoreError::Validation("field 'tags' must be a list of strings".to_string());
    match payload.get("tags") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string).ok_or_else(invalid))
            .collect(),
        Some(_) => Err(invalid()),
    }
}

/// An empty string counts as "not set" for optional references, mirroring the
/// blank-to-null coercion callers apply to form input.
fn optional_reference(payload: &Payload, field: &str) -> Result<Option<String>, StoreError> {
    Ok(optional_string(payload, field)?.filter(|value| !value.is_empty()))
}

pub fn parse_service(payload: &Value) -> Result<Service, StoreError> {
    let payload = as_payload(payload)?;
    reject_password_fields(payload)?;

    let id = require_string(payload, "id")?;
    let name = require_string(payload, "name")?;
    let category_raw = require_string(payload, "category")?;
    let category = ServiceCategory::parse(&category_raw).ok_or_else(|| {
        StoreError::Validation(format!(
            "invalid category '{category_raw}' (expected coding, art, music, or general)"
        ))
    })?;
    let provider = require_string(payload, "provider")?;
    let website_url = require_string(payload, "website_url")?;
    let docs_url = optional_string(payload, "docs_url")?;
    let billing_url = optional_string(payload, "billing_url")?;

    Ok(Service {
        id,
        name,
        category,
        provider,
        website_url,
        docs_url,
        billing_url,
    })
}

pub fn parse_account(payload: &Value, services: &[Service]) -> Result<Account, StoreError> {
    let payload = as_payload(payload)?;
    reject_password_fields(payload)?;

    let id = require_string(payload, "id")?;
    let service_id = require_string(payload, "service_id")?;
    if !services.iter().any(|service| service.id == service_id) {
        return Err(StoreError::Validation(format!(
            "unknown service_id '{service_id}'"
        )));
    }

    let email = require_string(payload, "email")?;
    if !email.contains('@') {
        return Err(StoreError::Validation(
            "field 'email' must look like an email address".to_string(),
        ));
    }

    let plan_name = require_string(payload, "plan_name")?;
    let monthly_cost_usd = require_non_negative_number(payload, "monthly_cost_usd")?;
    let renewal_day = optional_renewal_day(payload)?;

    let status_raw = require_string(payload, "status")?;
    let status = AccountStatus::parse(&status_raw).ok_or_else(|| {
        StoreError::Validation(format!(
            "invalid status '{status_raw}' (expected active, paused, or cancelled)"
        ))
    })?;

    let notes = optional_string(payload, "notes")?;
    let tags = tags_list(payload)?;

    Ok(Account {
        id,
        service_id,
        email,
        plan_name,
        monthly_cost_usd,
        renewal_day,
        status,
        notes,
        tags,
    })
}

pub fn parse_budget(payload: &Value, accounts: &[Account]) -> Result<UsageBudget, StoreError> {
    let payload = as_payload(payload)?;
    reject_password_fields(payload)?;

    let id = require_string(payload, "id")?;
    let account_id = require_string(payload, "account_id")?;
    if !accounts.iter().any(|account| account.id == account_id) {
        return Err(StoreError::Validation(format!(
            "unknown account_id '{account_id}'"
        )));
    }

    let monthly_budget_usd = require_non_negative_number(payload, "monthly_budget_usd")?;
    let alert_threshold_percent = require_non_negative_number(payload, "alert_threshold_percent")?;
    if alert_threshold_percent > 100.0 {
        return Err(StoreError::Validation(
            "field 'alert_threshold_percent' cannot be greater than 100".to_string(),
        ));
    }
    let current_month_spend_usd = require_non_negative_number(payload, "current_month_spend_usd")?;

    Ok(UsageBudget {
        id,
        account_id,
        monthly_budget_usd,
        alert_threshold_percent,
        current_month_spend_usd,
    })
}

pub fn parse_recommendation(
    payload: &Value,
    accounts: &[Account],
    services: &[Service],
) -> Result<Recommendation, StoreError> {
    let payload = as_payload(payload)?;
    reject_password_fields(payload)?;

    let id = require_string(payload, "id")?;
    let title = require_string(payload, "title")?;
    let body = require_string(payload, "body")?;

    let account_id = optional_reference(payload, "account_id")?;
    let service_id = optional_reference(payload, "service_id")?;
    if account_id.is_none() && service_id.is_none() {
        return Err(StoreError::Validation(
            "recommendation requires either 'account_id' or 'service_id'".to_string(),
        ));
    }
    if let Some(account_id) = &account_id {
        if !accounts.iter().any(|account| account.id == *account_id) {
            return Err(StoreError::Validation(format!(
                "unknown account_id '{account_id}'"
            )));
        }
    }
    if let Some(service_id) = &service_id {
        if !services.iter().any(|service| service.id == *service_id) {
            return Err(StoreError::Validation(format!(
                "unknown service_id '{service_id}'"
            )));
        }
    }

    let priority = payload
        .get("priority")
        .ok_or_else(|| missing("priority"))?
        .as_i64()
        .filter(|priority| (1..=5).contains(priority))
        .ok_or_else(|| {
            StoreError::Validation("field 'priority' must be an integer between 1 and 5".to_string())
        })?;

    Ok(Recommendation {
        id,
        account_id,
        service_id,
        title,
        body,
        priority: priority as u8,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn known_services() -> Vec<Service> {
        vec![Service {
            id: "codepilot".to_string(),
            name: "CodePilot".to_string(),
            category: ServiceCategory::Coding,
            provider: "Acme AI".to_string(),
            website_url: "https://codepilot.example".to_string(),
            docs_url: None,
            billing_url: None,
        }]
    }

    fn known_accounts() -> Vec<Account> {
        vec![Account {
            id: "acct-main".to_string(),
            service_id: "codepilot".to_string(),
            email: "me@example.com".to_string(),
            plan_name: "Pro".to_string(),
            monthly_cost_usd: 17.0,
            renewal_day: Some(5),
            status: AccountStatus::Active,
            notes: None,
            tags: vec!["work".to_string()],
        }]
    }

    fn service_payload() -> Value {
        json!({
            "id": "codepilot",
            "name": "CodePilot",
            "category": "coding",
            "provider": "Acme AI",
            "website_url": "https://codepilot.example",
            "docs_url": null,
            "billing_url": "https://codepilot.example/billing",
        })
    }

    fn account_payload() -> Value {
        json!({
            "id": "acct-main",
            "service_id": "codepilot",
            "email": "me@example.com",
            "plan_name": "Pro",
            "monthly_cost_usd": 17.0,
            "renewal_day": 5,
            "status": "active",
            "notes": "daily driver",
            "tags": ["work", "ide"],
        })
    }

    fn budget_payload() -> Value {
        json!({
            "id": "bud-main",
            "account_id": "acct-main",
            "monthly_budget_usd": 30.0,
            "alert_threshold_percent": 80.0,
            "current_month_spend_usd": 26.0,
        })
    }

    fn recommendation_payload() -> Value {
        json!({
            "id": "rec-1",
            "account_id": "acct-main",
            "service_id": null,
            "title": "Prefer for long sessions",
            "body": "Flat-rate plan beats metered usage here.",
            "priority": 1,
        })
    }

    #[test]
    fn parses_complete_service() {
        let service = parse_service(&service_payload()).unwrap();
        assert_eq!(service.id, "codepilot");
        assert_eq!(service.category, ServiceCategory::Coding);
        assert_eq!(service.docs_url, None);
        assert_eq!(
            service.billing_url.as_deref(),
            Some("https://codepilot.example/billing")
        );
    }

    #[test]
    fn rejects_missing_required_field() {
        let mut payload = service_payload();
        payload.as_object_mut().unwrap().remove("name");
        let err = parse_service(&payload).unwrap_err();
        assert!(err.to_string().contains("missing required field 'name'"));
    }

    #[test]
    fn rejects_non_object_payload() {
        let err = parse_service(&json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn rejects_invalid_category() {
        let mut payload = service_payload();
        payload["category"] = json!("video");
        assert!(parse_service(&payload).is_err());
    }

    #[test]
    fn rejects_wrong_type_for_url() {
        let mut payload = service_payload();
        payload["docs_url"] = json!(42);
        let err = parse_service(&payload).unwrap_err();
        assert!(err.to_string().contains("'docs_url'"));
    }

    #[test]
    fn password_like_fields_rejected_for_every_entity() {
        for base in [
            service_payload(),
            account_payload(),
            budget_payload(),
            recommendation_payload(),
        ] {
            let mut payload = base;
            payload
                .as_object_mut()
                .unwrap()
                .insert("password_hint".to_string(), json!("hunter2"));
            let results = [
                parse_service(&payload).err(),
                parse_account(&payload, &known_services()).err(),
                parse_budget(&payload, &known_accounts()).err(),
                parse_recommendation(&payload, &known_accounts(), &known_services()).err(),
            ];
            for err in results {
                assert!(matches!(err, Some(StoreError::Validation(_))));
            }
        }
    }

    #[test]
    fn parses_complete_account() {
        let account = parse_account(&account_payload(), &known_services()).unwrap();
        assert_eq!(account.status, AccountStatus::Active);
        assert_eq!(account.renewal_day, Some(5));
        assert_eq!(account.tags, vec!["work", "ide"]);
    }

    #[test]
    fn rejects_account_with_unknown_service() {
        let err = parse_account(&account_payload(), &[]).unwrap_err();
        assert!(err.to_string().contains("unknown service_id"));
    }

    #[test]
    fn rejects_bad_email() {
        let mut payload = account_payload();
        payload["email"] = json!("not-an-email");
        assert!(parse_account(&payload, &known_services()).is_err());
    }

    #[test]
    fn rejects_negative_cost() {
        let mut payload = account_payload();
        payload["monthly_cost_usd"] = json!(-1.0);
        assert!(parse_account(&payload, &known_services()).is_err());
    }

    #[test]
    fn rejects_renewal_day_out_of_range() {
        for bad in [json!(0), json!(32), json!(2.5), json!("5")] {
            let mut payload = account_payload();
            payload["renewal_day"] = bad;
            assert!(parse_account(&payload, &known_services()).is_err());
        }
    }

    #[test]
    fn null_renewal_day_is_unset() {
        let mut payload = account_payload();
        payload["renewal_day"] = json!(null);
        let account = parse_account(&payload, &known_services()).unwrap();
        assert_eq!(account.renewal_day, None);
    }

    #[test]
    fn rejects_non_string_tags() {
        let mut payload = account_payload();
        payload["tags"] = json!(["ok", 7]);
        assert!(parse_account(&payload, &known_services()).is_err());
    }

    #[test]
    fn rejects_threshold_above_100() {
        let mut payload = budget_payload();
        payload["alert_threshold_percent"] = json!(100.5);
        assert!(parse_budget(&payload, &known_accounts()).is_err());
    }

    #[test]
    fn rejects_budget_for_unknown_account() {
        let err = parse_budget(&budget_payload(), &[]).unwrap_err();
        assert!(err.to_string().contains("unknown account_id"));
    }

    #[test]
    fn recommendation_requires_a_target() {
        let mut payload = recommendation_payload();
        payload["account_id"] = json!(null);
        let err =
            parse_recommendation(&payload, &known_accounts(), &known_services()).unwrap_err();
        assert!(err.to_string().contains("either 'account_id' or 'service_id'"));
    }

    #[test]
    fn blank_reference_counts_as_unset() {
        let mut payload = recommendation_payload();
        payload["account_id"] = json!("");
        payload["service_id"] = json!("codepilot");
        let rec =
            parse_recommendation(&payload, &known_accounts(), &known_services()).unwrap();
        assert_eq!(rec.account_id, None);
        assert_eq!(rec.service_id.as_deref(), Some("codepilot"));
    }

    #[test]
    fn rejects_recommendation_with_unknown_references() {
        let mut payload = recommendation_payload();
        payload["account_id"] = json!("ghost");
        assert!(parse_recommendation(&payload, &known_accounts(), &known_services()).is_err());
    }

    proptest! {
        #[test]
        fn priority_outside_range_is_rejected(priority in any::<i64>()) {
            prop_assume!(!(1..=5).contains(&priority));
            let mut payload = recommendation_payload();
            payload["priority"] = json!(priority);
            let result =
                parse_recommendation(&payload, &known_accounts(), &known_services());
            prop_assert!(matches!(result, Err(StoreError::Validation(_))));
        }

        #[test]
        fn priority_in_range_is_accepted(priority in 1i64..=5) {
            let mut payload = recommendation_payload();
            payload["priority"] = json!(priority);
            let rec = parse_recommendation(&payload, &known_accounts(), &known_services())
                .unwrap();
            prop_assert_eq!(i64::from(rec.priority), priority);
        }
    }
}

mod errors;
mod paths;
mod store;
mod types;
mod validation;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;
use store::Store;
use types::{AccountStatus, ServiceCategory};

#[derive(Parser)]
#[command(name = "subwatch")]
#[command(about = "Personal tracker for AI-service subscriptions")]
#[command(version)]
struct Cli {
    /// Path to the JSON data file (defaults to ~/.subwatch/store.json)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage tracked services
    #[command(subcommand)]
    Service(ServiceCommand),
    /// Manage subscription accounts
    #[command(subcommand)]
    Account(AccountCommand),
    /// Manage monthly usage budgets
    #[command(subcommand)]
    Budget(BudgetCommand),
    /// Manage prioritized recommendations
    #[command(subcommand)]
    Recommendation(RecommendationCommand),
    /// Inspect, export, or replace the whole document
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print the spending dashboard summary
    Dashboard,
}

#[derive(Subcommand)]
enum ServiceCommand {
    /// List services, optionally filtered by category
    List {
        #[arg(long)]
        category: Option<String>,
    },
    /// Print one service as JSON
    Get { id: String },
    /// Create a service
    Add(ServiceForm),
    /// Update an existing service
    Update {
        /// Current id of the service
        target_id: String,
        #[command(flatten)]
        form: ServiceForm,
    },
    /// Delete a service (fails while an account still uses it)
    Rm { id: String },
}

#[derive(Subcommand)]
enum AccountCommand {
    /// List accounts, optionally filtered by category and/or status
    List {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        status: Option<String>,
    },
    /// Print one account as JSON
    Get { id: String },
    /// Create an account
    Add(AccountForm),
    /// Update an existing account
    Update {
        /// Current id of the account
        target_id: String,
        #[command(flatten)]
        form: AccountForm,
    },
    /// Delete an account (removes its budget and its recommendations)
    Rm { id: String },
}

#[derive(Subcommand)]
enum BudgetCommand {
    /// List usage budgets
    List,
    /// Print one budget as JSON
    Get { id: String },
    /// Create a budget (one per account)
    Add(BudgetForm),
    /// Update an existing budget
    Update {
        /// Current id of the budget
        target_id: String,
        #[command(flatten)]
        form: BudgetForm,
    },
    /// Delete a budget
    Rm { id: String },
}

#[derive(Subcommand)]
enum RecommendationCommand {
    /// List recommendations, highest priority first
    List,
    /// Print one recommendation as JSON
    Get { id: String },
    /// Create a recommendation
    Add(RecommendationForm),
    /// Update an existing recommendation
    Update {
        /// Current id of the recommendation
        target_id: String,
        #[command(flatten)]
        form: RecommendationForm,
    },
    /// Delete a recommendation
    Rm { id: String },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the whole document as JSON
    Show,
    /// Replace the whole document from a JSON file
    Import { file: PathBuf },
    /// Write the whole document to a JSON file
    Export {
        /// Output file (defaults to subwatch-export-<date>.json)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args)]
struct ServiceForm {
    #[arg(long)]
    id: String,
    #[arg(long)]
    name: String,
    /// One of: coding, art, music, general
    #[arg(long)]
    category: String,
    #[arg(long)]
    provider: String,
    #[arg(long)]
    website_url: String,
    #[arg(long)]
    docs_url: Option<String>,
    #[arg(long)]
    billing_url: Option<String>,
}

impl ServiceForm {
    fn into_payload(self) -> Value {
        json!({
            "id": self.id.trim(),
            "name": self.name.trim(),
            "category": self.category.trim(),
            "provider": self.provider.trim(),
            "website_url": self.website_url.trim(),
            "docs_url": blank_to_null(self.docs_url),
            "billing_url": blank_to_null(self.billing_url),
        })
    }
}

#[derive(Args)]
struct AccountForm {
    #[arg(long)]
    id: String,
    #[arg(long)]
    service_id: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    plan_name: String,
    #[arg(long)]
    monthly_cost_usd: f64,
    /// Day of month the subscription renews (1-31)
    #[arg(long)]
    renewal_day: Option<u32>,
    /// One of: active, paused, cancelled
    #[arg(long)]
    status: String,
    #[arg(long)]
    notes: Option<String>,
    /// Comma-separated tags
    #[arg(long)]
    tags: Option<String>,
}

impl AccountForm {
    fn into_payload(self) -> Value {
        json!({
            "id": self.id.trim(),
            "service_id": self.service_id.trim(),
            "email": self.email.trim(),
            "plan_name": self.plan_name.trim(),
            "monthly_cost_usd": self.monthly_cost_usd,
            "renewal_day": self.renewal_day,
            "status": self.status.trim(),
            "notes": self.notes.as_deref().unwrap_or("").trim(),
            "tags": split_tags(self.tags.as_deref().unwrap_or("")),
        })
    }
}

#[derive(Args)]
struct BudgetForm {
    #[arg(long)]
    id: String,
    #[arg(long)]
    account_id: String,
    #[arg(long)]
    monthly_budget_usd: f64,
    /// Alert once spend reaches this percentage of the budget (0-100)
    #[arg(long)]
    alert_threshold_percent: f64,
    #[arg(long)]
    current_month_spend_usd: f64,
}

impl BudgetForm {
    fn into_payload(self) -> Value {
        json!({
            "id": self.id.trim(),
            "account_id": self.account_id.trim(),
            "monthly_budget_usd": self.monthly_budget_usd,
            "alert_threshold_percent": self.alert_threshold_percent,
            "current_month_spend_usd": self.current_month_spend_usd,
        })
    }
}

#[derive(Args)]
struct RecommendationForm {
    #[arg(long)]
    id: String,
    #[arg(long)]
    account_id: Option<String>,
    #[arg(long)]
    service_id: Option<String>,
    #[arg(long)]
    title: String,
    #[arg(long)]
    body: String,
    /// 1 (highest) to 5 (lowest)
    #[arg(long)]
    priority: u8,
}

impl RecommendationForm {
    fn into_payload(self) -> Value {
        json!({
            "id": self.id.trim(),
            "account_id": blank_to_null(self.account_id),
            "service_id": blank_to_null(self.service_id),
            "title": self.title.trim(),
            "body": self.body.trim(),
            "priority": self.priority,
        })
    }
}

/// Splits a comma-separated tag string, dropping blanks.
fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

/// Blank or whitespace-only optional input becomes null.
fn blank_to_null(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_category(raw: &str) -> Result<ServiceCategory> {
    ServiceCategory::parse(raw)
        .with_context(|| format!("unknown category '{raw}' (expected coding, art, music, or general)"))
}

fn parse_status(raw: &str) -> Result<AccountStatus> {
    AccountStatus::parse(raw)
        .with_context(|| format!("unknown status '{raw}' (expected active, paused, or cancelled)"))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_service(store: &Store, command: ServiceCommand) -> Result<()> {
    match command {
        ServiceCommand::List { category } => {
            let category = category.as_deref().map(parse_category).transpose()?;
            print_json(&store.list_services(category)?)
        }
        ServiceCommand::Get { id } => {
            let service = store
                .get_service(&id)?
                .with_context(|| format!("service '{id}' not found"))?;
            print_json(&service)
        }
        ServiceCommand::Add(form) => print_json(&store.create_service(&form.into_payload())?),
        ServiceCommand::Update { target_id, form } => {
            print_json(&store.update_service(&target_id, &form.into_payload())?)
        }
        ServiceCommand::Rm { id } => Ok(store.delete_service(&id)?),
    }
}

fn run_account(store: &Store, command: AccountCommand) -> Result<()> {
    match command {
        AccountCommand::List { category, status } => {
            let category = category.as_deref().map(parse_category).transpose()?;
            let status = status.as_deref().map(parse_status).transpose()?;
            print_json(&store.list_accounts(category, status)?)
        }
        AccountCommand::Get { id } => {
            let account = store
                .get_account(&id)?
                .with_context(|| format!("account '{id}' not found"))?;
            print_json(&account)
        }
        AccountCommand::Add(form) => print_json(&store.create_account(&form.into_payload())?),
        AccountCommand::Update { target_id, form } => {
            print_json(&store.update_account(&target_id, &form.into_payload())?)
        }
        AccountCommand::Rm { id } => Ok(store.delete_account(&id)?),
    }
}

fn run_budget(store: &Store, command: BudgetCommand) -> Result<()> {
    match command {
        BudgetCommand::List => print_json(&store.list_budgets()?),
        BudgetCommand::Get { id } => {
            let budget = store
                .get_budget(&id)?
                .with_context(|| format!("budget '{id}' not found"))?;
            print_json(&budget)
        }
        BudgetCommand::Add(form) => print_json(&store.create_budget(&form.into_payload())?),
        BudgetCommand::Update { target_id, form } => {
            print_json(&store.update_budget(&target_id, &form.into_payload())?)
        }
        BudgetCommand::Rm { id } => Ok(store.delete_budget(&id)?),
    }
}

fn run_recommendation(store: &Store, command: RecommendationCommand) -> Result<()> {
    match command {
        RecommendationCommand::List => print_json(&store.list_recommendations()?),
        RecommendationCommand::Get { id } => {
            let rec = store
                .get_recommendation(&id)?
                .with_context(|| format!("recommendation '{id}' not found"))?;
            print_json(&rec)
        }
        RecommendationCommand::Add(form) => {
            print_json(&store.create_recommendation(&form.into_payload())?)
        }
        RecommendationCommand::Update { target_id, form } => {
            print_json(&store.update_recommendation(&target_id, &form.into_payload())?)
        }
        RecommendationCommand::Rm { id } => Ok(store.delete_recommendation(&id)?),
    }
}

fn run_config(store: &Store, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => print_json(&store.get_config()?),
        ConfigCommand::Import { file } => {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("failed to read import file: {}", file.display()))?;
            let payload: Value =
                serde_json::from_str(&raw).context("import file is not valid JSON")?;
            Ok(store.replace_config(&payload)?)
        }
        ConfigCommand::Export { out } => {
            let path = out.unwrap_or_else(|| {
                PathBuf::from(format!(
                    "subwatch-export-{}.json",
                    chrono::Local::now().format("%Y%m%d")
                ))
            });
            let document = store.get_config()?;
            fs::write(&path, serde_json::to_string_pretty(&document)?)
                .with_context(|| format!("failed to write export file: {}", path.display()))?;
            println!("exported {}", path.display());
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let data_path = match cli.data {
        Some(path) => path,
        None => paths::default_store_path()?,
    };
    let store = Store::open(data_path)?;

    match cli.command {
        Command::Service(command) => run_service(&store, command),
        Command::Account(command) => run_account(&store, command),
        Command::Budget(command) => run_budget(&store, command),
        Command::Recommendation(command) => run_recommendation(&store, command),
        Command::Config(command) => run_config(&store, command),
        Command::Dashboard => print_json(&store.dashboard_summary()?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_tags_drops_blanks() {
        assert_eq!(split_tags("work, ide , ,daily"), vec!["work", "ide", "daily"]);
        assert!(split_tags("").is_empty());
        assert!(split_tags(" , ").is_empty());
    }

    #[test]
    fn blank_to_null_trims() {
        assert_eq!(blank_to_null(Some("  ".to_string())), None);
        assert_eq!(blank_to_null(None), None);
        assert_eq!(
            blank_to_null(Some(" acct-1 ".to_string())),
            Some("acct-1".to_string())
        );
    }

    #[test]
    fn account_form_coerces_fields() {
        let form = AccountForm {
            id: " acct-1 ".to_string(),
            service_id: "codepilot".to_string(),
            email: "me@example.com".to_string(),
            plan_name: "Pro".to_string(),
            monthly_cost_usd: 17.0,
            renewal_day: None,
            status: "active".to_string(),
            notes: None,
            tags: Some("work,ide".to_string()),
        };
        let payload = form.into_payload();
        assert_eq!(payload["id"], "acct-1");
        assert_eq!(payload["renewal_day"], serde_json::Value::Null);
        assert_eq!(payload["notes"], "");
        assert_eq!(payload["tags"], serde_json::json!(["work", "ide"]));
    }
}

//! Command-line surface: argument tree and command handlers.
//!
//! Handlers gather raw arguments, turn them into envelopes, make at most one
//! API call and report the outcome through a [`Reporter`].

use std::fs;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;

use crate::client::{BASE_URL, ClientConfig, JirafeClient};
use crate::error::{CONFIGURE_HINT, Error, Result};
use crate::event;
use crate::settings::{SettingKey, SettingsStore, mask_token};
use crate::types::{
    BatchEnvelope, CartData, Envelope, EventData, OrderData, PageView, Params, ProductData,
    UserData, json_kind,
};
use crate::ui::{Reporter, with_spinner};

/// Jirafe Events CLI - Analytics and event tracking from your terminal
#[derive(Parser, Debug)]
#[command(name = "jirafe", version, about, arg_required_else_help = true)]
pub struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true, env = "JIRAFE_CONFIG")]
    pub config: Option<PathBuf>,

    /// API base URL
    #[arg(long, global = true, env = "JIRAFE_BASE_URL", default_value = BASE_URL)]
    pub base_url: String,

    /// Log requests to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::with_base_url(self.base_url.clone())
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage CLI configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Track events
    #[command(subcommand)]
    Track(TrackCommand),
    /// Fetch analytics for the configured site
    Analytics(QueryArgs),
    /// Fetch aggregate stats for the configured site
    Stats(QueryArgs),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Set configuration values
    Set {
        /// Jirafe site ID
        #[arg(long)]
        site_id: Option<String>,
        /// API token
        #[arg(long)]
        token: Option<String>,
    },
    /// Show current configuration
    Show,
    /// Remove the stored site ID and token
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum TrackCommand {
    /// Track a page view
    Pageview {
        url: String,
        /// Page title
        #[arg(long)]
        title: Option<String>,
        /// Referrer URL
        #[arg(long)]
        referrer: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Track product event (view, add_to_cart, purchase)
    Product {
        action: String,
        product_id: String,
        /// Product name
        #[arg(long)]
        name: Option<String>,
        /// Product price
        #[arg(long, value_parser = parse_finite)]
        price: Option<f64>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Track cart event (add, remove, checkout)
    Cart {
        action: String,
        /// Cart items as JSON
        #[arg(long)]
        items: Option<String>,
        /// Cart total
        #[arg(long, value_parser = parse_finite)]
        total: Option<f64>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Track an order/purchase
    Order {
        order_id: String,
        /// Order total
        #[arg(long, value_parser = parse_finite)]
        total: Option<f64>,
        /// Order items as JSON
        #[arg(long)]
        items: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Track user event (login, signup, update)
    User {
        action: String,
        user_id: String,
        /// User email
        #[arg(long)]
        email: Option<String>,
        /// User name
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Track custom event with JSON data
    Custom {
        event_type: String,
        /// Event fields as a JSON object
        data: String,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Submit a JSON array of events in a single call
    Batch {
        /// Events as a JSON array
        #[arg(required_unless_present = "file", conflicts_with = "file")]
        events: Option<String>,
        /// Read the JSON array from a file
        #[arg(long)]
        file: Option<PathBuf>,
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct QueryArgs {
    /// Query parameter, repeatable (e.g. --param from=2024-01-01)
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub params: Vec<(String, String)>,
}

impl QueryArgs {
    pub fn to_params(&self) -> Params {
        self.params
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect()
    }
}

fn parse_key_val(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

/// A number that serializes as a JSON number: NaN and infinities are refused.
fn parse_finite(raw: &str) -> std::result::Result<f64, String> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        Ok(_) => Err(format!("expected a finite number, got '{}'", raw)),
        Err(e) => Err(format!("invalid number '{}': {}", raw, e)),
    }
}

/// What a track command will submit, and how to talk about it.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPlan {
    pub progress: String,
    pub success: String,
    pub output: OutputArgs,
    pub submission: Submission,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Event(Envelope),
    Batch(BatchEnvelope),
}

impl TrackCommand {
    /// Normalize the raw arguments into the payload to send.
    pub fn plan(self) -> Result<TrackPlan> {
        let plan = match self {
            Self::Pageview {
                url,
                title,
                referrer,
                output,
            } => TrackPlan {
                progress: "Tracking page view...".into(),
                success: "Page view tracked".into(),
                output,
                submission: Submission::Event(event::build_page_view(PageView {
                    url,
                    title,
                    referrer,
                })),
            },
            Self::Product {
                action,
                product_id,
                name,
                price,
                output,
            } => TrackPlan {
                progress: format!("Tracking product {}...", action),
                success: format!("Product {} tracked", action),
                output,
                submission: Submission::Event(event::build_product_event(
                    &action,
                    ProductData {
                        product_id,
                        name,
                        price,
                    },
                )),
            },
            Self::Cart {
                action,
                items,
                total,
                output,
            } => {
                let items = items.as_deref().map(parse_items).transpose()?;
                TrackPlan {
                    progress: format!("Tracking cart {}...", action),
                    success: format!("Cart {} tracked", action),
                    output,
                    submission: Submission::Event(event::build_cart_event(
                        &action,
                        CartData { total, items },
                    )),
                }
            }
            Self::Order {
                order_id,
                total,
                items,
                output,
            } => {
                let items = items.as_deref().map(parse_items).transpose()?;
                TrackPlan {
                    progress: "Tracking order...".into(),
                    success: "Order tracked".into(),
                    output,
                    submission: Submission::Event(event::build_order_event(OrderData {
                        order_id,
                        total,
                        items,
                    })),
                }
            }
            Self::User {
                action,
                user_id,
                email,
                name,
                output,
            } => TrackPlan {
                progress: format!("Tracking user {}...", action),
                success: format!("User {} tracked", action),
                output,
                submission: Submission::Event(event::build_user_event(
                    &action,
                    UserData {
                        user_id,
                        email,
                        name,
                    },
                )),
            },
            Self::Custom {
                event_type,
                data,
                output,
            } => {
                let data = EventData::from_json_str(&data)?;
                TrackPlan {
                    progress: format!("Tracking {}...", event_type),
                    success: "Custom event tracked".into(),
                    output,
                    submission: Submission::Event(event::build_custom_event(event_type, data)),
                }
            }
            Self::Batch {
                events,
                file,
                output,
            } => {
                let raw = match (events, file) {
                    (Some(raw), _) => raw,
                    (None, Some(path)) => fs::read_to_string(&path).map_err(|e| {
                        Error::InvalidData(format!("failed to read {}: {}", path.display(), e))
                    })?,
                    (None, None) => {
                        return Err(Error::InvalidData("no events given".into()));
                    }
                };
                let batch = parse_batch(&raw)?;
                TrackPlan {
                    progress: format!("Tracking batch of {} events...", batch.len()),
                    success: format!("Batch of {} events tracked", batch.len()),
                    output,
                    submission: Submission::Batch(batch),
                }
            }
        };
        Ok(plan)
    }
}

/// `--items` must be a JSON array or object
fn parse_items(raw: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(raw)?;
    match value {
        Value::Array(_) | Value::Object(_) => Ok(value),
        other => Err(Error::InvalidData(format!(
            "items must be a JSON array or object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Parse a JSON array of envelopes, each an object with a string `type`.
pub fn parse_batch(raw: &str) -> Result<BatchEnvelope> {
    let value: Value = serde_json::from_str(raw)?;
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(Error::InvalidData(format!(
                "batch must be a JSON array, got {}",
                json_kind(&other)
            )));
        }
    };

    let events = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let mut fields = match item {
                Value::Object(map) => EventData::from(map),
                other => {
                    return Err(Error::InvalidData(format!(
                        "event {}: expected a JSON object, got {}",
                        index,
                        json_kind(&other)
                    )));
                }
            };
            match fields.remove("type") {
                Some(Value::String(kind)) => Ok(event::build_event(kind, fields)),
                _ => Err(Error::InvalidData(format!(
                    "event {}: missing string field 'type'",
                    index
                ))),
            }
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(event::build_batch(events))
}

/// Run one command to completion. Returns false when the command failed;
/// the failure has already been reported.
pub async fn run(
    command: Command,
    client_config: ClientConfig,
    store: &mut dyn SettingsStore,
    reporter: &mut dyn Reporter,
) -> bool {
    match command {
        Command::Config(action) => run_config(action, store, reporter),
        Command::Track(track) => {
            let Some(client) = connect(client_config, &*store, reporter) else {
                return false;
            };
            let plan = match track.plan() {
                Ok(plan) => plan,
                Err(e) => {
                    reporter.failure(&e.to_string());
                    return false;
                }
            };
            let result = with_spinner(reporter, &plan.progress, async {
                match &plan.submission {
                    Submission::Event(envelope) => client.track_event(envelope).await,
                    Submission::Batch(batch) => client.track_batch(batch).await,
                }
            })
            .await;
            report_tracked(result, &plan, reporter)
        }
        Command::Analytics(query) => {
            let Some(client) = connect(client_config, &*store, reporter) else {
                return false;
            };
            let params = query.to_params();
            let result =
                with_spinner(reporter, "Fetching analytics...", client.get_analytics(&params))
                    .await;
            report_json(result, reporter)
        }
        Command::Stats(query) => {
            let Some(client) = connect(client_config, &*store, reporter) else {
                return false;
            };
            let params = query.to_params();
            let result =
                with_spinner(reporter, "Fetching stats...", client.get_stats(&params)).await;
            report_json(result, reporter)
        }
    }
}

/// Configuration gate: build a client only when both credentials are present.
fn connect(
    client_config: ClientConfig,
    store: &dyn SettingsStore,
    reporter: &mut dyn Reporter,
) -> Option<JirafeClient> {
    if !store.is_configured() {
        reporter.failure("Not configured.");
        reporter.info("\nRun the following to configure:");
        reporter.info(&format!("  {}", CONFIGURE_HINT));
        return None;
    }

    match JirafeClient::with_config(&store.credentials(), client_config) {
        Ok(client) => Some(client),
        Err(e) => {
            reporter.failure(&e.to_string());
            None
        }
    }
}

fn report_tracked(result: Result<Value>, plan: &TrackPlan, reporter: &mut dyn Reporter) -> bool {
    match result {
        Ok(response) => {
            if plan.output.json {
                reporter.json(&response);
            } else {
                reporter.success(&plan.success);
            }
            true
        }
        Err(e) => {
            reporter.failure(&e.to_string());
            false
        }
    }
}

fn report_json(result: Result<Value>, reporter: &mut dyn Reporter) -> bool {
    match result {
        Ok(response) => {
            reporter.json(&response);
            true
        }
        Err(e) => {
            reporter.failure(&e.to_string());
            false
        }
    }
}

fn run_config(
    action: ConfigCommand,
    store: &mut dyn SettingsStore,
    reporter: &mut dyn Reporter,
) -> bool {
    let result = match action {
        ConfigCommand::Set { site_id, token } => {
            let site_id = site_id.filter(|value| !value.is_empty());
            let token = token.filter(|value| !value.is_empty());
            if site_id.is_none() && token.is_none() {
                reporter.failure("No options provided. Use --site-id or --token");
                return false;
            }
            set_values(store, reporter, site_id.as_deref(), token.as_deref())
        }
        ConfigCommand::Show => {
            show_values(&*store, reporter);
            Ok(())
        }
        ConfigCommand::Clear => store.clear().map(|()| reporter.success("Configuration cleared")),
    };

    match result {
        Ok(()) => true,
        Err(e) => {
            reporter.failure(&format!("{:#}", e));
            false
        }
    }
}

fn set_values(
    store: &mut dyn SettingsStore,
    reporter: &mut dyn Reporter,
    site_id: Option<&str>,
    token: Option<&str>,
) -> anyhow::Result<()> {
    if let Some(site_id) = site_id {
        store.set(SettingKey::SiteId, site_id)?;
        reporter.success("Site ID set");
    }
    if let Some(token) = token {
        store.set(SettingKey::ApiToken, token)?;
        reporter.success("API token set");
    }
    Ok(())
}

fn show_values(store: &dyn SettingsStore, reporter: &mut dyn Reporter) {
    let site_id = store.get(SettingKey::SiteId);
    let token = store.get(SettingKey::ApiToken);
    let or_not_set = |value: String| if value.is_empty() { "not set".to_string() } else { value };

    reporter.info("\nJirafe CLI Configuration\n");
    reporter.info(&format!("Site ID:  {}", or_not_set(site_id)));
    reporter.info(&format!("Token:    {}", or_not_set(mask_token(&token))));
    reporter.info("");
}

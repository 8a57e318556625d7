use std::{env, fmt::Display, str::FromStr};

use chrono::Duration;
use log::*;
use marketplace_engine::mkt_api::order_flow_api::DEFAULT_LOW_STOCK_THRESHOLD;
use mkt_common::parse_boolean_flag;

const DEFAULT_MKT_HOST: &str = "127.0.0.1";
const DEFAULT_MKT_PORT: u16 = 8470;
const DEFAULT_APPROVAL_RATE: f64 = 0.9;
const DEFAULT_UNPAID_ORDER_TIMEOUT: Duration = Duration::hours(48);
const DEFAULT_MAX_CONNECTIONS: u32 = 25;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    /// The fraction of payments the simulated settlement gateway approves, between 0 and 1.
    pub approval_rate: f64,
    /// A product at or below this many units after a sale triggers a low-stock notification.
    pub low_stock_threshold: i64,
    /// Pending orders that have not changed for this long are cancelled and their stock is released.
    pub unpaid_order_timeout: Duration,
    /// If true, the schema is brought up to date when the server starts.
    pub run_migrations: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MKT_HOST.to_string(),
            port: DEFAULT_MKT_PORT,
            database_url: String::default(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            approval_rate: DEFAULT_APPROVAL_RATE,
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            unpaid_order_timeout: DEFAULT_UNPAID_ORDER_TIMEOUT,
            run_migrations: true,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("MKT_HOST").ok().unwrap_or_else(|| DEFAULT_MKT_HOST.into());
        let port = parse_or_default("MKT_PORT", env::var("MKT_PORT").ok(), DEFAULT_MKT_PORT);
        let database_url = env::var("MKT_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ MKT_DATABASE_URL is not set. Please set it to the URL for the marketplace database.");
            String::default()
        });
        let max_connections =
            parse_or_default("MKT_MAX_CONNECTIONS", env::var("MKT_MAX_CONNECTIONS").ok(), DEFAULT_MAX_CONNECTIONS);
        let approval_rate = approval_rate(env::var("MKT_SETTLEMENT_APPROVAL_RATE").ok());
        let low_stock_threshold = parse_or_default(
            "MKT_LOW_STOCK_THRESHOLD",
            env::var("MKT_LOW_STOCK_THRESHOLD").ok(),
            DEFAULT_LOW_STOCK_THRESHOLD,
        );
        let unpaid_order_timeout = unpaid_order_timeout(env::var("MKT_UNPAID_ORDER_TIMEOUT").ok());
        let run_migrations = parse_boolean_flag(env::var("MKT_RUN_MIGRATIONS").ok(), true);
        Self {
            host,
            port,
            database_url,
            max_connections,
            approval_rate,
            low_stock_threshold,
            unpaid_order_timeout,
            run_migrations,
        }
    }
}

fn parse_or_default<T>(name: &str, value: Option<String>, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match value {
        None => default,
        Some(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
    }
}

fn approval_rate(value: Option<String>) -> f64 {
    let rate = parse_or_default("MKT_SETTLEMENT_APPROVAL_RATE", value, DEFAULT_APPROVAL_RATE);
    if (0.0..=1.0).contains(&rate) {
        rate
    } else {
        warn!(
            "🪛️ MKT_SETTLEMENT_APPROVAL_RATE must be between 0 and 1, but was {rate}. Using the default, \
             {DEFAULT_APPROVAL_RATE}, instead."
        );
        DEFAULT_APPROVAL_RATE
    }
}

fn unpaid_order_timeout(value: Option<String>) -> Duration {
    if value.is_none() {
        info!(
            "🪛️ MKT_UNPAID_ORDER_TIMEOUT is not set. Using the default value of {} hrs.",
            DEFAULT_UNPAID_ORDER_TIMEOUT.num_hours()
        );
    }
    let hours = parse_or_default("MKT_UNPAID_ORDER_TIMEOUT", value, DEFAULT_UNPAID_ORDER_TIMEOUT.num_hours());
    if hours > 0 {
        Duration::hours(hours)
    } else {
        warn!("🪛️ MKT_UNPAID_ORDER_TIMEOUT must be positive. Using the default value.");
        DEFAULT_UNPAID_ORDER_TIMEOUT
    }
}

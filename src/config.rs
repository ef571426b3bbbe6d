use std::env;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::domain::order::money::DEFAULT_TAX_RATE;
use crate::utils::RetryConfig;

/// Order-core settings fixed per deployment.
#[derive(Debug, Clone)]
pub struct OrderSettings {
    /// Applied to the subtotal of every new order.
    pub tax_rate: Decimal,
    /// Used when a checkout does not name a currency.
    pub currency: String,
    pub order_number_prefix: String,
    pub order_number_retry: RetryConfig,
}

impl Default for OrderSettings {
    fn default() -> Self {
        Self {
            tax_rate: DEFAULT_TAX_RATE,
            currency: "SAR".to_string(),
            order_number_prefix: "ORD".to_string(),
            order_number_retry: RetryConfig::order_number(),
        }
    }
}

/// Process configuration, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Without a database the service runs on the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub metrics_port: u16,
    pub orders: OrderSettings,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = OrderSettings::default();

        let tax_rate = parse_var("ORDER_TAX_RATE", defaults.tax_rate)?;
        if tax_rate.is_sign_negative() || tax_rate > Decimal::ONE {
            anyhow::bail!("ORDER_TAX_RATE must be a fraction between 0 and 1, got {tax_rate}");
        }

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 10)?,
            metrics_port: parse_var("METRICS_PORT", 9090)?,
            orders: OrderSettings {
                tax_rate,
                currency: env::var("ORDER_CURRENCY").unwrap_or(defaults.currency),
                order_number_prefix: env::var("ORDER_NUMBER_PREFIX").unwrap_or(defaults.order_number_prefix),
                order_number_retry: defaults.order_number_retry,
            },
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid value for {name}: {e}")),
        Err(_) => Ok(default),
    }
}

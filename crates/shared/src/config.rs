//! Application configuration management.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Background worker pool configuration.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Overdue interest accrual configuration.
    #[serde(default)]
    pub accrual: AccrualConfig,
    /// Payment schedule offsets.
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Background worker pool configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Number of worker tasks draining the queue.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Maximum number of buffered tasks before new ones are dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    1024
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Overdue interest accrual configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AccrualConfig {
    /// Simple annual interest rate applied to overdue principal (0.12 = 12%).
    #[serde(default = "default_annual_rate")]
    pub annual_rate: Decimal,
    /// Seconds between accrual runs.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Whether to run once immediately at start-up.
    #[serde(default = "default_run_on_start")]
    pub run_on_start: bool,
}

fn default_annual_rate() -> Decimal {
    Decimal::new(12, 2)
}

fn default_interval_secs() -> u64 {
    86_400 // daily
}

fn default_run_on_start() -> bool {
    true
}

impl Default for AccrualConfig {
    fn default() -> Self {
        Self {
            annual_rate: default_annual_rate(),
            interval_secs: default_interval_secs(),
            run_on_start: default_run_on_start(),
        }
    }
}

/// Day offsets (from approval) for the one-off payments of a schedule.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Days until the reservation payment is due.
    #[serde(default = "default_reservation_due_days")]
    pub reservation_due_days: i64,
    /// Days until the down payment is due when there is no reservation.
    #[serde(default = "default_down_payment_due_days")]
    pub down_payment_due_days: i64,
    /// Days until the down payment is due when a reservation precedes it.
    #[serde(default = "default_down_payment_after_reservation_days")]
    pub down_payment_after_reservation_days: i64,
}

fn default_reservation_due_days() -> i64 {
    7
}

fn default_down_payment_due_days() -> i64 {
    14
}

fn default_down_payment_after_reservation_days() -> i64 {
    21
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            reservation_due_days: default_reservation_due_days(),
            down_payment_due_days: default_down_payment_due_days(),
            down_payment_after_reservation_days: default_down_payment_after_reservation_days(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("PARCELA").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

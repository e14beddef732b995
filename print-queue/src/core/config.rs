use chrono_tz::Tz;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;

/// Store latency allowed around one print before its lease may expire
pub const LEASE_MARGIN: Duration = Duration::from_secs(2);

/// Shop details printed on every receipt
#[derive(Debug, Clone)]
pub struct ShopInfo {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub website: String,
}

impl Default for ShopInfo {
    fn default() -> Self {
        Self {
            name: "GELATERIA VICANTO".into(),
            address: "Via Roma 1, Bergamo".into(),
            phone: "Tel. 035 000000".into(),
            website: "www.gelateriavicanto.it".into(),
        }
    }
}

/// Print-queue process configuration
///
/// # Environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | DATABASE_PATH | vicanto.db | SQLite file |
/// | POLL_INTERVAL_MS | 500 | Watcher poll interval |
/// | WATCHER_INSTANCES | 1 | Watchers in this process |
/// | PRINTER_ADDR | 192.168.1.100:9100 | Network thermal printer |
/// | PRINTER_TIMEOUT_MS | 5000 | Bound on one print call |
/// | PRINTER_MOCK | false | Use the mock printer |
/// | PRINTER_MOCK_DELAY_MS | 500 | Mock print time |
/// | PAPER_WIDTH | 48 | Characters per line |
/// | HEALTH_INTERVAL_SECS | 30 | Health probe interval |
/// | EVENT_HUB_ADDR | 127.0.0.1:3000 | Real-time hub |
/// | EVENT_HUB_TOKEN | - | Hub token; unset disables notifications |
/// | RECONNECT_DELAY_MS | 1000 | Hub reconnection delay |
/// | LEASE_TIMEOUT_SECS | - | Reclaim stuck `printing` jobs after this |
/// | COVER_PRICE | 1.00 | Per-cover price |
/// | TIMEZONE | Europe/Rome | Receipt time zone |
/// | SHOP_NAME / SHOP_ADDRESS / SHOP_PHONE / SHOP_WEBSITE | - | Receipt header/footer |
/// | LOG_LEVEL / LOG_JSON / LOG_DIR | info / false / - | Logging |
///
/// Unparseable values fall back to the default. A lease must exceed the
/// print bound by [`LEASE_MARGIN`], see [`Config::effective_lease`].
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub poll_interval: Duration,
    pub watcher_instances: usize,

    pub printer_addr: String,
    pub printer_timeout: Duration,
    pub printer_mock: bool,
    pub mock_delay: Duration,
    pub paper_width: usize,
    pub health_interval: Duration,

    pub event_hub_addr: String,
    pub event_hub_token: Option<String>,
    pub reconnect_delay: Duration,

    /// `None` keeps stuck jobs in `printing` until an operator acts
    pub lease_timeout: Option<Duration>,

    pub cover_price: Decimal,
    pub timezone: Tz,
    pub shop: ShopInfo,

    pub log_level: String,
    pub log_json: bool,
    pub log_dir: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let shop_default = ShopInfo::default();
        Self {
            database_path: var_or("DATABASE_PATH", "vicanto.db"),
            poll_interval: Duration::from_millis(parse_or("POLL_INTERVAL_MS", 500)),
            watcher_instances: parse_or::<usize>("WATCHER_INSTANCES", 1).max(1),

            printer_addr: var_or("PRINTER_ADDR", "192.168.1.100:9100"),
            printer_timeout: Duration::from_millis(parse_or("PRINTER_TIMEOUT_MS", 5000)),
            printer_mock: parse_or("PRINTER_MOCK", false),
            mock_delay: Duration::from_millis(parse_or("PRINTER_MOCK_DELAY_MS", 500)),
            paper_width: parse_or("PAPER_WIDTH", 48),
            health_interval: Duration::from_secs(parse_or("HEALTH_INTERVAL_SECS", 30)),

            event_hub_addr: var_or("EVENT_HUB_ADDR", "127.0.0.1:3000"),
            event_hub_token: std::env::var("EVENT_HUB_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
            reconnect_delay: Duration::from_millis(parse_or("RECONNECT_DELAY_MS", 1000)),

            lease_timeout: std::env::var("LEASE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs),

            cover_price: parse_or("COVER_PRICE", Decimal::ONE),
            timezone: parse_or("TIMEZONE", chrono_tz::Europe::Rome),
            shop: ShopInfo {
                name: var_or("SHOP_NAME", &shop_default.name),
                address: var_or("SHOP_ADDRESS", &shop_default.address),
                phone: var_or("SHOP_PHONE", &shop_default.phone),
                website: var_or("SHOP_WEBSITE", &shop_default.website),
            },

            log_level: var_or("LOG_LEVEL", "info"),
            log_json: parse_or("LOG_JSON", false),
            log_dir: std::env::var("LOG_DIR").ok().filter(|d| !d.is_empty()),
        }
    }

    /// Longest one print call can keep a job in `printing`
    pub fn print_bound(&self) -> Duration {
        if self.printer_mock {
            self.mock_delay
        } else {
            self.printer_timeout
        }
    }

    /// Lease the watchers may use, `None` when unset or too short
    ///
    /// A lease within one print bound plus [`LEASE_MARGIN`] could reclaim
    /// a job that is still printing and print it twice; it is dropped
    /// with a warning.
    pub fn effective_lease(&self) -> Option<Duration> {
        let lease = self.lease_timeout?;
        let min = self.print_bound() + LEASE_MARGIN;
        if lease <= min {
            tracing::warn!(
                lease_ms = lease.as_millis() as u64,
                min_ms = min.as_millis() as u64,
                "LEASE_TIMEOUT_SECS does not exceed the print timeout, lease disabled"
            );
            return None;
        }
        Some(lease)
    }

    /// Mock-printer configuration on a given database (tests, demos)
    pub fn for_mock(database_path: impl Into<String>) -> Self {
        let mut config = Self::from_env();
        config.database_path = database_path.into();
        config.printer_mock = true;
        config.mock_delay = Duration::from_millis(10);
        config.poll_interval = Duration::from_millis(50);
        config.event_hub_token = None;
        config
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

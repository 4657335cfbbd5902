use crate::error::{PriceError, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub parsing: ParseGeometry,
    #[serde(default)]
    pub locale: LocaleFormat,
}

/// Transport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

/// Where the price sheet is published
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Absolute URL of the HTML listing page.
    #[serde(default)]
    pub fetch_url: String,

    /// XPath selecting the download link; may call `matches(value, pattern)`.
    #[serde(default)]
    pub pdf_link_xpath: String,
}

/// Row clustering thresholds, in PDF user-space units.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ParseGeometry {
    /// Tokens whose top edge is above this are header band, not table.
    #[serde(default = "default_unset")]
    pub max_row_top_y: i32,

    /// A vertical drop larger than this starts a new row.
    #[serde(default = "default_unset")]
    pub min_row_top_y_delta: i32,
}

/// Number and date conventions of the published sheet. Fixed here instead of
/// taken from the process locale so parsing is identical on every host.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct LocaleFormat {
    #[serde(default = "default_decimal_separator")]
    pub decimal_separator: char,

    #[serde(default = "default_group_separator")]
    pub group_separator: char,

    /// Two-digit years map into the century window ending at this year.
    #[serde(default = "default_two_digit_year_max")]
    pub two_digit_year_max: i32,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    "price-sheet-tracker/0.1".to_string()
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    500
}
fn default_unset() -> i32 {
    -1
}
fn default_decimal_separator() -> char {
    ','
}
fn default_group_separator() -> char {
    '.'
}
fn default_two_digit_year_max() -> i32 {
    2049
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

impl Default for ParseGeometry {
    fn default() -> Self {
        Self {
            max_row_top_y: default_unset(),
            min_row_top_y_delta: default_unset(),
        }
    }
}

impl Default for LocaleFormat {
    fn default() -> Self {
        Self {
            decimal_separator: default_decimal_separator(),
            group_separator: default_group_separator(),
            two_digit_year_max: default_two_digit_year_max(),
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("AVIA").separator("__"))
            .build()
            .map_err(|e| PriceError::InvalidConfig(e.to_string()))?;

        let app_cfg: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| PriceError::InvalidConfig(e.to_string()))?;
        Ok(app_cfg)
    }

    pub fn validate(&self) -> Result<()> {
        self.source.page_url()?;
        if self.source.pdf_link_xpath.trim().is_empty() {
            return Err(PriceError::InvalidConfig("pdf_link_xpath is empty".into()));
        }
        self.validate_parsing()
    }

    /// The subset needed to parse a PDF without going online.
    pub fn validate_parsing(&self) -> Result<()> {
        if self.parsing.max_row_top_y < 0 || self.parsing.min_row_top_y_delta < 0 {
            return Err(PriceError::InvalidConfig(format!(
                "parsing thresholds must be configured (max_row_top_y={}, min_row_top_y_delta={})",
                self.parsing.max_row_top_y, self.parsing.min_row_top_y_delta
            )));
        }
        if self.locale.decimal_separator == self.locale.group_separator {
            return Err(PriceError::InvalidConfig(format!(
                "decimal and group separator are both '{}'",
                self.locale.decimal_separator
            )));
        }
        Ok(())
    }
}

impl SourceConfig {
    pub fn page_url(&self) -> Result<Url> {
        match Url::parse(&self.fetch_url) {
            Ok(url) if url.has_host() => Ok(url),
            _ => Err(PriceError::InvalidConfig(format!(
                "failed to parse fetch url '{}' from configuration",
                self.fetch_url
            ))),
        }
    }
}

//! Core domain types for footfall
//!
//! These types form the canonical data model shared by the capture pipeline
//! (Layer 0), the storage layer (Layer 1), and the aggregation engine
//! (Layer 2).
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Channel** | An isolated logical storefront in a multi-tenant deployment, identified by a channel token |
//! | **Signal** | What the host middleware hands us per inbound request (address, user agent, optional payload) |
//! | **RawEvent** | An accepted signal reduced to the fields the anonymizer needs; in-memory only |
//! | **AnonymizedRecord** | The persisted form of a RawEvent: salted hash instead of identity |
//! | **Visit** | A reconstructed period of continuous activity by one pseudonymous client |
//! | **Order** | A placed order loaded from the host shop system, never stored here |
//! | **MetricSummary** | One chart: labels per month, one or more named series |
//!
//! ### Identity handling
//!
//! Client identity (address + user agent) exists only inside [`RawEvent`]
//! and dies with the batch. Everything persisted or derived downstream keys
//! on the pseudonymous id, a salted hash rotated daily. Nothing in Layer 1
//! or Layer 2 can be joined back to a real client once the salt has rotated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================
// Inbound request signals
// ============================================

/// What the host's middleware hands us for each inbound request.
///
/// Only the recording policy ever sees the payload `body`; once a signal is
/// accepted it is reduced to a [`RawEvent`] and the body is discarded.
#[derive(Debug, Clone)]
pub struct RequestSignal {
    /// Client network address as reported by the host (IP, possibly proxied)
    pub client_address: String,
    /// Raw user agent header value
    pub user_agent: String,
    /// Channel token identifying the storefront this request hit
    pub channel_token: String,
    /// Optional JSON request payload, used only for introspection filtering
    pub body: Option<serde_json::Value>,
}

/// An accepted request, queued for anonymization.
///
/// Ephemeral: lives in the capture channel until a batch is flushed, then is
/// consumed by the anonymizer. Never persisted in this form.
#[derive(Debug, Clone)]
pub struct RawEvent {
    /// Client network address
    pub client_address: String,
    /// Raw user agent header value
    pub user_agent: String,
    /// Channel token of the storefront
    pub channel_token: String,
    /// When the request was observed (request time, not flush time)
    pub received_at: DateTime<Utc>,
}

impl RawEvent {
    /// Reduce an accepted signal to the fields the anonymizer needs.
    pub fn from_signal(signal: &RequestSignal, received_at: DateTime<Utc>) -> Self {
        Self {
            client_address: signal.client_address.clone(),
            user_agent: signal.user_agent.clone(),
            channel_token: signal.channel_token.clone(),
            received_at,
        }
    }
}

// ============================================
// Device classification
// ============================================

/// Coarse device class derived from the user agent string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Mobile,
    Tablet,
    Desktop,
    Unknown,
}

impl DeviceType {
    /// Returns the identifier used in database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Mobile => "mobile",
            DeviceType::Tablet => "tablet",
            DeviceType::Desktop => "desktop",
            DeviceType::Unknown => "unknown",
        }
    }

    /// Returns the display name used for chart legends
    pub fn display_name(&self) -> &'static str {
        match self {
            DeviceType::Mobile => "Mobile",
            DeviceType::Tablet => "Tablet",
            DeviceType::Desktop => "Desktop",
            DeviceType::Unknown => "Unknown",
        }
    }

    /// Classify a user agent by substring inspection.
    ///
    /// Markers are checked in order: mobile, tablet, desktop. Anything
    /// without a recognized marker lands in [`DeviceType::Unknown`].
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent.to_ascii_lowercase();
        if ua.contains("mobile") {
            DeviceType::Mobile
        } else if ua.contains("tablet") {
            DeviceType::Tablet
        } else if ua.contains("desktop") {
            DeviceType::Desktop
        } else {
            DeviceType::Unknown
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DeviceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mobile" => Ok(DeviceType::Mobile),
            "tablet" => Ok(DeviceType::Tablet),
            "desktop" => Ok(DeviceType::Desktop),
            "unknown" => Ok(DeviceType::Unknown),
            _ => Err(format!("unknown device type: {}", s)),
        }
    }
}

// ============================================
// Anonymized records
// ============================================

/// The persisted trace of one accepted request.
///
/// Immutable once written; bulk-deleted by the retention sweeper when
/// `created_at` falls strictly before the retention cutoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnonymizedRecord {
    /// Database ID (auto-incremented)
    pub id: i64,
    /// Salted hash standing in for the client identity
    pub pseudonymous_id: String,
    /// Device class at capture time
    pub device_type: DeviceType,
    /// Channel token of the storefront
    pub channel_token: String,
    /// Request time carried over from the RawEvent
    pub created_at: DateTime<Utc>,
}

/// The rotating secret used to salt pseudonymous ids.
///
/// Stored as a singleton row; replaced whenever its age exceeds 24 hours.
/// Records hashed under a superseded salt stay valid historical identifiers
/// and are never re-hashed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaltRecord {
    /// The secret itself
    pub salt: String,
    /// When this salt was generated
    pub updated_at: DateTime<Utc>,
}

// ============================================
// Visits
// ============================================

/// A reconstructed period of continuous activity by one pseudonymous client.
///
/// Derived transiently from anonymized records; never persisted. Every
/// record inside a visit lies within the session gap of the VISIT START
/// (fixed window, not a sliding one).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    /// Pseudonymous id shared by all records in this visit
    pub pseudonymous_id: String,
    /// Device class of the first record in the visit
    pub device_type: DeviceType,
    /// Timestamp of the first record
    pub started_at: DateTime<Utc>,
    /// Timestamp of the last record merged into this visit
    pub ended_at: DateTime<Utc>,
}

// ============================================
// Orders (loaded from the host shop system)
// ============================================

/// One line of an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    /// Quantity purchased
    pub quantity: i64,
    /// Product variant this line refers to
    pub product_variant_id: String,
}

/// A placed order as exposed by the host's order repository.
///
/// Money amounts are in minor currency units (cents), matching how the host
/// shop system stores them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Host-side order identifier
    pub id: String,
    /// Order total including tax, in minor units
    pub total_with_tax: i64,
    /// Order total excluding tax, in minor units
    pub total: i64,
    /// When the order was placed; absent for orders still settling
    pub order_placed_at: Option<DateTime<Utc>>,
    /// Last mutation timestamp, used as placement fallback
    pub updated_at: DateTime<Utc>,
    /// Order lines with variant references
    pub lines: Vec<OrderLine>,
}

impl Order {
    /// Placement timestamp with the documented fallback to `updated_at`.
    pub fn placed_or_updated_at(&self) -> DateTime<Utc> {
        self.order_placed_at.unwrap_or(self.updated_at)
    }

    /// Total units across all lines, optionally restricted to one variant.
    pub fn units_of(&self, variant_id: Option<&str>) -> i64 {
        self.lines
            .iter()
            .filter(|line| variant_id.map_or(true, |id| line.product_variant_id == id))
            .map(|line| line.quantity)
            .sum()
    }
}

/// A product variant reference, resolved for chart legends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductVariant {
    /// Host-side variant identifier
    pub id: String,
    /// Display name used as a legend label
    pub name: String,
}

// ============================================
// Metric output
// ============================================

/// Display hint for a metric's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    /// Plain number (counts, rates)
    Number,
    /// Money amount in the channel currency
    Currency,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Number => "number",
            MetricType::Currency => "currency",
        }
    }
}

impl std::str::FromStr for MetricType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "number" => Ok(MetricType::Number),
            "currency" => Ok(MetricType::Currency),
            _ => Err(format!("unknown metric type: {}", s)),
        }
    }
}

/// One named value produced by a strategy for one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedDataPoint {
    /// Legend label this value belongs to
    pub legend: String,
    /// The value itself
    pub value: f64,
}

impl NamedDataPoint {
    pub fn new(legend: impl Into<String>, value: f64) -> Self {
        Self {
            legend: legend.into(),
            value,
        }
    }
}

/// One legend line across all months, in month order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    /// Legend label
    pub name: String,
    /// One value per month label, zero-filled where the legend was absent
    pub values: Vec<f64>,
}

/// A fully assembled chart for one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    /// Stable strategy code
    pub code: String,
    /// Localized title from the strategy
    pub title: String,
    /// Month names, chronological
    pub labels: Vec<String>,
    /// One entry per legend label
    pub series: Vec<MetricSeries>,
    /// Display hint
    #[serde(rename = "type")]
    pub metric_type: MetricType,
}

// ============================================
// Execution context
// ============================================

/// Per-request context handed in by the host.
///
/// The engine reads only the channel token plus the currency/locale hints
/// strategies need for their titles; everything else about the host request
/// stays opaque.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Channel token scoping every query
    pub channel_token: String,
    /// ISO currency code of the channel, used in strategy titles
    pub currency_code: String,
    /// BCP 47 language tag, when the host supplies one
    pub locale: Option<String>,
}

impl RequestContext {
    pub fn new(channel_token: impl Into<String>, currency_code: impl Into<String>) -> Self {
        Self {
            channel_token: channel_token.into(),
            currency_code: currency_code.into(),
            locale: None,
        }
    }
}

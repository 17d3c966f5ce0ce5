//! Payload types for the marketplace analytics backend.

use serde::{Deserialize, Serialize};

/// Everything one dashboard render needs: chart series, ranked breakdowns,
/// summary tiles and the currency they are denominated in. All fields default
/// so a partial payload still renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardData {
  #[serde(default)]
  pub currency: Currency,
  #[serde(default)]
  pub sale_graph: SaleGraph,
  #[serde(default)]
  pub best_sellers: Vec<RankedEntry>,
  #[serde(default)]
  pub top_customers: Vec<RankedEntry>,
  #[serde(default)]
  pub category_graph: Vec<GraphSlice>,
  #[serde(default)]
  pub country_graph: Vec<GraphSlice>,
  #[serde(default)]
  pub summary: Summary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
  pub code: String,
  pub symbol: String,
}

impl Default for Currency {
  fn default() -> Self {
    Self {
      code: "USD".to_string(),
      symbol: "$".to_string(),
    }
  }
}

/// Daily sales: one date label per amount, in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaleGraph {
  #[serde(default)]
  pub categories: Vec<String>,
  #[serde(default)]
  pub amounts: Vec<f64>,
}

/// A ranked row: best-selling product or top-spending customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
  pub name: String,
  pub amount: f64,
  #[serde(default)]
  pub quantity: Option<f64>,
}

/// One slice of a category/country breakdown chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSlice {
  pub label: String,
  pub amount: f64,
}

/// KPI tiles. The `kpi_*` fields are percentage deltas against the previous
/// period, computed server-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
  #[serde(default)]
  pub total_orders: u64,
  #[serde(default)]
  pub total_sales: f64,
  #[serde(default)]
  pub pending_shipments: u64,
  #[serde(default)]
  pub avg_order_value: f64,
  #[serde(default)]
  pub kpi_total_orders: f64,
  #[serde(default)]
  pub kpi_total_sales: f64,
  #[serde(default)]
  pub kpi_pending_shipments: f64,
  #[serde(default)]
  pub kpi_avg_order_value: f64,
}

/// Parameters for one dashboard-data request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardQuery {
  pub instance_id: Option<i64>,
  pub date_from: String,
  pub date_to: String,
  pub date_filter: String,
}

/// A server-pushed user notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
  pub id: u64,
  pub message: String,
  #[serde(default)]
  pub sticky: bool,
  #[serde(default)]
  pub title: Option<String>,
  #[serde(default, rename = "type")]
  pub kind: NotificationKind,
  #[serde(default)]
  pub message_is_html: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
  #[default]
  Info,
  Success,
  Warning,
  Danger,
}

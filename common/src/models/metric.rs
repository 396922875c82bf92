//! Metric catalogue.
//!
//! The fixed set of dashboard metrics, their URL slugs and the column schema
//! every source (live, sample, local) must return.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::table::{ColumnInfo, ColumnSpec, ColumnType};
use crate::errors::AppError;

use ColumnType::{Date, Float, Int, Text};

/// Semantic dashboard metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    TotalRevenue,
    RevenueByRoute,
    LoadFactor,
    FleetUtilization,
    FuelEfficiency,
    MaintenanceAlerts,
    PassengerDemographics,
    HrMetrics,
    RouteNetwork,
    FinancialTrends,
}

const TOTAL_REVENUE: &[ColumnSpec] = &[ColumnSpec::new("total_revenue", Float)];

const REVENUE_BY_ROUTE: &[ColumnSpec] = &[
    ColumnSpec::new("ROUTE_ID", Int),
    ColumnSpec::new("origin", Text),
    ColumnSpec::new("destination", Text),
    ColumnSpec::new("total_revenue", Float),
    ColumnSpec::new("ticket_count", Int),
    ColumnSpec::new("avg_ticket_price", Float),
];

const LOAD_FACTOR: &[ColumnSpec] = &[
    ColumnSpec::new("FLIGHT_ID", Int),
    ColumnSpec::new("origin", Text),
    ColumnSpec::new("destination", Text),
    ColumnSpec::new("CAPACITY", Int),
    ColumnSpec::new("passengers_booked", Int),
    ColumnSpec::new("load_factor", Float),
];

const FLEET_UTILIZATION: &[ColumnSpec] = &[
    ColumnSpec::new("AIRPLANE_ID", Int),
    ColumnSpec::new("MODEL", Text),
    ColumnSpec::new("REGISTRATION_NUMBER", Text),
    ColumnSpec::new("TOTAL_FLIGHT_DISTANCE", Int),
    ColumnSpec::new("FLIGHT_HOURS", Int),
    ColumnSpec::new("FUEL_GALLONS_HOUR", Float),
    ColumnSpec::new("total_flights", Int),
    ColumnSpec::new("MAINTENANCE_LAST_ACHECK", Int),
    ColumnSpec::new("MAINTENANCE_TAKEOFFS", Int),
];

const FUEL_EFFICIENCY: &[ColumnSpec] = &[
    ColumnSpec::new("MODEL", Text),
    ColumnSpec::new("aircraft_count", Int),
    ColumnSpec::new("avg_fuel_consumption", Float),
    ColumnSpec::new("avg_distance", Float),
    ColumnSpec::new("avg_flight_hours", Float),
];

const MAINTENANCE_ALERTS: &[ColumnSpec] = &[
    ColumnSpec::new("AIRPLANE_ID", Int),
    ColumnSpec::new("MODEL", Text),
    ColumnSpec::new("REGISTRATION_NUMBER", Text),
    ColumnSpec::new("MAINTENANCE_TAKEOFFS", Int),
    ColumnSpec::new("maintenance_status", Text),
];

const PASSENGER_DEMOGRAPHICS: &[ColumnSpec] = &[
    ColumnSpec::new("GENDER", Text),
    ColumnSpec::new("passenger_count", Int),
    ColumnSpec::new("avg_age", Float),
    ColumnSpec::new("min_age", Int),
    ColumnSpec::new("max_age", Int),
];

const HR_METRICS: &[ColumnSpec] = &[
    ColumnSpec::new("DEPARTMENT_ID", Int),
    ColumnSpec::new("DEPARTMENT_NAME", Text),
    ColumnSpec::new("headcount", Int),
    ColumnSpec::new("total_salary", Float),
    ColumnSpec::new("avg_salary", Float),
];

const ROUTE_NETWORK: &[ColumnSpec] = &[
    ColumnSpec::new("ROUTE_ID", Int),
    ColumnSpec::new("origin_id", Int),
    ColumnSpec::new("origin", Text),
    ColumnSpec::new("origin_lat", Float),
    ColumnSpec::new("origin_lon", Float),
    ColumnSpec::new("destination_id", Int),
    ColumnSpec::new("destination", Text),
    ColumnSpec::new("destination_lat", Float),
    ColumnSpec::new("destination_lon", Float),
    ColumnSpec::new("flight_count", Int),
    ColumnSpec::new("passenger_count", Int),
];

const FINANCIAL_TRENDS: &[ColumnSpec] = &[
    ColumnSpec::new("flight_date", Date),
    ColumnSpec::new("ticket_count", Int),
    ColumnSpec::new("daily_revenue", Float),
    ColumnSpec::new("avg_ticket_price", Float),
];

impl Metric {
    /// Every metric, in dashboard order.
    pub const ALL: [Metric; 10] = [
        Metric::TotalRevenue,
        Metric::RevenueByRoute,
        Metric::LoadFactor,
        Metric::FleetUtilization,
        Metric::FuelEfficiency,
        Metric::MaintenanceAlerts,
        Metric::PassengerDemographics,
        Metric::HrMetrics,
        Metric::RouteNetwork,
        Metric::FinancialTrends,
    ];

    /// URL slug.
    pub fn slug(&self) -> &'static str {
        match self {
            Metric::TotalRevenue => "total_revenue",
            Metric::RevenueByRoute => "revenue_by_route",
            Metric::LoadFactor => "load_factor",
            Metric::FleetUtilization => "fleet_utilization",
            Metric::FuelEfficiency => "fuel_efficiency",
            Metric::MaintenanceAlerts => "maintenance_alerts",
            Metric::PassengerDemographics => "passenger_demographics",
            Metric::HrMetrics => "hr_metrics",
            Metric::RouteNetwork => "route_network",
            Metric::FinancialTrends => "financial_trends",
        }
    }

    /// Documented column schema.
    pub fn schema(&self) -> &'static [ColumnSpec] {
        match self {
            Metric::TotalRevenue => TOTAL_REVENUE,
            Metric::RevenueByRoute => REVENUE_BY_ROUTE,
            Metric::LoadFactor => LOAD_FACTOR,
            Metric::FleetUtilization => FLEET_UTILIZATION,
            Metric::FuelEfficiency => FUEL_EFFICIENCY,
            Metric::MaintenanceAlerts => MAINTENANCE_ALERTS,
            Metric::PassengerDemographics => PASSENGER_DEMOGRAPHICS,
            Metric::HrMetrics => HR_METRICS,
            Metric::RouteNetwork => ROUTE_NETWORK,
            Metric::FinancialTrends => FINANCIAL_TRENDS,
        }
    }

    /// Human readable title for the dashboard.
    pub fn title(&self) -> &'static str {
        match self {
            Metric::TotalRevenue => "Total revenue",
            Metric::RevenueByRoute => "Revenue by route",
            Metric::LoadFactor => "Load factor by flight",
            Metric::FleetUtilization => "Fleet utilization",
            Metric::FuelEfficiency => "Fuel efficiency by model",
            Metric::MaintenanceAlerts => "Maintenance alerts",
            Metric::PassengerDemographics => "Passenger demographics",
            Metric::HrMetrics => "Headcount and payroll by department",
            Metric::RouteNetwork => "Route network",
            Metric::FinancialTrends => "Daily revenue trend",
        }
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.schema().iter().map(|c| c.name).collect()
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Metric {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_").to_lowercase();
        Metric::ALL
            .into_iter()
            .find(|m| m.slug() == wanted)
            .ok_or_else(|| AppError::UnknownMetric(s.to_string()))
    }
}

/// Catalogue entry served by `GET /api/metrics`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MetricDescriptor {
    /// Metric slug.
    pub metric: Metric,
    /// Display title.
    pub title: String,
    /// Documented columns.
    pub columns: Vec<ColumnInfo>,
}

impl From<Metric> for MetricDescriptor {
    fn from(metric: Metric) -> Self {
        Self {
            metric,
            title: metric.title().to_string(),
            columns: metric.schema().iter().map(ColumnInfo::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_round_trips_through_from_str() {
        for metric in Metric::ALL {
            assert_eq!(metric.slug().parse::<Metric>().unwrap(), metric);
        }
    }

    #[test]
    fn test_from_str_accepts_dashes() {
        assert_eq!("load-factor".parse::<Metric>().unwrap(), Metric::LoadFactor);
        assert!("cargo_volume".parse::<Metric>().is_err());
    }

    #[test]
    fn test_schemas_have_unique_names() {
        for metric in Metric::ALL {
            let mut names = metric.column_names();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), metric.schema().len(), "{metric}");
        }
    }
}

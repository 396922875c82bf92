//! Metric SQL.
//!
//! The statements are written once in portable SQL. The only dialect
//! differences are the numeric casts (so aggregates that a driver would type
//! as `DECIMAL` come back as doubles or integers) and the schema qualifier.

use common::errors::AppResult;
use common::models::connection::DbType;
use common::models::metric::Metric;
use common::utils::SqlValidator;

/// SQL flavour of the configured store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    MySql,
    Sqlite,
}

impl From<DbType> for Dialect {
    fn from(db_type: DbType) -> Self {
        match db_type {
            DbType::Postgres => Dialect::Postgres,
            DbType::MySQL => Dialect::MySql,
            DbType::SQLite => Dialect::Sqlite,
        }
    }
}

impl Dialect {
    /// Wraps `expr` in a cast to the dialect's double type.
    pub fn float(&self, expr: &str) -> String {
        let ty = match self {
            Dialect::Postgres => "DOUBLE PRECISION",
            Dialect::MySql => "DOUBLE",
            Dialect::Sqlite => "REAL",
        };
        format!("CAST({expr} AS {ty})")
    }

    /// Wraps `expr` in a cast to the dialect's 64-bit integer type.
    ///
    /// MySQL types `SUM` over integers as `DECIMAL`.
    pub fn int(&self, expr: &str) -> String {
        let ty = match self {
            Dialect::Postgres => "BIGINT",
            Dialect::MySql => "SIGNED",
            Dialect::Sqlite => "INTEGER",
        };
        format!("CAST({expr} AS {ty})")
    }
}

/// Builds metric statements for one schema and dialect.
#[derive(Debug, Clone)]
pub struct MetricSql {
    dialect: Dialect,
    prefix: String,
}

impl MetricSql {
    /// `schema` may be empty for unqualified table names.
    pub fn new(dialect: Dialect, schema: &str) -> AppResult<Self> {
        let schema = schema.trim();
        let prefix = if schema.is_empty() {
            String::new()
        } else {
            SqlValidator::validate_identifier(schema)?;
            format!("{schema}.")
        };
        Ok(Self { dialect, prefix })
    }

    fn t(&self, table: &str) -> String {
        format!("{}{}", self.prefix, table)
    }

    /// Statement for `metric`.
    pub fn statement(&self, metric: Metric) -> String {
        match metric {
            Metric::TotalRevenue => self.total_revenue(),
            Metric::RevenueByRoute => self.revenue_by_route(),
            Metric::LoadFactor => self.load_factor(),
            Metric::FleetUtilization => self.fleet_utilization(),
            Metric::FuelEfficiency => self.fuel_efficiency(),
            Metric::MaintenanceAlerts => self.maintenance_alerts(),
            Metric::PassengerDemographics => self.passenger_demographics(),
            Metric::HrMetrics => self.hr_metrics(),
            Metric::RouteNetwork => self.route_network(),
            Metric::FinancialTrends => self.financial_trends(),
        }
    }

    fn total_revenue(&self) -> String {
        format!(
            "SELECT {} AS total_revenue FROM {}",
            self.dialect.float("SUM(TOTAL_AMOUNT)"),
            self.t("TICKETS")
        )
    }

    fn revenue_by_route(&self) -> String {
        let d = self.dialect;
        format!(
            "SELECT r.ROUTE_ID, a1.AIRPORT_NAME AS origin, a2.AIRPORT_NAME AS destination, \
             {sum} AS total_revenue, COUNT(t.TICKET_ID) AS ticket_count, \
             {avg} AS avg_ticket_price \
             FROM {routes} r \
             JOIN {airports} a1 ON r.ORIGIN_AIRPORT_ID = a1.AIRPORT_ID \
             JOIN {airports} a2 ON r.DESTINATION_AIRPORT_ID = a2.AIRPORT_ID \
             LEFT JOIN {flights} f ON r.ROUTE_ID = f.ROUTE_ID \
             LEFT JOIN {tickets} t ON f.FLIGHT_ID = t.FLIGHT_ID \
             GROUP BY r.ROUTE_ID, a1.AIRPORT_NAME, a2.AIRPORT_NAME \
             ORDER BY total_revenue DESC",
            sum = d.float("SUM(t.TOTAL_AMOUNT)"),
            avg = d.float("AVG(t.TOTAL_AMOUNT)"),
            routes = self.t("ROUTES"),
            airports = self.t("AIRPORTS"),
            flights = self.t("FLIGHTS"),
            tickets = self.t("TICKETS"),
        )
    }

    fn load_factor(&self) -> String {
        let d = self.dialect;
        format!(
            "SELECT f.FLIGHT_ID, a1.AIRPORT_NAME AS origin, a2.AIRPORT_NAME AS destination, \
             ap.CAPACITY, COUNT(t.TICKET_ID) AS passengers_booked, \
             {count} / ap.CAPACITY * 100 AS load_factor \
             FROM {flights} f \
             JOIN {routes} r ON f.ROUTE_ID = r.ROUTE_ID \
             JOIN {airports} a1 ON r.ORIGIN_AIRPORT_ID = a1.AIRPORT_ID \
             JOIN {airports} a2 ON r.DESTINATION_AIRPORT_ID = a2.AIRPORT_ID \
             JOIN {airplanes} ap ON f.AIRPLANE_ID = ap.AIRPLANE_ID \
             LEFT JOIN {tickets} t ON f.FLIGHT_ID = t.FLIGHT_ID \
             GROUP BY f.FLIGHT_ID, a1.AIRPORT_NAME, a2.AIRPORT_NAME, ap.CAPACITY \
             ORDER BY load_factor DESC",
            count = d.float("COUNT(t.TICKET_ID)"),
            flights = self.t("FLIGHTS"),
            routes = self.t("ROUTES"),
            airports = self.t("AIRPORTS"),
            airplanes = self.t("AIRPLANES"),
            tickets = self.t("TICKETS"),
        )
    }

    fn fleet_utilization(&self) -> String {
        format!(
            "SELECT ap.AIRPLANE_ID, ap.MODEL, ap.REGISTRATION_NUMBER, ap.TOTAL_FLIGHT_DISTANCE, \
             ap.FLIGHT_HOURS, {fuel} AS FUEL_GALLONS_HOUR, COUNT(f.FLIGHT_ID) AS total_flights, \
             ap.MAINTENANCE_LAST_ACHECK, ap.MAINTENANCE_TAKEOFFS \
             FROM {airplanes} ap \
             LEFT JOIN {flights} f ON ap.AIRPLANE_ID = f.AIRPLANE_ID \
             GROUP BY ap.AIRPLANE_ID, ap.MODEL, ap.REGISTRATION_NUMBER, \
             ap.TOTAL_FLIGHT_DISTANCE, ap.FLIGHT_HOURS, ap.FUEL_GALLONS_HOUR, \
             ap.MAINTENANCE_LAST_ACHECK, ap.MAINTENANCE_TAKEOFFS \
             ORDER BY ap.TOTAL_FLIGHT_DISTANCE DESC",
            fuel = self.dialect.float("ap.FUEL_GALLONS_HOUR"),
            airplanes = self.t("AIRPLANES"),
            flights = self.t("FLIGHTS"),
        )
    }

    fn fuel_efficiency(&self) -> String {
        let d = self.dialect;
        format!(
            "SELECT ap.MODEL, COUNT(DISTINCT ap.AIRPLANE_ID) AS aircraft_count, \
             {fuel} AS avg_fuel_consumption, {dist} AS avg_distance, \
             {hours} AS avg_flight_hours \
             FROM {airplanes} ap \
             GROUP BY ap.MODEL \
             ORDER BY avg_fuel_consumption ASC",
            fuel = d.float("AVG(ap.FUEL_GALLONS_HOUR)"),
            dist = d.float("AVG(ap.TOTAL_FLIGHT_DISTANCE)"),
            hours = d.float("AVG(ap.FLIGHT_HOURS)"),
            airplanes = self.t("AIRPLANES"),
        )
    }

    fn maintenance_alerts(&self) -> String {
        format!(
            "SELECT ap.AIRPLANE_ID, ap.MODEL, ap.REGISTRATION_NUMBER, ap.MAINTENANCE_TAKEOFFS, \
             CASE \
             WHEN ap.MAINTENANCE_TAKEOFFS >= {critical} THEN 'CRITICAL' \
             WHEN ap.MAINTENANCE_TAKEOFFS >= {high} THEN 'HIGH' \
             WHEN ap.MAINTENANCE_TAKEOFFS >= {medium} THEN 'MEDIUM' \
             ELSE 'LOW' END AS maintenance_status \
             FROM {airplanes} ap \
             WHERE ap.MAINTENANCE_TAKEOFFS >= {medium} \
             ORDER BY ap.MAINTENANCE_TAKEOFFS DESC",
            critical = MaintenanceStatus::CRITICAL_TAKEOFFS,
            high = MaintenanceStatus::HIGH_TAKEOFFS,
            medium = MaintenanceStatus::MEDIUM_TAKEOFFS,
            airplanes = self.t("AIRPLANES"),
        )
    }

    fn passenger_demographics(&self) -> String {
        format!(
            "SELECT GENDER, COUNT(*) AS passenger_count, {avg} AS avg_age, \
             MIN(AGE) AS min_age, MAX(AGE) AS max_age \
             FROM {passengers} \
             GROUP BY GENDER",
            avg = self.dialect.float("AVG(AGE)"),
            passengers = self.t("PASSENGERS"),
        )
    }

    fn hr_metrics(&self) -> String {
        let d = self.dialect;
        format!(
            "SELECT d.DEPARTMENT_ID, d.DEPARTMENT_NAME, COUNT(e.EMPLOYEE_ID) AS headcount, \
             {sum} AS total_salary, {avg} AS avg_salary \
             FROM {departments} d \
             LEFT JOIN {employees} e ON d.DEPARTMENT_ID = e.DEPARTMENT_ID \
             GROUP BY d.DEPARTMENT_ID, d.DEPARTMENT_NAME \
             ORDER BY total_salary DESC",
            sum = d.float("SUM(e.SALARY)"),
            avg = d.float("AVG(e.SALARY)"),
            departments = self.t("DEPARTMENTS"),
            employees = self.t("EMPLOYEES"),
        )
    }

    fn route_network(&self) -> String {
        let d = self.dialect;
        format!(
            "SELECT r.ROUTE_ID, a1.AIRPORT_ID AS origin_id, a1.AIRPORT_NAME AS origin, \
             {lat1} AS origin_lat, {lon1} AS origin_lon, \
             a2.AIRPORT_ID AS destination_id, a2.AIRPORT_NAME AS destination, \
             {lat2} AS destination_lat, {lon2} AS destination_lon, \
             COUNT(f.FLIGHT_ID) AS flight_count, \
             {passengers} AS passenger_count \
             FROM {routes} r \
             JOIN {airports} a1 ON r.ORIGIN_AIRPORT_ID = a1.AIRPORT_ID \
             JOIN {airports} a2 ON r.DESTINATION_AIRPORT_ID = a2.AIRPORT_ID \
             LEFT JOIN {flights} f ON r.ROUTE_ID = f.ROUTE_ID \
             LEFT JOIN {tickets} t ON f.FLIGHT_ID = t.FLIGHT_ID \
             GROUP BY r.ROUTE_ID, a1.AIRPORT_ID, a1.AIRPORT_NAME, a1.LATITUDE, a1.LONGITUDE, \
             a2.AIRPORT_ID, a2.AIRPORT_NAME, a2.LATITUDE, a2.LONGITUDE \
             ORDER BY flight_count DESC",
            passengers = d.int("SUM(CASE WHEN t.TICKET_ID IS NOT NULL THEN 1 ELSE 0 END)"),
            lat1 = d.float("a1.LATITUDE"),
            lon1 = d.float("a1.LONGITUDE"),
            lat2 = d.float("a2.LATITUDE"),
            lon2 = d.float("a2.LONGITUDE"),
            routes = self.t("ROUTES"),
            airports = self.t("AIRPORTS"),
            flights = self.t("FLIGHTS"),
            tickets = self.t("TICKETS"),
        )
    }

    fn financial_trends(&self) -> String {
        let d = self.dialect;
        format!(
            "SELECT DATE(f.DEPARTURE_TIME) AS flight_date, \
             COUNT(DISTINCT t.TICKET_ID) AS ticket_count, \
             {sum} AS daily_revenue, {avg} AS avg_ticket_price \
             FROM {flights} f \
             LEFT JOIN {tickets} t ON f.FLIGHT_ID = t.FLIGHT_ID \
             GROUP BY DATE(f.DEPARTURE_TIME) \
             ORDER BY flight_date DESC",
            sum = d.float("SUM(t.TOTAL_AMOUNT)"),
            avg = d.float("AVG(t.TOTAL_AMOUNT)"),
            flights = self.t("FLIGHTS"),
            tickets = self.t("TICKETS"),
        )
    }
}

/// Maintenance urgency derived from takeoffs since the last check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceStatus {
    Low,
    Medium,
    High,
    Critical,
}

impl MaintenanceStatus {
    pub const CRITICAL_TAKEOFFS: i64 = 900;
    pub const HIGH_TAKEOFFS: i64 = 700;
    pub const MEDIUM_TAKEOFFS: i64 = 500;

    pub fn from_takeoffs(takeoffs: i64) -> Self {
        if takeoffs >= Self::CRITICAL_TAKEOFFS {
            MaintenanceStatus::Critical
        } else if takeoffs >= Self::HIGH_TAKEOFFS {
            MaintenanceStatus::High
        } else if takeoffs >= Self::MEDIUM_TAKEOFFS {
            MaintenanceStatus::Medium
        } else {
            MaintenanceStatus::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MaintenanceStatus::Low => "LOW",
            MaintenanceStatus::Medium => "MEDIUM",
            MaintenanceStatus::High => "HIGH",
            MaintenanceStatus::Critical => "CRITICAL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_prefix_is_applied() {
        let sql = MetricSql::new(Dialect::Postgres, "IEPLANE").unwrap();
        assert_eq!(
            sql.statement(Metric::TotalRevenue),
            "SELECT CAST(SUM(TOTAL_AMOUNT) AS DOUBLE PRECISION) AS total_revenue FROM IEPLANE.TICKETS"
        );
    }

    #[test]
    fn test_empty_schema_leaves_names_unqualified() {
        let sql = MetricSql::new(Dialect::Sqlite, "").unwrap();
        let stmt = sql.statement(Metric::HrMetrics);
        assert!(stmt.contains("FROM DEPARTMENTS d"));
        assert!(stmt.contains("CAST(SUM(e.SALARY) AS REAL)"));
    }

    #[test]
    fn test_bad_schema_is_rejected() {
        assert!(MetricSql::new(Dialect::MySql, "IEPLANE; DROP").is_err());
    }

    #[test]
    fn test_every_statement_passes_the_validator() {
        let sql = MetricSql::new(Dialect::MySql, "IEPLANE").unwrap();
        for metric in Metric::ALL {
            assert!(SqlValidator::validate(&sql.statement(metric)).is_ok(), "{metric}");
        }
    }

    #[test]
    fn test_route_network_passenger_count_is_integer_on_mysql() {
        let sql = MetricSql::new(Dialect::MySql, "IEPLANE").unwrap();
        let stmt = sql.statement(Metric::RouteNetwork);
        assert!(stmt.contains(
            "CAST(SUM(CASE WHEN t.TICKET_ID IS NOT NULL THEN 1 ELSE 0 END) AS SIGNED) AS passenger_count"
        ));
        assert_eq!(Dialect::Postgres.int("SUM(x)"), "CAST(SUM(x) AS BIGINT)");
        assert_eq!(Dialect::Sqlite.int("SUM(x)"), "CAST(SUM(x) AS INTEGER)");
    }

    #[test]
    fn test_maintenance_thresholds() {
        assert_eq!(MaintenanceStatus::from_takeoffs(950), MaintenanceStatus::Critical);
        assert_eq!(MaintenanceStatus::from_takeoffs(900), MaintenanceStatus::Critical);
        assert_eq!(MaintenanceStatus::from_takeoffs(899), MaintenanceStatus::High);
        assert_eq!(MaintenanceStatus::from_takeoffs(700), MaintenanceStatus::High);
        assert_eq!(MaintenanceStatus::from_takeoffs(500), MaintenanceStatus::Medium);
        assert_eq!(MaintenanceStatus::from_takeoffs(499).as_str(), "LOW");
    }
}

//! Local parquet datasets.
//!
//! Each table lives in `<data_dir>/<table>/*.parquet` (every file is read and
//! concatenated) or in a single `<data_dir>/<table>.parquet`. Names match
//! case-insensitively. Extracts do not follow one naming convention, so
//! columns are looked up through short alias lists. Missing or unreadable
//! data never fails a metric; it yields an empty table.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use common::errors::{AppError, AppResult};
use common::models::catalog::{ColumnEntry, TableEntry, TableKind};
use common::models::metric::Metric;
use common::models::table::{CellValue, ColumnInfo, ColumnType, ResultTable};
use parquet::basic::Repetition;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::Field;

use crate::queries::MaintenanceStatus;
use crate::source::{MetricSource, SourceKind};

const AMOUNT: &[&str] = &["total_amount", "total_revenue", "amount"];
const ROUTE_CODE: &[&str] = &["route_code", "routecode", "route"];
const ROUTE_ID: &[&str] = &["route_id"];
const FLIGHT_ID: &[&str] = &["flight_id", "flightid", "flight"];
const AIRPLANE_REF: &[&str] = &["airplane", "airplane_id", "aircraft_registration", "registration"];
const AIRPLANE_ID: &[&str] = &["airplane_id"];
const REGISTRATION: &[&str] = &["registration_number", "aircraft_registration", "registration"];
const CAPACITY: &[&str] = &["capacity", "total_seats", "seats", "seat_capacity"];
const MODEL: &[&str] = &["model", "aircraft_model"];
const DISTANCE: &[&str] = &["total_flight_distance", "flight_distance", "distance"];
const HOURS: &[&str] = &["flight_hours"];
const FUEL: &[&str] = &["fuel_gallons_hour", "fuel_consumption"];
const LAST_CHECK: &[&str] = &["maintenance_last_acheck"];
const TAKEOFFS: &[&str] = &["maintenance_takeoffs", "takeoffs"];
const ORIGIN: &[&str] = &["origin", "origin_airport", "departure_airport"];
const DESTINATION: &[&str] = &["destination", "destination_airport", "arrival_airport"];
const ORIGIN_ID: &[&str] = &["origin_id", "origin_airport_id"];
const DESTINATION_ID: &[&str] = &["destination_id", "destination_airport_id"];
const ORIGIN_LAT: &[&str] = &["origin_lat", "origin_latitude"];
const ORIGIN_LON: &[&str] = &["origin_lon", "origin_lng", "origin_longitude"];
const DESTINATION_LAT: &[&str] = &["destination_lat", "destination_latitude"];
const DESTINATION_LON: &[&str] = &["destination_lon", "destination_lng", "destination_longitude"];
const AIRPORT_ID: &[&str] = &["airport_id", "id"];
const AIRPORT_NAME: &[&str] = &["airport_name", "name", "code"];
const LATITUDE: &[&str] = &["latitude", "lat"];
const LONGITUDE: &[&str] = &["longitude", "lon", "lng"];
const GENDER: &[&str] = &["gender", "sex"];
const AGE: &[&str] = &["age"];
const PASSENGER_COUNT: &[&str] = &["passenger_count", "pax_count", "pax"];
const DEPARTMENT_ID: &[&str] = &["department_id", "dept_id"];
const DEPARTMENT_NAME: &[&str] = &["department_name", "department", "dept_name"];
const SALARY: &[&str] = &["salary", "annual_salary"];

/// Metric source backed by parquet files on disk.
#[derive(Debug, Clone)]
pub struct LocalConnector {
    data_dir: PathBuf,
}

impl LocalConnector {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Names of the tables found under the data directory.
    pub fn table_names(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.data_dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                let name = entry.file_name().to_string_lossy().to_string();
                if path.is_dir() {
                    Some(name)
                } else {
                    name.strip_suffix(".parquet").map(str::to_string)
                }
            })
            .collect();
        names.sort_by_key(|n| n.to_lowercase());
        names.dedup_by(|a, b| a.eq_ignore_ascii_case(b));
        names
    }

    /// Parquet files holding `table`, sorted by name.
    fn table_files(&self, table: &str) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.data_dir) else {
            return Vec::new();
        };
        let file_name = format!("{table}.parquet");
        let mut single = None;
        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            if path.is_dir() && name.eq_ignore_ascii_case(table) {
                let mut files: Vec<PathBuf> = fs::read_dir(&path)
                    .map(|dir| {
                        dir.flatten()
                            .map(|e| e.path())
                            .filter(|p| p.extension().is_some_and(|ext| ext == "parquet"))
                            .collect()
                    })
                    .unwrap_or_default();
                files.sort();
                return files;
            }
            if path.is_file() && name.eq_ignore_ascii_case(&file_name) {
                single = Some(path);
            }
        }
        single.into_iter().collect()
    }

    /// Reads every file of `table` into one table. Unreadable files are skipped.
    pub fn read_table(&self, table: &str) -> ResultTable {
        let files = self.table_files(table);
        let mut out = ResultTable::default();
        let mut loaded = 0;
        for path in &files {
            match read_parquet(path) {
                Ok(part) => {
                    out.append(part);
                    loaded += 1;
                }
                Err(e) => tracing::debug!(path = %path.display(), error = %e, "skipping unreadable parquet file"),
            }
        }
        if loaded > 0 {
            tracing::info!(table, files = loaded, rows = out.row_count(), "loaded local table");
        } else {
            tracing::debug!(table, "no readable parquet files");
        }
        out
    }

    /// Reads the first table that exists among `names`.
    fn read_any(&self, names: &[&str]) -> ResultTable {
        names
            .iter()
            .map(|name| self.read_table(name))
            .find(|table| !table.columns.is_empty())
            .unwrap_or_default()
    }

    /// Computes `metric` from the extracts, shaped like its documented schema.
    pub fn compute(&self, metric: Metric) -> ResultTable {
        let table = match metric {
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
        };
        table.conform(metric.schema())
    }

    fn total_revenue(&self) -> ResultTable {
        let tickets = self.read_table("TICKETS");
        let mut out = ResultTable::with_schema(Metric::TotalRevenue.schema());
        let Some(amount) = tickets.find_column(AMOUNT) else {
            return out;
        };
        let total: f64 = tickets.rows.iter().filter_map(|r| r[amount].as_f64()).sum();
        out.push_row(vec![CellValue::Float(total)]);
        out
    }

    fn revenue_by_route(&self) -> ResultTable {
        let tickets = self.read_table("TICKETS");
        let mut out = ResultTable::with_schema(Metric::RevenueByRoute.schema());
        let (Some(route), Some(amount)) = (tickets.find_column(ROUTE_CODE), tickets.find_column(AMOUNT)) else {
            return out;
        };

        let mut groups: BTreeMap<String, Agg> = BTreeMap::new();
        for row in &tickets.rows {
            if let Some(code) = key(&row[route]) {
                groups.entry(code).or_default().add(row[amount].as_f64());
            }
        }
        let mut routes: Vec<(String, Agg)> = groups.into_iter().collect();
        routes.sort_by(|a, b| b.1.sum.total_cmp(&a.1.sum));

        for (idx, (code, agg)) in routes.into_iter().enumerate() {
            let (origin, destination) = split_route(&code);
            out.push_row(vec![
                CellValue::Int(idx as i64 + 1),
                origin.into(),
                destination.into(),
                CellValue::Float(agg.sum),
                CellValue::Int(agg.rows),
                agg.avg().into(),
            ]);
        }
        out
    }

    fn financial_trends(&self) -> ResultTable {
        let tickets = self.read_table("TICKETS");
        let mut out = ResultTable::with_schema(Metric::FinancialTrends.schema());
        let date = tickets
            .columns
            .iter()
            .position(|c| c.name.to_lowercase().contains("date"));
        let (Some(date), Some(amount)) = (date, tickets.find_column(AMOUNT)) else {
            return out;
        };

        let mut days: BTreeMap<NaiveDate, Agg> = BTreeMap::new();
        for row in &tickets.rows {
            if let Some(day) = row[date].as_date() {
                days.entry(day).or_default().add(row[amount].as_f64());
            }
        }
        for (day, agg) in days.into_iter().rev() {
            out.push_row(vec![
                CellValue::Date(day),
                CellValue::Int(agg.rows),
                CellValue::Float(agg.sum),
                agg.avg().into(),
            ]);
        }
        out
    }

    fn load_factor(&self) -> ResultTable {
        let tickets = self.read_table("TICKETS");
        let flights = self.read_table("FLIGHTS");
        let airplanes = self.read_table("AIRPLANES");
        let mut out = ResultTable::with_schema(Metric::LoadFactor.schema());
        let Some(flight_id) = flights.find_column(FLIGHT_ID) else {
            return out;
        };

        let booked = count_by(&tickets, FLIGHT_ID);
        let fleet = AirplaneIndex::new(&airplanes);
        let own_capacity = flights.find_column(CAPACITY);
        let airplane_ref = flights.find_column(AIRPLANE_REF);

        let mut rows = Vec::new();
        for row in &flights.rows {
            let Some(id) = key(&row[flight_id]) else {
                continue;
            };
            let capacity = own_capacity
                .and_then(|c| row[c].as_f64())
                .or_else(|| {
                    let aref = airplane_ref.and_then(|c| key(&row[c]))?;
                    fleet.value(&aref, CAPACITY)?.as_f64()
                })
                .filter(|c| *c > 0.0);
            let Some(capacity) = capacity else {
                continue;
            };
            let passengers = booked.get(&id).copied().unwrap_or(0);
            let load = round(passengers as f64 / capacity * 100.0, 2);
            let (origin, destination) = endpoints(&flights, row);
            rows.push(vec![
                row[flight_id].clone(),
                origin,
                destination,
                CellValue::Float(capacity),
                CellValue::Int(passengers),
                CellValue::Float(load),
            ]);
        }
        rows.sort_by(|a, b| cmp_desc(&a[5], &b[5]));
        for row in rows {
            out.push_row(row);
        }
        out
    }

    fn fleet_utilization(&self) -> ResultTable {
        let flights = self.read_table("FLIGHTS");
        let airplanes = self.read_table("AIRPLANES");
        let mut out = ResultTable::with_schema(Metric::FleetUtilization.schema());
        let flights_per_airplane = count_by(&flights, AIRPLANE_REF);

        let mut rows = Vec::new();
        if airplanes.is_empty() {
            for (aref, total) in &flights_per_airplane {
                let (id, registration) = match aref.parse::<i64>() {
                    Ok(id) => (CellValue::Int(id), CellValue::Null),
                    Err(_) => (CellValue::Null, CellValue::from(aref.as_str())),
                };
                rows.push(vec![
                    id,
                    CellValue::Null,
                    registration,
                    CellValue::Null,
                    CellValue::Null,
                    CellValue::Null,
                    CellValue::Int(*total),
                    CellValue::Null,
                    CellValue::Null,
                ]);
            }
        } else {
            for row in &airplanes.rows {
                let total: i64 = [AIRPLANE_ID, REGISTRATION]
                    .iter()
                    .filter_map(|aliases| airplanes.find_column(aliases))
                    .filter_map(|c| key(&row[c]))
                    .map(|k| flights_per_airplane.get(&k).copied().unwrap_or(0))
                    .max()
                    .unwrap_or(0);
                rows.push(vec![
                    pick(&airplanes, row, AIRPLANE_ID),
                    pick(&airplanes, row, MODEL),
                    pick(&airplanes, row, REGISTRATION),
                    pick(&airplanes, row, DISTANCE),
                    pick(&airplanes, row, HOURS),
                    pick(&airplanes, row, FUEL),
                    CellValue::Int(total),
                    pick(&airplanes, row, LAST_CHECK),
                    pick(&airplanes, row, TAKEOFFS),
                ]);
            }
        }
        rows.sort_by(|a, b| cmp_desc(&a[6], &b[6]));
        for row in rows {
            out.push_row(row);
        }
        out
    }

    fn fuel_efficiency(&self) -> ResultTable {
        let airplanes = self.read_table("AIRPLANES");
        let mut out = ResultTable::with_schema(Metric::FuelEfficiency.schema());
        let Some(model) = airplanes.find_column(MODEL) else {
            return out;
        };
        let [fuel, distance, hours] = [FUEL, DISTANCE, HOURS].map(|a| airplanes.find_column(a));

        let ident = airplanes
            .find_column(AIRPLANE_ID)
            .or_else(|| airplanes.find_column(REGISTRATION));

        // per model: fuel, distance and hours aggregates plus the distinct airplanes seen
        let mut groups: BTreeMap<String, ([Agg; 3], HashSet<String>)> = BTreeMap::new();
        for (idx, row) in airplanes.rows.iter().enumerate() {
            let Some(name) = key(&row[model]) else {
                continue;
            };
            let (aggs, fleet) = groups.entry(name).or_default();
            fleet.insert(ident.and_then(|c| key(&row[c])).unwrap_or_else(|| format!("#{idx}")));
            for (agg, col) in aggs.iter_mut().zip([fuel, distance, hours]) {
                agg.add(col.and_then(|c| row[c].as_f64()));
            }
        }
        let mut models: Vec<(String, ([Agg; 3], HashSet<String>))> = groups.into_iter().collect();
        models.sort_by(|a, b| {
            let fa = a.1 .0[0].avg().unwrap_or(f64::MAX);
            let fb = b.1 .0[0].avg().unwrap_or(f64::MAX);
            fa.total_cmp(&fb)
        });
        for (name, ([fuel, distance, hours], fleet)) in models {
            out.push_row(vec![
                name.into(),
                CellValue::Int(fleet.len() as i64),
                fuel.avg().into(),
                distance.avg().into(),
                hours.avg().into(),
            ]);
        }
        out
    }

    fn maintenance_alerts(&self) -> ResultTable {
        let airplanes = self.read_table("AIRPLANES");
        let mut out = ResultTable::with_schema(Metric::MaintenanceAlerts.schema());
        let Some(takeoffs) = airplanes.find_column(TAKEOFFS) else {
            return out;
        };

        let mut rows: Vec<(i64, Vec<CellValue>)> = airplanes
            .rows
            .iter()
            .filter_map(|row| {
                let count = row[takeoffs].as_i64()?;
                (count >= MaintenanceStatus::MEDIUM_TAKEOFFS).then(|| {
                    (
                        count,
                        vec![
                            pick(&airplanes, row, AIRPLANE_ID),
                            pick(&airplanes, row, MODEL),
                            pick(&airplanes, row, REGISTRATION),
                            CellValue::Int(count),
                            MaintenanceStatus::from_takeoffs(count).as_str().into(),
                        ],
                    )
                })
            })
            .collect();
        rows.sort_by(|a, b| b.0.cmp(&a.0));
        for (_, row) in rows {
            out.push_row(row);
        }
        out
    }

    fn passenger_demographics(&self) -> ResultTable {
        let passengers = self.read_table("PASSENGERS");
        let mut out = ResultTable::with_schema(Metric::PassengerDemographics.schema());
        let Some(gender) = passengers.find_column(GENDER) else {
            return out;
        };
        let age = passengers.find_column(AGE);
        let weight = passengers.find_column(PASSENGER_COUNT);

        let mut groups: BTreeMap<String, (i64, Agg)> = BTreeMap::new();
        for row in &passengers.rows {
            let Some(g) = key(&row[gender]) else {
                continue;
            };
            let entry = groups.entry(g).or_default();
            entry.0 += weight.and_then(|c| row[c].as_i64()).unwrap_or(1);
            entry.1.add(age.and_then(|c| row[c].as_f64()));
        }
        for (g, (count, ages)) in groups {
            out.push_row(vec![
                g.into(),
                CellValue::Int(count),
                ages.avg().map(|a| round(a, 1)).into(),
                ages.min.map(|v| v as i64).into(),
                ages.max.map(|v| v as i64).into(),
            ]);
        }
        out
    }

    fn hr_metrics(&self) -> ResultTable {
        let employees = self.read_any(&["EMPLOYEES", "EMPLOYEE"]);
        let departments = self.read_any(&["DEPARTMENTS", "DEPARTMENT"]);
        let mut out = ResultTable::with_schema(Metric::HrMetrics.schema());

        let dept_key = employees
            .find_column(DEPARTMENT_ID)
            .or_else(|| employees.find_column(DEPARTMENT_NAME));
        let salary = employees.find_column(SALARY);
        let mut groups: BTreeMap<String, Agg> = BTreeMap::new();
        if let Some(dept_key) = dept_key {
            for row in &employees.rows {
                if let Some(k) = key(&row[dept_key]) {
                    groups.entry(k).or_default().add(salary.and_then(|c| row[c].as_f64()));
                }
            }
        }

        let mut rows = Vec::new();
        match departments.find_column(DEPARTMENT_ID) {
            Some(id_col) => {
                for row in &departments.rows {
                    let agg = key(&row[id_col]).and_then(|k| groups.get(&k));
                    rows.push(hr_row(
                        row[id_col].clone(),
                        pick(&departments, row, DEPARTMENT_NAME),
                        agg,
                    ));
                }
            }
            None => {
                let names = employees.find_column(DEPARTMENT_NAME);
                for (k, agg) in &groups {
                    let id = k.parse::<i64>().map_or(CellValue::Null, CellValue::Int);
                    let name = names
                        .and_then(|c| {
                            employees
                                .rows
                                .iter()
                                .find(|r| dept_key.and_then(|d| key(&r[d])).as_deref() == Some(k.as_str()))
                                .map(|r| r[c].clone())
                        })
                        .unwrap_or(CellValue::Null);
                    rows.push(hr_row(id, name, Some(agg)));
                }
            }
        }
        rows.sort_by(|a, b| cmp_desc(&a[3], &b[3]));
        for row in rows {
            out.push_row(row);
        }
        out
    }

    fn route_network(&self) -> ResultTable {
        let routes = self.read_table("ROUTES");
        let airports = self.read_table("AIRPORTS");
        let flights = self.read_table("FLIGHTS");
        let tickets = self.read_table("TICKETS");
        let mut out = ResultTable::with_schema(Metric::RouteNetwork.schema());
        if routes.is_empty() {
            return out;
        }

        let airport_rows: HashMap<String, usize> = airports
            .find_column(AIRPORT_ID)
            .map(|c| {
                airports
                    .rows
                    .iter()
                    .enumerate()
                    .filter_map(|(i, r)| key(&r[c]).map(|k| (k, i)))
                    .collect()
            })
            .unwrap_or_default();
        let airport = |id: &CellValue, aliases: &[&str]| -> CellValue {
            key(id)
                .and_then(|k| airport_rows.get(&k))
                .map(|&i| pick(&airports, &airports.rows[i], aliases))
                .unwrap_or(CellValue::Null)
        };

        let flights_per_route = count_by(&flights, ROUTE_ID);
        let route_of_flight: HashMap<String, String> =
            match (flights.find_column(FLIGHT_ID), flights.find_column(ROUTE_ID)) {
                (Some(f), Some(r)) => flights
                    .rows
                    .iter()
                    .filter_map(|row| Some((key(&row[f])?, key(&row[r])?)))
                    .collect(),
                _ => HashMap::new(),
            };
        let mut passengers_per_route: HashMap<String, i64> = HashMap::new();
        if let Some(f) = tickets.find_column(FLIGHT_ID) {
            for row in &tickets.rows {
                if let Some(route) = key(&row[f]).and_then(|id| route_of_flight.get(&id)) {
                    *passengers_per_route.entry(route.clone()).or_default() += 1;
                }
            }
        }

        let mut rows = Vec::new();
        for row in &routes.rows {
            let route_id = pick(&routes, row, ROUTE_ID);
            let origin_id = pick(&routes, row, ORIGIN_ID);
            let destination_id = pick(&routes, row, DESTINATION_ID);
            let (origin, destination) = endpoints(&routes, row);
            let or_airport = |own: CellValue, id: &CellValue, aliases: &[&str]| {
                if own.is_null() {
                    airport(id, aliases)
                } else {
                    own
                }
            };
            let route_key = key(&route_id).unwrap_or_default();
            rows.push(vec![
                route_id.clone(),
                origin_id.clone(),
                or_airport(origin, &origin_id, AIRPORT_NAME),
                or_airport(pick(&routes, row, ORIGIN_LAT), &origin_id, LATITUDE),
                or_airport(pick(&routes, row, ORIGIN_LON), &origin_id, LONGITUDE),
                destination_id.clone(),
                or_airport(destination, &destination_id, AIRPORT_NAME),
                or_airport(pick(&routes, row, DESTINATION_LAT), &destination_id, LATITUDE),
                or_airport(pick(&routes, row, DESTINATION_LON), &destination_id, LONGITUDE),
                CellValue::Int(flights_per_route.get(&route_key).copied().unwrap_or(0)),
                CellValue::Int(passengers_per_route.get(&route_key).copied().unwrap_or(0)),
            ]);
        }
        rows.sort_by(|a, b| cmp_desc(&a[9], &b[9]));
        for row in rows {
            out.push_row(row);
        }
        out
    }

    /// Column metadata of one table, taken from the first readable file.
    pub fn columns_of(&self, table: &str) -> AppResult<Vec<ColumnEntry>> {
        let files = self.table_files(table);
        if files.is_empty() {
            return Err(AppError::NotFound(format!("local table {table}")));
        }
        let mut last_error = None;
        for path in &files {
            match parquet_columns(path, table) {
                Ok(columns) => return Ok(columns),
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.unwrap_or_else(|| AppError::NotFound(format!("local table {table}"))))
    }
}

#[async_trait]
impl MetricSource for LocalConnector {
    async fn fetch(&self, metric: Metric) -> ResultTable {
        let connector = self.clone();
        match tokio::task::spawn_blocking(move || connector.compute(metric)).await {
            Ok(table) => table,
            Err(e) => {
                tracing::warn!(metric = %metric, error = %e, "local computation failed");
                ResultTable::with_schema(metric.schema())
            }
        }
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Local
    }

    fn describe(&self) -> String {
        format!("parquet:{}", self.data_dir.display())
    }

    async fn execute_query(&self, _sql: &str) -> AppResult<ResultTable> {
        Err(AppError::Validation(
            "custom SQL needs a database connection; local datasets are read-only files".into(),
        ))
    }

    async fn list_tables(&self, _schema: Option<&str>) -> AppResult<Vec<TableEntry>> {
        Ok(self
            .table_names()
            .into_iter()
            .map(|name| TableEntry {
                schema: String::new(),
                name,
                kind: TableKind::Table,
            })
            .collect())
    }

    async fn table_columns(&self, _schema: Option<&str>, table: &str) -> AppResult<Vec<ColumnEntry>> {
        let connector = self.clone();
        let table = table.to_string();
        tokio::task::spawn_blocking(move || connector.columns_of(&table))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?
    }
}

/// Running count, sum, min and max of one column within a group.
#[derive(Debug, Default, Clone, Copy)]
struct Agg {
    rows: i64,
    values: i64,
    sum: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl Agg {
    fn add(&mut self, value: Option<f64>) {
        self.rows += 1;
        if let Some(v) = value {
            self.values += 1;
            self.sum += v;
            self.min = Some(self.min.map_or(v, |m| m.min(v)));
            self.max = Some(self.max.map_or(v, |m| m.max(v)));
        }
    }

    fn avg(&self) -> Option<f64> {
        (self.values > 0).then(|| self.sum / self.values as f64)
    }
}

/// Airplane rows addressable by id or registration.
struct AirplaneIndex<'a> {
    table: &'a ResultTable,
    rows: HashMap<String, usize>,
}

impl<'a> AirplaneIndex<'a> {
    fn new(table: &'a ResultTable) -> Self {
        let mut rows = HashMap::new();
        for aliases in [AIRPLANE_ID, REGISTRATION] {
            if let Some(c) = table.find_column(aliases) {
                for (i, row) in table.rows.iter().enumerate() {
                    if let Some(k) = key(&row[c]) {
                        rows.entry(k).or_insert(i);
                    }
                }
            }
        }
        Self { table, rows }
    }

    fn value(&self, airplane: &str, aliases: &[&str]) -> Option<&'a CellValue> {
        let row = *self.rows.get(airplane)?;
        let col = self.table.find_column(aliases)?;
        Some(&self.table.rows[row][col])
    }
}

fn hr_row(id: CellValue, name: CellValue, agg: Option<&Agg>) -> Vec<CellValue> {
    let (headcount, total, avg) = match agg {
        Some(agg) => (agg.rows, agg.sum, agg.avg()),
        None => (0, 0.0, None),
    };
    vec![id, name, CellValue::Int(headcount), CellValue::Float(total), avg.into()]
}

/// Grouping key of a cell; `None` for NULL.
fn key(cell: &CellValue) -> Option<String> {
    (!cell.is_null()).then(|| cell.to_string())
}

/// Cell of the first alias column present, or NULL.
fn pick(table: &ResultTable, row: &[CellValue], aliases: &[&str]) -> CellValue {
    table
        .find_column(aliases)
        .map(|c| row[c].clone())
        .unwrap_or(CellValue::Null)
}

/// Row counts grouped by the first alias column present.
fn count_by(table: &ResultTable, aliases: &[&str]) -> BTreeMap<String, i64> {
    let mut counts = BTreeMap::new();
    if let Some(c) = table.find_column(aliases) {
        for row in &table.rows {
            if let Some(k) = key(&row[c]) {
                *counts.entry(k).or_default() += 1;
            }
        }
    }
    counts
}

/// Origin and destination of a flight or route row, from explicit columns
/// or from an `ORIG-DEST` route code.
fn endpoints(table: &ResultTable, row: &[CellValue]) -> (CellValue, CellValue) {
    let origin = pick(table, row, ORIGIN);
    let destination = pick(table, row, DESTINATION);
    if !origin.is_null() || !destination.is_null() {
        return (origin, destination);
    }
    match table.find_column(ROUTE_CODE).and_then(|c| row[c].as_str()) {
        Some(code) => {
            let (o, d) = split_route(code);
            (o.into(), d.into())
        }
        None => (CellValue::Null, CellValue::Null),
    }
}

fn split_route(code: &str) -> (&str, &str) {
    code.split_once('-').unwrap_or((code, ""))
}

fn round(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}

fn cmp_desc(a: &CellValue, b: &CellValue) -> std::cmp::Ordering {
    let a = a.as_f64().unwrap_or(f64::MIN);
    let b = b.as_f64().unwrap_or(f64::MIN);
    b.total_cmp(&a)
}

fn read_parquet(path: &Path) -> AppResult<ResultTable> {
    let reader = open(path)?;
    let columns = reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .root_schema()
        .get_fields()
        .iter()
        .map(|f| ColumnInfo::new(f.name(), ColumnType::Unknown))
        .collect();
    let mut table = ResultTable::new(columns);
    let rows = reader
        .get_row_iter(None)
        .map_err(|e| AppError::LocalData(format!("{}: {e}", path.display())))?;
    for row in rows {
        let row = row.map_err(|e| AppError::LocalData(format!("{}: {e}", path.display())))?;
        table.push_row(row.get_column_iter().map(|(_, field)| field_to_cell(field)).collect());
    }
    table.infer_types();
    Ok(table)
}

fn parquet_columns(path: &Path, table: &str) -> AppResult<Vec<ColumnEntry>> {
    let reader = open(path)?;
    let schema = reader.metadata().file_metadata().schema_descr();
    let columns = schema
        .root_schema()
        .get_fields()
        .iter()
        .enumerate()
        .map(|(idx, field)| {
            let info = field.get_basic_info();
            let type_name = match info.logical_type() {
                Some(logical) => format!("{logical:?}"),
                None if field.is_primitive() => format!("{:?}", field.get_physical_type()),
                None => "GROUP".to_string(),
            };
            ColumnEntry {
                table: table.to_string(),
                position: idx as i64 + 1,
                name: field.name().to_string(),
                type_name,
                nullable: info.has_repetition() && info.repetition() == Repetition::OPTIONAL,
            }
        })
        .collect();
    Ok(columns)
}

fn open(path: &Path) -> AppResult<SerializedFileReader<File>> {
    let file = File::open(path)?;
    SerializedFileReader::new(file).map_err(|e| AppError::LocalData(format!("{}: {e}", path.display())))
}

/// Days between 0001-01-01 and 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

fn field_to_cell(field: &Field) -> CellValue {
    match field {
        Field::Null => CellValue::Null,
        Field::Bool(v) => CellValue::Bool(*v),
        Field::Byte(v) => CellValue::Int(i64::from(*v)),
        Field::Short(v) => CellValue::Int(i64::from(*v)),
        Field::Int(v) => CellValue::Int(i64::from(*v)),
        Field::Long(v) => CellValue::Int(*v),
        Field::UByte(v) => CellValue::Int(i64::from(*v)),
        Field::UShort(v) => CellValue::Int(i64::from(*v)),
        Field::UInt(v) => CellValue::Int(i64::from(*v)),
        Field::ULong(v) => i64::try_from(*v).map_or(CellValue::Float(*v as f64), CellValue::Int),
        Field::Float(v) => CellValue::Float(f64::from(*v)),
        Field::Double(v) => CellValue::Float(*v),
        Field::Decimal(d) => decimal_to_f64(d.data(), d.scale()).map_or(CellValue::Null, CellValue::Float),
        Field::Str(s) => CellValue::Text(s.clone()),
        Field::Date(days) => days
            .checked_add(UNIX_EPOCH_DAYS_FROM_CE)
            .and_then(NaiveDate::from_num_days_from_ce_opt)
            .map_or(CellValue::Null, CellValue::Date),
        Field::TimestampMillis(ms) => DateTime::from_timestamp_millis(*ms)
            .map_or(CellValue::Null, |ts| CellValue::Timestamp(ts.naive_utc())),
        Field::TimestampMicros(us) => DateTime::from_timestamp_micros(*us)
            .map_or(CellValue::Null, |ts| CellValue::Timestamp(ts.naive_utc())),
        _ => CellValue::Null,
    }
}

/// Big-endian two's complement unscaled value.
fn decimal_to_f64(bytes: &[u8], scale: i32) -> Option<f64> {
    if bytes.is_empty() || bytes.len() > 16 {
        return None;
    }
    let mut value: i128 = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
    for b in bytes {
        value = (value << 8) | i128::from(*b);
    }
    Some(value as f64 / 10f64.powi(scale))
}

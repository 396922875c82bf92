//! Deterministic sample tables.
//!
//! Served once the live store has failed. Randomised tables use a fresh
//! `StdRng` seeded with [`SAMPLE_SEED`] on every call, so two calls return
//! identical tables (apart from `financial_trends`, which is anchored to
//! today's date).

use chrono::{Duration, Local, NaiveDate};
use common::models::metric::Metric;
use common::models::table::{CellValue, ColumnInfo, ResultTable};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

pub const SAMPLE_SEED: u64 = 42;

/// Sample table for `metric`, shaped like its documented schema.
pub fn sample_table(metric: Metric) -> ResultTable {
    sample_table_at(metric, Local::now().date_naive())
}

/// Same as [`sample_table`] with an explicit "today" for the date series.
pub fn sample_table_at(metric: Metric, today: NaiveDate) -> ResultTable {
    let columns = match metric {
        Metric::TotalRevenue => vec![floats([15_750_000.0])],
        Metric::RevenueByRoute => revenue_by_route(),
        Metric::LoadFactor => load_factor(),
        Metric::FleetUtilization => fleet_utilization(),
        Metric::FuelEfficiency => vec![
            texts(["Boeing 787", "Airbus A350", "Boeing 747", "Airbus A380"]),
            ints([12, 8, 10, 5]),
            floats([5100.0, 5300.0, 6500.0, 7000.0]),
            floats([450_000.0, 420_000.0, 380_000.0, 400_000.0]),
            floats([4200.0, 3800.0, 3500.0, 3700.0]),
        ],
        Metric::MaintenanceAlerts => maintenance_alerts(),
        Metric::PassengerDemographics => vec![
            texts(["M", "F"]),
            ints([52_000, 48_000]),
            floats([42.5, 38.2]),
            ints([18, 18]),
            ints([82, 85]),
        ],
        Metric::HrMetrics => vec![
            ints([1, 2, 3, 4]),
            texts([
                "Flight Operations",
                "Maintenance",
                "Customer Service",
                "Administration",
            ]),
            ints([350, 450, 280, 120]),
            floats([12_600_000.0, 13_500_000.0, 7_840_000.0, 4_200_000.0]),
            floats([36_000.0, 30_000.0, 28_000.0, 35_000.0]),
        ],
        Metric::RouteNetwork => route_network(),
        Metric::FinancialTrends => financial_trends(today),
    };
    with_schema(metric, columns)
}

fn with_schema(metric: Metric, columns: Vec<Vec<CellValue>>) -> ResultTable {
    let columns = metric
        .schema()
        .iter()
        .map(ColumnInfo::from)
        .zip(columns)
        .collect();
    ResultTable::from_columns(columns)
}

fn seeded() -> StdRng {
    StdRng::seed_from_u64(SAMPLE_SEED)
}

fn ints<I: IntoIterator<Item = i64>>(values: I) -> Vec<CellValue> {
    values.into_iter().map(CellValue::Int).collect()
}

fn floats<I: IntoIterator<Item = f64>>(values: I) -> Vec<CellValue> {
    values.into_iter().map(CellValue::Float).collect()
}

fn texts<'a, I: IntoIterator<Item = &'a str>>(values: I) -> Vec<CellValue> {
    values.into_iter().map(CellValue::from).collect()
}

fn pick<T: Copy>(rng: &mut StdRng, choices: &[T], n: usize) -> Vec<T> {
    // choices are never empty
    (0..n)
        .filter_map(|_| choices.choose(rng).copied())
        .collect()
}

fn int_range(rng: &mut StdRng, low: i64, high: i64, n: usize) -> Vec<CellValue> {
    ints((0..n).map(|_| rng.random_range(low..high)))
}

fn float_range(rng: &mut StdRng, low: f64, high: f64, n: usize) -> Vec<CellValue> {
    floats((0..n).map(|_| rng.random_range(low..high)))
}

fn revenue_by_route() -> Vec<Vec<CellValue>> {
    vec![
        ints(1..=10),
        texts(["JFK", "LAX", "ORD", "DFW", "ATL", "DEN", "SFO", "MIA", "BOS", "LAS"]),
        texts(["LAX", "JFK", "MIA", "LAX", "JFK", "LAX", "LAX", "NYC", "LAX", "LAS"]),
        floats([
            2_500_000.0,
            2_200_000.0,
            1_800_000.0,
            1_650_000.0,
            1_500_000.0,
            1_400_000.0,
            1_300_000.0,
            1_200_000.0,
            1_100_000.0,
            1_000_000.0,
        ]),
        ints([5000, 4400, 3600, 3300, 3000, 2800, 2600, 2400, 2200, 2000]),
        floats([500.0; 10]),
    ]
}

fn load_factor() -> Vec<Vec<CellValue>> {
    const FLIGHTS: usize = 200;
    let mut rng = seeded();
    vec![
        ints(1..=FLIGHTS as i64),
        texts(pick(&mut rng, &["JFK", "LAX", "ORD", "DFW", "ATL"], FLIGHTS)),
        texts(pick(&mut rng, &["LAX", "JFK", "MIA", "ORD", "DEN"], FLIGHTS)),
        ints(pick(&mut rng, &[150, 180, 200, 250], FLIGHTS)),
        int_range(&mut rng, 100, 250, FLIGHTS),
        float_range(&mut rng, 65.0, 95.0, FLIGHTS),
    ]
}

fn fleet_utilization() -> Vec<Vec<CellValue>> {
    const AIRCRAFT: usize = 30;
    let mut rng = seeded();
    vec![
        ints(1..=AIRCRAFT as i64),
        texts(pick(
            &mut rng,
            &["Boeing 747", "Boeing 787", "Airbus A380", "Airbus A350"],
            AIRCRAFT,
        )),
        (0..AIRCRAFT)
            .map(|i| CellValue::Text(format!("N{}", 1000 + i)))
            .collect(),
        int_range(&mut rng, 100_000, 500_000, AIRCRAFT),
        int_range(&mut rng, 1000, 5000, AIRCRAFT),
        float_range(&mut rng, 4000.0, 8000.0, AIRCRAFT),
        int_range(&mut rng, 50, 300, AIRCRAFT),
        int_range(&mut rng, 0, 1000, AIRCRAFT),
        int_range(&mut rng, 300, 950, AIRCRAFT),
    ]
}

fn maintenance_alerts() -> Vec<Vec<CellValue>> {
    vec![
        ints([1, 5, 8, 12, 15, 18]),
        texts([
            "Boeing 747",
            "Airbus A380",
            "Boeing 787",
            "Airbus A350",
            "Boeing 747",
            "Airbus A380",
        ]),
        texts(["N1001", "N1005", "N1008", "N1012", "N1015", "N1018"]),
        ints([950, 900, 850, 800, 750, 700]),
        texts(["CRITICAL", "CRITICAL", "HIGH", "HIGH", "MEDIUM", "MEDIUM"]),
    ]
}

fn route_network() -> Vec<Vec<CellValue>> {
    const ROUTES: usize = 20;
    let mut rng = seeded();
    let origin = texts(pick(&mut rng, &["JFK", "LAX", "ORD", "DFW", "ATL"], ROUTES));
    let origin_lat = float_range(&mut rng, 25.0, 45.0, ROUTES);
    let origin_lon = float_range(&mut rng, -125.0, -70.0, ROUTES);
    let destination = texts(pick(&mut rng, &["LAX", "JFK", "MIA", "ORD", "DEN"], ROUTES));
    let destination_lat = float_range(&mut rng, 25.0, 45.0, ROUTES);
    let destination_lon = float_range(&mut rng, -125.0, -70.0, ROUTES);
    vec![
        ints(1..=ROUTES as i64),
        ints(1..=ROUTES as i64),
        origin,
        origin_lat,
        origin_lon,
        ints(21..=40),
        destination,
        destination_lat,
        destination_lon,
        int_range(&mut rng, 50, 300, ROUTES),
        int_range(&mut rng, 5000, 50_000, ROUTES),
    ]
}

fn financial_trends(today: NaiveDate) -> Vec<Vec<CellValue>> {
    const DAYS: i64 = 30;
    let mut rng = seeded();
    vec![
        (0..DAYS)
            .map(|i| CellValue::Date(today - Duration::days(DAYS - 1 - i)))
            .collect(),
        int_range(&mut rng, 200, 500, DAYS as usize),
        floats((0..DAYS).map(|_| rng.random_range(500_000..1_500_000) as f64)),
        float_range(&mut rng, 400.0, 600.0, DAYS as usize),
    ]
}

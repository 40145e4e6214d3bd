//! Batch and benchmark runners behind the command line.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use chrono::Utc;
use tracing::info;

use crate::config::KitchenConfig;
use crate::kitchen::Kitchen;
use crate::orders::{bundled_orders, load_orders, synthetic_orders};
use crate::types::WorkerKind;

const BENCH_DEFAULT_ORDERS: usize = 6;
const BENCH_DEFAULT_TOPPINGS: usize = 2;
const BENCH_DEFAULT_TIME_SCALE: f64 = 0.01;

/// Best-effort CPU user/system time snapshot (seconds) on Unix platforms.
#[cfg(unix)]
fn cpu_times_seconds() -> Option<(f64, f64)> {
    use libc::{RUSAGE_SELF, getrusage, rusage};
    // SAFETY: rusage is plain old data; all-zero is a valid value.
    let mut usage: rusage = unsafe { std::mem::zeroed() };
    // SAFETY: `usage` is a valid, exclusively borrowed rusage for the call.
    let rc = unsafe { getrusage(RUSAGE_SELF, &mut usage) };
    if rc != 0 {
        return None;
    }
    let user = usage.ru_utime.tv_sec as f64 + (usage.ru_utime.tv_usec as f64 / 1_000_000.0);
    let sys = usage.ru_stime.tv_sec as f64 + (usage.ru_stime.tv_usec as f64 / 1_000_000.0);
    Some((user, sys))
}

/// Stub on non-Unix platforms.
#[cfg(not(unix))]
fn cpu_times_seconds() -> Option<(f64, f64)> {
    None
}

/// The kitchen is a single-threaded cooperative simulation.
fn build_runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("failed to build tokio runtime")
}

fn load_config(path: Option<&Path>, time_scale: Option<f64>) -> anyhow::Result<KitchenConfig> {
    let config = match path {
        Some(path) => KitchenConfig::from_json_file(path)
            .with_context(|| format!("failed to load kitchen config {}", path.display()))?,
        None => KitchenConfig::default(),
    };
    match time_scale {
        Some(factor) => Ok(config.scaled(factor)?),
        None => Ok(config),
    }
}

/// Options of the `run` command; `None` keeps the default.
#[derive(Debug, Default)]
pub struct RunOptions {
    pub orders_path: Option<PathBuf>,
    pub time_scale: Option<f64>,
    pub config_path: Option<PathBuf>,
}

/// Process one batch of orders and print the final report.
pub fn run_orders(options: RunOptions) -> anyhow::Result<()> {
    let specs = match options.orders_path.as_deref() {
        Some(path) => load_orders(path)
            .with_context(|| format!("failed to load orders from {}", path.display()))?,
        None => bundled_orders().context("bundled order list is invalid")?,
    };
    let config = load_config(options.config_path.as_deref(), options.time_scale)?;
    let kitchen = Kitchen::new(&config)?;
    let runtime = build_runtime()?;

    info!(
        "PRM process started at {} for {} input orders",
        Utc::now().to_rfc2822(),
        specs.len()
    );
    let report = runtime.block_on(kitchen.run_batch(&specs))?;

    print!("{report}");
    println!("DONE");
    Ok(())
}

/// Aggregated metrics from a single benchmark run.
struct BenchResult {
    orders: usize,
    toppings_per_order: usize,
    time_scale: f64,
    elapsed_s: f64,
    throughput: f64,
    avg_order_s: f64,
    cpu_user_s: Option<f64>,
    cpu_sys_s: Option<f64>,
    peaks: [usize; WorkerKind::COUNT],
    capacity_violation: bool,
    incomplete_toppings: usize,
}

fn benchmark_once(
    orders: usize,
    toppings_per_order: usize,
    time_scale: f64,
) -> anyhow::Result<BenchResult> {
    let config = KitchenConfig::default().scaled(time_scale)?;
    let kitchen = Kitchen::new(&config)?;
    let runtime = build_runtime()?;
    let specs = synthetic_orders(orders, toppings_per_order);

    let cpu_start = cpu_times_seconds();
    let report = runtime.block_on(kitchen.run_batch(&specs))?;
    let (cpu_user_s, cpu_sys_s) = match (cpu_start, cpu_times_seconds()) {
        (Some((user_start, sys_start)), Some((user_end, sys_end))) => {
            (Some(user_end - user_start), Some(sys_end - sys_start))
        }
        _ => (None, None),
    };

    let elapsed_s = report.elapsed_secs();
    let throughput = if elapsed_s > 0.0 {
        orders as f64 / elapsed_s
    } else {
        0.0
    };
    let avg_order_s = if orders > 0 {
        report.orders.iter().map(|o| o.total_secs()).sum::<f64>() / orders as f64
    } else {
        0.0
    };
    let mut peaks = [0usize; WorkerKind::COUNT];
    let mut capacity_violation = false;
    for (kind, occupancy) in kitchen.occupancy() {
        peaks[kind.index()] = occupancy.peak;
        capacity_violation |= occupancy.violation;
    }
    let incomplete_toppings = report
        .orders
        .iter()
        .map(|o| toppings_per_order.saturating_sub(o.toppings_completed))
        .sum();

    Ok(BenchResult {
        orders,
        toppings_per_order,
        time_scale,
        elapsed_s,
        throughput,
        avg_order_s,
        cpu_user_s,
        cpu_sys_s,
        peaks,
        capacity_violation,
        incomplete_toppings,
    })
}

/// Run one synthetic batch and print a CSV line of timing and occupancy figures.
pub fn run_benchmark(
    orders: Option<usize>,
    toppings_per_order: Option<usize>,
    time_scale: Option<f64>,
    validate: bool,
) -> anyhow::Result<()> {
    let orders = orders.unwrap_or(BENCH_DEFAULT_ORDERS);
    let toppings_per_order = toppings_per_order.unwrap_or(BENCH_DEFAULT_TOPPINGS);
    let time_scale = time_scale.unwrap_or(BENCH_DEFAULT_TIME_SCALE);
    if orders == 0 {
        bail!("benchmark error: orders must be > 0");
    }
    let result = benchmark_once(orders, toppings_per_order, time_scale)?;

    println!(
        "orders,toppings_per_order,time_scale,elapsed_s,throughput_orders_per_s,avg_order_s,cpu_user_s,cpu_sys_s,peak_dough,peak_topping,peak_oven,peak_waiter,capacity_violation"
    );
    let cpu_user = result
        .cpu_user_s
        .map(|v| format!("{v:.4}"))
        .unwrap_or_else(|| "NA".to_string());
    let cpu_sys = result
        .cpu_sys_s
        .map(|v| format!("{v:.4}"))
        .unwrap_or_else(|| "NA".to_string());
    let peak = |kind: WorkerKind| result.peaks[kind.index()];
    println!(
        "{},{},{},{:.3},{:.2},{:.3},{},{},{},{},{},{},{}",
        result.orders,
        result.toppings_per_order,
        result.time_scale,
        result.elapsed_s,
        result.throughput,
        result.avg_order_s,
        cpu_user,
        cpu_sys,
        peak(WorkerKind::Dough),
        peak(WorkerKind::Topping),
        peak(WorkerKind::Oven),
        peak(WorkerKind::Waiter),
        result.capacity_violation
    );
    if validate {
        if result.capacity_violation {
            eprintln!("# violation,worker_capacity");
        }
        if result.incomplete_toppings > 0 {
            eprintln!("# violation,incomplete_toppings,{}", result.incomplete_toppings);
        }
    }
    Ok(())
}

//! Batch orchestration: one concurrent pipeline per order over a shared pool.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::info;

use crate::config::KitchenConfig;
use crate::error::Result;
use crate::orders::build_order;
use crate::personnel::{Occupancy, WorkerPool};
use crate::pipeline::{OrderPipeline, OrderTiming, StagePlan};
use crate::types::{OrderSpec, WorkerKind};

/// Result of a whole batch, rendered as the final report.
#[derive(Clone, Debug)]
pub struct BatchReport {
    pub completed_at: DateTime<Utc>,
    /// First pipeline launch to last completion.
    pub elapsed: Duration,
    /// One entry per order, in input order.
    pub orders: Vec<OrderTiming>,
}

impl BatchReport {
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ORDERS REPORT")?;
        writeln!(
            f,
            "Orders completed at {}. Total processing time is {:.3} s.",
            self.completed_at.to_rfc2822(),
            self.elapsed_secs()
        )?;
        for order in &self.orders {
            writeln!(
                f,
                "Total preparation time for order \"{}\" is {:.3}s. and total processing time is {:.3}s.",
                order.name,
                order.total_secs(),
                order.stage_sum_secs()
            )?;
        }
        Ok(())
    }
}

pub struct Kitchen {
    pool: Arc<WorkerPool>,
    plan: StagePlan,
}

impl Kitchen {
    pub fn new(config: &KitchenConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            pool: Arc::new(WorkerPool::new(config)),
            plan: StagePlan::from_config(config),
        })
    }

    #[cfg(test)]
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn occupancy(&self) -> Vec<(WorkerKind, Occupancy)> {
        WorkerKind::ALL
            .iter()
            .map(|&kind| (kind, self.pool.occupancy(kind)))
            .collect()
    }

    /// Run every order concurrently and collect their timings in input order.
    ///
    /// All specs are validated before the first pipeline starts.
    pub async fn run_batch(&self, specs: &[OrderSpec]) -> Result<BatchReport> {
        let orders = specs
            .iter()
            .enumerate()
            .map(|(index, spec)| build_order(index, spec))
            .collect::<Result<Vec<_>>>()?;
        info!(orders = orders.len(), "kitchen batch started");

        let start = Instant::now();
        let handles: Vec<_> = orders
            .into_iter()
            .map(|order| {
                let mut pipeline = OrderPipeline::new(order, Arc::clone(&self.pool), self.plan);
                tokio::spawn(async move { pipeline.run().await })
            })
            .collect();

        let mut timings = Vec::with_capacity(handles.len());
        for handle in handles {
            timings.push(handle.await??);
        }
        let elapsed = start.elapsed();

        Ok(BatchReport {
            completed_at: Utc::now(),
            elapsed,
            orders: timings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 0.05;

    fn assert_secs(actual: f64, expected: f64) {
        assert!(
            actual >= expected && actual - expected < TOLERANCE,
            "expected ~{expected}s, got {actual}s"
        );
    }

    fn kitchen() -> Kitchen {
        Kitchen::new(&KitchenConfig::default()).expect("default config is valid")
    }

    fn dough(timing: &OrderTiming) -> &crate::stage::StageRecord {
        timing
            .stages_of(WorkerKind::Dough)
            .next()
            .expect("every order has a dough stage")
    }

    #[tokio::test(start_paused = true)]
    async fn single_margherita_scenario() {
        crate::logging::init_test();
        let report = kitchen()
            .run_batch(&[OrderSpec::new("Margherita", ["tomato", "mozzarella"])])
            .await
            .expect("batch");

        assert_eq!(report.orders.len(), 1);
        assert_secs(report.orders[0].total_secs(), 26.0);
        assert_secs(report.orders[0].stage_sum_secs(), 30.0);
        assert_secs(report.elapsed_secs(), 26.0);
    }

    #[tokio::test(start_paused = true)]
    async fn third_dough_waits_for_a_free_dough_worker() {
        let specs = [
            OrderSpec::new("A", ["basil"]),
            OrderSpec::new("B", ["olives"]),
            OrderSpec::new("C", ["ham"]),
        ];
        let report = kitchen().run_batch(&specs).await.expect("batch");

        let mut doughs: Vec<_> = report.orders.iter().map(dough).collect();
        doughs.sort_by_key(|record| record.started_at);
        let last = doughs[2];
        let earliest_release = doughs[0].finished_at.min(doughs[1].finished_at);
        assert!(last.started_at >= earliest_release);
        assert!(last.started_at > doughs[0].started_at);
    }

    #[tokio::test(start_paused = true)]
    async fn report_keeps_input_order() {
        let specs = [
            OrderSpec::new("Quattro Formaggi", ["a", "b", "c", "d"]),
            OrderSpec::new("Marinara", Vec::<String>::new()),
            OrderSpec::new("Funghi", ["mushrooms"]),
        ];
        let report = kitchen().run_batch(&specs).await.expect("batch");

        let names: Vec<&str> = report.orders.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["Quattro Formaggi", "Marinara", "Funghi"]);

        let rendered = report.to_string();
        assert!(rendered.starts_with("ORDERS REPORT\n"));
        let quattro = rendered.find("\"Quattro Formaggi\"").expect("quattro line");
        let marinara = rendered.find("\"Marinara\"").expect("marinara line");
        let funghi = rendered.find("\"Funghi\"").expect("funghi line");
        assert!(quattro < marinara && marinara < funghi);
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_is_never_exceeded() {
        let kitchen = kitchen();
        let specs: Vec<OrderSpec> = (0..8)
            .map(|id| OrderSpec::new(format!("order-{id}"), ["x", "y", "z"]))
            .collect();
        let report = kitchen.run_batch(&specs).await.expect("batch");
        assert_eq!(report.orders.len(), 8);

        let config = KitchenConfig::default();
        for (kind, occupancy) in kitchen.occupancy() {
            assert!(!occupancy.violation, "{kind} over capacity");
            assert!(occupancy.peak <= config.station(kind).workers);
            assert_eq!(occupancy.in_use, 0);
            assert_eq!(kitchen.pool().available(kind), config.station(kind).workers);
        }
        // Enough demand to saturate every station at some point.
        assert_eq!(kitchen.pool().occupancy(WorkerKind::Topping).peak, 3);
        assert_eq!(kitchen.pool().occupancy(WorkerKind::Dough).peak, 2);
        assert!(report.orders.iter().all(|o| o.toppings_completed == 3));
    }

    #[tokio::test(start_paused = true)]
    async fn stage_sum_is_independent_of_other_orders() {
        let margherita = OrderSpec::new("Margherita", ["tomato", "mozzarella"]);
        let alone = kitchen()
            .run_batch(std::slice::from_ref(&margherita))
            .await
            .expect("alone");

        let crowded_specs = [
            OrderSpec::new("Pepperoni", ["tomato", "mozzarella", "pepperoni"]),
            OrderSpec::new("Funghi", ["mushrooms"]),
            margherita.clone(),
            OrderSpec::new("Marinara", Vec::<String>::new()),
        ];
        let crowded = kitchen().run_batch(&crowded_specs).await.expect("crowded");

        let sum_alone = alone.orders[0].stage_sum_secs();
        let sum_crowded = crowded.orders[2].stage_sum_secs();
        assert!((sum_alone - sum_crowded).abs() < TOLERANCE);
        // Contention only ever adds waiting time to the total.
        assert!(crowded.orders[2].total_secs() >= alone.orders[0].total_secs());
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_batches_give_identical_stage_sums() {
        let specs = [
            OrderSpec::new("Margherita", ["tomato", "mozzarella"]),
            OrderSpec::new("Funghi", ["mushrooms"]),
            OrderSpec::new("Plain", Vec::<String>::new()),
        ];
        let first = kitchen().run_batch(&specs).await.expect("first run");
        let second = kitchen().run_batch(&specs).await.expect("second run");

        for (a, b) in first.orders.iter().zip(&second.orders) {
            assert_eq!(a.name, b.name);
            assert!((a.stage_sum_secs() - b.stage_sum_secs()).abs() < TOLERANCE);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn plain_order_in_batch() {
        let report = kitchen()
            .run_batch(&[OrderSpec::new("Plain", Vec::<String>::new())])
            .await
            .expect("batch");
        assert_secs(report.orders[0].total_secs(), 7.0 + 10.0 + 5.0);
        assert_eq!(report.orders[0].stages_of(WorkerKind::Topping).count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_order_fails_before_anything_runs() {
        let kitchen = kitchen();
        let specs = [
            OrderSpec::new("Margherita", ["tomato"]),
            OrderSpec::new("", ["tomato"]),
        ];
        let err = kitchen.run_batch(&specs).await.expect_err("blank name");
        assert!(matches!(
            err,
            crate::error::KitchenError::MalformedOrder { index: 1, .. }
        ));
        assert_eq!(kitchen.pool().occupancy(WorkerKind::Dough).peak, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_batch_reports_no_orders() {
        let report = kitchen().run_batch(&[]).await.expect("empty batch");
        assert!(report.orders.is_empty());
        assert_eq!(report.to_string().lines().count(), 2);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = KitchenConfig::default();
        config.stations.waiter.workers = 0;
        assert!(Kitchen::new(&config).is_err());
    }
}

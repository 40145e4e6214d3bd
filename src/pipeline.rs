//! Per-order pipeline: dough, toppings (fan-out/fan-in), oven, serving.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::debug;

use crate::config::KitchenConfig;
use crate::error::Result;
use crate::personnel::WorkerPool;
use crate::stage::{Stage, StageRecord};
use crate::types::{Order, WorkerKind};

/// The four stages every order goes through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StagePlan {
    pub dough: Stage,
    pub topping: Stage,
    pub oven: Stage,
    pub serving: Stage,
}

impl StagePlan {
    pub fn from_config(config: &KitchenConfig) -> Self {
        let stage = |kind| Stage::new(kind, config.station(kind).duration());
        Self {
            dough: stage(WorkerKind::Dough),
            topping: stage(WorkerKind::Topping),
            oven: stage(WorkerKind::Oven),
            serving: stage(WorkerKind::Waiter),
        }
    }
}

/// Timing of one finished order.
#[derive(Clone, Debug)]
pub struct OrderTiming {
    pub name: String,
    /// Wall time from pipeline start to the end of serving.
    pub total: Duration,
    /// Sum of every stage's own elapsed time, toppings included.
    pub stage_sum: Duration,
    pub toppings_completed: usize,
    /// Stage records in execution order; toppings keep the order's topping order.
    pub stages: Vec<StageRecord>,
}

impl OrderTiming {
    pub fn total_secs(&self) -> f64 {
        self.total.as_secs_f64()
    }

    pub fn stage_sum_secs(&self) -> f64 {
        self.stage_sum.as_secs_f64()
    }

    /// Records of the given kind, in execution order.
    #[cfg(test)]
    pub fn stages_of(&self, kind: WorkerKind) -> impl Iterator<Item = &StageRecord> {
        self.stages.iter().filter(move |record| record.kind == kind)
    }

    fn log_timeline(&self) {
        for record in &self.stages {
            debug!(
                order = %self.name,
                kind = %record.kind,
                worker = record.worker,
                label = %record.label,
                elapsed_s = record.elapsed_secs(),
                "stage done"
            );
        }
        debug!(
            order = %self.name,
            total_s = self.total_secs(),
            stage_sum_s = self.stage_sum_secs(),
            "order served"
        );
    }
}

pub struct OrderPipeline {
    order: Order,
    pool: Arc<WorkerPool>,
    plan: StagePlan,
}

impl OrderPipeline {
    pub fn new(order: Order, pool: Arc<WorkerPool>, plan: StagePlan) -> Self {
        Self { order, pool, plan }
    }

    #[cfg(test)]
    pub fn order(&self) -> &Order {
        &self.order
    }

    /// Drive the order through every stage.
    pub async fn run(&mut self) -> Result<OrderTiming> {
        let start = Instant::now();
        let name = self.order.name().to_string();
        let mut stages = Vec::with_capacity(self.order.toppings().len() + 3);

        stages.push(self.plan.dough.execute(&self.pool, &name).await?);
        stages.extend(self.apply_toppings().await?);
        stages.push(self.plan.oven.execute(&self.pool, &name).await?);
        stages.push(self.plan.serving.execute(&self.pool, &name).await?);

        let total = start.elapsed();
        let stage_sum: Duration = stages.iter().map(StageRecord::elapsed).sum();
        let toppings_completed = self
            .order
            .toppings()
            .iter()
            .filter(|topping| topping.is_completed())
            .count();

        let timing = OrderTiming {
            name,
            total,
            stage_sum,
            toppings_completed,
            stages,
        };
        timing.log_timeline();
        Ok(timing)
    }

    /// One concurrent topping stage per topping; waits for all of them.
    async fn apply_toppings(&mut self) -> Result<Vec<StageRecord>> {
        let toppings = self.order.toppings().len();
        if toppings == 0 {
            return Ok(Vec::new());
        }

        let mut tasks = JoinSet::new();
        for (index, topping) in self.order.toppings().iter().enumerate() {
            let pool = Arc::clone(&self.pool);
            let stage = self.plan.topping;
            let label = topping.name().to_string();
            tasks.spawn(async move { (index, stage.execute(&pool, &label).await) });
        }

        let mut records: Vec<Option<StageRecord>> = vec![None; toppings];
        while let Some(joined) = tasks.join_next().await {
            // On failure the remaining toppings are detached, not aborted, so
            // every claimed worker still goes back to the pool.
            match joined {
                Ok((index, Ok(record))) => {
                    let first = self.order.toppings_mut()[index].mark_completed();
                    debug_assert!(first, "topping {index} completed twice");
                    records[index] = Some(record);
                }
                Ok((_, Err(err))) => {
                    tasks.detach_all();
                    return Err(err);
                }
                Err(err) => {
                    tasks.detach_all();
                    return Err(err.into());
                }
            }
        }

        Ok(records.into_iter().flatten().collect())
    }
}

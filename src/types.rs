//! Shared identifiers and the order model used across the kitchen.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of a worker inside the pool (construction order).
pub type WorkerId = usize;

/// The closed set of worker types staffing the kitchen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerKind {
    Dough,
    Topping,
    Oven,
    Waiter,
}

impl WorkerKind {
    pub const COUNT: usize = 4;

    /// Every kind, in station order.
    pub const ALL: [WorkerKind; Self::COUNT] = [
        WorkerKind::Dough,
        WorkerKind::Topping,
        WorkerKind::Oven,
        WorkerKind::Waiter,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WorkerKind::Dough => "dough",
            WorkerKind::Topping => "topping",
            WorkerKind::Oven => "oven",
            WorkerKind::Waiter => "waiter",
        }
    }

    /// Position in [`WorkerKind::ALL`], used to index per-kind tables.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order description as supplied by the order list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderSpec {
    pub pizza_name: String,
    pub toppings: Vec<String>,
}

impl OrderSpec {
    pub fn new<I, S>(pizza_name: impl Into<String>, toppings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pizza_name: pizza_name.into(),
            toppings: toppings.into_iter().map(Into::into).collect(),
        }
    }
}

/// One topping of an order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Topping {
    name: String,
    completed: bool,
}

impl Topping {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            completed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Mark the topping done; returns false if it was already completed.
    pub fn mark_completed(&mut self) -> bool {
        !std::mem::replace(&mut self.completed, true)
    }
}

/// Unit of work flowing through the full stage sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    name: String,
    toppings: Vec<Topping>,
}

impl Order {
    pub fn new(name: impl Into<String>, toppings: Vec<Topping>) -> Self {
        Self {
            name: name.into(),
            toppings,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn toppings(&self) -> &[Topping] {
        &self.toppings
    }

    pub fn toppings_mut(&mut self) -> &mut [Topping] {
        &mut self.toppings
    }
}

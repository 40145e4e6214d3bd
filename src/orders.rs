//! Order list loading and validation.

use std::path::Path;

use crate::error::{KitchenError, Result};
use crate::types::{Order, OrderSpec, Topping};

/// Order list shipped with the binary.
const BUNDLED_ORDERS: &str = include_str!("../data/orders.json");

pub fn parse_orders(raw: &str) -> Result<Vec<OrderSpec>> {
    Ok(serde_json::from_str(raw)?)
}

pub fn load_orders(path: impl AsRef<Path>) -> Result<Vec<OrderSpec>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| KitchenError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_orders(&raw)
}

pub fn bundled_orders() -> Result<Vec<OrderSpec>> {
    parse_orders(BUNDLED_ORDERS)
}

/// Turn an order description into an order, rejecting blank pizza or topping names.
pub fn build_order(index: usize, spec: &OrderSpec) -> Result<Order> {
    let name = spec.pizza_name.trim();
    if name.is_empty() {
        return Err(KitchenError::MalformedOrder {
            index,
            reason: "pizza_name is blank".to_string(),
        });
    }
    let mut toppings = Vec::with_capacity(spec.toppings.len());
    for (position, topping) in spec.toppings.iter().enumerate() {
        let topping = topping.trim();
        if topping.is_empty() {
            return Err(KitchenError::MalformedOrder {
                index,
                reason: format!("topping #{position} of \"{name}\" is blank"),
            });
        }
        toppings.push(Topping::new(topping));
    }
    Ok(Order::new(name, toppings))
}

/// Deterministic synthetic orders for benchmarking.
pub fn synthetic_orders(count: usize, toppings_per_order: usize) -> Vec<OrderSpec> {
    (0..count)
        .map(|id| {
            OrderSpec::new(
                format!("bench-{id}"),
                (0..toppings_per_order).map(|t| format!("bench-{id}-topping-{t}")),
            )
        })
        .collect()
}

//! Price suggestions from food cost targets

use std::fmt;

use crate::calculator::{CostWarning, resolve_item_total_cost_with_diagnostics};
use crate::models::{BepConfig, Catalog, MenuItem};

/// Price at which `cost` is exactly `food_cost_pct` percent of it, plus the
/// delivery surcharge for delivery items.
pub fn recommend_price(
    cost: f64,
    food_cost_pct: f64,
    delivery_pct: Option<f64>,
    is_delivery_item: bool,
) -> f64 {
    if cost <= 0.0 || food_cost_pct <= 0.0 {
        return 0.0;
    }

    let base = cost / (food_cost_pct / 100.0);
    match delivery_pct {
        Some(pct) if is_delivery_item => base * (1.0 + pct / 100.0),
        _ => base,
    }
}

/// Food cost as a percentage of the selling price, 0 when no price is set
pub fn current_food_cost_ratio(cost: f64, selling_price: f64) -> f64 {
    if selling_price > 0.0 {
        cost / selling_price * 100.0
    } else {
        0.0
    }
}

/// Round a price up to the next multiple of `increment`
pub fn round_to_increment(price: f64, increment: f64) -> f64 {
    if increment <= 0.0 {
        return price;
    }
    // Absorb float noise so 4.5 / 0.5 stays 9 and not 9.000000001
    let steps = (price / increment - 1e-9).ceil();
    steps * increment
}

#[derive(Debug, Clone)]
pub struct PriceRecommendation {
    pub item_id: String,
    pub item_name: String,
    pub cost: f64,
    pub selling_price: f64,
    /// Price without delivery surcharge
    pub base_price: f64,
    pub suggested_price: f64,
    pub current_ratio: f64,
    pub margin: f64,
    pub warnings: Vec<CostWarning>,
}

/// Cost and price one menu item against the configured food cost target
pub fn price_item(item: &MenuItem, catalog: &Catalog, config: &BepConfig) -> PriceRecommendation {
    let costed = resolve_item_total_cost_with_diagnostics(
        item,
        &catalog.ingredients,
        &catalog.preparations,
        &catalog.menu_items,
    );
    let cost = costed.value;

    PriceRecommendation {
        item_id: item.id.clone(),
        item_name: item.name.clone(),
        cost,
        selling_price: item.selling_price,
        base_price: recommend_price(cost, config.food_cost_pct, None, false),
        suggested_price: recommend_price(cost, config.food_cost_pct, config.delivery_pct, item.delivery),
        current_ratio: current_food_cost_ratio(cost, item.selling_price),
        margin: item.selling_price - cost,
        warnings: costed.warnings,
    }
}

/// Price every menu item, worst food cost ratio first
pub fn menu_report(catalog: &Catalog, config: &BepConfig) -> MenuReport {
    let mut rows: Vec<_> = catalog
        .menu_items
        .iter()
        .map(|item| price_item(item, catalog, config))
        .collect();
    rows.sort_by(|a, b| b.current_ratio.total_cmp(&a.current_ratio));

    MenuReport {
        target_pct: config.food_cost_pct,
        rows,
    }
}

#[derive(Debug)]
pub struct MenuReport {
    pub target_pct: f64,
    pub rows: Vec<PriceRecommendation>,
}

impl fmt::Display for MenuReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Menu report (target food cost {:.0}%) ===", self.target_pct)?;
        writeln!(
            f,
            "{:<28} {:>8} {:>8} {:>8} {:>10} {:>8}",
            "Item", "Cost", "Price", "FC %", "Suggested", "Margin"
        )?;
        writeln!(f, "{}", "-".repeat(75))?;

        for row in &self.rows {
            let flag = if !row.warnings.is_empty() {
                " (incomplete)"
            } else if row.current_ratio > self.target_pct {
                " (over target)"
            } else {
                ""
            };
            writeln!(
                f,
                "{:<28} {:>8.2} {:>8.2} {:>8.1} {:>10.2} {:>8.2}{}",
                row.item_name,
                row.cost,
                row.selling_price,
                row.current_ratio,
                row.suggested_price,
                row.margin,
                flag
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ComponentUsage, Ingredient, Preparation, Serving};
    use crate::units::Unit;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-3,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn base_price_hits_food_cost_target() {
        assert_close(recommend_price(1.286, 30.0, None, false), 4.2867);
    }

    #[test]
    fn delivery_surcharge_only_for_delivery_items() {
        assert_close(recommend_price(3.0, 30.0, Some(20.0), true), 12.0);
        assert_close(recommend_price(3.0, 30.0, Some(20.0), false), 10.0);
        assert_close(recommend_price(3.0, 30.0, None, true), 10.0);
    }

    #[test]
    fn degenerate_inputs_give_zero_price() {
        assert_eq!(recommend_price(0.0, 30.0, None, false), 0.0);
        assert_eq!(recommend_price(2.0, 0.0, Some(10.0), true), 0.0);
        assert_eq!(recommend_price(-1.0, 30.0, None, false), 0.0);
    }

    #[test]
    fn current_ratio_needs_a_price() {
        assert_close(current_food_cost_ratio(3.0, 10.0), 30.0);
        assert_eq!(current_food_cost_ratio(3.0, 0.0), 0.0);
    }

    #[test]
    fn rounds_up_to_increment() {
        assert_close(round_to_increment(4.287, 0.5), 4.5);
        assert_close(round_to_increment(4.5, 0.5), 4.5);
        assert_close(round_to_increment(4.01, 0.1), 4.1);
        assert_close(round_to_increment(4.287, 0.0), 4.287);
    }

    fn catalog() -> Catalog {
        Catalog {
            ingredients: vec![
                Ingredient {
                    id: "x".to_string(),
                    name: "X".to_string(),
                    category: None,
                    unit: Unit::Kg,
                    price_per_unit: 10.0,
                },
                Ingredient {
                    id: "y".to_string(),
                    name: "Y".to_string(),
                    category: None,
                    unit: Unit::Kg,
                    price_per_unit: 5.0,
                },
            ],
            preparations: vec![Preparation {
                id: "base".to_string(),
                name: "Base".to_string(),
                category: None,
                components: vec![
                    ComponentUsage::ingredient("x", 500.0),
                    ComponentUsage::ingredient("y", 200.0),
                ],
                initial_weight_kg: None,
                yield_weight_kg: None,
                serving: Serving::ByWeight,
            }],
            menu_items: vec![
                MenuItem {
                    id: "dish".to_string(),
                    name: "Dish".to_string(),
                    category: None,
                    selling_price: 5.0,
                    components: vec![ComponentUsage::preparation("base", 150.0)],
                    delivery: true,
                },
                MenuItem {
                    id: "cheap".to_string(),
                    name: "Cheap".to_string(),
                    category: None,
                    selling_price: 10.0,
                    components: vec![
                        ComponentUsage::ingredient("y", 100.0),
                        ComponentUsage::ingredient("gone", 10.0),
                    ],
                    delivery: false,
                },
            ],
        }
    }

    #[test]
    fn prices_item_from_resolved_cost() {
        let catalog = catalog();
        let config = BepConfig {
            delivery_pct: Some(10.0),
            ..BepConfig::default()
        };
        let rec = price_item(&catalog.menu_items[0], &catalog, &config);

        let cost = 6.0 / 0.7 * 0.15;
        assert_close(rec.cost, cost);
        assert_close(rec.base_price, cost / 0.3);
        assert_close(rec.suggested_price, cost / 0.3 * 1.1);
        assert_close(rec.current_ratio, cost / 5.0 * 100.0);
        assert_close(rec.margin, 5.0 - cost);
        assert!(rec.warnings.is_empty());
    }

    #[test]
    fn report_lists_worst_ratio_first_and_flags_gaps() {
        let catalog = catalog();
        let report = menu_report(&catalog, &BepConfig::default());

        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0].item_id, "dish");
        assert_eq!(report.rows[1].item_id, "cheap");
        assert_eq!(report.rows[1].warnings.len(), 1);

        let text = report.to_string();
        assert!(text.contains("(incomplete)"));
    }
}

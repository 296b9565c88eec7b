//! Recipe cost calculator
//!
//! Walks the composition graph (ingredients, preparations, menu items) by id
//! lookup into flat collections. Recursion is cut off at [`MAX_DEPTH`] so a
//! cyclic graph still terminates; references that cannot be resolved cost
//! nothing and are reported as [`CostWarning`]s instead of failing.

use thiserror::Error;
use tracing::debug;

use crate::models::{
    Catalog, ComponentRef, Composite, Ingredient, MenuItem, Preparation, Serving, find_by_id,
};
use crate::units::Unit;

/// Deepest nesting level that is still costed
pub const MAX_DEPTH: usize = 5;

/// Something the calculator had to treat as zero cost
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CostWarning {
    #[error("{owner}: ingredient '{id}' not found, counted as free")]
    MissingIngredient { owner: String, id: String },

    #[error("{owner}: preparation '{id}' not found, counted as free")]
    MissingPreparation { owner: String, id: String },

    #[error("{owner}: menu item '{id}' not found, counted as free")]
    MissingMenuItem { owner: String, id: String },

    #[error("{owner}: lists itself as a component, ignored")]
    SelfReference { owner: String },

    #[error("{owner}: nested deeper than {} levels, counted as free", MAX_DEPTH)]
    DepthLimit { owner: String },

    #[error("{owner}: preparations cannot contain menu item '{id}', ignored")]
    UnsupportedReference { owner: String, id: String },

    #[error("{owner}: no usable weight, cost per kg unknown")]
    NoUsableWeight { owner: String },
}

/// A computed cost together with everything that was skipped to get it
#[derive(Debug, Clone, Default)]
pub struct Costed {
    pub value: f64,
    pub warnings: Vec<CostWarning>,
}

impl Costed {
    fn new(value: f64, mut warnings: Vec<CostWarning>) -> Self {
        // The same broken reference is usually reached along several paths
        let mut seen = Vec::with_capacity(warnings.len());
        warnings.retain(|w| {
            if seen.contains(w) {
                false
            } else {
                seen.push(w.clone());
                true
            }
        });
        Costed { value, warnings }
    }

    pub fn is_complete(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Cost of using `quantity` of an ingredient
pub fn ingredient_cost(ingredient: &Ingredient, quantity: f64) -> f64 {
    ingredient.price_per_unit * quantity * ingredient.unit.quantity_factor()
}

/// Cost per kilogram of a preparation
pub fn resolve_preparation_unit_cost(
    prep: &Preparation,
    ingredients: &[Ingredient],
    preparations: &[Preparation],
) -> f64 {
    prep_unit_cost_recursive(prep, ingredients, preparations, 0, &mut Vec::new())
}

/// Same as [`resolve_preparation_unit_cost`], also returning what was skipped
pub fn resolve_preparation_unit_cost_with_diagnostics(
    prep: &Preparation,
    ingredients: &[Ingredient],
    preparations: &[Preparation],
) -> Costed {
    let mut warnings = Vec::new();
    let value = prep_unit_cost_recursive(prep, ingredients, preparations, 0, &mut warnings);
    Costed::new(value, warnings)
}

/// Total cost of one portion of a menu item (or of a preparation costed as an item)
pub fn resolve_item_total_cost<C: Composite>(
    item: &C,
    ingredients: &[Ingredient],
    preparations: &[Preparation],
    menu_items: &[MenuItem],
) -> f64 {
    item_cost_recursive(item, ingredients, preparations, menu_items, 0, &mut Vec::new())
}

/// Same as [`resolve_item_total_cost`], also returning what was skipped
pub fn resolve_item_total_cost_with_diagnostics<C: Composite>(
    item: &C,
    ingredients: &[Ingredient],
    preparations: &[Preparation],
    menu_items: &[MenuItem],
) -> Costed {
    let mut warnings = Vec::new();
    let value = item_cost_recursive(item, ingredients, preparations, menu_items, 0, &mut warnings);
    Costed::new(value, warnings)
}

fn ingredient_usage_cost(
    owner: &str,
    id: &str,
    quantity: f64,
    ingredients: &[Ingredient],
    warnings: &mut Vec<CostWarning>,
) -> f64 {
    match find_by_id(ingredients, id) {
        Some(ingredient) => ingredient_cost(ingredient, quantity),
        None => {
            debug!(owner, ingredient = id, "missing ingredient");
            warnings.push(CostWarning::MissingIngredient {
                owner: owner.to_string(),
                id: id.to_string(),
            });
            0.0
        }
    }
}

/// Batch cost of a preparation and the weight (kg) it is spread over
struct Batch {
    cost: f64,
    weight_kg: f64,
}

impl Batch {
    fn unit_cost(&self) -> f64 {
        if self.weight_kg > 0.0 && self.cost > 0.0 {
            self.cost / self.weight_kg
        } else {
            0.0
        }
    }
}

fn prep_batch(
    prep: &Preparation,
    ingredients: &[Ingredient],
    preparations: &[Preparation],
    depth: usize,
    warnings: &mut Vec<CostWarning>,
) -> Batch {
    let mut cost = 0.0;

    for usage in &prep.components {
        cost += match &usage.target {
            ComponentRef::Ingredient(id) => {
                ingredient_usage_cost(&prep.id, id, usage.quantity, ingredients, warnings)
            }
            ComponentRef::Preparation(id) if *id == prep.id => {
                warnings.push(CostWarning::SelfReference {
                    owner: prep.id.clone(),
                });
                0.0
            }
            ComponentRef::Preparation(id) => match find_by_id(preparations, id) {
                // Nested preparations are always measured in grams
                Some(nested) => {
                    prep_unit_cost_recursive(nested, ingredients, preparations, depth + 1, warnings)
                        * usage.quantity
                        / 1000.0
                }
                None => {
                    warnings.push(CostWarning::MissingPreparation {
                        owner: prep.id.clone(),
                        id: id.clone(),
                    });
                    0.0
                }
            },
            ComponentRef::MenuItem(id) => {
                warnings.push(CostWarning::UnsupportedReference {
                    owner: prep.id.clone(),
                    id: id.clone(),
                });
                0.0
            }
        };
    }

    // Declared yield wins over declared raw weight; otherwise assume the
    // batch weighs what its components weigh.
    let component_weight_kg: f64 = prep.components.iter().map(|u| u.quantity / 1000.0).sum();
    let weight_kg = [prep.yield_weight_kg, prep.initial_weight_kg]
        .into_iter()
        .flatten()
        .find(|w| *w > 0.0)
        .unwrap_or(component_weight_kg);

    Batch { cost, weight_kg }
}

fn prep_unit_cost_recursive(
    prep: &Preparation,
    ingredients: &[Ingredient],
    preparations: &[Preparation],
    depth: usize,
    warnings: &mut Vec<CostWarning>,
) -> f64 {
    if depth > MAX_DEPTH {
        debug!(preparation = %prep.id, depth, "depth limit reached");
        warnings.push(CostWarning::DepthLimit {
            owner: prep.id.clone(),
        });
        return 0.0;
    }

    if prep.components.is_empty() {
        return 0.0;
    }

    let batch = prep_batch(prep, ingredients, preparations, depth, warnings);
    if batch.cost > 0.0 && batch.weight_kg <= 0.0 {
        warnings.push(CostWarning::NoUsableWeight {
            owner: prep.id.clone(),
        });
    }
    batch.unit_cost()
}

fn item_cost_recursive(
    item: &dyn Composite,
    ingredients: &[Ingredient],
    preparations: &[Preparation],
    menu_items: &[MenuItem],
    depth: usize,
    warnings: &mut Vec<CostWarning>,
) -> f64 {
    if depth > MAX_DEPTH {
        debug!(item = item.id(), depth, "depth limit reached");
        warnings.push(CostWarning::DepthLimit {
            owner: item.id().to_string(),
        });
        return 0.0;
    }

    let own_ref = item.reference();
    let mut total = 0.0;

    for usage in item.components() {
        if usage.target == own_ref {
            warnings.push(CostWarning::SelfReference {
                owner: item.id().to_string(),
            });
            continue;
        }

        total += match &usage.target {
            ComponentRef::Ingredient(id) => {
                ingredient_usage_cost(item.id(), id, usage.quantity, ingredients, warnings)
            }
            ComponentRef::Preparation(id) => match find_by_id(preparations, id) {
                Some(prep) => {
                    // preparation nesting is bounded on its own, from zero
                    let unit_cost =
                        prep_unit_cost_recursive(prep, ingredients, preparations, 0, warnings);
                    unit_cost * used_weight_kg(prep.serving, usage.quantity)
                }
                None => {
                    warnings.push(CostWarning::MissingPreparation {
                        owner: item.id().to_string(),
                        id: id.clone(),
                    });
                    0.0
                }
            },
            ComponentRef::MenuItem(id) => match find_by_id(menu_items, id) {
                Some(nested) => {
                    item_cost_recursive(nested, ingredients, preparations, menu_items, depth + 1, warnings)
                        * usage.quantity
                }
                None => {
                    warnings.push(CostWarning::MissingMenuItem {
                        owner: item.id().to_string(),
                        id: id.clone(),
                    });
                    0.0
                }
            },
        };
    }

    total
}

/// Kilograms of a preparation consumed by one usage inside a menu item
fn used_weight_kg(serving: Serving, quantity: f64) -> f64 {
    match serving {
        Serving::ByPortion { portion_grams } => portion_grams / 1000.0 * quantity,
        Serving::ByWeight => quantity / 1000.0,
    }
}

/// One line of a cost breakdown
#[derive(Debug, Clone)]
pub struct CostNode {
    pub label: String,
    pub amount: String,
    pub cost: f64,
    pub children: Vec<CostNode>,
}

impl CostNode {
    fn leaf(label: String, amount: String, cost: f64) -> Self {
        CostNode {
            label,
            amount,
            cost,
            children: Vec::new(),
        }
    }
}

/// Build a cost tree for one portion of an item
///
/// Every node's cost is its share of the item's total, so the root cost
/// equals [`resolve_item_total_cost`].
pub fn breakdown_item<C: Composite>(item: &C, catalog: &Catalog) -> CostNode {
    breakdown_item_recursive(item, catalog, 1.0, "1 portion".to_string(), 0)
}

fn breakdown_item_recursive(
    item: &dyn Composite,
    catalog: &Catalog,
    multiplier: f64,
    amount: String,
    depth: usize,
) -> CostNode {
    if depth > MAX_DEPTH {
        return CostNode::leaf(format!("{} (too deep)", item.name()), amount, 0.0);
    }

    let own_ref = item.reference();
    let mut children = Vec::new();

    for usage in item.components() {
        if usage.target == own_ref {
            continue;
        }
        let child = match &usage.target {
            ComponentRef::Ingredient(id) => {
                ingredient_leaf(catalog.ingredient(id), id, usage.quantity, multiplier)
            }
            ComponentRef::Preparation(id) => match catalog.preparation(id) {
                Some(prep) => {
                    let used_kg = used_weight_kg(prep.serving, usage.quantity) * multiplier;
                    let amount = match prep.serving {
                        Serving::ByPortion { portion_grams } => format!(
                            "{:.2} x {:.0} g portions",
                            usage.quantity * multiplier,
                            portion_grams
                        ),
                        Serving::ByWeight => format!("{:.0} g", used_kg * 1000.0),
                    };
                    breakdown_preparation(prep, catalog, used_kg, amount, 0)
                }
                None => CostNode::leaf(format!("{id} (missing)"), String::new(), 0.0),
            },
            ComponentRef::MenuItem(id) => match catalog.menu_item(id) {
                Some(nested) => {
                    let portions = usage.quantity * multiplier;
                    breakdown_item_recursive(
                        nested,
                        catalog,
                        portions,
                        format!("{portions:.2} portions"),
                        depth + 1,
                    )
                }
                None => CostNode::leaf(format!("{id} (missing)"), String::new(), 0.0),
            },
        };
        children.push(child);
    }

    CostNode {
        label: item.name().to_string(),
        amount,
        cost: children.iter().map(|c| c.cost).sum(),
        children,
    }
}

fn breakdown_preparation(
    prep: &Preparation,
    catalog: &Catalog,
    used_kg: f64,
    amount: String,
    depth: usize,
) -> CostNode {
    if depth > MAX_DEPTH {
        return CostNode::leaf(format!("{} (too deep)", prep.name), amount, 0.0);
    }
    if prep.components.is_empty() {
        return CostNode::leaf(prep.name.clone(), amount, 0.0);
    }

    let batch = prep_batch(
        prep,
        &catalog.ingredients,
        &catalog.preparations,
        depth,
        &mut Vec::new(),
    );
    // Share of the batch this usage consumes
    let share = if batch.unit_cost() > 0.0 {
        used_kg / batch.weight_kg
    } else {
        0.0
    };

    let mut children = Vec::new();
    for usage in &prep.components {
        let child = match &usage.target {
            ComponentRef::Ingredient(id) => {
                ingredient_leaf(catalog.ingredient(id), id, usage.quantity, share)
            }
            ComponentRef::Preparation(id) if *id == prep.id => continue,
            ComponentRef::Preparation(id) => match catalog.preparation(id) {
                Some(nested) => {
                    let nested_kg = usage.quantity / 1000.0 * share;
                    breakdown_preparation(
                        nested,
                        catalog,
                        nested_kg,
                        format!("{:.0} g", nested_kg * 1000.0),
                        depth + 1,
                    )
                }
                None => CostNode::leaf(format!("{id} (missing)"), String::new(), 0.0),
            },
            ComponentRef::MenuItem(_) => continue,
        };
        children.push(child);
    }

    CostNode {
        label: prep.name.clone(),
        amount,
        cost: batch.unit_cost() * used_kg,
        children,
    }
}

fn ingredient_leaf(ingredient: Option<&Ingredient>, id: &str, quantity: f64, scale: f64) -> CostNode {
    match ingredient {
        Some(ing) => {
            let unit = match ing.unit {
                Unit::Kg => "g",
                Unit::L => "ml",
                other => other.as_str(),
            };
            CostNode::leaf(
                ing.name.clone(),
                format!("{:.1} {}", quantity * scale, unit),
                ingredient_cost(ing, quantity) * scale,
            )
        }
        None => CostNode::leaf(format!("{id} (missing)"), String::new(), 0.0),
    }
}

/// Format a cost tree as an indented listing
pub fn format_breakdown(node: &CostNode, indent: usize) -> String {
    let mut output = String::new();
    let prefix = "  ".repeat(indent);

    let amount = if node.amount.is_empty() {
        String::new()
    } else {
        format!(" [{}]", node.amount)
    };
    output.push_str(&format!(
        "{}{}{} {:.3}\n",
        prefix, node.label, amount, node.cost
    ));

    for child in &node.children {
        output.push_str(&format_breakdown(child, indent + 1));
    }

    output
}

//! Data models for ingredients, preparations and menu items

use std::str::FromStr;

use regex::Regex;

use crate::error::ParseError;
use crate::units::Unit;

#[derive(Debug, Clone)]
pub struct Ingredient {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub unit: Unit,
    pub price_per_unit: f64,
}

/// How a preparation is consumed when a menu item uses it
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Serving {
    /// Usage quantity is grams
    ByWeight,
    /// Usage quantity is a number of fixed-size portions
    ByPortion { portion_grams: f64 },
}

impl Serving {
    /// Portion weights of zero or less mean the preparation is used by weight.
    pub fn from_portion_weight(portion_grams: Option<f64>) -> Self {
        match portion_grams {
            Some(g) if g > 0.0 => Serving::ByPortion { portion_grams: g },
            _ => Serving::ByWeight,
        }
    }

    pub fn portion_grams(self) -> Option<f64> {
        match self {
            Serving::ByWeight => None,
            Serving::ByPortion { portion_grams } => Some(portion_grams),
        }
    }
}

/// An intermediate preparation (sub-recipe) such as a dough or a sauce
#[derive(Debug, Clone)]
pub struct Preparation {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub components: Vec<ComponentUsage>,
    pub initial_weight_kg: Option<f64>,
    pub yield_weight_kg: Option<f64>,
    pub serving: Serving,
}

/// A sellable dish
#[derive(Debug, Clone)]
pub struct MenuItem {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub selling_price: f64,
    pub components: Vec<ComponentUsage>,
    pub delivery: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ComponentRef {
    Ingredient(String),
    Preparation(String),
    MenuItem(String),
}

impl ComponentRef {
    pub fn id(&self) -> &str {
        match self {
            ComponentRef::Ingredient(id)
            | ComponentRef::Preparation(id)
            | ComponentRef::MenuItem(id) => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ComponentRef::Ingredient(_) => "ingredient",
            ComponentRef::Preparation(_) => "preparation",
            ComponentRef::MenuItem(_) => "item",
        }
    }

    pub fn from_kind(kind: &str, id: &str) -> Result<Self, ParseError> {
        match kind.to_ascii_lowercase().as_str() {
            "ingredient" | "ing" | "i" => Ok(ComponentRef::Ingredient(id.to_string())),
            "preparation" | "prep" | "p" => Ok(ComponentRef::Preparation(id.to_string())),
            "item" | "menu" | "m" => Ok(ComponentRef::MenuItem(id.to_string())),
            other => Err(ParseError::UnknownComponentKind(other.to_string())),
        }
    }
}

/// What a usage quantity counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    Grams,
    Portions,
}

/// A weighted reference from a composite to one of its parts
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentUsage {
    pub target: ComponentRef,
    pub quantity: f64,
}

impl ComponentUsage {
    pub fn new(target: ComponentRef, quantity: f64) -> Self {
        Self { target, quantity }
    }

    pub fn ingredient(id: &str, grams: f64) -> Self {
        Self::new(ComponentRef::Ingredient(id.to_string()), grams)
    }

    pub fn preparation(id: &str, quantity: f64) -> Self {
        Self::new(ComponentRef::Preparation(id.to_string()), quantity)
    }

    pub fn menu_item(id: &str, portions: f64) -> Self {
        Self::new(ComponentRef::MenuItem(id.to_string()), portions)
    }

    /// Meaning of `quantity` when this usage appears in a menu item.
    ///
    /// Inside a preparation every preparation usage is grams regardless of
    /// its serving mode.
    pub fn measure(&self, preparations: &[Preparation]) -> Measure {
        match &self.target {
            ComponentRef::Ingredient(_) => Measure::Grams,
            ComponentRef::MenuItem(_) => Measure::Portions,
            ComponentRef::Preparation(id) => match find_by_id(preparations, id) {
                Some(p) if p.serving.portion_grams().is_some() => Measure::Portions,
                _ => Measure::Grams,
            },
        }
    }
}

/// Parses the CLI form `<kind>:<id>=<quantity>`, e.g. `prep:dough=250`.
impl FromStr for ComponentUsage {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let re = Regex::new(r"^\s*(\w+)\s*:\s*([\w.-]+)\s*=\s*(\S+)\s*$")?;
        let cap = re
            .captures(s)
            .ok_or_else(|| ParseError::InvalidComponent(s.to_string()))?;

        let target = ComponentRef::from_kind(&cap[1], &cap[2])?;
        let quantity = cap[3]
            .parse::<f64>()
            .ok()
            .filter(|q| q.is_finite() && *q >= 0.0)
            .ok_or_else(|| ParseError::InvalidQuantity(cap[3].to_string()))?;

        Ok(ComponentUsage::new(target, quantity))
    }
}

/// Anything built out of components: a menu item, or a preparation costed as
/// if it were an item.
pub trait Composite {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn components(&self) -> &[ComponentUsage];

    /// How this composite would appear in another composite's component list
    fn reference(&self) -> ComponentRef;
}

impl Composite for Preparation {
    fn id(&self) -> &str {
        &self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn components(&self) -> &[ComponentUsage] {
        &self.components
    }
    fn reference(&self) -> ComponentRef {
        ComponentRef::Preparation(self.id.clone())
    }
}

impl Composite for MenuItem {
    fn id(&self) -> &str {
        &self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn components(&self) -> &[ComponentUsage] {
        &self.components
    }
    fn reference(&self) -> ComponentRef {
        ComponentRef::MenuItem(self.id.clone())
    }
}

/// Entities that can be looked up by id in a flat collection
pub trait Identified {
    fn ident(&self) -> &str;
}

impl Identified for Ingredient {
    fn ident(&self) -> &str {
        &self.id
    }
}

impl Identified for Preparation {
    fn ident(&self) -> &str {
        &self.id
    }
}

impl Identified for MenuItem {
    fn ident(&self) -> &str {
        &self.id
    }
}

pub fn find_by_id<'a, T: Identified>(items: &'a [T], id: &str) -> Option<&'a T> {
    items.iter().find(|item| item.ident() == id)
}

/// Read-only snapshot of the composition graph handed to the calculator
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub ingredients: Vec<Ingredient>,
    pub preparations: Vec<Preparation>,
    pub menu_items: Vec<MenuItem>,
}

impl Catalog {
    pub fn ingredient(&self, id: &str) -> Option<&Ingredient> {
        find_by_id(&self.ingredients, id)
    }

    pub fn preparation(&self, id: &str) -> Option<&Preparation> {
        find_by_id(&self.preparations, id)
    }

    pub fn menu_item(&self, id: &str) -> Option<&MenuItem> {
        find_by_id(&self.menu_items, id)
    }
}

#[derive(Debug, Clone)]
pub struct FixedCostEntry {
    pub label: String,
    pub monthly_amount: f64,
}

#[derive(Debug, Clone)]
pub struct Employee {
    pub name: String,
    pub monthly_salary: f64,
    pub contribution_pct: f64,
}

impl Employee {
    /// Salary plus employer contributions
    pub fn monthly_cost(&self) -> f64 {
        self.monthly_salary * (1.0 + self.contribution_pct / 100.0)
    }
}

/// Overheads and incidence targets for break-even and pricing
#[derive(Debug, Clone)]
pub struct BepConfig {
    pub fixed_costs: Vec<FixedCostEntry>,
    pub food_cost_pct: f64,
    pub service_pct: f64,
    pub waste_pct: f64,
    pub delivery_pct: Option<f64>,
    pub average_ticket: f64,
    pub opening_days: u32,
}

impl Default for BepConfig {
    fn default() -> Self {
        Self {
            fixed_costs: Vec::new(),
            food_cost_pct: 30.0,
            service_pct: 0.0,
            waste_pct: 0.0,
            delivery_pct: None,
            average_ticket: 0.0,
            opening_days: 26,
        }
    }
}

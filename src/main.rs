//! Menu Cost Calculator
//!
//! Recipe costing, break-even analysis and price suggestions for a
//! restaurant menu.

mod breakeven;
mod calculator;
mod db;
mod error;
mod logging;
mod models;
mod pricing;
mod units;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;

use crate::models::{
    BepConfig, Catalog, ComponentUsage, Employee, FixedCostEntry, Ingredient, Measure, MenuItem,
    Preparation, Serving,
};
use crate::units::Unit;

#[derive(Parser)]
#[command(name = "menu-cost")]
#[command(about = "Recipe costing, break-even and menu pricing for restaurants")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, env = "MENU_COST_DB", default_value = "menu_cost.db")]
    database: PathBuf,

    /// Log level when RUST_LOG is not set
    #[arg(long, env = "MENU_COST_LOG", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize empty database with schema
    Init,

    /// Load a sample pizzeria menu
    LoadSample,

    /// Add or replace an ingredient
    AddIngredient {
        id: String,
        name: String,
        /// kg, g, l, ml, pz or unit
        unit: Unit,
        /// Price per unit
        price: f64,
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Add or replace a preparation (its components are cleared)
    AddPreparation {
        id: String,
        name: String,
        #[arg(short, long)]
        category: Option<String>,
        /// Raw batch weight in kg
        #[arg(long)]
        initial_weight: Option<f64>,
        /// Batch weight after cooking and waste, in kg
        #[arg(long)]
        yield_weight: Option<f64>,
        /// Portion weight in grams; menu items then use it by portion count
        #[arg(long)]
        portion_weight: Option<f64>,
    },

    /// Add or replace a menu item (its components are cleared)
    AddItem {
        id: String,
        name: String,
        /// Selling price
        #[arg(default_value = "0")]
        price: f64,
        #[arg(short, long)]
        category: Option<String>,
        /// Item is sold through delivery
        #[arg(long)]
        delivery: bool,
    },

    /// Append a component to a preparation or menu item
    AddComponent {
        /// Preparation or menu item id
        owner: String,
        /// <kind>:<id>=<quantity>, e.g. ingredient:flour=500, prep:dough=1, item:margherita=0.5
        component: ComponentUsage,
        /// Owner kind (prep or item), needed when both share the id
        #[arg(long)]
        owner_kind: Option<String>,
    },

    /// Add an employee
    AddEmployee {
        name: String,
        /// Monthly gross salary
        salary: f64,
        /// Employer contributions as a percentage of salary
        #[arg(default_value = "0")]
        contribution: f64,
    },

    /// Add a monthly fixed cost (rent, utilities, ...)
    AddFixedCost { label: String, amount: f64 },

    /// Set incidence targets used by break-even and pricing
    SetBep {
        #[arg(long, default_value = "30")]
        food_cost: f64,
        #[arg(long, default_value = "0")]
        service: f64,
        #[arg(long, default_value = "0")]
        waste: f64,
        #[arg(long)]
        delivery: Option<f64>,
        #[arg(long, default_value = "0")]
        average_ticket: f64,
        #[arg(long, default_value = "26")]
        opening_days: u32,
    },

    /// List all ingredients
    ListIngredients,

    /// List all preparations with their cost per kg
    ListPreparations,

    /// List all menu items with their cost
    ListItems,

    /// Cost per kg of a preparation
    PrepCost {
        id: String,
        /// Show component breakdown for one kg
        #[arg(short, long)]
        verbose: bool,
    },

    /// Total cost of a menu item
    ItemCost {
        id: String,
        /// Show detailed cost tree
        #[arg(short, long)]
        verbose: bool,
    },

    /// Suggested selling price for a menu item
    Price {
        id: String,
        /// Round the suggestion up to this increment
        #[arg(short, long, default_value = "0.5")]
        round: f64,
        /// Save the rounded suggestion as the item's selling price
        #[arg(long)]
        apply: bool,
    },

    /// Cost, food cost ratio and suggested price of every menu item
    MenuReport,

    /// Monthly break-even revenue and covers
    BreakEven,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level)?;

    let conn = Connection::open(&cli.database)
        .with_context(|| format!("Failed to open {}", cli.database.display()))?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::LoadSample => {
            load_sample_data(&conn)?;
            println!("Sample data loaded successfully!");
        }

        Commands::AddIngredient {
            id,
            name,
            unit,
            price,
            category,
        } => {
            db::upsert_ingredient(
                &conn,
                &Ingredient {
                    id,
                    name,
                    category,
                    unit,
                    price_per_unit: price,
                },
            )?;
        }

        Commands::AddPreparation {
            id,
            name,
            category,
            initial_weight,
            yield_weight,
            portion_weight,
        } => {
            db::upsert_preparation(
                &conn,
                &Preparation {
                    id,
                    name,
                    category,
                    components: Vec::new(),
                    initial_weight_kg: initial_weight,
                    yield_weight_kg: yield_weight,
                    serving: Serving::from_portion_weight(portion_weight),
                },
            )?;
        }

        Commands::AddItem {
            id,
            name,
            price,
            category,
            delivery,
        } => {
            db::upsert_menu_item(
                &conn,
                &MenuItem {
                    id,
                    name,
                    category,
                    selling_price: price,
                    components: Vec::new(),
                    delivery,
                },
            )?;
        }

        Commands::AddComponent {
            owner,
            component,
            owner_kind,
        } => {
            db::add_component(&conn, owner_kind.as_deref(), &owner, &component)?;
        }

        Commands::AddEmployee {
            name,
            salary,
            contribution,
        } => {
            db::insert_employee(
                &conn,
                &Employee {
                    name,
                    monthly_salary: salary,
                    contribution_pct: contribution,
                },
            )?;
        }

        Commands::AddFixedCost { label, amount } => {
            db::insert_fixed_cost(
                &conn,
                &FixedCostEntry {
                    label,
                    monthly_amount: amount,
                },
            )?;
        }

        Commands::SetBep {
            food_cost,
            service,
            waste,
            delivery,
            average_ticket,
            opening_days,
        } => {
            db::save_bep_settings(
                &conn,
                &BepConfig {
                    fixed_costs: Vec::new(),
                    food_cost_pct: food_cost,
                    service_pct: service,
                    waste_pct: waste,
                    delivery_pct: delivery,
                    average_ticket,
                    opening_days,
                },
            )?;
        }

        Commands::ListIngredients => {
            let ingredients = db::list_ingredients(&conn)?;
            if ingredients.is_empty() {
                println!("No ingredients in database. Run 'add-ingredient' or 'load-sample' first.");
            } else {
                println!("{:<20} {:<28} {:>10} {:>6}", "Id", "Ingredient", "Price", "Unit");
                println!("{}", "-".repeat(67));
                for i in ingredients {
                    println!("{:<20} {:<28} {:>10.2} {:>6}", i.id, i.name, i.price_per_unit, i.unit);
                }
            }
        }

        Commands::ListPreparations => {
            let catalog = db::load_catalog(&conn)?;
            if catalog.preparations.is_empty() {
                println!("No preparations in database. Run 'add-preparation' or 'load-sample' first.");
            } else {
                println!("{:<20} {:<28} {:>10} {:>10}", "Id", "Preparation", "Cost/kg", "Portion");
                println!("{}", "-".repeat(71));
                for p in &catalog.preparations {
                    let unit_cost = calculator::resolve_preparation_unit_cost(
                        p,
                        &catalog.ingredients,
                        &catalog.preparations,
                    );
                    let portion = p
                        .serving
                        .portion_grams()
                        .map_or_else(|| "-".to_string(), |g| format!("{g:.0} g"));
                    println!("{:<20} {:<28} {:>10.2} {:>10}", p.id, p.name, unit_cost, portion);
                }
            }
        }

        Commands::ListItems => {
            let catalog = db::load_catalog(&conn)?;
            if catalog.menu_items.is_empty() {
                println!("No menu items in database. Run 'add-item' or 'load-sample' first.");
            } else {
                println!("{:<20} {:<28} {:>8} {:>8} {:>9}", "Id", "Item", "Cost", "Price", "Delivery");
                println!("{}", "-".repeat(76));
                for item in &catalog.menu_items {
                    let cost = calculator::resolve_item_total_cost(
                        item,
                        &catalog.ingredients,
                        &catalog.preparations,
                        &catalog.menu_items,
                    );
                    println!(
                        "{:<20} {:<28} {:>8.2} {:>8.2} {:>9}",
                        item.id,
                        item.name,
                        cost,
                        item.selling_price,
                        if item.delivery { "yes" } else { "no" }
                    );
                }
            }
        }

        Commands::PrepCost { id, verbose } => {
            let catalog = db::load_catalog(&conn)?;
            let prep = catalog
                .preparation(&id)
                .with_context(|| format!("preparation '{}' not found", id))?;

            let costed = calculator::resolve_preparation_unit_cost_with_diagnostics(
                prep,
                &catalog.ingredients,
                &catalog.preparations,
            );
            println!("{}: {:.3} per kg", prep.name, costed.value);
            if let Some(g) = prep.serving.portion_grams() {
                println!("  portion of {:.0} g: {:.3}", g, costed.value * g / 1000.0);
            }

            if verbose {
                let tree = kilo_breakdown(prep, &catalog);
                println!("\nBreakdown:\n");
                print!("{}", calculator::format_breakdown(&tree, 0));
            }

            if !costed.is_complete() {
                print_warnings(&costed.warnings);
            }
        }

        Commands::ItemCost { id, verbose } => {
            let catalog = db::load_catalog(&conn)?;
            let item = catalog
                .menu_item(&id)
                .with_context(|| format!("menu item '{}' not found", id))?;

            let costed = calculator::resolve_item_total_cost_with_diagnostics(
                item,
                &catalog.ingredients,
                &catalog.preparations,
                &catalog.menu_items,
            );
            println!("{}: cost {:.3}", item.name, costed.value);
            if item.selling_price > 0.0 {
                println!(
                    "  selling price {:.2}, food cost {:.1}%",
                    item.selling_price,
                    pricing::current_food_cost_ratio(costed.value, item.selling_price)
                );
            }

            if verbose {
                println!("\nComponents:");
                for usage in &item.components {
                    let measure = match usage.measure(&catalog.preparations) {
                        Measure::Grams => "g",
                        Measure::Portions => "portions",
                    };
                    println!(
                        "  {} {} @ {} {}",
                        usage.target.kind(),
                        usage.target.id(),
                        usage.quantity,
                        measure
                    );
                }
                let tree = calculator::breakdown_item(item, &catalog);
                println!("\nBreakdown:\n");
                print!("{}", calculator::format_breakdown(&tree, 0));
            }

            if !costed.is_complete() {
                print_warnings(&costed.warnings);
            }
        }

        Commands::Price { id, round, apply } => {
            let catalog = db::load_catalog(&conn)?;
            let config = db::load_bep_config(&conn)?;
            let item = catalog
                .menu_item(&id)
                .with_context(|| format!("menu item '{}' not found", id))?;

            let rec = pricing::price_item(item, &catalog, &config);
            let rounded = pricing::round_to_increment(rec.suggested_price, round);

            println!("{}", rec.item_name);
            println!("  cost:             {:.3}", rec.cost);
            println!("  food cost target: {:.1}%", config.food_cost_pct);
            println!("  base price:       {:.2}", rec.base_price);
            if item.delivery && config.delivery_pct.is_some() {
                println!("  with delivery:    {:.2}", rec.suggested_price);
            }
            println!("  suggested:        {:.2}", rounded);
            println!(
                "  current:          {:.2} ({:.1}% food cost)",
                rec.selling_price, rec.current_ratio
            );

            if !rec.warnings.is_empty() {
                print_warnings(&rec.warnings);
            }

            if apply {
                if rounded > 0.0 {
                    db::set_selling_price(&conn, &id, rounded)?;
                    println!("Selling price set to {:.2}", rounded);
                } else {
                    println!("No price suggested; selling price left unchanged");
                }
            }
        }

        Commands::MenuReport => {
            let catalog = db::load_catalog(&conn)?;
            let config = db::load_bep_config(&conn)?;
            print!("{}", pricing::menu_report(&catalog, &config));
        }

        Commands::BreakEven => {
            let employees = db::list_employees(&conn)?;
            let config = db::load_bep_config(&conn)?;
            print!("{}", breakeven::analyze_break_even(&employees, &config));
        }
    }

    Ok(())
}

fn print_warnings(warnings: &[calculator::CostWarning]) {
    println!("\nIncomplete data:");
    for w in warnings {
        println!("  - {}", w);
    }
}

/// Load a small pizzeria menu for trying the calculator without entering data
/// Cost tree of one kg of a preparation, costed as a standalone item
fn kilo_breakdown(prep: &Preparation, catalog: &Catalog) -> calculator::CostNode {
    let quantity = match prep.serving {
        Serving::ByPortion { portion_grams } => 1000.0 / portion_grams,
        Serving::ByWeight => 1000.0,
    };
    let kilo = Preparation {
        id: format!("{}-1kg", prep.id),
        name: format!("1 kg of {}", prep.name),
        category: None,
        components: vec![ComponentUsage::preparation(&prep.id, quantity)],
        initial_weight_kg: None,
        yield_weight_kg: None,
        serving: Serving::ByWeight,
    };
    calculator::breakdown_item(&kilo, catalog)
}

/// Replace the whole store with the sample menu, all or nothing
fn load_sample_data(conn: &Connection) -> Result<()> {
    db::in_transaction(conn, write_sample_data)
}

fn write_sample_data(conn: &Connection) -> Result<()> {
    db::clear_all(conn)?;

    let ingredients = [
        ("flour", "Flour 00", "Dry goods", Unit::Kg, 0.9),
        ("water", "Water", "Dry goods", Unit::L, 0.0),
        ("yeast", "Fresh yeast", "Dry goods", Unit::G, 0.004),
        ("salt", "Salt", "Dry goods", Unit::Kg, 0.5),
        ("tomato", "Peeled tomatoes", "Canned", Unit::Kg, 2.2),
        ("oil", "Extra virgin olive oil", "Oils", Unit::L, 9.5),
        ("mozzarella", "Fior di latte", "Dairy", Unit::Kg, 8.5),
        ("basil", "Basil", "Produce", Unit::Pz, 0.05),
        ("ham", "Cooked ham", "Meat", Unit::Kg, 14.0),
        ("mushroom", "Champignon mushrooms", "Produce", Unit::Kg, 4.5),
    ];
    for (id, name, category, unit, price) in ingredients {
        db::upsert_ingredient(
            conn,
            &Ingredient {
                id: id.to_string(),
                name: name.to_string(),
                category: Some(category.to_string()),
                unit,
                price_per_unit: price,
            },
        )?;
    }

    // Dough is portioned into 250 g balls
    db::upsert_preparation(
        conn,
        &Preparation {
            id: "dough".to_string(),
            name: "Pizza dough".to_string(),
            category: Some("Bases".to_string()),
            components: vec![
                ComponentUsage::ingredient("flour", 1000.0),
                ComponentUsage::ingredient("water", 650.0),
                ComponentUsage::ingredient("yeast", 3.0),
                ComponentUsage::ingredient("salt", 25.0),
                ComponentUsage::ingredient("oil", 20.0),
            ],
            initial_weight_kg: None,
            yield_weight_kg: Some(1.65),
            serving: Serving::ByPortion { portion_grams: 250.0 },
        },
    )?;

    db::upsert_preparation(
        conn,
        &Preparation {
            id: "tomato-sauce".to_string(),
            name: "Tomato sauce".to_string(),
            category: Some("Sauces".to_string()),
            components: vec![
                ComponentUsage::ingredient("tomato", 2500.0),
                ComponentUsage::ingredient("oil", 50.0),
                ComponentUsage::ingredient("salt", 15.0),
                ComponentUsage::ingredient("basil", 10.0),
            ],
            initial_weight_kg: Some(2.575),
            yield_weight_kg: Some(2.2),
            serving: Serving::ByWeight,
        },
    )?;

    // Uses the sauce by weight inside another preparation
    db::upsert_preparation(
        conn,
        &Preparation {
            id: "pizza-base".to_string(),
            name: "Red pizza base".to_string(),
            category: Some("Bases".to_string()),
            components: vec![
                ComponentUsage::preparation("dough", 250.0),
                ComponentUsage::preparation("tomato-sauce", 80.0),
            ],
            initial_weight_kg: None,
            yield_weight_kg: None,
            serving: Serving::ByPortion { portion_grams: 330.0 },
        },
    )?;

    let items = [
        MenuItem {
            id: "margherita".to_string(),
            name: "Margherita".to_string(),
            category: Some("Pizzas".to_string()),
            selling_price: 7.0,
            components: vec![
                ComponentUsage::preparation("pizza-base", 1.0),
                ComponentUsage::ingredient("mozzarella", 120.0),
                ComponentUsage::ingredient("basil", 3.0),
                ComponentUsage::ingredient("oil", 5.0),
            ],
            delivery: true,
        },
        MenuItem {
            id: "prosciutto-funghi".to_string(),
            name: "Prosciutto e funghi".to_string(),
            category: Some("Pizzas".to_string()),
            selling_price: 9.5,
            components: vec![
                ComponentUsage::preparation("dough", 1.0),
                ComponentUsage::preparation("tomato-sauce", 80.0),
                ComponentUsage::ingredient("mozzarella", 120.0),
                ComponentUsage::ingredient("ham", 70.0),
                ComponentUsage::ingredient("mushroom", 60.0),
            ],
            delivery: true,
        },
        // Half and half
        MenuItem {
            id: "half-half".to_string(),
            name: "Half Margherita, half Prosciutto e funghi".to_string(),
            category: Some("Pizzas".to_string()),
            selling_price: 8.5,
            components: vec![
                ComponentUsage::menu_item("margherita", 0.5),
                ComponentUsage::menu_item("prosciutto-funghi", 0.5),
            ],
            delivery: false,
        },
    ];
    for item in &items {
        db::upsert_menu_item(conn, item)?;
    }

    let staff = [("Pizzaiolo", 2100.0, 32.0), ("Waiter", 1500.0, 32.0)];
    for (name, salary, contribution) in staff {
        db::insert_employee(
            conn,
            &Employee {
                name: name.to_string(),
                monthly_salary: salary,
                contribution_pct: contribution,
            },
        )?;
    }

    for (label, amount) in [("Rent", 2200.0), ("Utilities", 650.0), ("Accountant", 200.0)] {
        db::insert_fixed_cost(
            conn,
            &FixedCostEntry {
                label: label.to_string(),
                monthly_amount: amount,
            },
        )?;
    }

    db::save_bep_settings(
        conn,
        &BepConfig {
            fixed_costs: Vec::new(),
            food_cost_pct: 28.0,
            service_pct: 12.0,
            waste_pct: 4.0,
            delivery_pct: Some(20.0),
            average_ticket: 18.0,
            opening_days: 26,
        },
    )?;

    println!("Loaded {} ingredients, 3 preparations, {} menu items", ingredients.len(), items.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_menu_costs_every_item() {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        load_sample_data(&conn).unwrap();

        let catalog = db::load_catalog(&conn).unwrap();
        let config = db::load_bep_config(&conn).unwrap();
        let report = pricing::menu_report(&catalog, &config);

        assert_eq!(report.rows.len(), 3);
        for row in &report.rows {
            assert!(row.cost > 0.0, "{} has no cost", row.item_id);
            assert!(row.warnings.is_empty(), "{:?}", row.warnings);
        }

        let half = report.rows.iter().find(|r| r.item_id == "half-half").unwrap();
        let margherita = report.rows.iter().find(|r| r.item_id == "margherita").unwrap();
        let funghi = report
            .rows
            .iter()
            .find(|r| r.item_id == "prosciutto-funghi")
            .unwrap();
        assert!((half.cost - (margherita.cost + funghi.cost) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn kilo_breakdown_matches_unit_cost() {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        load_sample_data(&conn).unwrap();
        let catalog = db::load_catalog(&conn).unwrap();

        for prep in &catalog.preparations {
            let unit_cost = calculator::resolve_preparation_unit_cost(
                prep,
                &catalog.ingredients,
                &catalog.preparations,
            );
            let tree = kilo_breakdown(prep, &catalog);
            assert!((tree.cost - unit_cost).abs() < 1e-9, "{}", prep.id);
        }
    }

    #[test]
    fn failed_sample_load_keeps_existing_store() {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        db::upsert_ingredient(
            &conn,
            &Ingredient {
                id: "truffle".to_string(),
                name: "Truffle".to_string(),
                category: None,
                unit: Unit::G,
                price_per_unit: 3.0,
            },
        )
        .unwrap();
        conn.execute_batch(
            "CREATE TRIGGER reject_items BEFORE INSERT ON menu_items
             BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )
        .unwrap();

        assert!(load_sample_data(&conn).is_err());

        let catalog = db::load_catalog(&conn).unwrap();
        assert_eq!(catalog.ingredients.len(), 1);
        assert_eq!(catalog.ingredients[0].id, "truffle");
        assert!(catalog.preparations.is_empty());
    }

    #[test]
    fn cli_parses_component_argument() {
        let cli = Cli::try_parse_from(["menu-cost", "add-component", "margherita", "ingredient:basil=3"])
            .unwrap();
        match cli.command {
            Commands::AddComponent {
                owner,
                component,
                owner_kind,
            } => {
                assert_eq!(owner, "margherita");
                assert_eq!(owner_kind, None);
                assert_eq!(component, ComponentUsage::ingredient("basil", 3.0));
            }
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn cli_accepts_owner_kind() {
        let cli = Cli::try_parse_from([
            "menu-cost",
            "add-component",
            "dough",
            "ingredient:salt=20",
            "--owner-kind",
            "prep",
        ])
        .unwrap();
        match cli.command {
            Commands::AddComponent { owner_kind, .. } => {
                assert_eq!(owner_kind.as_deref(), Some("prep"));
            }
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn cli_rejects_unknown_unit() {
        assert!(
            Cli::try_parse_from(["menu-cost", "add-ingredient", "x", "X", "cup", "1.0"]).is_err()
        );
    }
}

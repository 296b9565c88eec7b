//! Database schema and operations
//!
//! The store only hands out snapshots; it does not check that component
//! references point at existing rows.

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::models::{
    BepConfig, Catalog, ComponentRef, ComponentUsage, Employee, FixedCostEntry, Ingredient,
    MenuItem, Preparation, Serving,
};
use crate::units::Unit;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS ingredients (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            category TEXT,
            unit TEXT NOT NULL,
            price_per_unit REAL NOT NULL
        );

        -- Weights in kg, portion weight in grams
        CREATE TABLE IF NOT EXISTS preparations (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            category TEXT,
            initial_weight_kg REAL,
            yield_weight_kg REAL,
            portion_weight_g REAL
        );

        CREATE TABLE IF NOT EXISTS menu_items (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            category TEXT,
            selling_price REAL NOT NULL DEFAULT 0,
            delivery INTEGER NOT NULL DEFAULT 0
        );

        -- Ordered component lists of preparations and menu items
        CREATE TABLE IF NOT EXISTS components (
            owner_kind TEXT NOT NULL,
            owner_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            target_kind TEXT NOT NULL,
            target_id TEXT NOT NULL,
            quantity REAL NOT NULL,
            PRIMARY KEY (owner_kind, owner_id, position)
        );

        CREATE TABLE IF NOT EXISTS employees (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            monthly_salary REAL NOT NULL,
            contribution_pct REAL NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS fixed_costs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            label TEXT NOT NULL,
            monthly_amount REAL NOT NULL
        );

        -- Single row
        CREATE TABLE IF NOT EXISTS bep_settings (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            food_cost_pct REAL NOT NULL,
            service_pct REAL NOT NULL,
            waste_pct REAL NOT NULL,
            delivery_pct REAL,
            average_ticket REAL NOT NULL,
            opening_days INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_components_owner ON components(owner_kind, owner_id);
        "#,
    )?;
    Ok(())
}

/// Remove every stored entity
pub fn clear_all(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM components;
        DELETE FROM menu_items;
        DELETE FROM preparations;
        DELETE FROM ingredients;
        DELETE FROM employees;
        DELETE FROM fixed_costs;
        DELETE FROM bep_settings;
        "#,
    )?;
    Ok(())
}

/// Run `f` inside a transaction, committing only when it succeeds.
///
/// When the connection is already inside a transaction `f` joins it, so
/// writers that are atomic on their own can be grouped into a larger unit.
pub fn in_transaction<T>(
    conn: &Connection,
    f: impl FnOnce(&Connection) -> Result<T>,
) -> Result<T> {
    if !conn.is_autocommit() {
        return f(conn);
    }
    let tx = conn.unchecked_transaction()?;
    let out = f(&tx)?;
    tx.commit()?;
    Ok(out)
}

/// Insert or replace an ingredient
pub fn upsert_ingredient(conn: &Connection, ingredient: &Ingredient) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO ingredients (id, name, category, unit, price_per_unit)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            &ingredient.id,
            &ingredient.name,
            &ingredient.category,
            ingredient.unit.as_str(),
            ingredient.price_per_unit,
        ),
    )?;
    info!(id = %ingredient.id, "saved ingredient");
    Ok(())
}

/// Insert or replace a preparation together with its component list
pub fn upsert_preparation(conn: &Connection, prep: &Preparation) -> Result<()> {
    in_transaction(conn, |conn| write_preparation(conn, prep))?;
    info!(id = %prep.id, components = prep.components.len(), "saved preparation");
    Ok(())
}

fn write_preparation(conn: &Connection, prep: &Preparation) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO preparations (id, name, category, initial_weight_kg, yield_weight_kg, portion_weight_g)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        (
            &prep.id,
            &prep.name,
            &prep.category,
            prep.initial_weight_kg,
            prep.yield_weight_kg,
            prep.serving.portion_grams(),
        ),
    )?;
    replace_components(conn, "preparation", &prep.id, &prep.components)
}

/// Insert or replace a menu item together with its component list
pub fn upsert_menu_item(conn: &Connection, item: &MenuItem) -> Result<()> {
    in_transaction(conn, |conn| write_menu_item(conn, item))?;
    info!(id = %item.id, components = item.components.len(), "saved menu item");
    Ok(())
}

fn write_menu_item(conn: &Connection, item: &MenuItem) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO menu_items (id, name, category, selling_price, delivery)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            &item.id,
            &item.name,
            &item.category,
            item.selling_price,
            item.delivery,
        ),
    )?;
    replace_components(conn, "item", &item.id, &item.components)
}

fn replace_components(
    conn: &Connection,
    owner_kind: &str,
    owner_id: &str,
    components: &[ComponentUsage],
) -> Result<()> {
    conn.execute(
        "DELETE FROM components WHERE owner_kind = ?1 AND owner_id = ?2",
        (owner_kind, owner_id),
    )?;
    for (position, usage) in components.iter().enumerate() {
        insert_component(conn, owner_kind, owner_id, position as i64, usage)?;
    }
    Ok(())
}

fn insert_component(
    conn: &Connection,
    owner_kind: &str,
    owner_id: &str,
    position: i64,
    usage: &ComponentUsage,
) -> Result<()> {
    conn.execute(
        "INSERT INTO components (owner_kind, owner_id, position, target_kind, target_id, quantity)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        (
            owner_kind,
            owner_id,
            position,
            usage.target.kind(),
            usage.target.id(),
            usage.quantity,
        ),
    )?;
    Ok(())
}

/// Append a component to the end of a preparation's or menu item's list.
///
/// Without `owner_kind` the id must name exactly one preparation or menu
/// item; an id used by both has to be qualified.
pub fn add_component(
    conn: &Connection,
    owner_kind: Option<&str>,
    owner_id: &str,
    usage: &ComponentUsage,
) -> Result<()> {
    let owner = owner_kind
        .map(|kind| ComponentRef::from_kind(kind, owner_id))
        .transpose()?;
    let owner_kind = match owner {
        Some(ComponentRef::Preparation(_)) => {
            if !exists(conn, "preparations", owner_id)? {
                bail!("no preparation with id '{}'", owner_id);
            }
            "preparation"
        }
        Some(ComponentRef::MenuItem(_)) => {
            if !exists(conn, "menu_items", owner_id)? {
                bail!("no menu item with id '{}'", owner_id);
            }
            "item"
        }
        Some(ComponentRef::Ingredient(_)) => bail!("ingredients have no components"),
        None => match (
            exists(conn, "preparations", owner_id)?,
            exists(conn, "menu_items", owner_id)?,
        ) {
            (true, false) => "preparation",
            (false, true) => "item",
            (true, true) => bail!(
                "'{}' is both a preparation and a menu item; pass --owner-kind",
                owner_id
            ),
            (false, false) => bail!("no preparation or menu item with id '{}'", owner_id),
        },
    };

    let next: i64 = conn.query_row(
        "SELECT COALESCE(MAX(position) + 1, 0) FROM components WHERE owner_kind = ?1 AND owner_id = ?2",
        (owner_kind, owner_id),
        |row| row.get(0),
    )?;
    insert_component(conn, owner_kind, owner_id, next, usage)?;
    info!(owner = owner_id, target = usage.target.id(), "added component");
    Ok(())
}

fn exists(conn: &Connection, table: &str, id: &str) -> Result<bool> {
    // table names come from this module only
    let sql = format!("SELECT 1 FROM {table} WHERE id = ?1");
    let found = conn
        .query_row(&sql, [id], |_| Ok(()))
        .optional()?
        .is_some();
    Ok(found)
}

/// Write back a new selling price ("apply suggested price")
pub fn set_selling_price(conn: &Connection, item_id: &str, price: f64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE menu_items SET selling_price = ?1 WHERE id = ?2",
        (price, item_id),
    )?;
    if updated == 0 {
        bail!("menu item '{}' not found", item_id);
    }
    info!(id = item_id, price, "updated selling price");
    Ok(())
}

/// Insert an employee
pub fn insert_employee(conn: &Connection, employee: &Employee) -> Result<()> {
    conn.execute(
        "INSERT INTO employees (name, monthly_salary, contribution_pct) VALUES (?1, ?2, ?3)",
        (
            &employee.name,
            employee.monthly_salary,
            employee.contribution_pct,
        ),
    )?;
    Ok(())
}

/// Insert a fixed cost entry
pub fn insert_fixed_cost(conn: &Connection, entry: &FixedCostEntry) -> Result<()> {
    conn.execute(
        "INSERT INTO fixed_costs (label, monthly_amount) VALUES (?1, ?2)",
        (&entry.label, entry.monthly_amount),
    )?;
    Ok(())
}

/// Store incidence percentages and ticket settings (fixed costs live in their own table)
pub fn save_bep_settings(conn: &Connection, config: &BepConfig) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO bep_settings (id, food_cost_pct, service_pct, waste_pct, delivery_pct, average_ticket, opening_days)
         VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6)",
        (
            config.food_cost_pct,
            config.service_pct,
            config.waste_pct,
            config.delivery_pct,
            config.average_ticket,
            config.opening_days,
        ),
    )?;
    Ok(())
}

fn parse_unit(text: String) -> rusqlite::Result<Unit> {
    text.parse::<Unit>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e)))
}

/// Load all ingredients
pub fn list_ingredients(conn: &Connection) -> Result<Vec<Ingredient>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, category, unit, price_per_unit FROM ingredients ORDER BY name",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(Ingredient {
            id: row.get(0)?,
            name: row.get(1)?,
            category: row.get(2)?,
            unit: parse_unit(row.get(3)?)?,
            price_per_unit: row.get(4)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

fn load_components(conn: &Connection, owner_kind: &str, owner_id: &str) -> Result<Vec<ComponentUsage>> {
    let mut stmt = conn.prepare(
        "SELECT target_kind, target_id, quantity
         FROM components
         WHERE owner_kind = ?1 AND owner_id = ?2
         ORDER BY position",
    )?;

    let rows = stmt.query_map((owner_kind, owner_id), |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, f64>(2)?,
        ))
    })?;

    let mut results = Vec::new();
    for row in rows {
        let (kind, id, quantity) = row?;
        let target = ComponentRef::from_kind(&kind, &id)
            .with_context(|| format!("bad component of {owner_kind} '{owner_id}'"))?;
        results.push(ComponentUsage::new(target, quantity));
    }
    Ok(results)
}

/// Load all preparations with their components
pub fn list_preparations(conn: &Connection) -> Result<Vec<Preparation>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, category, initial_weight_kg, yield_weight_kg, portion_weight_g
         FROM preparations ORDER BY name",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(Preparation {
            id: row.get(0)?,
            name: row.get(1)?,
            category: row.get(2)?,
            components: Vec::new(),
            initial_weight_kg: row.get(3)?,
            yield_weight_kg: row.get(4)?,
            serving: Serving::from_portion_weight(row.get(5)?),
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        let mut prep = row?;
        prep.components = load_components(conn, "preparation", &prep.id)?;
        results.push(prep);
    }
    Ok(results)
}

/// Load all menu items with their components
pub fn list_menu_items(conn: &Connection) -> Result<Vec<MenuItem>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, category, selling_price, delivery FROM menu_items ORDER BY name",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(MenuItem {
            id: row.get(0)?,
            name: row.get(1)?,
            category: row.get(2)?,
            selling_price: row.get(3)?,
            components: Vec::new(),
            delivery: row.get(4)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        let mut item = row?;
        item.components = load_components(conn, "item", &item.id)?;
        results.push(item);
    }
    Ok(results)
}

/// Snapshot of the whole composition graph
pub fn load_catalog(conn: &Connection) -> Result<Catalog> {
    Ok(Catalog {
        ingredients: list_ingredients(conn)?,
        preparations: list_preparations(conn)?,
        menu_items: list_menu_items(conn)?,
    })
}

/// Load all employees
pub fn list_employees(conn: &Connection) -> Result<Vec<Employee>> {
    let mut stmt = conn.prepare(
        "SELECT name, monthly_salary, contribution_pct FROM employees ORDER BY id",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(Employee {
            name: row.get(0)?,
            monthly_salary: row.get(1)?,
            contribution_pct: row.get(2)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Load break-even settings and fixed costs, falling back to defaults when unset
pub fn load_bep_config(conn: &Connection) -> Result<BepConfig> {
    let mut config = conn
        .query_row(
            "SELECT food_cost_pct, service_pct, waste_pct, delivery_pct, average_ticket, opening_days
             FROM bep_settings WHERE id = 1",
            [],
            |row| {
                Ok(BepConfig {
                    fixed_costs: Vec::new(),
                    food_cost_pct: row.get(0)?,
                    service_pct: row.get(1)?,
                    waste_pct: row.get(2)?,
                    delivery_pct: row.get(3)?,
                    average_ticket: row.get(4)?,
                    opening_days: row.get(5)?,
                })
            },
        )
        .optional()?
        .unwrap_or_default();

    let mut stmt = conn.prepare("SELECT label, monthly_amount FROM fixed_costs ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok(FixedCostEntry {
            label: row.get(0)?,
            monthly_amount: row.get(1)?,
        })
    })?;
    for row in rows {
        config.fixed_costs.push(row?);
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn dough() -> Preparation {
        Preparation {
            id: "dough".to_string(),
            name: "Pizza dough".to_string(),
            category: Some("Bases".to_string()),
            components: vec![
                ComponentUsage::ingredient("flour", 1000.0),
                ComponentUsage::ingredient("water", 650.0),
            ],
            initial_weight_kg: Some(1.7),
            yield_weight_kg: None,
            serving: Serving::ByPortion { portion_grams: 250.0 },
        }
    }

    #[test]
    fn schema_init_is_idempotent() {
        let conn = open();
        init_schema(&conn).unwrap();
    }

    #[test]
    fn preparation_keeps_component_order_and_serving() {
        let conn = open();
        upsert_preparation(&conn, &dough()).unwrap();

        let preps = list_preparations(&conn).unwrap();
        assert_eq!(preps.len(), 1);
        assert_eq!(preps[0].components, dough().components);
        assert_eq!(preps[0].serving, Serving::ByPortion { portion_grams: 250.0 });
        assert_eq!(preps[0].initial_weight_kg, Some(1.7));
        assert_eq!(preps[0].yield_weight_kg, None);
    }

    #[test]
    fn upsert_replaces_component_list() {
        let conn = open();
        upsert_preparation(&conn, &dough()).unwrap();

        let mut smaller = dough();
        smaller.components.truncate(1);
        upsert_preparation(&conn, &smaller).unwrap();

        assert_eq!(list_preparations(&conn).unwrap()[0].components.len(), 1);
    }

    #[test]
    fn add_component_appends_to_owner() {
        let conn = open();
        upsert_preparation(&conn, &dough()).unwrap();
        upsert_menu_item(
            &conn,
            &MenuItem {
                id: "margherita".to_string(),
                name: "Margherita".to_string(),
                category: None,
                selling_price: 8.0,
                components: vec![ComponentUsage::preparation("dough", 1.0)],
                delivery: true,
            },
        )
        .unwrap();

        add_component(&conn, None, "dough", &ComponentUsage::ingredient("salt", 20.0)).unwrap();
        add_component(&conn, None, "margherita", &ComponentUsage::ingredient("basil", 2.0)).unwrap();
        let salt = ComponentUsage::ingredient("salt", 1.0);
        assert!(add_component(&conn, None, "nothing", &salt).is_err());

        let catalog = load_catalog(&conn).unwrap();
        let dough = catalog.preparation("dough").unwrap();
        assert_eq!(dough.components[2], ComponentUsage::ingredient("salt", 20.0));
        let pizza = catalog.menu_item("margherita").unwrap();
        assert_eq!(pizza.components.len(), 2);
        assert!(pizza.delivery);
    }

    #[test]
    fn shared_owner_id_needs_a_kind() {
        let conn = open();
        let mut dough_item = dough();
        dough_item.components.clear();
        upsert_preparation(&conn, &dough_item).unwrap();
        upsert_menu_item(
            &conn,
            &MenuItem {
                id: "dough".to_string(),
                name: "Dough balls".to_string(),
                category: None,
                selling_price: 4.0,
                components: Vec::new(),
                delivery: false,
            },
        )
        .unwrap();

        let salt = ComponentUsage::ingredient("salt", 5.0);
        assert!(add_component(&conn, None, "dough", &salt).is_err());
        assert!(add_component(&conn, Some("ingredient"), "dough", &salt).is_err());
        add_component(&conn, Some("item"), "dough", &salt).unwrap();

        let catalog = load_catalog(&conn).unwrap();
        assert!(catalog.preparation("dough").unwrap().components.is_empty());
        assert_eq!(catalog.menu_item("dough").unwrap().components, vec![salt.clone()]);

        add_component(&conn, Some("prep"), "dough", &salt).unwrap();
        let catalog = load_catalog(&conn).unwrap();
        assert_eq!(catalog.preparation("dough").unwrap().components, vec![salt]);
        let oil = ComponentUsage::ingredient("oil", 1.0);
        assert!(add_component(&conn, Some("item"), "sauce", &oil).is_err());
    }

    #[test]
    fn failed_upsert_keeps_previous_components() {
        let conn = open();
        upsert_preparation(&conn, &dough()).unwrap();
        // Reject any component insert from here on
        conn.execute_batch(
            "CREATE TRIGGER reject_components BEFORE INSERT ON components
             BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )
        .unwrap();

        let mut renamed = dough();
        renamed.name = "Renamed dough".to_string();
        assert!(upsert_preparation(&conn, &renamed).is_err());

        let preps = list_preparations(&conn).unwrap();
        assert_eq!(preps[0].name, "Pizza dough");
        assert_eq!(preps[0].components, dough().components);
        assert!(conn.is_autocommit());
    }

    #[test]
    fn failed_transaction_rolls_back_every_write() {
        let conn = open();
        upsert_preparation(&conn, &dough()).unwrap();

        let result: Result<()> = in_transaction(&conn, |conn| {
            clear_all(conn)?;
            upsert_menu_item(
                conn,
                &MenuItem {
                    id: "margherita".to_string(),
                    name: "Margherita".to_string(),
                    category: None,
                    selling_price: 8.0,
                    components: vec![ComponentUsage::preparation("dough", 1.0)],
                    delivery: false,
                },
            )?;
            bail!("interrupted")
        });
        assert!(result.is_err());

        let catalog = load_catalog(&conn).unwrap();
        assert_eq!(catalog.preparations.len(), 1);
        assert_eq!(catalog.preparations[0].components, dough().components);
        assert!(catalog.menu_items.is_empty());
    }

    #[test]
    fn selling_price_write_back() {
        let conn = open();
        upsert_menu_item(
            &conn,
            &MenuItem {
                id: "tiramisu".to_string(),
                name: "Tiramisu".to_string(),
                category: None,
                selling_price: 0.0,
                components: Vec::new(),
                delivery: false,
            },
        )
        .unwrap();

        set_selling_price(&conn, "tiramisu", 6.5).unwrap();
        assert_eq!(list_menu_items(&conn).unwrap()[0].selling_price, 6.5);
        assert!(set_selling_price(&conn, "panna-cotta", 5.0).is_err());
    }

    #[test]
    fn ingredient_units_survive_storage() {
        let conn = open();
        upsert_ingredient(
            &conn,
            &Ingredient {
                id: "oil".to_string(),
                name: "Olive oil".to_string(),
                category: None,
                unit: Unit::L,
                price_per_unit: 9.0,
            },
        )
        .unwrap();
        assert_eq!(list_ingredients(&conn).unwrap()[0].unit, Unit::L);
    }

    #[test]
    fn bep_config_defaults_until_saved() {
        let conn = open();
        let config = load_bep_config(&conn).unwrap();
        assert_eq!(config.food_cost_pct, 30.0);
        assert!(config.fixed_costs.is_empty());

        save_bep_settings(
            &conn,
            &BepConfig {
                food_cost_pct: 28.0,
                delivery_pct: Some(15.0),
                average_ticket: 22.0,
                ..BepConfig::default()
            },
        )
        .unwrap();
        insert_fixed_cost(
            &conn,
            &FixedCostEntry {
                label: "Rent".to_string(),
                monthly_amount: 2500.0,
            },
        )
        .unwrap();

        let config = load_bep_config(&conn).unwrap();
        assert_eq!(config.food_cost_pct, 28.0);
        assert_eq!(config.delivery_pct, Some(15.0));
        assert_eq!(config.fixed_costs.len(), 1);
    }

    #[test]
    fn clear_all_empties_store() {
        let conn = open();
        upsert_preparation(&conn, &dough()).unwrap();
        insert_employee(
            &conn,
            &Employee {
                name: "Chef".to_string(),
                monthly_salary: 2000.0,
                contribution_pct: 30.0,
            },
        )
        .unwrap();
        clear_all(&conn).unwrap();
        assert!(load_catalog(&conn).unwrap().preparations.is_empty());
        assert!(list_employees(&conn).unwrap().is_empty());
    }
}

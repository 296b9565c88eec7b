//! Break-even analysis
//!
//! Turns staffing and overhead into the monthly revenue (and number of
//! average tickets) the restaurant needs to cover its fixed costs.

use std::fmt;

use crate::models::{BepConfig, Employee};

#[derive(Debug, Clone, PartialEq)]
pub struct BreakEvenAnalysis {
    pub staffing_cost: f64,
    pub other_fixed_cost: f64,
    pub total_fixed_cost: f64,
    /// Share of revenue eaten by food, service and waste (0..1)
    pub variable_ratio: f64,
    pub margin_ratio: f64,
    /// Zero when the margin ratio is not positive
    pub break_even_revenue: f64,
    pub break_even_units: f64,
    pub break_even_revenue_per_day: f64,
}

impl BreakEvenAnalysis {
    /// False when variable costs take 100% or more of every sale
    pub fn is_sustainable(&self) -> bool {
        self.margin_ratio > 0.0
    }
}

/// Monthly cost of all employees including employer contributions
pub fn staffing_cost(employees: &[Employee]) -> f64 {
    employees.iter().map(Employee::monthly_cost).sum()
}

pub fn analyze_break_even(employees: &[Employee], config: &BepConfig) -> BreakEvenAnalysis {
    let staffing_cost = staffing_cost(employees);
    let other_fixed_cost: f64 = config.fixed_costs.iter().map(|c| c.monthly_amount).sum();
    let total_fixed_cost = staffing_cost + other_fixed_cost;

    let variable_ratio = (config.food_cost_pct + config.service_pct + config.waste_pct) / 100.0;
    let margin_ratio = 1.0 - variable_ratio;

    let break_even_revenue = if margin_ratio > 0.0 {
        total_fixed_cost / margin_ratio
    } else {
        0.0
    };

    let break_even_units = if config.average_ticket > 0.0 {
        break_even_revenue / config.average_ticket
    } else {
        0.0
    };

    let break_even_revenue_per_day = if config.opening_days > 0 {
        break_even_revenue / f64::from(config.opening_days)
    } else {
        0.0
    };

    BreakEvenAnalysis {
        staffing_cost,
        other_fixed_cost,
        total_fixed_cost,
        variable_ratio,
        margin_ratio,
        break_even_revenue,
        break_even_units,
        break_even_revenue_per_day,
    }
}

impl fmt::Display for BreakEvenAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Break-even ===")?;
        writeln!(f, "Fixed costs (monthly):")?;
        writeln!(f, "  Staff:       {:.2}", self.staffing_cost)?;
        writeln!(f, "  Overheads:   {:.2}", self.other_fixed_cost)?;
        writeln!(f, "  Total:       {:.2}", self.total_fixed_cost)?;
        writeln!(f)?;

        writeln!(f, "Variable costs: {:.1}% of revenue", self.variable_ratio * 100.0)?;
        writeln!(f, "Margin:         {:.1}% of revenue", self.margin_ratio * 100.0)?;
        writeln!(f)?;

        if !self.is_sustainable() {
            writeln!(f, "Not sustainable: variable costs consume all revenue")?;
            return Ok(());
        }

        writeln!(f, "Break-even revenue: {:.2} / month", self.break_even_revenue)?;
        writeln!(f, "                    {:.2} / day", self.break_even_revenue_per_day)?;
        writeln!(f, "Break-even covers:  {:.0} tickets / month", self.break_even_units.ceil())?;

        Ok(())
    }
}

//! Test utilities for budgetsync-core

use serde_json::{Value, json};

use crate::model::BudgetSnapshot;

/// The category set the questionnaire produces for a ₹10,000 budget.
pub fn questionnaire_budget() -> BudgetSnapshot {
    let mut snapshot = BudgetSnapshot::from_categories([
        ("Books & Media", 1000.0),
        ("Electronics & Accessories", 1500.0),
        ("Fashion & Clothing", 1200.0),
        ("Home & Kitchen", 1800.0),
        ("Food & Beverages", 2500.0),
        ("Travel & Entertainment", 2000.0),
    ]);
    snapshot.recommendations = vec![
        "Consider the 50/30/20 rule: 50% needs, 30% wants, 20% savings.".to_string(),
        "Review and adjust your budget monthly based on actual spending.".to_string(),
    ];
    snapshot
        .questionnaire_answers
        .insert("monthly_budget".to_string(), json!("10000"));
    snapshot
}

/// A `current_budget` response body in the wrapped shape.
pub fn wrapped_response(categories: &[(&str, f64)], total: f64) -> Value {
    let mut plan = serde_json::Map::new();
    for (name, amount) in categories {
        plan.insert(name.to_string(), json!(amount));
    }
    plan.insert("total_budget".to_string(), json!(total));
    json!({ "budget_plan": plan, "questionnaire_answers": {} })
}

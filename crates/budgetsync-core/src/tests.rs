//! Unit tests for budgetsync-core module

use crate::test_utils::{questionnaire_budget, wrapped_response};
use crate::*;

fn run(text: &str, snapshot: &BudgetSnapshot) -> BudgetSnapshot {
    let interpreter = CommandInterpreter::new();
    let commands = interpreter.interpret(text, snapshot);
    mutator::apply(snapshot, &commands)
}

#[test]
fn test_increase_food_by_500() {
    let before = BudgetSnapshot::from_categories([("Food", 2000.0), ("Travel", 1000.0)]);
    let after = run("increase Food by 500", &before);

    assert_eq!(after.amount("Food"), Some(2500.0));
    assert_eq!(after.amount("Travel"), Some(1000.0));
    assert_eq!(after.total, 3500.0);
}

#[test]
fn test_set_total_budget() {
    let before = BudgetSnapshot::from_categories([("Food", 2000.0)]);
    let after = run("set total budget to 10000", &before);

    assert_eq!(after.total, 10000.0);
    assert_eq!(after.categories, before.categories);
}

#[test]
fn test_reduce_travel_clamps() {
    let before = BudgetSnapshot::from_categories([("Travel", 1000.0)]);
    let after = run("reduce Travel by 5000", &before);

    assert_eq!(after.amount("Travel"), Some(0.0));
}

#[test]
fn test_allocate_to_missing_category_extracts_but_resolves_nothing() {
    let interpreter = CommandInterpreter::new();
    let before = BudgetSnapshot::from_categories([("Food", 2000.0), ("Travel", 1000.0)]);

    assert_eq!(interpreter.extract("allocate 3000 for Books").len(), 1);
    assert!(interpreter.interpret("allocate 3000 for Books", &before).is_empty());
}

#[test]
fn test_fuzzy_categories_on_questionnaire_budget() {
    let before = questionnaire_budget();
    let after = run(
        "increase electronics by 500 and reduce travel by 1000, set kitchen to 2000",
        &before,
    );

    assert_eq!(after.amount("Electronics & Accessories"), Some(2000.0));
    assert_eq!(after.amount("Travel & Entertainment"), Some(1000.0));
    assert_eq!(after.amount("Home & Kitchen"), Some(2000.0));
    assert_eq!(after.total, after.category_sum());
    assert_eq!(after.categories.len(), before.categories.len());
    assert_eq!(after.recommendations, before.recommendations);
}

#[test]
fn test_mutation_changes_hash_and_noop_does_not() {
    let before = questionnaire_budget();
    let unchanged = run("hello", &before);
    let changed = run("add books by 1", &before);

    assert_eq!(snapshot_hash(&before), snapshot_hash(&unchanged));
    assert_ne!(snapshot_hash(&before), snapshot_hash(&changed));
}

#[test]
fn test_server_response_feeds_interpreter() {
    let body = wrapped_response(&[("Food", 2000.0), ("Travel", 1000.0)], 3000.0);
    let snapshot = BudgetSnapshot::from_server_value(&body).unwrap();
    let after = run("give 250 to food", &snapshot);

    assert_eq!(after.amount("Food"), Some(250.0));
    assert_eq!(after.total, 1250.0);
}

//! Core data structures for budget snapshots and text commands

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::SyncError;

/// Metadata key carrying the overall budget inside a server plan.
pub const TOTAL_BUDGET_KEY: &str = "total_budget";

/// Metadata key carrying advisory strings inside a server plan.
pub const RECOMMENDATIONS_KEY: &str = "recommendations";

/// Keys that live next to the categories on the wire but are never categories.
pub const RESERVED_KEYS: [&str; 2] = [TOTAL_BUDGET_KEY, RECOMMENDATIONS_KEY];

pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// A full picture of the budget at one instant.
///
/// `categories` never contains the reserved keys; they are split out into
/// `total` and `recommendations` when a payload is normalized.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BudgetSnapshot {
    pub total: f64,
    pub categories: BTreeMap<String, f64>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub questionnaire_answers: Map<String, Value>,
}

impl BudgetSnapshot {
    /// The explicit empty snapshot served when nothing else is available.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot from category amounts, with the total derived from them.
    pub fn from_categories<I, K>(categories: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let mut snapshot = BudgetSnapshot {
            categories: categories
                .into_iter()
                .map(|(name, amount)| (name.into(), amount.max(0.0)))
                .filter(|(name, _)| !is_reserved_key(name))
                .collect(),
            ..Self::default()
        };
        snapshot.recompute_total();
        snapshot
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.total == 0.0 && self.recommendations.is_empty()
    }

    /// Sum of all category amounts.
    pub fn category_sum(&self) -> f64 {
        self.categories.values().sum()
    }

    pub fn recompute_total(&mut self) {
        self.total = self.category_sum();
    }

    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    pub fn amount(&self, category: &str) -> Option<f64> {
        self.categories.get(category).copied()
    }

    /// Shape a `current_budget` response into a snapshot.
    ///
    /// Accepts the wrapped form `{budget_plan: {...}, questionnaire_answers: {...}}`
    /// and the flat legacy form where the categories sit at the top level.
    pub fn from_server_value(value: &Value) -> Result<Self, SyncError> {
        let Value::Object(body) = value else {
            return Err(SyncError::parse(format!(
                "expected a JSON object, got {}",
                json_kind(value)
            )));
        };

        match body.get("budget_plan") {
            Some(Value::Object(plan)) => {
                let answers = match body.get("questionnaire_answers") {
                    Some(Value::Object(answers)) => answers.clone(),
                    _ => Map::new(),
                };
                Ok(Self::from_plan(plan, answers))
            }
            Some(other) => Err(SyncError::parse(format!(
                "budget_plan must be an object, got {}",
                json_kind(other)
            ))),
            None => {
                let has_budget_data = body
                    .iter()
                    .any(|(key, value)| key == TOTAL_BUDGET_KEY || parse_amount(value).is_some());
                if !body.is_empty() && !has_budget_data {
                    return Err(SyncError::parse("no budget categories in legacy payload"));
                }
                Ok(Self::from_plan(body, Map::new()))
            }
        }
    }

    /// Normalize a plan object: numeric coercion, reserved key extraction,
    /// negative amounts clamped to zero.
    pub fn from_plan(plan: &Map<String, Value>, questionnaire_answers: Map<String, Value>) -> Self {
        let mut categories = BTreeMap::new();
        let mut total = None;
        let mut recommendations = Vec::new();

        for (key, value) in plan {
            match key.as_str() {
                RECOMMENDATIONS_KEY => {
                    if let Value::Array(items) = value {
                        recommendations = items
                            .iter()
                            .filter_map(|item| item.as_str().map(str::to_string))
                            .collect();
                    }
                }
                TOTAL_BUDGET_KEY => total = Some(parse_amount(value).unwrap_or(0.0)),
                _ => match parse_amount(value) {
                    Some(amount) => {
                        categories.insert(key.clone(), amount.max(0.0));
                    }
                    None => tracing::debug!("Skipping non-numeric budget entry {:?}", key),
                },
            }
        }

        let mut snapshot = BudgetSnapshot {
            total: 0.0,
            categories,
            recommendations,
            questionnaire_answers,
        };
        match total {
            Some(total) => snapshot.total = total,
            None => snapshot.recompute_total(),
        }
        snapshot
    }

    /// The body posted to `update-file`.
    pub fn to_server_payload(&self) -> Value {
        let mut plan = Map::new();
        for (name, amount) in &self.categories {
            plan.insert(name.clone(), json!(amount));
        }
        plan.insert(TOTAL_BUDGET_KEY.to_string(), json!(self.total));
        if !self.recommendations.is_empty() {
            plan.insert(RECOMMENDATIONS_KEY.to_string(), json!(self.recommendations));
        }

        json!({
            "budget_plan": plan,
            "questionnaire_answers": self.questionnaire_answers,
        })
    }

    /// The local mirror: the server payload plus flat `total`/`categories`.
    pub fn to_local_value(&self) -> Value {
        let mut value = self.to_server_payload();
        if let Value::Object(body) = &mut value {
            body.insert("total".to_string(), json!(self.total));
            body.insert("categories".to_string(), json!(self.categories));
            body.insert("saved_at".to_string(), json!(chrono::Utc::now().to_rfc3339()));
        }
        value
    }

    /// Reshape a local mirror into a snapshot. Accepts either the server shape
    /// or the flat `{total, categories}` shape.
    pub fn from_local_value(value: &Value) -> Result<Self, SyncError> {
        let Value::Object(body) = value else {
            return Err(SyncError::parse("local budget mirror is not an object"));
        };

        if body.contains_key("budget_plan") {
            return Self::from_server_value(value);
        }

        let categories = match body.get("categories") {
            Some(Value::Object(categories)) => categories.clone(),
            Some(_) => return Err(SyncError::parse("local categories must be an object")),
            None if body.contains_key("total") => Map::new(),
            None => return Err(SyncError::parse("local budget mirror has no budget data")),
        };
        let answers = match body.get("questionnaire_answers") {
            Some(Value::Object(answers)) => answers.clone(),
            _ => Map::new(),
        };

        let mut snapshot = Self::from_plan(&categories, answers);
        if let Some(total) = body.get("total").and_then(parse_amount) {
            snapshot.total = total;
        }
        Ok(snapshot)
    }
}

/// Accept JSON numbers and numeric strings.
pub fn parse_amount(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Render an amount the way the app shows money: `₹12,500`, `₹99.50`.
pub fn format_amount(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    if cents == "00" {
        format!("{sign}₹{grouped}")
    } else {
        format!("{sign}₹{grouped}.{cents}")
    }
}

/// The five instruction families understood by the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    Increase,
    Decrease,
    Set,
    Allocate,
    SetTotal,
}

impl CommandKind {
    /// Whether applying the same command twice leaves the same result.
    pub fn is_idempotent(self) -> bool {
        matches!(self, CommandKind::Set | CommandKind::Allocate | CommandKind::SetTotal)
    }
}

/// A command as extracted from free text, before category resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedCommand {
    pub kind: CommandKind,
    /// Free-text category naming; `None` for `SetTotal`.
    pub category_phrase: Option<String>,
    pub amount: u64,
}

/// A command whose category phrase matched an existing category key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedCommand {
    pub kind: CommandKind,
    /// Existing category key; `None` for `SetTotal`.
    pub category: Option<String>,
    pub amount: u64,
}

impl ResolvedCommand {
    pub fn set_total(amount: u64) -> Self {
        Self {
            kind: CommandKind::SetTotal,
            category: None,
            amount,
        }
    }

    pub fn for_category(kind: CommandKind, category: impl Into<String>, amount: u64) -> Self {
        Self {
            kind,
            category: Some(category.into()),
            amount,
        }
    }
}

/// Structured result of a text instruction. Negative outcomes are values, not errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<BudgetSnapshot>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    /// One human-readable line per applied command.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applied: Vec<String>,
}

impl CommandOutcome {
    pub fn applied(snapshot: BudgetSnapshot, applied: Vec<String>) -> Self {
        Self {
            success: true,
            message: format!("Budget updated successfully:\n{}", applied.join("\n")),
            snapshot: Some(snapshot),
            suggestions: Vec::new(),
            applied,
        }
    }

    pub fn rejected(message: impl Into<String>, suggestions: Vec<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            snapshot: None,
            suggestions,
            applied: Vec::new(),
        }
    }
}

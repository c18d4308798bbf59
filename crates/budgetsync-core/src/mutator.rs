//! Pure application of resolved commands to a snapshot

use crate::model::{BudgetSnapshot, CommandKind, ResolvedCommand, format_amount};

/// Apply `commands` in order and return the new snapshot. `snapshot` is untouched.
///
/// Commands naming a category that does not exist are skipped; categories are
/// never created here. Unless a `SetTotal` was applied, the total is
/// recomputed from the categories afterwards.
pub fn apply(snapshot: &BudgetSnapshot, commands: &[ResolvedCommand]) -> BudgetSnapshot {
    let mut next = snapshot.clone();
    let mut explicit_total = None;

    for command in commands {
        let amount = command.amount as f64;

        if command.kind == CommandKind::SetTotal {
            explicit_total = Some(amount);
            continue;
        }

        let Some(category) = command.category.as_deref() else {
            tracing::warn!("Ignoring {:?} without a category", command.kind);
            continue;
        };
        let Some(current) = next.categories.get_mut(category) else {
            tracing::warn!("Ignoring {:?} for unknown category {:?}", command.kind, category);
            continue;
        };

        *current = match command.kind {
            CommandKind::Increase => *current + amount,
            CommandKind::Decrease => (*current - amount).max(0.0),
            CommandKind::Set | CommandKind::Allocate => amount,
            CommandKind::SetTotal => continue,
        };
    }

    match explicit_total {
        Some(total) => next.total = total,
        None => next.recompute_total(),
    }
    next
}

/// One log line per command, for the user-facing outcome message.
pub fn describe(command: &ResolvedCommand) -> String {
    let amount = format_amount(command.amount as f64);
    let category = command.category.as_deref().unwrap_or("budget");
    match command.kind {
        CommandKind::Increase => format!("Increased {category} by {amount}"),
        CommandKind::Decrease => format!("Decreased {category} by {amount}"),
        CommandKind::Set => format!("Set {category} to {amount}"),
        CommandKind::Allocate => format!("Allocated {amount} to {category}"),
        CommandKind::SetTotal => format!("Total budget set to {amount}"),
    }
}

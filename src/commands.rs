//! CLI command implementations

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use budgetsync_core::{BudgetConfig, BudgetSnapshot, format_amount};
use budgetsync_service::BudgetService;

pub async fn show(config: &BudgetConfig, refresh: bool, json: bool) -> Result<()> {
    let service = BudgetService::from_config(config)?;
    let read = service.read_budget(refresh).await;
    tracing::debug!("Budget read from {:?}", read.source);

    if json {
        println!("{}", serde_json::to_string_pretty(&read)?);
    } else {
        print!("{}", render(&read.snapshot));
    }
    Ok(())
}

pub async fn say(config: &BudgetConfig, message: &str, json: bool) -> Result<()> {
    let service = BudgetService::from_config(config)?;
    let outcome = service.process_text_command(message).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!("{}", outcome.message);
    for suggestion in &outcome.suggestions {
        println!("  {suggestion}");
    }
    if let Some(snapshot) = &outcome.snapshot {
        println!();
        print!("{}", render(snapshot));
    }
    if !outcome.success {
        anyhow::bail!("Budget was not updated");
    }
    Ok(())
}

pub async fn update(config: &BudgetConfig, file: &Path) -> Result<()> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("{} is not JSON", file.display()))?;

    let snapshot = if value.get("categories").is_some() {
        BudgetSnapshot::from_local_value(&value)?
    } else {
        BudgetSnapshot::from_server_value(&value)?
    };

    let service = BudgetService::from_config(config)?;
    let confirmed = service
        .update_budget(&snapshot)
        .await
        .context("Budget was not saved")?;
    print!("{}", render(&confirmed));
    Ok(())
}

pub async fn reset(config: &BudgetConfig) -> Result<()> {
    let service = BudgetService::from_config(config)?;
    service.reset_budget().await;
    println!("Budget reset");
    Ok(())
}

pub async fn watch(config: &BudgetConfig, interval: Option<Duration>) -> Result<()> {
    let service = BudgetService::from_config(config)?;

    let handle = service
        .start_watcher(
            |snapshot| {
                println!("{}", "-".repeat(40));
                print!("{}", render(snapshot));
            },
            interval,
        )
        .await;

    tokio::signal::ctrl_c().await?;
    handle.stop();
    tracing::info!("Watcher stopped");
    Ok(())
}

pub fn config(config: &BudgetConfig) -> Result<()> {
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

/// Categories, one per line, followed by the total.
fn render(snapshot: &BudgetSnapshot) -> String {
    if snapshot.is_empty() {
        return "No budget set.\n".to_string();
    }

    let width = snapshot
        .category_names()
        .map(|name| name.chars().count())
        .max()
        .unwrap_or(0)
        .max("Total".len());

    let mut out = String::new();
    for (name, amount) in &snapshot.categories {
        out.push_str(&format!("{name:<width$}  {}\n", format_amount(*amount)));
    }
    out.push_str(&format!("{:<width$}  {}\n", "Total", format_amount(snapshot.total)));
    if (snapshot.total - snapshot.category_sum()).abs() > f64::EPSILON {
        out.push_str(&format!(
            "{:<width$}  {}\n",
            "Allocated",
            format_amount(snapshot.category_sum())
        ));
    }
    for tip in &snapshot.recommendations {
        out.push_str(&format!("* {tip}\n"));
    }
    out
}

//! Cache command - inspect and sweep build cache volumes

use crate::cache::{CleanupParams, CleanupReport};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::cli::commands::print_json;
use crate::control::ControlPlane;
use crate::error::{CorralError, CorralResult};
use crate::model::volume::labels;
use crate::model::{CacheVolume, LabelSelector, VolumePhase};
use crate::ui::{self, Table, UiContext};
use console::style;

/// Execute the cache command
pub async fn execute(args: CacheArgs, plane: &ControlPlane) -> CorralResult<()> {
    match args.action {
        CacheAction::List { format } => list_caches(plane, format).await,
        CacheAction::Cleanup {
            stale_days,
            include_live_apps,
            dry_run,
            format,
        } => {
            let params = CleanupParams {
                stale_days: stale_days.map(serde_json::Value::String),
                check_app_exists: include_live_apps.then_some(false),
                dry_run: Some(dry_run),
            };
            cleanup_caches(plane, &params, format).await
        }
    }
}

/// List cache volumes in every namespace
async fn list_caches(plane: &ControlPlane, format: OutputFormat) -> CorralResult<()> {
    let volumes = plane
        .volumes
        .list(None, &LabelSelector::label(labels::CACHE, "true"))
        .await?;

    match format {
        OutputFormat::Table => print_cache_table(&volumes),
        OutputFormat::Json => print_json(&volumes)?,
        OutputFormat::Plain => volumes.iter().for_each(|v| println!("{}", v.meta.name)),
    }
    Ok(())
}

fn print_cache_table(volumes: &[CacheVolume]) {
    if volumes.is_empty() {
        println!("No cache volumes found.");
        return;
    }

    let mut table = Table::new(["VOLUME", "NAMESPACE", "APP", "SIZE", "PHASE", "LAST USED"]);
    for volume in volumes {
        let phase = match volume.status.phase {
            VolumePhase::Bound => style("bound").green().to_string(),
            VolumePhase::Pending => style("pending").yellow().to_string(),
            VolumePhase::Lost => style("lost").red().to_string(),
        };
        table.row([
            volume.meta.name.clone(),
            volume.meta.namespace.clone(),
            volume.owner().map(|o| o.name).unwrap_or_else(|| "-".to_string()),
            volume.spec.size.to_string(),
            phase,
            volume.last_activity().format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }
    table.print("cache");
}

async fn cleanup_caches(
    plane: &ControlPlane,
    params: &CleanupParams,
    format: OutputFormat,
) -> CorralResult<()> {
    let report = plane
        .collector
        .cleanup_with(params, &plane.cleanup_defaults)
        .await?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Plain => report.deleted.iter().for_each(|name| println!("{}", name)),
        OutputFormat::Table => print_cleanup(&UiContext::detect(), &report),
    }

    if report.errors.is_empty() {
        Ok(())
    } else {
        Err(CorralError::User(format!(
            "{} cache volume(s) could not be removed",
            report.errors.len()
        )))
    }
}

fn print_cleanup(ctx: &UiContext, report: &CleanupReport) {
    if report.stale_caches.is_empty() {
        ui::step_ok(ctx, "No stale caches found");
        return;
    }

    let mut table = Table::new(["VOLUME", "NAMESPACE", "APP", "SIZE", "IDLE DAYS"]);
    for cache in &report.stale_caches {
        table.row([
            cache.name.clone(),
            cache.namespace.clone(),
            cache.app.clone().unwrap_or_else(|| "-".to_string()),
            cache.size.clone(),
            cache.age_days.to_string(),
        ]);
    }
    table.print("stale cache");
    println!();

    if report.dry_run {
        ui::remark(ctx, "Dry run - no caches removed.");
        return;
    }

    for error in &report.errors {
        ui::step_error_detail(ctx, &format!("Could not remove {}", error.volume), &error.reason);
    }
    ui::step_ok(ctx, &format!("Removed {} cache(s)", report.deleted.len()));
}

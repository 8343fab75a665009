//! App command - create, inspect and stage applications

use crate::cache::{ReconcileOutcome, ReconcileReport};
use crate::cli::args::{AccessModeArg, AppAction, AppArgs, OutputFormat};
use crate::cli::commands::print_json;
use crate::control::{AppDetails, ControlPlane};
use crate::error::CorralResult;
use crate::model::{Application, CacheVolumeSpec, ObjectRef, Quantity, VolumeMode};
use crate::ui::{self, Table, UiContext};
use console::style;

/// Execute the app command
pub async fn execute(args: AppArgs, plane: &ControlPlane, namespace: &str) -> CorralResult<()> {
    let ctx = UiContext::detect();

    match args.action {
        AppAction::Create {
            name,
            cache_size,
            cache_access_mode,
            cache_block,
            cache_storage_class,
        } => {
            let cache = cache_request(
                cache_size.as_deref(),
                &cache_access_mode,
                cache_block,
                cache_storage_class,
            )?;
            let app = ObjectRef::new(namespace, name);
            plane.create_app(&app, cache).await?;
            ui::step_ok(&ctx, &format!("Created application {}", app));
        }
        AppAction::Show { name, format } => {
            let details = plane.app_details(&ObjectRef::new(namespace, name)).await?;
            match format {
                OutputFormat::Json => print_json(&details)?,
                OutputFormat::Table | OutputFormat::Plain => print_details(&ctx, &details),
            }
        }
        AppAction::List { format } => {
            let apps = plane.list_apps(namespace).await?;
            match format {
                OutputFormat::Table => print_app_table(namespace, &apps),
                OutputFormat::Json => print_json(&apps)?,
                OutputFormat::Plain => apps.iter().for_each(|a| println!("{}", a.meta.name)),
            }
        }
        AppAction::Delete { name } => {
            let app = ObjectRef::new(namespace, name);
            plane.delete_app(&app).await?;
            ui::step_ok(&ctx, &format!("Deleted application {}", app));
            ui::remark(&ctx, "Its cache volume is removed by the next cache cleanup");
        }
        AppAction::Stage { name, format } => {
            let report = plane
                .reconciler
                .reconcile(&ObjectRef::new(namespace, name))
                .await?;
            match format {
                OutputFormat::Json => print_json(&report)?,
                OutputFormat::Table | OutputFormat::Plain => print_stage(&ctx, &report),
            }
        }
    }

    Ok(())
}

/// Cache volume request from the create flags; `None` when none was given
fn cache_request(
    size: Option<&str>,
    access_modes: &[AccessModeArg],
    block: bool,
    storage_class: Option<String>,
) -> CorralResult<Option<CacheVolumeSpec>> {
    if size.is_none() && access_modes.is_empty() && !block && storage_class.is_none() {
        return Ok(None);
    }

    let size = size.map(str::parse::<Quantity>).transpose()?;
    let mut access_modes: Vec<_> = access_modes.iter().map(|m| (*m).into()).collect();
    access_modes.dedup();

    Ok(Some(CacheVolumeSpec {
        size,
        access_modes,
        volume_mode: block.then_some(VolumeMode::Block),
        storage_class_name: storage_class,
    }))
}

fn print_details(ctx: &UiContext, details: &AppDetails) {
    let app = &details.application;

    ui::section(ctx, &format!("Application {}", app.meta.object_ref()));
    ui::key_value(ctx, "Created", &app.meta.created_at.format("%Y-%m-%d %H:%M").to_string());
    ui::key_value(ctx, "Restarts", &app.status.restart_generation.to_string());
    if let Some(at) = app.status.restarted_at {
        ui::key_value(ctx, "Last restart", &at.format("%Y-%m-%d %H:%M").to_string());
    }

    let bound = app.bound_names();
    ui::key_value(
        ctx,
        "Bound configurations",
        &if bound.is_empty() {
            "none".to_string()
        } else {
            bound.join(", ")
        },
    );

    match &details.cache_volume {
        Some(volume) => {
            let modes: Vec<&str> = volume.spec.access_modes.iter().map(|m| m.short()).collect();
            ui::key_value(
                ctx,
                "Cache volume",
                &format!(
                    "{} ({}, {}, {}, {})",
                    volume.meta.name,
                    volume.spec.size,
                    modes.join(","),
                    volume.spec.volume_mode,
                    volume.status.phase
                ),
            );
        }
        None => ui::key_value(ctx, "Cache volume", "not staged"),
    }
}

fn print_app_table(namespace: &str, apps: &[Application]) {
    if apps.is_empty() {
        println!("No applications in namespace {}.", namespace);
        return;
    }

    let mut table = Table::new(["NAME", "BINDINGS", "CACHE", "RESTARTS", "CREATED"]);
    for app in apps {
        let cache = app
            .spec
            .cache_volume
            .as_ref()
            .and_then(|c| c.size.as_ref())
            .map(|s| s.to_string())
            .unwrap_or_else(|| "default".to_string());
        table.row([
            app.meta.name.clone(),
            app.spec.bound_configurations.len().to_string(),
            cache,
            app.status.restart_generation.to_string(),
            app.meta.created_at.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }
    table.print("application");
}

fn print_stage(ctx: &UiContext, report: &ReconcileReport) {
    let volume = &report.volume.name;
    match &report.outcome {
        ReconcileOutcome::Created => {
            ui::step_ok_detail(ctx, "Created cache volume", volume);
        }
        ReconcileOutcome::Kept => {
            ui::step_ok_detail(ctx, "Cache volume up to date", volume);
        }
        ReconcileOutcome::Recreated { reason } => {
            ui::step_warn(
                ctx,
                &format!("Recreated cache volume {} ({})", volume, style(reason).dim()),
            );
        }
        ReconcileOutcome::Mismatch { reason } => {
            ui::step_warn_hint(
                ctx,
                &format!("Cache volume {} does not match: {}", volume, reason),
                "Enable cache.recreate_on_mismatch or stage again once it is bound",
            );
        }
    }
}

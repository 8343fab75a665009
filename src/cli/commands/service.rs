//! Service command - manage service instances and bindings

use crate::binder::{BindReport, TriggerOutcome};
use crate::cli::args::{OutputFormat, ServiceAction, ServiceArgs};
use crate::cli::commands::print_json;
use crate::control::ControlPlane;
use crate::error::{CorralError, CorralResult};
use crate::model::{ObjectRef, ServiceInstance};
use crate::services::{ServiceDetails, ServiceUpdate};
use crate::store::Api;
use crate::ui::{self, Table, UiContext};
use tracing::debug;

/// Execute the service command
pub async fn execute(
    args: ServiceArgs,
    plane: &ControlPlane,
    namespace: &str,
) -> CorralResult<()> {
    let ctx = UiContext::detect();

    match args.action {
        ServiceAction::Create {
            name,
            catalog,
            values,
        } => {
            let service = plane
                .services
                .create(namespace, &name, &catalog, values.into_iter().collect())
                .await?;
            ui::step_ok_detail(
                &ctx,
                &format!("Created service {}", service.meta.object_ref()),
                &service.credentials_configuration_name(),
            );
        }
        ServiceAction::Show { name, format } => {
            let details = plane.services.show(namespace, &name).await?;
            match format {
                OutputFormat::Json => print_json(&details)?,
                OutputFormat::Table | OutputFormat::Plain => print_details(&ctx, &details),
            }
        }
        ServiceAction::List { format } => {
            let services = plane.services.list(namespace).await?;
            match format {
                OutputFormat::Table => print_service_table(namespace, &services),
                OutputFormat::Json => print_json(&services)?,
                OutputFormat::Plain => services
                    .iter()
                    .for_each(|s| println!("{}", s.service.meta.name)),
            }
        }
        ServiceAction::Bind { names, no_restart } => {
            let order = BindOrder::resolve(plane, namespace, names).await?;
            let app = ObjectRef::new(namespace, &order.app);
            let report = if order.legacy {
                plane
                    .binder
                    .bind_service(&app, &order.services[0], !no_restart)
                    .await?
            } else {
                plane
                    .binder
                    .batch_bind(&app, &order.services, !no_restart)
                    .await?
            };
            print_bind(&ctx, &order.services, &report);
        }
        ServiceAction::Unbind {
            service,
            app,
            no_restart,
        } => {
            let report = plane
                .binder
                .unbind(&ObjectRef::new(namespace, app), &service, !no_restart)
                .await?;
            ui::step_ok(
                &ctx,
                &format!(
                    "Unbound {} from {} ({})",
                    report.service,
                    report.app,
                    outcome_text(report.outcome)
                ),
            );
        }
        ServiceAction::Update {
            name,
            set,
            unset,
            no_restart,
        } => {
            let update = ServiceUpdate {
                set: set.into_iter().collect(),
                unset,
                restart: no_restart.then_some(false),
            };
            let report = plane.services.update(namespace, &name, &update).await?;
            ui::step_ok(&ctx, &format!("Updated service {}", report.service));
            if report.bound_apps.is_empty() {
                ui::remark(&ctx, "No applications are bound to it");
            } else if report.redeployed.is_empty() {
                ui::remark(
                    &ctx,
                    &format!(
                        "Not redeployed: {}",
                        report.bound_apps.join(", ")
                    ),
                );
            } else {
                ui::remark(&ctx, &format!("Redeployed: {}", report.redeployed.join(", ")));
            }
        }
        ServiceAction::Delete { name, unbind } => {
            plane.services.delete(namespace, &name, unbind).await?;
            ui::step_ok(&ctx, &format!("Deleted service {}/{}", namespace, name));
        }
    }

    Ok(())
}

/// Which positional argument of `service bind` names the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindOrder {
    pub app: String,
    pub services: Vec<String>,
    /// Given as `SERVICE APP`
    pub legacy: bool,
}

impl BindOrder {
    /// `APP SERVICE...`, or `SERVICE APP` when exactly two names are given and
    /// only that reading names an existing application and service.
    pub async fn resolve(
        plane: &ControlPlane,
        namespace: &str,
        mut names: Vec<String>,
    ) -> CorralResult<Self> {
        if names.len() < 2 {
            return Err(CorralError::invalid(
                "expected an application and at least one service",
            ));
        }

        if names.len() == 2 {
            let first = ObjectRef::new(namespace, &names[0]);
            let services: Api<ServiceInstance> = Api::new(plane.store.clone());
            if !plane.apps.exists(&first).await? && services.exists(&first).await? {
                debug!("Treating '{} {}' as SERVICE APP", names[0], names[1]);
                names.swap(0, 1);
                let app = names.remove(0);
                return Ok(Self {
                    app,
                    services: names,
                    legacy: true,
                });
            }
        }

        let app = names.remove(0);
        Ok(Self {
            app,
            services: names,
            legacy: false,
        })
    }
}

fn outcome_text(outcome: TriggerOutcome) -> &'static str {
    match outcome {
        TriggerOutcome::Redeployed => "redeployed",
        TriggerOutcome::Suppressed => "not redeployed",
    }
}

fn print_bind(ctx: &UiContext, services: &[String], report: &BindReport) {
    ui::step_ok(
        ctx,
        &format!(
            "Bound {} to {} ({})",
            services.join(", "),
            report.app,
            outcome_text(report.outcome)
        ),
    );
    if report.configurations.is_empty() {
        ui::remark(ctx, "The services expose no configurations yet");
    } else {
        ui::remark(
            ctx,
            &format!(
                "{} configuration(s), {} new: {}",
                report.configurations.len(),
                report.added,
                report.configurations.join(", ")
            ),
        );
    }
}

fn print_details(ctx: &UiContext, details: &ServiceDetails) {
    let service = &details.service;
    ui::section(ctx, &format!("Service {}", service.meta.object_ref()));
    ui::key_value(ctx, "Catalog", &service.spec.catalog_service);
    ui::key_value(ctx, "Release", &service.spec.release);
    let keys: Vec<&str> = service.spec.values.keys().map(String::as_str).collect();
    ui::key_value(ctx, "Values", &list_or_none(&keys));
    ui::key_value(ctx, "Configurations", &list_or_none(&details.configurations));
    ui::key_value(ctx, "Bound to", &list_or_none(&details.bound_apps));
}

fn list_or_none<S: AsRef<str>>(items: &[S]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(", ")
    }
}

fn print_service_table(namespace: &str, services: &[ServiceDetails]) {
    if services.is_empty() {
        println!("No services in namespace {}.", namespace);
        return;
    }

    let mut table = Table::new(["NAME", "CATALOG", "RELEASE", "BOUND APPS"]);
    for details in services {
        table.row([
            details.service.meta.name.clone(),
            details.service.spec.catalog_service.clone(),
            details.service.spec.release.clone(),
            list_or_none(&details.bound_apps),
        ]);
    }
    table.print("service");
}

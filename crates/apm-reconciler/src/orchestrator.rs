//! Application orchestrator
//!
//! Drives one declared application through every reconciliation step in a
//! fixed order. Applications are processed sequentially; a failure aborts the
//! remaining steps of that application only.

use apm_config::{AppDeclaration, ReconcileSettings};
use apm_graph::{Directory, MICROSOFT_GRAPH_APP_ID};
use apm_secrets::Provider;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};

use crate::app_roles::reconcile_app_roles;
use crate::application::{find_or_create, ApplicationIds};
use crate::assignments::ensure_group_assigned;
use crate::client_secret::ensure_client_secret;
use crate::configure;
use crate::error::Result;
use crate::resource_access::reconcile_resource_access;
use crate::signing::SigningPolicy;
use crate::waiter::WaitPolicy;

/// Tunables of a reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerOptions {
    pub wait: WaitPolicy,
    pub signing: SigningPolicy,
    /// A client secret must outlive now + this to be kept.
    pub password_min_validity: Duration,
}

impl Default for ReconcilerOptions {
    fn default() -> Self {
        Self {
            wait: WaitPolicy::default(),
            signing: SigningPolicy::default(),
            password_min_validity: Duration::days(10),
        }
    }
}

impl From<&ReconcileSettings> for ReconcilerOptions {
    fn from(settings: &ReconcileSettings) -> Self {
        Self {
            wait: WaitPolicy {
                max_attempts: settings.wait_max_attempts,
                interval: std::time::Duration::from_secs(settings.wait_interval_secs),
            },
            signing: SigningPolicy {
                min_validity: Duration::days(settings.signing_min_validity_days),
                validity: Duration::days(settings.signing_validity_days),
            },
            password_min_validity: Duration::days(settings.password_min_validity_days),
        }
    }
}

/// Outcome of a run over several applications.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub succeeded: Vec<String>,
    /// Application name and rendered error.
    pub failed: Vec<(String, String)>,
}

impl RunReport {
    pub fn has_errors(&self) -> bool {
        !self.failed.is_empty()
    }
}

pub struct Reconciler {
    directory: Arc<dyn Directory>,
    secrets: Arc<dyn Provider>,
    http_client: reqwest::Client,
    options: ReconcilerOptions,
}

impl Reconciler {
    pub fn new(
        directory: Arc<dyn Directory>,
        secrets: Arc<dyn Provider>,
        http_client: reqwest::Client,
        options: ReconcilerOptions,
    ) -> Self {
        Self {
            directory,
            secrets,
            http_client,
            options,
        }
    }

    /// Reconcile every application, continuing past failures.
    pub async fn run(&self, apps: &[AppDeclaration]) -> RunReport {
        let mut report = RunReport::default();

        for app in apps {
            let span = info_span!("application", name = %app.name);
            match self.reconcile_app(app).instrument(span).await {
                Ok(ids) => {
                    info!(
                        app = %app.name,
                        application_id = %ids.application_id,
                        "Application reconciled"
                    );
                    report.succeeded.push(app.name.clone());
                }
                Err(e) => {
                    error!(app = %app.name, error = %e, "Failed to reconcile application");
                    report.failed.push((app.name.clone(), e.to_string()));
                }
            }
        }

        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Reconciliation finished"
        );
        report
    }

    /// Converge one application to its declaration.
    pub async fn reconcile_app(&self, app: &AppDeclaration) -> Result<ApplicationIds> {
        let directory = self.directory.as_ref();
        let now = Utc::now();

        let (ids, created) = find_or_create(directory, &app.name, &self.options.wait).await?;
        if created {
            info!(application_id = %ids.application_id, "Application created");
        }
        let application_id = ids.application_id.as_str();
        let service_principal_id = ids.service_principal_id.as_str();

        configure::update_application_config(directory, application_id, app).await?;

        if let Some(logo_url) = &app.logo_url {
            configure::set_logo(directory, &self.http_client, application_id, logo_url).await?;
        }

        configure::set_on_premises_publishing(directory, application_id, app).await?;
        configure::set_user_assignment_required(
            directory,
            service_principal_id,
            app.user_assignment_required,
        )
        .await?;
        configure::assign_default_groups(directory, service_principal_id, &app.app_role_assignments)
            .await?;

        if let Some(tls) = &app.tls {
            configure::set_tls_certificate(directory, self.secrets.as_ref(), application_id, tls)
                .await?;
        }

        if app.is_saml() {
            configure::enable_saml(
                directory,
                service_principal_id,
                &app.name,
                &self.options.signing,
                now,
            )
            .await?;
        }

        configure::set_optional_claims(directory, application_id, app).await?;

        reconcile_resource_access(
            directory,
            application_id,
            MICROSOFT_GRAPH_APP_ID,
            &app.graph_api_permissions,
        )
        .await?;

        if let Some(location) = &app.client_secret {
            ensure_client_secret(
                directory,
                self.secrets.as_ref(),
                application_id,
                location,
                self.options.password_min_validity,
                now,
            )
            .await?;
        }

        if let Some(roles) = &app.app_roles {
            reconcile_app_roles(directory, application_id, roles).await?;
            for role in roles {
                for group in &role.groups {
                    ensure_group_assigned(directory, group, service_principal_id, role.id).await?;
                }
            }
        }

        if app.is_saml() {
            configure::set_saml_uris(directory, application_id, app).await?;
        }

        Ok(ids)
    }
}

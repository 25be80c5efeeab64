//! The `Directory` seam between the reconciliation engine and Microsoft Graph
//!
//! Every remote call the engine makes goes through this trait, so the engine can
//! be driven against an in-memory directory in tests. [`GraphClient`] is the
//! production implementation.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::client::{GraphClient, Visibility};
use crate::error::{GraphError, GraphResult};
use crate::models::{
    ApiVersion, AppRole, AppRoleAssignment, Application, ApplicationTemplateInstance, Group,
    NewAppRoleAssignment, ODataPage, ObjectRef, PasswordCredential, PermissionCatalog,
    ServicePrincipal, SigningCertificate,
};

/// Template id of the custom (non-gallery) enterprise application.
pub const CUSTOM_APPLICATION_TEMPLATE_ID: &str = "8adf8e6e-67b2-4cf2-a259-e3dc5476c621";

/// Quote a value for an OData string literal.
pub fn odata_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Remote operations needed to reconcile applications.
#[async_trait]
pub trait Directory: Send + Sync {
    // Applications

    /// Applications whose display name equals `display_name`.
    async fn find_applications(&self, display_name: &str) -> GraphResult<Vec<ObjectRef>>;

    /// Applications whose display name starts with `prefix`.
    async fn find_applications_by_prefix(&self, prefix: &str) -> GraphResult<Vec<Application>>;

    async fn instantiate_application(
        &self,
        display_name: &str,
    ) -> GraphResult<ApplicationTemplateInstance>;

    /// Single read used by the eventual-consistency waiter.
    async fn application_visibility(&self, application_id: &str) -> GraphResult<Visibility>;

    async fn get_application(&self, application_id: &str) -> GraphResult<Application>;

    /// Merge-style PATCH of an application. `operation` names the step in errors.
    async fn patch_application(
        &self,
        application_id: &str,
        version: ApiVersion,
        operation: &str,
        body: &Value,
    ) -> GraphResult<()>;

    async fn delete_application(&self, application_id: &str) -> GraphResult<()>;

    async fn upload_logo(
        &self,
        application_id: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> GraphResult<()>;

    async fn add_password(
        &self,
        application_id: &str,
        display_name: &str,
    ) -> GraphResult<PasswordCredential>;

    // Service principals

    async fn find_service_principals(&self, display_name: &str) -> GraphResult<Vec<ObjectRef>>;

    async fn get_service_principal(&self, service_principal_id: &str)
        -> GraphResult<ServicePrincipal>;

    async fn patch_service_principal(
        &self,
        service_principal_id: &str,
        operation: &str,
        body: &Value,
    ) -> GraphResult<()>;

    /// Roles published by a service principal (beta endpoint).
    async fn service_principal_app_roles(
        &self,
        service_principal_id: &str,
    ) -> GraphResult<Vec<AppRole>>;

    async fn add_token_signing_certificate(
        &self,
        service_principal_id: &str,
        display_name: &str,
        end_date_time: DateTime<Utc>,
    ) -> GraphResult<SigningCertificate>;

    /// Published roles and scopes of the resource with application id `resource_app_id`.
    async fn permission_catalog(&self, resource_app_id: &str) -> GraphResult<PermissionCatalog>;

    // Groups and assignments

    /// Security-enabled groups whose display name equals `display_name`.
    async fn find_security_groups(&self, display_name: &str) -> GraphResult<Vec<Group>>;

    /// One page of the assignments a group holds on `resource_id`.
    ///
    /// `continuation` is the `@odata.nextLink` of the previous page, `None` for the first.
    async fn list_group_assignments(
        &self,
        group_id: &str,
        resource_id: &str,
        continuation: Option<&str>,
    ) -> GraphResult<ODataPage<AppRoleAssignment>>;

    async fn create_group_assignment(
        &self,
        assignment: &NewAppRoleAssignment,
    ) -> GraphResult<AppRoleAssignment>;
}

#[async_trait]
impl Directory for GraphClient {
    async fn find_applications(&self, display_name: &str) -> GraphResult<Vec<ObjectRef>> {
        let filter = format!("displayName eq {}", odata_quote(display_name));
        let page: ODataPage<ObjectRef> = self
            .get(
                "searching for application",
                &self.url(ApiVersion::V1, "applications"),
                &[("$filter", filter.as_str()), ("$select", "id")],
            )
            .await?;
        Ok(page.value)
    }

    async fn find_applications_by_prefix(&self, prefix: &str) -> GraphResult<Vec<Application>> {
        let filter = format!("startswith(displayName,{})", odata_quote(prefix));
        let page: ODataPage<Application> = self
            .get(
                "finding applications",
                &self.url(ApiVersion::V1, "applications"),
                &[
                    ("$filter", filter.as_str()),
                    ("$select", "id,appId,displayName,publisherDomain,createdDateTime"),
                ],
            )
            .await?;
        Ok(page.value)
    }

    async fn instantiate_application(
        &self,
        display_name: &str,
    ) -> GraphResult<ApplicationTemplateInstance> {
        let url = self.url(
            ApiVersion::V1,
            &format!(
                "applicationTemplates/{}/instantiate",
                CUSTOM_APPLICATION_TEMPLATE_ID
            ),
        );
        self.post(
            "creating application",
            &url,
            &json!({ "displayName": display_name }),
        )
        .await
    }

    async fn application_visibility(&self, application_id: &str) -> GraphResult<Visibility> {
        self.probe(&self.url(
            ApiVersion::V1,
            &format!("applications/{}", application_id),
        ))
        .await
    }

    async fn get_application(&self, application_id: &str) -> GraphResult<Application> {
        self.get(
            "retrieving application",
            &self.url(ApiVersion::V1, &format!("applications/{}", application_id)),
            &[],
        )
        .await
    }

    async fn patch_application(
        &self,
        application_id: &str,
        version: ApiVersion,
        operation: &str,
        body: &Value,
    ) -> GraphResult<()> {
        self.patch(
            operation,
            &self.url(version, &format!("applications/{}", application_id)),
            body,
        )
        .await
    }

    async fn delete_application(&self, application_id: &str) -> GraphResult<()> {
        self.delete(
            "deleting application",
            &self.url(ApiVersion::V1, &format!("applications/{}", application_id)),
        )
        .await
    }

    async fn upload_logo(
        &self,
        application_id: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> GraphResult<()> {
        self.put_bytes(
            "setting logo",
            &self.url(
                ApiVersion::V1,
                &format!("applications/{}/logo", application_id),
            ),
            content_type,
            bytes,
        )
        .await
    }

    async fn add_password(
        &self,
        application_id: &str,
        display_name: &str,
    ) -> GraphResult<PasswordCredential> {
        self.post(
            "adding client password",
            &self.url(
                ApiVersion::V1,
                &format!("applications/{}/addPassword", application_id),
            ),
            &json!({ "passwordCredential": { "displayName": display_name } }),
        )
        .await
    }

    async fn find_service_principals(&self, display_name: &str) -> GraphResult<Vec<ObjectRef>> {
        let filter = format!("displayName eq {}", odata_quote(display_name));
        let page: ODataPage<ObjectRef> = self
            .get(
                "searching for service principal",
                &self.url(ApiVersion::V1, "servicePrincipals"),
                &[("$filter", filter.as_str()), ("$select", "id")],
            )
            .await?;
        Ok(page.value)
    }

    async fn get_service_principal(
        &self,
        service_principal_id: &str,
    ) -> GraphResult<ServicePrincipal> {
        self.get(
            "reading service principal",
            &self.url(
                ApiVersion::V1,
                &format!("servicePrincipals/{}", service_principal_id),
            ),
            &[],
        )
        .await
    }

    async fn patch_service_principal(
        &self,
        service_principal_id: &str,
        operation: &str,
        body: &Value,
    ) -> GraphResult<()> {
        self.patch(
            operation,
            &self.url(
                ApiVersion::V1,
                &format!("servicePrincipals/{}", service_principal_id),
            ),
            body,
        )
        .await
    }

    async fn service_principal_app_roles(
        &self,
        service_principal_id: &str,
    ) -> GraphResult<Vec<AppRole>> {
        let page: ODataPage<AppRole> = self
            .get(
                "finding app roles",
                &self.url(
                    ApiVersion::Beta,
                    &format!("servicePrincipals/{}/appRoles", service_principal_id),
                ),
                &[],
            )
            .await?;
        Ok(page.value)
    }

    async fn add_token_signing_certificate(
        &self,
        service_principal_id: &str,
        display_name: &str,
        end_date_time: DateTime<Utc>,
    ) -> GraphResult<SigningCertificate> {
        self.post(
            "adding SAML signing certificate",
            &self.url(
                ApiVersion::V1,
                &format!(
                    "servicePrincipals/{}/addTokenSigningCertificate",
                    service_principal_id
                ),
            ),
            &json!({
                "displayName": display_name,
                "endDateTime": end_date_time.to_rfc3339_opts(SecondsFormat::Secs, true),
            }),
        )
        .await
    }

    async fn permission_catalog(&self, resource_app_id: &str) -> GraphResult<PermissionCatalog> {
        let filter = format!("appId eq {}", odata_quote(resource_app_id));
        let page: ODataPage<PermissionCatalog> = self
            .get(
                "reading permission catalog",
                &self.url(ApiVersion::V1, "servicePrincipals"),
                &[
                    ("$filter", filter.as_str()),
                    ("$select", "id,appRoles,oauth2PermissionScopes"),
                ],
            )
            .await?;

        page.value.into_iter().next().ok_or_else(|| {
            GraphError::UnexpectedResponse(format!(
                "no service principal published for resource {}",
                resource_app_id
            ))
        })
    }

    async fn find_security_groups(&self, display_name: &str) -> GraphResult<Vec<Group>> {
        let filter = format!(
            "displayName eq {} and securityEnabled eq true",
            odata_quote(display_name)
        );
        let page: ODataPage<Group> = self
            .get(
                "finding group id",
                &self.url(ApiVersion::V1, "groups"),
                &[
                    ("$filter", filter.as_str()),
                    ("$select", "id,displayName,securityEnabled"),
                ],
            )
            .await?;
        Ok(page.value)
    }

    async fn list_group_assignments(
        &self,
        group_id: &str,
        resource_id: &str,
        continuation: Option<&str>,
    ) -> GraphResult<ODataPage<AppRoleAssignment>> {
        const OPERATION: &str = "listing app role assignments";

        match continuation {
            Some(link) => {
                self.check_continuation(link)?;
                self.get(OPERATION, link, &[]).await
            }
            None => {
                let filter = format!("resourceId eq {}", resource_id);
                self.get(
                    OPERATION,
                    &self.url(
                        ApiVersion::V1,
                        &format!("groups/{}/appRoleAssignments", group_id),
                    ),
                    &[("$filter", filter.as_str())],
                )
                .await
            }
        }
    }

    async fn create_group_assignment(
        &self,
        assignment: &NewAppRoleAssignment,
    ) -> GraphResult<AppRoleAssignment> {
        self.post(
            "assigning app role",
            &self.url(
                ApiVersion::V1,
                &format!("groups/{}/appRoleAssignments", assignment.principal_id),
            ),
            assignment,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_odata_quote_escapes_single_quotes() {
        assert_eq!(odata_quote("contoso-app"), "'contoso-app'");
        assert_eq!(odata_quote("O'Brien apps"), "'O''Brien apps'");
    }
}

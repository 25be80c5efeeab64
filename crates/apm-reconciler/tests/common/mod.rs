//! In-memory directory and secret store for the reconciler integration tests.
//!
//! Objects are kept as raw JSON and PATCH bodies are merged into them, so a
//! second reconciliation run reads back exactly what the first one wrote.

#![allow(dead_code)]

use apm_graph::{
    ApiVersion, AppRole, AppRoleAssignment, Application, ApplicationTemplateInstance, Directory,
    GraphError, GraphResult, Group, NewAppRoleAssignment, ODataPage, ObjectRef,
    PasswordCredential, PermissionCatalog, ServicePrincipal, SigningCertificate, Visibility,
};
use apm_secrets::{Provider, SecretRef, SecretsError};
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use uuid::Uuid;

pub const NEXT_PAGE_PREFIX: &str = "https://graph.test/v1.0/assignments?page=";

/// Id of the `msiam_access` role every template application starts with.
pub const MSIAM_ACCESS_ROLE_ID: Uuid = Uuid::from_u128(0xb9632174_c057_4f7e_951b_be3adc52bfe6);

/// Scripted answer of one visibility probe. `None` is a transport failure.
pub type Probe = Option<Visibility>;

#[derive(Default)]
pub struct State {
    pub applications: Vec<Value>,
    pub service_principals: Vec<Value>,
    pub groups: Vec<Group>,
    pub assignments: Vec<AppRoleAssignment>,
    pub catalog: PermissionCatalog,
    /// Assignments per page; 0 puts everything on one page.
    pub page_size: usize,
    /// Every page links to another one.
    pub endless_pages: bool,
    /// Answers consumed by `application_visibility` before falling back to
    /// the stored state.
    pub visibility: VecDeque<Probe>,
    /// Operations answered with a 500.
    pub failing_operations: HashSet<String>,
    pub calls: Vec<String>,
    /// Operation name and body of every application and service principal PATCH.
    pub patches: Vec<(String, Value)>,
    pub logos: Vec<(String, String, usize)>,
    next_id: usize,
}

impl State {
    fn next_id(&mut self) -> usize {
        self.next_id += 1;
        self.next_id
    }

    fn application_mut(&mut self, id: &str) -> GraphResult<&mut Value> {
        self.applications
            .iter_mut()
            .find(|app| app["id"] == id)
            .ok_or_else(|| not_found("application"))
    }

    fn service_principal_mut(&mut self, id: &str) -> GraphResult<&mut Value> {
        self.service_principals
            .iter_mut()
            .find(|sp| sp["id"] == id)
            .ok_or_else(|| not_found("service principal"))
    }

    fn fail_if_scripted(&self, operation: &str) -> GraphResult<()> {
        if self.failing_operations.contains(operation) {
            return Err(GraphError::Request {
                operation: operation.to_string(),
                status: 500,
                body: None,
            });
        }
        Ok(())
    }
}

fn not_found(what: &str) -> GraphError {
    GraphError::Request {
        operation: format!("reading {}", what),
        status: 404,
        body: Some(json!({"error": {"code": "Request_ResourceNotFound"}})),
    }
}

/// Recursive merge of `patch` into `target`, the way Graph applies PATCH bodies.
fn merge_patch(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_patch(existing, value)
                    }
                    _ => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: &Value) -> T {
    serde_json::from_value(value.clone()).expect("fake directory state is well-formed")
}

fn role_identity(role: &AppRole) -> (Uuid, Option<String>) {
    (role.id, role.display_name.clone())
}

/// Roles a freshly instantiated custom application comes with.
pub fn template_roles() -> Value {
    json!([
        {
            "id": apm_config::RESERVED_ROLE_ID,
            "allowedMemberTypes": ["User"],
            "description": "User",
            "displayName": "User",
            "isEnabled": true,
            "value": null
        },
        {
            "id": MSIAM_ACCESS_ROLE_ID,
            "allowedMemberTypes": ["User"],
            "description": "msiam_access",
            "displayName": "msiam_access",
            "isEnabled": true,
            "value": null
        }
    ])
}

pub struct FakeDirectory {
    state: Mutex<State>,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    /// Seed an application / service principal pair. Returns their object ids.
    pub fn add_application(&self, name: &str) -> (String, String) {
        self.with(|state| {
            let n = state.next_id();
            let app_id = Uuid::new_v4().to_string();
            let application_id = format!("app-{}", n);
            let service_principal_id = format!("sp-{}", n);
            state.applications.push(json!({
                "id": application_id,
                "appId": app_id,
                "displayName": name,
                "appRoles": template_roles(),
                "requiredResourceAccess": [],
                "passwordCredentials": [],
            }));
            state.service_principals.push(json!({
                "id": service_principal_id,
                "appId": app_id,
                "displayName": name,
                "keyCredentials": [],
            }));
            (application_id, service_principal_id)
        })
    }

    /// Seed an application without its service principal.
    pub fn add_orphan_application(&self, name: &str) -> String {
        let (application_id, service_principal_id) = self.add_application(name);
        self.with(|state| {
            state
                .service_principals
                .retain(|sp| sp["id"] != service_principal_id.as_str())
        });
        application_id
    }

    pub fn add_service_principal(&self, name: &str) -> String {
        self.with(|state| {
            let id = format!("sp-{}", state.next_id());
            state.service_principals.push(json!({
                "id": id,
                "appId": Uuid::new_v4().to_string(),
                "displayName": name,
                "keyCredentials": [],
            }));
            id
        })
    }

    pub fn add_group(&self, name: &str, security_enabled: bool) -> String {
        self.with(|state| {
            let id = format!("group-{}", state.next_id());
            state.groups.push(Group {
                id: id.clone(),
                display_name: Some(name.to_string()),
                security_enabled: Some(security_enabled),
            });
            id
        })
    }

    pub fn add_assignment(&self, group_id: &str, resource_id: &str, app_role_id: Uuid) {
        self.with(|state| {
            let id = format!("assignment-{}", state.next_id());
            state.assignments.push(AppRoleAssignment {
                id: Some(id),
                app_role_id,
                principal_id: group_id.to_string(),
                resource_id: resource_id.to_string(),
                principal_type: Some("Group".to_string()),
                resource_display_name: None,
            });
        })
    }

    pub fn set_key_credential_ends(&self, service_principal_id: &str, ends: &[DateTime<Utc>]) {
        let credentials: Vec<Value> = ends
            .iter()
            .map(|end| {
                json!({
                    "keyId": Uuid::new_v4(),
                    "endDateTime": end.to_rfc3339_opts(SecondsFormat::Secs, true),
                    "usage": "Verify",
                })
            })
            .collect();
        self.with(|state| {
            if let Ok(sp) = state.service_principal_mut(service_principal_id) {
                sp["keyCredentials"] = Value::Array(credentials);
            }
        })
    }

    pub fn application(&self, id: &str) -> Application {
        self.with(|state| decode(state.application_mut(id).unwrap()))
    }

    pub fn application_json(&self, id: &str) -> Value {
        self.with(|state| state.application_mut(id).unwrap().clone())
    }

    pub fn service_principal(&self, id: &str) -> ServicePrincipal {
        self.with(|state| decode(state.service_principal_mut(id).unwrap()))
    }

    pub fn service_principal_json(&self, id: &str) -> Value {
        self.with(|state| state.service_principal_mut(id).unwrap().clone())
    }

    pub fn calls(&self) -> Vec<String> {
        self.with(|state| state.calls.clone())
    }

    pub fn count(&self, call: &str) -> usize {
        self.with(|state| state.calls.iter().filter(|c| c.as_str() == call).count())
    }

    pub fn clear_calls(&self) {
        self.with(|state| {
            state.calls.clear();
            state.patches.clear();
        })
    }

    /// Bodies of every PATCH issued under `operation`, in order.
    pub fn patches(&self, operation: &str) -> Vec<Value> {
        self.with(|state| {
            state
                .patches
                .iter()
                .filter(|(op, _)| op == operation)
                .map(|(_, body)| body.clone())
                .collect()
        })
    }

    pub fn assignments(&self) -> Vec<AppRoleAssignment> {
        self.with(|state| state.assignments.clone())
    }
}

#[async_trait]
impl Directory for FakeDirectory {
    async fn find_applications(&self, display_name: &str) -> GraphResult<Vec<ObjectRef>> {
        self.with(|state| -> GraphResult<_> {
            state.calls.push("find_applications".to_string());
            Ok(state
                .applications
                .iter()
                .filter(|app| app["displayName"] == display_name)
                .map(|app| ObjectRef {
                    id: app["id"].as_str().unwrap_or_default().to_string(),
                })
                .collect())
        })
    }

    async fn find_applications_by_prefix(&self, prefix: &str) -> GraphResult<Vec<Application>> {
        self.with(|state| -> GraphResult<_> {
            state.calls.push("find_applications_by_prefix".to_string());
            Ok(state
                .applications
                .iter()
                .filter(|app| {
                    app["displayName"]
                        .as_str()
                        .is_some_and(|name| name.starts_with(prefix))
                })
                .map(decode)
                .collect())
        })
    }

    async fn instantiate_application(
        &self,
        display_name: &str,
    ) -> GraphResult<ApplicationTemplateInstance> {
        let (application_id, service_principal_id) = self.add_application(display_name);
        self.with(|state| state.calls.push("instantiate_application".to_string()));
        Ok(ApplicationTemplateInstance {
            application: ObjectRef { id: application_id },
            service_principal: ObjectRef {
                id: service_principal_id,
            },
        })
    }

    async fn application_visibility(&self, application_id: &str) -> GraphResult<Visibility> {
        self.with(|state| -> GraphResult<_> {
            state.calls.push("application_visibility".to_string());
            match state.visibility.pop_front() {
                Some(Some(visibility)) => Ok(visibility),
                Some(None) => Err(GraphError::UnexpectedResponse(
                    "connection reset".to_string(),
                )),
                None if state.application_mut(application_id).is_ok() => Ok(Visibility::Visible),
                None => Ok(Visibility::NotFound),
            }
        })
    }

    async fn get_application(&self, application_id: &str) -> GraphResult<Application> {
        self.with(|state| -> GraphResult<_> {
            state.calls.push("get_application".to_string());
            Ok(decode(state.application_mut(application_id)?))
        })
    }

    async fn patch_application(
        &self,
        application_id: &str,
        _version: ApiVersion,
        operation: &str,
        body: &Value,
    ) -> GraphResult<()> {
        self.with(|state| -> GraphResult<_> {
            state.calls.push(format!("patch_application:{}", operation));
            state.fail_if_scripted(operation)?;

            let application = state.application_mut(application_id)?;
            if let Some(roles) = body.get("appRoles") {
                let current: Application = decode(application);
                let wanted: Vec<AppRole> = decode(roles);
                let kept: HashSet<_> = wanted.iter().map(role_identity).collect();
                if current
                    .app_roles
                    .iter()
                    .any(|role| role.is_enabled && !kept.contains(&role_identity(role)))
                {
                    return Err(GraphError::Request {
                        operation: operation.to_string(),
                        status: 400,
                        body: Some(json!({
                            "error": {"code": "CannotDeleteOrUpdateEnabledEntitlement"}
                        })),
                    });
                }
            }

            merge_patch(application, body);
            state.patches.push((operation.to_string(), body.clone()));
            Ok(())
        })
    }

    async fn delete_application(&self, application_id: &str) -> GraphResult<()> {
        self.with(|state| -> GraphResult<_> {
            state.calls.push("delete_application".to_string());
            state.application_mut(application_id)?;
            state.applications.retain(|app| app["id"] != application_id);
            Ok(())
        })
    }

    async fn upload_logo(
        &self,
        application_id: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> GraphResult<()> {
        self.with(|state| -> GraphResult<_> {
            state.calls.push("upload_logo".to_string());
            state
                .logos
                .push((application_id.to_string(), content_type.to_string(), bytes.len()));
            Ok(())
        })
    }

    async fn add_password(
        &self,
        application_id: &str,
        display_name: &str,
    ) -> GraphResult<PasswordCredential> {
        self.with(|state| -> GraphResult<_> {
            state.calls.push("add_password".to_string());
            let n = state.next_id();
            let end = Utc::now() + Duration::days(730);
            let application = state.application_mut(application_id)?;
            let key_id = Uuid::new_v4().to_string();
            let stored = json!({
                "keyId": key_id,
                "displayName": display_name,
                "endDateTime": end.to_rfc3339_opts(SecondsFormat::Secs, true),
            });
            match application["passwordCredentials"].as_array_mut() {
                Some(credentials) => credentials.push(stored),
                None => application["passwordCredentials"] = json!([stored]),
            }
            Ok(PasswordCredential {
                key_id: Some(key_id),
                display_name: Some(display_name.to_string()),
                end_date_time: Some(end),
                secret_text: Some(format!("secret-{}", n)),
            })
        })
    }

    async fn find_service_principals(&self, display_name: &str) -> GraphResult<Vec<ObjectRef>> {
        self.with(|state| -> GraphResult<_> {
            state.calls.push("find_service_principals".to_string());
            Ok(state
                .service_principals
                .iter()
                .filter(|sp| sp["displayName"] == display_name)
                .map(|sp| ObjectRef {
                    id: sp["id"].as_str().unwrap_or_default().to_string(),
                })
                .collect())
        })
    }

    async fn get_service_principal(
        &self,
        service_principal_id: &str,
    ) -> GraphResult<ServicePrincipal> {
        self.with(|state| -> GraphResult<_> {
            state.calls.push("get_service_principal".to_string());
            Ok(decode(state.service_principal_mut(service_principal_id)?))
        })
    }

    async fn patch_service_principal(
        &self,
        service_principal_id: &str,
        operation: &str,
        body: &Value,
    ) -> GraphResult<()> {
        self.with(|state| -> GraphResult<_> {
            state.calls.push(format!("patch_service_principal:{}", operation));
            state.fail_if_scripted(operation)?;
            merge_patch(state.service_principal_mut(service_principal_id)?, body);
            state.patches.push((operation.to_string(), body.clone()));
            Ok(())
        })
    }

    async fn service_principal_app_roles(
        &self,
        service_principal_id: &str,
    ) -> GraphResult<Vec<AppRole>> {
        self.with(|state| -> GraphResult<_> {
            state.calls.push("service_principal_app_roles".to_string());
            let app_id = state.service_principal_mut(service_principal_id)?["appId"].clone();
            let roles = state
                .applications
                .iter()
                .find(|app| app["appId"] == app_id)
                .map(|app| decode::<Application>(app).app_roles)
                .unwrap_or_default();
            Ok(roles)
        })
    }

    async fn add_token_signing_certificate(
        &self,
        service_principal_id: &str,
        display_name: &str,
        end_date_time: DateTime<Utc>,
    ) -> GraphResult<SigningCertificate> {
        self.with(|state| -> GraphResult<_> {
            state.calls.push("add_token_signing_certificate".to_string());
            let thumbprint = format!("THUMBPRINT{}", state.next_id());
            let key_id = Uuid::new_v4().to_string();
            let service_principal = state.service_principal_mut(service_principal_id)?;
            let stored = json!({
                "keyId": key_id,
                "displayName": display_name,
                "customKeyIdentifier": thumbprint,
                "endDateTime": end_date_time.to_rfc3339_opts(SecondsFormat::Secs, true),
                "usage": "Verify",
                "type": "AsymmetricX509Cert",
            });
            match service_principal["keyCredentials"].as_array_mut() {
                Some(credentials) => credentials.push(stored),
                None => service_principal["keyCredentials"] = json!([stored]),
            }
            Ok(SigningCertificate {
                thumbprint,
                key_id: Some(key_id),
                end_date_time: Some(end_date_time),
            })
        })
    }

    async fn permission_catalog(&self, _resource_app_id: &str) -> GraphResult<PermissionCatalog> {
        self.with(|state| -> GraphResult<_> {
            state.calls.push("permission_catalog".to_string());
            Ok(state.catalog.clone())
        })
    }

    async fn find_security_groups(&self, display_name: &str) -> GraphResult<Vec<Group>> {
        self.with(|state| -> GraphResult<_> {
            state.calls.push("find_security_groups".to_string());
            Ok(state
                .groups
                .iter()
                .filter(|group| {
                    group.display_name.as_deref() == Some(display_name)
                        && group.security_enabled == Some(true)
                })
                .cloned()
                .collect())
        })
    }

    async fn list_group_assignments(
        &self,
        group_id: &str,
        resource_id: &str,
        continuation: Option<&str>,
    ) -> GraphResult<ODataPage<AppRoleAssignment>> {
        self.with(|state| -> GraphResult<_> {
            state.calls.push("list_group_assignments".to_string());

            let offset = match continuation {
                None => 0,
                Some(link) => link
                    .strip_prefix(NEXT_PAGE_PREFIX)
                    .and_then(|page| page.parse::<usize>().ok())
                    .ok_or_else(|| GraphError::UnexpectedResponse(link.to_string()))?,
            };

            let matching: Vec<AppRoleAssignment> = state
                .assignments
                .iter()
                .filter(|a| a.principal_id == group_id && a.resource_id == resource_id)
                .cloned()
                .collect();
            let page_size = if state.page_size == 0 {
                matching.len().max(1)
            } else {
                state.page_size
            };

            let value: Vec<AppRoleAssignment> =
                matching.iter().skip(offset).take(page_size).cloned().collect();
            let next_offset = offset + page_size;
            let next_link = if state.endless_pages || next_offset < matching.len() {
                Some(format!("{}{}", NEXT_PAGE_PREFIX, next_offset))
            } else {
                None
            };

            Ok(ODataPage { value, next_link })
        })
    }

    async fn create_group_assignment(
        &self,
        assignment: &NewAppRoleAssignment,
    ) -> GraphResult<AppRoleAssignment> {
        self.with(|state| -> GraphResult<_> {
            state.calls.push("create_group_assignment".to_string());
            let created = AppRoleAssignment {
                id: Some(format!("assignment-{}", state.next_id())),
                app_role_id: assignment.app_role_id,
                principal_id: assignment.principal_id.clone(),
                resource_id: assignment.resource_id.clone(),
                principal_type: Some("Group".to_string()),
                resource_display_name: None,
            };
            state.assignments.push(created.clone());
            Ok(created)
        })
    }
}

/// Secret store backed by a map keyed by `vault/name`.
#[derive(Default)]
pub struct MemorySecrets {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, secret: &SecretRef, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(secret.to_string(), value.to_string());
    }

    pub fn value(&self, secret: &SecretRef) -> Option<String> {
        self.values.lock().unwrap().get(&secret.to_string()).cloned()
    }
}

#[async_trait]
impl Provider for MemorySecrets {
    async fn get(&self, secret: &SecretRef) -> Result<String, SecretsError> {
        self.value(secret)
            .ok_or_else(|| SecretsError::NotFound(secret.to_string()))
    }

    async fn set(&self, secret: &SecretRef, value: &str) -> Result<(), SecretsError> {
        self.insert(secret, value);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

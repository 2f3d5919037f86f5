//! Migration commands and caller authorizations

use crate::key::{Key, TenantId};
use serde::{Deserialize, Serialize};

/// Correlates a command with the response written for it
pub type RequestId = u64;

/// Pairs a source element id with the target element id it migrates to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MappingInstruction {
    /// Element id in the source process
    pub source_element_id: String,
    /// Element id in the target process
    pub target_element_id: String,
}

impl MappingInstruction {
    /// Mapping from `source` to `target`
    #[must_use]
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source_element_id: source.into(),
            target_element_id: target.into(),
        }
    }
}

/// Value of the migrate command and of the completed event that echoes it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInstanceMigrationRecord {
    /// Root of the instance to migrate
    pub process_instance_key: Key,
    /// Process definition to migrate to
    pub target_process_definition_key: Key,
    /// Explicit element mappings, possibly empty
    pub mapping_instructions: Vec<MappingInstruction>,
}

impl ProcessInstanceMigrationRecord {
    /// Command value without mapping instructions
    #[must_use]
    pub fn new(process_instance_key: Key, target_process_definition_key: Key) -> Self {
        Self {
            process_instance_key,
            target_process_definition_key,
            mapping_instructions: Vec::new(),
        }
    }

    /// Add one mapping instruction
    #[must_use]
    pub fn with_mapping(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.mapping_instructions
            .push(MappingInstruction::new(source, target));
        self
    }
}

/// Operations a caller can be permitted to perform on process instances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionType {
    /// Start instances
    CreateProcessInstance,
    /// Read instances
    ReadProcessInstance,
    /// Modify or migrate instances
    UpdateProcessInstance,
    /// Cancel instances
    DeleteProcessInstance,
}

impl PermissionType {
    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            PermissionType::CreateProcessInstance => "CREATE_PROCESS_INSTANCE",
            PermissionType::ReadProcessInstance => "READ_PROCESS_INSTANCE",
            PermissionType::UpdateProcessInstance => "UPDATE_PROCESS_INSTANCE",
            PermissionType::DeleteProcessInstance => "DELETE_PROCESS_INSTANCE",
        }
    }
}

/// Process definitions a permission applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceScope {
    /// Every process definition
    Wildcard,
    /// One BPMN process id
    BpmnProcessId(String),
}

impl ResourceScope {
    fn covers(&self, bpmn_process_id: &str) -> bool {
        match self {
            ResourceScope::Wildcard => true,
            ResourceScope::BpmnProcessId(id) => id == bpmn_process_id,
        }
    }
}

/// One granted permission
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    /// What may be done
    pub permission_type: PermissionType,
    /// Which definitions it applies to
    pub resource: ResourceScope,
}

/// Caller identity as seen by the engine: tenants and granted permissions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationContext {
    /// Tenants the caller may act on
    pub authorized_tenants: Vec<TenantId>,
    /// Granted permissions
    pub permissions: Vec<Permission>,
}

impl AuthorizationContext {
    /// Full access to the given tenant
    #[must_use]
    pub fn for_tenant(tenant_id: impl Into<TenantId>) -> Self {
        Self {
            authorized_tenants: vec![tenant_id.into()],
            permissions: vec![Permission {
                permission_type: PermissionType::UpdateProcessInstance,
                resource: ResourceScope::Wildcard,
            }],
        }
    }

    /// Full access to the default tenant
    #[must_use]
    pub fn default_tenant() -> Self {
        Self::for_tenant(TenantId::default())
    }

    /// Access to the given tenant with no permissions granted
    #[must_use]
    pub fn tenant_only(tenant_id: impl Into<TenantId>) -> Self {
        Self {
            authorized_tenants: vec![tenant_id.into()],
            permissions: Vec::new(),
        }
    }

    /// Grant one more permission
    #[must_use]
    pub fn with_permission(
        mut self,
        permission_type: PermissionType,
        resource: ResourceScope,
    ) -> Self {
        self.permissions.push(Permission {
            permission_type,
            resource,
        });
        self
    }

    /// Whether the caller may act on `tenant_id`
    #[must_use]
    pub fn is_tenant_authorized(&self, tenant_id: &TenantId) -> bool {
        self.authorized_tenants.contains(tenant_id)
    }

    /// Whether any permission covers `bpmn_process_id`
    #[must_use]
    pub fn is_permitted(&self, permission_type: PermissionType, bpmn_process_id: &str) -> bool {
        self.permissions
            .iter()
            .any(|p| p.permission_type == permission_type && p.resource.covers(bpmn_process_id))
    }
}

/// A typed command as read from the partition log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command<T> {
    /// Set when the sender waits for a response
    pub request_id: Option<RequestId>,
    /// Caller identity
    pub authorizations: AuthorizationContext,
    /// Command value
    pub value: T,
}

impl<T> Command<T> {
    /// Command without a request id
    #[must_use]
    pub fn new(value: T, authorizations: AuthorizationContext) -> Self {
        Self {
            request_id: None,
            authorizations,
            value,
        }
    }

    /// Expect a response under `request_id`
    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }
}

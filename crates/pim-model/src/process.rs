//! Deployed process definitions
//!
//! A [`DeployedProcess`] is immutable once built. The root element id is the
//! BPMN process id; every other element declares its flow scope by id.
//! Boundary events are regular elements attached to an activity; the builder
//! indexes them on the activity they are attached to.

use crate::element::{ElementType, EventType};
use crate::error::ModelError;
use crate::key::{Key, TenantId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Element metadata of a deployed process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutableElement {
    /// Element id, unique within the process
    pub id: String,
    /// BPMN type
    pub element_type: ElementType,
    /// Declared flow scope; `None` only for the process root
    pub flow_scope: Option<String>,
    /// Trigger kind for event elements
    pub event_type: Option<EventType>,
    /// Activity a boundary event is attached to
    pub attached_to: Option<String>,
    /// Ids of the boundary events attached to this activity
    pub boundary_events: Vec<String>,
}

/// Immutable, versioned process definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedProcess {
    key: Key,
    bpmn_process_id: String,
    version: i32,
    tenant_id: TenantId,
    elements: IndexMap<String, ExecutableElement>,
}

impl DeployedProcess {
    /// Start building a process whose root element is `bpmn_process_id`.
    #[must_use]
    pub fn builder(key: Key, bpmn_process_id: impl Into<String>, version: i32) -> ProcessBuilder {
        ProcessBuilder::new(key, bpmn_process_id, version)
    }

    /// Process definition key
    #[inline]
    #[must_use]
    pub fn key(&self) -> Key {
        self.key
    }

    /// BPMN process id, also the root element id
    #[inline]
    #[must_use]
    pub fn bpmn_process_id(&self) -> &str {
        &self.bpmn_process_id
    }

    /// Deployment version
    #[inline]
    #[must_use]
    pub fn version(&self) -> i32 {
        self.version
    }

    /// Owning tenant
    #[inline]
    #[must_use]
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Id of the process root element
    #[inline]
    #[must_use]
    pub fn root_id(&self) -> &str {
        &self.bpmn_process_id
    }

    /// Element by id
    #[must_use]
    pub fn element(&self, element_id: &str) -> Option<&ExecutableElement> {
        self.elements.get(element_id)
    }

    /// Whether the process declares `element_id`
    #[must_use]
    pub fn contains(&self, element_id: &str) -> bool {
        self.elements.contains_key(element_id)
    }

    /// Elements in declaration order, root first
    pub fn elements(&self) -> impl Iterator<Item = &ExecutableElement> {
        self.elements.values()
    }

    /// Event types of the boundary events attached to `element_id`
    #[must_use]
    pub fn boundary_event_types(&self, element_id: &str) -> Vec<EventType> {
        self.element(element_id)
            .map(|element| {
                element
                    .boundary_events
                    .iter()
                    .filter_map(|id| self.element(id))
                    .map(|boundary| boundary.event_type.unwrap_or(EventType::Unspecified))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether any element is an event sub-process
    #[must_use]
    pub fn has_event_sub_process(&self) -> bool {
        self.elements
            .values()
            .any(|e| e.element_type == ElementType::EventSubProcess)
    }
}

/// Builder for [`DeployedProcess`]
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    key: Key,
    bpmn_process_id: String,
    version: i32,
    tenant_id: TenantId,
    elements: Vec<ExecutableElement>,
}

impl ProcessBuilder {
    fn new(key: Key, bpmn_process_id: impl Into<String>, version: i32) -> Self {
        Self {
            key,
            bpmn_process_id: bpmn_process_id.into(),
            version,
            tenant_id: TenantId::default(),
            elements: Vec::new(),
        }
    }

    /// Owning tenant
    #[must_use]
    pub fn tenant(mut self, tenant_id: impl Into<TenantId>) -> Self {
        self.tenant_id = tenant_id.into();
        self
    }

    /// Add an element. `flow_scope = None` places it directly in the process.
    #[must_use]
    pub fn element(
        mut self,
        id: impl Into<String>,
        element_type: ElementType,
        flow_scope: Option<&str>,
    ) -> Self {
        self.elements.push(ExecutableElement {
            id: id.into(),
            element_type,
            flow_scope: flow_scope.map(str::to_string),
            event_type: None,
            attached_to: None,
            boundary_events: Vec::new(),
        });
        self
    }

    /// Attach a boundary event of `event_type` to the activity `attached_to`.
    #[must_use]
    pub fn boundary_event(
        mut self,
        id: impl Into<String>,
        event_type: EventType,
        attached_to: &str,
    ) -> Self {
        self.elements.push(ExecutableElement {
            id: id.into(),
            element_type: ElementType::BoundaryEvent,
            flow_scope: None,
            event_type: Some(event_type),
            attached_to: Some(attached_to.to_string()),
            boundary_events: Vec::new(),
        });
        self
    }

    /// Validate references and freeze the definition.
    ///
    /// # Errors
    /// Returns [`ModelError`] on duplicate ids, dangling flow scopes or
    /// boundary events attached to missing or non-activity elements.
    pub fn build(self) -> Result<DeployedProcess, ModelError> {
        if self.bpmn_process_id.is_empty() {
            return Err(ModelError::EmptyElementId);
        }

        let root = self.bpmn_process_id.clone();
        let mut elements = IndexMap::with_capacity(self.elements.len() + 1);
        elements.insert(
            root.clone(),
            ExecutableElement {
                id: root.clone(),
                element_type: ElementType::Process,
                flow_scope: None,
                event_type: None,
                attached_to: None,
                boundary_events: Vec::new(),
            },
        );

        for mut element in self.elements {
            if element.id.is_empty() {
                return Err(ModelError::EmptyElementId);
            }
            if elements.contains_key(&element.id) {
                return Err(ModelError::DuplicateElementId(element.id));
            }
            if element.attached_to.is_none() && element.flow_scope.is_none() {
                element.flow_scope = Some(root.clone());
            }
            elements.insert(element.id.clone(), element);
        }

        // Resolve flow scopes and boundary attachments once all ids are known.
        let ids: Vec<String> = elements.keys().cloned().collect();
        for id in &ids {
            let element = &elements[id];

            if let Some(attached_to) = element.attached_to.clone() {
                let Some(host) = elements.get(&attached_to) else {
                    return Err(ModelError::UnknownAttachment {
                        element_id: id.clone(),
                        attached_to,
                    });
                };
                if !host.element_type.is_activity() {
                    return Err(ModelError::InvalidAttachment {
                        element_id: id.clone(),
                        attached_to,
                    });
                }
                let host_scope = host.flow_scope.clone();
                elements[id].flow_scope = host_scope;
                elements[&attached_to].boundary_events.push(id.clone());
                continue;
            }

            if let Some(flow_scope) = element.flow_scope.clone() {
                let Some(scope) = elements.get(&flow_scope) else {
                    return Err(ModelError::UnknownFlowScope {
                        element_id: id.clone(),
                        flow_scope,
                    });
                };
                if !matches!(
                    scope.element_type,
                    ElementType::Process | ElementType::SubProcess | ElementType::EventSubProcess
                ) {
                    return Err(ModelError::InvalidFlowScope {
                        element_id: id.clone(),
                        flow_scope,
                    });
                }
            }
        }

        Ok(DeployedProcess {
            key: self.key,
            bpmn_process_id: self.bpmn_process_id,
            version: self.version,
            tenant_id: self.tenant_id,
            elements,
        })
    }
}

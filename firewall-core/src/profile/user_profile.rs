//! The user-editable half of a profile: its display name and the two
//! ordered endpoint rule lists.

use super::permission::EndpointPermission;

/// Outbound/general rules plus inbound (`service_endpoints`) rules,
/// appended to by the prompt coordinator and consulted by the engine.
#[derive(Debug, Clone, Default)]
pub struct UserProfile {
    /// Display name used by the relation heuristic.
    pub name: String,
    pub endpoints: Vec<EndpointPermission>,
    pub service_endpoints: Vec<EndpointPermission>,
}

impl UserProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoints: Vec::new(),
            service_endpoints: Vec::new(),
        }
    }

    pub fn append(&mut self, incoming: bool, permission: EndpointPermission) {
        if incoming {
            self.service_endpoints.push(permission);
        } else {
            self.endpoints.push(permission);
        }
    }
}

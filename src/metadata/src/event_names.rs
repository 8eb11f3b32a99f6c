use std::collections::HashMap;

use common::EventNameId;
use common::ProjectId;
use parking_lot::RwLock;
use serde::Deserialize;
use serde::Serialize;

use crate::error::MetadataError;
use crate::Result;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EventName {
    pub id: EventNameId,
    pub project_id: ProjectId,
    pub name: String,
}

#[derive(Default)]
struct Dictionary {
    by_name: HashMap<(ProjectId, String), EventNameId>,
    names: Vec<EventName>,
}

/// Event name dictionary, names map to ids per project.
#[derive(Default)]
pub struct EventNames {
    dict: RwLock<Dictionary>,
}

impl EventNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, project_id: ProjectId, name: &str) -> Result<EventName> {
        if let Ok(event_name) = self.get_by_name(project_id, name) {
            return Ok(event_name);
        }

        let mut dict = self.dict.write();
        let key = (project_id, name.to_string());
        if let Some(id) = dict.by_name.get(&key) {
            return dict
                .names
                .get(*id as usize - 1)
                .cloned()
                .ok_or_else(|| MetadataError::Internal(format!("dangling event name id {id}")));
        }

        let event_name = EventName {
            id: dict.names.len() as EventNameId + 1,
            project_id,
            name: name.to_string(),
        };
        dict.by_name.insert(key, event_name.id);
        dict.names.push(event_name.clone());

        Ok(event_name)
    }

    pub fn get_by_name(&self, project_id: ProjectId, name: &str) -> Result<EventName> {
        let dict = self.dict.read();
        dict.by_name
            .get(&(project_id, name.to_string()))
            .and_then(|id| dict.names.get(*id as usize - 1))
            .cloned()
            .ok_or_else(|| MetadataError::NotFound(format!("event name {name:?} not found")))
    }

    pub fn get_by_id(&self, project_id: ProjectId, id: EventNameId) -> Result<EventName> {
        let dict = self.dict.read();
        (id as usize)
            .checked_sub(1)
            .and_then(|idx| dict.names.get(idx))
            .filter(|e| e.project_id == project_id)
            .cloned()
            .ok_or_else(|| MetadataError::NotFound(format!("event name {id} not found")))
    }

    pub fn list(&self, project_id: ProjectId) -> Vec<EventName> {
        self.dict
            .read()
            .names
            .iter()
            .filter(|e| e.project_id == project_id)
            .cloned()
            .collect()
    }
}

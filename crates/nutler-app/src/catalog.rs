//! Cached departments and rooms.
//!
//! A refresh replaces the snapshot wholesale. A failed refresh keeps the
//! previous snapshot and records the error; staleness between refreshes is
//! accepted.

use nutler_proto::{ChatRoom, Department, DepartmentId, RoomId};

use crate::backend::{Backend, CommandError};

/// Read-only snapshot of the backend's reference data.
#[derive(Debug, Clone, Default)]
pub struct RoomCatalog {
    departments: Vec<Department>,
    rooms: Vec<ChatRoom>,
    last_error: Option<CommandError>,
}

impl RoomCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reload departments.
    pub async fn refresh_departments<B: Backend>(
        &mut self,
        backend: &B,
    ) -> Result<(), CommandError> {
        match backend.get_departments().await {
            Ok(departments) => {
                tracing::debug!(count = departments.len(), "departments refreshed");
                self.departments = departments;
                self.last_error = None;
                Ok(())
            },
            Err(err) => Err(self.record(err)),
        }
    }

    /// Reload rooms.
    pub async fn refresh_rooms<B: Backend>(&mut self, backend: &B) -> Result<(), CommandError> {
        match backend.get_chat_rooms().await {
            Ok(rooms) => {
                tracing::debug!(count = rooms.len(), "rooms refreshed");
                self.rooms = rooms;
                self.last_error = None;
                Ok(())
            },
            Err(err) => Err(self.record(err)),
        }
    }

    fn record(&mut self, err: CommandError) -> CommandError {
        tracing::warn!(error = %err, "catalog refresh failed, keeping previous snapshot");
        self.last_error = Some(err.clone());
        err
    }

    /// Departments from the last successful refresh.
    pub fn departments(&self) -> &[Department] {
        &self.departments
    }

    /// Rooms from the last successful refresh.
    pub fn rooms(&self) -> &[ChatRoom] {
        &self.rooms
    }

    /// Error of the last refresh, if it failed.
    pub fn last_error(&self) -> Option<&CommandError> {
        self.last_error.as_ref()
    }

    /// Room with the given id.
    pub fn room(&self, id: RoomId) -> Option<&ChatRoom> {
        self.rooms.iter().find(|room| room.id == Some(id))
    }

    /// Room with the given name.
    pub fn room_by_name(&self, name: &str) -> Option<&ChatRoom> {
        self.rooms.iter().find(|room| room.name == name)
    }

    /// Rooms owned by a department, in catalog order.
    pub fn rooms_in_department(&self, department_id: DepartmentId) -> Vec<&ChatRoom> {
        self.rooms.iter().filter(|room| room.department_id == Some(department_id)).collect()
    }
}

//! Opaque process identity. Lifecycle is owned externally (process exit
//! notifications arrive through the [`crate::adapters::ProcessAdapter`]).

use std::sync::Arc;

use crate::profile::ProfileSet;

#[derive(Clone)]
pub struct Process {
    pub pid: i32,
    pub path: String,
    pub name: String,
    pub exec_name: String,
    pub profile_set: Option<Arc<ProfileSet>>,
}

impl Process {
    pub fn new(pid: i32, path: impl Into<String>, name: impl Into<String>, exec_name: impl Into<String>) -> Self {
        Self {
            pid,
            path: path.into(),
            name: name.into(),
            exec_name: exec_name.into(),
            profile_set: None,
        }
    }

    pub fn with_profile_set(mut self, profile_set: Arc<ProfileSet>) -> Self {
        self.profile_set = Some(profile_set);
        self
    }
}

impl std::fmt::Display for Process {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.pid)
    }
}

//! Destination (project, system) selection for an import.
//!
//! A system always belongs to exactly one project, so a new project
//! always comes with a new system. [`DestinationForm`] is the editable
//! counterpart that the confirm action's enabled state is derived from.

use serde::{Deserialize, Serialize};

use crate::types::EntityId;

/// Name and description for an entity that has to be created first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntity {
    pub name: String,
    pub description: String,
}

impl NewEntity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// The name with surrounding whitespace removed.
    pub fn trimmed_name(&self) -> &str {
        self.name.trim()
    }

    fn has_name(&self) -> bool {
        !self.trimmed_name().is_empty()
    }
}

/// Where an extracted diagram is imported into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DestinationSelection {
    /// Existing project and existing system.
    Existing {
        project_id: EntityId,
        system_id: EntityId,
    },
    /// Existing project, system created under it.
    NewSystem {
        project_id: EntityId,
        system: NewEntity,
    },
    /// Project created first, then a system under it.
    NewProject { project: NewEntity, system: NewEntity },
}

impl DestinationSelection {
    /// Whether every field the selection needs is filled in.
    pub fn is_complete(&self) -> bool {
        match self {
            Self::Existing {
                project_id,
                system_id,
            } => !project_id.trim().is_empty() && !system_id.trim().is_empty(),
            Self::NewSystem { project_id, system } => {
                !project_id.trim().is_empty() && system.has_name()
            }
            Self::NewProject { project, system } => project.has_name() && system.has_name(),
        }
    }

    /// Number of creation calls resolving this selection takes.
    pub fn creation_calls(&self) -> usize {
        match self {
            Self::Existing { .. } => 0,
            Self::NewSystem { .. } => 1,
            Self::NewProject { .. } => 2,
        }
    }
}

/// Project and system ids after any creation calls have been made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDestination {
    pub project_id: EntityId,
    pub system_id: EntityId,
}

// ---------------------------------------------------------------------------
// Editable form
// ---------------------------------------------------------------------------

/// Whether the project in the form is picked or created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectChoice {
    #[default]
    Existing,
    New,
}

/// Whether the system in the form is picked or created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemChoice {
    #[default]
    Existing,
    New,
}

/// Field-level state of the destination picker.
///
/// Every setter leaves the form in a state where [`is_complete`] reflects
/// the current input, so callers can re-read it after each change.
///
/// [`is_complete`]: DestinationForm::is_complete
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationForm {
    pub project_choice: ProjectChoice,
    pub system_choice: SystemChoice,
    pub project_id: Option<EntityId>,
    pub system_id: Option<EntityId>,
    pub new_project: NewEntity,
    pub new_system: NewEntity,
}

impl DestinationForm {
    /// Switch between picking and creating the project. Creating a project
    /// forces a new system as well, and drops any picked ids.
    pub fn set_project_choice(&mut self, choice: ProjectChoice) {
        self.project_choice = choice;
        if choice == ProjectChoice::New {
            self.system_choice = SystemChoice::New;
            self.project_id = None;
            self.system_id = None;
        }
    }

    /// Switch between picking and creating the system. Ignored while the
    /// project is being created, since that always needs a new system.
    pub fn set_system_choice(&mut self, choice: SystemChoice) {
        if self.project_choice == ProjectChoice::New {
            return;
        }
        self.system_choice = choice;
        if choice == SystemChoice::New {
            self.system_id = None;
        }
    }

    /// Pick an existing project. A previously picked system belongs to the
    /// old project, so it is cleared when the project changes.
    pub fn select_project(&mut self, project_id: impl Into<EntityId>) {
        let project_id = project_id.into();
        if self.project_id.as_deref() != Some(project_id.as_str()) {
            self.system_id = None;
        }
        self.project_choice = ProjectChoice::Existing;
        self.project_id = Some(project_id);
    }

    pub fn select_system(&mut self, system_id: impl Into<EntityId>) {
        self.system_choice = SystemChoice::Existing;
        self.system_id = Some(system_id.into());
    }

    pub fn set_project_name(&mut self, name: impl Into<String>) {
        self.new_project.name = name.into();
    }

    pub fn set_project_description(&mut self, description: impl Into<String>) {
        self.new_project.description = description.into();
    }

    pub fn set_system_name(&mut self, name: impl Into<String>) {
        self.new_system.name = name.into();
    }

    pub fn set_system_description(&mut self, description: impl Into<String>) {
        self.new_system.description = description.into();
    }

    /// The selection the form currently describes, or `None` when a
    /// required id is missing.
    pub fn selection(&self) -> Option<DestinationSelection> {
        match (self.project_choice, self.system_choice) {
            (ProjectChoice::New, _) => Some(DestinationSelection::NewProject {
                project: self.new_project.clone(),
                system: self.new_system.clone(),
            }),
            (ProjectChoice::Existing, SystemChoice::New) => {
                Some(DestinationSelection::NewSystem {
                    project_id: self.project_id.clone()?,
                    system: self.new_system.clone(),
                })
            }
            (ProjectChoice::Existing, SystemChoice::Existing) => {
                Some(DestinationSelection::Existing {
                    project_id: self.project_id.clone()?,
                    system_id: self.system_id.clone()?,
                })
            }
        }
    }

    /// The selection, only if it is complete.
    pub fn complete_selection(&self) -> Option<DestinationSelection> {
        self.selection().filter(DestinationSelection::is_complete)
    }

    pub fn is_complete(&self) -> bool {
        self.complete_selection().is_some()
    }
}

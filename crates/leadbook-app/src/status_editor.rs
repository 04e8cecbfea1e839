// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use tracing::warn;

use crate::{LeadId, LeadStatus, MutationError, Resource};

/// The single row currently in edit mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEdit {
    pub lead_id: LeadId,
    pub current: LeadStatus,
    pub selection: Option<LeadStatus>,
    pub pending: bool,
    pub error: Option<MutationError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorCommand {
    Begin { lead_id: LeadId, current: LeadStatus },
    Select(LeadStatus),
    Blur,
    Cancel,
    Succeeded { lead_id: LeadId },
    Failed { lead_id: LeadId, error: MutationError },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    Editing(LeadId),
    Display(LeadId),
    SetStatusRequested { lead_id: LeadId, status: LeadStatus },
    Invalidate(Resource),
    Failed { lead_id: LeadId, message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusEditor {
    editing: Option<StatusEdit>,
}

impl StatusEditor {
    pub fn editing(&self) -> Option<&StatusEdit> {
        self.editing.as_ref()
    }

    pub fn is_editing(&self, lead_id: LeadId) -> bool {
        self.editing
            .as_ref()
            .is_some_and(|edit| edit.lead_id == lead_id)
    }

    pub fn dispatch(&mut self, command: EditorCommand) -> Vec<EditorEvent> {
        match command {
            EditorCommand::Begin { lead_id, current } => {
                if self.is_editing(lead_id) {
                    return Vec::new();
                }
                let mut events = Vec::new();
                if let Some(previous) = self.editing.take() {
                    events.push(EditorEvent::Display(previous.lead_id));
                }
                self.editing = Some(StatusEdit {
                    lead_id,
                    current,
                    selection: None,
                    pending: false,
                    error: None,
                });
                events.push(EditorEvent::Editing(lead_id));
                events
            }
            EditorCommand::Select(status) => self.select(status),
            EditorCommand::Blur => match &self.editing {
                Some(edit) if edit.selection.is_none() && !edit.pending => self.leave(),
                _ => Vec::new(),
            },
            EditorCommand::Cancel => self.leave(),
            EditorCommand::Succeeded { lead_id } => {
                let mut events = Vec::new();
                if self
                    .editing
                    .as_ref()
                    .is_some_and(|edit| edit.lead_id == lead_id && edit.pending)
                {
                    events.extend(self.leave());
                }
                events.push(EditorEvent::Invalidate(Resource::Leads));
                events
            }
            EditorCommand::Failed { lead_id, error } => {
                warn!(lead_id = lead_id.get(), %error, "status change failed");
                let message = error.to_string();
                if let Some(edit) = self
                    .editing
                    .as_mut()
                    .filter(|edit| edit.lead_id == lead_id)
                {
                    edit.pending = false;
                    edit.error = Some(error);
                }
                vec![EditorEvent::Failed { lead_id, message }]
            }
        }
    }

    fn select(&mut self, status: LeadStatus) -> Vec<EditorEvent> {
        let Some(edit) = self.editing.as_mut() else {
            return Vec::new();
        };
        if edit.pending {
            return Vec::new();
        }
        if status == edit.current {
            return self.leave();
        }
        edit.selection = Some(status);
        edit.pending = true;
        edit.error = None;
        vec![EditorEvent::SetStatusRequested {
            lead_id: edit.lead_id,
            status,
        }]
    }

    fn leave(&mut self) -> Vec<EditorEvent> {
        self.editing
            .take()
            .map(|edit| vec![EditorEvent::Display(edit.lead_id)])
            .unwrap_or_default()
    }
}

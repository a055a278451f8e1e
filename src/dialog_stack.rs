//! Per-conversation dialog stack.

use serde::{Deserialize, Serialize};

use crate::communication_channel::ConversationRef;
use crate::timex::DateExpression;

/// Every dialog kind the engine can run. Each kind owns a fixed step table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogId {
    VacationRequest,
    StartDateResolver,
    EndDateResolver,
}

impl DialogId {
    pub fn step_count(self) -> usize {
        match self {
            DialogId::VacationRequest => crate::vacation_dialog::VacationStep::ALL.len(),
            DialogId::StartDateResolver | DialogId::EndDateResolver => {
                crate::date_resolver::ResolverStep::ALL.len()
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VacationRequestOptions {
    pub vacation_date: Option<DateExpression>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// One activation record. `step_index` is the step to run on the next
/// resumption and never exceeds the dialog's step count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogFrame {
    pub dialog_id: DialogId,
    pub step_index: usize,
    pub options: VacationRequestOptions,
}

impl DialogFrame {
    pub fn new(dialog_id: DialogId, options: VacationRequestOptions) -> Self {
        Self {
            dialog_id,
            step_index: 0,
            options,
        }
    }

    /// Move to the next step, saturating at the step count.
    pub(crate) fn advance(&mut self) {
        self.step_index = (self.step_index + 1).min(self.dialog_id.step_count());
    }
}

/// Ordered frames; the last one is active.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogStack {
    frames: Vec<DialogFrame>,
}

impl DialogStack {
    pub fn push(&mut self, frame: DialogFrame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<DialogFrame> {
        self.frames.pop()
    }

    pub fn active(&self) -> Option<&DialogFrame> {
        self.frames.last()
    }

    pub fn active_mut(&mut self) -> Option<&mut DialogFrame> {
        self.frames.last_mut()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[DialogFrame] {
        &self.frames
    }
}

/// Persisted record for one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub reference: ConversationRef,
    pub stack: DialogStack,
}

impl ConversationState {
    pub fn new(reference: ConversationRef) -> Self {
        Self {
            reference,
            stack: DialogStack::default(),
        }
    }

    /// True while the active frame is suspended waiting for a yes/no answer.
    pub fn awaiting_confirmation(&self) -> bool {
        self.stack.active().is_some_and(|frame| {
            frame.dialog_id == DialogId::VacationRequest
                && frame.step_index == crate::vacation_dialog::VacationStep::Final.index()
        })
    }
}

//! Waterfall engine: runs the active frame's steps in order, suspending
//! between turns and resuming parents when children end.

use tracing::debug;

use crate::approval::ApprovalRequest;
use crate::communication_channel::{ConversationRef, InboundTurn};
use crate::date_resolver::DateResolverDialog;
use crate::dialog_stack::{ConversationState, DialogFrame, DialogId, VacationRequestOptions};
use crate::error::BotError;
use crate::timex::DateExpression;
use crate::vacation_dialog::VacationDialog;

/// Value handed from one step (or an ended child) to the next step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogResult {
    Empty,
    Date(DateExpression),
    Vacation(Box<VacationOutcome>),
}

/// What a completed vacation request produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VacationOutcome {
    pub options: VacationRequestOptions,
    /// Present when an approval submission was attempted.
    pub approval: Option<ApprovalRequest>,
}

/// How a step hands control back to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Run the next step now with this result.
    Next(DialogResult),
    /// Suspend; the next turn runs the following step.
    Wait,
    /// Suspend; the next turn runs this step again.
    Retry,
    /// Push a child; this frame resumes at its next step when the child ends.
    Begin {
        dialog: DialogId,
        options: VacationRequestOptions,
    },
    /// Pop this frame and hand the result to the parent.
    End(DialogResult),
    /// Pop this frame and start a fresh dialog in its place.
    Replace {
        dialog: DialogId,
        options: VacationRequestOptions,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogTurnResult {
    /// Nothing on the stack to run.
    Empty,
    Waiting,
    Complete(DialogResult),
    Cancelled,
}

pub struct StepContext<'a> {
    pub turn: &'a InboundTurn,
    /// Conversation that owns the stack; replies go here.
    pub reference: &'a ConversationRef,
    pub step_index: usize,
    pub result: DialogResult,
    pub options: &'a mut VacationRequestOptions,
}

/// The step tables of every dialog kind.
pub struct DialogSet {
    vacation: VacationDialog,
    start_resolver: DateResolverDialog,
    end_resolver: DateResolverDialog,
}

impl DialogSet {
    pub fn new(
        vacation: VacationDialog,
        start_resolver: DateResolverDialog,
        end_resolver: DateResolverDialog,
    ) -> Self {
        Self {
            vacation,
            start_resolver,
            end_resolver,
        }
    }

    async fn run_step(
        &self,
        dialog: DialogId,
        ctx: &mut StepContext<'_>,
    ) -> Result<StepOutcome, BotError> {
        match dialog {
            DialogId::VacationRequest => self.vacation.run_step(ctx).await,
            DialogId::StartDateResolver => self.start_resolver.run_step(ctx).await,
            DialogId::EndDateResolver => self.end_resolver.run_step(ctx).await,
        }
    }
}

/// Engine bound to one conversation's state for the duration of one turn.
pub struct DialogContext<'a> {
    dialogs: &'a DialogSet,
    state: &'a mut ConversationState,
    turn: &'a InboundTurn,
}

impl<'a> DialogContext<'a> {
    pub fn new(
        dialogs: &'a DialogSet,
        state: &'a mut ConversationState,
        turn: &'a InboundTurn,
    ) -> Self {
        Self {
            dialogs,
            state,
            turn,
        }
    }

    pub fn turn(&self) -> &'a InboundTurn {
        self.turn
    }

    pub fn reference(&self) -> &ConversationRef {
        &self.state.reference
    }

    pub fn stack_depth(&self) -> usize {
        self.state.stack.depth()
    }

    /// Push a new frame at step 0 and run it.
    pub async fn begin_dialog(
        &mut self,
        dialog: DialogId,
        options: VacationRequestOptions,
    ) -> Result<DialogTurnResult, BotError> {
        debug!(?dialog, depth = self.state.stack.depth(), "begin dialog");
        self.state.stack.push(DialogFrame::new(dialog, options));
        let outcome = self.run_active(DialogResult::Empty).await?;
        self.drive(outcome).await
    }

    /// Re-enter the active frame at its stored step with this turn.
    pub async fn continue_dialog(&mut self) -> Result<DialogTurnResult, BotError> {
        if self.state.stack.is_empty() {
            return Ok(DialogTurnResult::Empty);
        }
        let outcome = self.run_active(DialogResult::Empty).await?;
        self.drive(outcome).await
    }

    /// Pop the active frame and resume its parent's next step with `result`.
    pub async fn end_dialog(&mut self, result: DialogResult) -> Result<DialogTurnResult, BotError> {
        self.drive(StepOutcome::End(result)).await
    }

    /// Pop the active frame and start `dialog` in its place.
    pub async fn replace_dialog(
        &mut self,
        dialog: DialogId,
        options: VacationRequestOptions,
    ) -> Result<DialogTurnResult, BotError> {
        self.drive(StepOutcome::Replace { dialog, options }).await
    }

    /// Discard every frame.
    pub fn cancel_all_dialogs(&mut self) -> DialogTurnResult {
        debug!(depth = self.state.stack.depth(), "cancel all dialogs");
        self.state.stack.clear();
        DialogTurnResult::Cancelled
    }

    async fn run_active(&mut self, result: DialogResult) -> Result<StepOutcome, BotError> {
        let ConversationState { reference, stack } = &mut *self.state;
        let Some(frame) = stack.active_mut() else {
            return Err(BotError::Engine("no active dialog frame".to_string()));
        };
        let dialog = frame.dialog_id;
        if frame.step_index >= dialog.step_count() {
            return Ok(StepOutcome::End(result));
        }

        let mut ctx = StepContext {
            turn: self.turn,
            reference,
            step_index: frame.step_index,
            result,
            options: &mut frame.options,
        };
        self.dialogs.run_step(dialog, &mut ctx).await
    }

    async fn drive(&mut self, mut outcome: StepOutcome) -> Result<DialogTurnResult, BotError> {
        loop {
            let input = match outcome {
                StepOutcome::Next(result) => {
                    let Some(frame) = self.state.stack.active_mut() else {
                        return Ok(DialogTurnResult::Complete(result));
                    };
                    if frame.step_index + 1 >= frame.dialog_id.step_count() {
                        outcome = StepOutcome::End(result);
                        continue;
                    }
                    frame.advance();
                    result
                }
                StepOutcome::Wait => {
                    if let Some(frame) = self.state.stack.active_mut() {
                        if frame.step_index + 1 < frame.dialog_id.step_count() {
                            frame.advance();
                        }
                    }
                    return Ok(DialogTurnResult::Waiting);
                }
                StepOutcome::Retry => return Ok(DialogTurnResult::Waiting),
                StepOutcome::Begin { dialog, options } => {
                    if let Some(frame) = self.state.stack.active_mut() {
                        frame.advance();
                    }
                    debug!(?dialog, depth = self.state.stack.depth(), "begin child dialog");
                    self.state.stack.push(DialogFrame::new(dialog, options));
                    DialogResult::Empty
                }
                StepOutcome::End(result) => {
                    let ended = self.state.stack.pop();
                    debug!(dialog = ?ended.map(|frame| frame.dialog_id), "end dialog");
                    if self.state.stack.is_empty() {
                        return Ok(DialogTurnResult::Complete(result));
                    }
                    result
                }
                StepOutcome::Replace { dialog, options } => {
                    self.state.stack.pop();
                    debug!(?dialog, "replace dialog");
                    self.state.stack.push(DialogFrame::new(dialog, options));
                    DialogResult::Empty
                }
            };
            outcome = self.run_active(input).await?;
        }
    }
}

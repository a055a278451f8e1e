//! The vacation request waterfall: start date, end date, confirm, finalize.

use std::sync::Arc;

use tracing::{info, warn};

use crate::approval::ApprovalNotifier;
use crate::communication_channel::{adapter_for, CommunicationChannel};
use crate::correlator::{ChannelAction, ChannelCallbackCorrelator, Responder, TurnKind};
use crate::dialog_stack::{DialogId, VacationRequestOptions};
use crate::error::BotError;
use crate::timex::DateExpression;
use crate::waterfall::{DialogResult, StepContext, StepOutcome, VacationOutcome};

pub const START_DATE_PROMPT: &str = "When would you like your vacation to start?";
pub const END_DATE_PROMPT: &str =
    "When would you like your vacation to end? If it's just the one day, enter that day again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VacationStep {
    StartDate,
    EndDate,
    Confirm,
    Final,
}

impl VacationStep {
    pub const ALL: [VacationStep; 4] = [
        VacationStep::StartDate,
        VacationStep::EndDate,
        VacationStep::Confirm,
        VacationStep::Final,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// "for: X" for a single day, "from: X to: Y" otherwise.
pub fn describe_period(start_date: &str, end_date: &str) -> String {
    if start_date == end_date {
        format!("for: {start_date}")
    } else {
        format!("from: {start_date} to: {end_date}")
    }
}

pub fn confirmation_summary(start_date: &str, end_date: &str) -> String {
    format!(
        "Please confirm, I have you requesting vacation {}.",
        describe_period(start_date, end_date)
    )
}

/// Typed answers to the confirmation prompt.
pub fn parse_confirmation(text: &str) -> Option<bool> {
    match text.trim().to_lowercase().as_str() {
        "yes" | "y" | "yeah" | "yep" | "sure" | "ok" | "okay" | "1" | "true" => Some(true),
        "no" | "n" | "nope" | "nah" | "2" | "false" => Some(false),
        _ => None,
    }
}

enum Confirmation {
    Typed(bool),
    Clicked(ChannelAction),
}

fn captured_date(result: &DialogResult) -> Option<String> {
    match result {
        DialogResult::Date(DateExpression::Date { value }) => Some(value.clone()),
        _ => None,
    }
}

fn resolved_dates(options: &VacationRequestOptions) -> Result<(String, String), BotError> {
    match (&options.start_date, &options.end_date) {
        (Some(start), Some(end)) => Ok((start.clone(), end.clone())),
        _ => Err(BotError::Engine(
            "confirmation reached without resolved dates".to_string(),
        )),
    }
}

pub struct VacationDialog {
    channel: Arc<dyn CommunicationChannel>,
    correlator: Arc<ChannelCallbackCorrelator>,
    notifier: Arc<ApprovalNotifier>,
}

impl VacationDialog {
    pub fn new(
        channel: Arc<dyn CommunicationChannel>,
        correlator: Arc<ChannelCallbackCorrelator>,
        notifier: Arc<ApprovalNotifier>,
    ) -> Self {
        Self {
            channel,
            correlator,
            notifier,
        }
    }

    pub(crate) async fn run_step(&self, ctx: &mut StepContext<'_>) -> Result<StepOutcome, BotError> {
        match VacationStep::from_index(ctx.step_index) {
            Some(VacationStep::StartDate) => Ok(self.start_date_step(ctx)),
            Some(VacationStep::EndDate) => Ok(self.end_date_step(ctx)),
            Some(VacationStep::Confirm) => self.confirm_step(ctx).await,
            Some(VacationStep::Final) => self.final_step(ctx).await,
            None => Ok(StepOutcome::End(DialogResult::Empty)),
        }
    }

    fn start_date_step(&self, ctx: &mut StepContext<'_>) -> StepOutcome {
        match ctx.options.vacation_date.clone() {
            Some(DateExpression::Date { value }) => {
                ctx.options.start_date = Some(value.clone());
                StepOutcome::Next(DialogResult::Date(DateExpression::date(value)))
            }
            Some(DateExpression::DateRange { start, end }) => {
                ctx.options.start_date = Some(start.clone());
                ctx.options.end_date = Some(end);
                StepOutcome::Next(DialogResult::Date(DateExpression::date(start)))
            }
            seed => StepOutcome::Begin {
                dialog: DialogId::StartDateResolver,
                options: VacationRequestOptions {
                    vacation_date: seed,
                    ..Default::default()
                },
            },
        }
    }

    fn end_date_step(&self, ctx: &mut StepContext<'_>) -> StepOutcome {
        if let Some(start) = captured_date(&ctx.result) {
            ctx.options.start_date = Some(start);
        }
        match ctx.options.end_date.clone() {
            Some(end) => StepOutcome::Next(DialogResult::Date(DateExpression::date(end))),
            None => StepOutcome::Begin {
                dialog: DialogId::EndDateResolver,
                options: VacationRequestOptions::default(),
            },
        }
    }

    async fn confirm_step(&self, ctx: &mut StepContext<'_>) -> Result<StepOutcome, BotError> {
        if let Some(end) = captured_date(&ctx.result) {
            ctx.options.end_date = Some(end);
        }
        self.send_confirmation(ctx).await?;
        Ok(StepOutcome::Wait)
    }

    async fn send_confirmation(&self, ctx: &StepContext<'_>) -> Result<(), BotError> {
        let (start, end) = resolved_dates(&*ctx.options)?;
        let message = adapter_for(&ctx.reference.channel_id).build_confirmation_message(
            &confirmation_summary(&start, &end),
            &ctx.reference.conversation_id,
        );
        self.channel.send_message(ctx.reference, &message).await?;
        Ok(())
    }

    async fn final_step(&self, ctx: &mut StepContext<'_>) -> Result<StepOutcome, BotError> {
        let confirmation = match self.correlator.classify(ctx.turn) {
            Ok(TurnKind::Action(action)) => Confirmation::Clicked(action),
            Ok(TurnKind::Message) => match parse_confirmation(&ctx.turn.text) {
                Some(answer) => Confirmation::Typed(answer),
                None => {
                    self.send_confirmation(ctx).await?;
                    return Ok(StepOutcome::Retry);
                }
            },
            Err(err) => {
                warn!(
                    conversation = %ctx.reference.conversation_id,
                    error = %err,
                    "could not correlate channel action; confirmation still pending"
                );
                return Ok(StepOutcome::Retry);
            }
        };

        let (confirmed, responder, ack_address): (bool, Option<Responder>, Option<String>) =
            match confirmation {
                Confirmation::Clicked(action) => {
                    (action.is_affirmative(), Some(action.responder), action.ack_address)
                }
                Confirmation::Typed(answer) => {
                    (answer, self.correlator.typed_responder(ctx.turn), None)
                }
            };

        if !confirmed {
            info!(conversation = %ctx.reference.conversation_id, "vacation request declined; restarting");
            *ctx.options = VacationRequestOptions::default();
            return Ok(StepOutcome::Replace {
                dialog: DialogId::VacationRequest,
                options: VacationRequestOptions::default(),
            });
        }

        let (start, end) = resolved_dates(&*ctx.options)?;
        let approval = match responder {
            Some(responder) => {
                self.notifier
                    .notify(&responder, &start, &end, ack_address.as_deref())
                    .await
            }
            None => {
                warn!(
                    conversation = %ctx.reference.conversation_id,
                    "no requester identity available; approval not submitted"
                );
                None
            }
        };

        Ok(StepOutcome::End(DialogResult::Vacation(Box::new(
            VacationOutcome {
                options: ctx.options.clone(),
                approval,
            },
        ))))
    }
}

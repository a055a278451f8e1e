//! Prompts for a date and keeps asking until the reply names a definite one.

use std::sync::Arc;

use tracing::debug;

use crate::communication_channel::{CommunicationChannel, OutboundMessage};
use crate::date_extractor::DateTokenExtractor;
use crate::error::BotError;
use crate::timex::{self, DateExpression};
use crate::waterfall::{DialogResult, StepContext, StepOutcome};

pub const REPROMPT_TEXT: &str =
    "I'm sorry, for best results, please enter your vacation date including the month, day and year.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverStep {
    Prompt,
    Validate,
}

impl ResolverStep {
    pub const ALL: [ResolverStep; 2] = [ResolverStep::Prompt, ResolverStep::Validate];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

pub struct DateResolverDialog {
    prompt: String,
    channel: Arc<dyn CommunicationChannel>,
    extractor: Arc<dyn DateTokenExtractor>,
}

impl DateResolverDialog {
    pub fn new(
        prompt: impl Into<String>,
        channel: Arc<dyn CommunicationChannel>,
        extractor: Arc<dyn DateTokenExtractor>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            channel,
            extractor,
        }
    }

    pub(crate) async fn run_step(&self, ctx: &mut StepContext<'_>) -> Result<StepOutcome, BotError> {
        match ResolverStep::from_index(ctx.step_index) {
            Some(ResolverStep::Prompt) => self.prompt_step(ctx).await,
            Some(ResolverStep::Validate) => self.validate_step(ctx).await,
            None => Ok(StepOutcome::End(DialogResult::Empty)),
        }
    }

    /// A definite seed ends immediately; an ambiguous one gets the
    /// clarifying question; no seed gets the plain question.
    async fn prompt_step(&self, ctx: &mut StepContext<'_>) -> Result<StepOutcome, BotError> {
        let text = match &ctx.options.vacation_date {
            Some(date @ DateExpression::Date { .. }) => {
                return Ok(StepOutcome::End(DialogResult::Date(date.clone())));
            }
            Some(_) => REPROMPT_TEXT,
            None => self.prompt.as_str(),
        };
        self.channel
            .send_message(ctx.reference, &OutboundMessage::text(text))
            .await?;
        Ok(StepOutcome::Wait)
    }

    async fn validate_step(&self, ctx: &mut StepContext<'_>) -> Result<StepOutcome, BotError> {
        let tokens = self.extractor.extract(&ctx.turn.text);
        let resolved = tokens.first().map(|token| timex::resolve(token));
        debug!(reply = %ctx.turn.text, ?tokens, ?resolved, "validating date reply");

        match resolved {
            Some(date @ DateExpression::Date { .. }) => Ok(StepOutcome::End(DialogResult::Date(date))),
            _ => {
                self.channel
                    .send_message(ctx.reference, &OutboundMessage::text(REPROMPT_TEXT))
                    .await?;
                Ok(StepOutcome::Retry)
            }
        }
    }
}

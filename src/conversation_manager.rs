//! Turn handling: interrupts, stack dispatch, top-level routing and the
//! per-conversation state store.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::approval::{
    AckPoster, ApprovalNotifier, ApprovalService, HttpAckPoster, HttpApprovalService,
    PassthroughDirectory, ProfileDirectory,
};
use crate::communication_channel::{
    CommunicationChannel, ConversationRef, InboundTurn, OutboundMessage,
};
use crate::config::BotConfig;
use crate::correlator::ChannelCallbackCorrelator;
use crate::date_extractor::{DateTokenExtractor, PatternDateExtractor};
use crate::date_resolver::DateResolverDialog;
use crate::dialog_stack::{ConversationState, DialogId, VacationRequestOptions};
use crate::error::BotError;
use crate::interrupt::InterruptLayer;
use crate::recognizer::{Intent, LuisRecognizer, Recognizer};
use crate::slack_manager::SlackClient;
use crate::vacation_dialog::{describe_period, VacationDialog, END_DATE_PROMPT, START_DATE_PROMPT};
use crate::waterfall::{DialogContext, DialogResult, DialogSet, DialogTurnResult, VacationOutcome};

pub const NOT_UNDERSTOOD_TEXT: &str =
    "Sorry, I didn't get that. Please try asking in a different way";

/// External collaborators the bot talks to.
pub struct BotServices {
    pub channel: Arc<dyn CommunicationChannel>,
    /// `None` when recognition is not configured.
    pub recognizer: Option<Arc<dyn Recognizer>>,
    pub extractor: Arc<dyn DateTokenExtractor>,
    pub profiles: Arc<dyn ProfileDirectory>,
    pub approvals: Arc<dyn ApprovalService>,
    pub acks: Arc<dyn AckPoster>,
    pub default_user_id: Option<String>,
}

impl BotServices {
    /// HTTP-backed services for the given config, replying through `channel`.
    pub fn from_config(config: &BotConfig, channel: Arc<dyn CommunicationChannel>) -> Self {
        let recognizer = config
            .luis
            .clone()
            .map(|luis| Arc::new(LuisRecognizer::new(luis)) as Arc<dyn Recognizer>);
        let profiles: Arc<dyn ProfileDirectory> = match &config.slack_oauth_token {
            Some(token) => Arc::new(SlackClient::new(token.clone())),
            None => Arc::new(PassthroughDirectory),
        };

        Self {
            channel,
            recognizer,
            extractor: Arc::new(PatternDateExtractor),
            profiles,
            approvals: Arc::new(HttpApprovalService::new(config.approval_endpoint.clone())),
            acks: Arc::new(HttpAckPoster::new()),
            default_user_id: config.default_user_id.clone(),
        }
    }
}

/// In-memory conversation states. Each state sits behind its own mutex, so
/// one conversation runs one turn at a time while others proceed.
#[derive(Default)]
pub struct ConversationStore {
    conversations: RwLock<HashMap<String, Arc<Mutex<ConversationState>>>>,
}

impl ConversationStore {
    pub async fn get(&self, conversation_id: &str) -> Option<Arc<Mutex<ConversationState>>> {
        self.conversations.read().await.get(conversation_id).cloned()
    }

    pub async fn get_or_create(&self, reference: &ConversationRef) -> Arc<Mutex<ConversationState>> {
        if let Some(slot) = self.get(&reference.conversation_id).await {
            return slot;
        }
        let mut conversations = self.conversations.write().await;
        conversations
            .entry(reference.conversation_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(ConversationState::new(reference.clone()))))
            .clone()
    }

    /// Copy of a conversation's current state.
    pub async fn snapshot(&self, conversation_id: &str) -> Option<ConversationState> {
        let slot = self.get(conversation_id).await?;
        let state = slot.lock().await;
        Some(state.clone())
    }
}

pub struct ConversationManager {
    store: ConversationStore,
    dialogs: DialogSet,
    interrupts: InterruptLayer,
    recognizer: Option<Arc<dyn Recognizer>>,
    correlator: Arc<ChannelCallbackCorrelator>,
    channel: Arc<dyn CommunicationChannel>,
}

impl ConversationManager {
    pub fn new(services: BotServices) -> Self {
        let BotServices {
            channel,
            recognizer,
            extractor,
            profiles,
            approvals,
            acks,
            default_user_id,
        } = services;

        let correlator = Arc::new(ChannelCallbackCorrelator::new(default_user_id));
        let notifier = Arc::new(ApprovalNotifier::new(profiles, approvals, acks));
        let dialogs = DialogSet::new(
            VacationDialog::new(channel.clone(), correlator.clone(), notifier),
            DateResolverDialog::new(START_DATE_PROMPT, channel.clone(), extractor.clone()),
            DateResolverDialog::new(END_DATE_PROMPT, channel.clone(), extractor),
        );

        Self {
            store: ConversationStore::default(),
            dialogs,
            interrupts: InterruptLayer::new(channel.clone()),
            recognizer,
            correlator,
            channel,
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Process one inbound turn to completion. On error the conversation's
    /// state is restored to what it was before the turn.
    pub async fn handle_turn(&self, turn: &InboundTurn) -> Result<DialogTurnResult, BotError> {
        let slot = self.owning_conversation(turn).await;
        let mut state = slot.lock().await;
        let before = state.clone();

        let result = self.run_turn(&mut state, turn).await;
        if let Err(err) = &result {
            error!(
                conversation = %state.reference.conversation_id,
                error = %err,
                "turn failed; conversation state restored"
            );
            *state = before;
        }
        result
    }

    /// A click naming another known conversation is run against that
    /// conversation's stack; everything else runs on its own conversation.
    async fn owning_conversation(&self, turn: &InboundTurn) -> Arc<Mutex<ConversationState>> {
        if let Some(origin) = self.correlator.origin_conversation(turn) {
            if origin != turn.conversation_id {
                if let Some(slot) = self.store.get(&origin).await {
                    info!(
                        from = %turn.conversation_id,
                        origin = %origin,
                        "routing channel action to originating conversation"
                    );
                    return slot;
                }
            }
        }
        self.store.get_or_create(&turn.reference()).await
    }

    async fn run_turn(
        &self,
        state: &mut ConversationState,
        turn: &InboundTurn,
    ) -> Result<DialogTurnResult, BotError> {
        let mut dc = DialogContext::new(&self.dialogs, state, turn);

        if let Some(result) = self.interrupts.intercept(&mut dc).await? {
            return Ok(result);
        }

        let result = match dc.continue_dialog().await? {
            DialogTurnResult::Empty => self.start_dialog(&mut dc).await?,
            other => other,
        };

        if let DialogTurnResult::Complete(DialogResult::Vacation(outcome)) = &result {
            self.report_completion(dc.reference(), outcome).await;
        }
        Ok(result)
    }

    /// Idle conversation: recognize the utterance and start the flow.
    async fn start_dialog(&self, dc: &mut DialogContext<'_>) -> Result<DialogTurnResult, BotError> {
        let turn = dc.turn();
        if self.correlator.peek(turn).is_some() {
            info!(
                conversation = %turn.conversation_id,
                "channel action with no pending confirmation; ignoring"
            );
            return Ok(DialogTurnResult::Empty);
        }

        let options = match &self.recognizer {
            None => VacationRequestOptions::default(),
            Some(recognizer) => match recognizer.recognize(&turn.text).await {
                Ok(recognized) => match recognized.intent {
                    Intent::RequestVacation => VacationRequestOptions {
                        vacation_date: recognized.vacation_date,
                        ..Default::default()
                    },
                    other => {
                        info!(intent = ?other, "utterance not handled");
                        self.channel
                            .send_message(dc.reference(), &OutboundMessage::text(NOT_UNDERSTOOD_TEXT))
                            .await?;
                        return Ok(DialogTurnResult::Empty);
                    }
                },
                Err(err) => {
                    warn!(error = %err, "recognizer failed; starting without a date");
                    VacationRequestOptions::default()
                }
            },
        };

        dc.begin_dialog(DialogId::VacationRequest, options).await
    }

    /// The dialog has already ended; a failed send is only logged.
    async fn report_completion(&self, reference: &ConversationRef, outcome: &VacationOutcome) {
        let (Some(start), Some(end)) = (&outcome.options.start_date, &outcome.options.end_date)
        else {
            return;
        };
        let message = OutboundMessage::text(format!(
            "I have submitted your vacation request {}.",
            describe_period(start, end)
        ));
        if let Err(err) = self.channel.send_message(reference, &message).await {
            warn!(error = %err, "completion message failed");
        }
    }
}

use std::sync::Arc;

use serde_json::json;

use crate::approval::ApprovalRequest;
use crate::communication_channel::{InboundTurn, OutboundMessage};
use crate::conversation_manager::NOT_UNDERSTOOD_TEXT;
use crate::date_resolver::REPROMPT_TEXT;
use crate::dialog_stack::{ConversationState, DialogId, VacationRequestOptions};
use crate::interrupt::{CANCEL_TEXT, HELP_TEXT};
use crate::recognizer::{Intent, RecognizerResult};
use crate::tests::fakes::{FakeProfiles, FakeRecognizer, Harness, RecordingApprovals};
use crate::timex::DateExpression;
use crate::vacation_dialog::{VacationStep, END_DATE_PROMPT, START_DATE_PROMPT};
use crate::waterfall::{DialogResult, DialogTurnResult};

fn range_recognizer() -> Arc<FakeRecognizer> {
    Arc::new(FakeRecognizer::returning(RecognizerResult {
        intent: Intent::RequestVacation,
        vacation_date: Some(DateExpression::DateRange {
            start: "2024-07-01".to_string(),
            end: "2024-07-05".to_string(),
        }),
    }))
}

fn assert_step_bounds(state: &ConversationState) {
    for frame in state.stack.frames() {
        assert!(
            frame.step_index <= frame.dialog_id.step_count(),
            "{:?} at step {}",
            frame.dialog_id,
            frame.step_index
        );
    }
}

fn slack_click(value: &str, callback_id: &str) -> serde_json::Value {
    json!({
        "type": "interactive_message",
        "actions": [{ "name": format!("confirm_{value}"), "type": "button", "value": value }],
        "callback_id": callback_id,
        "user": { "id": "U123", "name": "alice" },
        "response_url": "https://hooks.slack.test/actions/T1/1"
    })
}

/// Drives a Slack conversation to the pending confirmation.
async fn pending_slack_confirmation(harness: &Harness, conversation_id: &str) {
    let result = harness
        .say("slack", conversation_id, "I need July 1st to July 5th 2024 off")
        .await;
    assert_eq!(result, DialogTurnResult::Waiting);
    assert!(harness.state(conversation_id).await.awaiting_confirmation());
}

#[tokio::test]
async fn test_date_range_reaches_confirmation_without_suspending() {
    let harness = Harness::builder().recognizer(range_recognizer()).build();

    pending_slack_confirmation(&harness, "C1").await;

    // The only message of the turn is the confirmation itself.
    assert_eq!(harness.channel.count(), 1);
    let Some(OutboundMessage::Interactive(message)) = harness.channel.last() else {
        panic!("expected an interactive confirmation");
    };
    assert_eq!(
        message.title,
        "Please confirm, I have you requesting vacation from: 2024-07-01 to: 2024-07-05."
    );
    assert_eq!(message.callback_id, "C1");
    let values: Vec<&str> = message.actions.iter().map(|a| a.value.as_str()).collect();
    assert_eq!(values, vec!["yes", "no"]);

    let state = harness.state("C1").await;
    assert_eq!(state.stack.depth(), 1);
    let frame = state.stack.active().unwrap();
    assert_eq!(frame.dialog_id, DialogId::VacationRequest);
    assert_eq!(frame.step_index, VacationStep::Final.index());
    assert_eq!(frame.options.start_date.as_deref(), Some("2024-07-01"));
    assert_eq!(frame.options.end_date.as_deref(), Some("2024-07-05"));
}

#[tokio::test]
async fn test_resolver_reprompts_until_definite() {
    let harness = Harness::builder().build();

    assert_eq!(harness.say("emulator", "E1", "hi").await, DialogTurnResult::Waiting);
    assert_eq!(
        harness.say("emulator", "E1", "next Friday").await,
        DialogTurnResult::Waiting
    );
    assert_eq!(harness.state("E1").await.stack.active().unwrap().dialog_id, DialogId::StartDateResolver);

    assert_eq!(
        harness.say("emulator", "E1", "2024-07-01").await,
        DialogTurnResult::Waiting
    );
    assert_eq!(
        harness.channel.texts(),
        vec![START_DATE_PROMPT, REPROMPT_TEXT, END_DATE_PROMPT]
    );

    let state = harness.state("E1").await;
    let frames = state.stack.frames();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].options.start_date.as_deref(), Some("2024-07-01"));
    assert_eq!(frames[1].dialog_id, DialogId::EndDateResolver);
}

#[tokio::test]
async fn test_typed_single_day_confirmation_submits() {
    let harness = Harness::builder().build();

    harness.say("emulator", "E1", "I want a day off").await;
    harness.say("emulator", "E1", "2024-07-01").await;
    harness.say("emulator", "E1", "07/01/2024").await;
    assert_eq!(
        harness.channel.last(),
        Some(OutboundMessage::text(
            "Please confirm, I have you requesting vacation for: 2024-07-01. (1) Yes or (2) No"
        ))
    );
    assert_step_bounds(&harness.state("E1").await);

    let result = harness.say("emulator", "E1", "Yes").await;
    let expected = ApprovalRequest {
        requester_identity: "alice@example.com".to_string(),
        start_date: "2024-07-01".to_string(),
        end_date: "2024-07-01".to_string(),
    };
    let DialogTurnResult::Complete(DialogResult::Vacation(outcome)) = result else {
        panic!("expected a completed vacation request");
    };
    assert_eq!(outcome.approval, Some(expected.clone()));
    assert_eq!(harness.approvals.submitted(), vec![expected]);
    // Typed confirmations have no callback address.
    assert!(harness.acks.posted().is_empty());
    assert!(harness.state("E1").await.stack.is_empty());
    assert_eq!(
        harness.channel.last(),
        Some(OutboundMessage::text(
            "I have submitted your vacation request for: 2024-07-01."
        ))
    );
}

#[tokio::test]
async fn test_unrecognized_answer_repeats_confirmation() {
    let harness = Harness::builder().recognizer(range_recognizer()).build();
    pending_slack_confirmation(&harness, "C1").await;
    let before = harness.state("C1").await;

    assert_eq!(harness.say("slack", "C1", "maybe").await, DialogTurnResult::Waiting);

    assert_eq!(harness.channel.count(), 2);
    assert!(matches!(harness.channel.last(), Some(OutboundMessage::Interactive(_))));
    assert_eq!(harness.state("C1").await, before);
}

#[tokio::test]
async fn test_cancel_empties_stack_at_any_depth() {
    let recognizer = Arc::new(FakeRecognizer::returning(RecognizerResult {
        intent: Intent::RequestVacation,
        vacation_date: None,
    }));
    let harness = Harness::builder().recognizer(recognizer.clone()).build();

    harness.say("emulator", "E1", "book me some vacation").await;
    assert_eq!(harness.state("E1").await.stack.depth(), 2);
    let sent_before = harness.channel.count();

    assert_eq!(harness.say("emulator", "E1", "CANCEL").await, DialogTurnResult::Cancelled);

    assert!(harness.state("E1").await.stack.is_empty());
    assert_eq!(harness.channel.count(), sent_before + 1);
    assert_eq!(harness.channel.last(), Some(OutboundMessage::text(CANCEL_TEXT)));
    assert_eq!(recognizer.calls(), 1);
}

#[tokio::test]
async fn test_quit_during_confirmation() {
    let harness = Harness::builder().recognizer(range_recognizer()).build();
    pending_slack_confirmation(&harness, "C1").await;

    assert_eq!(harness.say("slack", "C1", "quit").await, DialogTurnResult::Cancelled);
    assert!(harness.state("C1").await.stack.is_empty());
    assert!(harness.approvals.submitted().is_empty());
}

#[tokio::test]
async fn test_help_keeps_stack() {
    let harness = Harness::builder().build();
    harness.say("emulator", "E1", "hello").await;
    let before = harness.state("E1").await;

    assert_eq!(harness.say("emulator", "E1", "?").await, DialogTurnResult::Waiting);
    assert_eq!(harness.channel.last(), Some(OutboundMessage::text(HELP_TEXT)));
    assert_eq!(harness.state("E1").await, before);

    // The resolver still accepts the answer afterwards.
    harness.say("emulator", "E1", "2024-07-01").await;
    assert_eq!(harness.channel.last(), Some(OutboundMessage::text(END_DATE_PROMPT)));
}

#[tokio::test]
async fn test_slack_yes_click_submits_and_acknowledges() {
    let harness = Harness::builder().recognizer(range_recognizer()).build();
    pending_slack_confirmation(&harness, "C1").await;

    let result = harness.click("slack", "C1", slack_click("yes", "C1")).await;

    let expected = ApprovalRequest {
        requester_identity: "alice@example.com".to_string(),
        start_date: "2024-07-01".to_string(),
        end_date: "2024-07-05".to_string(),
    };
    let DialogTurnResult::Complete(DialogResult::Vacation(outcome)) = result else {
        panic!("expected a completed vacation request");
    };
    assert_eq!(outcome.approval, Some(expected.clone()));
    assert_eq!(harness.approvals.submitted(), vec![expected]);
    assert_eq!(harness.profiles.lookups(), vec!["U123"]);

    let acks = harness.acks.posted();
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].0, "https://hooks.slack.test/actions/T1/1");
    assert!(acks[0].1.replace_original);
    assert!(acks[0].1.text.contains("from: 2024-07-01 to: 2024-07-05"));

    assert!(harness.state("C1").await.stack.is_empty());
}

#[tokio::test]
async fn test_slack_no_click_restarts_flow() {
    let harness = Harness::builder().recognizer(range_recognizer()).build();
    pending_slack_confirmation(&harness, "C1").await;

    let result = harness.click("slack", "C1", slack_click("no", "C1")).await;
    assert_eq!(result, DialogTurnResult::Waiting);

    let state = harness.state("C1").await;
    let frames = state.stack.frames();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].dialog_id, DialogId::VacationRequest);
    assert_eq!(frames[0].options, VacationRequestOptions::default());
    assert_eq!(frames[1].dialog_id, DialogId::StartDateResolver);
    assert_eq!(harness.channel.last(), Some(OutboundMessage::text(START_DATE_PROMPT)));

    assert!(harness.approvals.submitted().is_empty());
    assert!(harness.acks.posted().is_empty());
}

#[tokio::test]
async fn test_malformed_click_leaves_stack_unchanged() {
    let harness = Harness::builder().recognizer(range_recognizer()).build();
    pending_slack_confirmation(&harness, "C1").await;
    let before = harness.state("C1").await;
    let sent_before = harness.channel.count();

    let payload = json!({
        "actions": [{ "value": "yes" }],
        "callback_id": "C1",
        "response_url": "https://hooks.slack.test/actions/T1/1"
    });
    for _ in 0..2 {
        let result = harness.click("slack", "C1", payload.clone()).await;
        assert_eq!(result, DialogTurnResult::Waiting);
        assert_eq!(harness.state("C1").await, before);
    }

    assert_eq!(harness.channel.count(), sent_before);
    assert!(harness.approvals.submitted().is_empty());
    assert!(harness.acks.posted().is_empty());

    // A well-formed click still completes afterwards.
    let result = harness.click("slack", "C1", slack_click("yes", "C1")).await;
    assert!(matches!(result, DialogTurnResult::Complete(_)));
}

#[tokio::test]
async fn test_click_from_other_conversation_resolves_origin() {
    let harness = Harness::builder().recognizer(range_recognizer()).build();
    pending_slack_confirmation(&harness, "C1").await;

    let result = harness.click("slack", "D-days-later", slack_click("yes", "C1")).await;

    assert!(matches!(result, DialogTurnResult::Complete(_)));
    assert_eq!(harness.approvals.submitted().len(), 1);
    assert!(harness.state("C1").await.stack.is_empty());
    assert!(harness.manager.store().snapshot("D-days-later").await.is_none());
}

#[tokio::test]
async fn test_repeated_click_does_not_resubmit() {
    let harness = Harness::builder().recognizer(range_recognizer()).build();
    pending_slack_confirmation(&harness, "C1").await;

    harness.click("slack", "C1", slack_click("yes", "C1")).await;
    let sent_before = harness.channel.count();
    let result = harness.click("slack", "C1", slack_click("yes", "C1")).await;

    assert_eq!(result, DialogTurnResult::Empty);
    assert_eq!(harness.approvals.submitted().len(), 1);
    assert_eq!(harness.acks.posted().len(), 1);
    assert_eq!(harness.channel.count(), sent_before);
}

#[tokio::test]
async fn test_emulator_click_uses_fallback_identity() {
    let harness = Harness::builder().default_user("U_DEFAULT").build();
    harness.say("emulator", "E1", "vacation please").await;
    harness.say("emulator", "E1", "2024-07-01").await;
    harness.say("emulator", "E1", "2024-07-03").await;

    let result = harness
        .click("emulator", "E1", json!({ "actions": [{ "value": "yes" }] }))
        .await;

    assert!(matches!(result, DialogTurnResult::Complete(_)));
    assert_eq!(harness.profiles.lookups(), vec!["U_DEFAULT"]);
    assert_eq!(
        harness.approvals.submitted(),
        vec![ApprovalRequest {
            requester_identity: "default@example.com".to_string(),
            start_date: "2024-07-01".to_string(),
            end_date: "2024-07-03".to_string(),
        }]
    );
    // No response_url in the payload, so nothing to acknowledge.
    assert!(harness.acks.posted().is_empty());
}

#[tokio::test]
async fn test_emulator_click_without_fallback_stays_pending() {
    let harness = Harness::builder().build();
    harness.say("emulator", "E1", "vacation please").await;
    harness.say("emulator", "E1", "2024-07-01").await;
    harness.say("emulator", "E1", "2024-07-03").await;
    let before = harness.state("E1").await;

    let result = harness
        .click("emulator", "E1", json!({ "actions": [{ "value": "yes" }] }))
        .await;

    assert_eq!(result, DialogTurnResult::Waiting);
    assert_eq!(harness.state("E1").await, before);
    assert!(harness.approvals.submitted().is_empty());
}

#[tokio::test]
async fn test_profile_lookup_failure_skips_submission() {
    let harness = Harness::builder()
        .recognizer(range_recognizer())
        .profiles(FakeProfiles::default())
        .build();
    pending_slack_confirmation(&harness, "C1").await;

    let result = harness.click("slack", "C1", slack_click("yes", "C1")).await;

    let DialogTurnResult::Complete(DialogResult::Vacation(outcome)) = result else {
        panic!("expected a completed vacation request");
    };
    assert_eq!(outcome.approval, None);
    assert!(harness.approvals.submitted().is_empty());
    assert_eq!(harness.acks.posted().len(), 1);
    assert!(harness.state("C1").await.stack.is_empty());
}

#[tokio::test]
async fn test_approval_failure_does_not_reopen_dialog() {
    let harness = Harness::builder()
        .recognizer(range_recognizer())
        .approvals(RecordingApprovals::failing())
        .build();
    pending_slack_confirmation(&harness, "C1").await;

    let result = harness.click("slack", "C1", slack_click("yes", "C1")).await;

    assert!(matches!(result, DialogTurnResult::Complete(_)));
    assert_eq!(harness.approvals.submitted().len(), 1);
    assert!(harness.state("C1").await.stack.is_empty());
}

#[tokio::test]
async fn test_recognizer_failure_starts_resolver() {
    let recognizer = Arc::new(FakeRecognizer::failing());
    let harness = Harness::builder().recognizer(recognizer.clone()).build();

    let result = harness.say("slack", "C1", "time off next week").await;

    assert_eq!(result, DialogTurnResult::Waiting);
    assert_eq!(recognizer.calls(), 1);
    assert_eq!(harness.channel.texts(), vec![START_DATE_PROMPT]);
    assert_eq!(harness.state("C1").await.stack.depth(), 2);
}

#[tokio::test]
async fn test_ambiguous_seed_asks_for_specific_date() {
    let recognizer = Arc::new(FakeRecognizer::returning(RecognizerResult {
        intent: Intent::RequestVacation,
        vacation_date: Some(DateExpression::Ambiguous {
            raw: "XXXX-07-01".to_string(),
        }),
    }));
    let harness = Harness::builder().recognizer(recognizer).build();

    harness.say("emulator", "E1", "vacation on july 1").await;

    assert_eq!(harness.channel.texts(), vec![REPROMPT_TEXT]);
    let state = harness.state("E1").await;
    assert_eq!(state.stack.active().unwrap().dialog_id, DialogId::StartDateResolver);
}

#[tokio::test]
async fn test_other_intent_is_not_understood() {
    let recognizer = Arc::new(FakeRecognizer::returning(RecognizerResult {
        intent: Intent::Other("Book_flight".to_string()),
        vacation_date: None,
    }));
    let harness = Harness::builder().recognizer(recognizer).build();

    let result = harness.say("emulator", "E1", "fly me to Paris").await;

    assert_eq!(result, DialogTurnResult::Empty);
    assert_eq!(harness.channel.texts(), vec![NOT_UNDERSTOOD_TEXT]);
    assert!(harness.state("E1").await.stack.is_empty());
}

#[tokio::test]
async fn test_failed_send_restores_state() {
    let harness = Harness::builder().recognizer(range_recognizer()).build();
    harness.channel.set_failing(true);

    let turn = InboundTurn::message("slack", "C1", "vacation july 1 to 5");
    assert!(harness.manager.handle_turn(&turn).await.is_err());
    assert!(harness.state("C1").await.stack.is_empty());

    harness.channel.set_failing(false);
    pending_slack_confirmation(&harness, "C1").await;
}

#[tokio::test]
async fn test_step_index_stays_in_bounds() {
    let harness = Harness::builder().build();
    let replies = [
        "hi",
        "someday",
        "2024-07-01",
        "2024-07-02",
        "perhaps",
        "no",
        "2024-08-01",
        "2024-08-01",
        "yes",
    ];

    for reply in replies {
        harness.say("emulator", "E1", reply).await;
        assert_step_bounds(&harness.state("E1").await);
    }

    assert_eq!(
        harness.approvals.submitted(),
        vec![ApprovalRequest {
            requester_identity: "alice@example.com".to_string(),
            start_date: "2024-08-01".to_string(),
            end_date: "2024-08-01".to_string(),
        }]
    );
}

fn click_without_actions() -> serde_json::Value {
    json!({
        "type": "interactive_message",
        "user": { "id": "U123" },
        "response_url": "https://hooks.slack.test/actions/T1/1"
    })
}

#[tokio::test]
async fn test_click_without_actions_is_ignored_while_pending() {
    let harness = Harness::builder().recognizer(range_recognizer()).build();
    pending_slack_confirmation(&harness, "C1").await;
    let before = harness.state("C1").await;
    let sent_before = harness.channel.count();

    let result = harness.click("slack", "C1", click_without_actions()).await;

    assert_eq!(result, DialogTurnResult::Waiting);
    assert_eq!(harness.state("C1").await, before);
    assert_eq!(harness.channel.count(), sent_before);
    assert!(harness.approvals.submitted().is_empty());
    assert!(harness.acks.posted().is_empty());
}

#[tokio::test]
async fn test_click_without_actions_does_not_start_flow() {
    let recognizer = Arc::new(FakeRecognizer::failing());
    let harness = Harness::builder().recognizer(recognizer.clone()).build();

    let result = harness.click("slack", "C1", click_without_actions()).await;

    assert_eq!(result, DialogTurnResult::Empty);
    assert!(harness.state("C1").await.stack.is_empty());
    assert_eq!(harness.channel.count(), 0);
    assert_eq!(recognizer.calls(), 0);
}

//! Downstream approval submission and origin-message acknowledgement.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::correlator::Responder;
use crate::error::DownstreamError;
use crate::vacation_dialog::describe_period;

/// The only artifact sent outward. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApprovalRequest {
    #[serde(rename = "user")]
    pub requester_identity: String,
    #[serde(rename = "startDate")]
    pub start_date: String,
    #[serde(rename = "endDate")]
    pub end_date: String,
}

/// Replacement text posted to an interactive message's callback address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Acknowledgement {
    pub text: String,
    pub replace_original: bool,
}

/// Resolves a channel user id to a stable identity such as an email address.
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn lookup_identity(&self, user_id: &str) -> Result<String, DownstreamError>;
}

#[async_trait]
pub trait ApprovalService: Send + Sync {
    async fn submit(&self, request: &ApprovalRequest) -> Result<(), DownstreamError>;
}

#[async_trait]
pub trait AckPoster: Send + Sync {
    async fn post_ack(&self, address: &str, ack: &Acknowledgement) -> Result<(), DownstreamError>;
}

/// Directory used when no channel directory is configured: the user id is
/// the identity.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughDirectory;

#[async_trait]
impl ProfileDirectory for PassthroughDirectory {
    async fn lookup_identity(&self, user_id: &str) -> Result<String, DownstreamError> {
        Ok(user_id.to_string())
    }
}

pub struct HttpApprovalService {
    http: reqwest::Client,
    endpoint: Option<String>,
}

impl HttpApprovalService {
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl ApprovalService for HttpApprovalService {
    async fn submit(&self, request: &ApprovalRequest) -> Result<(), DownstreamError> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or(DownstreamError::NotConfigured("approval endpoint"))?;
        let response = self
            .http
            .post(endpoint)
            .json(request)
            .send()
            .await?
            .error_for_status()?;
        info!(status = %response.status(), "approval endpoint accepted request");
        Ok(())
    }
}

#[derive(Default)]
pub struct HttpAckPoster {
    http: reqwest::Client,
}

impl HttpAckPoster {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AckPoster for HttpAckPoster {
    async fn post_ack(&self, address: &str, ack: &Acknowledgement) -> Result<(), DownstreamError> {
        self.http
            .post(address)
            .json(ack)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Best-effort delivery of a confirmed request. Failures are logged and
/// never surface to the dialog.
pub struct ApprovalNotifier {
    profiles: Arc<dyn ProfileDirectory>,
    approvals: Arc<dyn ApprovalService>,
    acks: Arc<dyn AckPoster>,
}

impl ApprovalNotifier {
    pub fn new(
        profiles: Arc<dyn ProfileDirectory>,
        approvals: Arc<dyn ApprovalService>,
        acks: Arc<dyn AckPoster>,
    ) -> Self {
        Self {
            profiles,
            approvals,
            acks,
        }
    }

    /// Submits the request and acknowledges the origin message concurrently.
    /// Returns the request when one was built and a submission attempted.
    pub async fn notify(
        &self,
        responder: &Responder,
        start_date: &str,
        end_date: &str,
        ack_address: Option<&str>,
    ) -> Option<ApprovalRequest> {
        let acknowledgement = async {
            if let Some(address) = ack_address {
                let ack = Acknowledgement {
                    text: format!(
                        "Thanks <@{}>, your vacation request {} has been sent for approval.",
                        responder.user_id,
                        describe_period(start_date, end_date)
                    ),
                    replace_original: true,
                };
                self.acknowledge(address, &ack).await;
            }
        };
        let (request, ()) = tokio::join!(
            self.submit_approval(responder, start_date, end_date),
            acknowledgement
        );
        request
    }

    async fn submit_approval(
        &self,
        responder: &Responder,
        start_date: &str,
        end_date: &str,
    ) -> Option<ApprovalRequest> {
        let identity = match self.profiles.lookup_identity(&responder.user_id).await {
            Ok(identity) => identity,
            Err(err) => {
                warn!(user_id = %responder.user_id, error = %err, "profile lookup failed; approval not submitted");
                return None;
            }
        };

        let request = ApprovalRequest {
            requester_identity: identity,
            start_date: start_date.to_string(),
            end_date: end_date.to_string(),
        };
        match self.approvals.submit(&request).await {
            Ok(()) => info!(user = %request.requester_identity, "vacation request submitted"),
            Err(err) => warn!(user = %request.requester_identity, error = %err, "approval submission failed"),
        }
        Some(request)
    }

    async fn acknowledge(&self, address: &str, ack: &Acknowledgement) {
        if let Err(err) = self.acks.post_ack(address, ack).await {
            warn!(error = %err, "acknowledgement post failed");
        }
    }
}

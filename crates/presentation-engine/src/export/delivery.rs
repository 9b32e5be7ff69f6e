use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::artifact::RenderArtifact;
use super::quota::Tier;

/// Mechanisms through which a rendered artifact reaches its recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryChannel {
    Download,
    Email,
    PhysicalMail,
}

impl DeliveryChannel {
    pub const fn label(self) -> &'static str {
        match self {
            DeliveryChannel::Download => "download",
            DeliveryChannel::Email => "email",
            DeliveryChannel::PhysicalMail => "physical_mail",
        }
    }
}

/// Postal destination for a mailed presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalAddress {
    pub name: String,
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: String,
}

/// Where an export goes, typed per channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "snake_case")]
pub enum Destination {
    Download,
    Email { to: String },
    PhysicalMail { address: PostalAddress },
}

impl Destination {
    pub const fn channel(&self) -> DeliveryChannel {
        match self {
            Destination::Download => DeliveryChannel::Download,
            Destination::Email { .. } => DeliveryChannel::Email,
            Destination::PhysicalMail { .. } => DeliveryChannel::PhysicalMail,
        }
    }
}

/// Outcome of a completed dispatch; `reference` carries the provider id when
/// an external transport was involved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReceipt {
    pub channel: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub attempts: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("{feature} is not available on the {tier} plan")]
    ChannelNotPermitted {
        feature: &'static str,
        tier: &'static str,
    },
    #[error("invalid destination: {0}")]
    InvalidDestination(String),
    #[error("delivery failed after {attempts} attempts: {message}")]
    Transport { attempts: u32, message: String },
}

impl DeliveryError {
    pub const fn reason(&self) -> &'static str {
        match self {
            DeliveryError::ChannelNotPermitted { .. } => "channel_not_permitted",
            DeliveryError::InvalidDestination(_) => "validation",
            DeliveryError::Transport { .. } => "transport",
        }
    }

    /// Transport failures may be resubmitted with the same artifact;
    /// everything else is terminal for the request.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, DeliveryError::Transport { .. })
    }
}

/// Failure surfaced by a concrete transport. `Rejected` covers destinations
/// the provider refused outright; `Unavailable` covers network/provider
/// faults worth retrying with the same artifact.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("rejected by provider: {0}")]
    Rejected(String),
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

/// Email message handed to a transport. Implementations are expected to
/// bound their network calls with their own timeouts.
#[derive(Debug)]
pub struct EmailMessage<'a> {
    pub to: &'a str,
    pub subject: String,
    pub body: String,
    pub attachment: &'a RenderArtifact,
}

pub trait EmailTransport: Send + Sync {
    fn send(&self, message: &EmailMessage<'_>) -> Result<String, TransportError>;
}

/// Mail piece submitted to the physical-mail provider.
#[derive(Debug)]
pub struct MailPiece<'a> {
    pub address: &'a PostalAddress,
    pub campaign_id: String,
    pub artifact: &'a RenderArtifact,
}

pub trait MailingProvider: Send + Sync {
    fn submit(&self, piece: &MailPiece<'_>) -> Result<String, TransportError>;
}

/// Retry bounds for external transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(250),
        }
    }
}

/// One dispatch invocation: the artifact plus everything channel back ends
/// need to address and label it.
#[derive(Debug)]
pub struct DeliveryRequest<'a> {
    pub artifact: &'a RenderArtifact,
    pub destination: &'a Destination,
    pub tier: Tier,
    pub property_address: &'a str,
}

/// Routes artifacts to their channel back end.
///
/// Tier gating runs before destination validation and before any transport
/// call; transport faults are retried with linear backoff up to the policy
/// bound, reusing the same immutable artifact.
pub struct DeliveryDispatcher<E, M> {
    email: Arc<E>,
    mail: Arc<M>,
    policy: DispatchPolicy,
    product_label: String,
}

impl<E, M> DeliveryDispatcher<E, M>
where
    E: EmailTransport,
    M: MailingProvider,
{
    pub fn new(email: Arc<E>, mail: Arc<M>, policy: DispatchPolicy, product_label: String) -> Self {
        Self {
            email,
            mail,
            policy,
            product_label,
        }
    }

    pub fn dispatch(&self, request: DeliveryRequest<'_>) -> Result<DeliveryReceipt, DeliveryError> {
        let channel = request.destination.channel();
        if !request.tier.allows_channel(channel) {
            return Err(channel_not_permitted(request.tier, channel));
        }

        match request.destination {
            Destination::Download => Ok(DeliveryReceipt {
                channel: channel.label(),
                reference: None,
                attempts: 1,
            }),
            Destination::Email { to } => {
                validate_email(to)?;
                let message = EmailMessage {
                    to,
                    subject: format!("Property Presentation - {}", request.property_address),
                    body: format!(
                        "Your property presentation from {} is attached.",
                        self.product_label
                    ),
                    attachment: request.artifact,
                };
                self.with_retries(channel, || self.email.send(&message))
            }
            Destination::PhysicalMail { address } => {
                validate_postal_address(address)?;
                let piece = MailPiece {
                    address,
                    campaign_id: format!(
                        "presentation_{}",
                        super::quota::BillingPeriod::from_date(chrono::Local::now().date_naive())
                    ),
                    artifact: request.artifact,
                };
                self.with_retries(channel, || self.mail.submit(&piece))
            }
        }
    }

    fn with_retries<F>(
        &self,
        channel: DeliveryChannel,
        mut call: F,
    ) -> Result<DeliveryReceipt, DeliveryError>
    where
        F: FnMut() -> Result<String, TransportError>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match call() {
                Ok(reference) => {
                    info!(channel = channel.label(), attempt, "artifact dispatched");
                    return Ok(DeliveryReceipt {
                        channel: channel.label(),
                        reference: Some(reference),
                        attempts: attempt,
                    });
                }
                Err(TransportError::Rejected(message)) => {
                    return Err(DeliveryError::InvalidDestination(message));
                }
                Err(TransportError::Unavailable(message)) => {
                    if attempt >= self.policy.max_attempts {
                        return Err(DeliveryError::Transport {
                            attempts: attempt,
                            message,
                        });
                    }
                    warn!(
                        channel = channel.label(),
                        attempt,
                        error = %message,
                        "transport failed, retrying"
                    );
                    std::thread::sleep(self.policy.backoff * attempt);
                }
            }
        }
    }
}

/// Reject channels and formats the tier does not include. The export
/// pipeline consults this before quota is touched; `dispatch` re-checks the
/// channel before any transport call.
pub fn permit(
    tier: Tier,
    format: super::domain::OutputFormat,
    channel: DeliveryChannel,
) -> Result<(), DeliveryError> {
    if !tier.allows_format(format) {
        return Err(DeliveryError::ChannelNotPermitted {
            feature: match format {
                super::domain::OutputFormat::Document => "document export",
                super::domain::OutputFormat::Deck => "slide deck export",
            },
            tier: tier.label(),
        });
    }
    if !tier.allows_channel(channel) {
        return Err(channel_not_permitted(tier, channel));
    }
    Ok(())
}

fn channel_not_permitted(tier: Tier, channel: DeliveryChannel) -> DeliveryError {
    DeliveryError::ChannelNotPermitted {
        feature: match channel {
            DeliveryChannel::Download => "download delivery",
            DeliveryChannel::Email => "email delivery",
            DeliveryChannel::PhysicalMail => "direct mail delivery",
        },
        tier: tier.label(),
    }
}

fn validate_email(address: &str) -> Result<(), DeliveryError> {
    let trimmed = address.trim();
    let mut parts = trimmed.splitn(2, '@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();

    let valid = !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !trimmed.chars().any(char::is_whitespace);
    if valid {
        Ok(())
    } else {
        Err(DeliveryError::InvalidDestination(format!(
            "'{address}' is not a deliverable email address"
        )))
    }
}

fn validate_postal_address(address: &PostalAddress) -> Result<(), DeliveryError> {
    let required = [
        ("name", &address.name),
        ("line1", &address.line1),
        ("city", &address.city),
        ("state", &address.state),
        ("zip", &address.zip),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(DeliveryError::InvalidDestination(format!(
                "postal address is missing {field}"
            )));
        }
    }
    Ok(())
}

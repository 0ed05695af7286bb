//! Turns one decoded webhook request into a store operation and a reply.
//!
//! The dispatcher keeps no per-request or per-session state. Everything
//! that must be serialized (username uniqueness, message ids) is the
//! store's job, so any number of requests can be dispatched in parallel.
//!
//! Outcome policy:
//!
//! | condition | result |
//! |---|---|
//! | unknown recipient, empty mailbox, index out of range | spoken reply |
//! | username already taken | spoken apology |
//! | caller already holds a username | spoken reminder of that name |
//! | malformed `Send` / `Sign Up` arguments | spoken usage hint |
//! | unsupported request type, bad time zone | [`DispatchError`] (4xx) |
//! | any other store error or an elapsed deadline | [`DispatchError`] (500) |

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alexios_store::{MessageStore, StoreError};
use alexios_types::{Message, NewMessage, SkillRequest, TYPE_SIMPLE_UTTERANCE};
use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{Instrument, Span};

use crate::command::{Intent, SendCommand};

/// Fixed reply sentences.
pub mod replies {
    pub const MESSAGE_SENT: &str = "The message was sent successfully.";
    pub const NO_NEW_MESSAGES: &str = "There are no new messages for you.";
    pub const NO_SUCH_MESSAGE: &str = "There is no such message.";
    pub const NAME_TAKEN: &str = "Sorry, this name has already been used. Try another name.";
    pub const SEND_USAGE: &str =
        "I did not catch that. Say Send, then the name, then your message.";
    pub const SIGN_UP_USAGE: &str = "I did not catch that. Say Sign Up, then the name you want.";

    pub fn registered(username: &str) -> String {
        format!("You have successfully been registered as {}", username)
    }

    pub fn already_registered(username: &str) -> String {
        format!("You are already registered as {}.", username)
    }

    pub fn unknown_recipient(username: &str) -> String {
        format!("There is no user named {}.", username)
    }

    pub fn pending(count: usize) -> String {
        match count {
            0 => NO_NEW_MESSAGES.to_string(),
            1 => "There is 1 new message.".to_string(),
            n => format!("There are {} new messages.", n),
        }
    }
}

/// Failures that abort a request without a spoken reply.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The platform sent something other than a simple utterance.
    #[error("unsupported request type: {0}")]
    UnsupportedType(String),

    /// A new session carried a time zone we cannot resolve.
    #[error("invalid time zone '{0}'")]
    InvalidTimezone(String),

    /// A store call failed with something other than a handled business
    /// outcome.
    #[error("store operation '{op}' failed: {source}")]
    Store {
        op: &'static str,
        #[source]
        source: StoreError,
    },

    /// A store call did not finish before the request deadline.
    #[error("store operation '{op}' exceeded the request deadline")]
    DeadlineExceeded { op: &'static str },
}

/// Tunables injected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherSettings {
    /// Budget for all store calls made on behalf of one request.
    pub store_timeout: Duration,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(5),
        }
    }
}

/// Source of "now". Replaceable in tests.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Routes utterances to store operations.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn MessageStore>,
    settings: DispatcherSettings,
    span: Span,
    clock: Clock,
}

impl Dispatcher {
    /// Creates a dispatcher. Every request is traced as a child of `span`.
    pub fn new(store: Arc<dyn MessageStore>, settings: DispatcherSettings, span: Span) -> Self {
        Self {
            store,
            settings,
            span,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replaces the wall clock.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Handles one request and returns the text to speak.
    ///
    /// # Errors
    ///
    /// See the module-level table; business outcomes are never errors.
    pub async fn dispatch(&self, request: &SkillRequest) -> Result<String, DispatchError> {
        if request.request.kind != TYPE_SIMPLE_UTTERANCE {
            tracing::debug!(kind = %request.request.kind, "unsupported request type");
            return Err(DispatchError::UnsupportedType(request.request.kind.clone()));
        }

        let intent = Intent::classify(&request.request.command);
        let caller = request.session.user.user_id.as_str();
        let span = tracing::debug_span!(
            parent: &self.span,
            "dispatch",
            kind = ?intent.kind(),
            user_id = caller
        );
        let deadline = Instant::now() + self.settings.store_timeout;

        async move {
            let reply = match intent {
                Intent::Send(command) => self.send(deadline, caller, command).await,
                Intent::Read(index) => self.read(deadline, caller, index).await,
                Intent::SignUp(username) => self.sign_up(deadline, caller, username).await,
                Intent::Status => self.status(deadline, request).await,
            }?;
            tracing::debug!("dispatch complete");
            Ok(reply)
        }
        .instrument(span)
        .await
    }

    async fn send(
        &self,
        deadline: Instant,
        caller: &str,
        command: Option<SendCommand>,
    ) -> Result<String, DispatchError> {
        let Some(SendCommand { recipient, body }) = command else {
            tracing::debug!("malformed send command");
            return Ok(replies::SEND_USAGE.to_string());
        };

        let recipient_id = match self
            .within(
                deadline,
                "resolve_user",
                &recipient,
                self.store.resolve_user(&recipient),
            )
            .await
        {
            Ok(identity) => identity,
            Err(DispatchError::Store {
                source: StoreError::NotFound(_),
                ..
            }) => return Ok(replies::unknown_recipient(&recipient)),
            Err(e) => return Err(e),
        };

        let message = NewMessage {
            sender: caller.to_string(),
            sent_at: (self.clock)(),
            payload: body,
        };
        let id = self
            .within(
                deadline,
                "append_message",
                &recipient_id,
                self.store.append_message(&recipient_id, message),
            )
            .await?;

        tracing::debug!(message_id = id, recipient = %recipient_id, "message saved");
        Ok(replies::MESSAGE_SENT.to_string())
    }

    async fn read(
        &self,
        deadline: Instant,
        caller: &str,
        index: Option<usize>,
    ) -> Result<String, DispatchError> {
        let mailbox = self
            .within(
                deadline,
                "list_mailbox",
                caller,
                self.store.list_mailbox(caller),
            )
            .await?;

        if mailbox.is_empty() {
            return Ok(replies::NO_NEW_MESSAGES.to_string());
        }

        // Anything outside [0, len), including an unparseable index, is
        // "no such message".
        let Some(summary) = index.and_then(|i| mailbox.get(i)) else {
            tracing::debug!(?index, len = mailbox.len(), "message index out of range");
            return Ok(replies::NO_SUCH_MESSAGE.to_string());
        };

        let message = self
            .within(
                deadline,
                "get_message",
                &summary.id.to_string(),
                self.store.get_message(summary.id),
            )
            .await?;

        Ok(render_message(&message))
    }

    async fn sign_up(
        &self,
        deadline: Instant,
        caller: &str,
        username: Option<String>,
    ) -> Result<String, DispatchError> {
        let Some(username) = username else {
            tracing::debug!("malformed sign up command");
            return Ok(replies::SIGN_UP_USAGE.to_string());
        };

        match self
            .within(
                deadline,
                "register_user",
                &username,
                self.store.register_user(caller, &username),
            )
            .await
        {
            Ok(()) => Ok(replies::registered(&username)),
            Err(DispatchError::Store {
                source: StoreError::Conflict(_),
                ..
            }) => Ok(replies::NAME_TAKEN.to_string()),
            Err(DispatchError::Store {
                source: StoreError::AlreadyRegistered { username, .. },
                ..
            }) => Ok(replies::already_registered(&username)),
            Err(e) => Err(e),
        }
    }

    async fn status(
        &self,
        deadline: Instant,
        request: &SkillRequest,
    ) -> Result<String, DispatchError> {
        // Resolve the zone before touching the store so a bad zone never
        // yields a partial reply.
        let greeting = if request.session.new {
            let zone = parse_timezone(&request.timezone)?;
            let now = (self.clock)().with_timezone(&zone);
            Some(format!(
                "Exact time {} hours, {} minutes. ",
                now.hour(),
                now.minute()
            ))
        } else {
            None
        };

        let caller = request.session.user.user_id.as_str();
        let mailbox = self
            .within(
                deadline,
                "list_mailbox",
                caller,
                self.store.list_mailbox(caller),
            )
            .await?;

        let summary = replies::pending(mailbox.len());
        Ok(match greeting {
            Some(greeting) => greeting + &summary,
            None => summary,
        })
    }

    /// Runs a store call under the request deadline and tags failures with
    /// the operation name.
    async fn within<T, F>(
        &self,
        deadline: Instant,
        op: &'static str,
        subject: &str,
        call: F,
    ) -> Result<T, DispatchError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout_at(deadline, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => {
                match &source {
                    StoreError::NotFound(_)
                    | StoreError::Conflict(_)
                    | StoreError::AlreadyRegistered { .. } => {
                        tracing::debug!(op, subject, outcome = %source, "store business outcome");
                    }
                    _ => {
                        tracing::error!(op, subject, error = %source, "store operation failed");
                    }
                }
                Err(DispatchError::Store { op, source })
            }
            Err(_) => {
                tracing::error!(op, subject, "store operation exceeded request deadline");
                Err(DispatchError::DeadlineExceeded { op })
            }
        }
    }
}

/// Renders a message for speech.
pub fn render_message(message: &Message) -> String {
    format!(
        "Message from {}, sent at {}: {}",
        message.sender,
        message.sent_at.format("%Y-%m-%d %H:%M:%S UTC"),
        message.payload
    )
}

/// Resolves an IANA zone name. An empty name means UTC.
fn parse_timezone(name: &str) -> Result<Tz, DispatchError> {
    if name.is_empty() {
        return Ok(Tz::UTC);
    }
    name.parse::<Tz>().map_err(|_| {
        tracing::debug!(timezone = name, "cannot parse timezone");
        DispatchError::InvalidTimezone(name.to_string())
    })
}

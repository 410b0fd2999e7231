//! Chat session management and API interaction.

use tokio_util::sync::CancellationToken;

use crate::chat::commands::{ChatInput, parse_input};
use crate::chat::config::ChatConfig;
use crate::chat::interrupt::Interrupt;
use crate::client::{CompletionBackend, read_body};
use crate::error::{Error, Result};
use crate::indicator::Indicator;
use crate::observability::{CHAT_TURN_FAILURES, CHAT_TURNS};
use crate::render::Renderer;
use crate::sse::decode_stream;
use crate::store::SessionStore;
use crate::types::{ChatCompletion, Message, Role, Session, SessionId};

/// An interactive conversation that is saved after every turn.
pub struct ChatSession<B: CompletionBackend> {
    backend: B,
    config: ChatConfig,
    store: SessionStore,
    session: Session,
}

impl<B: CompletionBackend> ChatSession<B> {
    /// Creates a new, unsaved session.
    ///
    /// When the config names a persona its context becomes the leading
    /// system message.
    pub fn new(backend: B, config: ChatConfig, store: SessionStore) -> Self {
        let session = match &config.persona {
            Some(context) => Session::with_system(context.clone()),
            None => Session::new(),
        };
        Self {
            backend,
            config,
            store,
            session,
        }
    }

    /// Continue a stored session instead of the fresh one.
    ///
    /// The stored history is used as is; no persona is injected.
    pub fn resume(&mut self, session: Session) {
        tracing::info!(id = %session.id, messages = session.messages.len(), "resuming session");
        self.session = session;
    }

    /// Print the whole history, one line per message.
    pub fn echo_history(&self, renderer: &mut dyn Renderer) {
        for message in &self.session.messages {
            match message.role {
                Role::User => renderer.print_user(&message.content),
                Role::System => renderer.print_system(&message.content),
                Role::Assistant => renderer.print_assistant(&message.content),
            }
        }
    }

    /// Run the interactive loop until the user leaves.
    ///
    /// `initial` is used as the first input when given; after that
    /// `read_line` is asked for each line and `None` ends the chat.  A turn
    /// cut short with Ctrl+C is dropped and the loop goes on.
    ///
    /// # Errors
    ///
    /// Any other failed turn ends the loop and its error is returned.
    pub async fn converse<F>(
        &mut self,
        initial: Option<String>,
        renderer: &mut dyn Renderer,
        interrupt: &Interrupt,
        mut read_line: F,
    ) -> Result<()>
    where
        F: FnMut(&str) -> Result<Option<String>>,
    {
        let mut pending = initial;
        loop {
            let line = match pending.take() {
                Some(line) => line,
                None => match read_line("> ")? {
                    Some(line) => line,
                    None => return Ok(()),
                },
            };
            let text = match parse_input(&line) {
                ChatInput::Empty => continue,
                ChatInput::Exit => return Ok(()),
                ChatInput::Message(text) => text,
            };
            let cancel = interrupt.arm();
            match self.send_streaming(&text, renderer, &cancel).await {
                Ok(_) => {}
                Err(err) if err.is_abort() => {}
                Err(err) => return Err(err),
            }
        }
    }

    /// Sends a user message and streams the response.
    ///
    /// This method:
    /// 1. Adds the user message to history
    /// 2. Sends the whole conversation as a streaming request
    /// 3. Renders reply fragments as they arrive
    /// 4. Adds the complete reply to history and saves the session
    ///
    /// # Errors
    ///
    /// On any failure the history is restored to what it was before the
    /// call and nothing is saved.
    pub async fn send_streaming(
        &mut self,
        user_input: &str,
        renderer: &mut dyn Renderer,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let previous_len = self.session.messages.len();
        self.session.messages.push(Message::user(user_input));

        match self.take_turn(renderer, cancel).await {
            Ok(reply) => {
                CHAT_TURNS.click();
                tracing::debug!(id = %self.session.id, bytes = reply.len(), "turn complete");
                Ok(reply)
            }
            Err(err) => {
                CHAT_TURN_FAILURES.click();
                tracing::warn!(error = %err, "turn failed; discarding it");
                self.session.messages.truncate(previous_len);
                Err(err)
            }
        }
    }

    async fn take_turn(
        &mut self,
        renderer: &mut dyn Renderer,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let request = self.config.request(self.session.messages.clone(), true);
        let indicator = Indicator::start(self.config.use_color);
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            opened = self.backend.open(&request) => Some(opened),
        };
        indicator.stop().await;
        let Some(opened) = opened else {
            renderer.print_interrupted();
            return Err(Error::abort("request interrupted by user"));
        };

        let reply = decode_stream(opened?, renderer, cancel).await?;
        self.session.messages.push(Message::assistant(reply.clone()));
        self.store.save(&mut self.session)?;
        Ok(reply)
    }

    /// Returns the number of messages in the conversation.
    pub fn message_count(&self) -> usize {
        self.session.messages.len()
    }

    pub fn messages(&self) -> &[Message] {
        &self.session.messages
    }

    /// Persistence state of the conversation.
    pub fn id(&self) -> SessionId {
        self.session.id
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }
}

/// Answer a single prompt without saving anything.
///
/// With `json` set the response body is printed pretty-printed instead of
/// the reply text.  Returns what was printed.
pub async fn prompt_once<B: CompletionBackend + ?Sized>(
    backend: &B,
    config: &ChatConfig,
    user_input: &str,
    renderer: &mut dyn Renderer,
    json: bool,
) -> Result<String> {
    let mut messages = Vec::with_capacity(2);
    if let Some(context) = &config.persona {
        messages.push(Message::system(context.clone()));
    }
    messages.push(Message::user(user_input));
    let request = config.request(messages, false);

    let indicator = Indicator::start(config.use_color);
    let opened = backend.open(&request).await;
    indicator.stop().await;
    let body = read_body(opened?).await?;

    if json {
        let value: serde_json::Value = serde_json::from_str(&body)?;
        let pretty = serde_json::to_string_pretty(&value)?;
        renderer.print_json(&pretty);
        return Ok(pretty);
    }

    let completion: ChatCompletion = serde_json::from_str(&body).map_err(|e| {
        Error::serialization(
            format!("Failed to parse response: {}", e),
            Some(Box::new(e)),
        )
    })?;
    let reply = completion.into_content()?;
    renderer.print_reply(&reply);
    Ok(reply)
}

//! The orchestration loop.
//!
//! One chat request runs as one spawned task that streams [`ChatEvent`]s to
//! the caller: model rounds carry the tool palette, tool calls execute
//! concurrently and merge in request order, and the final answer's token
//! deltas are relayed in emission order. The user+assistant exchange is
//! persisted only after the answer completes; a cancelled or failed request
//! persists nothing.

use crate::locks::SessionLocks;
use crate::prompt::{history_messages, SYSTEM_PROMPT};
use crate::state::{OrchestrationState, Phase};
use hindsight_config::{BudgetConfig, ChatConfig, RetrievalConfig};
use hindsight_core::gateway::{ChatGateway, ChatRequest};
use hindsight_core::message::{Message, MessageToolCall};
use hindsight_core::{
    ChatEvent, Error, HydratedTurn, PeekResult, Result, SessionId, SessionLedger, ToolDefinition,
};
use hindsight_retrieval::budget::BudgetCaps;
use hindsight_retrieval::commands::{parse_tool_call, tool_palette, ToolCommand};
use hindsight_retrieval::hydrate::TurnHydrator;
use hindsight_retrieval::peek::PeekEngine;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Outcome of one executed tool call, in request order.
enum CommandOutcome {
    Peek(PeekResult),
    Hydrate(HydratedTurn),
    /// Fed back to the model as a tool error; does not fail the request.
    ToolError(String),
    /// A malformed call; fed back and counted against the correction bound.
    Malformed(String),
}

/// The orchestrator: owns the gateways and engines one chat request needs.
pub struct Orchestrator {
    chat: Arc<dyn ChatGateway>,
    peek: Arc<PeekEngine>,
    hydrator: Arc<TurnHydrator>,
    ledger: Arc<dyn SessionLedger>,
    chat_config: ChatConfig,
    budget: BudgetConfig,
    palette: Vec<ToolDefinition>,
    locks: SessionLocks,
}

impl Orchestrator {
    pub fn new(
        chat: Arc<dyn ChatGateway>,
        peek: Arc<PeekEngine>,
        hydrator: Arc<TurnHydrator>,
        ledger: Arc<dyn SessionLedger>,
        chat_config: ChatConfig,
        retrieval_config: RetrievalConfig,
        budget: BudgetConfig,
    ) -> Self {
        Self {
            chat,
            peek,
            hydrator,
            ledger,
            chat_config,
            budget,
            palette: tool_palette(&retrieval_config),
            locks: SessionLocks::new(),
        }
    }

    /// Start one chat request.
    ///
    /// Resolves (or creates) the session up front so address errors surface
    /// as a `Result`; everything after that streams as events. Dropping the
    /// returned receiver cancels the request before anything is persisted.
    pub async fn chat(
        self: &Arc<Self>,
        session_id: Option<SessionId>,
        user_message: String,
    ) -> Result<(SessionId, mpsc::Receiver<ChatEvent>)> {
        if user_message.trim().is_empty() {
            return Err(Error::InvalidArgument("message must not be empty".into()));
        }

        let session_id = match session_id {
            Some(id) => {
                // Archived sessions reject new chats.
                self.ledger.get_session(id, false).await?;
                id
            }
            None => self.ledger.create_session(None).await?.0,
        };

        let history = self.ledger.history(session_id).await?;

        let (tx, rx) = mpsc::channel(64);
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            orchestrator
                .run(session_id, history, user_message, tx)
                .await;
        });

        Ok((session_id, rx))
    }

    async fn run(
        self: Arc<Self>,
        session_id: SessionId,
        history: Vec<hindsight_core::session::SessionMessage>,
        user_message: String,
        tx: mpsc::Sender<ChatEvent>,
    ) {
        let mut state = OrchestrationState::new();

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(SYSTEM_PROMPT));
        messages.extend(history_messages(&history));
        messages.push(Message::user(&user_message));

        info!(session_id = %session_id, history = history.len(), "Chat request started");

        while state.round < self.chat_config.max_rounds {
            state.round += 1;
            state.phase = Phase::AwaitingModel;
            debug!(session_id = %session_id, round = state.round, "Model round");

            let request = ChatRequest {
                model: self.chat_config.model.clone(),
                messages: messages.clone(),
                temperature: self.chat_config.temperature,
                max_tokens: self.chat_config.max_tokens,
                tools: self.palette.clone(),
            };

            let (content, tool_calls) = match self.stream_round(request, &tx).await {
                Ok(Some(round)) => round,
                Ok(None) => {
                    // Receiver dropped; abort without persisting.
                    debug!(session_id = %session_id, "Chat request cancelled");
                    return;
                }
                Err(e) => {
                    self.fail(&mut state, &tx, e.to_string()).await;
                    return;
                }
            };

            if tool_calls.is_empty() {
                state.phase = Phase::StreamingAnswer;
                if content.trim().is_empty() {
                    self.fail(&mut state, &tx, "model produced an empty answer".into())
                        .await;
                    return;
                }
                self.finish(&mut state, session_id, &user_message, content, &tx)
                    .await;
                return;
            }

            state.phase = Phase::ToolCallPending;
            let mut assistant = Message::assistant(content);
            assistant.tool_calls = tool_calls.clone();
            messages.push(assistant);

            match self.execute_round(&tool_calls, &mut state).await {
                Ok(tool_messages) => messages.extend(tool_messages),
                Err(e) => {
                    self.fail(&mut state, &tx, e.to_string()).await;
                    return;
                }
            }

            if state.correction_rounds > self.chat_config.max_correction_rounds {
                self.fail(
                    &mut state,
                    &tx,
                    "model kept producing malformed tool calls".into(),
                )
                .await;
                return;
            }
        }

        self.fail(
            &mut state,
            &tx,
            format!(
                "no answer within {} model rounds",
                self.chat_config.max_rounds
            ),
        )
        .await;
    }

    /// Run one streaming model round. Returns `None` when the caller went
    /// away (send failed), otherwise the accumulated content and any
    /// complete tool calls from the final chunk.
    ///
    /// Deltas are buffered until the round's final chunk: only a round that
    /// ends without tool calls is the answer, and preamble text the model
    /// emits alongside tool calls must not reach the answer stream.
    async fn stream_round(
        &self,
        request: ChatRequest,
        tx: &mpsc::Sender<ChatEvent>,
    ) -> Result<Option<(String, Vec<MessageToolCall>)>> {
        let mut chunks = self.chat.stream(request).await?;
        let mut content = String::new();
        let mut deltas = Vec::new();
        let mut tool_calls = Vec::new();

        while let Some(chunk) = chunks.recv().await {
            let chunk = chunk?;
            if let Some(delta) = chunk.content {
                if !delta.is_empty() {
                    content.push_str(&delta);
                    deltas.push(delta);
                }
            }
            if chunk.done {
                tool_calls = chunk.tool_calls;
                break;
            }
        }

        if tool_calls.is_empty() {
            for delta in deltas {
                let event = ChatEvent::Token { content: delta };
                if tx.send(event).await.is_err() {
                    return Ok(None);
                }
            }
        }

        Ok(Some((content, tool_calls)))
    }

    /// Execute one round's tool calls concurrently, merge in request order,
    /// and apply the context budget to the round's hydrations.
    async fn execute_round(
        &self,
        tool_calls: &[MessageToolCall],
        state: &mut OrchestrationState,
    ) -> Result<Vec<Message>> {
        let futures = tool_calls.iter().map(|call| self.execute_call(call));
        let mut outcomes = futures::future::join_all(futures).await;

        // Upstream failures abort the request before any results are folded.
        if let Some(pos) = outcomes
            .iter()
            .position(|o| matches!(o, Err(e) if e.is_upstream_unavailable()))
        {
            match outcomes.swap_remove(pos) {
                Err(e) => return Err(e),
                Ok(_) => unreachable!("position matched an error"),
            }
        }

        // Budget this round's hydrations against what remains of the caps.
        let round_turns: Vec<HydratedTurn> = outcomes
            .iter()
            .filter_map(|o| match o {
                Ok(CommandOutcome::Hydrate(turn)) => Some(turn.clone()),
                _ => None,
            })
            .collect();
        let caps = BudgetCaps::new(
            self.budget.max_hydrated_turns.saturating_sub(state.admitted_turns),
            self.budget
                .max_context_tokens
                .saturating_sub(state.spent_tokens),
        );
        let budget = caps.select(round_turns);
        let mut included = budget.included.into_iter().peekable();
        let mut excluded = budget.excluded.into_iter().peekable();

        let mut round_malformed = false;
        let mut tool_messages = Vec::with_capacity(tool_calls.len());

        for (call, outcome) in tool_calls.iter().zip(outcomes) {
            let payload = match outcome {
                Ok(CommandOutcome::Peek(result)) => {
                    state.last_histogram = Some(result.histogram.clone());
                    serde_json::to_string(&result)?
                }
                Ok(CommandOutcome::Hydrate(turn)) => {
                    // The budget partition preserves request order, so the
                    // front of exactly one queue matches this hydration.
                    if included
                        .peek()
                        .is_some_and(|t| t.turn_id == turn.turn_id)
                    {
                        let admitted = included.next().expect("peeked");
                        state.admit(&admitted);
                        serde_json::to_string(&admitted)?
                    } else {
                        let dropped = excluded.next().expect("budget partition covers all turns");
                        debug!(turn_id = %dropped.turn_id, reason = ?dropped.reason, "Hydration over budget");
                        json!({
                            "turn_id": dropped.turn_id,
                            "excluded": true,
                            "reason": dropped.reason,
                            "message": "context budget exhausted; answer from the turns already hydrated"
                        })
                        .to_string()
                    }
                }
                Ok(CommandOutcome::ToolError(message)) => {
                    json!({ "error": message }).to_string()
                }
                Ok(CommandOutcome::Malformed(message)) => {
                    round_malformed = true;
                    warn!(tool = %call.name, "Malformed tool call");
                    json!({
                        "error": message,
                        "hint": "available tools are `peek` and `hydrate_turn`; check the argument schema and retry"
                    })
                    .to_string()
                }
                Err(e) => json!({ "error": e.to_string() }).to_string(),
            };
            tool_messages.push(Message::tool_result(&call.id, payload));
        }

        if round_malformed {
            state.correction_rounds += 1;
        }

        Ok(tool_messages)
    }

    async fn execute_call(&self, call: &MessageToolCall) -> Result<CommandOutcome> {
        let command = match parse_tool_call(call) {
            Ok(command) => command,
            Err(Error::MalformedToolCall(message)) => {
                return Ok(CommandOutcome::Malformed(message))
            }
            Err(e) => return Err(e),
        };

        match command {
            ToolCommand::Peek(params) => match self.peek.peek(&params).await {
                Ok(result) => Ok(CommandOutcome::Peek(result)),
                Err(Error::InvalidArgument(message)) => Ok(CommandOutcome::Malformed(message)),
                Err(e) => Err(e),
            },
            ToolCommand::Hydrate(turn_id) => match self.hydrator.hydrate(turn_id).await {
                Ok(turn) => Ok(CommandOutcome::Hydrate(turn)),
                Err(Error::TurnNotFound(id)) => {
                    Ok(CommandOutcome::ToolError(format!("turn not found: {id}")))
                }
                Err(e) => Err(e),
            },
        }
    }

    /// Persist the finalized exchange, then emit metadata and the done
    /// sentinel. Persistence is skipped when the caller already went away.
    async fn finish(
        &self,
        state: &mut OrchestrationState,
        session_id: SessionId,
        user_message: &str,
        answer: String,
        tx: &mpsc::Sender<ChatEvent>,
    ) {
        if tx.is_closed() {
            debug!(session_id = %session_id, "Caller gone before persistence, discarding exchange");
            return;
        }

        let lock = self.locks.for_session(session_id);
        let persisted = {
            let _guard = lock.lock().await;
            self.ledger
                .append_exchange(session_id, user_message, &answer)
                .await
        };

        let persisted = match persisted {
            Ok(p) => p,
            Err(e) => {
                self.fail(state, tx, format!("failed to persist exchange: {e}"))
                    .await;
                return;
            }
        };

        state.phase = Phase::Done;
        info!(
            session_id = %session_id,
            rounds = state.round,
            cited = state.cited_turn_ids.len(),
            "Chat request complete"
        );

        let metadata = ChatEvent::Metadata {
            cited_turn_ids: state.cited_turn_ids.clone(),
            histogram: state.last_histogram.clone(),
            session_id: persisted.session_id,
            conversation_id: persisted.conversation_id,
            user_message_id: persisted.user_message_id,
            assistant_message_id: persisted.assistant_message_id,
        };
        if tx.send(metadata).await.is_ok() {
            let _ = tx.send(ChatEvent::Done).await;
        }
    }

    async fn fail(&self, state: &mut OrchestrationState, tx: &mpsc::Sender<ChatEvent>, message: String) {
        state.phase = Phase::Failed;
        warn!(round = state.round, %message, "Chat request failed");
        let _ = tx.send(ChatEvent::Error { message }).await;
    }
}

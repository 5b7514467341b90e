//! Intake engine: runs transitions and executes their effects


use crate::intake::transition::NOT_IN_FLOW;
use crate::intake::{
    transition, ChatId, Effect, Event, Inbound, IntakeContext, IntakeRules, IntakeState,
    OperatorId, Submission, TransitionError,
};
use crate::session::SessionStore;
use crate::transport::Transport;
use crate::uploader::{Ack, UploadError, Uploader};
use std::sync::Arc;
use std::time::Instant;

/// What executing one effect left for the event loop
enum EffectOutcome {
    Done,
    /// Follow-up event to feed back into `transition`
    Generated(Event),
    /// The session vanished (expired or swept) before the state could be stored
    SessionLost,
}

/// Generic engine that can work with any uploader and transport implementation
pub struct IntakeEngine<U, T>
where
    U: Uploader + 'static,
    T: Transport + 'static,
{
    rules: Arc<IntakeRules>,
    authorized_operator: OperatorId,
    store: Arc<SessionStore>,
    uploader: Arc<U>,
    transport: Arc<T>,
}

impl<U, T> IntakeEngine<U, T>
where
    U: Uploader + 'static,
    T: Transport + 'static,
{
    pub fn new(
        rules: Arc<IntakeRules>,
        authorized_operator: OperatorId,
        store: Arc<SessionStore>,
        uploader: Arc<U>,
        transport: Arc<T>,
    ) -> Self {
        Self {
            rules,
            authorized_operator,
            store,
            uploader,
            transport,
        }
    }

    /// Process one inbound event to completion, including the upload it may
    /// trigger. Callers must not run two `handle` calls for the same operator
    /// concurrently.
    pub async fn handle(&self, inbound: Inbound) {
        let Inbound {
            operator,
            chat,
            event,
        } = inbound;
        let state = self
            .store
            .get(operator, Instant::now())
            .await
            .map(|s| s.state)
            .unwrap_or_default();

        self.process(operator, chat, state, event).await;
    }

    /// Run `event` against an already loaded `state`
    pub(crate) async fn process(
        &self,
        operator: OperatorId,
        chat: ChatId,
        mut state: IntakeState,
        event: Event,
    ) {
        let ctx = IntakeContext::new(operator, self.authorized_operator, &self.rules);

        // Effects may generate follow-up events (the upload outcome)
        let mut events_to_process = vec![event];

        while let Some(event) = events_to_process.pop() {
            let kind = event.kind();

            let result = match transition(&state, &ctx, event) {
                Ok(r) => r,
                Err(TransitionError::NotInFlow(_)) => {
                    tracing::debug!(%operator, event = kind, "Ignoring message outside of a flow");
                    return;
                }
                Err(e) => {
                    tracing::warn!(%operator, event = kind, error = %e, "Rejected event");
                    return;
                }
            };

            let from = state.step();
            state = result.new_state;
            tracing::debug!(
                %operator,
                event = kind,
                from = ?from,
                to = ?state.step(),
                "Transition"
            );

            for effect in result.effects {
                match self.execute_effect(operator, chat, &state, effect).await {
                    EffectOutcome::Done => {}
                    EffectOutcome::Generated(generated) => events_to_process.push(generated),
                    EffectOutcome::SessionLost => {
                        tracing::info!(%operator, step = ?state.step(), "Session gone mid-step");
                        self.reply(operator, chat, NOT_IN_FLOW).await;
                        return;
                    }
                }
            }
        }
    }

    async fn execute_effect(
        &self,
        operator: OperatorId,
        chat: ChatId,
        state: &IntakeState,
        effect: Effect,
    ) -> EffectOutcome {
        match effect {
            Effect::Reply { text } => {
                self.reply(operator, chat, &text).await;
                EffectOutcome::Done
            }

            Effect::OpenSession => {
                self.store.create(operator, Instant::now()).await;
                tracing::info!(%operator, "Session started");
                EffectOutcome::Done
            }

            Effect::PersistState => {
                match self.store.update(operator, state.clone(), Instant::now()).await {
                    Some(_) => EffectOutcome::Done,
                    None => EffectOutcome::SessionLost,
                }
            }

            Effect::DiscardSession => {
                if let Some(session) = self.store.discard(operator).await {
                    tracing::info!(
                        %operator,
                        step = ?state.step(),
                        duration_ms = %session.started_at.elapsed().as_millis(),
                        "Session ended"
                    );
                }
                EffectOutcome::Done
            }

            Effect::Upload { submission } => {
                let result = self.upload(&submission).await;
                EffectOutcome::Generated(Event::UploadFinished { result })
            }
        }
    }

    async fn reply(&self, operator: OperatorId, chat: ChatId, text: &str) {
        if let Err(e) = self.transport.send_text(chat, text).await {
            tracing::warn!(%operator, %chat, error = %e, "Failed to deliver reply");
        }
    }

    /// Single attempt: fetch the document from the transport, then upload it
    async fn upload(&self, submission: &Submission) -> Result<Ack, UploadError> {
        let content = self
            .transport
            .fetch_document(&submission.document)
            .await
            .map_err(|e| UploadError::DocumentUnavailable(e.to_string()))?;

        self.uploader
            .upload(&submission.fields, &submission.file_name, content)
            .await
    }
}

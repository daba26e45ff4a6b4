//! Session runtime executor

use super::traits::IdentityStore;
use super::OutboundMessage;
use crate::grading::GradingEngine;
use crate::runtime::traits::{QueryRunner, SubmissionLedger};
use crate::state_machine::state::Profile;
use crate::state_machine::{transition, Effect, Event, SessionState};
use tokio::sync::{broadcast, mpsc};

/// Runtime for one student's conversation.
///
/// Owns the session state and runs the transition loop: pull an event,
/// transition, execute the effects, feed any generated events back in
/// before touching the next inbound message. That ordering is what lets
/// the state machine stay pure while collaborator calls happen here.
pub struct SessionRuntime<I, Q, L>
where
    I: IdentityStore + 'static,
    Q: QueryRunner + 'static,
    L: SubmissionLedger + 'static,
{
    identity: String,
    state: SessionState,
    identities: I,
    engine: GradingEngine<Q, L>,
    event_rx: mpsc::Receiver<Event>,
    broadcast_tx: broadcast::Sender<OutboundMessage>,
}

impl<I, Q, L> SessionRuntime<I, Q, L>
where
    I: IdentityStore + 'static,
    Q: QueryRunner + 'static,
    L: SubmissionLedger + 'static,
{
    pub fn new(
        identity: String,
        identities: I,
        engine: GradingEngine<Q, L>,
        event_rx: mpsc::Receiver<Event>,
        broadcast_tx: broadcast::Sender<OutboundMessage>,
    ) -> Self {
        Self {
            identity,
            state: SessionState::Idle,
            identities,
            engine,
            event_rx,
            broadcast_tx,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(identity = %self.identity, "Starting session runtime");

        while let Some(event) = self.event_rx.recv().await {
            self.process_event(event).await;
        }

        tracing::info!(identity = %self.identity, "Session runtime stopped");
    }

    async fn process_event(&mut self, event: Event) {
        // Effects can generate follow-up events; those are processed before
        // the next inbound message so a lookup can never interleave with
        // fresh input.
        let mut events_to_process = vec![event];

        while let Some(current_event) = events_to_process.pop() {
            let result = transition(&self.state, current_event);

            if result.new_state != self.state {
                tracing::debug!(
                    identity = %self.identity,
                    from = self.state.name(),
                    to = result.new_state.name(),
                    "State transition"
                );
            }
            self.state = result.new_state;

            for effect in result.effects {
                if let Some(generated_event) = self.execute_effect(effect).await {
                    events_to_process.push(generated_event);
                }
            }
        }
    }

    async fn execute_effect(&mut self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::SendText { text, menu } => {
                let message = OutboundMessage {
                    text,
                    menu: menu.map(|m| m.rows()),
                };
                if self.broadcast_tx.send(message).is_err() {
                    tracing::debug!(identity = %self.identity, "No subscribers, message dropped");
                }
                None
            }

            Effect::LookupStudent { student_id } => {
                let found = match self.identities.get_student(&student_id).await {
                    Ok(record) => record.is_some(),
                    Err(error) => {
                        // Treated as not found; the student can retry once
                        // the store recovers.
                        tracing::warn!(%student_id, %error, "Roster lookup failed");
                        false
                    }
                };
                Some(Event::LookupFinished { student_id, found })
            }

            Effect::Authenticate {
                student_id,
                password,
            } => {
                let profile = match self.identities.authenticate(&student_id, &password).await {
                    Ok(record) => record.map(|r| Profile {
                        student_id: r.student_id,
                        display_name: r.name,
                        track: r.track,
                    }),
                    Err(error) => {
                        tracing::warn!(%student_id, %error, "Authentication check failed");
                        None
                    }
                };
                Some(Event::AuthFinished { profile })
            }

            Effect::FetchEmail { student_id } => {
                let current = match self.identities.get_email(&student_id).await {
                    Ok(email) => email,
                    Err(error) => {
                        tracing::warn!(%student_id, %error, "Email lookup failed");
                        None
                    }
                };
                Some(Event::EmailFetched { current })
            }

            Effect::CheckQuota {
                student_id,
                exercise,
            } => {
                // Fail open: a broken ledger must not lock students out.
                // The engine re-checks at grading time anyway.
                let used = match self.engine.ledger().count(&student_id, exercise).await {
                    Ok(n) => n,
                    Err(error) => {
                        tracing::warn!(%student_id, %exercise, %error, "Quota check failed");
                        0
                    }
                };
                Some(Event::QuotaChecked { exercise, used })
            }

            Effect::Grade {
                profile,
                exercise,
                submission,
            } => {
                let outcome = self.engine.grade(&profile, exercise, &submission).await;
                Some(Event::GradingFinished { outcome })
            }

            Effect::SavePassword {
                student_id,
                password,
            } => {
                let ok = match self.identities.set_password(&student_id, &password).await {
                    Ok(()) => true,
                    Err(error) => {
                        tracing::warn!(%student_id, %error, "Password update failed");
                        false
                    }
                };
                Some(Event::PasswordSaved { ok })
            }

            Effect::SaveEmail { student_id, email } => {
                let ok = match self.identities.set_email(&student_id, &email).await {
                    Ok(()) => true,
                    Err(error) => {
                        tracing::warn!(%student_id, %error, "Email update failed");
                        false
                    }
                };
                Some(Event::EmailSaved { ok, email })
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> &SessionState {
        &self.state
    }
}

//! Motion light controller — drives one light from switches, pushbuttons,
//! motion sensors and two timers.
//!
//! Each controller runs as a single task. Hub changes and timer fires are
//! consumed one at a time from that task, so transitions for one light never
//! interleave. The transition table itself lives in
//! [`lumo_domain::motion`]; this module feeds it events and applies the
//! resulting effects.
//!
//! An event the state machine rejects is fatal: the controller logs it,
//! issues no light command, tears down and reports the error through
//! [`MotionLightHandle::shutdown`].

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use lumo_domain::config::MotionLightSettings;
use lumo_domain::entity::EntityState;
use lumo_domain::error::LumoError;
use lumo_domain::event::StateChange;
use lumo_domain::id::{EntityId, TimerId};
use lumo_domain::motion::{Effect, MotionEvent, MotionState};
use lumo_domain::service::LightCommand;

use crate::ports::DeviceHub;
use crate::subscriptions::Subscriptions;
use crate::timer::{TimerHandle, schedule_after};

/// What a subscribed entity is to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Role {
    Switch,
    Pushbutton,
    Motion,
    Illumination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    Motion,
    Exit,
}

#[derive(Debug)]
struct TimerFired {
    kind: TimerKind,
    id: TimerId,
}

/// Entry point for starting motion light controllers.
pub struct MotionLightController;

impl MotionLightController {
    /// Read the light's current state, subscribe to every configured entity
    /// and spawn the controller task.
    ///
    /// # Errors
    ///
    /// Returns a hub error if reading the light or subscribing fails; any
    /// subscription made before the failure is released.
    #[tracing::instrument(skip_all, fields(light = %settings.light))]
    pub async fn start<H>(
        hub: Arc<H>,
        name: impl Into<String>,
        settings: MotionLightSettings,
    ) -> Result<MotionLightHandle, LumoError>
    where
        H: DeviceHub + 'static,
    {
        let name = name.into();
        let mut subscriptions = Subscriptions::new();
        if let Err(err) = subscribe_all(hub.as_ref(), &mut subscriptions, &settings).await {
            subscriptions.release(hub.as_ref()).await;
            return Err(err);
        }

        let light_on = match hub.get_state(&settings.light).await {
            Ok(snapshot) => snapshot.is_some_and(|s| s.state.is_on()),
            Err(err) => {
                subscriptions.release(hub.as_ref()).await;
                return Err(err);
            }
        };
        let state = MotionState::initial(light_on);

        let (state_tx, state_rx) = watch::channel(state);
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let controller = Controller {
            hub,
            name,
            settings,
            state,
            motion_timer: None,
            exit_timer: None,
            timer_tx,
            state_tx,
        };

        tracing::info!(name = %controller.name, %state, "motion light started");
        let task = tokio::spawn(controller.run(subscriptions, timer_rx, shutdown_rx));

        Ok(MotionLightHandle {
            state: state_rx,
            shutdown: Some(shutdown_tx),
            task,
        })
    }
}

async fn subscribe_all<H: DeviceHub>(
    hub: &H,
    subscriptions: &mut Subscriptions<(Role, usize)>,
    settings: &MotionLightSettings,
) -> Result<(), LumoError> {
    let groups: [(Role, &[EntityId], Option<EntityState>); 3] = [
        (Role::Switch, &settings.switches, None),
        (Role::Pushbutton, &settings.pushbuttons, Some(EntityState::On)),
        (Role::Motion, &settings.motion_sensors, None),
    ];
    for (role, entities, filter) in groups {
        for (index, entity_id) in entities.iter().enumerate() {
            subscriptions
                .add(hub, (role, index), entity_id, filter.clone())
                .await?;
        }
    }
    if let Some(sensor) = &settings.illumination_sensor {
        subscriptions
            .add(hub, (Role::Illumination, 0), sensor, None)
            .await?;
    }
    Ok(())
}

/// Handle to a running controller. Dropping it stops the controller.
pub struct MotionLightHandle {
    state: watch::Receiver<MotionState>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<(), LumoError>>,
}

impl MotionLightHandle {
    /// The controller's current state.
    #[must_use]
    pub fn state(&self) -> MotionState {
        *self.state.borrow()
    }

    /// A receiver that observes every state change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<MotionState> {
        self.state.clone()
    }

    /// Whether the controller task has stopped (after shutdown or a fatal
    /// invariant violation).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the controller, cancel its timers and unsubscribe.
    ///
    /// # Errors
    ///
    /// Returns [`LumoError::InvalidTransition`] if the controller had
    /// already stopped on an invariant violation, or [`LumoError::Closed`]
    /// if its task panicked.
    pub async fn shutdown(mut self) -> Result<(), LumoError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.finished().await
    }

    /// Wait for the controller to stop on its own.
    ///
    /// # Errors
    ///
    /// Same as [`shutdown`](Self::shutdown).
    pub async fn finished(self) -> Result<(), LumoError> {
        match self.task.await {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(%err, "motion light task failed");
                Err(LumoError::Closed)
            }
        }
    }
}

struct Controller<H> {
    hub: Arc<H>,
    name: String,
    settings: MotionLightSettings,
    state: MotionState,
    motion_timer: Option<TimerHandle>,
    exit_timer: Option<TimerHandle>,
    timer_tx: mpsc::UnboundedSender<TimerFired>,
    state_tx: watch::Sender<MotionState>,
}

impl<H: DeviceHub> Controller<H> {
    async fn run(
        mut self,
        mut subscriptions: Subscriptions<(Role, usize)>,
        mut timer_rx: mpsc::UnboundedReceiver<TimerFired>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) -> Result<(), LumoError> {
        let result = loop {
            tokio::select! {
                _ = &mut shutdown_rx => break Ok(()),
                Some(((role, _), change)) = subscriptions.next() => {
                    if let Err(err) = self.handle_change(role, change).await {
                        break Err(err);
                    }
                }
                Some(fired) = timer_rx.recv() => {
                    if let Err(err) = self.handle_timer(fired).await {
                        break Err(err);
                    }
                }
            }
        };

        self.cancel_timers();
        subscriptions.release(self.hub.as_ref()).await;
        tracing::info!(name = %self.name, state = %self.state, "motion light stopped");
        result
    }

    async fn handle_change(&mut self, role: Role, change: StateChange) -> Result<(), LumoError> {
        let event = match role {
            Role::Switch => MotionEvent::ManualToggle,
            Role::Pushbutton if change.new.is_on() => MotionEvent::ManualToggle,
            Role::Pushbutton => return Ok(()),
            Role::Motion if change.new.is_on() => MotionEvent::MotionActive {
                illumination: self.read_illumination().await,
            },
            Role::Motion => MotionEvent::MotionInactive,
            Role::Illumination => {
                // Only consulted at the next motion event.
                tracing::trace!(
                    name = %self.name,
                    entity_id = %change.entity_id,
                    illumination = %change.new,
                    "illumination changed"
                );
                return Ok(());
            }
        };
        self.apply(event, Some(&change.entity_id)).await
    }

    async fn handle_timer(&mut self, fired: TimerFired) -> Result<(), LumoError> {
        let slot = match fired.kind {
            TimerKind::Motion => &mut self.motion_timer,
            TimerKind::Exit => &mut self.exit_timer,
        };
        if slot.as_ref().map(TimerHandle::id) != Some(fired.id) {
            tracing::trace!(name = %self.name, kind = ?fired.kind, "dropping stale timer fire");
            return Ok(());
        }
        slot.take();

        let event = match fired.kind {
            TimerKind::Motion => MotionEvent::MotionTimerFired,
            TimerKind::Exit => MotionEvent::ExitTimerFired,
        };
        self.apply(event, None).await
    }

    /// Illumination reading for the gate, only needed when the light is off.
    async fn read_illumination(&self) -> Option<f64> {
        let sensor = self.settings.illumination_sensor.as_ref()?;
        if self.state != MotionState::Off {
            return None;
        }
        let reading = match self.hub.get_state(sensor).await {
            Ok(snapshot) => snapshot.and_then(|s| s.state.as_number()),
            Err(err) => {
                tracing::warn!(%err, entity_id = %sensor, "failed to read illumination");
                None
            }
        };
        if reading.is_none() {
            tracing::warn!(
                name = %self.name,
                entity_id = %sensor,
                "illumination unavailable, ignoring the gate"
            );
        }
        reading
    }

    async fn apply(
        &mut self,
        event: MotionEvent,
        source: Option<&EntityId>,
    ) -> Result<(), LumoError> {
        let from = self.state;
        let transition = match from.on_event(&event, &self.settings.timing) {
            Ok(transition) => transition,
            Err(err) => {
                tracing::error!(
                    name = %self.name,
                    light = %self.settings.light,
                    state = %from,
                    %event,
                    "invalid motion light transition, stopping controller"
                );
                return Err(err.into());
            }
        };

        for effect in transition.effects {
            self.apply_effect(effect).await;
        }
        self.state = transition.next;
        self.state_tx.send_replace(self.state);

        if self.settings.debug {
            tracing::info!(
                name = %self.name,
                source = source.map(tracing::field::display),
                %event,
                %from,
                to = %self.state,
                "motion light transition"
            );
        } else {
            tracing::trace!(
                name = %self.name,
                source = source.map(tracing::field::display),
                %event,
                %from,
                to = %self.state,
                "motion light transition"
            );
        }
        Ok(())
    }

    async fn apply_effect(&mut self, effect: Effect) {
        match effect {
            Effect::TurnOn => self.command(LightCommand::ON).await,
            Effect::TurnOff => self.command(LightCommand::TurnOff).await,
            Effect::StartMotionTimer(delay) => {
                self.motion_timer = Some(self.start_timer(TimerKind::Motion, delay));
            }
            Effect::CancelMotionTimer => {
                if let Some(timer) = self.motion_timer.take() {
                    timer.cancel();
                }
            }
            Effect::StartExitTimer(delay) => {
                self.exit_timer = Some(self.start_timer(TimerKind::Exit, delay));
            }
            Effect::CancelExitTimer => {
                if let Some(timer) = self.exit_timer.take() {
                    timer.cancel();
                }
            }
        }
    }

    /// Schedule a timer of `kind`, cancelling any live one of that kind first.
    fn start_timer(&mut self, kind: TimerKind, delay: std::time::Duration) -> TimerHandle {
        let previous = match kind {
            TimerKind::Motion => self.motion_timer.take(),
            TimerKind::Exit => self.exit_timer.take(),
        };
        if let Some(timer) = previous {
            timer.cancel();
        }
        let tx = self.timer_tx.clone();
        schedule_after(delay, move |id| {
            let _ = tx.send(TimerFired { kind, id });
        })
    }

    async fn command(&self, command: LightCommand) {
        if let Err(err) = self
            .hub
            .call_service(&self.settings.light, command)
            .await
        {
            tracing::warn!(
                %err,
                light = %self.settings.light,
                %command,
                "failed to send light command"
            );
        }
    }

    fn cancel_timers(&mut self) {
        if let Some(timer) = self.motion_timer.take() {
            timer.cancel();
        }
        if let Some(timer) = self.exit_timer.take() {
            timer.cancel();
        }
    }
}

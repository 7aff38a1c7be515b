//! Brightness cycler — hold a switch to walk a light's brightness up and
//! down, click it to toggle the light.
//!
//! A listener task consumes switch changes. Each press starts a stepping
//! task bound to a fresh activation generation; a later press, or the
//! release of the switch that made the press, advances the generation and
//! aborts that task. The stepping task also
//! checks it still owns the current generation before every brightness
//! write, so at most one task ever drives the light.
//!
//! The step direction lives next to the generation and survives across
//! activations: holding again continues the way the last hold was heading.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use lumo_domain::brightness::Direction;
use lumo_domain::config::BrightnessCyclerSettings;
use lumo_domain::entity::{EntitySnapshot, EntityState};
use lumo_domain::error::LumoError;
use lumo_domain::event::StateChange;
use lumo_domain::id::EntityId;
use lumo_domain::service::LightCommand;

use crate::ports::DeviceHub;
use crate::subscriptions::Subscriptions;

/// Retry interval while the light reports no brightness yet.
pub const BRIGHTNESS_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// State shared between the listener and the stepping task.
#[derive(Debug, Default)]
struct Activation {
    direction: Direction,
    generation: u64,
    press: Option<Press>,
}

/// The press that owns the current activation.
#[derive(Debug)]
struct Press {
    switch: EntityId,
    at: Instant,
}

fn lock(shared: &Mutex<Activation>) -> MutexGuard<'_, Activation> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Entry point for starting brightness cyclers.
pub struct BrightnessCycler;

impl BrightnessCycler {
    /// Subscribe to every switch and spawn the listener task.
    ///
    /// # Errors
    ///
    /// Returns a hub error if a subscription fails; subscriptions made
    /// before the failure are released.
    #[tracing::instrument(skip_all, fields(light = %settings.light))]
    pub async fn start<H>(
        hub: Arc<H>,
        name: impl Into<String>,
        settings: BrightnessCyclerSettings,
    ) -> Result<BrightnessCyclerHandle, LumoError>
    where
        H: DeviceHub + 'static,
    {
        let mut subscriptions = Subscriptions::new();
        for (index, switch) in settings.switches.iter().enumerate() {
            if let Err(err) = subscriptions.add(hub.as_ref(), index, switch, None).await {
                subscriptions.release(hub.as_ref()).await;
                return Err(err);
            }
        }

        let shared = Arc::new(Mutex::new(Activation::default()));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let listener = Listener {
            hub,
            name: name.into(),
            settings: Arc::new(settings),
            shared: Arc::clone(&shared),
            stepper: None,
        };

        tracing::info!(name = %listener.name, "brightness cycler started");
        let task = tokio::spawn(listener.run(subscriptions, shutdown_rx));

        Ok(BrightnessCyclerHandle {
            shared,
            shutdown: Some(shutdown_tx),
            task,
        })
    }
}

/// Handle to a running cycler. Dropping it stops the cycler.
pub struct BrightnessCyclerHandle {
    shared: Arc<Mutex<Activation>>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl BrightnessCyclerHandle {
    /// Direction the next step will take.
    #[must_use]
    pub fn direction(&self) -> Direction {
        lock(&self.shared).direction
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop listening, abort any stepping and unsubscribe.
    ///
    /// # Errors
    ///
    /// Returns [`LumoError::Closed`] if the listener task panicked.
    pub async fn shutdown(mut self) -> Result<(), LumoError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.task.await.map_err(|err| {
            tracing::error!(%err, "brightness cycler task failed");
            LumoError::Closed
        })
    }
}

struct Listener<H> {
    hub: Arc<H>,
    name: String,
    settings: Arc<BrightnessCyclerSettings>,
    shared: Arc<Mutex<Activation>>,
    stepper: Option<JoinHandle<()>>,
}

impl<H: DeviceHub + 'static> Listener<H> {
    async fn run(
        mut self,
        mut subscriptions: Subscriptions<usize>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                Some((_, change)) = subscriptions.next() => self.on_switch_change(change).await,
                else => break,
            }
        }

        self.abort_stepper();
        subscriptions.release(self.hub.as_ref()).await;
        tracing::info!(name = %self.name, "brightness cycler stopped");
    }

    async fn on_switch_change(&mut self, change: StateChange) {
        if change.new.is_on() {
            self.press(change.entity_id);
        } else {
            self.release(&change.entity_id).await;
        }
    }

    fn press(&mut self, switch: EntityId) {
        let generation = {
            let mut activation = lock(&self.shared);
            activation.generation += 1;
            activation.press = Some(Press {
                switch: switch.clone(),
                at: Instant::now(),
            });
            activation.generation
        };
        self.abort_stepper();
        tracing::debug!(name = %self.name, %switch, generation, "switch pressed");

        let stepper = Stepper {
            hub: Arc::clone(&self.hub),
            settings: Arc::clone(&self.settings),
            shared: Arc::clone(&self.shared),
            switch,
            generation,
        };
        self.stepper = Some(tokio::spawn(stepper.run()));
    }

    /// Only the switch that made the current press can end it; changes from
    /// any other switch leave the activation running.
    async fn release(&mut self, switch: &EntityId) {
        let press = {
            let mut activation = lock(&self.shared);
            let press = activation.press.take_if(|press| press.switch == *switch);
            if press.is_some() {
                activation.generation += 1;
            }
            press
        };

        let Some(press) = press else {
            tracing::trace!(name = %self.name, %switch, "release without matching press, ignoring");
            return;
        };
        self.abort_stepper();

        let held_for = press.at.elapsed();
        if held_for < self.settings.on_off_delay {
            tracing::debug!(name = %self.name, %switch, ?held_for, "short click, toggling");
            send(self.hub.as_ref(), &self.settings.light, LightCommand::Toggle).await;
        } else {
            tracing::debug!(name = %self.name, %switch, ?held_for, "hold ended");
        }
    }

    fn abort_stepper(&mut self) {
        if let Some(task) = self.stepper.take() {
            task.abort();
        }
    }
}

/// One activation: steps brightness for as long as its switch is held and
/// its generation is current.
struct Stepper<H> {
    hub: Arc<H>,
    settings: Arc<BrightnessCyclerSettings>,
    shared: Arc<Mutex<Activation>>,
    switch: EntityId,
    generation: u64,
}

impl<H: DeviceHub> Stepper<H> {
    async fn run(self) {
        tokio::time::sleep(self.settings.on_off_delay).await;

        while self.is_current() && self.switch_held().await {
            if self
                .read_light()
                .await
                .is_some_and(|s| s.state == EntityState::Off)
            {
                send(self.hub.as_ref(), &self.settings.light, LightCommand::ON).await;
            }
            let Some(current) = self.wait_for_brightness().await else {
                break;
            };
            let Some(brightness) = self.advance(current) else {
                break;
            };
            tracing::trace!(
                light = %self.settings.light,
                current,
                brightness,
                generation = self.generation,
                "brightness step"
            );
            send(
                self.hub.as_ref(),
                &self.settings.light,
                LightCommand::TurnOn {
                    brightness: Some(brightness),
                },
            )
            .await;
            tokio::time::sleep(self.settings.delay).await;
        }

        tracing::trace!(generation = self.generation, "stepping stopped");
    }

    fn is_current(&self) -> bool {
        lock(&self.shared).generation == self.generation
    }

    /// Take one step from `current`, or `None` if a newer activation exists.
    fn advance(&self, current: u8) -> Option<u8> {
        let mut activation = lock(&self.shared);
        if activation.generation != self.generation {
            return None;
        }
        let step = self.settings.range.advance(current, activation.direction);
        activation.direction = step.direction;
        Some(step.brightness)
    }

    async fn switch_held(&self) -> bool {
        match self.hub.get_state(&self.switch).await {
            Ok(snapshot) => snapshot.is_some_and(|s| s.state.is_on()),
            Err(err) => {
                tracing::warn!(%err, switch = %self.switch, "failed to read switch");
                false
            }
        }
    }

    async fn read_light(&self) -> Option<EntitySnapshot> {
        match self.hub.get_state(&self.settings.light).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(%err, light = %self.settings.light, "failed to read light");
                None
            }
        }
    }

    /// Poll until the light reports a brightness. Gives up once the switch is
    /// released or the activation is superseded.
    async fn wait_for_brightness(&self) -> Option<u8> {
        loop {
            if let Some(brightness) = self.read_light().await.and_then(|s| s.brightness()) {
                return Some(brightness);
            }
            tokio::time::sleep(BRIGHTNESS_POLL_INTERVAL).await;
            if !self.is_current() || !self.switch_held().await {
                return None;
            }
        }
    }
}

async fn send<H: DeviceHub>(hub: &H, light: &EntityId, command: LightCommand) {
    if let Err(err) = hub.call_service(light, command).await {
        tracing::warn!(%err, %light, %command, "failed to send light command");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use lumo_domain::brightness::BrightnessRange;

    use crate::test_support::{FakeHub, id};

    const LIGHT: &str = "light.bedside";
    const SWITCH: &str = "binary_sensor.switch_158";
    const OTHER_SWITCH: &str = "binary_sensor.switch_159";

    fn settings() -> BrightnessCyclerSettings {
        BrightnessCyclerSettings {
            switches: vec![id(SWITCH), id(OTHER_SWITCH)],
            light: id(LIGHT),
            delay: Duration::from_secs(1),
            on_off_delay: Duration::from_millis(500),
            range: BrightnessRange::new(10, 100, 40).unwrap(),
        }
    }

    fn hub(light: &str, brightness: Option<u8>) -> Arc<FakeHub> {
        let hub = Arc::new(FakeHub::default());
        hub.set(LIGHT, light);
        hub.set_brightness(LIGHT, brightness);
        hub.set(SWITCH, "off");
        hub.set(OTHER_SWITCH, "off");
        hub
    }

    async fn start(hub: &Arc<FakeHub>) -> BrightnessCyclerHandle {
        BrightnessCycler::start(Arc::clone(hub), "bedside", settings())
            .await
            .unwrap()
    }

    fn steps(hub: &FakeHub) -> Vec<u8> {
        hub.commands()
            .into_iter()
            .filter_map(|c| match c {
                LightCommand::TurnOn { brightness } => brightness,
                _ => None,
            })
            .collect()
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn should_toggle_once_on_quick_click() {
        let hub = hub("off", Some(50));
        let handle = start(&hub).await;

        hub.set(SWITCH, "on");
        sleep_ms(100).await;
        hub.set(SWITCH, "off");
        sleep_ms(5_000).await;

        assert_eq!(hub.commands(), vec![LightCommand::Toggle]);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn should_step_monotonically_and_reverse_at_bounds() {
        let hub = hub("on", Some(50));
        let handle = start(&hub).await;

        // Steps at 0.5s, 1.5s, 2.5s, 3.5s and 4.5s.
        hub.set(SWITCH, "on");
        sleep_ms(5_000).await;
        hub.set(SWITCH, "off");
        sleep_ms(10_000).await;

        assert_eq!(steps(&hub), vec![90, 100, 60, 20, 10]);
        assert_eq!(hub.commands().len(), 5);
        assert_eq!(hub.brightness(LIGHT), Some(10));
        assert_eq!(handle.direction(), Direction::Up);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn should_keep_direction_across_holds() {
        let hub = hub("on", Some(80));
        let handle = start(&hub).await;

        hub.set(SWITCH, "on");
        sleep_ms(1_000).await;
        hub.set(SWITCH, "off");
        assert_eq!(steps(&hub), vec![100]);
        assert_eq!(handle.direction(), Direction::Down);

        hub.set(SWITCH, "on");
        sleep_ms(1_000).await;
        hub.set(SWITCH, "off");
        sleep_ms(2_000).await;

        assert_eq!(steps(&hub), vec![100, 60]);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn should_turn_light_on_and_wait_for_brightness() {
        let hub = hub("off", None);
        let handle = start(&hub).await;

        hub.set(SWITCH, "on");
        sleep_ms(1_000).await;
        assert_eq!(hub.commands(), vec![LightCommand::ON]);

        hub.set_brightness(LIGHT, Some(50));
        sleep_ms(200).await;
        hub.set(SWITCH, "off");
        sleep_ms(5_000).await;

        assert_eq!(
            hub.commands(),
            vec![
                LightCommand::ON,
                LightCommand::TurnOn {
                    brightness: Some(90)
                }
            ]
        );
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn should_stop_polling_when_released() {
        let hub = hub("on", None);
        let handle = start(&hub).await;

        hub.set(SWITCH, "on");
        sleep_ms(1_000).await;
        hub.set(SWITCH, "off");
        sleep_ms(100).await;
        hub.set_brightness(LIGHT, Some(50));
        sleep_ms(5_000).await;

        assert!(hub.commands().is_empty());
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn should_let_new_press_supersede_previous_activation() {
        let hub = hub("on", Some(50));
        let handle = start(&hub).await;

        hub.set(SWITCH, "on");
        sleep_ms(700).await;
        assert_eq!(steps(&hub), vec![90]);

        // The first switch stays held; only the new activation may step.
        hub.set(OTHER_SWITCH, "on");
        sleep_ms(1_800).await;
        hub.set(OTHER_SWITCH, "off");
        sleep_ms(10_000).await;

        assert_eq!(steps(&hub), vec![90, 100, 60]);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn should_keep_stepping_when_another_switch_changes() {
        let hub = hub("on", Some(50));
        let handle = start(&hub).await;

        hub.set(SWITCH, "on");
        sleep_ms(700).await;
        hub.set(OTHER_SWITCH, "unavailable");
        sleep_ms(3_000).await;
        hub.set(SWITCH, "off");
        sleep_ms(5_000).await;

        assert_eq!(steps(&hub), vec![90, 100, 60, 20]);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn should_not_toggle_when_another_switch_changes_during_click() {
        let hub = hub("off", Some(50));
        let handle = start(&hub).await;

        hub.set(SWITCH, "on");
        sleep_ms(100).await;
        hub.set(OTHER_SWITCH, "unavailable");
        sleep_ms(100).await;
        assert!(hub.commands().is_empty());

        hub.set(SWITCH, "off");
        sleep_ms(5_000).await;

        assert_eq!(hub.commands(), vec![LightCommand::Toggle]);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn should_not_turn_on_light_in_unknown_state() {
        let hub = hub("unavailable", Some(50));
        let handle = start(&hub).await;

        hub.set(SWITCH, "on");
        sleep_ms(1_000).await;
        hub.set(SWITCH, "off");
        sleep_ms(2_000).await;

        assert_eq!(
            hub.commands(),
            vec![LightCommand::TurnOn {
                brightness: Some(90)
            }]
        );
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn should_ignore_release_without_press() {
        let hub = hub("on", Some(50));
        let handle = start(&hub).await;

        hub.set(SWITCH, "off");
        sleep_ms(1_000).await;

        assert!(hub.commands().is_empty());
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn should_unsubscribe_on_shutdown() {
        let hub = hub("on", Some(50));
        let handle = start(&hub).await;
        assert_eq!(hub.subscriber_count(), 2);

        hub.set(SWITCH, "on");
        sleep_ms(100).await;
        handle.shutdown().await.unwrap();
        sleep_ms(5_000).await;

        assert_eq!(hub.subscriber_count(), 0);
        assert!(hub.commands().is_empty());
    }
}

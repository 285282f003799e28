//! ControlScheduler: the fixed-rate control loop.

use copter_proto::CommandPacket;

use crate::actuator::{ActuatorDriver, ActuatorOutput};
use crate::battery::{BatteryMonitor, BatterySensor, BatteryState, ChargeSense};
use crate::charge::{ChargeController, OperatingMode};
use crate::command::{CommandChannel, LinkEvent, RadioLink};
use crate::config::{ConfigError, ControlConfig};
use crate::failsafe::{FailsafeMonitor, LinkState};
use crate::indication::{indication_for, IndicationStyle};
use crate::mixer::MixerEngine;
use crate::time::Millis;

/// Running totals, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlCounters {
    pub commands_accepted: u32,
    pub commands_rejected: u32,
    pub stale_transitions: u32,
    pub actuator_failures: u32,
    pub telemetry_failures: u32,
    pub sensor_errors: u32,
}

/// State shared by the components across ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlContext {
    /// Command the mixer works from. Neutral until the first valid command
    /// and again after a disconnect or a stale link.
    pub last_command: CommandPacket,
    pub link_state: LinkState,
    pub mode: OperatingMode,
    pub battery: BatteryState,
    /// What was handed to the actuators on the last tick.
    pub output: ActuatorOutput,
    pub tick_count: u64,
    pub counters: ControlCounters,
}

/// Summary of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickReport {
    pub link_state: LinkState,
    pub mode: OperatingMode,
    pub output: ActuatorOutput,
    pub indication: IndicationStyle,
    /// The battery was sampled (and telemetry attempted) this tick.
    pub battery_sampled: bool,
}

/// Runs every component in a fixed order once per control period.
///
/// ```text
/// drain link events
/// charge input fast check
/// receive command -> failsafe -> mix -> actuators
/// every `battery_divider` ticks: battery sample -> charge mode -> telemetry
/// ```
///
/// The actuator update happens every tick before any battery work. Errors
/// from the radio, the sensor or the actuators are logged, counted and
/// otherwise ignored; the next tick starts from scratch.
pub struct ControlScheduler<L, S, C, A> {
    config: ControlConfig,
    channel: CommandChannel<L>,
    failsafe: FailsafeMonitor,
    mixer: MixerEngine,
    battery: BatteryMonitor<S, C>,
    charge: ChargeController,
    actuators: A,
    ctx: ControlContext,
}

impl<L, S, C, A> ControlScheduler<L, S, C, A>
where
    L: RadioLink,
    S: BatterySensor,
    C: ChargeSense,
    A: ActuatorDriver,
{
    /// Build the loop.
    ///
    /// # Errors
    ///
    /// Returns the first problem [`ControlConfig::validate`] finds.
    pub fn new(
        config: ControlConfig,
        link: L,
        sensor: S,
        charge: C,
        actuators: A,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            config,
            channel: CommandChannel::new(link),
            failsafe: FailsafeMonitor::new(config.command_timeout_ms),
            mixer: MixerEngine::new(config.limits, config.tail_curve),
            battery: BatteryMonitor::new(sensor, charge, config.adc, config.battery),
            charge: ChargeController::new(),
            actuators,
            ctx: ControlContext::default(),
        })
    }

    /// Run one control period at time `now`.
    pub fn tick(&mut self, now: Millis) -> TickReport {
        let sample_due = self.ctx.tick_count % u64::from(self.config.battery_divider) == 0;

        self.drain_events(now);

        let charge_present = self.battery.poll_charge_input();
        self.ctx.mode = self.charge.enter(charge_present);

        if self.ctx.link_state == LinkState::Disconnected {
            // Left over from the old session; must not enter the replay window
            if self.channel.discard_pending() {
                debug!("frame dropped while disconnected");
            }
        } else if let Some(cmd) = self.channel.receive(now) {
            self.ctx.last_command = cmd;
            self.ctx.link_state = self.failsafe.command_accepted();
        }

        let link = self.failsafe.tick(now, self.channel.last_valid_at());
        if link == LinkState::CommandStale && self.ctx.link_state != LinkState::CommandStale {
            warn!("no command for {} ms", self.config.command_timeout_ms);
            self.ctx.last_command = CommandPacket::neutral();
        }
        self.ctx.link_state = link;

        let output = self.mixer.mix(&self.ctx.last_command, link, self.ctx.mode);
        if let Err(e) = self.actuators.apply(&output) {
            self.ctx.counters.actuator_failures = self.ctx.counters.actuator_failures.wrapping_add(1);
            error!("actuator update failed: {:?}", e);
        }
        self.ctx.output = output;

        if sample_due {
            self.battery_tick();
        }

        self.ctx.tick_count = self.ctx.tick_count.wrapping_add(1);
        self.refresh_counters();

        TickReport {
            link_state: self.ctx.link_state,
            mode: self.ctx.mode,
            output,
            indication: self.indication(),
            battery_sampled: sample_due,
        }
    }

    fn drain_events(&mut self, now: Millis) {
        while let Some(event) = self.channel.poll_event() {
            match event {
                LinkEvent::Connected => {
                    info!("controller connected");
                    self.ctx.link_state = self.failsafe.link_up(now);
                }
                LinkEvent::Disconnected => {
                    info!("controller disconnected");
                    self.ctx.link_state = self.failsafe.link_down();
                    self.channel.reset_session();
                    self.ctx.last_command = CommandPacket::neutral();
                }
            }
        }
    }

    fn battery_tick(&mut self) {
        let state = self.battery.sample();
        self.ctx.battery = state;
        self.ctx.mode = self.charge.tick(state.charge_input_present);

        if self.ctx.link_state == LinkState::Disconnected {
            return;
        }
        if let Err(e) = self.channel.send_telemetry(&state) {
            self.ctx.counters.telemetry_failures =
                self.ctx.counters.telemetry_failures.wrapping_add(1);
            debug!("telemetry dropped: {:?}", e);
        }
    }

    fn refresh_counters(&mut self) {
        let counters = &mut self.ctx.counters;
        counters.commands_accepted = self.channel.accepted();
        counters.commands_rejected = self.channel.rejected();
        counters.stale_transitions = self.failsafe.stale_transitions();
        counters.sensor_errors = self.battery.sensor_errors();
    }

    /// LED style for the current state.
    #[must_use]
    pub fn indication(&self) -> IndicationStyle {
        indication_for(
            self.ctx.mode,
            self.ctx.link_state,
            self.ctx.battery.classification,
        )
    }

    #[inline]
    #[must_use]
    pub fn context(&self) -> &ControlContext {
        &self.ctx
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    pub fn link_mut(&mut self) -> &mut L {
        self.channel.link_mut()
    }

    pub fn battery_mut(&mut self) -> &mut BatteryMonitor<S, C> {
        &mut self.battery
    }

    pub fn actuators(&self) -> &A {
        &self.actuators
    }

    pub fn actuators_mut(&mut self) -> &mut A {
        &mut self.actuators
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::actuator::{ActuatorError, Channel};
    use crate::battery::SensorError;
    use crate::command::{LinkError, RawFrame};
    use crate::config::{AdcCalibration, TailCurve};
    use copter_proto::{decode_telemetry, BatteryClass, MessageBuilder, COMMAND_FRAME_LEN};
    use fixed::types::U16F16;
    use std::collections::VecDeque;
    use std::vec::Vec;

    const PERIOD: u64 = 5;

    #[derive(Default)]
    struct MockLink {
        events: VecDeque<LinkEvent>,
        frame: Option<RawFrame>,
        sent: Vec<Vec<u8>>,
        send_error: Option<LinkError>,
    }

    impl MockLink {
        fn push_command(&mut self, seq: u32, throttle: u16, yaw: i16, pitch: i16) {
            let mut buf = [0u8; COMMAND_FRAME_LEN];
            let len = MessageBuilder::command()
                .sequence(seq)
                .throttle(throttle)
                .yaw_trim(yaw)
                .pitch_trim(pitch)
                .serialize(&mut buf)
                .unwrap();
            // Single slot: a newer frame replaces one not yet taken
            self.frame = Some(RawFrame::from_slice(&buf[..len]).unwrap());
        }
    }

    impl RadioLink for MockLink {
        fn poll_event(&mut self) -> Option<LinkEvent> {
            self.events.pop_front()
        }

        fn receive(&mut self) -> Option<RawFrame> {
            self.frame.take()
        }

        fn send(&mut self, frame: &[u8]) -> Result<(), LinkError> {
            if let Some(e) = self.send_error {
                return Err(e);
            }
            self.sent.push(Vec::from(frame));
            Ok(())
        }
    }

    struct MockSensor {
        mv: Result<u16, SensorError>,
    }

    impl BatterySensor for MockSensor {
        fn read_raw(&mut self) -> Result<u16, SensorError> {
            self.mv
        }
    }

    #[derive(Default)]
    struct MockCharge {
        present: bool,
    }

    impl ChargeSense for MockCharge {
        fn charge_input_present(&mut self) -> bool {
            self.present
        }

        fn charger_fault(&mut self) -> bool {
            false
        }
    }

    #[derive(Default)]
    struct MockActuators {
        applied: Vec<ActuatorOutput>,
        fail: bool,
    }

    impl ActuatorDriver for MockActuators {
        fn apply(&mut self, output: &ActuatorOutput) -> Result<(), ActuatorError> {
            if self.fail {
                return Err(ActuatorError::Pwm(Channel::Main));
            }
            self.applied.push(*output);
            Ok(())
        }
    }

    type TestScheduler = ControlScheduler<MockLink, MockSensor, MockCharge, MockActuators>;

    fn test_config() -> ControlConfig {
        ControlConfig {
            battery_divider: 4,
            tail_curve: TailCurve::new([100, 200, 300, 400, 500]),
            adc: AdcCalibration {
                mv_per_count: U16F16::ONE,
            },
            ..ControlConfig::DEFAULT
        }
    }

    fn scheduler() -> TestScheduler {
        ControlScheduler::new(
            test_config(),
            MockLink::default(),
            MockSensor { mv: Ok(3900) },
            MockCharge::default(),
            MockActuators::default(),
        )
        .unwrap()
    }

    /// Connected scheduler, `t` advanced past the connect tick.
    fn connected() -> (TestScheduler, u64) {
        let mut s = scheduler();
        s.link_mut().events.push_back(LinkEvent::Connected);
        s.tick(Millis(0));
        (s, PERIOD)
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = ControlConfig {
            battery_divider: 0,
            ..ControlConfig::DEFAULT
        };
        let result = ControlScheduler::new(
            config,
            MockLink::default(),
            MockSensor { mv: Ok(3900) },
            MockCharge::default(),
            MockActuators::default(),
        );
        assert!(matches!(result, Err(ConfigError::ZeroDivider)));
    }

    #[test]
    fn test_idle_is_safe_and_disconnected() {
        let mut s = scheduler();
        let report = s.tick(Millis(0));

        assert_eq!(report.link_state, LinkState::Disconnected);
        assert_eq!(report.output, ActuatorOutput::SAFE);
        assert_eq!(report.indication, IndicationStyle::BlinkSlow);
        assert_eq!(s.actuators().applied, [ActuatorOutput::SAFE]);
    }

    #[test]
    fn test_actuators_applied_every_tick() {
        let mut s = scheduler();
        for i in 0..10 {
            s.tick(Millis(i * PERIOD));
        }
        assert_eq!(s.actuators().applied.len(), 10);
    }

    #[test]
    fn test_neutral_command_output() {
        let (mut s, t) = connected();
        s.link_mut().push_command(1, 0, 0, 0);

        let out = s.tick(Millis(t)).output;
        assert_eq!(out.main_motor, 0);
        assert_eq!(out.tail_motor, 100);
        assert_eq!(out.trim, 0);
    }

    #[test]
    fn test_full_throttle_output() {
        let (mut s, t) = connected();
        s.link_mut().push_command(1, 1000, 250, -400);

        let out = s.tick(Millis(t)).output;
        assert_eq!(out.main_motor, 1000);
        assert_eq!(out.tail_motor, 750);
        assert_eq!(out.trim, -400);
    }

    #[test]
    fn test_command_while_disconnected_is_ignored() {
        let mut s = scheduler();
        s.link_mut().push_command(1, 800, 0, 0);

        let report = s.tick(Millis(0));
        assert_eq!(report.output, ActuatorOutput::SAFE);
        assert_eq!(s.context().last_command, CommandPacket::neutral());
        assert_eq!(s.context().counters.commands_accepted, 0);
        assert!(s.link_mut().frame.is_none());
    }

    #[test]
    fn test_charge_input_forces_safe_on_next_tick() {
        let (mut s, t) = connected();
        s.link_mut().push_command(1, 600, 0, 0);
        assert_eq!(s.tick(Millis(t)).output.main_motor, 600);

        // Charger plugged in between ticks, not on a battery tick
        s.battery_mut().charge_mut().present = true;
        let report = s.tick(Millis(t + PERIOD));
        assert!(!report.battery_sampled);
        assert_eq!(report.mode, OperatingMode::Charging);
        assert_eq!(report.output, ActuatorOutput::SAFE);
        assert_eq!(report.indication, IndicationStyle::Solid);
    }

    #[test]
    fn test_leaving_charging_waits_for_battery_tick() {
        let mut s = scheduler();
        s.battery_mut().charge_mut().present = true;
        assert_eq!(s.tick(Millis(0)).mode, OperatingMode::Charging);

        s.battery_mut().charge_mut().present = false;
        // Ticks 1..3 are not battery ticks
        for i in 1..4 {
            assert_eq!(s.tick(Millis(i * PERIOD)).mode, OperatingMode::Charging);
        }
        let report = s.tick(Millis(4 * PERIOD));
        assert!(report.battery_sampled);
        assert_eq!(report.mode, OperatingMode::Flight);
    }

    #[test]
    fn test_replayed_sequence_rejected() {
        let (mut s, t) = connected();
        s.link_mut().push_command(5, 400, 0, 0);
        s.tick(Millis(t));

        s.link_mut().push_command(5, 900, 0, 0);
        let report = s.tick(Millis(600));
        assert_eq!(report.output.main_motor, 400);
        assert_eq!(s.context().last_command.throttle, 400);
        assert_eq!(s.context().counters.commands_rejected, 1);

        // The replay did not restart the timeout
        assert_eq!(s.tick(Millis(t + 1000)).link_state, LinkState::Connected);
        assert_eq!(s.tick(Millis(t + 1001)).link_state, LinkState::CommandStale);
    }

    #[test]
    fn test_stale_once_then_recovers() {
        let (mut s, t) = connected();
        s.link_mut().push_command(1, 500, 0, 0);
        s.tick(Millis(t));

        let mut stale_ticks = Vec::new();
        let mut now = t;
        while now <= t + 1200 {
            now += PERIOD;
            if s.tick(Millis(now)).link_state == LinkState::CommandStale {
                stale_ticks.push(now);
            }
        }
        assert_eq!(stale_ticks.first(), Some(&(t + 1005)));
        assert_eq!(s.context().counters.stale_transitions, 1);
        assert_eq!(s.context().output, ActuatorOutput::SAFE);
        assert_eq!(s.context().last_command, CommandPacket::neutral());

        s.link_mut().push_command(2, 300, 0, 0);
        let report = s.tick(Millis(now + PERIOD));
        assert_eq!(report.link_state, LinkState::Connected);
        assert_eq!(report.output.main_motor, 300);
    }

    #[test]
    fn test_stale_does_not_resume_old_command() {
        let (mut s, t) = connected();
        s.link_mut().push_command(1, 700, 0, 0);
        s.tick(Millis(t));
        s.tick(Millis(t + 1001));
        assert_eq!(s.context().link_state, LinkState::CommandStale);

        // Replay of the old sequence does not bring the link back
        s.link_mut().push_command(1, 700, 0, 0);
        let report = s.tick(Millis(t + 1010));
        assert_eq!(report.link_state, LinkState::CommandStale);
        assert_eq!(report.output, ActuatorOutput::SAFE);
    }

    #[test]
    fn test_disconnect_resets_session() {
        let (mut s, t) = connected();
        s.link_mut().push_command(100, 800, 0, 0);
        assert_eq!(s.tick(Millis(t)).output.main_motor, 800);

        s.link_mut().events.push_back(LinkEvent::Disconnected);
        let report = s.tick(Millis(t + PERIOD));
        assert_eq!(report.link_state, LinkState::Disconnected);
        assert_eq!(report.output, ActuatorOutput::SAFE);

        // Reconnect: throttle does not come back on its own
        s.link_mut().events.push_back(LinkEvent::Connected);
        let report = s.tick(Millis(t + 2 * PERIOD));
        assert_eq!(report.link_state, LinkState::Connected);
        assert_eq!(report.output.main_motor, 0);

        // And the controller may restart its sequence
        s.link_mut().push_command(1, 200, 0, 0);
        assert_eq!(s.tick(Millis(t + 3 * PERIOD)).output.main_motor, 200);
    }

    #[test]
    fn test_frame_pending_at_disconnect_is_dropped() {
        let (mut s, t) = connected();
        s.link_mut().push_command(100, 500, 0, 0);
        s.tick(Millis(t));

        // Last frame of the old session arrives together with the disconnect
        s.link_mut().push_command(101, 500, 0, 0);
        s.link_mut().events.push_back(LinkEvent::Disconnected);
        s.tick(Millis(t + PERIOD));
        assert_eq!(s.context().counters.commands_accepted, 1);

        s.link_mut().events.push_back(LinkEvent::Connected);
        s.tick(Millis(t + 2 * PERIOD));

        s.link_mut().push_command(1, 200, 0, 0);
        let report = s.tick(Millis(t + 3 * PERIOD));
        assert_eq!(report.output.main_motor, 200);
        assert_eq!(s.context().counters.commands_rejected, 0);
    }

    #[test]
    fn test_reconnect_timer_ignores_old_session() {
        let (mut s, t) = connected();
        s.link_mut().push_command(1, 500, 0, 0);
        s.tick(Millis(t));

        s.link_mut().events.push_back(LinkEvent::Disconnected);
        s.tick(Millis(t + PERIOD));
        s.link_mut().events.push_back(LinkEvent::Connected);
        s.tick(Millis(3000));

        // Timeout counts from the reconnect, not from command 1
        assert_eq!(s.tick(Millis(4000)).link_state, LinkState::Connected);
        assert_eq!(s.tick(Millis(4001)).link_state, LinkState::CommandStale);
    }

    #[test]
    fn test_events_drained_in_order() {
        let mut s = scheduler();
        s.link_mut().events.extend([
            LinkEvent::Connected,
            LinkEvent::Disconnected,
            LinkEvent::Connected,
        ]);
        assert_eq!(s.tick(Millis(0)).link_state, LinkState::Connected);
        assert!(s.link_mut().events.is_empty());
    }

    #[test]
    fn test_telemetry_on_battery_cadence() {
        let (mut s, _) = connected();
        // Tick 0 sampled the battery and sent telemetry
        assert_eq!(s.link_mut().sent.len(), 1);

        for i in 1..9 {
            s.link_mut().push_command(i as u32, 100, 0, 0);
            s.tick(Millis(i * PERIOD));
        }
        // Ticks 4 and 8
        assert_eq!(s.link_mut().sent.len(), 3);

        let packet = decode_telemetry(&s.link_mut().sent[2]).unwrap();
        assert_eq!(packet.voltage_mv, 3900);
        assert_eq!(packet.class, BatteryClass::Normal);
    }

    #[test]
    fn test_telemetry_failure_does_not_stall_tick() {
        let (mut s, _) = connected();
        assert_eq!(s.link_mut().sent.len(), 1);
        s.link_mut().send_error = Some(LinkError::Busy);

        for i in 1..4 {
            s.tick(Millis(i * PERIOD));
        }
        s.link_mut().push_command(1, 600, 0, 0);
        let report = s.tick(Millis(4 * PERIOD));
        assert!(report.battery_sampled);
        assert_eq!(report.output.main_motor, 600);
        assert_eq!(s.actuators().applied.last(), Some(&report.output));
        assert_eq!(s.context().counters.telemetry_failures, 1);
        assert_eq!(s.link_mut().sent.len(), 1);

        // No retry in between; the next battery tick sends again
        s.link_mut().send_error = None;
        for i in 5..8 {
            s.tick(Millis(i * PERIOD));
            assert_eq!(s.link_mut().sent.len(), 1);
        }
        s.tick(Millis(8 * PERIOD));
        assert_eq!(s.link_mut().sent.len(), 2);
        assert_eq!(s.context().counters.telemetry_failures, 1);
    }

    #[test]
    fn test_telemetry_not_connected_counted() {
        let (mut s, _) = connected();
        s.link_mut().send_error = Some(LinkError::NotConnected);
        for i in 1..9 {
            s.tick(Millis(i * PERIOD));
        }
        assert_eq!(s.context().counters.telemetry_failures, 2);
    }

    #[test]
    fn test_no_telemetry_while_disconnected() {
        let mut s = scheduler();
        for i in 0..8 {
            s.tick(Millis(i * PERIOD));
        }
        assert!(s.link_mut().sent.is_empty());
        assert_eq!(s.context().battery.voltage_mv, 3900);
    }

    #[test]
    fn test_critical_battery_does_not_stop_flight() {
        let mut s = ControlScheduler::new(
            test_config(),
            MockLink::default(),
            MockSensor { mv: Ok(3100) },
            MockCharge::default(),
            MockActuators::default(),
        )
        .unwrap();
        s.link_mut().events.push_back(LinkEvent::Connected);
        s.link_mut().push_command(1, 500, 0, 0);

        let report = s.tick(Millis(0));
        assert_eq!(s.context().battery.classification, BatteryClass::Critical);
        assert_eq!(report.mode, OperatingMode::Flight);
        assert_eq!(report.output.main_motor, 500);
        assert_eq!(report.indication, IndicationStyle::BlinkFast);
    }

    #[test]
    fn test_actuator_failure_counted() {
        let (mut s, t) = connected();
        s.actuators_mut().fail = true;

        s.tick(Millis(t));
        s.tick(Millis(t + PERIOD));
        assert_eq!(s.context().counters.actuator_failures, 2);
        assert_eq!(s.context().tick_count, 3);
    }

    #[test]
    fn test_sensor_error_counted() {
        let mut s = ControlScheduler::new(
            test_config(),
            MockLink::default(),
            MockSensor {
                mv: Err(SensorError::Conversion),
            },
            MockCharge::default(),
            MockActuators::default(),
        )
        .unwrap();

        s.tick(Millis(0));
        assert_eq!(s.context().counters.sensor_errors, 1);
    }
}

//! Radio helicopter flight controller for RP2040.
//!
//! This crate wires the platform-agnostic control core to the board: the
//! radio module on UART1, three PWM motor channels, the battery ADC, the
//! charger status lines and the status LED.

#![no_std]

use copter_core::config::AdcCalibration;
use copter_core::{ControlConfig, ControlScheduler, Millis};
use defmt::{debug, info};
use embassy_time::{Duration, Instant, Ticker};
use fixed_macro::fixed;

pub mod actuators;
pub mod indications;
pub mod power;
pub mod radio;

pub use actuators::{motor_pwm_config, Actuators};
pub use indications::{led_task, IndicationSignal};
pub use power::{AdcBatterySensor, GpioChargeSense};
pub use radio::{link_status_task, radio_rx_task, radio_tx_task, LinkShared, UartRadioLink};

/// Control loop configuration for this board.
///
/// The battery sits behind a 3:1 divider into the 12-bit, 3.3 V ADC.
pub const BOARD_CONFIG: ControlConfig = ControlConfig {
    adc: AdcCalibration {
        mv_per_count: fixed!(2.4170: U16F16),
    },
    ..ControlConfig::DEFAULT
};

/// Ticks between counter dumps in the log.
const STATS_INTERVAL_TICKS: u64 = 2000;

pub type Scheduler = ControlScheduler<UartRadioLink, AdcBatterySensor, GpioChargeSense, Actuators>;

/// Fixed-rate control loop.
#[embassy_executor::task]
pub async fn control_task(mut scheduler: Scheduler, indication: &'static IndicationSignal) {
    let period = u64::from(scheduler.config().control_period_ms);
    info!("control loop running every {} ms", period);

    let mut ticker = Ticker::every(Duration::from_millis(period));
    let mut shown = None;

    loop {
        let now = Millis(Instant::now().as_millis());
        let report = scheduler.tick(now);

        if shown != Some(report.indication) {
            shown = Some(report.indication);
            indication.signal(report.indication);
        }

        let ctx = scheduler.context();
        if ctx.tick_count % STATS_INTERVAL_TICKS == 0 {
            debug!("{} mV {:?} {:?}", ctx.battery.voltage_mv, ctx.link_state, ctx.counters);
        }

        ticker.next().await;
    }
}

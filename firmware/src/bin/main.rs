#![no_std]
#![no_main]

use defmt::{info, unwrap};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_rp::adc::{Adc, Channel as AdcChannel, Config as AdcConfig};
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::peripherals::UART1;
use embassy_rp::pwm::Pwm;
use embassy_rp::uart::{Config as UartConfig, Uart};
use embassy_sync::signal::Signal;
use radio_copter::{
    control_task, led_task, link_status_task, motor_pwm_config, radio_rx_task, radio_tx_task,
    AdcBatterySensor, Actuators, GpioChargeSense, IndicationSignal, LinkShared, Scheduler,
    UartRadioLink, BOARD_CONFIG,
};
use static_cell::StaticCell;

#[cfg(feature = "dev-panic")]
use panic_probe as _;
#[cfg(feature = "prod-panic")]
use panic_reset as _;

bind_interrupts!(struct Irqs {
    UART1_IRQ => embassy_rp::uart::InterruptHandler<UART1>;
});

/// Radio state shared by the radio tasks and the control loop.
static LINK: StaticCell<LinkShared> = StaticCell::new();

/// LED style, latest wins.
static INDICATION: StaticCell<IndicationSignal> = StaticCell::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("radio-copter starting...");

    let p = embassy_rp::init(embassy_rp::config::Config::default());

    // Actuators first so the motors are held off while the rest comes up
    let pwm_config = motor_pwm_config();
    let main_motor = Pwm::new_output_a(p.PWM_SLICE0, p.PIN_0, pwm_config.clone());
    let tail_motor = Pwm::new_output_a(p.PWM_SLICE1, p.PIN_2, pwm_config.clone());
    let trim = Pwm::new_output_a(p.PWM_SLICE2, p.PIN_4, pwm_config);
    let trim_dir = Output::new(p.PIN_5, Level::Low);
    let actuators = Actuators::new(main_motor, tail_motor, trim, trim_dir);

    // --- Radio module on UART1 ---
    let link = &*LINK.init(LinkShared::new());

    let mut uart_config = UartConfig::default();
    uart_config.baudrate = 115_200;

    let uart = Uart::new(
        p.UART1,
        p.PIN_8, // TX
        p.PIN_9, // RX
        Irqs,
        p.DMA_CH0,
        p.DMA_CH1,
        uart_config,
    );
    let (tx, rx) = uart.split();
    let radio_state = Input::new(p.PIN_10, Pull::Down);

    // --- Power ---
    let adc = Adc::new_blocking(p.ADC, AdcConfig::default());
    let battery_channel = AdcChannel::new_pin(p.PIN_29, Pull::None);
    let sensor = AdcBatterySensor::new(adc, battery_channel);

    let charge = GpioChargeSense::new(
        Input::new(p.PIN_11, Pull::Up),
        Input::new(p.PIN_12, Pull::Up),
    );

    let scheduler: Scheduler = unwrap!(Scheduler::new(
        BOARD_CONFIG,
        UartRadioLink::new(link),
        sensor,
        charge,
        actuators,
    ));

    // --- Status LED (on-board LED on Pico) ---
    let indication = &*INDICATION.init(Signal::new());
    let led = Output::new(p.PIN_25, Level::Low);

    spawner.spawn(unwrap!(control_task(scheduler, indication)));
    spawner.spawn(unwrap!(radio_rx_task(rx, link)));
    spawner.spawn(unwrap!(radio_tx_task(tx, link)));
    spawner.spawn(unwrap!(link_status_task(radio_state, link)));
    spawner.spawn(unwrap!(led_task(led, indication)));

    info!("radio-copter initialized, waiting for controller...");
}

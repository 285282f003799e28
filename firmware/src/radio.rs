use copter_core::{LinkError, LinkEvent, RadioLink, RawFrame};
use copter_proto::FrameAssembler;
use defmt::{info, warn};
use embassy_rp::gpio::Input;
use embassy_rp::uart::{Async, UartRx, UartTx};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embassy_time::Timer;
use portable_atomic::{AtomicBool, Ordering};

/// Pending connect/disconnect events.
pub const EVENT_QUEUE_LEN: usize = 4;

/// Telemetry frames waiting for the UART.
pub const OUTBOUND_QUEUE_LEN: usize = 2;

/// Settling time for the radio's connection-status pin.
const STATUS_DEBOUNCE_MS: u64 = 20;

/// State shared between the radio tasks and the control loop.
///
/// Inbound frames go through a [`Signal`], so a frame not yet taken by the
/// control tick is overwritten by the next one.
pub struct LinkShared {
    frames: Signal<CriticalSectionRawMutex, RawFrame>,
    events: Channel<CriticalSectionRawMutex, LinkEvent, EVENT_QUEUE_LEN>,
    outbound: Channel<CriticalSectionRawMutex, RawFrame, OUTBOUND_QUEUE_LEN>,
    connected: AtomicBool,
}

impl LinkShared {
    pub const fn new() -> Self {
        Self {
            frames: Signal::new(),
            events: Channel::new(),
            outbound: Channel::new(),
            connected: AtomicBool::new(false),
        }
    }
}

impl Default for LinkShared {
    fn default() -> Self {
        Self::new()
    }
}

/// Radio module on a UART, seen from the control loop.
///
/// The module is transparent: whatever the paired controller writes comes
/// out of its UART, and a status pin reports whether a controller is
/// connected.
///
/// # Pins
///
/// - GPIO 8: UART1 TX (to module RX)
/// - GPIO 9: UART1 RX (from module TX)
/// - GPIO 10: module STATE, high while connected
pub struct UartRadioLink {
    shared: &'static LinkShared,
}

impl UartRadioLink {
    pub fn new(shared: &'static LinkShared) -> Self {
        Self { shared }
    }
}

impl RadioLink for UartRadioLink {
    fn poll_event(&mut self) -> Option<LinkEvent> {
        self.shared.events.try_receive().ok()
    }

    fn receive(&mut self) -> Option<RawFrame> {
        self.shared.frames.try_take()
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), LinkError> {
        if !self.shared.connected.load(Ordering::Relaxed) {
            return Err(LinkError::NotConnected);
        }
        let frame = RawFrame::from_slice(frame).map_err(|_| LinkError::Io)?;
        self.shared
            .outbound
            .try_send(frame)
            .map_err(|_| LinkError::Busy)
    }
}

/// Reads the UART and publishes each complete frame.
#[embassy_executor::task]
pub async fn radio_rx_task(mut rx: UartRx<'static, Async>, shared: &'static LinkShared) {
    let mut assembler = FrameAssembler::new();
    let mut byte = [0u8; 1];

    loop {
        if let Err(e) = rx.read(&mut byte).await {
            warn!("radio rx error: {:?}", e);
            assembler.reset();
            continue;
        }

        if let Some(frame) = assembler.push_byte(byte[0]) {
            // Frames never exceed MAX_FRAME_LEN, the capacity of RawFrame
            if let Ok(frame) = RawFrame::from_slice(frame) {
                shared.frames.signal(frame);
            }
        }
    }
}

/// Writes queued telemetry frames to the UART.
#[embassy_executor::task]
pub async fn radio_tx_task(mut tx: UartTx<'static, Async>, shared: &'static LinkShared) {
    loop {
        let frame = shared.outbound.receive().await;
        if let Err(e) = tx.write(&frame).await {
            warn!("radio tx error: {:?}", e);
        }
    }
}

/// Turns edges on the module's status pin into link events.
#[embassy_executor::task]
pub async fn link_status_task(mut state_pin: Input<'static>, shared: &'static LinkShared) {
    let mut connected = false;

    loop {
        let level = state_pin.is_high();
        if level != connected {
            connected = level;
            shared.connected.store(connected, Ordering::Relaxed);

            let event = if connected {
                info!("radio: controller connected");
                LinkEvent::Connected
            } else {
                info!("radio: controller disconnected");
                LinkEvent::Disconnected
            };
            shared.events.send(event).await;
        }

        state_pin.wait_for_any_edge().await;
        Timer::after_millis(STATUS_DEBOUNCE_MS).await;
    }
}

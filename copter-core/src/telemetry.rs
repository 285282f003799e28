//! Telemetry sent back over the radio link.

use copter_proto::{SerializeError, TelemetryFlags, TelemetryPacket};

use crate::battery::BatteryState;
use crate::command::LinkError;

/// Error type for telemetry operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TelemetryError {
    /// The frame did not fit the transmit buffer.
    Serialize(SerializeError),
    /// The radio refused the frame.
    Link(LinkError),
}

impl From<SerializeError> for TelemetryError {
    fn from(e: SerializeError) -> Self {
        TelemetryError::Serialize(e)
    }
}

impl From<LinkError> for TelemetryError {
    fn from(e: LinkError) -> Self {
        TelemetryError::Link(e)
    }
}

impl From<&BatteryState> for TelemetryPacket {
    fn from(state: &BatteryState) -> Self {
        let mut flags = TelemetryFlags::NONE;
        flags.set(TelemetryFlags::CHARGE_INPUT, state.charge_input_present);
        flags.set(TelemetryFlags::CHARGER_FAULT, state.charger_fault);

        TelemetryPacket {
            voltage_mv: state.voltage_mv,
            class: state.classification,
            flags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use copter_proto::BatteryClass;

    #[test]
    fn test_packet_from_battery_state() {
        let state = BatteryState {
            voltage_mv: 3310,
            charge_input_present: false,
            charger_fault: true,
            classification: BatteryClass::Critical,
        };

        let packet = TelemetryPacket::from(&state);
        assert_eq!(packet.voltage_mv, 3310);
        assert_eq!(packet.class, BatteryClass::Critical);
        assert_eq!(packet.flags, TelemetryFlags::CHARGER_FAULT);
    }
}

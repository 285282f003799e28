//! Status LED pattern selection.

use copter_proto::BatteryClass;

use crate::charge::OperatingMode;
use crate::failsafe::LinkState;

/// Length of the LED flash in the blinking styles.
pub const FLASH_MS: u64 = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IndicationStyle {
    #[default]
    Off,
    Solid,
    BlinkSlow,
    BlinkFast,
}

impl IndicationStyle {
    /// Flash period for the blinking styles.
    #[must_use]
    pub const fn blink_period_ms(self) -> Option<u64> {
        match self {
            Self::BlinkFast => Some(1000),
            Self::BlinkSlow => Some(2000),
            Self::Off | Self::Solid => None,
        }
    }
}

/// Pick the LED style for the current system state.
///
/// Highest priority first: charging, critical battery, stale commands,
/// no connection.
#[must_use]
pub fn indication_for(mode: OperatingMode, link: LinkState, battery: BatteryClass) -> IndicationStyle {
    if mode == OperatingMode::Charging || battery == BatteryClass::Charging {
        IndicationStyle::Solid
    } else if battery == BatteryClass::Critical || link == LinkState::CommandStale {
        IndicationStyle::BlinkFast
    } else if link == LinkState::Disconnected {
        IndicationStyle::BlinkSlow
    } else {
        IndicationStyle::Off
    }
}

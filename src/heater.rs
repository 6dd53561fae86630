use std::fmt;

/// Humidity drop below the turn-on threshold required to switch the heater off.
pub const HUMIDITY_HYSTERESIS: i32 = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HeaterState {
    On,
    #[default]
    Off,
}

impl HeaterState {
    pub fn pin_level(&self) -> u8 {
        match self {
            HeaterState::On => 1,
            HeaterState::Off => 0,
        }
    }
}

impl fmt::Display for HeaterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaterState::On => f.write_str("ON"),
            HeaterState::Off => f.write_str("OFF"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HeaterControl {
    turn_on_humidity: i32,
}

impl HeaterControl {
    pub fn new(turn_on_humidity: i32) -> Self {
        Self { turn_on_humidity }
    }

    pub fn turn_on_humidity(&self) -> i32 {
        self.turn_on_humidity
    }

    /// Returns the state to switch to, or `None` inside the dead band.
    pub fn transition(&self, current: HeaterState, humidity: f32) -> Option<HeaterState> {
        let humidity = humidity as i32;
        match current {
            HeaterState::Off if humidity >= self.turn_on_humidity => Some(HeaterState::On),
            HeaterState::On if humidity <= self.turn_on_humidity - HUMIDITY_HYSTERESIS => {
                Some(HeaterState::Off)
            }
            _ => None,
        }
    }
}

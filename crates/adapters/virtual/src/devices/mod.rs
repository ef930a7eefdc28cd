//! Simulated channels of the virtual robot.

mod actuator;
mod sensor;

pub use actuator::VirtualActuator;
pub use sensor::VirtualSensor;

/// Power channel of the robot's light.
pub const LIGHT_POWER: &str = "light.power";

/// Power channel of the robot's switch.
pub const SWITCH_POWER: &str = "switch.power";

/// Temperature stream emitted by [`VirtualSensor`].
pub const SENSOR_TEMPERATURE: &str = "sensor.temperature";

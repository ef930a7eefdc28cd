//! # datapool-adapter-virtual
//!
//! Simulated robot that plugs into a datapool as its transport, for demos
//! and end-to-end tests.
//!
//! ## Provided channels
//!
//! | Key | Direction | Behaviour |
//! |-----|-----------|-----------|
//! | `light.power` | send → echoed back | Accepts `true` / `false` / `"toggle"`; the resulting state is received as a non-droppable observation |
//! | `switch.power` | send → echoed back | Same as `light.power` |
//! | `sensor.temperature` | receive | Droppable readings emitted by [`VirtualSensor`] at a fixed period |
//!
//! ## Dependency rule
//!
//! Depends on `datapool-app` (port traits, `DataPool`) and `datapool-domain`
//! only.

mod devices;
mod error;

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use datapool_app::datapool::DataPool;
use datapool_app::ports::{ConnectionPublisher, TransportHandler};
use datapool_domain::connection::ConnectionEvent;
use datapool_domain::error::DataPoolError;
use datapool_domain::id::DeviceId;
use datapool_domain::message::Message;

pub use devices::{LIGHT_POWER, SENSOR_TEMPERATURE, SWITCH_POWER, VirtualActuator, VirtualSensor};
pub use error::VirtualError;

/// A simulated robot acting as the transport of one datapool.
///
/// Holds only a weak reference to the pool, so attaching it as the pool's
/// handler does not keep the pool alive.
pub struct VirtualRobot<P> {
    device_id: DeviceId,
    pool: Weak<DataPool>,
    actuators: HashMap<&'static str, VirtualActuator>,
    connection: P,
}

impl<P> std::fmt::Debug for VirtualRobot<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualRobot")
            .field("device_id", &self.device_id)
            .field("actuators", &self.actuators)
            .finish_non_exhaustive()
    }
}

impl<P> VirtualRobot<P>
where
    P: ConnectionPublisher + Send + Sync + 'static,
{
    /// Create a robot for `pool` and attach it as the pool's transport
    /// handler, replacing any previous one.
    pub fn attach(pool: &Arc<DataPool>, connection: P) -> Arc<Self> {
        let actuators = [LIGHT_POWER, SWITCH_POWER]
            .into_iter()
            .map(|key| (key, VirtualActuator::new(key)))
            .collect();
        let robot = Arc::new(Self {
            device_id: pool.device_id(),
            pool: Arc::downgrade(pool),
            actuators,
            connection,
        });
        pool.set_handler(Some(Arc::clone(&robot) as Arc<dyn TransportHandler>));
        tracing::info!(device = %robot.device_id, "virtual robot attached");
        robot
    }

    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Current power state of the actuator `key`, if the robot has one.
    #[must_use]
    pub fn is_on(&self, key: &str) -> Option<bool> {
        self.actuators.get(key).map(VirtualActuator::is_on)
    }

    /// Drop the link and bring it straight back up.
    pub fn simulate_disconnect(&self) {
        tracing::info!(device = %self.device_id, "simulating connection loss");
        self.connection.publish(ConnectionEvent::lost(self.device_id));
        self.connection.publish(ConnectionEvent::established(self.device_id));
    }
}

impl<P> TransportHandler for VirtualRobot<P>
where
    P: ConnectionPublisher + Send + Sync,
{
    fn send_to_robot(&self, message: &Message) -> Result<(), DataPoolError> {
        let actuator = self
            .actuators
            .get(message.key.as_str())
            .ok_or_else(|| VirtualError::UnknownChannel {
                key: message.key.clone(),
            })?;
        let on = actuator.apply(&message.value)?;
        tracing::debug!(device = %self.device_id, key = actuator.key(), on, "actuator updated");

        let pool = self.pool.upgrade().ok_or(VirtualError::Detached)?;
        pool.try_receive_to_datapool(Message::new(actuator.key(), on))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    use datapool_app::config::PipelineConfig;
    use datapool_app::connection_bus::ConnectionBus;
    use datapool_app::executor::CallerRunsExecutor;
    use datapool_domain::connection::ConnectionState;
    use datapool_domain::value::Value;

    use super::*;

    #[derive(Default)]
    struct RecordingPublisher(Mutex<Vec<ConnectionEvent>>);

    impl ConnectionPublisher for RecordingPublisher {
        fn publish(&self, event: ConnectionEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn pool() -> Arc<DataPool> {
        Arc::new(DataPool::spawn(
            DeviceId::new(),
            Arc::new(CallerRunsExecutor::default()),
            PipelineConfig {
                poll_interval: Duration::from_millis(1),
            },
        ))
    }

    fn wait_for(pool: &DataPool, key: &str, expected: &Value) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if pool.get_value(key).as_ref() == Some(expected) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn should_attach_as_pool_handler() {
        let pool = pool();
        let robot = VirtualRobot::attach(&pool, RecordingPublisher::default());
        assert!(pool.handler().is_some());
        assert_eq!(robot.device_id(), pool.device_id());
    }

    #[test]
    fn should_echo_actuator_command_back_into_pool() {
        let pool = pool();
        let robot = VirtualRobot::attach(&pool, RecordingPublisher::default());

        assert!(pool.send_to_robot(Message::new(LIGHT_POWER, true)));
        assert!(wait_for(&pool, LIGHT_POWER, &Value::Bool(true)));
        assert_eq!(robot.is_on(LIGHT_POWER), Some(true));

        assert!(pool.send_to_robot(Message::new(LIGHT_POWER, "toggle")));
        assert!(wait_for(&pool, LIGHT_POWER, &Value::Bool(false)));
    }

    #[test]
    fn should_reject_unknown_channel() {
        let pool = pool();
        let robot = VirtualRobot::attach(&pool, RecordingPublisher::default());

        let err = robot
            .send_to_robot(&Message::new("arm.position", 3_i64))
            .unwrap_err();
        assert!(matches!(err, DataPoolError::Transport(_)));
        assert!(robot.is_on("arm.position").is_none());
    }

    #[test]
    fn should_fail_when_pool_dropped() {
        let pool = pool();
        let robot = VirtualRobot::attach(&pool, RecordingPublisher::default());
        pool.set_handler(None);
        drop(pool);

        assert!(robot.send_to_robot(&Message::new(SWITCH_POWER, true)).is_err());
    }

    #[test]
    fn should_publish_lost_then_established_on_disconnect() {
        let pool = pool();
        let publisher = Arc::new(RecordingPublisher::default());
        let robot = VirtualRobot::attach(&pool, Arc::clone(&publisher));

        robot.simulate_disconnect();

        let states: Vec<_> = publisher.0.lock().unwrap().iter().map(|e| e.state).collect();
        assert_eq!(states, vec![ConnectionState::Lost, ConnectionState::Established]);
    }

    #[tokio::test]
    async fn should_broadcast_disconnect_on_bus() {
        let pool = pool();
        let bus = ConnectionBus::new(8);
        let mut events = bus.subscribe();
        let robot = VirtualRobot::attach(&pool, bus);

        robot.simulate_disconnect();

        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::lost(pool.device_id()));
        assert_eq!(
            events.recv().await.unwrap(),
            ConnectionEvent::established(pool.device_id())
        );
    }
}

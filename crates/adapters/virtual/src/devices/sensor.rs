//! Virtual temperature sensor — a background thread feeding droppable
//! readings into a datapool.

use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use datapool_app::datapool::DataPool;
use datapool_domain::message::Message;

use super::SENSOR_TEMPERATURE;

/// Base reading in degrees Celsius.
const BASE_TEMPERATURE: f64 = 21.5;

/// Reading number `tick`: a slow sawtooth around [`BASE_TEMPERATURE`].
fn reading(tick: u32) -> f64 {
    BASE_TEMPERATURE + f64::from(tick % 10) / 10.0
}

/// A running simulated sensor. Stops when dropped.
#[derive(Debug)]
pub struct VirtualSensor {
    stop: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl VirtualSensor {
    /// Start emitting a [`SENSOR_TEMPERATURE`] reading into `pool` every
    /// `period`. The thread exits on [`stop`](Self::stop), or once the pool
    /// is stopped or dropped.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread could not be created.
    pub fn start(pool: &Arc<DataPool>, period: Duration) -> std::io::Result<Self> {
        let (stop, stopped) = bounded::<()>(0);
        let pool = Arc::downgrade(pool);
        let name = match pool.upgrade() {
            Some(pool) => format!("virtual-sensor-{}", pool.device_id().short()),
            None => "virtual-sensor".to_string(),
        };

        let worker = thread::Builder::new().name(name).spawn(move || {
            let mut tick = 0_u32;
            loop {
                match stopped.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
                if !emit(&pool, tick) {
                    break;
                }
                tick = tick.wrapping_add(1);
            }
            tracing::debug!("virtual sensor stopped");
        })?;

        Ok(Self {
            stop: Some(stop),
            worker: Some(worker),
        })
    }

    /// Stop the sensor and wait for its thread to exit.
    pub fn stop(&mut self) {
        self.stop.take();
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            tracing::error!("virtual sensor thread panicked");
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }
}

impl Drop for VirtualSensor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Push one reading. Returns `false` once the pool can no longer take any.
fn emit(pool: &Weak<DataPool>, tick: u32) -> bool {
    let Some(pool) = pool.upgrade() else {
        return false;
    };
    if pool.is_stopped() {
        return false;
    }
    pool.receive_to_datapool(Message::droppable(SENSOR_TEMPERATURE, reading(tick)));
    true
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use datapool_app::config::PipelineConfig;
    use datapool_app::executor::CallerRunsExecutor;
    use datapool_domain::id::DeviceId;
    use datapool_domain::value::Value;

    use super::*;

    fn pool() -> Arc<DataPool> {
        Arc::new(DataPool::spawn(
            DeviceId::new(),
            Arc::new(CallerRunsExecutor::default()),
            PipelineConfig {
                poll_interval: Duration::from_millis(1),
            },
        ))
    }

    #[test]
    fn should_cycle_readings_around_base_temperature() {
        assert!((reading(0) - 21.5).abs() < f64::EPSILON);
        assert!((reading(9) - 22.4).abs() < 1e-9);
        assert!((reading(10) - 21.5).abs() < f64::EPSILON);
    }

    #[test]
    fn should_publish_temperature_readings() {
        let pool = pool();
        let mut sensor = VirtualSensor::start(&pool, Duration::from_millis(2)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while pool.get_value(SENSOR_TEMPERATURE).is_none() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(matches!(
            pool.get_value(SENSOR_TEMPERATURE),
            Some(Value::Float(_))
        ));

        sensor.stop();
        assert!(!sensor.is_running());
    }

    #[test]
    fn should_exit_when_pool_stopped() {
        let pool = pool();
        let sensor = VirtualSensor::start(&pool, Duration::from_millis(1)).unwrap();
        pool.stop();

        let deadline = Instant::now() + Duration::from_secs(2);
        while sensor.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(!sensor.is_running());
    }
}

//! Role wiring — builds the car park, its displays and its sensors on top
//! of one transport session each, and spawns them.
//!
//! Start order is car park, then displays, then sensors, so every
//! subscription is in place before the first detection is published.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

use smartpark_adapter_mqtt::{MqttConfig, MqttError, MqttTransport};
use smartpark_adapter_virtual::{FileDetector, RandomDetector, VirtualDetector};
use smartpark_app::broker::{BrokerClient, InProcessBroker};
use smartpark_app::ports::{InboundMessage, Transport};
use smartpark_app::services::carpark_service::CarParkService;
use smartpark_app::services::display_service::DisplayService;
use smartpark_app::services::sensor_service::SensorService;
use smartpark_domain::carpark::CarPark;
use smartpark_domain::control::CONTROL_TOPIC;
use smartpark_domain::error::SmartParkError;
use smartpark_domain::policy::ParkingPolicy;
use smartpark_domain::topic;

use crate::config::{CarParkConfig, Config, ConfigError, DetectorKind, Role, SimulationConfig};
use crate::display::{ConsoleDisplay, DisplaySinks, SnapshotRecorder};

/// Inbound buffer of an in-process session.
const MEMORY_CHANNEL_CAPACITY: usize = 64;

/// Payload sent on the control topic to stop every role.
const QUIT_PAYLOAD: &str = "quit";

/// Where sessions are opened.
#[derive(Clone)]
pub enum Link {
    Mqtt,
    Memory(InProcessBroker),
}

/// One device's transport session.
#[derive(Clone)]
pub enum Session {
    Mqtt(MqttTransport),
    Memory(Arc<BrokerClient>),
}

impl Transport for Session {
    async fn subscribe(&self, topic: &str) -> Result<(), SmartParkError> {
        match self {
            Self::Mqtt(t) => t.subscribe(topic).await,
            Self::Memory(c) => c.subscribe(topic).await,
        }
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), SmartParkError> {
        match self {
            Self::Mqtt(t) => t.unsubscribe(topic).await,
            Self::Memory(c) => c.unsubscribe(topic).await,
        }
    }

    async fn publish(&self, topic: &str, payload: &str) -> Result<(), SmartParkError> {
        match self {
            Self::Mqtt(t) => t.publish(topic, payload).await,
            Self::Memory(c) => c.publish(topic, payload).await,
        }
    }

    async fn disconnect(&self) -> Result<(), SmartParkError> {
        match self {
            Self::Mqtt(t) => t.disconnect().await,
            Self::Memory(c) => c.disconnect().await,
        }
    }
}

/// Detector for one sensor. Seeded runs give every sensor its own stream.
fn detector(sim: &SimulationConfig, offset: u64) -> Result<Option<VirtualDetector>, StartupError> {
    let detector = match sim.detector {
        DetectorKind::None => return Ok(None),
        DetectorKind::Random => {
            let config = sim.random_detector();
            VirtualDetector::Random(match sim.seed {
                Some(seed) => RandomDetector::seeded(config, seed.wrapping_add(offset)),
                None => RandomDetector::new(config),
            })
        }
        DetectorKind::File => {
            let replay =
                FileDetector::open(&sim.signals_file).map_err(|source| StartupError::Signals {
                    path: sim.signals_file.display().to_string(),
                    source,
                })?;
            VirtualDetector::File(replay.with_interval(Duration::from_millis(sim.min_interval_ms)))
        }
    };
    Ok(Some(detector))
}

/// Errors that stop the daemon before any role runs.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to open MQTT session")]
    Mqtt(#[from] MqttError),
    #[error("failed to set up subscriptions")]
    Transport(#[from] SmartParkError),
    #[error("failed to open signals file {path}")]
    Signals {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to open record file {path}")]
    Recorder {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Every role running in this process, plus the sessions they use.
pub struct Deployment {
    role: Role,
    tasks: JoinSet<()>,
    sessions: Vec<Session>,
    drivers: Vec<JoinHandle<()>>,
}

impl Deployment {
    /// Open the sessions for `config.runtime.role` on the selected car park
    /// and spawn every role.
    ///
    /// # Errors
    ///
    /// Returns a [`StartupError`] when the car park is unknown, a session
    /// cannot be opened, a subscription fails, or a file cannot be opened.
    pub async fn start(config: &Config, link: Link) -> Result<Self, StartupError> {
        let car_park = config.selected_car_park()?;
        let role = config.runtime.role;
        let mut deployment = Self {
            role,
            tasks: JoinSet::new(),
            sessions: Vec::new(),
            drivers: Vec::new(),
        };

        if matches!(role, Role::CarPark | Role::All) {
            deployment.start_car_park(config, car_park, &link).await?;
        }
        if matches!(role, Role::Display | Role::All) {
            deployment.start_displays(config, car_park, &link).await?;
        }
        if matches!(role, Role::Sensor | Role::All) {
            deployment.start_sensors(config, car_park, &link).await?;
        }

        if deployment.tasks.is_empty() {
            tracing::warn!(car_park = %car_park.name, ?role, "nothing to run");
        }
        Ok(deployment)
    }

    /// Open a session for one device. `mqtt` names the broker and the
    /// client id; only the id is used in process.
    fn open(
        &mut self,
        link: &Link,
        mqtt: &MqttConfig,
    ) -> Result<(Session, mpsc::Receiver<InboundMessage>), StartupError> {
        let (session, inbound) = match link {
            Link::Mqtt => {
                let (transport, inbound, driver) = MqttTransport::connect(mqtt)?;
                self.drivers.push(driver);
                (Session::Mqtt(transport), inbound)
            }
            Link::Memory(broker) => {
                let (client, inbound) = broker.connect(MEMORY_CHANNEL_CAPACITY);
                tracing::debug!(client_id = %mqtt.client_id, "in-process session opened");
                (Session::Memory(Arc::new(client)), inbound)
            }
        };
        self.sessions.push(session.clone());
        Ok((session, inbound))
    }

    async fn start_car_park(
        &mut self,
        config: &Config,
        car_park: &CarParkConfig,
        link: &Link,
    ) -> Result<(), StartupError> {
        let (session, inbound) = self.open(link, &car_park.mqtt(car_park.name.clone()))?;

        let sim = &config.simulation;
        let policy = match sim.seed {
            Some(seed) => ParkingPolicy::seeded(seed, sim.car_models.clone()),
            None => ParkingPolicy::new(sim.car_models.clone()),
        }
        .with_tie_break(sim.tie_break);

        let mut service = CarParkService::new(
            car_park.name.clone(),
            CarPark::new(car_park.total_bays()),
            policy,
            session,
            car_park.display_topic(),
        );
        service.subscribe_control().await?;
        for sensor_topic in config.sensor_pub_topics(&car_park.name)? {
            service.register_sensor_topic(&sensor_topic).await?;
        }

        tracing::info!(
            car_park = %car_park.name,
            location = %car_park.location,
            bays = car_park.total_bays,
            display_topic = %service.display_topic(),
            "car park ready"
        );
        self.tasks.spawn(async move { service.run(inbound).await });
        Ok(())
    }

    async fn start_displays(
        &mut self,
        config: &Config,
        car_park: &CarParkConfig,
        link: &Link,
    ) -> Result<(), StartupError> {
        let display_topic = car_park.display_topic();

        for device in config.display_configs(&car_park.name)? {
            let client_id = format!("{}-{}", car_park.name, device.name());
            let (session, inbound) = self.open(link, &device.mqtt(client_id))?;

            let title = format!("{} @ {}", car_park.name, device.address.location);
            let mut sinks = DisplaySinks::new().with(ConsoleDisplay::stdout(title));
            if let Some(path) = &config.simulation.record_file {
                let recorder =
                    SnapshotRecorder::open(path).map_err(|source| StartupError::Recorder {
                        path: path.display().to_string(),
                        source,
                    })?;
                sinks = sinks.with(recorder);
            }

            let mut service = DisplayService::new(device.name(), display_topic.clone(), sinks);
            service.subscribe(&session).await?;

            tracing::info!(display = %device.name(), topic = %device.topic(), "display ready");
            self.tasks.spawn(async move {
                service.run(inbound).await;
                if let Err(err) = session.disconnect().await {
                    tracing::warn!(%err, "display disconnect failed");
                }
            });
        }
        Ok(())
    }

    async fn start_sensors(
        &mut self,
        config: &Config,
        car_park: &CarParkConfig,
        link: &Link,
    ) -> Result<(), StartupError> {
        let sim = &config.simulation;
        if sim.detector == DetectorKind::None {
            tracing::info!(car_park = %car_park.name, "sensors disabled");
            return Ok(());
        }

        for (offset, sensor) in (1_u64..).zip(config.selected_sensors(&car_park.name)?) {
            let Some(mut detector) = detector(sim, offset)? else {
                continue;
            };
            let client_id = format!("{}-{}-{}", car_park.name, sensor.name(), sensor.qualifier());
            let (session, inbound) = self.open(link, &sensor.mqtt(client_id))?;

            let service = SensorService::new(sensor.name(), session);
            let service = if sensor.qualifier() == topic::ENTRY {
                service.with_entry_topic(sensor.topic())
            } else {
                service.with_exit_topic(sensor.topic())
            };
            service.subscribe_control().await?;

            tracing::info!(sensor = %sensor.name(), topic = %sensor.topic(), "sensor ready");
            self.tasks.spawn(service.stop_handle().stop_on_quit(inbound));
            self.tasks.spawn(async move {
                service.run(&mut detector).await;
            });
        }
        Ok(())
    }

    /// Number of spawned role tasks still tracked.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for every role task to end.
    pub async fn finished(&mut self) {
        while let Some(result) = self.tasks.join_next().await {
            if let Err(err) = result
                && !err.is_cancelled()
            {
                tracing::error!(%err, "role task failed");
            }
        }
    }

    /// React to an interrupt.
    ///
    /// A process running every role sends quit on the control topic so the
    /// whole simulation stops the way a remote quit would. A single-role
    /// process only stops itself.
    ///
    /// # Errors
    ///
    /// Returns the transport error when the quit publish fails.
    pub async fn interrupt(&mut self) -> Result<(), SmartParkError> {
        if self.role == Role::All {
            if let Some(session) = self.sessions.first() {
                session.publish(CONTROL_TOPIC, QUIT_PAYLOAD).await?;
            }
            return Ok(());
        }
        self.tasks.abort_all();
        self.disconnect_all().await;
        Ok(())
    }

    /// Release whatever is left: abort roles still running, disconnect
    /// their sessions, and give the MQTT drivers `grace` to say goodbye.
    pub async fn close(mut self, grace: Duration) {
        if !self.tasks.is_empty() {
            tracing::warn!(remaining = self.tasks.len(), "aborting roles still running");
            self.tasks.abort_all();
            self.finished().await;
            self.disconnect_all().await;
        }

        let drivers = async {
            for driver in &mut self.drivers {
                let _ = driver.await;
            }
        };
        if tokio::time::timeout(grace, drivers).await.is_err() {
            tracing::warn!("MQTT sessions did not close in time");
            for driver in &self.drivers {
                driver.abort();
            }
        }
    }

    async fn disconnect_all(&self) {
        for session in &self.sessions {
            if let Err(err) = session.disconnect().await {
                tracing::debug!(%err, "session already closed");
            }
        }
    }
}

//! Sensor hub: forms a Zigbee network, pairs sensors, records readings

use anyhow::Context;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zigbee_core::{DeviceRegistry, Endpoint, ReadingRecorder};
use zstack_protocol::{format_ieee, zcl, AfPacket, MtClient, Reading, UartTransport, ZdoPacket};

/// How long the network stays open for pairing after startup
const PERMIT_JOIN_SECONDS: u8 = 60;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sensor_hub=debug,zstack_protocol=info,info".into()),
        )
        .init();

    tracing::info!("Starting sensor hub");

    let serial_path =
        std::env::var("SERIAL_PORT").unwrap_or_else(|_| "/dev/ttyUSB0".to_string());
    let data_dir =
        PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string()));

    let registry = Rc::new(RefCell::new(DeviceRegistry::open(
        data_dir.join("devices.json"),
    )));
    let temperatures = Rc::new(ReadingRecorder::new(
        data_dir.join("temperature_readings.txt"),
    ));
    let humidities = Rc::new(ReadingRecorder::new(data_dir.join("humidity_readings.txt")));

    let mut client = MtClient::connect(&serial_path)
        .with_context(|| format!("opening serial port {serial_path}"))?;

    // Bring the radio up: reset, register our endpoint, form the network
    client.reset()?;

    if let Some(version) = client.get_system_version()? {
        tracing::info!("Radio firmware {}", version);
    }

    if !client.register_endpoint()? {
        tracing::warn!("Endpoint registration failed, continuing anyway");
    }

    if !client.start_network()? {
        anyhow::bail!("network did not reach coordinator state");
    }

    let info = client
        .get_device_info()?
        .context("radio returned no device info")?;
    tracing::info!(
        "Coordinator IEEE {} short {:#06X}",
        format_ieee(&info.ieee),
        info.short_addr
    );
    let my_ieee = info.ieee;

    client.permit_join(PERMIT_JOIN_SECONDS)?;

    // Discovery chain: announcement -> active endpoints -> simple
    // descriptor -> bind + configure reporting for the sensor clusters.
    {
        let registry = Rc::clone(&registry);
        client.set_zdo_handler(move |client, packet| match packet {
            ZdoPacket::DeviceAnnouncement { src, ieee, .. } => {
                registry.borrow_mut().record_announcement(ieee, src);
                if let Err(e) = client.fetch_active_endpoints(src) {
                    tracing::warn!("Failed to query endpoints of {:#06X}: {}", src, e);
                }
            }

            ZdoPacket::ActiveEndpoints { src, endpoints, .. } => {
                tracing::info!("Active endpoints of {:#06X}: {:?}", src, endpoints);
                match endpoints.first() {
                    Some(&endpoint) => {
                        if let Err(e) = client.fetch_simple_descriptor(src, endpoint) {
                            tracing::warn!("Failed to query descriptor of {:#06X}: {}", src, e);
                        }
                    }
                    None => tracing::info!("Device {:#06X} reported no endpoints", src),
                }
            }

            ZdoPacket::SimpleDescriptor {
                src,
                endpoint,
                profile_id,
                device_id,
                in_clusters,
                out_clusters,
                ..
            } => {
                tracing::info!(
                    "Descriptor of {:#06X} endpoint {}: in={:04X?} out={:04X?}",
                    src,
                    endpoint,
                    in_clusters,
                    out_clusters
                );

                registry.borrow_mut().set_endpoint(
                    src,
                    Endpoint {
                        id: endpoint,
                        profile_id,
                        device_id,
                        in_clusters: in_clusters.clone(),
                        out_clusters: out_clusters.clone(),
                    },
                );
                let target_ieee = registry
                    .borrow()
                    .device_by_short(src)
                    .map(|d| d.ieee_wire_bytes());
                let Some(target_ieee) = target_ieee else {
                    tracing::debug!("Descriptor from unannounced device {:#06X}", src);
                    return;
                };

                let sensor_clusters = [
                    (zcl::cluster::TEMPERATURE_MEASUREMENT, zcl::data_type::INT16),
                    (zcl::cluster::HUMIDITY_MEASUREMENT, zcl::data_type::UINT16),
                ];
                for (cluster_id, data_type) in sensor_clusters {
                    if !in_clusters.contains(&cluster_id) {
                        continue;
                    }
                    subscribe_cluster(client, src, &target_ieee, &my_ieee, cluster_id, data_type);
                }
            }

            ZdoPacket::BindResponse { src, success } => {
                if success {
                    tracing::info!("Bind confirmed by {:#06X}", src);
                } else {
                    tracing::warn!("Bind refused by {:#06X}", src);
                }
            }

            ZdoPacket::PermitJoinAck => tracing::debug!("Permit-join acknowledged"),
            ZdoPacket::TrustCenterDeviceInd => {
                tracing::debug!("Trust center reports a device joining");
            }
        });
    }

    // Readings: log, track liveness, and append to the time-series files
    {
        let registry = Rc::clone(&registry);
        let temperatures = Rc::clone(&temperatures);
        let humidities = Rc::clone(&humidities);
        client.set_af_handler(move |_, packet| {
            let AfPacket::IncomingMessage { src, reading, .. } = packet;
            registry.borrow_mut().touch(src);
            let name = registry.borrow().name_of(src);

            match reading {
                Reading::Temperature { celsius, .. } => {
                    tracing::info!("[{}] Temperature: {:.2} C", name, celsius);
                    temperatures.record(celsius);
                }
                Reading::Humidity { percent, .. } => {
                    tracing::info!("[{}] Humidity: {:.2} %", name, percent);
                    humidities.record(percent);
                }
                Reading::Battery { percent, .. } => {
                    tracing::info!("[{}] Battery: {:.1} %", name, percent);
                }
                Reading::OnOff { is_on, .. } => {
                    tracing::info!("[{}] State: {}", name, if is_on { "on" } else { "off" });
                }
                Reading::ActivePower { watts, .. } => {
                    tracing::info!("[{}] Active power: {} W", name, watts);
                }
                Reading::ButtonPress { .. } => {
                    tracing::info!("[{}] Button pressed", name);
                }
            }
        });
    }

    tracing::info!("Main loop started");
    loop {
        if let Err(e) = client.process() {
            tracing::error!("Pump error: {}", e);
        }
        thread::sleep(Duration::from_millis(10));
    }
}

/// Bind a sensor cluster to us, configure its reporting, and ask for a
/// first reading. Each step logs its own failure; none is fatal.
fn subscribe_cluster(
    client: &mut MtClient<UartTransport>,
    src: u16,
    target_ieee: &[u8; 8],
    my_ieee: &[u8; 8],
    cluster_id: u16,
    data_type: u8,
) {
    match client.bind_device(src, target_ieee, cluster_id, my_ieee) {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!("Bind rejected for cluster {:#06X} on {:#06X}", cluster_id, src);
            return;
        }
        Err(e) => {
            tracing::warn!("Bind failed for cluster {:#06X} on {:#06X}: {}", cluster_id, src, e);
            return;
        }
    }

    match client.configure_reporting(src, cluster_id, data_type) {
        Ok(true) => {
            if let Err(e) = client.read_reporting_config(src, cluster_id) {
                tracing::debug!("Reporting audit failed: {}", e);
            }
        }
        Ok(false) => tracing::warn!("Reporting rejected for cluster {:#06X}", cluster_id),
        Err(e) => tracing::warn!("Reporting setup failed for cluster {:#06X}: {}", cluster_id, e),
    }

    // First datapoint without waiting for the report interval
    let requested = match cluster_id {
        zcl::cluster::TEMPERATURE_MEASUREMENT => client.request_temperature(src),
        zcl::cluster::HUMIDITY_MEASUREMENT => client.request_humidity(src),
        _ => return,
    };
    if let Err(e) = requested {
        tracing::debug!("Initial read failed for cluster {:#06X}: {}", cluster_id, e);
    }
}

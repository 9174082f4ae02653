//! MT client: request/response correlation and frame dispatch
//!
//! One owning thread drives all I/O. `process` is the cooperative pump;
//! `send_and_wait` blocks by draining the same parser until the expected
//! reply arrives or the deadline passes. A frame either satisfies a pending
//! wait or goes to a subscribed handler, never both.

use crate::af::{self, AfPacket};
use crate::commands::{
    af as af_cmd, cmd0, command_name, sys, util, zdo as zdo_cmd, CommandType, Subsystem,
};
use crate::frame::MtFrame;
use crate::parser::Parser;
use crate::transport::{SerialTransport, UartTransport};
use crate::types::{DeviceInfo, NetworkState, ProtocolError, SysVersion};
use crate::zcl;
use crate::zdo::{self, ZdoPacket};

use std::thread;
use std::time::{Duration, Instant};

/// Default reply timeout for synchronous requests
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Pause between empty reads while waiting, to avoid busy-spinning
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long the radio gets to confirm a soft reset
const RESET_CONFIRM_TIMEOUT: Duration = Duration::from_secs(5);

/// Settle time after a reset before the radio accepts commands again
const RESET_SETTLE: Duration = Duration::from_secs(1);

/// Per-attempt wait for the ZDO_STARTUP_FROM_APP acknowledgement
const STARTUP_ACK_TIMEOUT: Duration = Duration::from_secs(3);

/// Wait for the coordinator state-change indication after startup
const STATE_CHANGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Handler for decoded ZDO packets
pub type ZdoHandler<T> = Box<dyn FnMut(&mut MtClient<T>, ZdoPacket)>;

/// Handler for decoded AF packets
pub type AfHandler<T> = Box<dyn FnMut(&mut MtClient<T>, AfPacket)>;

/// Client for a Z-Stack coordinator radio on a serial transport
///
/// Owns the transport exclusively. Handlers run on the pump thread and
/// receive `&mut self` back, so they may issue further requests.
pub struct MtClient<T: SerialTransport> {
    transport: T,
    parser: Parser,
    zcl_seq: u8,
    zdo_handler: Option<ZdoHandler<T>>,
    af_handler: Option<AfHandler<T>>,
}

impl MtClient<UartTransport> {
    /// Open the serial device at `path` and wrap it in a client
    pub fn connect(path: &str) -> Result<Self, ProtocolError> {
        Ok(Self::new(UartTransport::open(path)?))
    }
}

impl<T: SerialTransport> MtClient<T> {
    /// Build a client over an already-open transport
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            parser: Parser::new(),
            zcl_seq: 0,
            zdo_handler: None,
            af_handler: None,
        }
    }

    /// Close the underlying transport
    pub fn close(self) {
        drop(self);
    }

    /// Install the handler for decoded ZDO packets; replaces any previous one
    pub fn set_zdo_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&mut MtClient<T>, ZdoPacket) + 'static,
    {
        self.zdo_handler = Some(Box::new(handler));
    }

    /// Install the handler for decoded AF packets; replaces any previous one
    pub fn set_af_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&mut MtClient<T>, AfPacket) + 'static,
    {
        self.af_handler = Some(Box::new(handler));
    }

    /// Fire-and-forget: serialize and write a frame
    pub fn send(&mut self, frame: &MtFrame) -> Result<(), ProtocolError> {
        let bytes = frame.serialize()?;
        tracing::debug!(
            "Tx {} ({} bytes)",
            command_name(frame.cmd0, frame.cmd1),
            bytes.len()
        );
        self.transport.write(&bytes)?;
        Ok(())
    }

    /// Send a request and wait for the reply matching `(expected_cmd0, expected_cmd1)`
    ///
    /// Returns `Ok(None)` on timeout. Frames produced while waiting that do
    /// not match are dispatched to handlers in arrival order.
    pub fn send_and_wait(
        &mut self,
        request: &MtFrame,
        expected_cmd0: u8,
        expected_cmd1: u8,
        timeout: Duration,
    ) -> Result<Option<MtFrame>, ProtocolError> {
        self.send(request)?;
        self.wait_for_frame(expected_cmd0, expected_cmd1, timeout)
    }

    /// Drain the parser until a matching frame arrives or `timeout` passes
    pub fn wait_for_frame(
        &mut self,
        expected_cmd0: u8,
        expected_cmd1: u8,
        timeout: Duration,
    ) -> Result<Option<MtFrame>, ProtocolError> {
        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; 256];

        loop {
            let n = self.transport.read(&mut buf)?;
            let mut matched: Option<MtFrame> = None;

            for &byte in &buf[..n] {
                if let Some(frame) = self.parser.push_byte(byte) {
                    if matched.is_none()
                        && frame.cmd0 == expected_cmd0
                        && frame.cmd1 == expected_cmd1
                    {
                        matched = Some(frame);
                    } else {
                        // Not ours: hand it to whoever subscribed, keeping
                        // arrival order ahead of our own return.
                        self.dispatch(frame);
                    }
                }
            }

            if matched.is_some() {
                return Ok(matched);
            }
            if Instant::now() >= deadline {
                tracing::debug!(
                    "Timed out waiting for {}",
                    command_name(expected_cmd0, expected_cmd1)
                );
                return Ok(None);
            }
            if n == 0 {
                thread::sleep(POLL_INTERVAL);
            }
        }
    }

    /// Non-blocking single pass: read available bytes, dispatch every frame
    pub fn process(&mut self) -> Result<(), ProtocolError> {
        let mut buf = [0u8; 256];
        let n = self.transport.read(&mut buf)?;
        let frames = self.parser.feed(&buf[..n]);
        for frame in frames {
            self.dispatch(frame);
        }
        Ok(())
    }

    /// Route a completed frame by subsystem
    fn dispatch(&mut self, frame: MtFrame) {
        tracing::debug!(
            "Rx {} (len {})",
            command_name(frame.cmd0, frame.cmd1),
            frame.payload.len()
        );

        match frame.subsystem() {
            Some(Subsystem::Zdo) => {
                if let Some(packet) = zdo::decode(&frame) {
                    self.deliver_zdo(packet);
                }
            }
            Some(Subsystem::Af) => {
                if let Some(packet) = af::decode(&frame) {
                    self.deliver_af(packet);
                }
            }
            _ => {
                tracing::debug!(
                    "Pass-through frame for subsystem {:?}",
                    frame.subsystem()
                );
            }
        }
    }

    fn deliver_zdo(&mut self, packet: ZdoPacket) {
        if let Some(mut handler) = self.zdo_handler.take() {
            handler(self, packet);
            // The handler may have installed a replacement while it ran
            if self.zdo_handler.is_none() {
                self.zdo_handler = Some(handler);
            }
        } else {
            tracing::debug!("No ZDO handler registered, dropping packet");
        }
    }

    fn deliver_af(&mut self, packet: AfPacket) {
        if let Some(mut handler) = self.af_handler.take() {
            handler(self, packet);
            if self.af_handler.is_none() {
                self.af_handler = Some(handler);
            }
        } else {
            tracing::debug!("No AF handler registered, dropping packet");
        }
    }

    fn next_zcl_seq(&mut self) -> u8 {
        self.zcl_seq = self.zcl_seq.wrapping_add(1);
        self.zcl_seq
    }

    /// `Some(frame)` with a leading zero status byte means the radio accepted
    fn srsp_status_ok(rsp: Option<&MtFrame>) -> bool {
        matches!(rsp.and_then(|f| f.payload.first()), Some(0))
    }

    // --- high-level commands -------------------------------------------

    /// Soft-reset the radio and wait for it to come back
    pub fn reset(&mut self) -> Result<(), ProtocolError> {
        tracing::info!("Resetting radio (soft reset)");

        let req = MtFrame::command(CommandType::Areq, Subsystem::Sys, sys::RESET_REQ, vec![0x01]);
        self.send(&req)?;

        match self.wait_for_frame(
            cmd0(CommandType::Areq, Subsystem::Sys),
            sys::RESET_IND,
            RESET_CONFIRM_TIMEOUT,
        )? {
            Some(_) => tracing::info!("Reset confirmed"),
            None => tracing::warn!("No reset confirmation received, proceeding anyway"),
        }

        // Radio firmware reinitializes after the indication
        thread::sleep(RESET_SETTLE);
        Ok(())
    }

    /// Query the radio firmware version
    pub fn get_system_version(&mut self) -> Result<Option<SysVersion>, ProtocolError> {
        let req = MtFrame::command(CommandType::Sreq, Subsystem::Sys, sys::VERSION, vec![]);
        let rsp = self.send_and_wait(
            &req,
            cmd0(CommandType::Srsp, Subsystem::Sys),
            sys::VERSION,
            Duration::from_secs(5),
        )?;
        Ok(rsp.and_then(|f| SysVersion::parse(&f.payload)))
    }

    /// Register our application endpoint (endpoint 1, Home Automation)
    ///
    /// Declares temperature and humidity measurement as output clusters so
    /// bound sensors report to us.
    pub fn register_endpoint(&mut self) -> Result<bool, ProtocolError> {
        tracing::info!("Registering endpoint 1 (Home Automation)");

        let mut payload = vec![0x01]; // endpoint id
        payload.extend_from_slice(&zcl::HA_PROFILE.to_le_bytes());
        payload.extend_from_slice(&0x0007u16.to_le_bytes()); // configuration tool
        payload.push(0x00); // device version
        payload.push(0x00); // latency: none
        payload.push(0x00); // input cluster count
        payload.push(0x02); // output cluster count
        payload.extend_from_slice(&zcl::cluster::TEMPERATURE_MEASUREMENT.to_le_bytes());
        payload.extend_from_slice(&zcl::cluster::HUMIDITY_MEASUREMENT.to_le_bytes());

        let req = MtFrame::command(CommandType::Sreq, Subsystem::Af, af_cmd::REGISTER, payload);
        let rsp = self.send_and_wait(
            &req,
            cmd0(CommandType::Srsp, Subsystem::Af),
            af_cmd::REGISTER,
            DEFAULT_TIMEOUT,
        )?;

        let ok = Self::srsp_status_ok(rsp.as_ref());
        if ok {
            tracing::info!("Endpoint registered");
        } else {
            tracing::warn!("Endpoint registration rejected");
        }
        Ok(ok)
    }

    /// Form the network and wait until the radio reports coordinator state
    ///
    /// Retries the startup request up to three times, then watches for the
    /// state-change indication; if the indication is lost, falls back to
    /// polling device info.
    pub fn start_network(&mut self) -> Result<bool, ProtocolError> {
        // Give the bus a moment after the previous command
        thread::sleep(Duration::from_millis(100));

        tracing::info!("Starting network");
        // 100 ms start delay
        let req = MtFrame::command(
            CommandType::Sreq,
            Subsystem::Zdo,
            zdo_cmd::STARTUP_FROM_APP,
            vec![0x64, 0x00],
        );

        let mut accepted = false;
        for attempt in 1..=3 {
            tracing::debug!("Startup attempt {}", attempt);
            let ack = self.send_and_wait(
                &req,
                cmd0(CommandType::Srsp, Subsystem::Zdo),
                zdo_cmd::STARTUP_FROM_APP,
                STARTUP_ACK_TIMEOUT,
            )?;
            if ack.is_some() {
                accepted = true;
                break;
            }
            tracing::debug!("No startup acknowledgement, retrying");
            thread::sleep(Duration::from_millis(500));
        }

        if !accepted {
            tracing::warn!("Radio never acknowledged the startup request");
            return Ok(false);
        }

        // Fast path: the radio announces the state change
        if let Some(ind) = self.wait_for_frame(
            cmd0(CommandType::Areq, Subsystem::Zdo),
            zdo_cmd::STATE_CHANGE_IND,
            STATE_CHANGE_TIMEOUT,
        )? {
            if ind.payload.first().map(|&s| NetworkState::from_u8(s))
                == Some(NetworkState::Coordinator)
            {
                tracing::info!("Network up (state-change indication)");
                return Ok(true);
            }
        }

        // Indication lost or carried another state: ask directly
        tracing::debug!("No coordinator state change observed, polling device info");
        if let Some(info) = self.get_device_info()? {
            if info.state == NetworkState::Coordinator {
                tracing::info!("Network up (polled device state)");
                return Ok(true);
            }
            tracing::warn!("Radio in state {:?} after startup", info.state);
        }

        Ok(false)
    }

    /// Query the coordinator's identity and network state
    pub fn get_device_info(&mut self) -> Result<Option<DeviceInfo>, ProtocolError> {
        let req = MtFrame::command(
            CommandType::Sreq,
            Subsystem::Util,
            util::GET_DEVICE_INFO,
            vec![],
        );
        let rsp = self.send_and_wait(
            &req,
            cmd0(CommandType::Srsp, Subsystem::Util),
            util::GET_DEVICE_INFO,
            DEFAULT_TIMEOUT,
        )?;
        Ok(rsp.and_then(|f| DeviceInfo::parse(&f.payload)))
    }

    /// Open the network for joining for `seconds` (0 closes, 255 leaves open)
    pub fn permit_join(&mut self, seconds: u8) -> Result<bool, ProtocolError> {
        tracing::info!("Permitting join for {} seconds", seconds);

        // 16-bit address mode, broadcast to all routers and the coordinator,
        // no trust-center significance
        let payload = vec![0x02, 0xFC, 0xFF, seconds, 0x00];
        let req = MtFrame::command(
            CommandType::Sreq,
            Subsystem::Zdo,
            zdo_cmd::MGMT_PERMIT_JOIN_REQ,
            payload,
        );
        let rsp = self.send_and_wait(
            &req,
            cmd0(CommandType::Srsp, Subsystem::Zdo),
            zdo_cmd::MGMT_PERMIT_JOIN_REQ,
            DEFAULT_TIMEOUT,
        )?;

        let ok = Self::srsp_status_ok(rsp.as_ref());
        if ok {
            tracing::info!("Join enabled, devices can pair now");
        } else {
            tracing::warn!("Failed to enable joining");
        }
        Ok(ok)
    }

    /// Bind a device's cluster to our endpoint so it reports to us
    ///
    /// IEEE addresses are little-endian byte slices, as they arrive in a
    /// device announcement.
    pub fn bind_device(
        &mut self,
        target_short_addr: u16,
        target_ieee: &[u8; 8],
        cluster_id: u16,
        my_ieee: &[u8; 8],
    ) -> Result<bool, ProtocolError> {
        tracing::info!(
            "Binding cluster {:#06X} on {:#06X}",
            cluster_id,
            target_short_addr
        );

        let mut payload = Vec::with_capacity(23);
        payload.extend_from_slice(&target_short_addr.to_le_bytes());
        payload.extend_from_slice(target_ieee);
        payload.push(0x01); // source endpoint on the device
        payload.extend_from_slice(&cluster_id.to_le_bytes());
        payload.push(0x03); // destination address mode: 64-bit IEEE
        payload.extend_from_slice(my_ieee);
        payload.push(0x01); // our endpoint

        let req = MtFrame::command(CommandType::Sreq, Subsystem::Zdo, zdo_cmd::BIND_REQ, payload);
        let rsp = self.send_and_wait(
            &req,
            cmd0(CommandType::Srsp, Subsystem::Zdo),
            zdo_cmd::BIND_REQ,
            DEFAULT_TIMEOUT,
        )?;

        let ok = Self::srsp_status_ok(rsp.as_ref());
        if !ok {
            tracing::warn!("Bind request rejected for cluster {:#06X}", cluster_id);
        }
        Ok(ok)
    }

    /// Ask a device for its active endpoints; the answer arrives as an
    /// asynchronous `ActiveEndpoints` packet
    pub fn fetch_active_endpoints(&mut self, short_addr: u16) -> Result<(), ProtocolError> {
        tracing::debug!("Fetching active endpoints for {:#06X}", short_addr);

        let mut payload = Vec::with_capacity(4);
        payload.extend_from_slice(&short_addr.to_le_bytes()); // target
        payload.extend_from_slice(&short_addr.to_le_bytes()); // NWK of interest

        let req = MtFrame::command(
            CommandType::Sreq,
            Subsystem::Zdo,
            zdo_cmd::ACTIVE_EP_REQ,
            payload,
        );
        self.send(&req)
    }

    /// Ask a device to describe one endpoint; the answer arrives as an
    /// asynchronous `SimpleDescriptor` packet
    pub fn fetch_simple_descriptor(
        &mut self,
        short_addr: u16,
        endpoint: u8,
    ) -> Result<(), ProtocolError> {
        tracing::debug!(
            "Fetching simple descriptor for {:#06X} endpoint {}",
            short_addr,
            endpoint
        );

        let mut payload = Vec::with_capacity(5);
        payload.extend_from_slice(&short_addr.to_le_bytes()); // NWK of interest
        payload.extend_from_slice(&short_addr.to_le_bytes()); // target
        payload.push(endpoint);

        let req = MtFrame::command(
            CommandType::Sreq,
            Subsystem::Zdo,
            zdo_cmd::SIMPLE_DESC_REQ,
            payload,
        );
        self.send(&req)
    }

    // --- ZCL over AF_DATA_REQUEST --------------------------------------

    /// Ask a device for its current temperature
    pub fn request_temperature(&mut self, short_addr: u16) -> Result<bool, ProtocolError> {
        let seq = self.next_zcl_seq();
        let req = zcl::read_temperature(short_addr, seq);
        self.send_af_request(&req)
    }

    /// Ask a device for its current humidity
    pub fn request_humidity(&mut self, short_addr: u16) -> Result<bool, ProtocolError> {
        let seq = self.next_zcl_seq();
        let req = zcl::read_humidity(short_addr, seq);
        self.send_af_request(&req)
    }

    /// Configure periodic reporting of MeasuredValue on a cluster
    pub fn configure_reporting(
        &mut self,
        short_addr: u16,
        cluster_id: u16,
        data_type: u8,
    ) -> Result<bool, ProtocolError> {
        tracing::info!(
            "Configuring reporting on {:#06X} for cluster {:#06X}",
            short_addr,
            cluster_id
        );
        let seq = self.next_zcl_seq();
        let req = zcl::configure_reporting(short_addr, cluster_id, data_type, seq);
        self.send_af_request(&req)
    }

    /// Audit a device's reporting configuration for a cluster
    pub fn read_reporting_config(
        &mut self,
        short_addr: u16,
        cluster_id: u16,
    ) -> Result<bool, ProtocolError> {
        let seq = self.next_zcl_seq();
        let req = zcl::read_reporting_config(short_addr, cluster_id, seq);
        self.send_af_request(&req)
    }

    /// Send an AF_DATA_REQUEST and check the radio accepted it
    fn send_af_request(&mut self, request: &MtFrame) -> Result<bool, ProtocolError> {
        let rsp = self.send_and_wait(
            request,
            cmd0(CommandType::Srsp, Subsystem::Af),
            af_cmd::DATA_REQUEST,
            DEFAULT_TIMEOUT,
        )?;
        Ok(Self::srsp_status_ok(rsp.as_ref()))
    }
}

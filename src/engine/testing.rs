//! Fake collaborators and a message pump for engine unit tests.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use super::{Backends, Engine};
use crate::backend::*;
use crate::codec::WireWriter;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::event::{BackendEvent, Dispatch, EventSender, PcoCompletion};
use crate::message::IF_NAME_LEN;
use crate::model::{DedicateBearerProperties, QosStatus, TftStatus};
use crate::protocol::{msg_id, Frame};

#[derive(Default)]
pub struct BearerScript {
    pub enable_result: i32,
    pub disable_result: i32,
    pub abort_result: i32,
    pub modify_result: i32,
    pub pco_fails: bool,
    pub default_props: HashMap<String, DedicateBearerProperties>,
    pub link_props: HashMap<String, LinkProperties>,
    pub last_fail_cause: i32,
    pub deactivated: Option<Vec<i32>>,
    pub dedicated_cids: Vec<i32>,
    pub pco: Vec<PcoCompletion>,
    pub calls: Vec<String>,
    pub configs: Vec<(String, DefaultBearerConfig)>,
}

#[derive(Default)]
pub struct FakeBearer {
    state: Mutex<BearerScript>,
}

impl FakeBearer {
    pub fn set(&self, f: impl FnOnce(&mut BearerScript)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn configs(&self) -> Vec<(String, DefaultBearerConfig)> {
        self.state.lock().unwrap().configs.clone()
    }

    pub fn take_pco(&self) -> Vec<PcoCompletion> {
        std::mem::take(&mut self.state.lock().unwrap().pco)
    }

    fn handle(&self, call: String, pick: impl FnOnce(&BearerScript) -> i32) -> Result<BearerHandle> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        Ok(pick(&state))
    }
}

impl BearerControlBackend for FakeBearer {
    fn enable_dedicated_bearer(&self, apn: &str, signaling: bool, _qos: &QosStatus, _tft: &TftStatus) -> Result<BearerHandle> {
        self.handle(format!("enable {apn} {signaling}"), |s| s.enable_result)
    }

    fn disable_dedicated_bearer(&self, reason: &str, cid: i32) -> Result<BearerHandle> {
        self.handle(format!("disable {reason} {cid}"), |s| s.disable_result)
    }

    fn abort_enable_dedicated_bearer(&self, reason: &str, ddc_id: BearerHandle) -> Result<BearerHandle> {
        self.handle(format!("abort {reason} {ddc_id}"), |s| s.abort_result)
    }

    fn modify_dedicated_bearer(&self, cid: i32, qos: Option<&QosStatus>, tft: Option<&TftStatus>) -> Result<BearerHandle> {
        self.handle(format!("modify {cid} {} {}", qos.is_some(), tft.is_some()), |s| s.modify_result)
    }

    fn set_default_bearer_config(&self, apn: &str, config: &DefaultBearerConfig) -> Result<()> {
        self.state.lock().unwrap().configs.push((apn.to_string(), config.clone()));
        Ok(())
    }

    fn get_default_bearer_properties(&self, apn: &str) -> Option<DedicateBearerProperties> {
        self.state.lock().unwrap().default_props.get(apn).cloned()
    }

    fn get_last_fail_cause(&self, _apn: &str) -> i32 {
        self.state.lock().unwrap().last_fail_cause
    }

    fn get_deactivated_cids(&self, _apn: &str) -> Option<Vec<i32>> {
        self.state.lock().unwrap().deactivated.clone()
    }

    fn get_link_properties(&self, apn: &str) -> Option<LinkProperties> {
        self.state.lock().unwrap().link_props.get(apn).cloned()
    }

    fn discover_pcscf_via_pco(&self, apn: &str, cid: i32, completion: PcoCompletion) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("pco {apn} {cid}"));
        if state.pco_fails {
            return Err(EngineError::BackendUnavailable("pco refused".into()));
        }
        state.pco.push(completion);
        Ok(())
    }

    fn is_dedicated_bearer(&self, cid: i32) -> bool {
        self.state.lock().unwrap().dedicated_cids.contains(&cid)
    }
}

pub struct NetworkScript {
    pub start_result: FeatureStartResult,
    pub stop_result: i32,
    pub info: Option<NetworkInfo>,
    pub started: Vec<NetworkFeature>,
    pub stopped: Vec<NetworkFeature>,
}

impl Default for NetworkScript {
    fn default() -> Self {
        Self {
            start_result: FeatureStartResult::RequestStarted,
            stop_result: 0,
            info: None,
            started: Vec::new(),
            stopped: Vec::new(),
        }
    }
}

#[derive(Default)]
pub struct FakeNetwork {
    state: Mutex<NetworkScript>,
}

impl FakeNetwork {
    pub fn set(&self, f: impl FnOnce(&mut NetworkScript)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn started(&self) -> Vec<NetworkFeature> {
        self.state.lock().unwrap().started.clone()
    }

    pub fn stopped(&self) -> Vec<NetworkFeature> {
        self.state.lock().unwrap().stopped.clone()
    }

    pub fn set_info(&self, state: NetworkState, network_id: i32) {
        self.set(|s| s.info = Some(NetworkInfo { state, network_id }));
    }
}

impl NetworkBackend for FakeNetwork {
    fn start_feature(&self, feature: NetworkFeature) -> FeatureStartResult {
        let mut state = self.state.lock().unwrap();
        state.started.push(feature);
        state.start_result
    }

    fn stop_feature(&self, feature: NetworkFeature) -> i32 {
        let mut state = self.state.lock().unwrap();
        state.stopped.push(feature);
        state.stop_result
    }

    fn get_network_info(&self, _feature: NetworkFeature) -> Option<NetworkInfo> {
        self.state.lock().unwrap().info
    }
}

#[derive(Default)]
pub struct FakeIsim {
    pub addresses: Mutex<Option<Vec<String>>>,
}

impl IsimSource for FakeIsim {
    fn isim_pcscf(&self) -> Option<Vec<String>> {
        self.addresses.lock().unwrap().clone()
    }
}

/// SIP backend that answers every service type with the same server.
#[derive(Default)]
pub struct FakeSip {
    pub server: Mutex<Option<SipServer>>,
    pub clears: Mutex<Vec<String>>,
}

impl SipDiscovery for FakeSip {
    fn do_sip_dhcp_request(&self, _interface: &str) -> bool {
        true
    }

    fn get_sip_info(&self, _interface: &str, _service: &str, _family: IpFamily) -> Option<SipServer> {
        self.server.lock().unwrap().clone()
    }

    fn clear_sip_info(&self, interface: &str) {
        self.clears.lock().unwrap().push(interface.to_string());
    }
}

pub struct Harness {
    pub engine: Engine,
    pub rx: mpsc::UnboundedReceiver<Dispatch>,
    pub bearer: Arc<FakeBearer>,
    pub network: Arc<FakeNetwork>,
    pub isim: Arc<FakeIsim>,
    pub sip: Arc<FakeSip>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let mut harness = Self::disabled_with(config);
        harness.engine.dispatch(Dispatch::Enable);
        harness
    }

    pub fn disabled() -> Self {
        Self::disabled_with(EngineConfig::default())
    }

    fn disabled_with(config: EngineConfig) -> Self {
        let bearer = Arc::new(FakeBearer::default());
        let network = Arc::new(FakeNetwork::default());
        let isim = Arc::new(FakeIsim::default());
        let sip = Arc::new(FakeSip::default());
        let backends = Backends {
            bearer: bearer.clone(),
            network: network.clone(),
            sip: Some(sip.clone()),
            isim: Some(isim.clone()),
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = Engine::new(backends, config, EventSender::new(tx));
        Self {
            engine,
            rx,
            bearer,
            network,
            isim,
            sip,
        }
    }

    pub fn request(&mut self, frame: Frame) -> Vec<Frame> {
        self.engine.dispatch(Dispatch::Frame(frame));
        self.engine.take_outbox()
    }

    pub fn backend(&mut self, event: BackendEvent) -> Vec<Frame> {
        self.engine.dispatch(Dispatch::Backend(event));
        self.engine.take_outbox()
    }

    /// Wait for the next self-posted message and handle it.
    pub async fn pump(&mut self) -> Vec<Frame> {
        let message = self.rx.recv().await.expect("engine event channel closed");
        self.engine.dispatch(message);
        self.engine.take_outbox()
    }
}

fn frame(message_id: u32, w: WireWriter) -> Frame {
    Frame::with_payload(message_id, w.freeze())
}

pub fn default_activation_request(transaction_id: u8, emergency_ind: u8) -> Frame {
    let mut w = WireWriter::new();
    w.encode_u8(transaction_id);
    w.pad(3);
    QosStatus { qci: 5, ..Default::default() }.encode(&mut w);
    w.encode_u8(emergency_ind);
    w.encode_u8(1);
    w.encode_u8(1);
    w.pad(1);
    frame(msg_id::REQUEST_BEARER_ACTIVATION, w)
}

pub fn deactivation_request(transaction_id: u8, abort_transaction_id: u8, cid: Option<u8>) -> Frame {
    let mut w = WireWriter::new();
    w.encode_u8(transaction_id);
    w.encode_u8(abort_transaction_id);
    w.encode_u8(cid.is_some() as u8);
    w.encode_u8(cid.unwrap_or(0));
    frame(msg_id::REQUEST_BEARER_DEACTIVATION, w)
}

pub fn dedicated_activation_request(transaction_id: u8, primary_cid: u8) -> Frame {
    let mut w = WireWriter::new();
    w.encode_u8(transaction_id);
    w.encode_u8(primary_cid);
    w.encode_u8(1);
    w.pad(1);
    QosStatus { qci: 1, ..Default::default() }.encode(&mut w);
    TftStatus::default().encode(&mut w);
    frame(msg_id::REQUEST_DEDICATE_BEARER_ACTIVATION, w)
}

pub fn modification_request(transaction_id: u8, cid: u8) -> Frame {
    let mut w = WireWriter::new();
    w.encode_u8(transaction_id);
    w.encode_u8(cid);
    w.encode_u8(1);
    w.pad(1);
    QosStatus { qci: 2, ..Default::default() }.encode(&mut w);
    w.encode_u8(0);
    w.pad(3);
    TftStatus::default().encode(&mut w);
    frame(msg_id::REQUEST_BEARER_MODIFICATION, w)
}

pub fn pcscf_request(transaction_id: u8, cid: u8, interface: &str, method: u8) -> Frame {
    let mut w = WireWriter::new();
    w.encode_u8(transaction_id);
    w.encode_u8(cid);
    w.pad(2);
    w.encode_string(interface, IF_NAME_LEN);
    w.encode_u8(method);
    frame(msg_id::REQUEST_PCSCF_DISCOVERY, w)
}

/// A default bearer whose default cid is its own cid.
pub fn default_bearer(cid: i32) -> DedicateBearerProperties {
    DedicateBearerProperties {
        cid,
        default_cid: cid,
        bearer_id: 5,
        interface_id: 0,
        ..Default::default()
    }
}

pub fn dedicated_bearer(cid: i32, default_cid: i32) -> DedicateBearerProperties {
    DedicateBearerProperties {
        cid,
        default_cid,
        bearer_id: 6,
        qos: Some(QosStatus { qci: 1, ..Default::default() }),
        ..Default::default()
    }
}

pub fn link(interface: &str, addresses: &[&str]) -> LinkProperties {
    LinkProperties {
        interface_name: interface.to_string(),
        addresses: addresses.iter().map(|a| a.parse::<IpAddr>().unwrap()).collect(),
    }
}

/// Message ids of `frames`, in order.
pub fn ids(frames: &[Frame]) -> Vec<u32> {
    frames.iter().map(Frame::message_id).collect()
}

//! End-to-end tests: a peer talks to a running engine over an in-memory
//! stream while scripted backends play the platform side.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

use bearer_dispatch::backend::*;
use bearer_dispatch::codec::WireWriter;
use bearer_dispatch::config::{EngineConfig, PROPERTY_MANUAL_PCSCF_ADDRESS};
use bearer_dispatch::message::IF_NAME_LEN;
use bearer_dispatch::model::{AcquireMethod, DedicateBearerProperties, QosStatus, TftStatus};
use bearer_dispatch::protocol::{msg_id, Frame, Header, HEADER_SIZE};
use bearer_dispatch::{BackendEvent, EngineBuilder, EngineHandle, PcoCompletion, Result};

#[derive(Default)]
struct Script {
    enable_result: i32,
    default_props: HashMap<String, DedicateBearerProperties>,
    link_props: HashMap<String, LinkProperties>,
    last_fail_cause: i32,
    deactivated: Option<Vec<i32>>,
}

#[derive(Default)]
struct ScriptedBearer {
    script: Mutex<Script>,
}

impl BearerControlBackend for ScriptedBearer {
    fn enable_dedicated_bearer(&self, _: &str, _: bool, _: &QosStatus, _: &TftStatus) -> Result<BearerHandle> {
        Ok(self.script.lock().unwrap().enable_result)
    }

    fn disable_dedicated_bearer(&self, _: &str, _: i32) -> Result<BearerHandle> {
        Ok(-1)
    }

    fn abort_enable_dedicated_bearer(&self, _: &str, _: BearerHandle) -> Result<BearerHandle> {
        Ok(-1)
    }

    fn modify_dedicated_bearer(&self, _: i32, _: Option<&QosStatus>, _: Option<&TftStatus>) -> Result<BearerHandle> {
        Ok(-1)
    }

    fn set_default_bearer_config(&self, _: &str, _: &DefaultBearerConfig) -> Result<()> {
        Ok(())
    }

    fn get_default_bearer_properties(&self, apn: &str) -> Option<DedicateBearerProperties> {
        self.script.lock().unwrap().default_props.get(apn).cloned()
    }

    fn get_last_fail_cause(&self, _: &str) -> i32 {
        self.script.lock().unwrap().last_fail_cause
    }

    fn get_deactivated_cids(&self, _: &str) -> Option<Vec<i32>> {
        self.script.lock().unwrap().deactivated.clone()
    }

    fn get_link_properties(&self, apn: &str) -> Option<LinkProperties> {
        self.script.lock().unwrap().link_props.get(apn).cloned()
    }

    fn discover_pcscf_via_pco(&self, _: &str, _: i32, _: PcoCompletion) -> Result<()> {
        Ok(())
    }

    fn is_dedicated_bearer(&self, _: i32) -> bool {
        false
    }
}

struct ScriptedNetwork {
    start_result: FeatureStartResult,
    info: Option<NetworkInfo>,
    stopped: Mutex<Vec<NetworkFeature>>,
}

impl ScriptedNetwork {
    fn new(start_result: FeatureStartResult) -> Self {
        Self {
            start_result,
            info: Some(NetworkInfo {
                state: NetworkState::Connected,
                network_id: 100,
            }),
            stopped: Mutex::new(Vec::new()),
        }
    }
}

impl NetworkBackend for ScriptedNetwork {
    fn start_feature(&self, _: NetworkFeature) -> FeatureStartResult {
        self.start_result
    }

    fn stop_feature(&self, feature: NetworkFeature) -> i32 {
        self.stopped.lock().unwrap().push(feature);
        0
    }

    fn get_network_info(&self, _: NetworkFeature) -> Option<NetworkInfo> {
        self.info
    }
}

/// Holds every SIP query until the engine clears the interface a second
/// time, which only an interrupt does.
#[derive(Default)]
struct StallingSip {
    clears: Mutex<usize>,
    cleared: Condvar,
    queries: AtomicUsize,
}

impl SipDiscovery for StallingSip {
    fn do_sip_dhcp_request(&self, _: &str) -> bool {
        true
    }

    fn get_sip_info(&self, _: &str, _: &str, _: IpFamily) -> Option<SipServer> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let mut clears = self.clears.lock().unwrap();
        while *clears < 2 {
            clears = self.cleared.wait(clears).unwrap();
        }
        Some(SipServer {
            host: "10.1.1.1".into(),
            port: 5060,
        })
    }

    fn clear_sip_info(&self, _: &str) {
        *self.clears.lock().unwrap() += 1;
        self.cleared.notify_all();
    }
}

fn ims_bearer(cid: i32) -> DedicateBearerProperties {
    DedicateBearerProperties {
        cid,
        default_cid: cid,
        bearer_id: 5,
        interface_id: 0,
        ..Default::default()
    }
}

fn ims_link(interface: &str) -> LinkProperties {
    LinkProperties {
        interface_name: interface.into(),
        addresses: vec!["10.0.0.2".parse().unwrap()],
    }
}

fn request(message_id: u32, w: WireWriter) -> Vec<u8> {
    Frame::with_payload(message_id, w.freeze()).to_bytes()
}

fn default_activation(tid: u8, emergency_ind: u8) -> Vec<u8> {
    let mut w = WireWriter::new();
    w.encode_u8(tid);
    w.pad(3);
    QosStatus::default().encode(&mut w);
    w.encode_u8(emergency_ind);
    w.encode_u8(1);
    w.encode_u8(0);
    w.pad(1);
    request(msg_id::REQUEST_BEARER_ACTIVATION, w)
}

fn deactivation(tid: u8, cid: u8) -> Vec<u8> {
    let mut w = WireWriter::new();
    w.encode_u8(tid);
    w.encode_u8(0);
    w.encode_u8(1);
    w.encode_u8(cid);
    request(msg_id::REQUEST_BEARER_DEACTIVATION, w)
}

fn dedicated_activation(tid: u8) -> Vec<u8> {
    let mut w = WireWriter::new();
    w.encode_u8(tid);
    w.encode_u8(1);
    w.encode_u8(0);
    w.pad(1);
    QosStatus::default().encode(&mut w);
    TftStatus::default().encode(&mut w);
    request(msg_id::REQUEST_DEDICATE_BEARER_ACTIVATION, w)
}

fn pcscf(tid: u8, cid: u8, method: AcquireMethod) -> Vec<u8> {
    let mut w = WireWriter::new();
    w.encode_u8(tid);
    w.encode_u8(cid);
    w.pad(2);
    w.encode_string("ccmni0", IF_NAME_LEN);
    w.encode_u8(method as u8);
    request(msg_id::REQUEST_PCSCF_DISCOVERY, w)
}

async fn next_frame(peer: &mut DuplexStream) -> Frame {
    let mut raw = [0u8; HEADER_SIZE];
    tokio::time::timeout(Duration::from_secs(30), peer.read_exact(&mut raw))
        .await
        .expect("no frame from engine")
        .unwrap();
    let header = Header::decode(&raw).unwrap();
    let mut payload = vec![0u8; header.payload_length as usize];
    peer.read_exact(&mut payload).await.unwrap();
    Frame::new(header, Bytes::from(payload))
}

fn start(builder: EngineBuilder) -> (EngineHandle, DuplexStream) {
    let (engine_side, peer) = tokio::io::duplex(256 * 1024);
    let handle = builder.start(engine_side);
    handle.enable().unwrap();
    (handle, peer)
}

#[tokio::test]
async fn test_already_active_default_bearer() {
    let bearer = Arc::new(ScriptedBearer::default());
    {
        let mut script = bearer.script.lock().unwrap();
        script.default_props.insert(IMS_APN.into(), ims_bearer(1));
        script.link_props.insert(IMS_APN.into(), ims_link("ccmni0"));
    }
    let network = Arc::new(ScriptedNetwork::new(FeatureStartResult::AlreadyActive));
    let (handle, mut peer) = start(EngineBuilder::new(bearer, network));

    peer.write_all(&default_activation(3, 1)).await.unwrap();
    let frame = next_frame(&mut peer).await;
    assert_eq!(frame.message_id(), msg_id::RESPONSE_BEARER_ACTIVATION);
    assert_eq!(&frame.payload()[..2], &[3, 1]);

    // The established bearer now gates global address notifications.
    handle
        .send_event(BackendEvent::GlobalIpAddress {
            apn_type: IMS_APN.into(),
            interface_name: "ccmni0".into(),
            address: "2001:db8::20".parse().unwrap(),
        })
        .unwrap();
    let frame = next_frame(&mut peer).await;
    assert_eq!(frame.message_id(), msg_id::NOTIFY_IPV6_GLOBAL_ADDR);
    assert_eq!(&frame.payload()[4..8], &100i32.to_le_bytes());

    peer.shutdown().await.unwrap();
    handle.wait_for_shutdown().await.unwrap();
}

#[tokio::test]
async fn test_fragmented_request() {
    let bearer = Arc::new(ScriptedBearer::default());
    let network = Arc::new(ScriptedNetwork::new(FeatureStartResult::RequestStarted));
    let (handle, mut peer) = start(EngineBuilder::new(bearer, network));

    let bytes = pcscf(8, 1, AcquireMethod::Manual);
    for chunk in bytes.chunks(7) {
        peer.write_all(chunk).await.unwrap();
        tokio::task::yield_now().await;
    }

    let frame = next_frame(&mut peer).await;
    assert_eq!(frame.message_id(), msg_id::REJECT_PCSCF_DISCOVERY);
    assert_eq!(frame.payload(), &[8, 1, 0, 0]);

    peer.shutdown().await.unwrap();
    handle.wait_for_shutdown().await.unwrap();
}

#[tokio::test]
async fn test_manual_pcscf_from_config() {
    let bearer = Arc::new(ScriptedBearer::default());
    let network = Arc::new(ScriptedNetwork::new(FeatureStartResult::RequestStarted));
    let config = EngineConfig::default().with_property(PROPERTY_MANUAL_PCSCF_ADDRESS, "10.0.0.9");
    let (handle, mut peer) = start(EngineBuilder::new(bearer, network).config(config));

    peer.write_all(&pcscf(2, 1, AcquireMethod::Manual)).await.unwrap();
    let frame = next_frame(&mut peer).await;
    assert_eq!(frame.message_id(), msg_id::RESPONSE_PCSCF_DISCOVERY);
    assert_eq!(frame.payload()[1], AcquireMethod::Manual as u8);

    peer.shutdown().await.unwrap();
    handle.wait_for_shutdown().await.unwrap();
}

#[tokio::test]
async fn test_dedicated_activation_answered_once() {
    let bearer = Arc::new(ScriptedBearer::default());
    bearer.script.lock().unwrap().enable_result = 4;
    let network = Arc::new(ScriptedNetwork::new(FeatureStartResult::RequestStarted));
    let (handle, mut peer) = start(EngineBuilder::new(bearer, network));

    peer.write_all(&dedicated_activation(5)).await.unwrap();
    // Let the request reach the engine before the backend answers.
    peer.write_all(&pcscf(6, 1, AcquireMethod::None)).await.unwrap();
    assert_eq!(next_frame(&mut peer).await.message_id(), msg_id::REJECT_PCSCF_DISCOVERY);

    let connected = BackendEvent::DedicatedStateChanged {
        ddc_id: 4,
        state: DedicatedState::Connected,
        property: DedicateBearerProperties {
            cid: 2,
            default_cid: 1,
            bearer_id: 6,
            ..Default::default()
        },
        fail_cause: 0,
        reason: None,
    };
    handle.send_event(connected.clone()).unwrap();
    handle.send_event(connected).unwrap();
    peer.write_all(&pcscf(7, 1, AcquireMethod::None)).await.unwrap();

    let frame = next_frame(&mut peer).await;
    assert_eq!(frame.message_id(), msg_id::RESPONSE_DEDICATE_BEARER_ACTIVATION);
    assert_eq!(frame.payload()[0], 5);
    // The duplicate event matched nothing and the default bearer 1 is unknown,
    // so the next frame already belongs to the following request.
    let frame = next_frame(&mut peer).await;
    assert_eq!(frame.message_id(), msg_id::REJECT_PCSCF_DISCOVERY);
    assert_eq!(frame.payload()[0], 7);

    peer.shutdown().await.unwrap();
    handle.wait_for_shutdown().await.unwrap();
}

#[tokio::test]
async fn test_refused_dedicated_activation() {
    let bearer = Arc::new(ScriptedBearer::default());
    bearer.script.lock().unwrap().enable_result = -1;
    let network = Arc::new(ScriptedNetwork::new(FeatureStartResult::RequestStarted));
    let (handle, mut peer) = start(EngineBuilder::new(bearer, network));

    peer.write_all(&dedicated_activation(9)).await.unwrap();
    let frame = next_frame(&mut peer).await;
    assert_eq!(frame.message_id(), msg_id::REJECT_DEDICATE_BEARER_ACTIVATION);
    assert_eq!(&frame.payload()[..3], &[9, 0, 0]);

    peer.shutdown().await.unwrap();
    handle.wait_for_shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_failed_activation_rejected_after_debounce() {
    let bearer = Arc::new(ScriptedBearer::default());
    let network = Arc::new(ScriptedNetwork::new(FeatureStartResult::Failed(-3)));
    let (handle, mut peer) = start(EngineBuilder::new(bearer, network.clone()).reject_debounce(Duration::from_secs(5)));

    let started = tokio::time::Instant::now();
    peer.write_all(&default_activation(1, 1)).await.unwrap();
    let frame = next_frame(&mut peer).await;

    assert!(started.elapsed() >= Duration::from_secs(5));
    assert_eq!(frame.message_id(), msg_id::REJECT_BEARER_ACTIVATION);
    assert_eq!(frame.payload(), &[1, 0, 0, 0]);
    assert_eq!(network.stopped.lock().unwrap().as_slice(), &[NetworkFeature::Ims]);

    peer.shutdown().await.unwrap();
    handle.wait_for_shutdown().await.unwrap();
}

#[tokio::test]
async fn test_emergency_bearer_routing() {
    let bearer = Arc::new(ScriptedBearer::default());
    {
        let mut script = bearer.script.lock().unwrap();
        script.default_props.insert(EMERGENCY_APN.into(), ims_bearer(4));
        script.link_props.insert(EMERGENCY_APN.into(), ims_link("ccmni4"));
    }
    let network = Arc::new(ScriptedNetwork::new(FeatureStartResult::AlreadyActive));
    let (handle, mut peer) = start(EngineBuilder::new(bearer, network.clone()));

    peer.write_all(&default_activation(1, 2)).await.unwrap();
    assert_eq!(next_frame(&mut peer).await.message_id(), msg_id::RESPONSE_BEARER_ACTIVATION);

    peer.write_all(&deactivation(2, 4)).await.unwrap();
    peer.write_all(&pcscf(3, 1, AcquireMethod::None)).await.unwrap();
    assert_eq!(next_frame(&mut peer).await.payload()[0], 3);
    assert_eq!(network.stopped.lock().unwrap().as_slice(), &[NetworkFeature::Emergency]);

    peer.shutdown().await.unwrap();
    handle.wait_for_shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dhcp_discovery_interrupted_by_bearer_loss() {
    let bearer = Arc::new(ScriptedBearer::default());
    {
        let mut script = bearer.script.lock().unwrap();
        script.deactivated = Some(vec![9]);
        script.last_fail_cause = 36;
    }
    let network = Arc::new(ScriptedNetwork::new(FeatureStartResult::RequestStarted));
    let sip = Arc::new(StallingSip::default());
    let (handle, mut peer) = start(EngineBuilder::new(bearer, network).sip_discovery(sip.clone()));

    peer.write_all(&pcscf(4, 1, AcquireMethod::DhcpV4)).await.unwrap();
    while sip.queries.load(Ordering::SeqCst) == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    handle
        .send_event(BackendEvent::DefaultStateChanged {
            apn_type: IMS_APN.into(),
            state: DataState::Disconnected,
            reason: None,
            link_properties: None,
            ims_changed: true,
        })
        .unwrap();

    let frame = next_frame(&mut peer).await;
    assert_eq!(frame.message_id(), msg_id::NOTIFY_BEARER_DEACTIVATED);
    assert_eq!(frame.payload(), &[9, 36, 0, 0]);

    let frame = next_frame(&mut peer).await;
    assert_eq!(frame.message_id(), msg_id::REJECT_PCSCF_DISCOVERY);
    assert_eq!(frame.payload(), &[4, 1, 0, 0]);
    assert_eq!(sip.queries.load(Ordering::SeqCst), 1);

    peer.shutdown().await.unwrap();
    handle.wait_for_shutdown().await.unwrap();
}

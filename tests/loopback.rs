use std::time::Duration;

use optical_link::bridge::checksum::checksum;
use optical_link::config::{NodeConfig, Role};
use optical_link::frame::EthernetFrame;
use optical_link::net::{FrameSocket, MockSocket};
use optical_link::phy::channel::symbol_channel;
use optical_link::pipeline::PipelineSupervisor;
use optical_link::symbol::{NarrowDeframer, NarrowFramer, WideDeframer, WideFramer, WideSymbol};

const RECV_TIMEOUT: Duration = Duration::from_secs(2);
const SILENCE_TIMEOUT: Duration = Duration::from_millis(300);

/// Both nodes of the bridge wired back-to-back over in-memory symbol
/// channels, with mock sockets standing in for the wired client and
/// the WiFi router.
struct TestBridge {
    station: PipelineSupervisor,
    access_point: PipelineSupervisor,
    client: MockSocket,
    router: MockSocket,
    station_config: NodeConfig,
    ap_config: NodeConfig,
}

impl TestBridge {
    fn launch() -> Self {
        let station_config = Role::Station.profile();
        let ap_config = Role::AccessPoint.profile();

        // Wide symbols flow access point -> station, narrow symbols
        // flow station -> access point.
        let (wide_tx, wide_rx) = symbol_channel::<WideSymbol>();
        let (narrow_tx, narrow_rx) = symbol_channel::<u8>();

        let (station_socket, client) = MockSocket::pair();
        let (ap_socket, router) = MockSocket::pair();

        let station = PipelineSupervisor::launch(
            station_config.clone(),
            wide_rx,
            WideDeframer::new(),
            narrow_tx,
            NarrowFramer,
            station_socket,
        );
        let access_point = PipelineSupervisor::launch(
            ap_config.clone(),
            narrow_rx,
            NarrowDeframer::new(),
            wide_tx,
            WideFramer,
            ap_socket,
        );

        Self {
            station,
            access_point,
            client,
            router,
            station_config,
            ap_config,
        }
    }

    fn stop(self) {
        self.station.shutdown();
        self.access_point.shutdown();
    }
}

fn build_icmp_frame(
    dest_mac: [u8; 6],
    source_ip: [u8; 4],
    dest_ip: [u8; 4],
    id: u16,
    sequence: u16,
    payload_len: usize,
) -> Vec<u8> {
    let mut icmp = vec![8, 0, 0, 0];
    icmp.extend_from_slice(&id.to_be_bytes());
    icmp.extend_from_slice(&sequence.to_be_bytes());
    icmp.extend((0..payload_len).map(|index| index as u8));
    let icmp_sum = checksum(&icmp);
    icmp[2..4].copy_from_slice(&icmp_sum.to_be_bytes());

    let total_len = (20 + icmp.len()) as u16;
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&dest_mac);
    bytes.extend_from_slice(&[0x02, 0, 0, 0, 0, 0x01]);
    bytes.extend_from_slice(&0x0800u16.to_be_bytes());

    bytes.push(0x45);
    bytes.push(0);
    bytes.extend_from_slice(&total_len.to_be_bytes());
    bytes.extend_from_slice(&[0x00, 0x42, 0x40, 0x00, 64, 1, 0, 0]);
    bytes.extend_from_slice(&source_ip);
    bytes.extend_from_slice(&dest_ip);
    let ip_sum = checksum(&bytes[14..34]);
    bytes[24..26].copy_from_slice(&ip_sum.to_be_bytes());

    bytes.extend_from_slice(&icmp);
    bytes
}

#[test]
fn test_uplink_ping_crosses_the_bridge() {
    let bridge = TestBridge::launch();

    // A 98-byte echo request from the wired client, addressed to the
    // station's filter MAC.
    let frame = build_icmp_frame(
        bridge.station_config.own_mac,
        [192, 168, 3, 1],
        [8, 8, 8, 8],
        0x1234,
        7,
        56,
    );
    assert_eq!(frame.len(), 98);

    bridge
        .client
        .send_frame(&EthernetFrame::from_slice(&frame).unwrap())
        .unwrap();

    let out = bridge
        .router
        .recv_frame(RECV_TIMEOUT)
        .unwrap()
        .expect("exactly one frame must reach the router side");
    let bytes = out.as_bytes();
    assert_eq!(bytes.len(), 98);

    // Rewritten toward the WiFi router by the access point.
    assert_eq!(&bytes[0..6], &bridge.ap_config.peer_mac);
    assert_eq!(&bytes[6..12], &bridge.ap_config.own_mac);
    assert_eq!(&bytes[26..30], &bridge.ap_config.own_ip.octets());
    assert_eq!(&bytes[30..34], &[8, 8, 8, 8]);

    // IP and ICMP checksums verify; type/code/id/sequence survive.
    assert_eq!(checksum(&bytes[14..34]), 0);
    assert_eq!(checksum(&bytes[34..]), 0);
    assert_eq!(&bytes[34..36], &[8, 0]);
    assert_eq!(&bytes[38..40], &0x1234u16.to_be_bytes());
    assert_eq!(&bytes[40..42], &7u16.to_be_bytes());

    // Exactly one: nothing else follows.
    assert_eq!(bridge.router.recv_frame(SILENCE_TIMEOUT).unwrap(), None);

    bridge.stop();
}

#[test]
fn test_downlink_crosses_the_wide_direction() {
    let bridge = TestBridge::launch();

    // A reply from the internet arriving at the access point.
    let frame = build_icmp_frame(
        bridge.ap_config.own_mac,
        [8, 8, 8, 8],
        [192, 168, 1, 105],
        0x00AA, // id
        3,
        24,
    );

    bridge
        .router
        .send_frame(&EthernetFrame::from_slice(&frame).unwrap())
        .unwrap();

    let out = bridge
        .client
        .recv_frame(RECV_TIMEOUT)
        .unwrap()
        .expect("the reply must reach the wired client side");
    let bytes = out.as_bytes();

    // The station substitutes the destination with the client address.
    assert_eq!(&bytes[0..6], &bridge.station_config.peer_mac);
    assert_eq!(&bytes[6..12], &bridge.station_config.own_mac);
    assert_eq!(&bytes[26..30], &[8, 8, 8, 8]);
    assert_eq!(&bytes[30..34], &bridge.station_config.peer_ip.octets());
    assert_eq!(checksum(&bytes[14..34]), 0);

    bridge.stop();
}

#[test]
fn test_foreign_destination_mac_is_filtered() {
    let bridge = TestBridge::launch();

    let mut wrong_mac = bridge.station_config.own_mac;
    wrong_mac[5] ^= 0xFF;
    let frame = build_icmp_frame(wrong_mac, [192, 168, 3, 1], [8, 8, 8, 8], 1, 1, 16);

    bridge
        .client
        .send_frame(&EthernetFrame::from_slice(&frame).unwrap())
        .unwrap();

    // Zero frames cross; the pipeline is still alive afterwards.
    assert_eq!(bridge.router.recv_frame(SILENCE_TIMEOUT).unwrap(), None);

    let accepted = build_icmp_frame(
        bridge.station_config.own_mac,
        [192, 168, 3, 1],
        [8, 8, 8, 8],
        2,
        1,
        16,
    );
    bridge
        .client
        .send_frame(&EthernetFrame::from_slice(&accepted).unwrap())
        .unwrap();
    assert!(bridge.router.recv_frame(RECV_TIMEOUT).unwrap().is_some());

    bridge.stop();
}

#[test]
fn test_shutdown_joins_all_stages() {
    let bridge = TestBridge::launch();
    // Nothing in flight; both supervisors must stop promptly.
    bridge.stop();
}

//! End-to-end tests: a connector against an in-memory node.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc::UnboundedReceiver;

use ledger_connector::codec::{BalanceInfo, HeightInfo, PublicKey};
use ledger_connector::protocol::{build_packet, packet_type, FrameDecoder, Header, Packet};
use ledger_connector::transport::{MemoryListener, MemoryTransport};
use ledger_connector::{
    ChannelObserver, ConnectionState, Connector, ConnectorBuilder, ConnectorError, ConnectorEvent,
};

/// Node side of a connection.
struct FakeNode {
    stream: DuplexStream,
    decoder: FrameDecoder,
    pending: VecDeque<Packet>,
}

impl FakeNode {
    async fn accept(listener: &mut MemoryListener) -> Self {
        let peer = listener.accept().await.expect("no connection");
        Self {
            stream: peer.stream,
            decoder: FrameDecoder::new(),
            pending: VecDeque::new(),
        }
    }

    async fn next_packet(&mut self) -> Packet {
        let mut buf = [0u8; 1024];
        loop {
            if let Some(packet) = self.pending.pop_front() {
                return packet;
            }
            let n = self.stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "connector closed the stream");
            self.pending.extend(self.decoder.push(&buf[..n]).unwrap());
        }
    }

    async fn next_packet_of(&mut self, kind: u8) -> Packet {
        loop {
            let packet = self.next_packet().await;
            if packet.packet_type() == kind {
                return packet;
            }
        }
    }

    async fn write(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
        self.stream.flush().await.unwrap();
    }
}

fn height_response(height: u32, dejavu: u32) -> Bytes {
    let payload = HeightInfo::at(height).encode();
    let header =
        Header::new(packet_type::RESPOND_CURRENT_HEIGHT, payload.len()).with_dejavu(dejavu);
    build_packet(&header, &payload)
}

async fn next_event(events: &mut UnboundedReceiver<ConnectorEvent>) -> ConnectorEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("observer channel closed")
}

async fn started(
    builder: ConnectorBuilder,
) -> (
    Connector,
    MemoryTransport,
    FakeNode,
    UnboundedReceiver<ConnectorEvent>,
) {
    let (transport, mut listener) = MemoryTransport::pair();
    let (observer, mut events) = ChannelObserver::new();
    let connector = builder
        .observer(Arc::new(observer))
        .build(transport.clone());

    connector.start("node").await.unwrap();
    let node = FakeNode::accept(&mut listener).await;

    assert_eq!(next_event(&mut events).await, ConnectorEvent::PeerConnected);
    assert_eq!(next_event(&mut events).await, ConnectorEvent::Ready);
    (connector, transport, node, events)
}

#[tokio::test]
async fn test_frames_split_by_transport_arrive_in_order() {
    let (_connector, _transport, mut node, mut events) = started(ConnectorBuilder::new()).await;

    let packets: Vec<Packet> = (0u32..12)
        .map(|i| {
            let payload = vec![i as u8; (i * 13) as usize];
            let header = Header::new(packet_type::EXCHANGE_PUBLIC_PEERS, payload.len())
                .with_dejavu(i + 100);
            Packet::new(header, Bytes::from(payload))
        })
        .collect();
    let stream: Vec<u8> = packets.iter().flat_map(|p| p.to_bytes().to_vec()).collect();

    // Odd sizes so splits land inside headers and payloads alike.
    for chunk in stream.chunks(7) {
        node.write(chunk).await;
        tokio::task::yield_now().await;
    }

    for expected in &packets {
        assert_eq!(
            next_event(&mut events).await,
            ConnectorEvent::PacketReceived(expected.clone())
        );
    }
}

#[tokio::test]
async fn test_height_only_moves_forward() {
    let (connector, _transport, mut node, mut events) = started(ConnectorBuilder::new()).await;

    let mut burst = Vec::new();
    for h in [5, 5, 3, 9, 8, 12] {
        burst.extend_from_slice(&height_response(h, 0));
    }
    node.write(&burst).await;

    assert_eq!(next_event(&mut events).await, ConnectorEvent::HeightChanged(5));
    assert_eq!(next_event(&mut events).await, ConnectorEvent::HeightChanged(9));
    assert_eq!(next_event(&mut events).await, ConnectorEvent::HeightChanged(12));
    assert_eq!(connector.status().await.unwrap().current_height, 12);
}

#[tokio::test(start_paused = true)]
async fn test_poll_cadence() {
    let (connector, _transport, mut node, _events) = started(
        ConnectorBuilder::new().poll_interval(Duration::from_millis(500)),
    )
    .await;

    tokio::time::sleep(Duration::from_millis(1_250)).await;
    assert_eq!(connector.status().await.unwrap().polls_sent, 2);

    let first = node.next_packet().await;
    let second = node.next_packet().await;
    assert_eq!(first.packet_type(), packet_type::REQUEST_CURRENT_HEIGHT);
    assert_eq!(second.packet_type(), packet_type::REQUEST_CURRENT_HEIGHT);
    assert!(first.payload.is_empty());
    assert_ne!(first.dejavu(), 0);

    connector.stop().await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;

    let status = connector.status().await.unwrap();
    assert_eq!(status.polls_sent, 2);
    assert!(!status.polling);
}

#[tokio::test(start_paused = true)]
async fn test_no_polls_while_disconnected() {
    let (transport, _listener) = MemoryTransport::pair();
    transport.set_refuse(true);
    let connector = ConnectorBuilder::new().build(transport);

    assert!(connector.start("node").await.is_err());
    tokio::time::sleep(Duration::from_secs(3)).await;

    let status = connector.status().await.unwrap();
    assert!(status.polling);
    assert_eq!(status.state, ConnectionState::Disconnected);
    assert_eq!(status.polls_sent, 0);
}

#[tokio::test]
async fn test_reconnect_without_prior_address() {
    let (transport, _listener) = MemoryTransport::pair();
    let connector = ConnectorBuilder::new().build(transport.clone());

    assert!(matches!(
        connector.reconnect().await,
        Err(ConnectorError::NoAddress)
    ));

    let status = connector.status().await.unwrap();
    assert_eq!(status.state, ConnectionState::Disconnected);
    assert_eq!(transport.connect_attempts(), 0);
}

#[tokio::test]
async fn test_balance_request_and_response() {
    let (connector, _transport, mut node, mut events) = started(ConnectorBuilder::new()).await;
    let account = PublicKey([0x5A; 32]);

    let token = connector.request_balance(account).await.unwrap();
    let request = node.next_packet_of(packet_type::REQUEST_ENTITY).await;
    assert_eq!(request.dejavu(), token);
    assert_eq!(request.payload(), account.as_bytes());

    let balance = BalanceInfo {
        public_key: account,
        incoming_amount: 900,
        outgoing_amount: 100,
        incoming_transfers: 2,
        outgoing_transfers: 1,
        latest_incoming_height: 40,
        latest_outgoing_height: 41,
        height: 42,
        spectrum_index: 3,
        siblings: Bytes::from_static(&[1, 2, 3, 4]),
    };
    let payload = balance.encode();
    let header = Header::new(packet_type::RESPOND_ENTITY, payload.len()).with_dejavu(token);
    node.write(&build_packet(&header, &payload)).await;

    match next_event(&mut events).await {
        ConnectorEvent::Balance(info) => {
            assert_eq!(info, balance);
            assert_eq!(info.balance(), 800);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_peer_close_then_reconnect() {
    let (transport, mut listener) = MemoryTransport::pair();
    let (observer, mut events) = ChannelObserver::new();
    let connector = ConnectorBuilder::new()
        .observer(Arc::new(observer))
        .build(transport);

    connector.start("node-c").await.unwrap();
    let node = FakeNode::accept(&mut listener).await;
    assert_eq!(next_event(&mut events).await, ConnectorEvent::PeerConnected);
    assert_eq!(next_event(&mut events).await, ConnectorEvent::Ready);

    drop(node);
    assert_eq!(next_event(&mut events).await, ConnectorEvent::PeerDisconnected);

    let status = connector.status().await.unwrap();
    assert_eq!(status.state, ConnectionState::Disconnected);
    assert_eq!(status.address.as_deref(), Some("node-c"));
    assert!(matches!(
        connector.send(Bytes::from_static(b"x")).await,
        Err(ConnectorError::NotConnected)
    ));

    connector.reconnect().await.unwrap();
    let peer = listener.accept().await.unwrap();
    assert_eq!(peer.host, "node-c");
    assert_eq!(next_event(&mut events).await, ConnectorEvent::PeerConnected);
    assert!(connector.status().await.unwrap().state == ConnectionState::Connected);
}

#[tokio::test]
async fn test_invalid_header_drops_connection() {
    let (connector, _transport, mut node, mut events) = started(ConnectorBuilder::new()).await;

    // Declared size 3 is smaller than the header itself.
    node.write(&[3, 0, 0, packet_type::END_RESPONSE, 0, 0, 0, 0]).await;

    assert!(matches!(
        next_event(&mut events).await,
        ConnectorEvent::TransportError(_)
    ));
    assert_eq!(next_event(&mut events).await, ConnectorEvent::PeerDisconnected);

    let status = connector.status().await.unwrap();
    assert_eq!(status.state, ConnectionState::Disconnected);
    assert_eq!(status.address.as_deref(), Some("node"));
}

#[tokio::test]
async fn test_frames_ahead_of_bad_header_are_delivered() {
    let (_connector, _transport, mut node, mut events) = started(ConnectorBuilder::new()).await;

    let mut chunk = height_response(21, 0).to_vec();
    chunk.extend_from_slice(&[3, 0, 0, packet_type::END_RESPONSE, 0, 0, 0, 0]);
    node.write(&chunk).await;

    assert_eq!(next_event(&mut events).await, ConnectorEvent::HeightChanged(21));
    assert!(matches!(
        next_event(&mut events).await,
        ConnectorEvent::TransportError(_)
    ));
    assert_eq!(next_event(&mut events).await, ConnectorEvent::PeerDisconnected);
}

#[tokio::test]
async fn test_burst_larger_than_buffer() {
    let (connector, _transport, mut node, mut events) =
        started(ConnectorBuilder::new().buffer_capacity(64)).await;

    // Ten 24-byte frames in one write, well past the 64-byte ring.
    let mut burst = Vec::new();
    for height in 1..=10 {
        burst.extend_from_slice(&height_response(height, 0));
    }
    node.write(&burst).await;

    for height in 1..=10 {
        assert_eq!(
            next_event(&mut events).await,
            ConnectorEvent::HeightChanged(height)
        );
    }
    assert_eq!(
        connector.status().await.unwrap().state,
        ConnectionState::Connected
    );
}

#[tokio::test(start_paused = true)]
async fn test_node_that_stops_reading_cannot_stall_connector() {
    let (transport, mut listener) = MemoryTransport::with_buffer_size(16);
    let (observer, mut events) = ChannelObserver::new();
    let connector = ConnectorBuilder::new()
        .poll_interval(Duration::from_millis(100))
        .write_queue_capacity(8)
        .observer(Arc::new(observer))
        .build(transport);

    connector.start("node").await.unwrap();
    // Accepted but never read, so the 16-byte pipe fills after two polls.
    let _node = FakeNode::accept(&mut listener).await;
    assert_eq!(next_event(&mut events).await, ConnectorEvent::PeerConnected);
    assert_eq!(next_event(&mut events).await, ConnectorEvent::Ready);

    tokio::time::sleep(Duration::from_secs(1)).await;
    let first = tokio::time::timeout(Duration::from_secs(5), connector.status())
        .await
        .expect("status stalled")
        .unwrap();
    assert_eq!(first.state, ConnectionState::Connected);

    tokio::time::sleep(Duration::from_secs(5)).await;
    let later = connector.status().await.unwrap();
    // Polls keep ticking but nothing more fits in the queue.
    assert!(later.polls_sent < 60, "polls_sent = {}", later.polls_sent);
    assert!(matches!(
        connector.send(vec![0u8; 8]).await,
        Err(ConnectorError::SendQueueFull)
    ));

    tokio::time::timeout(Duration::from_secs(5), connector.destroy())
        .await
        .expect("destroy stalled")
        .unwrap();
    assert_eq!(next_event(&mut events).await, ConnectorEvent::PeerDisconnected);
}

#[tokio::test]
async fn test_malformed_height_does_not_stop_decoding() {
    let (_connector, _transport, mut node, mut events) = started(ConnectorBuilder::new()).await;

    let bad = build_packet(
        &Header::new(packet_type::RESPOND_CURRENT_HEIGHT, 4),
        &[1, 2, 3, 4],
    );
    let mut burst = bad.to_vec();
    burst.extend_from_slice(&height_response(77, 0));
    node.write(&burst).await;

    assert!(matches!(
        next_event(&mut events).await,
        ConnectorEvent::DecodeError { .. }
    ));
    assert_eq!(next_event(&mut events).await, ConnectorEvent::HeightChanged(77));
}

#[tokio::test(start_paused = true)]
async fn test_strict_matching_ignores_stale_responses() {
    let (_connector, _transport, mut node, mut events) = started(
        ConnectorBuilder::new()
            .poll_interval(Duration::from_millis(100))
            .match_poll_responses(true),
    )
    .await;

    let poll = node.next_packet_of(packet_type::REQUEST_CURRENT_HEIGHT).await;
    let token = poll.dejavu();

    let mut burst = height_response(50, token.wrapping_add(1)).to_vec();
    burst.extend_from_slice(&height_response(40, token));
    node.write(&burst).await;

    assert_eq!(next_event(&mut events).await, ConnectorEvent::HeightChanged(40));
}

#[tokio::test]
async fn test_every_subscriber_sees_events() {
    let (connector, _transport, mut node, mut first) = started(ConnectorBuilder::new()).await;
    let (observer, mut second) = ChannelObserver::new();
    connector.subscribe(Arc::new(observer)).await.unwrap();
    // Subscription is applied before anything queued after it.
    connector.status().await.unwrap();

    node.write(&height_response(3, 0)).await;

    assert_eq!(next_event(&mut first).await, ConnectorEvent::HeightChanged(3));
    assert_eq!(next_event(&mut second).await, ConnectorEvent::HeightChanged(3));
}

#[tokio::test]
async fn test_send_writes_raw_bytes() {
    let (connector, _transport, mut node, _events) = started(ConnectorBuilder::new()).await;

    let header = Header::new(packet_type::BROADCAST_TRANSACTION, 5).with_dejavu(1);
    connector
        .send(build_packet(&header, b"hello"))
        .await
        .unwrap();

    let packet = node.next_packet_of(packet_type::BROADCAST_TRANSACTION).await;
    assert_eq!(packet.payload(), b"hello");
}

#[tokio::test]
async fn test_destroy_releases_connection() {
    let (connector, _transport, mut node, mut events) = started(ConnectorBuilder::new()).await;

    connector.destroy().await.unwrap();
    assert_eq!(next_event(&mut events).await, ConnectorEvent::PeerDisconnected);

    let mut buf = [0u8; 64];
    loop {
        // Drain any polls written before the teardown, then expect EOF.
        if node.stream.read(&mut buf).await.unwrap() == 0 {
            break;
        }
    }
    assert!(matches!(connector.status().await, Err(ConnectorError::Closed)));
}

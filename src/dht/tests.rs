use super::node::{pack_nodes, unpack_nodes};
use super::transaction::{decode_tid, encode_tid};
use super::*;
use crate::constants::{BLACKLIST_EXPIRED_AFTER, ID_BITS};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

fn addr(last: u8, port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, last)), port)
}

fn id_with_last(last: u8) -> NodeId {
    let mut bytes = [0u8; 20];
    bytes[19] = last;
    NodeId(bytes)
}

#[test]
fn node_id_distance_is_xor() {
    let zero = NodeId([0u8; 20]);
    let one = id_with_last(0x01);

    let mut expected = [0u8; 20];
    expected[19] = 0x01;
    assert_eq!(zero.distance(&one), expected);
    assert_eq!(zero.distance(&zero), [0u8; 20]);
}

#[test]
fn node_id_bit_ops() {
    let mut id = NodeId([0u8; 20]);
    assert!(!id.bit(0));

    id.set_bit(0, true);
    assert!(id.bit(0));
    assert_eq!(id.0[0], 0x80);

    id.flip_bit(0);
    assert!(!id.bit(0));

    id.set_bit(159, true);
    assert!(id.bit(159));
    assert_eq!(id.0[19], 0x01);
}

#[test]
fn node_id_common_prefix() {
    let zero = NodeId([0u8; 20]);
    let mut half = [0u8; 20];
    half[0] = 0x80;

    assert_eq!(zero.common_prefix_len(&NodeId(half)), 0);
    assert_eq!(zero.common_prefix_len(&id_with_last(0x01)), 159);
    assert_eq!(zero.common_prefix_len(&zero), ID_BITS);
}

#[test]
fn node_id_random_within_prefix() {
    let base = NodeId([0xAA; 20]);
    for bits in [0, 1, 8, 37, 160] {
        let id = base.random_within(bits);
        assert!(base.common_prefix_len(&id) >= bits.min(ID_BITS));
    }
}

#[test]
fn node_id_impersonation_splices_suffix() {
    let own = NodeId([0x11; 20]);
    let target = NodeId([0xEE; 20]);

    let fake = own.impersonate(&target);
    assert_eq!(&fake.0[..15], &[0xEE; 15]);
    assert_eq!(&fake.0[15..], &[0x11; 5]);
}

#[test]
fn node_compact_roundtrip() {
    let node = Node::new(NodeId([7u8; 20]), addr(1, 6881));
    let compact = node.to_compact().unwrap();
    assert_eq!(compact.len(), 26);

    let parsed = Node::from_compact(&compact).unwrap();
    assert_eq!(parsed.id, node.id);
    assert_eq!(parsed.addr, node.addr);

    let blob = pack_nodes(&[node.clone(), Node::new(NodeId([8u8; 20]), addr(2, 6882))]);
    assert_eq!(unpack_nodes(&blob).len(), 2);
}

#[test]
fn node_compact_rejects_zero_port() {
    let node = Node::new(NodeId([7u8; 20]), addr(1, 0));
    let compact = node.to_compact().unwrap();
    assert!(Node::from_compact(&compact).is_none());
}

fn standard_table(local: NodeId) -> RoutingTable {
    RoutingTable::new(
        local,
        8,
        5000,
        false,
        Duration::from_secs(900),
        Duration::from_secs(900),
    )
}

#[test]
fn routing_neighbors_sorted_by_distance() {
    let local = NodeId([0xF0; 20]);
    let table = standard_table(local);

    for last in [0xFFu8, 0x02, 0x01] {
        table.insert(Node::new(id_with_last(last), addr(last, 6881)));
    }

    let target = NodeId([0u8; 20]);
    let nearest = table.neighbors(&target, 2);
    assert_eq!(nearest.len(), 2);
    assert_eq!(nearest[0].id, id_with_last(0x01));
    assert_eq!(nearest[1].id, id_with_last(0x02));
}

#[test]
fn routing_standard_respects_bucket_cap() {
    // Local id far from the inserted cluster, so their bucket can't split.
    let mut local = [0u8; 20];
    local[0] = 0x80;
    let table = standard_table(NodeId(local));

    for i in 0..50u8 {
        let mut bytes = [0u8; 20];
        bytes[1] = i;
        table.insert(Node::new(NodeId(bytes), addr(i, 6881)));
    }

    // All candidates share the leading 0 bit; one foreign bucket caps them.
    assert!(table.len() <= 8);
}

#[test]
fn routing_splits_around_local_id() {
    let local = NodeId([0u8; 20]);
    let table = standard_table(local);

    for i in 1..=64u8 {
        let mut bytes = [0u8; 20];
        bytes[0] = i;
        bytes[19] = i;
        table.insert(Node::new(NodeId(bytes), addr(i, 6881)));
    }

    // The bucket containing the local id keeps splitting, so far more than
    // a single bucket's worth survive.
    assert!(table.len() > 8, "len = {}", table.len());
}

#[test]
fn routing_crawl_overfills_and_evicts_at_max_nodes() {
    let table = RoutingTable::new(
        NodeId([0u8; 20]),
        usize::MAX,
        100,
        true,
        Duration::ZERO,
        Duration::ZERO,
    );

    for i in 0..150u16 {
        let mut bytes = [0xC0u8; 20];
        bytes[18] = (i >> 8) as u8;
        bytes[19] = i as u8;
        table.insert(Node::new(NodeId(bytes), addr(i as u8, 6881)));
    }

    // Unbounded bucket, but the table-wide cap holds.
    assert_eq!(table.len(), 100);
}

#[test]
fn routing_insert_then_touch_is_idempotent() {
    let table = standard_table(NodeId([0u8; 20]));
    let id = id_with_last(5);

    table.insert(Node::new(id, addr(5, 6881)));
    table.touch(id, addr(5, 6881));

    assert_eq!(table.len(), 1);
}

#[test]
fn routing_remove() {
    let table = standard_table(NodeId([0u8; 20]));
    let id = id_with_last(5);

    table.insert(Node::new(id, addr(5, 6881)));
    table.remove(&id);
    assert!(table.is_empty());
}

#[test]
fn routing_refresh_plan_targets_stale_buckets() {
    let table = RoutingTable::new(
        NodeId([0u8; 20]),
        usize::MAX,
        5000,
        true,
        Duration::ZERO,
        Duration::ZERO, // always stale
    );

    table.insert(Node::new(id_with_last(1), addr(1, 6881)));
    table.insert(Node::new(id_with_last(2), addr(2, 6881)));

    let plan = table.refresh_plan(4);
    assert_eq!(plan.len(), 4);
    for (node, _target) in &plan {
        assert!(node.id == id_with_last(1) || node.id == id_with_last(2));
    }
}

#[test]
fn transaction_resolves_only_matching_addr() {
    let manager = TransactionManager::new(u32::MAX);
    let node = Node::new(id_with_last(1), addr(1, 6881));

    let tid = manager.next_tid();
    manager.register(tid, node, KrpcQuery::Ping);
    assert_eq!(manager.len(), 1);

    // Same tid, different remote: spoof, must not resolve.
    assert!(manager.resolve(addr(2, 6881), &encode_tid(tid)).is_none());
    assert_eq!(manager.len(), 1);

    let resolved = manager.resolve(addr(1, 6881), &encode_tid(tid)).unwrap();
    assert_eq!(resolved.tid, tid);
    assert!(manager.is_empty());
}

#[test]
fn transaction_cursor_wraps() {
    let manager = TransactionManager::new(2);
    assert_eq!(manager.next_tid(), 0);
    assert_eq!(manager.next_tid(), 1);
    assert_eq!(manager.next_tid(), 2);
    assert_eq!(manager.next_tid(), 0);
}

#[test]
fn transaction_retry_then_fail() {
    let manager = TransactionManager::new(u32::MAX);
    let node = Node::new(id_with_last(1), addr(1, 6881));

    let tid = manager.next_tid();
    manager.register(tid, node, KrpcQuery::Ping);

    // Fresh transaction: nothing due yet.
    let (retries, failed) = manager.take_expired(2);
    assert!(retries.is_empty() && failed.is_empty());
    assert_eq!(manager.len(), 1);

    // First deadline: one retry left in the budget.
    manager.force_expire_all();
    let (retries, failed) = manager.take_expired(2);
    assert_eq!(retries.len(), 1);
    assert_eq!(retries[0].attempts, 2);
    assert!(failed.is_empty());
    assert_eq!(manager.len(), 1);

    // Second deadline: budget exhausted, transaction fails out.
    manager.force_expire_all();
    let (retries, failed) = manager.take_expired(2);
    assert!(retries.is_empty());
    assert_eq!(failed.len(), 1);
    assert!(manager.is_empty());
}

#[test]
fn tid_codec_roundtrip() {
    for tid in [0u32, 1, 0xAABB, u32::MAX] {
        assert_eq!(decode_tid(&encode_tid(tid)), Some(tid));
    }

    // Short transaction ids from other implementations still decode.
    assert_eq!(decode_tid(&[0xAA]), Some(0xAA));
    assert_eq!(decode_tid(&[0x01, 0x02]), Some(0x0102));
    assert_eq!(decode_tid(&[]), None);
    assert_eq!(decode_tid(&[0u8; 5]), None);
}

#[test]
fn token_round_trip() {
    let tokens = TokenManager::new(Duration::from_secs(600));
    let ip = IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4));

    let token = tokens.issue(ip);
    assert!(tokens.verify(ip, &token));
    assert_eq!(tokens.issued_len(), 1);

    // Token issued for one IP must not verify for another.
    assert!(!tokens.verify(IpAddr::V4(Ipv4Addr::new(5, 6, 7, 8)), &token));
}

#[test]
fn token_previous_bucket_accepted_older_rejected() {
    let tokens = TokenManager::new(Duration::from_secs(600));
    let ip = IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4));
    let bucket = tokens.bucket_now();

    assert!(tokens.verify(ip, &tokens.token_for_bucket(ip, bucket)));
    assert!(tokens.verify(ip, &tokens.token_for_bucket(ip, bucket - 1)));
    assert!(!tokens.verify(ip, &tokens.token_for_bucket(ip, bucket - 2)));
    assert!(!tokens.verify(ip, &tokens.token_for_bucket(ip, bucket + 1)));
}

#[test]
fn blacklist_host_wildcard() {
    let bans = BlackList::new(16, BLACKLIST_EXPIRED_AFTER);
    let ip = IpAddr::V4(Ipv4Addr::new(9, 9, 9, 9));

    bans.insert(ip, None);
    assert!(bans.contains(ip, 6881));
    assert!(bans.contains(ip, 1));

    let other = IpAddr::V4(Ipv4Addr::new(9, 9, 9, 10));
    bans.insert(other, Some(6881));
    assert!(bans.contains(other, 6881));
    assert!(!bans.contains(other, 6882));
}

#[test]
fn blacklist_evicts_oldest_at_capacity() {
    let bans = BlackList::new(3, BLACKLIST_EXPIRED_AFTER);

    for i in 1..=4u8 {
        bans.insert(IpAddr::V4(Ipv4Addr::new(10, 0, 0, i)), None);
    }

    assert_eq!(bans.len(), 3);
    // The first entry was the oldest and is gone.
    assert!(!bans.contains(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 6881));
    assert!(bans.contains(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 4)), 6881));
}

#[test]
fn peers_manager_deduplicates_announces() {
    let peers = PeersManager::new(64);
    let hash = [0xAB; 20];
    let peer = addr(1, 6881);

    assert!(peers.insert(hash, peer));
    assert!(!peers.insert(hash, peer));

    assert_eq!(peers.get(&hash, 8), vec![peer]);
    assert_eq!(peers.peer_count(&hash), 1);
    assert_eq!(peers.hash_count(), 1);
}

fn loopback_config() -> DhtConfig {
    let mut config = DhtConfig::standard();
    config.address = "127.0.0.1:0".to_string();
    config.prime_nodes = Vec::new();
    config
}

#[tokio::test]
async fn get_peers_before_run_is_not_ready() {
    let dht = Dht::bind(loopback_config()).await.unwrap();
    let result = dht
        .get_peers("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")
        .await;
    assert!(matches!(result, Err(DhtError::NotReady)));
}

#[tokio::test]
async fn bind_rejects_bad_address() {
    let mut config = DhtConfig::standard();
    config.address = "definitely-not-an-address".to_string();
    assert!(matches!(
        Dht::bind(config).await,
        Err(DhtError::InvalidAddress(_))
    ));
}

#[tokio::test]
async fn engine_answers_ping() {
    let dht = Dht::bind(loopback_config()).await.unwrap();
    let local = dht.local_addr().unwrap();
    let handle = tokio::spawn(dht.clone().run());

    let sock = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let ping = KrpcMessage::query(encode_tid(1), NodeId::random(), KrpcQuery::Ping);
    sock.send_to(&ping.encode(), local).await.unwrap();

    let mut buf = [0u8; 1024];
    let (n, from) = tokio::time::timeout(Duration::from_secs(5), sock.recv_from(&mut buf))
        .await
        .expect("no pong")
        .unwrap();
    assert_eq!(from, local);

    let reply = KrpcMessage::parse(&buf[..n]).unwrap();
    assert_eq!(reply.transaction_id, encode_tid(1));
    let KrpcBody::Response(body) = reply.body else {
        panic!("expected response, got {:?}", reply.body);
    };
    assert_eq!(body.id, Some(*dht.our_id()));

    dht.stop().await;
    let _ = handle.await;
}

#[tokio::test]
async fn engine_surfaces_announce_and_answers_get_peers() {
    let mut config = loopback_config();
    // Crawl mode: announce accepted without a valid token.
    config.mode = DhtMode::Crawl;
    config.k_bucket_size = usize::MAX;

    let dht = Dht::bind(config).await.unwrap();
    let mut events = dht.subscribe();
    let local = dht.local_addr().unwrap();
    let handle = tokio::spawn(dht.clone().run());

    let sock = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let info_hash = [0x5Au8; 20];

    // get_peers must yield a token + a GetPeers event.
    let query = KrpcMessage::query(
        encode_tid(7),
        NodeId::random(),
        KrpcQuery::GetPeers { info_hash },
    );
    sock.send_to(&query.encode(), local).await.unwrap();

    let mut buf = [0u8; 2048];
    let (n, _) = tokio::time::timeout(Duration::from_secs(5), sock.recv_from(&mut buf))
        .await
        .expect("no get_peers response")
        .unwrap();
    let reply = KrpcMessage::parse(&buf[..n]).unwrap();
    let KrpcBody::Response(body) = reply.body else {
        panic!("expected response");
    };
    let token = body.token.expect("token missing from get_peers response");

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("no event")
        .unwrap();
    assert!(matches!(event, DhtEvent::GetPeers { info_hash: h, .. } if h == info_hash));

    // announce_peer with the issued token: stored peer + event.
    let announce = KrpcMessage::query(
        encode_tid(8),
        NodeId::random(),
        KrpcQuery::AnnouncePeer {
            info_hash,
            port: 7777,
            token,
            implied_port: false,
        },
    );
    sock.send_to(&announce.encode(), local).await.unwrap();

    let (n, _) = tokio::time::timeout(Duration::from_secs(5), sock.recv_from(&mut buf))
        .await
        .expect("no announce response")
        .unwrap();
    assert!(KrpcMessage::parse(&buf[..n]).is_ok());

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("no announce event")
        .unwrap();
    match event {
        DhtEvent::AnnouncePeer { info_hash: h, peer } => {
            assert_eq!(h, info_hash);
            assert_eq!(peer.port(), 7777);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    dht.stop().await;
    let _ = handle.await;
}

#[test]
fn krpc_query_roundtrip() {
    let msg = KrpcMessage::query(
        encode_tid(7),
        NodeId([1u8; 20]),
        KrpcQuery::GetPeers {
            info_hash: [0xCD; 20],
        },
    );

    let parsed = KrpcMessage::parse(&msg.encode()).unwrap();
    assert_eq!(parsed.transaction_id, encode_tid(7));
    match parsed.body {
        KrpcBody::Query {
            sender,
            query: KrpcQuery::GetPeers { info_hash },
        } => {
            assert_eq!(sender, NodeId([1u8; 20]));
            assert_eq!(info_hash, [0xCD; 20]);
        }
        other => panic!("unexpected body: {other:?}"),
    }
}

#[test]
fn krpc_response_roundtrip() {
    let body = KrpcResponseBody {
        id: Some(NodeId([2u8; 20])),
        nodes: vec![Node::new(NodeId([3u8; 20]), addr(3, 6883))],
        peers: vec![addr(4, 6884)],
        token: Some(bytes::Bytes::from_static(b"tok")),
    };

    let msg = KrpcMessage::response(encode_tid(9), body);
    let parsed = KrpcMessage::parse(&msg.encode()).unwrap();

    let KrpcBody::Response(parsed) = parsed.body else {
        panic!("expected response");
    };
    assert_eq!(parsed.id, Some(NodeId([2u8; 20])));
    assert_eq!(parsed.nodes.len(), 1);
    assert_eq!(parsed.peers, vec![addr(4, 6884)]);
    assert_eq!(parsed.token.as_deref(), Some(b"tok".as_slice()));
}

#[test]
fn krpc_rejects_malformed() {
    assert!(KrpcMessage::parse(b"not bencode").is_err());
    assert!(KrpcMessage::parse(b"d1:t2:aae").is_err()); // no message type
    assert!(KrpcMessage::parse(b"de").is_err()); // no transaction id
}

#[test]
fn krpc_announce_roundtrip() {
    let msg = KrpcMessage::query(
        encode_tid(1),
        NodeId([1u8; 20]),
        KrpcQuery::AnnouncePeer {
            info_hash: [9u8; 20],
            port: 51413,
            token: bytes::Bytes::from_static(b"secret"),
            implied_port: true,
        },
    );

    let parsed = KrpcMessage::parse(&msg.encode()).unwrap();
    let KrpcBody::Query {
        query:
            KrpcQuery::AnnouncePeer {
                info_hash,
                port,
                token,
                implied_port,
            },
        ..
    } = parsed.body
    else {
        panic!("expected announce_peer");
    };
    assert_eq!(info_hash, [9u8; 20]);
    assert_eq!(port, 51413);
    assert_eq!(token.as_ref(), b"secret");
    assert!(implied_port);
}

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};

use peerlink::negotiation::{IceCandidate, PeerSignal, SdpType, SessionDescription};
use peerlink::room::{ControlCommand, RoomMessage};

const OFFER_SDP: &str = "v=0\r\no=- 4611731400430051336 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\na=group:BUNDLE 0\r\nm=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\nc=IN IP4 0.0.0.0\r\na=ice-ufrag:abcd\r\na=ice-pwd:abcdefghijklmnopqrstuvwx\r\na=fingerprint:sha-256 00:11:22:33:44:55:66:77:88:99:AA:BB:CC:DD:EE:FF:00:11:22:33:44:55:66:77:88:99:AA:BB:CC:DD:EE:FF\r\na=setup:actpass\r\na=mid:0\r\na=sctp-port:5000\r\n";

/// relay control line parsing benchmark
fn bench_room_messages(c: &mut Criterion) {
    let mut group = c.benchmark_group("RoomMessage");
    group.throughput(Throughput::Elements(1));

    group.bench_function("control", |b| {
        b.iter(|| black_box(RoomMessage::parse(black_box("INVALID ROOM 42"))))
    });

    let candidate = PeerSignal::Candidate(IceCandidate::new(
        "candidate:1 1 udp 2122260223 192.168.1.2 54321 typ host",
    ))
    .encode()
    .unwrap();
    group.bench_function("opaque", |b| {
        b.iter(|| black_box(RoomMessage::parse(black_box(&candidate))))
    });

    group.bench_function("command", |b| {
        b.iter(|| black_box(ControlCommand::parse(black_box("JOIN 12345"))))
    });

    group.finish();
}

/// peer signal decoding benchmark
fn bench_peer_signals(c: &mut Criterion) {
    let offer = PeerSignal::Sdp(SessionDescription::new(SdpType::Offer, OFFER_SDP))
        .encode()
        .unwrap();
    let candidate = r#"{"candidate":{"candidate":"candidate:1 1 udp 2122260223 192.168.1.2 54321 typ host","sdpMid":"0","sdpMLineIndex":0}}"#;

    let mut group = c.benchmark_group("PeerSignal");
    group.throughput(Throughput::Elements(1));

    group.bench_function("decode_offer", |b| {
        b.iter(|| black_box(PeerSignal::decode(black_box(&offer)).unwrap()))
    });

    group.bench_function("decode_candidate", |b| {
        b.iter(|| black_box(PeerSignal::decode(black_box(candidate)).unwrap()))
    });

    group.finish();
}

criterion_group!(benches, bench_room_messages, bench_peer_signals);
criterion_main!(benches);

use criterion::{Criterion, Throughput};
use picolink::network::application::mqtt::QoS;
use picolink::network::application::mqtt::packet::{self, PacketBuf};
use std::hint::black_box;

const PAYLOAD: &[u8] = b"Hello from Pico!";

pub fn bench_encode_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Bytes(PAYLOAD.len() as u64));
    group.bench_function("publish_qos0", |b| {
        b.iter(|| {
            let mut buf = PacketBuf::new();
            packet::encode_publish(
                &mut buf,
                black_box("pico/topic"),
                black_box(PAYLOAD),
                QoS::AtMostOnce,
                false,
                None,
            )
            .expect("Failed to encode");
            buf
        });
    });
    group.bench_function("publish_qos1", |b| {
        b.iter(|| {
            let mut buf = PacketBuf::new();
            packet::encode_publish(
                &mut buf,
                black_box("pico/topic"),
                black_box(PAYLOAD),
                QoS::AtLeastOnce,
                false,
                Some(7),
            )
            .expect("Failed to encode");
            buf
        });
    });
    group.finish();
}

pub fn bench_decode_publish(c: &mut Criterion) {
    let mut raw = PacketBuf::new();
    packet::encode_publish(&mut raw, "pico/topic", &[0x5A; 512], QoS::AtMostOnce, false, None)
        .expect("Failed to encode");

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(raw.len() as u64));
    group.bench_function("publish_512", |b| {
        b.iter(|| {
            let len = packet::frame_len(black_box(&raw)).unwrap().unwrap();
            packet::decode(&raw[..len]).expect("Failed to decode");
        });
    });
    group.finish();
}

use criterion::{criterion_group, criterion_main};

mod network;

criterion_group!(
    benches,
    network::application::mqtt::packet::bench_encode_publish,
    network::application::mqtt::packet::bench_decode_publish,
    network::application::mqtt::session::bench_heartbeat_publish,
    network::application::mqtt::session::bench_service_inbound
);
criterion_main!(benches);

use criterion::{BatchSize, Criterion, Throughput};
use picolink::event::EventQueue;
use picolink::network::application::mqtt::{QoS, SessionManager};
use picolink::network::error::Error;
use picolink::network::{Close, Connect, Connection, Read, Write};
use picolink::time::Instant;
use std::collections::VecDeque;
use std::net::SocketAddrV4;

/// In-memory stream: reads drain `inbound`, writes are counted and dropped.
struct LoopbackConnection {
    inbound: VecDeque<u8>,
    written: usize,
}

impl Read for LoopbackConnection {
    type Error = Error;
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let len = buf.len().min(self.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(self.inbound.drain(..len)) {
            *slot = byte;
        }
        Ok(len)
    }
}

impl Write for LoopbackConnection {
    type Error = Error;
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.written += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Close for LoopbackConnection {
    type Error = Error;
    fn close(self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Connection for LoopbackConnection {}

/// Hands out a connection whose first bytes are a CONNACK.
struct LoopbackConnector;

impl Connect for LoopbackConnector {
    type Connection = LoopbackConnection;
    type Error = Error;

    fn connect(&mut self, _remote: SocketAddrV4) -> Result<Self::Connection, Self::Error> {
        Ok(LoopbackConnection {
            inbound: VecDeque::from(vec![0x20, 2, 0, 0]),
            written: 0,
        })
    }
}

fn setup_session() -> SessionManager<LoopbackConnection> {
    let mut session = SessionManager::new("pico/topic", QoS::AtMostOnce).expect("Failed to create");
    session
        .connect(&mut LoopbackConnector, "127.0.0.1", 1883, "picolink-bench", 60, Instant::ZERO)
        .expect("Failed to connect");
    let mut events = EventQueue::new();
    session.service(Instant::ZERO, &mut events);
    while let Some(picolink::event::Event::Session(status)) = events.pop() {
        session.on_status_change(status, Instant::ZERO);
    }
    session
}

pub fn bench_heartbeat_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("session");
    let payload = b"Hello from Pico!";
    group.throughput(Throughput::Bytes(payload.len() as u64));
    let mut session = setup_session();
    group.bench_function("heartbeat_publish", |b| {
        b.iter(|| {
            session
                .publish("pico/topic", payload, QoS::AtMostOnce, false, Instant::ZERO)
                .expect("Failed to publish");
        });
    });
    group.finish();
}

pub fn bench_service_inbound(c: &mut Criterion) {
    let mut inbound = vec![0x30, 14, 0, 10];
    inbound.extend_from_slice(b"pico/topic");
    inbound.extend_from_slice(b"on");

    let mut group = c.benchmark_group("session");
    group.throughput(Throughput::Elements(4));
    group.bench_function("service_4_inbound", |b| {
        b.iter_batched_ref(
            || {
                let mut session = setup_session();
                if let Some(conn) = session.connection_mut() {
                    for _ in 0..4 {
                        conn.inbound.extend(inbound.iter().copied());
                    }
                }
                (session, EventQueue::new())
            },
            |(session, events)| {
                session.service(Instant::ZERO, events);
                assert_eq!(events.len(), 4);
            },
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

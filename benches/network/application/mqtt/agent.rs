use std::collections::VecDeque;
use std::hint::black_box;

use criterion::{BatchSize, Criterion, Throughput};
use mqtt_agent::network::application::mqtt::agent::{
    Agent, AgentConfig, AgentHandle, ConnectionHandle, SubscribeList,
};
use mqtt_agent::network::application::mqtt::clock::{self, GetCurrentTimeMs};
use mqtt_agent::network::application::mqtt::engine::{AckKind, IncomingEvent, ProtocolEngine};
use mqtt_agent::network::application::mqtt::{
    topic, ConnectInfo, Error, PublishInfo, QoS, SubscribeInfo,
};
use mqtt_agent::network::{Close, Connection, Read, Write};

const CONNECTION: ConnectionHandle = ConnectionHandle(0);

struct NullConnection;

impl Read for NullConnection {
    type Error = mqtt_agent::network::error::Error;
    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(0)
    }
}

impl Write for NullConnection {
    type Error = mqtt_agent::network::error::Error;
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Close for NullConnection {
    type Error = mqtt_agent::network::error::Error;
    fn close(self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Connection for NullConnection {}

enum Loopback {
    Publish(PublishInfo),
    Ack(AckKind, u16),
}

/// Engine acting as its own broker: acknowledges every tracked packet and
/// echoes publishes back, one per process-loop iteration.
struct LoopbackEngine {
    transport: NullConnection,
    next_packet_id: u16,
    inbound: VecDeque<Loopback>,
}

impl LoopbackEngine {
    fn allocate(&mut self) -> u16 {
        self.next_packet_id = self.next_packet_id.wrapping_add(1).max(1);
        self.next_packet_id
    }
}

impl ProtocolEngine for LoopbackEngine {
    type Transport = NullConnection;

    fn bind(transport: NullConnection, _clock: GetCurrentTimeMs) -> Result<Self, Error> {
        Ok(Self {
            transport,
            next_packet_id: 0,
            inbound: VecDeque::new(),
        })
    }

    fn connect(
        &mut self,
        _info: &ConnectInfo<'_>,
        _will: Option<&PublishInfo>,
        _timeout_ms: u32,
    ) -> Result<bool, Error> {
        self.transport.write(&[0x10])?;
        Ok(false)
    }

    fn subscribe(&mut self, _subscriptions: &[SubscribeInfo]) -> Result<u16, Error> {
        let packet_id = self.allocate();
        self.inbound.push_back(Loopback::Ack(AckKind::Suback, packet_id));
        Ok(packet_id)
    }

    fn unsubscribe(&mut self, _subscriptions: &[SubscribeInfo]) -> Result<u16, Error> {
        let packet_id = self.allocate();
        self.inbound.push_back(Loopback::Ack(AckKind::Unsuback, packet_id));
        Ok(packet_id)
    }

    fn publish(&mut self, publish: &PublishInfo) -> Result<Option<u16>, Error> {
        self.transport.write(&publish.payload)?;
        self.inbound.push_back(Loopback::Publish(publish.clone()));
        if !publish.qos.expects_ack() {
            return Ok(None);
        }
        let packet_id = self.allocate();
        self.inbound.push_back(Loopback::Ack(AckKind::Puback, packet_id));
        Ok(Some(packet_id))
    }

    fn republish(&mut self, publish: &PublishInfo, _packet_id: u16) -> Result<(), Error> {
        self.transport.write(&publish.payload)?;
        Ok(())
    }

    fn process_loop(
        &mut self,
        _timeout_ms: u32,
        on_event: &mut dyn FnMut(IncomingEvent<'_>),
    ) -> Result<(), Error> {
        match self.inbound.pop_front() {
            Some(Loopback::Publish(publish)) => on_event(IncomingEvent::Publish(&publish)),
            Some(Loopback::Ack(kind, packet_id)) => on_event(IncomingEvent::Ack {
                kind,
                packet_id,
                result: Ok(()),
            }),
            None => {}
        }
        Ok(())
    }

    fn ping(&mut self) -> Result<(), Error> {
        self.transport.write(&[0xc0, 0x00])?;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), Error> {
        self.transport.write(&[0xe0, 0x00])?;
        Ok(())
    }

    fn release(self) -> Result<(), Error> {
        self.transport.close()?;
        Ok(())
    }
}

fn setup_agent(queue_length: usize) -> (Agent<LoopbackEngine>, AgentHandle) {
    let config = AgentConfig {
        queue_length,
        ..AgentConfig::default()
    };
    let (mut agent, handle) = Agent::<LoopbackEngine>::new(config);
    agent
        .init(CONNECTION, NullConnection, clock::monotonic_ms, |_| {})
        .expect("Failed to init");
    let info = ConnectInfo {
        client_id: "libiot-bench-agent",
        keep_alive_seconds: 10,
        clean_session: true,
        user_name: None,
        password: None,
    };
    let session_present = agent
        .connect(CONNECTION, &info, None, 1000)
        .expect("Failed to connect");
    agent
        .resume_session(CONNECTION, session_present)
        .expect("Failed to resume");
    (agent, handle)
}

fn run(agent: &mut Agent<LoopbackEngine>, handle: &AgentHandle) {
    handle.terminate().expect("Failed to submit terminate");
    assert!(agent.command_loop().is_none());
}

pub fn bench_topic_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("topic_matching");
    let cases = [
        ("sensors/+/temp", "sensors/42/temp"),
        ("sensors/#", "sensors/42/temp/raw"),
        ("a/b/c/d/e/f", "a/b/c/d/e/f"),
        ("+/+/+", "$SYS/broker/uptime"),
    ];
    group.throughput(Throughput::Elements(cases.len() as u64));
    group.bench_function("matches", |b| {
        b.iter(|| {
            for (filter, name) in &cases {
                black_box(topic::matches(black_box(filter), black_box(name)));
            }
        })
    });
    group.finish();
}

pub fn bench_dispatch_qos0(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_qos0");
    let payload = b"hello from dispatch";
    group.throughput(Throughput::Elements(20));
    group.bench_function("publish_x20", |b| {
        b.iter_batched_ref(
            || setup_agent(32),
            |(agent, handle)| {
                for _ in 0..20 {
                    let publish = PublishInfo::new("libiot/bench-topic", payload, QoS::AtMostOnce)
                        .expect("Failed to build publish");
                    handle
                        .publish(CONNECTION, publish, |result| {
                            black_box(result).expect("Failed to publish");
                        })
                        .expect("Failed to submit publish");
                }
                run(agent, handle);
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

pub fn bench_publish_ack_cycle_qos1(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish_ack_cycle_qos1");
    let payload = b"hello world from bench qos1";
    group.throughput(Throughput::Bytes(payload.len() as u64 * 10));
    group.bench_function("publish_and_poll_x10", |b| {
        b.iter_batched_ref(
            || setup_agent(32),
            |(agent, handle)| {
                for _ in 0..10 {
                    let publish =
                        PublishInfo::new("libiot/bench-topic-qos1", payload, QoS::AtLeastOnce)
                            .expect("Failed to build publish");
                    handle
                        .publish(CONNECTION, publish, |_| {})
                        .expect("Failed to submit publish");
                }
                // One iteration for the echoed publish, one for its PUBACK.
                for _ in 0..20 {
                    handle
                        .process_loop(CONNECTION, |_| {})
                        .expect("Failed to submit poll");
                }
                run(agent, handle);
                assert_eq!(agent.pending_acks(CONNECTION), 0);
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

pub fn bench_route_inbound_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("route_inbound_publish");
    group.bench_function("subscribed_x8", |b| {
        b.iter_batched_ref(
            || {
                let (mut agent, handle) = setup_agent(32);
                let filters: SubscribeList = [
                    "home/+/temp",
                    "home/#",
                    "garage/door",
                    "plant/+/moisture",
                    "+/+/humidity",
                    "alarm",
                    "meter/#",
                    "libiot/bench-topic",
                ]
                .iter()
                .map(|filter| SubscribeInfo::new(filter, QoS::AtMostOnce).expect("Bad filter"))
                .collect();
                handle
                    .subscribe(CONNECTION, filters, |publish: &PublishInfo| {
                        black_box(publish.payload.len());
                    }, |_| {})
                    .expect("Failed to submit subscribe");
                handle
                    .process_loop(CONNECTION, |_| {})
                    .expect("Failed to submit poll");
                run(&mut agent, &handle);
                (agent, handle)
            },
            |(agent, handle)| {
                let publish = PublishInfo::new("home/kitchen/temp", b"21.5", QoS::AtMostOnce)
                    .expect("Failed to build publish");
                handle
                    .publish(CONNECTION, publish, |_| {})
                    .expect("Failed to submit publish");
                // The re-armed poll delivers the echoed publish on the second run.
                run(agent, handle);
                run(agent, handle);
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

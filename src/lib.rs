//! # libiot-mqtt-agent - serialized MQTT sessions for IoT devices
//!
//! MQTT client sessions are stateful and single-threaded: packet identifiers,
//! in-flight acknowledgments and subscription state must never be touched by
//! two threads at once. This crate puts every such session behind one worker,
//! the *agent*, which drains a bounded command queue and is the only code that
//! ever drives a protocol engine.
//!
//! ## Architecture
//!
//! ```text
//!  caller threads                       agent thread
//! ┌──────────────┐  submit   ┌───────────────┐  take   ┌──────────────────────┐
//! │ AgentHandle  │ ────────▶ │ Command Queue │ ──────▶ │ Agent::command_loop  │
//! │ (clonable)   │           │ (bounded MPSC)│         │  ├─ Connection Table │
//! └──────────────┘           └───────────────┘         │  │  ├─ engine        │
//!        ▲                                             │  │  ├─ subscriptions │
//!        │            completion callbacks             │  │  └─ pending acks  │
//!        └──────────────────────────────────────────── └──────────────────────┘
//! ```
//!
//! - **Transport binding**: [`network`] traits a protocol engine reads and
//!   writes through. The agent never calls them directly.
//! - **Protocol engine**: [`ProtocolEngine`](network::application::mqtt::engine::ProtocolEngine),
//!   the MQTT codec and state machine for one connection.
//! - **Agent**: [`Agent`](network::application::mqtt::agent::Agent) owns all
//!   per-connection state; [`AgentHandle`](network::application::mqtt::agent::AgentHandle)
//!   is the thread-safe submission side.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mqtt_agent::network::application::mqtt::agent::{Agent, AgentConfig, ConnectionHandle};
//! use mqtt_agent::network::application::mqtt::{clock, ConnectInfo, PublishInfo, QoS};
//! # use mqtt_agent::network::application::mqtt::engine::ProtocolEngine;
//! # fn run<E: ProtocolEngine + 'static>(transport: E::Transport) -> Result<(), mqtt_agent::network::application::mqtt::Error> {
//!
//! let (mut agent, handle) = Agent::<E>::new(AgentConfig::default());
//! let connection = ConnectionHandle(0);
//!
//! agent.init(connection, transport, clock::monotonic_ms, |publish| {
//!     log::info!("unsolicited publish on {}", publish.topic);
//! })?;
//!
//! let info = ConnectInfo {
//!     client_id: "sensor_node_1",
//!     keep_alive_seconds: 60,
//!     clean_session: true,
//!     user_name: None,
//!     password: None,
//! };
//! let session_present = agent.connect(connection, &info, None, 5_000)?;
//! agent.resume_session(connection, session_present)?;
//!
//! handle.process_loop(connection, |_| {}).ok();
//! let worker = std::thread::spawn(move || (agent.command_loop(), agent));
//!
//! let reading = PublishInfo::new("sensors/temperature", b"23.5", QoS::AtLeastOnce)?;
//! handle
//!     .publish(connection, reading, |result| log::info!("publish completed: {:?}", result))
//!     .ok();
//!
//! handle.terminate().ok();
//! let (failed, _agent) = worker.join().expect("agent thread panicked");
//! assert!(failed.is_none());
//! # Ok(())
//! # }
//! ```
//!
//! ## Optional Features
//!
//! - `defmt`: Enable defmt formatting for the error types

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![doc(html_root_url = "https://shishir-dey.github.io/libiot/")]

/// Network abstraction layer: the transport binding a protocol engine works
/// over, and the MQTT agent built on top of it.
pub mod network;

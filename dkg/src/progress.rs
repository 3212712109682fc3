//! Optional, zero-cost-when-absent progress tracing for round-based protocols.
//!
//! Mirrors the instrumentation shape used throughout DKG, USS signing,
//! Bootstrap, and PeerIntroduction: callers pass `Option<&mut dyn Tracer>` and
//! call the same handful of lifecycle methods regardless of whether tracing is
//! enabled, via the blanket impl below.

/// Receives lifecycle callbacks from a running protocol.
///
/// Implementors typically accumulate timing or a human-readable trace; the
/// default no-op impl on `Option<&mut dyn Tracer>` means call sites never need
/// to branch on whether a tracer was supplied.
pub trait Tracer {
    fn protocol_begins(&mut self) {}
    fn protocol_ends(&mut self) {}
    fn round_begins(&mut self) {}
    fn stage(&mut self, _name: &str) {}
    fn send_msg(&mut self) {}
    fn msg_sent(&mut self) {}
    fn receive_msgs(&mut self) {}
    fn msgs_received(&mut self) {}
}

impl Tracer for Option<&mut dyn Tracer> {
    fn protocol_begins(&mut self) {
        if let Some(t) = self {
            t.protocol_begins()
        }
    }
    fn protocol_ends(&mut self) {
        if let Some(t) = self {
            t.protocol_ends()
        }
    }
    fn round_begins(&mut self) {
        if let Some(t) = self {
            t.round_begins()
        }
    }
    fn stage(&mut self, name: &str) {
        if let Some(t) = self {
            t.stage(name)
        }
    }
    fn send_msg(&mut self) {
        if let Some(t) = self {
            t.send_msg()
        }
    }
    fn msg_sent(&mut self) {
        if let Some(t) = self {
            t.msg_sent()
        }
    }
    fn receive_msgs(&mut self) {
        if let Some(t) = self {
            t.receive_msgs()
        }
    }
    fn msgs_received(&mut self) {
        if let Some(t) = self {
            t.msgs_received()
        }
    }
}

/// A [`Tracer`] that records every stage name in order, for assertions in
/// tests.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    pub events: Vec<String>,
}

impl Tracer for RecordingTracer {
    fn protocol_begins(&mut self) {
        self.events.push("protocol_begins".into());
    }
    fn protocol_ends(&mut self) {
        self.events.push("protocol_ends".into());
    }
    fn round_begins(&mut self) {
        self.events.push("round_begins".into());
    }
    fn stage(&mut self, name: &str) {
        self.events.push(format!("stage:{name}"));
    }
    fn send_msg(&mut self) {
        self.events.push("send_msg".into());
    }
    fn msg_sent(&mut self) {
        self.events.push("msg_sent".into());
    }
    fn receive_msgs(&mut self) {
        self.events.push("receive_msgs".into());
    }
    fn msgs_received(&mut self) {
        self.events.push("msgs_received".into());
    }
}

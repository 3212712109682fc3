use liun_field::FieldElement;

/// A node identifier: a distinct nonzero field element, by convention
/// `1, 2, 3, ...` in committee order.
pub type NodeId = FieldElement;

/// The capability DKG needs from the external ITS key-channel primitive:
/// per-peer Wegman-Carter MAC compute/verify tagged by run index. Expressed
/// as a narrow capability interface, never as inheritance, so this crate
/// never depends on a concrete channel implementation or transport — that
/// lives in the orchestrating crate.
pub trait ChannelAuthority {
    /// The current run index of the channel to `peer`.
    fn run_idx(&self, peer: NodeId) -> u64;

    /// Computes the MAC tag for `data` over the channel to `peer` at its
    /// current run index.
    fn mac(&self, peer: NodeId, data: &[u8]) -> FieldElement;

    /// Verifies a MAC tag received from `peer`, tagged at `run_idx`. Returns
    /// `false` both for a genuine forgery and for a stale/replayed run index:
    /// recipients must reject any message whose run_idx is less than the
    /// last-accepted run_idx.
    fn verify_mac(&self, peer: NodeId, data: &[u8], run_idx: u64, tag: FieldElement) -> bool;
}

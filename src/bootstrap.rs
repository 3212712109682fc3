//! Multi-path bootstrap: a new node with no existing channels reaches a
//! public candidate list, Shamir-splits a fresh secret per candidate across
//! diverse routes, and opens a channel once enough routes prove clean.

use crate::channel::{NodeId, SimulatedChannel};
use crate::expand::expand_psk;
use liun_field::FieldElement;
use liun_shamir::{self, ShamirShare};
use rand_core::{CryptoRng, RngCore};
use thiserror::Error;

/// Metadata used by diversity scoring; real deployments would carry AS
/// number, geography, and transport type. The only real requirement is that
/// *some* selection function exists over peer metadata — these fields are a
/// representative stand-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateMetadata {
    pub route_prefix: String,
    pub jurisdiction: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: NodeId,
    pub metadata: CandidateMetadata,
}

/// Selects bootstrap candidates maximizing route/jurisdiction diversity.
/// Implementation-defined — this crate only commits to the interface.
pub trait DiversityScorer {
    fn select(&self, candidates: &[Candidate], k: usize) -> Vec<Candidate>;
}

/// A greedy scorer that prefers candidates whose `(jurisdiction,
/// route_prefix)` pair hasn't been picked yet, falling back to whatever
/// remains once all pairs are exhausted.
pub struct RouteJurisdictionDiversity;

impl DiversityScorer for RouteJurisdictionDiversity {
    fn select(&self, candidates: &[Candidate], k: usize) -> Vec<Candidate> {
        let mut seen_pairs = std::collections::HashSet::new();
        let mut chosen = Vec::with_capacity(k.min(candidates.len()));
        let mut leftover = Vec::new();

        for c in candidates {
            if chosen.len() >= k {
                break;
            }
            let pair = (c.metadata.jurisdiction.clone(), c.metadata.route_prefix.clone());
            if seen_pairs.insert(pair) {
                chosen.push(c.clone());
            } else {
                leftover.push(c.clone());
            }
        }
        for c in leftover {
            if chosen.len() >= k {
                break;
            }
            chosen.push(c);
        }
        chosen
    }
}

/// The minimum candidate pool size bootstrap requires before scoring.
pub const MIN_CANDIDATES: usize = 20;

/// One of the distinct transmission routes used to carry a single Shamir
/// share of a per-peer bootstrap secret. `corrupted` models an
/// active-adversary observation/tamper on that route; the core has no
/// visibility into real network paths, so callers (simulation or a
/// production transport layer) supply this directly.
#[derive(Debug, Clone, Copy)]
pub struct Route {
    pub corrupted: bool,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BootstrapError {
    #[error("no clean path to any candidate peer")]
    NoCleanPath,
}

/// Per-secret chunk count: four 64-bit chunks comfortably cover a 256-bit
/// secret (at a small, accepted loss of entropy from reducing each chunk
/// into GF(M61), since a 256-bit per-peer secret only ever feeds a PSK
/// expander, not the signing polynomial itself).
const SECRET_CHUNKS: usize = 4;

/// Splits and transmits a fresh per-peer secret to `peer` over `routes`,
/// each route carrying one Shamir share of each of [`SECRET_CHUNKS`] secret
/// chunks. `routes.len()` is the route count `k`; the reconstruction
/// threshold is `tau = k - k/3`.
///
/// Returns the opened channel if at least `tau` routes per chunk survive
/// [`liun_shamir::consistency_check`]; fails with
/// [`BootstrapError::NoCleanPath`] otherwise.
pub fn bootstrap_to_peer<R: RngCore + CryptoRng>(
    rng: &mut R,
    peer: NodeId,
    routes: &[Route],
    psk_len: usize,
) -> Result<SimulatedChannel, BootstrapError> {
    let route_count = routes.len();
    if route_count == 0 {
        return Err(BootstrapError::NoCleanPath);
    }
    let tau = route_count - route_count / 3;

    let mut secret_bytes = [0u8; SECRET_CHUNKS * 8];
    rng.fill_bytes(&mut secret_bytes);
    let secrets: Vec<FieldElement> = secret_bytes
        .chunks(8)
        .map(|c| FieldElement::new(u64::from_le_bytes(c.try_into().unwrap())))
        .collect();

    let mut reconstructed = Vec::with_capacity(SECRET_CHUNKS);
    for &secret in &secrets {
        let shares = liun_shamir::split(rng, secret, tau, route_count).map_err(|_| BootstrapError::NoCleanPath)?;
        // A corrupted route tampers with the share it carries.
        let transmitted: Vec<ShamirShare> = shares
            .into_iter()
            .zip(routes.iter())
            .map(|(mut s, route)| {
                if route.corrupted {
                    s.y = s.y.add(FieldElement::ONE);
                }
                s
            })
            .collect();

        let (good, _bad) = liun_shamir::consistency_check(&transmitted, tau);
        if good.len() < tau {
            return Err(BootstrapError::NoCleanPath);
        }
        let value = liun_shamir::reconstruct_with_threshold(&good, tau, FieldElement::ZERO).map_err(|_| BootstrapError::NoCleanPath)?;
        reconstructed.push(value);
    }

    let mut seed_bytes = Vec::with_capacity(SECRET_CHUNKS * 8);
    for v in &reconstructed {
        seed_bytes.extend_from_slice(&v.value().to_le_bytes());
    }
    let psk = expand_psk(&seed_bytes, psk_len);
    Ok(SimulatedChannel::open(peer, &psk))
}

/// Attempts bootstrap against every candidate in turn, returning every
/// channel that came up clean. Fails only if none did.
pub fn bootstrap<R: RngCore + CryptoRng>(
    rng: &mut R,
    candidates: &[(Candidate, Vec<Route>)],
    psk_len: usize,
) -> Result<Vec<SimulatedChannel>, BootstrapError> {
    let mut channels = Vec::new();
    for (candidate, routes) in candidates {
        if let Ok(channel) = bootstrap_to_peer(rng, candidate.id, routes, psk_len) {
            channels.push(channel);
        }
    }
    if channels.is_empty() {
        return Err(BootstrapError::NoCleanPath);
    }
    Ok(channels)
}

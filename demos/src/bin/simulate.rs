//! An in-process simulation harness exercising Liun's bootstrap, DKG,
//! threshold-signing, and trust scenarios end to end over an in-memory bus.

use anyhow::{ensure, Context, Result};
use liun::bootstrap::{self, Candidate, CandidateMetadata, Route};
use liun::field::{lagrange_interpolate_at, FieldElement, Point};
use liun::trust::{personalized_pagerank, DAMPING, ITERATIONS};
use liun::uss::{self, PartialSignature, SignatureBudget};
use liun_dkg::{DkgBuilder, DkgOutput, NodeId};
use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;
use round_based::simulation::Simulation;
use std::collections::HashMap;
use std::sync::Mutex;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    match args() {
        Scenario::Bootstrap => run_bootstrap(),
        Scenario::DkgSign => run_dkg_and_sign().await,
        Scenario::Trust => run_trust(),
        Scenario::All => {
            run_bootstrap()?;
            run_dkg_and_sign().await?;
            run_trust()
        }
    }
}

#[derive(Clone, Debug)]
enum Scenario {
    Bootstrap,
    DkgSign,
    Trust,
    All,
}

fn args() -> Scenario {
    use bpaf::Parser;
    let bootstrap = bpaf::command("bootstrap", bpaf::pure(Scenario::Bootstrap).to_options())
        .help("Run the multi-path bootstrap scenario");
    let dkg_sign = bpaf::command("dkg-sign", bpaf::pure(Scenario::DkgSign).to_options())
        .help("Run DKG then threshold sign/verify");
    let trust = bpaf::command("trust", bpaf::pure(Scenario::Trust).to_options())
        .help("Run the personalized PageRank / Sybil-bound scenario");
    let all = bpaf::command("all", bpaf::pure(Scenario::All).to_options()).help("Run every scenario in sequence");
    bpaf::construct!([bootstrap, dkg_sign, trust, all])
        .fallback(Scenario::All)
        .to_options()
        .descr("Drive Liun's core protocols over an in-process bus")
        .run()
}

/// Scenario S1/S2: split a fresh secret across diverse routes to a few
/// candidates, tolerating a minority of corrupted routes.
fn run_bootstrap() -> Result<()> {
    let mut rng = ChaCha20Rng::seed_from_u64(1);
    let candidates = vec![
        (
            Candidate {
                id: FieldElement::new(10),
                metadata: CandidateMetadata {
                    route_prefix: "eu-west".into(),
                    jurisdiction: "de".into(),
                },
            },
            clean_routes(9),
        ),
        (
            Candidate {
                id: FieldElement::new(11),
                metadata: CandidateMetadata {
                    route_prefix: "us-east".into(),
                    jurisdiction: "us".into(),
                },
            },
            corrupted_minority_routes(9),
        ),
    ];

    let channels = bootstrap::bootstrap(&mut rng, &candidates, 40).context("bootstrap should clear at least one clean path")?;
    println!("bootstrap: opened {} channel(s) from {} candidates", channels.len(), candidates.len());
    ensure!(!channels.is_empty(), "expected at least one clean channel");
    Ok(())
}

fn clean_routes(n: usize) -> Vec<Route> {
    vec![Route { corrupted: false }; n]
}

fn corrupted_minority_routes(n: usize) -> Vec<Route> {
    let mut routes = clean_routes(n);
    for r in routes.iter_mut().take(n / 3) {
        r.corrupted = true;
    }
    routes
}

/// Spec.md's DKG tests need a `ChannelAuthority`; this harness has no real
/// ITS channels, so it stands in with a trivial always-agreeing MAC, exactly
/// as [`liun_dkg`]'s own in-crate tests do.
struct DemoAuthority {
    run_idx: Mutex<HashMap<u64, u64>>,
}

impl DemoAuthority {
    fn new() -> Self {
        DemoAuthority {
            run_idx: Mutex::new(HashMap::new()),
        }
    }

    fn tag(data: &[u8]) -> FieldElement {
        let mut acc: u64 = 0;
        for chunk in data.chunks(8) {
            let mut buf = [0u8; 8];
            buf[..chunk.len()].copy_from_slice(chunk);
            acc = acc.wrapping_add(u64::from_le_bytes(buf));
        }
        FieldElement::new(acc)
    }
}

impl liun_dkg::ChannelAuthority for DemoAuthority {
    fn run_idx(&self, peer: NodeId) -> u64 {
        *self.run_idx.lock().unwrap().get(&peer.value()).unwrap_or(&0)
    }
    fn mac(&self, _peer: NodeId, data: &[u8]) -> FieldElement {
        Self::tag(data)
    }
    fn verify_mac(&self, _peer: NodeId, data: &[u8], _run_idx: u64, tag: FieldElement) -> bool {
        Self::tag(data) == tag
    }
}

/// Scenario S3/S6: a 5-party, threshold-3 DKG over an in-process bus,
/// followed by a threshold sign/verify and a signature-budget exhaustion
/// check.
async fn run_dkg_and_sign() -> Result<()> {
    let n = 5usize;
    let k = 3usize;
    let committee: Vec<NodeId> = (1..=n as u64).map(FieldElement::new).collect();

    let mut simulation = Simulation::<liun_dkg::Msg>::new();
    let mut futs = Vec::new();
    for (idx, &id) in committee.iter().enumerate() {
        let party = simulation.add_party();
        let committee = committee.clone();
        futs.push(async move {
            let mut rng = ChaCha20Rng::seed_from_u64(100 + idx as u64);
            let authority = DemoAuthority::new();
            DkgBuilder::new(id, committee, k, 0)
                .run(&mut rng, party, &authority)
                .await
                .expect("dkg succeeds over a clean in-process bus")
        });
    }
    let outputs: Vec<DkgOutput> = futures::future::join_all(futs).await;
    println!("dkg: {n} parties agreed on a degree-{} combined polynomial", outputs[0].degree);

    let signer_ids = [committee[0], committee[2], committee[4]]; // {1, 3, 5}
    let message = FieldElement::new(42);
    let mut budgets: Vec<SignatureBudget> = outputs.iter().map(|o| SignatureBudget::new(o.degree)).collect();

    let partials: Vec<PartialSignature> = signer_ids
        .iter()
        .map(|&id| {
            let idx = committee.iter().position(|&c| c == id).unwrap();
            uss::partial_sign(message, &signer_ids, id, outputs[idx].signing_share, &mut budgets[idx]).expect("signer is a committee member with budget left")
        })
        .collect();
    let signature = uss::combine(&partials, k).context("combine partial signatures")?;
    println!("sign: committee {{1,3,5}} produced sigma = {}", signature.0.value());

    let verifier_shares = &outputs[3].verification_shares; // node 4's independent verification block
    let outcome = uss::verify(message, signature, verifier_shares, outputs[0].degree);
    ensure!(outcome.valid && !outcome.insufficient_points, "genuine signature must verify");
    println!("verify: signature accepted against node 4's independent verification shares");

    let tampered = liun::uss::Signature(signature.0.add(FieldElement::ONE));
    let tampered_outcome = uss::verify(message, tampered, verifier_shares, outputs[0].degree);
    ensure!(!tampered_outcome.valid, "a tampered signature must be rejected");
    println!("verify: tampered signature correctly rejected");

    // Independently, confirm the Lagrange identity directly: a disjoint
    // k-subset of signing shares interpolates to the same F(m).
    let points: Vec<Point> = committee.iter().zip(outputs.iter()).take(k).map(|(&id, o)| Point::new(id, o.signing_share)).collect();
    let via_interpolation = lagrange_interpolate_at(&points, message).context("interpolate F(m) directly")?;
    ensure!(via_interpolation == signature.0, "combine() must equal direct interpolation of F(m)");
    println!("sanity: combine() output matches direct interpolation of F(42)");

    Ok(())
}

/// Scenario S5: a small honest star plus a Sybil cluster behind a handful
/// of attack edges; personalized PageRank keeps the Sybil cluster's total
/// trust bounded.
fn run_trust() -> Result<()> {
    use liun::overlay::ChannelGraph;

    let mut graph = ChannelGraph::new();
    let seed = FieldElement::new(0);
    for leaf in 1..=9u64 {
        graph.add_edge(seed, FieldElement::new(leaf), 1.0);
    }
    let sybil_base = 1000u64;
    graph.add_edge(FieldElement::new(1), FieldElement::new(sybil_base), 1.0);
    graph.add_edge(FieldElement::new(2), FieldElement::new(sybil_base + 1), 1.0);
    graph.add_edge(FieldElement::new(3), FieldElement::new(sybil_base + 2), 1.0);
    for i in 0..50u64 {
        graph.add_edge(FieldElement::new(sybil_base + i), FieldElement::new(sybil_base + i + 1), 1.0);
    }

    let trust = personalized_pagerank(&graph, seed, DAMPING, ITERATIONS);
    let sybil_trust: f64 = trust.iter().filter(|(&id, _)| id.value() >= sybil_base).map(|(_, &t)| t).sum();
    println!("trust: Sybil cluster holds {sybil_trust:.6} of total trust mass (bound: < 0.5)");
    ensure!(sybil_trust < 0.5, "sybil cluster exceeded the expected trust bound");
    Ok(())
}

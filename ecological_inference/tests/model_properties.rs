use ecological_inference::*;
use statrs::distribution::{Beta, Binomial, Continuous, Discrete, Exp};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn small_sampler(seed: u64) -> NutsSampler {
    NutsSampler::new(SamplerConfig {
        draws: 500,
        tune: 500,
        chains: 2,
        random_seed: Some(seed),
        ..SamplerConfig::DEFAULT
    })
}

fn build(votes: &[u64], population: &[u64], fraction: &[f64]) -> EcoResult<EcologicalModel> {
    ModelBuilder::new(ModelConfig::default())
        .precincts(votes, population, fraction)?
        .build()
}

#[test]
fn length_mismatches_fail_before_sampling() {
    init();
    let votes = [10u64, 20, 30];
    let population = [50u64, 60, 70];
    let fraction = [0.1, 0.2, 0.3];
    for nv in 0..=3 {
        for np in 0..=3 {
            for nf in 0..=3 {
                let res = build(&votes[..nv], &population[..np], &fraction[..nf]);
                if nv == np && np == nf {
                    if nv == 0 {
                        assert_eq!(res.unwrap_err(), EcoError::NoPrecincts {});
                    } else {
                        assert!(res.is_ok());
                    }
                } else {
                    assert_eq!(
                        res.unwrap_err(),
                        EcoError::LengthMismatch {
                            votes: nv,
                            population: np,
                            fraction: nf
                        }
                    );
                }
            }
        }
    }
}

#[test]
fn group_name_is_embedded_in_node_names() {
    let dem = build(&[5], &[10], &[0.5]).unwrap();
    let rep = ModelBuilder::new(ModelConfig::default())
        .group_name("rep")
        .precincts(&[5], &[10], &[0.5])
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(dem.observed_name(), "votes_for_dem");
    assert_eq!(rep.observed_name(), "votes_for_rep");
    assert_ne!(dem.deterministic_name(), rep.deterministic_name());
    for node in dem.nodes() {
        assert!(rep.node(&node.name).is_none(), "{} is shared", node.name);
        assert!(node.name.ends_with("_dem"));
    }
    let pete = ModelBuilder::new(ModelConfig::default())
        .group_name("pete")
        .precincts(&[5], &[10], &[0.5])
        .unwrap()
        .build()
        .unwrap();
    assert!(pete.node("pct_minority_voting_pete").is_some());
}

#[test]
fn log_density_matches_reference_distributions() {
    let votes = [30u64, 70, 0, 12];
    let population = [100u64, 120, 40, 12];
    let fraction = [0.2, 0.9, 0.5, 0.0];
    let model = ModelBuilder::new(ModelConfig::default())
        .lam(0.7)
        .precincts(&votes, &population, &fraction)
        .unwrap()
        .build()
        .unwrap();

    let (a0, a1, b0, b1) = (1.4, 0.6, 2.2, 3.1);
    let pmin = [0.15, 0.55, 0.4, 0.9];
    let pmaj = [0.35, 0.65, 0.1, 0.95];
    let mut theta = vec![a0, a1, b0, b1];
    theta.extend_from_slice(&pmin);
    theta.extend_from_slice(&pmaj);

    let exp = Exp::new(0.7).unwrap();
    let beta_min = Beta::new(a0, b0).unwrap();
    let beta_maj = Beta::new(a1, b1).unwrap();
    let mut expected: f64 = [a0, a1, b0, b1].iter().map(|&h| exp.ln_pdf(h)).sum();
    for i in 0..4 {
        expected += beta_min.ln_pdf(pmin[i]) + beta_maj.ln_pdf(pmaj[i]);
        let est = fraction[i] * pmin[i] + (1.0 - fraction[i]) * pmaj[i];
        expected += Binomial::new(est, population[i]).unwrap().ln_pmf(votes[i]);
    }
    let lp = model.logpdf(&theta);
    assert!(
        (lp - expected).abs() < 1e-8 * expected.abs().max(1.0),
        "logpdf {} expected {}",
        lp,
        expected
    );

    // Unconstrained: add log|J| of exp for the shapes and of the logistic map for the rates.
    let z: Vec<f64> = theta
        .iter()
        .enumerate()
        .map(|(j, &t)| if j < 4 { t.ln() } else { (t / (1.0 - t)).ln() })
        .collect();
    let log_jac: f64 = theta
        .iter()
        .enumerate()
        .map(|(j, &t)| if j < 4 { t.ln() } else { t.ln() + (1.0 - t).ln() })
        .sum();
    let lz = model.log_density(&z);
    assert!((lz - (expected + log_jac)).abs() < 1e-7 * expected.abs().max(1.0));
}

#[test]
fn unconstrained_gradient_matches_finite_differences() {
    let model = build(&[30, 70, 0], &[100, 120, 40], &[0.2, 0.9, 0.5]).unwrap();
    let z = vec![0.3, -0.4, 0.8, 0.1, -1.2, 0.5, 0.0, 1.1, -0.3, 2.0];
    let grad = model.grad_log_density(&z);
    let h = 1e-6;
    for j in 0..z.len() {
        let mut up = z.clone();
        let mut down = z.clone();
        up[j] += h;
        down[j] -= h;
        let fd = (model.log_density(&up) - model.log_density(&down)) / (2.0 * h);
        assert!(
            (fd - grad[j]).abs() < 1e-4 * (1.0 + fd.abs()),
            "coordinate {}: fd={} analytic={}",
            j,
            fd,
            grad[j]
        );
    }
}

#[test]
fn single_precinct_posterior_matches_observed_share() {
    init();
    let model = build(&[50], &[100], &[0.3]).unwrap();
    let trace = model.sample(&small_sampler(42)).unwrap();

    let est = trace.get("est_voting_dem").unwrap();
    assert_eq!(est.len(), 1000);
    assert_eq!(est.width, 1);
    let mean = trace.mean("est_voting_dem").unwrap()[0];
    assert!((mean - 0.5).abs() < 0.1, "posterior mean {}", mean);
}

#[test]
fn deterministic_node_and_rate_ranges_hold_for_every_draw() {
    init();
    let fraction = [0.0, 1.0, 0.35];
    let model = build(&[20, 5, 40], &[50, 30, 60], &fraction).unwrap();
    let trace = model.sample(&small_sampler(7)).unwrap();

    let pmin = trace.get("pct_minority_voting_dem").unwrap();
    let pmaj = trace.get("pct_majority_voting_dem").unwrap();
    let est = trace.get("est_voting_dem").unwrap();
    assert_eq!(pmin.len(), trace.total_draws());

    for d in 0..est.len() {
        // Degenerate precincts: exactly one of the two rates.
        assert_eq!(est.draws[d][0], pmaj.draws[d][0]);
        assert_eq!(est.draws[d][1], pmin.draws[d][1]);
        for i in 0..3 {
            let expected = fraction[i] * pmin.draws[d][i] + (1.0 - fraction[i]) * pmaj.draws[d][i];
            assert_eq!(est.draws[d][i], expected);
            assert!(pmin.draws[d][i] > 0.0 && pmin.draws[d][i] < 1.0);
            assert!(pmaj.draws[d][i] > 0.0 && pmaj.draws[d][i] < 1.0);
        }
    }
    for shapes in trace.get("alpha_dem").unwrap().draws.iter() {
        assert!(shapes.iter().all(|&a| a > 0.0 && a.is_finite()));
    }
}

#[test]
fn same_seed_gives_same_trace() {
    let model = build(&[30, 70], &[100, 120], &[0.2, 0.9]).unwrap();
    let sampler = NutsSampler::new(SamplerConfig {
        draws: 100,
        tune: 100,
        chains: 2,
        random_seed: Some(123),
        ..SamplerConfig::DEFAULT
    });
    let t1 = model.sample(&sampler).unwrap();
    let t2 = model.sample(&sampler).unwrap();
    assert_eq!(t1, t2);
    assert_eq!(t1.seed(), 123);

    let pmin = t1.get("pct_minority_voting_dem").unwrap();
    assert_ne!(pmin.chain(0).unwrap(), pmin.chain(1).unwrap());
    assert!(pmin.chain(2).is_none());

    let other = NutsSampler::new(SamplerConfig {
        random_seed: Some(124),
        ..sampler.config.clone()
    });
    assert_ne!(model.sample(&other).unwrap(), t1);
}

#[test]
fn summary_reports_every_element() {
    init();
    let model = build(&[30, 70], &[100, 120], &[0.2, 0.9]).unwrap();
    let trace = model.sample(&small_sampler(5)).unwrap();
    let summary = trace.summary();
    // alpha, beta: 2 each; pct_minority, pct_majority, est: 2 each
    assert_eq!(summary.len(), 10);
    for s in &summary {
        assert!(s.hdi_low < s.hdi_high, "{:?}", s);
        assert!(s.sd > 0.0);
        assert!(s.ess_bulk >= 1.0 && s.ess_bulk <= trace.total_draws() as f64);
        assert!(s.r_hat.is_finite());
    }
    assert_eq!(trace.chain_stats().len(), 2);
    assert!(trace.chain_stats().iter().all(|c| c.step_size > 0.0));
}

#[test]
fn wrapper_runs_from_table_rows() {
    init();
    let rows = vec![
        PrecinctRow {
            label: Some("P-01".to_string()),
            total: 1000.0,
            white_alone: 800.0,
            dem: 300,
            rep: 500,
        },
        PrecinctRow {
            label: Some("P-02".to_string()),
            total: 0.0,
            white_alone: 0.0,
            dem: 0,
            rep: 0,
        },
        PrecinctRow {
            label: Some("P-03".to_string()),
            total: 900.0,
            white_alone: 200.0,
            dem: 600,
            rep: 150,
        },
    ];
    let config = InferenceConfig {
        skip_empty_precincts: true,
        ..InferenceConfig::for_party(Party::Republican)
    };
    let run = run_inference(&rows, &config, &small_sampler(3)).unwrap();
    assert_eq!(run.kept_rows, vec![0, 2]);
    assert_eq!(run.model.observations().votes_for_group, vec![500, 150]);
    assert_eq!(run.model.observations().voting_population, vec![800, 750]);

    let est = run.trace.mean("est_voting_rep").unwrap();
    assert!((est[0] - 500.0 / 800.0).abs() < 0.1, "{:?}", est);
    assert!((est[1] - 150.0 / 750.0).abs() < 0.1, "{:?}", est);

    // Without the opt-in, the empty precinct stops the run.
    let err = run_inference(
        &rows,
        &InferenceConfig::for_party(Party::Republican),
        &small_sampler(3),
    )
    .unwrap_err();
    assert_eq!(err, EcoError::EmptyPrecinct { precinct: 1 });
}

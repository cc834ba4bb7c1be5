//! End-to-end engine invariants: from synthetic price series through the
//! statistics kernel and matrix engine into a full simulation run.

use portfolio_risk::matrix::{CholeskyFactor, CorrelationMatrix, CorrelationMethod};
use portfolio_risk::provider::{PriceSeries, SeriesMeta};
use portfolio_risk::rng::SimRng;
use portfolio_risk::simulation::{
    CancelFlag, DistributionParams, FatTailMode, PathSampler, SamplingMode, run_simulation,
};
use portfolio_risk::{PortfolioSnapshot, Position, SimulationConfig, stats};

fn series(symbol: &str, prices: Vec<f64>) -> PriceSeries {
    let start = 1_577_923_200_i64; // 2020-01-02 UTC midnight
    PriceSeries {
        symbol: symbol.to_string(),
        currency: "USD".to_string(),
        timestamps: (0..prices.len() as i64).map(|i| start + i * 86_400).collect(),
        prices,
        meta: SeriesMeta::default(),
    }
}

fn random_walk(seed: u64, len: usize, drift: f64, vol: f64) -> Vec<f64> {
    let mut rng = SimRng::new(seed);
    let mut prices = Vec::with_capacity(len);
    let mut price = 100.0;
    for _ in 0..len {
        prices.push(price);
        price *= 1.0 + drift + vol * rng.next_gaussian();
    }
    prices
}

fn position(symbol: &str, quantity: f64, price: f64) -> Position {
    Position {
        symbol: symbol.to_string(),
        quantity,
        price,
        currency: "USD".to_string(),
        user_percentiles: None,
    }
}

#[test]
fn zero_sigma_two_asset_portfolio_is_exact() {
    // sigma = 0, mu = {0.1, 0.2}, weights {0.5, 0.5}, no cash: every path's
    // terminal return is the weighted mu, and so is every percentile
    let mut matrix = CorrelationMatrix::identity(2);
    let factor = matrix.factor().unwrap();
    let params = [
        DistributionParams {
            mu: 0.1,
            sigma: 0.0,
            skew: 0.0,
            tail_df: 30.0,
        },
        DistributionParams {
            mu: 0.2,
            sigma: 0.0,
            skew: 0.0,
            tail_df: 30.0,
        },
    ];
    let weights = [0.5, 0.5];
    let sampler = PathSampler::new(&factor, &params, &weights, 0.0, 0.0, 0.0, FatTailMode::Gaussian);

    let mut rng = SimRng::split(1, 0);
    let mut source = sampler.normal_source(SamplingMode::PseudoRandom, 1, 0);
    let (mut z, mut x) = (vec![0.0; 2], vec![0.0; 2]);
    let expected = 0.5 * 0.1 + 0.5 * 0.2;
    let mut returns = Vec::with_capacity(10_000);
    for _ in 0..10_000 {
        let path = sampler.sample_path(&mut rng, &mut source, &mut z, &mut x);
        assert!(
            (path.terminal_return - 0.15).abs() < 1e-12,
            "path return {}",
            path.terminal_return
        );
        assert_eq!(path.terminal_return, expected);
        returns.push(path.terminal_return);
    }
    returns.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let p50 = returns[returns.len() / 2];
    assert!((p50 - 0.15).abs() < 1e-12);
}

#[test]
fn known_cholesky_and_repair_chain() {
    // 2x2 with rho 0.8 factors to [[1,0],[0.8,0.6]]; pushing rho past 1
    // must repair into [-0.99, 0.99] with a non-negative spectrum
    let mut matrix = CorrelationMatrix::from_rows(&[vec![1.0, 0.8], vec![0.8, 1.0]]).unwrap();
    let factor = matrix.factor().unwrap();
    assert!((factor.get(1, 0) - 0.8).abs() < 1e-9);
    assert!((factor.get(1, 1) - 0.6).abs() < 1e-9);

    let mut broken = CorrelationMatrix::from_rows(&[vec![1.0, 1.01], vec![1.01, 1.0]]).unwrap();
    let repaired_factor = broken.factor().unwrap();
    assert!(broken.get(0, 1).abs() <= 0.99);
    assert!(repaired_factor.reconstruction_error(&broken) <= 2e-6);
}

#[test]
fn pipeline_from_prices_to_summary() {
    // Three synthetic price histories, one of them short, drive the whole
    // chain: returns -> pairwise matrix -> repair -> simulation summary
    let series_list = [
        series("AAA", random_walk(11, 400, 0.0004, 0.012)),
        series("BBB", random_walk(22, 400, 0.0003, 0.018)),
        series("CCC", random_walk(33, 90, 0.0002, 0.025)),
    ];
    let returns: Vec<Vec<f64>> = series_list.iter().map(stats::daily_returns).collect();
    let matrix = CorrelationMatrix::from_returns(
        &returns,
        252,
        CorrelationMethod::Shrinkage,
        0.3,
        false,
    );
    assert!(matrix.below_target_overlap, "short series must annotate");

    let snapshot = PortfolioSnapshot::new(
        vec![
            position("AAA", 10.0, 100.0),
            position("BBB", 4.0, 150.0),
            position("CCC", 8.0, 50.0),
        ],
        500.0,
        0.05,
    )
    .unwrap();

    let config = SimulationConfig::new().seed(99).workers(4);
    let summary =
        run_simulation(&snapshot, &matrix, 20_000, &config, None, &CancelFlag::new()).unwrap();

    assert_eq!(summary.total_paths, 20_000);
    assert!(summary.valid_paths >= 18_000);

    let p = &summary.percentiles;
    assert!(p.p5 <= p.p10 && p.p10 <= p.p25 && p.p25 <= p.p50);
    assert!(p.p50 <= p.p75 && p.p75 <= p.p90 && p.p90 <= p.p95);
    assert!(p.p5 >= -1.0 && p.p95 <= 10.0);

    let l = &summary.loss_probabilities;
    assert!((0.0..=1.0).contains(&l.below_zero));
    assert!(l.below_minus_twenty_pct <= l.below_minus_ten_pct);
    assert!(l.below_minus_ten_pct <= l.below_zero);

    let d = &summary.drawdown_percentiles;
    assert!(d.p50 >= 0.0 && d.p99 <= 1.0);
    assert!(d.p50 <= d.p75 && d.p75 <= d.p90 && d.p90 <= d.p95 && d.p95 <= d.p99);

    // Dollar distribution is the return distribution scaled off net value
    assert!(
        (summary.dollar_percentiles.p50 - snapshot.net_value * (1.0 + p.p50)).abs() < 1e-9
    );
}

#[test]
fn seeded_runs_are_bit_identical_across_modes() {
    let snapshot = PortfolioSnapshot::new(
        vec![position("AAA", 10.0, 100.0), position("BBB", 10.0, 100.0)],
        0.0,
        0.0,
    )
    .unwrap();
    let matrix = CorrelationMatrix::from_rows(&[vec![1.0, 0.4], vec![0.4, 1.0]]).unwrap();

    for sampling in [SamplingMode::PseudoRandom, SamplingMode::Qmc] {
        for fat_tail in [FatTailMode::Gaussian, FatTailMode::MultivariateT] {
            let config = SimulationConfig::new()
                .seed(1234)
                .workers(3)
                .sampling_mode(sampling)
                .fat_tail_mode(fat_tail);
            let a = run_simulation(&snapshot, &matrix, 6_000, &config, None, &CancelFlag::new())
                .unwrap();
            let b = run_simulation(&snapshot, &matrix, 6_000, &config, None, &CancelFlag::new())
                .unwrap();
            assert_eq!(
                a.terminal_returns, b.terminal_returns,
                "{sampling:?}/{fat_tail:?} not reproducible"
            );
            assert_eq!(a.max_drawdowns, b.max_drawdowns);
        }
    }
}

#[test]
fn bootstrap_feeds_the_parameter_mapper() {
    // Bootstrap a synthetic pool, map its quintuple, and check the params
    // stay inside their contract ranges
    let pool: Vec<f64> = {
        let mut rng = SimRng::new(5);
        (0..2_000).map(|_| rng.next_gaussian() * 0.012 + 0.0003).collect()
    };
    let dist = stats::bootstrap_annual_distribution(&pool, 2_000, 77).unwrap();
    assert!(dist.p5 <= dist.p25 && dist.p25 <= dist.p50);
    assert!(dist.p50 <= dist.p75 && dist.p75 <= dist.p95);

    let quintuple = portfolio_risk::PercentileQuintuple::from(&dist);
    let params = DistributionParams::from_percentiles(&quintuple);
    assert!((-1.0..=5.0).contains(&params.mu));
    assert!((0.01..=2.0).contains(&params.sigma));
    assert!((-1.0..=1.0).contains(&params.skew));
    assert!((3.0..=30.0).contains(&params.tail_df));
}

#[test]
fn cholesky_frobenius_bound_scales_with_dimension() {
    // Random but PSD-by-construction matrices at several sizes
    for n in [2usize, 5, 12, 24] {
        let mut rng = SimRng::new(n as u64);
        let returns: Vec<Vec<f64>> = (0..n)
            .map(|_| (0..200).map(|_| rng.next_gaussian() * 0.01).collect())
            .collect();
        let mut matrix =
            CorrelationMatrix::from_returns(&returns, 252, CorrelationMethod::Sample, 0.3, false);
        let factor = matrix.factor().unwrap();
        let err = factor.reconstruction_error(&matrix);
        assert!(err <= 1e-6 * n as f64, "n={n} frobenius {err}");
        let _ = CholeskyFactor::compute(&matrix).unwrap();
    }
}

use std::hint::black_box;
use std::time::Duration;

use chrono::Duration as Days;
use chrono::NaiveDate;
use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::criterion_group;
use criterion::criterion_main;
use kelly_rs::AllocationConfig;
use kelly_rs::KellyEngine;
use kelly_rs::kelly::CovarianceMethod;
use kelly_rs::kelly::EstimationMode;
use kelly_rs::kelly::PriceSeries;
use kelly_rs::kelly::annualized_covariance;
use kelly_rs::kelly::excess_returns;
use ndarray::Array2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::Distribution;
use rand_distr::Normal;

fn synthetic_prices(days: usize, assets: usize) -> PriceSeries {
  let mut rng = StdRng::seed_from_u64(42);
  let shocks = Normal::new(0.0003_f64, 0.015).unwrap();
  let start = NaiveDate::from_ymd_opt(2020, 1, 6).unwrap();

  let mut level = vec![100.0_f64; assets];
  let table = Array2::from_shape_fn((days, assets), |(t, j)| {
    if t > 0 {
      level[j] *= shocks.sample(&mut rng).exp();
    }
    level[j]
  });
  let dates = (0..days).map(|t| start + Days::days(t as i64)).collect();
  let symbols = (0..assets).map(|j| format!("A{j:02}")).collect();
  PriceSeries::new(dates, symbols, table).unwrap()
}

fn bench_pipeline(c: &mut Criterion) {
  let mut group = c.benchmark_group("KellyPipeline");
  group.measurement_time(Duration::from_secs(3));
  group.warm_up_time(Duration::from_millis(500));

  for &assets in &[5usize, 20, 50] {
    let prices = synthetic_prices(1_260, assets);
    let returns = excess_returns(&prices, 0.02).unwrap();

    group.bench_with_input(
      BenchmarkId::new("covariance/sample", assets),
      &returns,
      |b, r| b.iter(|| black_box(annualized_covariance(r, CovarianceMethod::Sample).unwrap())),
    );

    group.bench_with_input(
      BenchmarkId::new("covariance/ledoit_wolf", assets),
      &returns,
      |b, r| b.iter(|| black_box(annualized_covariance(r, CovarianceMethod::LedoitWolf).unwrap())),
    );

    let mut config = AllocationConfig::new(0.02, 100_000.0);
    config.max_position_size = Some(0.5);
    config.kelly_fraction = 0.5;
    let engine = KellyEngine::new(config).unwrap();

    group.bench_with_input(BenchmarkId::new("run/historical", assets), &prices, |b, p| {
      b.iter(|| black_box(engine.run(p, EstimationMode::Historical).unwrap()))
    });
  }

  group.finish();
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);

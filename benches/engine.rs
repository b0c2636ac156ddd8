use std::hint::black_box;
use std::time::Instant;

use chrono::NaiveDate;
use fund_frontier::quant::portfolio::efficient_frontier;
use fund_frontier::quant::portfolio::simulate;
use fund_frontier::quant::portfolio::Moments;
use fund_frontier::quant::portfolio::PortfolioEngine;
use fund_frontier::quant::portfolio::ReturnPanel;
use fund_frontier::EngineConfig;
use fund_frontier::SimulationConfig;
use fund_frontier::SolverConfig;
use ndarray::Array1;
use ndarray::Array2;
use ndarray_rand::rand_distr::Normal;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;

const IDS: [&str; 6] = ["equity", "gold", "gilt", "corp_bond", "short_dur", "liquid"];

fn median_ms(samples: &mut [f64]) -> f64 {
  samples.sort_by(f64::total_cmp);
  samples[samples.len() / 2]
}

fn panel(months: usize) -> ReturnPanel {
  let mut rng = StdRng::seed_from_u64(7);
  let z = Array2::random_using((months, IDS.len()), Normal::new(0.0, 1.0).unwrap(), &mut rng);
  let mean = Array1::from(vec![0.011, 0.009, 0.006, 0.0065, 0.0058, 0.0052]);
  let sd = Array1::from(vec![0.055, 0.045, 0.015, 0.008, 0.005, 0.0015]);
  let returns = &z * &sd + &mean;

  let mut date = NaiveDate::from_ymd_opt(2013, 1, 31).unwrap();
  let dates = (0..months)
    .map(|_| {
      let current = date;
      date = (date + chrono::Days::new(1)).checked_add_months(chrono::Months::new(1)).unwrap()
        - chrono::Days::new(1);
      current
    })
    .collect();

  ReturnPanel::new(IDS.iter().map(|s| s.to_string()).collect(), dates, returns).unwrap()
}

fn time<F: FnMut()>(label: &str, warmup: usize, runs: usize, mut f: F) {
  for _ in 0..warmup {
    f();
  }
  let mut times_ms = Vec::with_capacity(runs);
  for _ in 0..runs {
    let t0 = Instant::now();
    f();
    times_ms.push(t0.elapsed().as_secs_f64() * 1e3);
  }
  println!("{label:<28} median {:>10.3} ms", median_ms(&mut times_ms));
}

fn main() {
  let panel = panel(156);
  let moments = Moments::estimate(&panel).unwrap();
  let solver = SolverConfig::default();
  let weights = vec![1.0 / IDS.len() as f64; IDS.len()];

  time("frontier (50 points)", 2, 10, || {
    black_box(efficient_frontier(&moments, 0.065, 50, &solver));
  });
  time("bootstrap (5000 x 120)", 2, 10, || {
    black_box(simulate(&panel, &weights, &SimulationConfig::default(), 42));
  });

  let engine = PortfolioEngine::new(EngineConfig::default(), fund_frontier::AssetUniverse::standard());
  time("engine run", 1, 5, || {
    black_box(engine.run(&panel).unwrap());
  });
}

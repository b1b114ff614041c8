use std::hint::black_box;

use chrono::{Days, NaiveDate};
use criterion::{Criterion, criterion_group, criterion_main};
use volsurf_engine::config::MoneynessGrid;
use volsurf_engine::implied::{ImpliedVolSolver, black_scholes_price};
use volsurf_engine::market::{MarketParams, OptionQuote};
use volsurf_engine::smile::{SmileBuilder, interpolate};
use volsurf_engine::surface::{SurfaceBuilder, VolSurface};
use volsurf_engine::{EngineConfig, OptionType};

const SPOT: f64 = 100.0;
const RATE: f64 = 0.03;

fn valuation() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 2).unwrap_or_default()
}

fn skew(k: f64) -> f64 {
    0.2 - 0.1 * k + 0.4 * k * k
}

/// Calls and puts at `n_strikes` strikes from 80 to 120 for one expiry.
fn generate_chain(days: u64, n_strikes: usize) -> Vec<OptionQuote> {
    let t = days as f64 / 365.0;
    let forward = SPOT * (RATE * t).exp();
    let expiry = valuation() + Days::new(days);
    (0..n_strikes)
        .flat_map(|i| {
            let strike = 80.0 + 40.0 * i as f64 / (n_strikes - 1) as f64;
            let vol = skew((strike / forward).ln());
            [OptionType::Call, OptionType::Put].map(move |option_type| {
                let p = black_scholes_price(SPOT, strike, t, RATE, 0.0, vol, option_type);
                OptionQuote {
                    strike,
                    option_type,
                    bid: p,
                    ask: p,
                    volume: 10,
                    open_interest: 100,
                    expiry,
                    valuation_date: valuation(),
                }
            })
        })
        .collect()
}

fn generate_surface_quotes(n_tenors: usize, n_strikes: usize) -> Vec<OptionQuote> {
    (1..=n_tenors)
        .flat_map(|i| generate_chain(30 * i as u64, n_strikes))
        .collect()
}

fn smile_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("smile");

    let solver = ImpliedVolSolver::default();
    let price = black_scholes_price(SPOT, 105.0, 0.5, RATE, 0.0, 0.22, OptionType::Call);
    group.bench_function("implied_vol_inversion", |b| {
        b.iter(|| {
            solver
                .invert(black_box(price), SPOT, 105.0, 0.5, RATE, OptionType::Call)
                .unwrap()
        });
    });

    let config = EngineConfig::default();
    let builder = SmileBuilder::new(&config).unwrap();
    let chain = generate_chain(182, 41);
    let t = 182.0 / 365.0;
    let market = MarketParams {
        spot: SPOT,
        rate: RATE,
        dividend_yield: 0.0,
    };
    let forward = market.forward(t);
    group.bench_function("smile_build_41_strikes", |b| {
        b.iter(|| builder.build(black_box(&chain), market, forward, t).unwrap());
    });

    let smile = builder.build(&chain, market, forward, t).unwrap().smile;
    let grid = MoneynessGrid::default();
    group.bench_function("smile_interpolate", |b| {
        b.iter(|| interpolate(black_box(&smile), &grid, 1e-8).unwrap());
    });

    group.finish();
}

fn construction_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("surface");

    let quotes_4 = generate_surface_quotes(4, 21);
    group.bench_function("surface_4_tenors_21_strikes", |b| {
        b.iter(|| {
            SurfaceBuilder::new()
                .spot(SPOT)
                .rate(RATE)
                .quotes(black_box(quotes_4.clone()))
                .build()
                .unwrap()
        });
    });

    let quotes_12 = generate_surface_quotes(12, 41);
    group.bench_function("surface_12_tenors_41_strikes", |b| {
        b.iter(|| {
            SurfaceBuilder::new()
                .spot(SPOT)
                .rate(RATE)
                .quotes(black_box(quotes_12.clone()))
                .build()
                .unwrap()
        });
    });

    let build = SurfaceBuilder::new()
        .spot(SPOT)
        .rate(RATE)
        .quotes(quotes_12)
        .build()
        .unwrap();
    group.bench_function("vol_query", |b| {
        b.iter(|| build.surface.black_vol(black_box(0.05), black_box(0.4)).unwrap());
    });
    group.bench_function("grid_41x25", |b| {
        b.iter(|| build.grid().unwrap());
    });

    group.finish();
}

criterion_group!(benches, smile_benchmarks, construction_benchmarks);
criterion_main!(benches);

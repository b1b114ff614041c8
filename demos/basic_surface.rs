//! Build a volatility surface from an option chain and query it.
//!
//! Walks through the full workflow:
//!   1. Generate a skewed option chain across four expiries
//!   2. Construct a surface via SurfaceBuilder
//!   3. Query vol at arbitrary (log-moneyness, maturity) points
//!   4. Inspect build diagnostics
//!   5. Materialize the display grid
//!
//! Run with: `cargo run --example basic_surface`

use chrono::{Days, NaiveDate};
use volsurf_engine::implied::black_scholes_price;
use volsurf_engine::market::OptionQuote;
use volsurf_engine::surface::{SurfaceBuilder, VolSurface};
use volsurf_engine::{EngineConfig, OptionType};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ---------------------------------------------------------------
    // 1. Market data: equity-like skew, quoted with a 2% bid/ask spread
    // ---------------------------------------------------------------

    let spot = 100.0;
    let rate = 0.03;
    let dividend_yield = 0.01;
    let valuation = NaiveDate::from_ymd_opt(2026, 3, 2).ok_or("bad date")?;

    let skew = |k: f64, t: f64| 0.20 - 0.12 * k / t.sqrt().max(0.5) + 0.3 * k * k;

    let mut quotes = Vec::new();
    for days in [30_u64, 91, 182, 365] {
        let expiry = valuation + Days::new(days);
        let t = days as f64 / 365.0;
        let forward = spot * ((rate - dividend_yield) * t).exp();
        for i in 0..=24 {
            let strike = 70.0 + 2.5 * i as f64;
            let vol = skew((strike / forward).ln(), t);
            for option_type in [OptionType::Call, OptionType::Put] {
                let p = black_scholes_price(spot, strike, t, rate, dividend_yield, vol, option_type);
                quotes.push(OptionQuote {
                    strike,
                    option_type,
                    bid: p * 0.99,
                    ask: p * 1.01,
                    volume: 10,
                    open_interest: 100 + 10 * i as u64,
                    expiry,
                    valuation_date: valuation,
                });
            }
        }
    }

    // ---------------------------------------------------------------
    // 2. Build the surface
    // ---------------------------------------------------------------

    let mut config = EngineConfig::default();
    config.surface_grid.smoothing_sigma = Some(1.0);

    let build = SurfaceBuilder::new()
        .spot(spot)
        .rate(rate)
        .dividend_yield(dividend_yield)
        .config(config)
        .quotes(quotes)
        .build()?;

    println!(
        "Surface built: {} maturities, {} skipped\n",
        build.surface.tenors().len(),
        build.diagnostics.skipped_maturities.len()
    );

    // ---------------------------------------------------------------
    // 3. Query vol across the surface
    // ---------------------------------------------------------------

    println!("--- Vol grid (maturity x log-moneyness) ---\n");
    let query_tenors = [0.1, 0.25, 0.5, 0.75, 1.0, 1.5];
    let query_k = [-0.2, -0.1, 0.0, 0.1, 0.2];

    print!("{:>8}", "T\\k");
    for &k in &query_k {
        print!("{k:>10.2}");
    }
    println!();
    println!("{}", "-".repeat(58));

    for &t in &query_tenors {
        print!("{t:>8.2}");
        for &k in &query_k {
            let vol = build.surface.black_vol(k, t)?;
            print!("{:>9.2}%", vol.0 * 100.0);
        }
        println!();
    }

    // ---------------------------------------------------------------
    // 4. Diagnostics
    // ---------------------------------------------------------------

    println!("\n--- Build diagnostics ---\n");
    let diag = &build.diagnostics;
    println!("Rejected quotes: {}", diag.rejected_quotes.len());
    for skipped in &diag.skipped_maturities {
        println!("  skipped {}: {}", skipped.expiry_date, skipped.reason);
    }
    for b in &diag.butterfly {
        println!(
            "  T={:.3}: {} butterfly violations",
            b.expiry,
            b.report.butterfly_violations.len()
        );
    }
    println!("Calendar corrections: {}", diag.calendar_violations.len());
    println!("Arbitrage-free: {}", diag.is_arbitrage_free());

    // ---------------------------------------------------------------
    // 5. Display grid
    // ---------------------------------------------------------------

    let grid = build.grid()?;
    println!(
        "\nGrid: {} x {} cells, {} inside the observed hull (smoothed: {})",
        grid.tenors().len(),
        grid.log_moneyness().len(),
        grid.points().len(),
        grid.is_smoothed()
    );

    Ok(())
}

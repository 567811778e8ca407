//! Plain-text rendering of the screen state

use std::fmt::Write;

use ticker_core::{ChartData, CoinsState, ScreenState};

const BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Sparkline for chart dots. A dot of 0 is the maximum and draws the
/// tallest bar.
pub fn sparkline(dots: &[f64]) -> String {
    dots.iter()
        .map(|dot| {
            let height = (1.0 - dot.clamp(0.0, 1.0)) * (BARS.len() - 1) as f64;
            BARS[height.round() as usize]
        })
        .collect()
}

fn format_price(price: f64) -> String {
    if price >= 1.0 {
        format!("{:.2}", price)
    } else {
        format!("{:.6}", price)
    }
}

fn render_chart(out: &mut String, chart: &ChartData) {
    let _ = writeln!(
        out,
        "  chart   min {}  max {}  {}",
        format_price(chart.min),
        format_price(chart.max),
        sparkline(&chart.dots)
    );
}

/// Multi-line view of the current state
pub fn render_screen(state: &ScreenState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "[{}]", state.connectivity);

    match &state.coins {
        CoinsState::Loading => {
            let _ = writeln!(out, "  loading prices...");
        }
        CoinsState::LoadingFailed => {
            let _ = writeln!(out, "  could not load prices, type `retry`");
        }
        CoinsState::Downloaded(snapshot) => {
            for asset in snapshot.assets() {
                let _ = writeln!(out, "  {:<10} {:>14}", asset.symbol, format_price(asset.price));
            }
        }
    }

    if let Some(chart) = &state.chart {
        render_chart(&mut out, chart);
    }

    out
}

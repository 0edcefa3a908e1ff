use dashboard_core::{Persona, Quote, Score, ScoreOrigin};
use rand::Rng;

const LARGE_CAP_FLOOR: f64 = 100_000_000_000.0;
const HIGH_VOLUME_FLOOR: u64 = 100_000_000;

/// Deterministic-ish stand-in for a model completion. Each persona
/// scores with its own bias so dashboards stay plausible without a
/// backend.
pub fn synthetic_score(quote: &Quote, persona: Persona) -> Score {
    let mut rng = rand::thread_rng();
    let change = quote.change_percent;

    let raw = match persona {
        Persona::Basic => {
            let mut score: i64 = 50;
            if change > 2.0 {
                score += 20;
            } else if change > 0.0 {
                score += 10;
            } else if change < -2.0 {
                score -= 20;
            } else if change < 0.0 {
                score -= 10;
            }
            score += company_adjustment(&quote.symbol);
            score += rng.gen_range(-10..=10);
            score.clamp(10, 90)
        }
        Persona::Value => {
            let mut score: i64 = 50;
            if change < -5.0 {
                // Drawdowns read as entry points for the value persona
                score += 15;
            } else if change > 5.0 {
                score -= 10;
            }
            score += rng.gen_range(-10..=10);
            score.clamp(0, 100)
        }
        Persona::Growth => {
            let mut score: i64 = 50;
            if change > 2.0 {
                score += 20;
            } else if change < -2.0 {
                score -= 15;
            }
            score += rng.gen_range(-15..=15);
            score.clamp(0, 100)
        }
        Persona::Quant => {
            let mut score: i64 = 50;
            if quote.market_cap.is_some_and(|mc| mc > LARGE_CAP_FLOOR) {
                score += 10;
            }
            score += (change * 2.0) as i64;
            score += rng.gen_range(-5..=5);
            score.clamp(0, 100)
        }
    };

    let reason = match persona {
        Persona::Basic => basic_reasoning(quote, raw, change),
        Persona::Value => value_reasoning(&quote.symbol, raw, change),
        Persona::Growth => growth_reasoning(&quote.symbol, raw, change),
        Persona::Quant => quant_reasoning(&quote.symbol, raw, change),
    };

    Score {
        persona,
        origin: ScoreOrigin::Synthetic,
        score: raw as i32,
        reason,
    }
}

fn company_adjustment(symbol: &str) -> i64 {
    match symbol {
        "AAPL" => 15,
        "GOOGL" => 10,
        "MSFT" => 15,
        "TSLA" => 5,
        "AMZN" => 10,
        "NVDA" => 20,
        "META" => 0,
        "NFLX" => -5,
        _ => 0,
    }
}

fn company_name(symbol: &str) -> String {
    match symbol {
        "AAPL" => "Apple Inc.".to_string(),
        "GOOGL" => "Alphabet Inc.".to_string(),
        "MSFT" => "Microsoft Corporation".to_string(),
        "TSLA" => "Tesla Inc.".to_string(),
        "AMZN" => "Amazon.com Inc.".to_string(),
        "NVDA" => "NVIDIA Corporation".to_string(),
        "META" => "Meta Platforms Inc.".to_string(),
        "NFLX" => "Netflix Inc.".to_string(),
        other => format!("{other} Corporation"),
    }
}

fn basic_reasoning(quote: &Quote, score: i64, change: f64) -> String {
    let company = company_name(&quote.symbol);

    let (performance, outlook) = if score >= 75 {
        (
            if change > 0.0 {
                "strong upward momentum"
            } else {
                "resilient performance despite market conditions"
            },
            "Excellent investment opportunity with strong fundamentals and positive market sentiment.",
        )
    } else if score >= 60 {
        (
            if change.abs() < 1.0 {
                "steady performance"
            } else {
                "moderate volatility"
            },
            "Good investment potential with balanced risk-reward profile.",
        )
    } else if score >= 40 {
        (
            if change.abs() < 2.0 {
                "mixed signals"
            } else {
                "concerning volatility"
            },
            "Neutral outlook with moderate investment risk.",
        )
    } else {
        (
            if change < 0.0 {
                "declining performance"
            } else {
                "uncertain momentum"
            },
            "Higher risk investment requiring careful consideration.",
        )
    };

    let volume_note = if quote.volume > HIGH_VOLUME_FLOOR {
        "high trading volume indicates strong investor interest"
    } else {
        "moderate trading activity"
    };

    format!("{company} shows {performance} with a {change:+.1}% daily change. The {volume_note}. {outlook}")
}

fn value_reasoning(symbol: &str, score: i64, change: f64) -> String {
    if score >= 70 {
        format!(
            "{symbol} shows strong value characteristics with a {change:.1}% daily change. The company demonstrates solid fundamentals and long-term growth potential at current valuations."
        )
    } else if score >= 40 {
        format!(
            "{symbol} presents mixed value signals. While the {change:.1}% performance is noteworthy, more analysis of intrinsic value and competitive moats is needed."
        )
    } else {
        format!(
            "{symbol} appears overvalued based on current metrics. The {change:.1}% change suggests market sentiment may be disconnected from fundamental value."
        )
    }
}

fn growth_reasoning(symbol: &str, score: i64, change: f64) -> String {
    if score >= 70 {
        format!(
            "{symbol} exhibits strong growth momentum with {change:.1}% daily performance. The company shows promising earnings growth potential at reasonable valuations."
        )
    } else if score >= 40 {
        format!(
            "{symbol} shows moderate growth prospects. The {change:.1}% change indicates some momentum, but growth sustainability needs closer examination."
        )
    } else {
        format!(
            "{symbol} lacks compelling growth characteristics. The {change:.1}% performance suggests limited near-term growth catalysts."
        )
    }
}

fn quant_reasoning(symbol: &str, score: i64, change: f64) -> String {
    if score >= 70 {
        format!(
            "{symbol} demonstrates strong quantitative metrics. Mathematical models suggest fair value above current price based on discounted cash flow analysis and {change:.1}% performance indicators."
        )
    } else if score >= 40 {
        format!(
            "{symbol} shows mixed quantitative signals. DCF models indicate neutral valuation with {change:.1}% performance within expected volatility ranges."
        )
    } else {
        format!(
            "{symbol} exhibits concerning mathematical indicators. DCF analysis suggests potential overvaluation with {change:.1}% performance below model expectations."
        )
    }
}

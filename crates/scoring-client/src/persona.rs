use dashboard_core::{Persona, Quote};

/// Prompt used by the value persona.
const VALUE_PROMPT_TEMPLATE: &str = "\
Analyze this stock using value investing principles:

Focus on:
- Intrinsic value vs market price
- Competitive moats and market position
- Long-term growth sustainability
- Management quality indicators
- Financial strength and debt levels

Stock Data:
Symbol: {symbol}
Current Price: ${current_price}
Previous Close: ${previous_close}
Daily Change: {change_percent}%
Volume: {volume}
Market Cap: ${market_cap}

Provide a score 0-100 and reasoning focusing on long-term value.

Respond in JSON format:
{\"score\": <number>, \"reason\": \"<value investing perspective>\"}";

/// Prompt used by the growth persona.
const GROWTH_PROMPT_TEMPLATE: &str = "\
Analyze this stock using GARP (Growth at Reasonable Price) principles:

Focus on:
- Earnings growth potential
- PEG ratio considerations
- Market opportunity size
- Company story and catalysts
- Reasonable valuation for growth

Stock Data:
Symbol: {symbol}
Current Price: ${current_price}
Previous Close: ${previous_close}
Daily Change: {change_percent}%
Volume: {volume}
Market Cap: ${market_cap}

Provide a score 0-100 and reasoning focusing on growth at reasonable price.

Respond in JSON format:
{\"score\": <number>, \"reason\": \"<GARP investment perspective>\"}";

/// Prompt used by the quantitative persona.
const QUANT_PROMPT_TEMPLATE: &str = "\
Analyze this stock using mathematical models:

Focus on:
- Discounted Cash Flow (DCF) indicators
- Statistical valuation metrics
- Risk-adjusted returns
- Volatility analysis
- Mathematical probability models

Stock Data:
Symbol: {symbol}
Current Price: ${current_price}
Previous Close: ${previous_close}
Daily Change: {change_percent}%
Volume: {volume}
Market Cap: ${market_cap}

Provide a score 0-100 and reasoning based on mathematical analysis.

Respond in JSON format:
{\"score\": <number>, \"reason\": \"<mathematical analysis perspective>\"}";

/// Template the persona submits. The basic persona uses the
/// admin-configured prompt; the specialized ones ship their own.
pub fn template_for(persona: Persona, configured: &str) -> &str {
    match persona {
        Persona::Basic => configured,
        Persona::Value => VALUE_PROMPT_TEMPLATE,
        Persona::Growth => GROWTH_PROMPT_TEMPLATE,
        Persona::Quant => QUANT_PROMPT_TEMPLATE,
    }
}

pub fn system_prompt(persona: Persona) -> String {
    match persona {
        Persona::Basic => {
            "You are a financial analyst AI. Provide objective stock analysis based on the given data."
                .to_string()
        }
        other => format!("You are a {} style stock analyst.", other.display_name()),
    }
}

/// Specialized personas run cold so their style stays consistent.
pub fn temperature(persona: Persona) -> f64 {
    match persona {
        Persona::Basic => 0.7,
        _ => 0.1,
    }
}

/// Substitute quote fields into a prompt template.
pub fn render_prompt(template: &str, quote: &Quote) -> String {
    let market_cap = quote
        .market_cap
        .map(|mc| group_thousands(mc as u64))
        .unwrap_or_else(|| "N/A".to_string());

    template
        .replace("{symbol}", &quote.symbol)
        .replace("{current_price}", &format!("{:.2}", quote.current_price))
        .replace("{previous_close}", &format!("{:.2}", quote.previous_close))
        .replace("{change_percent}", &format!("{:.2}", quote.change_percent))
        .replace("{volume}", &group_thousands(quote.volume))
        .replace("{market_cap}", &market_cap)
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn quote() -> Quote {
        Quote {
            symbol: "AAPL".to_string(),
            current_price: 182.5,
            previous_close: 180.0,
            change_percent: 1.39,
            volume: 64_000_000,
            market_cap: Some(2_800_000_000_000.0),
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn test_render_substitutes_every_placeholder() {
        let rendered = render_prompt(dashboard_core::DEFAULT_PROMPT_TEMPLATE, &quote());
        assert!(rendered.contains("Symbol: AAPL"));
        assert!(rendered.contains("Current Price: $182.50"));
        assert!(rendered.contains("Previous Close: $180.00"));
        assert!(rendered.contains("Daily Change: 1.39%"));
        assert!(rendered.contains("Volume: 64,000,000"));
        assert!(rendered.contains("Market Cap: $2,800,000,000,000"));
        for placeholder in ["{symbol}", "{current_price}", "{volume}", "{market_cap}"] {
            assert!(!rendered.contains(placeholder));
        }
    }

    #[test]
    fn test_render_handles_missing_market_cap() {
        let mut q = quote();
        q.market_cap = None;
        let rendered = render_prompt(dashboard_core::DEFAULT_PROMPT_TEMPLATE, &q);
        assert!(rendered.contains("Market Cap: $N/A"));
    }

    #[test]
    fn test_basic_uses_configured_template() {
        assert_eq!(template_for(Persona::Basic, "custom {symbol}"), "custom {symbol}");
        assert!(template_for(Persona::Value, "custom").contains("value investing"));
        assert!(template_for(Persona::Growth, "custom").contains("GARP"));
        assert!(template_for(Persona::Quant, "custom").contains("DCF"));
    }

    #[test]
    fn test_specialized_templates_request_json() {
        for persona in [Persona::Value, Persona::Growth, Persona::Quant] {
            let template = template_for(persona, "");
            assert!(template.contains("{\"score\": <number>"));
            for placeholder in ["{symbol}", "{current_price}", "{volume}", "{market_cap}"] {
                assert!(template.contains(placeholder), "{persona:?} missing {placeholder}");
            }
        }
    }

    #[test]
    fn test_system_prompts_identify_the_persona() {
        assert!(system_prompt(Persona::Basic).contains("financial analyst AI"));
        assert_eq!(
            system_prompt(Persona::Value),
            "You are a Value Investor style stock analyst."
        );
        assert_eq!(
            system_prompt(Persona::Quant),
            "You are a Quantitative Analyst style stock analyst."
        );
    }

    #[test]
    fn test_temperatures() {
        assert_eq!(temperature(Persona::Basic), 0.7);
        assert_eq!(temperature(Persona::Growth), 0.1);
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1_000), "1,000");
        assert_eq!(group_thousands(64_000_000), "64,000,000");
    }
}

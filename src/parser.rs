//! Parse learner commands typed into the terminal.
//! Supported: navigation, reset, variant switch, outline, quote and payoff.

use regex::Regex;
use std::sync::OnceLock;

use crate::types::{ContentVariant, OptionType, Side};

#[derive(Debug, Clone, PartialEq)]
pub struct PayoffArgs {
    pub option_type: OptionType,
    pub side: Side,
    pub strike: f64,
    pub premium: f64,
    pub volatility: f64,
    pub days_left: u32,
    pub range_start: f64,
    pub range_end: f64,
    pub step: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Next,
    Back,
    /// Zero-based target; typed 1-based.
    Goto { module: usize, step: usize },
    Reset,
    Variant(ContentVariant),
    Outline,
    Quote,
    /// `None` plots the current simulator inputs.
    Payoff(Option<PayoffArgs>),
    Scenario(String),
    Dismiss,
    Help,
    Quit,
}

const NUM: &str = r"(-?\d+(?:\.\d+)?)";

fn re_goto() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(?:goto|g)\s+(\d+)\s+(\d+)$").expect("goto pattern"))
}

fn re_variant() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(?:variant|v)\s+(default|tech)$").expect("variant pattern"))
}

fn re_scenario() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^scenario\s+([a-z][a-z-]*)$").expect("scenario pattern"))
}

fn re_payoff() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // payoff call buy 210 10 2.5 0 150 250 10
        let pat = format!(
            r"(?i)^payoff\s+(call|put|c|p)\s+(buy|sell)\s+{n}\s+{n}\s+{n}\s+(\d+)\s+{n}\s+{n}\s+{n}$",
            n = NUM
        );
        Regex::new(&pat).expect("payoff pattern")
    })
}

pub fn parse_command(text: &str) -> Option<Command> {
    // Normalize whitespace
    let t = text.split_whitespace().collect::<Vec<_>>().join(" ");

    match t.to_ascii_lowercase().as_str() {
        "" | "n" | "next" => return Some(Command::Next),
        "b" | "back" | "prev" => return Some(Command::Back),
        "reset" => return Some(Command::Reset),
        "o" | "outline" => return Some(Command::Outline),
        "q" | "quote" => return Some(Command::Quote),
        "payoff" => return Some(Command::Payoff(None)),
        "dismiss" | "x" => return Some(Command::Dismiss),
        "h" | "help" | "?" => return Some(Command::Help),
        "quit" | "exit" => return Some(Command::Quit),
        _ => {}
    }

    if let Some(c) = re_goto().captures(&t) {
        let module: usize = c[1].parse().ok()?;
        let step: usize = c[2].parse().ok()?;
        if module == 0 || step == 0 {
            return None;
        }
        return Some(Command::Goto {
            module: module - 1,
            step: step - 1,
        });
    }

    if let Some(c) = re_variant().captures(&t) {
        return c[1].to_ascii_lowercase().parse().ok().map(Command::Variant);
    }

    if let Some(c) = re_scenario().captures(&t) {
        return Some(Command::Scenario(c[1].to_ascii_lowercase()));
    }

    if let Some(c) = re_payoff().captures(&t) {
        let args = PayoffArgs {
            option_type: c[1].parse().ok()?,
            side: c[2].parse().ok()?,
            strike: c[3].parse().ok()?,
            premium: c[4].parse().ok()?,
            volatility: c[5].parse().ok()?,
            days_left: c[6].parse().ok()?,
            range_start: c[7].parse().ok()?,
            range_end: c[8].parse().ok()?,
            step: c[9].parse().ok()?,
        };
        let numbers = [args.strike, args.premium, args.volatility, args.range_start, args.range_end, args.step];
        if numbers.iter().any(|n| !n.is_finite()) || args.step <= 0.0 || args.volatility <= 0.0 {
            return None;
        }
        return Some(Command::Payoff(Some(args)));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn must_parse(s: &str) -> Command {
        parse_command(s).unwrap_or_else(|| panic!("should parse: {s}"))
    }

    #[test]
    fn navigation_words() {
        assert_eq!(must_parse(""), Command::Next);
        assert_eq!(must_parse("   "), Command::Next);
        assert_eq!(must_parse("NEXT"), Command::Next);
        assert_eq!(must_parse("b"), Command::Back);
        assert_eq!(must_parse("prev"), Command::Back);
        assert_eq!(must_parse("Reset"), Command::Reset);
        assert_eq!(must_parse("quit"), Command::Quit);
    }

    #[test]
    fn goto_is_one_based() {
        assert_eq!(must_parse("goto 2 3"), Command::Goto { module: 1, step: 2 });
        assert_eq!(must_parse("  g   1  1 "), Command::Goto { module: 0, step: 0 });
        assert!(parse_command("goto 0 1").is_none());
        assert!(parse_command("goto 1").is_none());
        assert!(parse_command("goto a b").is_none());
    }

    #[test]
    fn variant_names() {
        assert_eq!(must_parse("variant tech"), Command::Variant(ContentVariant::Tech));
        assert_eq!(must_parse("v DEFAULT"), Command::Variant(ContentVariant::Default));
        assert!(parse_command("variant crypto").is_none());
    }

    #[test]
    fn payoff_with_full_arguments() {
        match must_parse("payoff call buy 210 10 2.5 0 150 250 10") {
            Command::Payoff(Some(a)) => {
                assert_eq!(a.option_type, OptionType::Call);
                assert_eq!(a.side, Side::Buy);
                assert_eq!(a.strike, 210.0);
                assert_eq!(a.volatility, 2.5);
                assert_eq!(a.days_left, 0);
                assert_eq!((a.range_start, a.range_end, a.step), (150.0, 250.0, 10.0));
            }
            other => panic!("expected payoff args, got {other:?}"),
        }
        assert_eq!(must_parse("payoff"), Command::Payoff(None));
    }

    #[test]
    fn payoff_rejects_bad_numbers() {
        assert!(parse_command("payoff call buy 210 10 2.5 0 150 250 0").is_none());
        assert!(parse_command("payoff call hold 210 10 2.5 0 150 250 10").is_none());
        assert!(parse_command("payoff put sell 210 10 0 5 150 250 10").is_none());
        assert!(parse_command("payoff call buy 210 10 2.5 -1 150 250 10").is_none());
    }

    #[test]
    fn payoff_rejects_numbers_too_large_for_f64() {
        let huge = "9".repeat(400);
        assert!(parse_command(&format!("payoff call buy 210 10 2.5 0 0 {huge} 1")).is_none());
        assert!(parse_command(&format!("payoff put buy {huge} 10 2.5 0 0 100 1")).is_none());
    }

    #[test]
    fn scenario_ids() {
        assert_eq!(must_parse("scenario casino-house"), Command::Scenario("casino-house".into()));
        assert!(parse_command("scenario").is_none());
    }

    #[test]
    fn random_text_should_fail() {
        assert!(parse_command("hello world").is_none());
        assert!(parse_command("buy tesla now").is_none());
    }
}

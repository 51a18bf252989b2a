//! Small helpers.

pub fn sanitize_symbol(sym: &str) -> String {
    sym.trim().to_uppercase()
}

/// Claim bookkeeping key for a step, e.g. "2-0".
pub fn claim_key(module_idx: usize, step_idx: usize) -> String {
    format!("{module_idx}-{step_idx}")
}

pub fn parse_claim_key(s: &str) -> Option<(usize, usize)> {
    let (m, st) = s.trim().split_once('-')?;
    Some((m.parse().ok()?, st.parse().ok()?))
}

/// "+$1,500" / "-$300" / "$0", whole dollars.
pub fn format_money(amount: f64) -> String {
    let rounded = amount.round();
    let digits = format!("{}", rounded.abs() as u64);
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded > 0.0 {
        format!("+${grouped}")
    } else if rounded < 0.0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}

use anyhow::{Context, Result, bail};
use std::collections::HashSet;

const DEFAULT_SEED: u64 = 1337;
/// Upper bound on how many seeds one `a..b` token may expand to.
const MAX_RANGE_LEN: u64 = 10_000;

/// Seed plus the CLI token it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedInfo {
    pub seed: u64,
    pub source: Option<String>,
}

impl SeedInfo {
    #[must_use]
    pub fn from_numeric(seed: u64) -> Self {
        Self { seed, source: None }
    }

    #[must_use]
    pub fn from_token(seed: u64, token: &str) -> Self {
        Self {
            seed,
            source: Some(token.to_string()),
        }
    }
}

/// Resolve CLI seed arguments into a deduplicated seed list.
///
/// Accepts decimal integers (negative values use their magnitude), `0x` hex
/// literals and half-open `a..b` ranges. An empty list falls back to 1337.
pub fn resolve_seed_inputs(tokens: &[String]) -> Result<Vec<SeedInfo>> {
    let mut pending: Vec<SeedInfo> = Vec::new();

    for token in tokens {
        if token.is_empty() {
            continue;
        }

        if let Some((start, end)) = token.split_once("..") {
            let start = parse_seed(start)?;
            let end = parse_seed(end)?;
            if end <= start {
                bail!("Empty seed range: {token}");
            }
            if end - start > MAX_RANGE_LEN {
                bail!("Seed range {token} exceeds {MAX_RANGE_LEN} seeds");
            }
            pending.extend((start..end).map(|seed| SeedInfo::from_token(seed, token)));
            continue;
        }

        let seed = parse_seed(token)?;
        pending.push(SeedInfo::from_numeric(seed));
    }

    let mut seen = HashSet::new();
    let mut deduped: Vec<SeedInfo> = pending
        .into_iter()
        .filter(|info| seen.insert(info.seed))
        .collect();

    if deduped.is_empty() {
        deduped.push(SeedInfo::from_numeric(DEFAULT_SEED));
    }

    Ok(deduped)
}

fn parse_seed(token: &str) -> Result<u64> {
    let token = token.trim();
    if let Some(hex) = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        return u64::from_str_radix(&hex.replace('_', ""), 16)
            .with_context(|| format!("Unrecognized hex seed: {token}"));
    }
    if let Ok(value) = token.parse::<i64>() {
        return Ok(value.unsigned_abs());
    }
    token
        .parse::<u64>()
        .with_context(|| format!("Unrecognized seed token: {token}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn resolves_numeric_hex_and_negative() {
        let seeds = resolve_seed_inputs(&tokens(&["42", "-7", "0xff"])).unwrap();
        let values: Vec<u64> = seeds.iter().map(|s| s.seed).collect();
        assert_eq!(values, vec![42, 7, 255]);
    }

    #[test]
    fn expands_ranges_and_dedupes() {
        let seeds = resolve_seed_inputs(&tokens(&["3..6", "4"])).unwrap();
        let values: Vec<u64> = seeds.iter().map(|s| s.seed).collect();
        assert_eq!(values, vec![3, 4, 5]);
        assert_eq!(seeds[0].source.as_deref(), Some("3..6"));
    }

    #[test]
    fn empty_input_uses_default_seed() {
        let seeds = resolve_seed_inputs(&[]).unwrap();
        assert_eq!(seeds, vec![SeedInfo::from_numeric(1337)]);
    }

    #[test]
    fn rejects_garbage_and_empty_ranges() {
        assert!(resolve_seed_inputs(&tokens(&["pants"])).is_err());
        assert!(resolve_seed_inputs(&tokens(&["9..9"])).is_err());
        assert!(resolve_seed_inputs(&tokens(&["0..100000"])).is_err());
    }
}

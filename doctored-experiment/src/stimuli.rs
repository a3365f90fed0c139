//! Stimulus discovery, pairing and the balanced signal/noise mask.

use crate::config::StimulusConfig;
use crate::error::StimulusError;
use doctored_core::{PlannedTrial, StimulusKind, StimulusPair};
use globset::{Glob, GlobBuilder, GlobMatcher};
use rand::Rng;
use rand::seq::SliceRandom;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// Finds both image collections under the stimulus directory and pairs them.
///
/// Each collection is sorted by the part of the file name that follows the
/// pattern's literal prefix (`signal2` before `signal10`) and the nth
/// signal image is paired with the nth noise image.
pub fn discover_pairs(config: &StimulusConfig) -> Result<Vec<StimulusPair>, StimulusError> {
    if !config.dir.is_dir() {
        return Err(StimulusError::MissingDirectory(config.dir.clone()));
    }
    let signal_matcher = compile(&config.signal_pattern)?;
    let noise_matcher = compile(&config.noise_pattern)?;

    let mut signal = Vec::new();
    let mut noise = Vec::new();
    let walker = ignore::WalkBuilder::new(&config.dir)
        .standard_filters(false)
        .sort_by_file_path(|a, b| a.cmp(b))
        .build();
    for entry in walker {
        let entry = entry.map_err(|e| StimulusError::Walk(e.to_string()))?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if signal_matcher.is_match(name) {
            signal.push(entry.into_path());
        } else if noise_matcher.is_match(name) {
            noise.push(entry.into_path());
        }
    }

    if signal.is_empty() {
        return Err(StimulusError::Empty {
            kind: "signal",
            pattern: config.signal_pattern.clone(),
            dir: config.dir.clone(),
        });
    }
    if noise.is_empty() {
        return Err(StimulusError::Empty {
            kind: "noise",
            pattern: config.noise_pattern.clone(),
            dir: config.dir.clone(),
        });
    }

    sort_by_suffix(&mut signal, literal_prefix(&config.signal_pattern));
    sort_by_suffix(&mut noise, literal_prefix(&config.noise_pattern));

    pair_up(signal, noise, config.truncate_unpaired)
}

/// Zips the two collections positionally.
pub fn pair_up(
    signal: Vec<PathBuf>,
    noise: Vec<PathBuf>,
    truncate_unpaired: bool,
) -> Result<Vec<StimulusPair>, StimulusError> {
    if signal.len() != noise.len() {
        if !truncate_unpaired {
            return Err(StimulusError::MismatchedCounts {
                signal: signal.len(),
                noise: noise.len(),
            });
        }
        tracing::warn!(
            signal = signal.len(),
            noise = noise.len(),
            "stimulus collections differ in size, dropping unpaired images"
        );
    }
    Ok(signal
        .into_iter()
        .zip(noise)
        .map(|(signal, noise)| StimulusPair { signal, noise })
        .collect())
}

/// Balanced mask of length `n`: half signal, half noise, shuffled. For odd
/// `n` the extra label is drawn uniformly.
pub fn balanced_mask<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<StimulusKind> {
    let mut mask = Vec::with_capacity(n);
    for _ in 0..n / 2 {
        mask.push(StimulusKind::Signal);
        mask.push(StimulusKind::Noise);
    }
    if n % 2 == 1 {
        mask.push(if rng.random_bool(0.5) {
            StimulusKind::Signal
        } else {
            StimulusKind::Noise
        });
    }
    mask.shuffle(rng);
    mask
}

/// Attaches a mask bit to every pair, then shuffles the pair order.
pub fn plan_trials<R: Rng + ?Sized>(pairs: Vec<StimulusPair>, rng: &mut R) -> Vec<PlannedTrial> {
    let mask = balanced_mask(pairs.len(), rng);
    let mut plan: Vec<PlannedTrial> = pairs
        .into_iter()
        .zip(mask)
        .map(|(pair, shown)| PlannedTrial { pair, shown })
        .collect();
    plan.shuffle(rng);
    plan
}

fn compile(pattern: &str) -> Result<GlobMatcher, StimulusError> {
    let mut glob = GlobBuilder::new(pattern);
    if cfg!(windows) {
        glob.case_insensitive(true);
    }
    glob.literal_separator(true)
        .build()
        .map(|g: Glob| g.compile_matcher())
        .map_err(|e| StimulusError::Pattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

/// Literal text before the first glob metacharacter, e.g. `signal` for `signal*.jpg`.
fn literal_prefix(pattern: &str) -> &str {
    let end = pattern
        .find(|c| matches!(c, '*' | '?' | '[' | '{'))
        .unwrap_or(pattern.len());
    &pattern[..end]
}

fn sort_by_suffix(paths: &mut [PathBuf], prefix: &str) {
    paths.sort_by(|a, b| {
        natural_cmp(suffix(a, prefix), suffix(b, prefix)).then_with(|| a.cmp(b))
    });
}

fn suffix<'a>(path: &'a Path, prefix: &str) -> &'a str {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    stem.strip_prefix(prefix).unwrap_or(stem)
}

/// Compares digit runs by value and everything else by character.
fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (mut a, mut b) = (a, b);
    loop {
        match (a.chars().next(), b.chars().next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let a_len = a.find(|c: char| !c.is_ascii_digit()).unwrap_or(a.len());
                let b_len = b.find(|c: char| !c.is_ascii_digit()).unwrap_or(b.len());
                let a_num = a[..a_len].trim_start_matches('0');
                let b_num = b[..b_len].trim_start_matches('0');
                let ord = a_num
                    .len()
                    .cmp(&b_num.len())
                    .then_with(|| a_num.cmp(b_num));
                if ord != Ordering::Equal {
                    return ord;
                }
                a = &a[a_len..];
                b = &b[b_len..];
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
                a = &a[x.len_utf8()..];
                b = &b[y.len_utf8()..];
            }
        }
    }
}

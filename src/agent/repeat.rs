use super::ledger::Step;

/// How many identical consecutive actions count as a stuck cycle.
pub const MAX_LOOP_REPEATS: usize = 3;

/// True when the most recent [`MAX_LOOP_REPEATS`] action steps — including
/// the candidate the caller appended — all share one `(tool, args)`
/// signature. Catches models that deterministically re-issue the same call
/// when an observation doesn't change their state.
///
/// Fewer than [`MAX_LOOP_REPEATS`] action steps never flags.
pub fn detect_loop(recent: &[Step]) -> bool {
    let signatures: Vec<String> = recent.iter().filter_map(Step::signature).collect();
    if signatures.len() < MAX_LOOP_REPEATS {
        return false;
    }
    let tail = &signatures[signatures.len() - MAX_LOOP_REPEATS..];
    tail.windows(2).all(|pair| pair[0] == pair[1])
}

use signal_types::Signal;

/// Slices `history` for `/recorder/fetch`'s `lastfrom` parameter
/// (recorder/recorderserver.go's `Fetch`): search backward for the most
/// recent signal whose `text` starts with `lastfrom`, and return everything
/// from there onward. An empty `lastfrom` returns the whole history. A
/// non-empty `lastfrom` that matches nothing returns nothing — it is not a
/// "give me everything" fallback.
pub fn slice_from(history: &[Signal], lastfrom: &str) -> Vec<Signal> {
    if lastfrom.is_empty() {
        return history.to_vec();
    }
    match history.iter().rposition(|s| s.text.starts_with(lastfrom)) {
        Some(idx) => history[idx..].to_vec(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_types::SignalType;

    fn sig(text: &str) -> Signal {
        Signal::new("id", "pid", SignalType::Signal, text)
    }

    #[test]
    fn empty_lastfrom_returns_everything() {
        let history = vec![sig("a"), sig("b"), sig("c")];
        let sliced = slice_from(&history, "");
        assert_eq!(sliced.len(), 3);
    }

    #[test]
    fn lastfrom_matches_most_recent_occurrence() {
        let history = vec![sig("x1"), sig("other"), sig("x2"), sig("unrelated")];
        let sliced = slice_from(&history, "x");
        assert_eq!(sliced.len(), 2);
        assert_eq!(sliced[0].text, "x2");
        assert_eq!(sliced[1].text, "unrelated");
    }

    #[test]
    fn lastfrom_with_no_match_returns_nothing() {
        let history = vec![sig("a"), sig("b")];
        assert!(slice_from(&history, "zzz").is_empty());
    }

    #[test]
    fn empty_history_returns_empty_regardless_of_lastfrom() {
        assert!(slice_from(&[], "x").is_empty());
        assert!(slice_from(&[], "").is_empty());
    }
}

//! Turn order over a fixed roster, skipping eliminated players.

use crate::types::Player;

/// Next eligible player after `from`, wrapping around the roster.
///
/// May return `from` itself when it is the only eligible player left.
pub fn next_eligible(players: &[Player], from: usize) -> Option<usize> {
    let len = players.len();
    (1..=len)
        .map(|step| (from + step) % len)
        .find(|&i| !players[i].is_eliminated())
}

/// Previous eligible player before `from`, wrapping around the roster.
pub fn previous_eligible(players: &[Player], from: usize) -> Option<usize> {
    let len = players.len();
    (1..=len)
        .map(|step| (from + len - step % len) % len)
        .find(|&i| !players[i].is_eliminated())
}

pub fn eligible_count(players: &[Player]) -> usize {
    players.iter().filter(|p| !p.is_eliminated()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ELIMINATION_LETTERS;

    fn roster(letters: &[u8]) -> Vec<Player> {
        letters
            .iter()
            .enumerate()
            .map(|(i, &l)| {
                let mut p = Player::new(format!("p{}", i), format!("Player {}", i));
                p.letters = l;
                p
            })
            .collect()
    }

    #[test]
    fn test_next_wraps() {
        let players = roster(&[0, 0, 0]);
        assert_eq!(next_eligible(&players, 0), Some(1));
        assert_eq!(next_eligible(&players, 1), Some(2));
        assert_eq!(next_eligible(&players, 2), Some(0));
    }

    #[test]
    fn test_next_skips_eliminated() {
        let players = roster(&[0, ELIMINATION_LETTERS, 3, ELIMINATION_LETTERS]);
        assert_eq!(next_eligible(&players, 0), Some(2));
        assert_eq!(next_eligible(&players, 2), Some(0));
        // Starting from an eliminated player still lands on someone eligible
        assert_eq!(next_eligible(&players, 1), Some(2));
        assert_eq!(next_eligible(&players, 3), Some(0));
    }

    #[test]
    fn test_previous_skips_eliminated() {
        let players = roster(&[0, ELIMINATION_LETTERS, 2, 0]);
        assert_eq!(previous_eligible(&players, 0), Some(3));
        assert_eq!(previous_eligible(&players, 2), Some(0));
        assert_eq!(previous_eligible(&players, 3), Some(2));
    }

    #[test]
    fn test_single_eligible_returns_itself() {
        let players = roster(&[ELIMINATION_LETTERS, 1, ELIMINATION_LETTERS]);
        assert_eq!(next_eligible(&players, 1), Some(1));
        assert_eq!(previous_eligible(&players, 1), Some(1));
        assert_eq!(eligible_count(&players), 1);
    }

    #[test]
    fn test_nobody_eligible() {
        let players = roster(&[ELIMINATION_LETTERS, ELIMINATION_LETTERS]);
        assert_eq!(next_eligible(&players, 0), None);
        assert_eq!(previous_eligible(&players, 0), None);
        assert_eq!(next_eligible(&[], 0), None);
    }

    #[test]
    fn test_never_lands_on_eliminated() {
        let players = roster(&[ELIMINATION_LETTERS, 0, ELIMINATION_LETTERS, 1, 0]);
        for from in 0..players.len() {
            let next = next_eligible(&players, from).unwrap();
            let prev = previous_eligible(&players, from).unwrap();
            assert!(!players[next].is_eliminated());
            assert!(!players[prev].is_eliminated());
        }
    }
}

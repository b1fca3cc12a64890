//! Small display helpers.

use percent_encoding::percent_decode_str;

/// A room name prepared for display: the decoded `full` form plus a `short`
/// form truncated for narrow layouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomLabel {
    pub short: String,
    pub full: String,
}

/// Decode and tidy a room name as it may arrive from a URL path.
///
/// Decoding is applied iteratively (double- and triple-encoded names occur
/// in practice) until the string is stable, up to a small bound. `+` is
/// treated as a space and surrounding quotes are stripped.
pub fn normalize_room_name(raw: &str, max: usize) -> RoomLabel {
    const MAX_DECODE_ROUNDS: usize = 6;

    let mut full = raw.to_string();
    for _ in 0..MAX_DECODE_ROUNDS {
        match percent_decode_str(&full).decode_utf8() {
            Ok(decoded) => {
                if decoded == full {
                    break;
                }
                full = decoded.into_owned();
            }
            Err(_) => break,
        }
    }

    full = full.replace('+', " ");
    full = full.trim().to_string();
    if full.len() >= 2 && full.starts_with('"') && full.ends_with('"') {
        full = full[1..full.len() - 1].to_string();
    }

    if full.chars().count() <= max {
        return RoomLabel {
            short: full.clone(),
            full,
        };
    }
    let short: String = full.chars().take(max.saturating_sub(1)).collect();
    RoomLabel {
        short: format!("{}…", short.trim_end()),
        full,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_pass_through() {
        let label = normalize_room_name("general", 40);
        assert_eq!(label.short, "general");
        assert_eq!(label.full, "general");
    }

    #[test]
    fn double_encoded_names_are_fully_decoded() {
        // "salle%20de%20jeu" encoded once more
        let label = normalize_room_name("salle%2520de%2520jeu", 40);
        assert_eq!(label.full, "salle de jeu");
    }

    #[test]
    fn plus_becomes_space_and_quotes_are_stripped() {
        let label = normalize_room_name("%22les+amis%22", 40);
        assert_eq!(label.full, "les amis");
    }

    #[test]
    fn long_names_get_a_truncated_short_form() {
        let label = normalize_room_name("abcdefghij", 6);
        assert_eq!(label.full, "abcdefghij");
        assert_eq!(label.short, "abcde…");
    }

    #[test]
    fn invalid_encoding_is_left_as_is() {
        let label = normalize_room_name("caf%ZZ", 40);
        assert_eq!(label.full, "caf%ZZ");
    }
}

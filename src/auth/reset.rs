use rand::{rngs::OsRng, RngCore};
use time::{Duration, OffsetDateTime};

const TOKEN_BYTES: usize = 32;
pub const RESET_TOKEN_TTL: Duration = Duration::minutes(15);

/// Single-use password reset secret and the moment it stops being accepted.
#[derive(Debug, Clone)]
pub struct ResetToken {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

pub fn generate_reset_token(now: OffsetDateTime) -> ResetToken {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    ResetToken {
        token: hex::encode(bytes),
        expires_at: now + RESET_TOKEN_TTL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_fixed_length_hex() {
        let reset = generate_reset_token(OffsetDateTime::now_utc());
        assert_eq!(reset.token.len(), TOKEN_BYTES * 2);
        assert!(reset.token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn expires_fifteen_minutes_after_issue() {
        let now = OffsetDateTime::now_utc();
        let reset = generate_reset_token(now);
        assert_eq!(reset.expires_at - now, Duration::minutes(15));
    }

    #[test]
    fn tokens_do_not_repeat() {
        let now = OffsetDateTime::now_utc();
        let a = generate_reset_token(now);
        let b = generate_reset_token(now);
        assert_ne!(a.token, b.token);
    }
}

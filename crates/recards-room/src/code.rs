//! Room code generation.

use rand::Rng;
use recards_protocol::RoomCode;

/// Characters a code is drawn from. `I`, `O`, `0` and `1` are left out so
/// a code read aloud or off a screen can't be mistyped.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Number of characters in a room code.
pub const CODE_LEN: usize = 5;

/// Draws a random code. Uniqueness is the caller's job.
pub(crate) fn random_code(rng: &mut impl Rng) -> RoomCode {
    let code: String = (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect();
    RoomCode::new(code)
}

use rand::{rngs::OsRng, RngCore};

/// Raw entropy behind a tracking token; hex encoding doubles the length.
pub const TRACKING_TOKEN_BYTES: usize = 32;

/// Mints a tracking token from the OS CSPRNG as 64 lowercase hex characters.
/// Nothing about the application feeds into it.
pub fn issue_tracking_token() -> String {
    let mut bytes = [0u8; TRACKING_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Cheap shape check run before touching storage.
pub fn looks_like_tracking_token(candidate: &str) -> bool {
    candidate.len() == TRACKING_TOKEN_BYTES * 2
        && candidate.bytes().all(|b| b.is_ascii_hexdigit())
}

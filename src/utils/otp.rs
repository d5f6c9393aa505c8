// One-time-password generation and digest
// The digest is returned to the client alongside the emailed code; the client
// proves possession by recomputing HMAC-SHA256(otp+email) keyed with the same
// concatenation. Wire-compatible with existing mobile clients.

use rand::Rng;
use ring::hmac;

/// Generate a 6-digit numeric OTP
pub fn generate_otp() -> String {
    let mut rng = rand::thread_rng();
    (0..6)
        .map(|_| char::from(b'0' + rng.gen_range(0..10)))
        .collect()
}

/// HMAC-SHA256 digest of `otp + email`, keyed with `otp + email`, hex-encoded
pub fn otp_digest(otp: &str, email: &str) -> String {
    let material = format!("{}{}", otp, email);
    let key = hmac::Key::new(hmac::HMAC_SHA256, material.as_bytes());
    let tag = hmac::sign(&key, material.as_bytes());
    hex_encode(tag.as_ref())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

//! Per-run shared secret for the loopback gatekeeper.

use rand::RngCore;

/// Basic-auth username the child uses against the local bridge.
pub const USERNAME: &str = "ara";

/// Generates the per-run password: 16 bytes from the OS CSPRNG, hex-encoded.
///
/// The secret only ever travels over the loopback interface and dies with
/// the process; it is never logged or written to disk.
pub fn generate() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

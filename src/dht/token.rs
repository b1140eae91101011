use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use parking_lot::Mutex;
use sha1::{Digest, Sha1};

/// Issues and verifies `announce_peer` tokens.
///
/// A token is `SHA-1(secret ‖ ip ‖ epoch_bucket)` truncated to 8 bytes,
/// where the epoch bucket advances every token lifetime. Verification
/// accepts the current and the previous bucket, so a token stays valid for
/// between one and two lifetimes. Issued tokens are additionally remembered
/// per IP so a sweeper can report and bound that bookkeeping.
pub struct TokenManager {
    secret: [u8; 16],
    lifetime: Duration,
    issued: Mutex<HashMap<IpAddr, (Bytes, Instant)>>,
}

impl TokenManager {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            secret: rand::random(),
            lifetime: lifetime.max(Duration::from_secs(1)),
            issued: Mutex::new(HashMap::new()),
        }
    }

    /// Issues a token for a remote IP.
    pub fn issue(&self, ip: IpAddr) -> Bytes {
        let token = self.token_for(ip, self.current_bucket());
        self.issued
            .lock()
            .insert(ip, (token.clone(), Instant::now()));
        token
    }

    /// Accepts tokens minted in the current or previous epoch bucket.
    pub fn verify(&self, ip: IpAddr, token: &[u8]) -> bool {
        let bucket = self.current_bucket();

        if self.token_for(ip, bucket).as_ref() == token {
            return true;
        }

        bucket > 0 && self.token_for(ip, bucket - 1).as_ref() == token
    }

    /// Drops issued-token records past their lifetime.
    pub fn sweep(&self) {
        let lifetime = self.lifetime;
        self.issued
            .lock()
            .retain(|_, (_, at)| at.elapsed() <= lifetime);
    }

    pub fn issued_len(&self) -> usize {
        self.issued.lock().len()
    }

    fn current_bucket(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        now / self.lifetime.as_secs()
    }

    fn token_for(&self, ip: IpAddr, bucket: u64) -> Bytes {
        let mut hasher = Sha1::new();
        hasher.update(self.secret);
        hasher.update(ip.to_string().as_bytes());
        hasher.update(bucket.to_be_bytes());
        Bytes::copy_from_slice(&hasher.finalize()[..8])
    }
}

#[cfg(test)]
impl TokenManager {
    /// Test hook: token for an arbitrary epoch bucket.
    pub(crate) fn token_for_bucket(&self, ip: IpAddr, bucket: u64) -> Bytes {
        self.token_for(ip, bucket)
    }

    pub(crate) fn bucket_now(&self) -> u64 {
        self.current_bucket()
    }
}

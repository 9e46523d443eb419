//! Scoped guard for the secp256k1 context
//!
//! Key verification and export need a working secp256k1 implementation.
//! `EccContext::acquire()` checks it once per process with a self-test and
//! hands out a guard; components that do curve arithmetic take `&EccContext`
//! so the dependency is visible in their signatures.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{ProjectivePoint, SecretKey};
use tracing::{debug, error};

use crate::error::{CryptoError, CryptoResult};

static SELF_TEST: OnceLock<bool> = OnceLock::new();
static LIVE_GUARDS: AtomicUsize = AtomicUsize::new(0);

/// Live handle on the process secp256k1 context
///
/// Acquiring is idempotent: the self-test runs on first use only and its
/// result is cached. Dropping the last guard logs the context teardown.
#[derive(Debug)]
pub struct EccContext {
    _private: (),
}

impl EccContext {
    /// Acquire the context, running the self-test on first use
    pub fn acquire() -> CryptoResult<Self> {
        let ok = *SELF_TEST.get_or_init(self_test);
        if !ok {
            error!("secp256k1 self-test failed");
            return Err(CryptoError::EccSelfTestFailed);
        }

        let previous = LIVE_GUARDS.fetch_add(1, Ordering::SeqCst);
        if previous == 0 {
            debug!("secp256k1 context started");
        }
        Ok(Self { _private: () })
    }

    /// Number of guards currently alive in this process
    pub fn live_guards() -> usize {
        LIVE_GUARDS.load(Ordering::SeqCst)
    }
}

impl Drop for EccContext {
    fn drop(&mut self) {
        if LIVE_GUARDS.fetch_sub(1, Ordering::SeqCst) == 1 {
            debug!("secp256k1 context released");
        }
    }
}

/// Scalar 1 must map to the generator point.
fn self_test() -> bool {
    let mut one = [0u8; 32];
    one[31] = 1;
    let Ok(secret) = SecretKey::from_slice(&one) else {
        return false;
    };
    let derived = secret.public_key().as_affine().to_encoded_point(true);
    let generator = ProjectivePoint::GENERATOR.to_affine().to_encoded_point(true);
    derived == generator
}

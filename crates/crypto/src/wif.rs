//! Wallet Import Format (WIF) codec
//!
//! Layout before base58: `version || scalar(32) || [0x01 if compressed]`,
//! followed by the first 4 bytes of the payload's double SHA-256.

use std::fmt;
use std::str::FromStr;

use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};
use crate::hash::sha256d;
use crate::secp256k1::SECRET_KEY_SIZE;
use crate::secure::SecretArray;

/// Version byte for mainnet private keys
pub const MAINNET_WIF_VERSION: u8 = 0x80;

/// Version byte shared by every test network
pub const TESTNET_WIF_VERSION: u8 = 0xef;

const COMPRESSED_FLAG: u8 = 0x01;
const CHECKSUM_LEN: usize = 4;
const UNCOMPRESSED_LEN: usize = 1 + SECRET_KEY_SIZE + CHECKSUM_LEN;
const COMPRESSED_LEN: usize = UNCOMPRESSED_LEN + 1;

/// Chain whose conventions pick the WIF version byte
///
/// Defaults to regtest, the chain the dump tool has always encoded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Network {
    Main,
    Test,
    Testnet4,
    Signet,
    #[default]
    Regtest,
}

impl Network {
    /// All supported networks
    pub const ALL: [Network; 5] = [
        Network::Main,
        Network::Test,
        Network::Testnet4,
        Network::Signet,
        Network::Regtest,
    ];

    /// WIF version byte for this network
    pub fn wif_version(self) -> u8 {
        match self {
            Network::Main => MAINNET_WIF_VERSION,
            Network::Test | Network::Testnet4 | Network::Signet | Network::Regtest => {
                TESTNET_WIF_VERSION
            }
        }
    }

    /// Canonical lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Network::Main => "main",
            Network::Test => "test",
            Network::Testnet4 => "testnet4",
            Network::Signet => "signet",
            Network::Regtest => "regtest",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Network::ALL
            .into_iter()
            .find(|n| n.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CryptoError::UnknownNetwork(s.to_string()))
    }
}

/// A decoded WIF private key
///
/// The test networks share one version byte, so decoding reports
/// `Network::Test` for all of them.
#[derive(Debug)]
pub struct WifKey {
    pub secret: SecretArray<SECRET_KEY_SIZE>,
    pub compressed: bool,
    pub network: Network,
}

/// Encode a 32-byte secret as WIF.
///
/// The payload buffer is wiped after encoding and the returned string wipes
/// itself on drop.
pub fn encode_wif(
    secret: &[u8; SECRET_KEY_SIZE],
    compressed: bool,
    network: Network,
) -> Zeroizing<String> {
    let mut payload = Zeroizing::new(Vec::with_capacity(COMPRESSED_LEN));
    payload.push(network.wif_version());
    payload.extend_from_slice(secret);
    if compressed {
        payload.push(COMPRESSED_FLAG);
    }
    let checksum = sha256d(&payload);
    payload.extend_from_slice(&checksum[..CHECKSUM_LEN]);

    Zeroizing::new(bs58::encode(payload.as_slice()).into_string())
}

/// Decode a WIF string, checking alphabet, checksum, length, compression
/// marker and version byte.
pub fn decode_wif(text: &str) -> CryptoResult<WifKey> {
    let data = Zeroizing::new(
        bs58::decode(text)
            .into_vec()
            .map_err(|e| CryptoError::WifBase58(e.to_string()))?,
    );

    if data.len() != UNCOMPRESSED_LEN && data.len() != COMPRESSED_LEN {
        return Err(CryptoError::WifLength(data.len()));
    }

    let (payload, checksum) = data.split_at(data.len() - CHECKSUM_LEN);
    if sha256d(payload)[..CHECKSUM_LEN] != *checksum {
        return Err(CryptoError::WifChecksum);
    }

    let compressed = payload.len() == 1 + SECRET_KEY_SIZE + 1;
    if compressed && payload[1 + SECRET_KEY_SIZE] != COMPRESSED_FLAG {
        return Err(CryptoError::WifCompressionFlag(payload[1 + SECRET_KEY_SIZE]));
    }

    let network = match payload[0] {
        MAINNET_WIF_VERSION => Network::Main,
        TESTNET_WIF_VERSION => Network::Test,
        other => return Err(CryptoError::WifVersion(other)),
    };

    let secret = SecretArray::from_slice(&payload[1..1 + SECRET_KEY_SIZE])
        .ok_or(CryptoError::WifLength(data.len()))?;

    Ok(WifKey {
        secret,
        compressed,
        network,
    })
}

//! PKCS#12 repackaging
//!
//! Key Vault exports certificates as PFX containers with the password stripped
//! but the MAC data left in place. App proxy only accepts a container protected
//! by a password, so the bags are re-wrapped under a placeholder one.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use p12::PFX;

use crate::error::CertificateError;

/// Password set on uploaded containers. Not a secret: the upload target merely
/// rejects containers without one.
pub const PLACEHOLDER_PASSWORD: &str = "password";

/// DER encoding of the PBES2 algorithm OID (1.2.840.113549.1.5.13).
const PBES2_OID: &[u8] = &[
    0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x05, 0x0d,
];

/// Re-encrypt a password-less base64 PFX under `password`.
///
/// The MAC of the input is not verified. The first certificate bag is taken as
/// the leaf, any further ones as its chain. Only the legacy PKCS#12 ciphers
/// (3DES, RC2) can be decrypted; PBES2/AES containers are rejected up front.
pub fn repackage(
    pfx_base64: &str,
    password: &str,
    friendly_name: &str,
) -> Result<String, CertificateError> {
    let der = STANDARD.decode(pfx_base64.trim())?;
    if uses_pbes2(&der) {
        return Err(CertificateError::UnsupportedEncryption);
    }
    let source = PFX::parse(&der).map_err(|e| CertificateError::Malformed(format!("{:?}", e)))?;

    let certificates = source
        .cert_x509_bags("")
        .map_err(|e| CertificateError::Malformed(format!("{:?}", e)))?;
    let (leaf, chain) = certificates
        .split_first()
        .ok_or(CertificateError::NoCertificate)?;

    let keys = source
        .key_bags("")
        .map_err(|e| CertificateError::Malformed(format!("{:?}", e)))?;
    let key = keys.first().ok_or(CertificateError::NoKey)?;

    let chain: Vec<&[u8]> = chain.iter().map(Vec::as_slice).collect();
    let repackaged = PFX::new_with_cas(leaf, key, &chain, password, friendly_name)
        .ok_or(CertificateError::Build)?;

    Ok(STANDARD.encode(repackaged.to_der()))
}

fn uses_pbes2(der: &[u8]) -> bool {
    der.windows(PBES2_OID.len()).any(|window| window == PBES2_OID)
}

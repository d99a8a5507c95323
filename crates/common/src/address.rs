use crate::chains::NetworkFamily;
use crate::error::RecapError;

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// True for strings shaped like a Solana public key: 32-44 base58 characters, no `0x` prefix.
pub fn is_solana_address(address: &str) -> bool {
    if address.starts_with("0x") {
        return false;
    }
    if !(32..=44).contains(&address.len()) {
        return false;
    }
    address.chars().all(|c| BASE58_ALPHABET.contains(c))
}

fn is_evm_address(address: &str) -> bool {
    address.len() == 42
        && (address.starts_with("0x") || address.starts_with("0X"))
        && address[2..].chars().all(|c| c.is_ascii_hexdigit())
}

pub fn network_family(address: &str) -> NetworkFamily {
    if is_solana_address(address) {
        NetworkFamily::Solana
    } else {
        NetworkFamily::Evm
    }
}

/// Validate a user-supplied address and return its canonical form.
///
/// EVM addresses are lowercased (0x + 40 hex); Solana keys are case-sensitive and
/// returned as-is.
pub fn normalize_address(raw: &str) -> Result<String, RecapError> {
    let trimmed = raw.trim();
    if is_evm_address(trimmed) {
        return Ok(format!("0x{}", trimmed[2..].to_ascii_lowercase()));
    }
    if is_solana_address(trimmed) {
        return Ok(trimmed.to_string());
    }
    Err(RecapError::InvalidAddress(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOL_ADDR: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";

    #[test]
    fn test_solana_address_detection() {
        assert!(is_solana_address(SOL_ADDR));
        assert!(!is_solana_address("0x52908400098527886E0F7030069857D2E4169EE7"));
        // 0 and O are not in the base58 alphabet
        assert!(!is_solana_address("0OzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM"));
        assert!(!is_solana_address("short"));
    }

    #[test]
    fn test_normalize_evm_lowercases() {
        let got = normalize_address(" 0x52908400098527886E0F7030069857D2E4169EE7 ").unwrap();
        assert_eq!(got, "0x52908400098527886e0f7030069857d2e4169ee7");
    }

    #[test]
    fn test_normalize_solana_preserves_case() {
        assert_eq!(normalize_address(SOL_ADDR).unwrap(), SOL_ADDR);
        assert_eq!(network_family(SOL_ADDR), NetworkFamily::Solana);
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        let err = normalize_address("0x1234").unwrap_err();
        assert!(matches!(err, RecapError::InvalidAddress(_)));
        assert!(normalize_address("").is_err());
        assert!(normalize_address("0xZZ908400098527886E0F7030069857D2E4169EE7").is_err());
    }
}

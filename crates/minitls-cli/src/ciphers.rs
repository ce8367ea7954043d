//! List the cipher suite registry.

use minitls_tls::crypt::{
    BulkCipherKind, KeyExchangeAlg, Tls12CipherSuiteParams, Weakness, CIPHER_SUITES,
};

pub fn run(all: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!("TLS 1.2 cipher suites:");
    for params in CIPHER_SUITES.iter().filter(|p| all || !p.is_insecure()) {
        println!("  {}", describe(params));
    }
    if !all {
        println!("(use --all to include legacy and insecure suites)");
    }
    Ok(())
}

fn describe(params: &Tls12CipherSuiteParams) -> String {
    let kx = match params.kx_alg {
        KeyExchangeAlg::Ecdhe => "ECDHE",
        KeyExchangeAlg::Rsa => "RSA",
    };
    let bulk = match params.bulk {
        BulkCipherKind::Aead => "AEAD",
        BulkCipherKind::Cbc => "CBC",
        BulkCipherKind::Stream => "stream",
    };
    let flag = match params.weakness {
        None => "",
        Some(Weakness::NoForwardSecrecy) => "  [legacy: no forward secrecy]",
        Some(Weakness::BrokenCipher) => "  [insecure: RC4]",
    };
    format!(
        "0x{:04X}  {:<42} {:<6} {:<6}{flag}",
        params.suite.0, params.name, kx, bulk
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use minitls_tls::CipherSuite;

    #[test]
    fn test_describe_marks_weak_suites() {
        let gcm =
            Tls12CipherSuiteParams::from_suite(CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256)
                .unwrap();
        let line = describe(gcm);
        assert!(line.starts_with("0xC02F  TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256"));
        assert!(!line.contains('['));

        let rc4 = Tls12CipherSuiteParams::from_suite(CipherSuite::TLS_RSA_WITH_RC4_128_SHA).unwrap();
        assert!(describe(rc4).ends_with("[insecure: RC4]"));

        let rsa = Tls12CipherSuiteParams::from_suite(CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA).unwrap();
        assert!(describe(rsa).contains("legacy"));
    }
}

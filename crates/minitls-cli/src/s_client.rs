//! TLS client connection command (`s-client`).

use std::fs::OpenOptions;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use minitls_tls::client::MiniTlsClient;
use minitls_tls::config::{KeyLogCallback, TlsConfig};
use minitls_tls::crypt::{default_cipher_suites, Tls12CipherSuiteParams, CIPHER_SUITES};
use minitls_tls::CipherSuite;

pub struct Options<'a> {
    pub connect: &'a str,
    pub ciphers: &'a [String],
    pub insecure_suites: bool,
    pub http: Option<&'a str>,
    pub keylog: Option<&'a str>,
    pub timeout_secs: u64,
    pub quiet: bool,
}

pub fn run(opts: &Options<'_>) -> Result<(), Box<dyn std::error::Error>> {
    let (host, port) = parse_connect(opts.connect)?;
    let timeout = Duration::from_secs(opts.timeout_secs);

    let suites = if opts.ciphers.is_empty() {
        if opts.insecure_suites {
            CIPHER_SUITES.iter().map(|p| p.suite).collect()
        } else {
            default_cipher_suites()
        }
    } else {
        opts.ciphers
            .iter()
            .map(|name| parse_suite(name))
            .collect::<Result<Vec<_>, _>>()?
    };

    let mut builder = TlsConfig::builder()
        .cipher_suites(&suites)
        .allow_insecure_suites(opts.insecure_suites)
        .connect_timeout(timeout)
        .read_timeout(timeout);
    if host.parse::<std::net::IpAddr>().is_err() {
        builder = builder.server_name(&host);
    }
    if let Some(path) = opts.keylog {
        builder = builder.key_log(keylog_writer(path)?);
    }

    if !opts.quiet {
        eprintln!("Connecting to {host}:{port}...");
    }
    let mut client = MiniTlsClient::with_config(&host, port, builder.build())?;
    let verify_data = client.perform_handshake()?;

    if !opts.quiet {
        if let Some(info) = client.connection_info() {
            eprintln!("--- TLS connection established ---");
            eprintln!("  Protocol:     TLS 1.2");
            eprintln!("  Cipher:       {} (0x{:04X})", info.cipher_suite, info.cipher_suite.0);
            if info.insecure_suite {
                eprintln!("  Warning:      negotiated suite is legacy or insecure");
            }
            eprintln!("  Certificates: {}", info.peer_certificates.len());
            eprintln!("  Server Finished: {}", to_hex(&verify_data));
            eprintln!("---------------------------------");
        }
    }

    if let Some(path) = opts.http {
        let body = client.get(path)?;
        println!("{body}");
    }

    client.close_notify()?;
    client.close();
    if !opts.quiet {
        eprintln!("Connection closed.");
    }
    Ok(())
}

/// Parse "host:port" or "host" (defaults to port 443).
fn parse_connect(connect: &str) -> Result<(String, u16), Box<dyn std::error::Error>> {
    match connect.rfind(':') {
        Some(idx) => {
            let port = connect[idx + 1..]
                .parse::<u16>()
                .map_err(|_| format!("invalid port in '{connect}'"))?;
            Ok((connect[..idx].to_string(), port))
        }
        None => Ok((connect.to_string(), 443)),
    }
}

/// Accept an IANA suite name or a hex id such as `0xC02F`.
fn parse_suite(name: &str) -> Result<CipherSuite, Box<dyn std::error::Error>> {
    let suite = match name.strip_prefix("0x").or_else(|| name.strip_prefix("0X")) {
        Some(hex) => CipherSuite(
            u16::from_str_radix(hex, 16).map_err(|_| format!("invalid cipher id '{name}'"))?,
        ),
        None => {
            Tls12CipherSuiteParams::by_name(name)
                .ok_or_else(|| format!("unknown cipher suite '{name}'"))?
                .suite
        }
    };
    Tls12CipherSuiteParams::from_suite(suite)
        .map_err(|_| format!("unsupported cipher suite '{name}'"))?;
    Ok(suite)
}

fn keylog_writer(path: &str) -> Result<KeyLogCallback, Box<dyn std::error::Error>> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| format!("cannot open key log '{path}': {e}"))?;
    let file = Mutex::new(file);
    Ok(Arc::new(move |line: &str| {
        if let Ok(mut f) = file.lock() {
            if let Err(e) = writeln!(f, "{line}") {
                log::warn!("key log write failed: {e}");
            }
        }
    }))
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

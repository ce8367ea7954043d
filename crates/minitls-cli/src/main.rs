use clap::{Parser, Subcommand};

mod ciphers;
mod s_client;

/// minitls command-line tool: a minimal TLS 1.2 client.
#[derive(Parser)]
#[command(name = "minitls")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// TLS 1.2 client connection.
    SClient {
        /// Host:port to connect to (default port 443).
        connect: String,
        /// Cipher suite to offer, by IANA name or 0xXXXX id. Repeat to set
        /// the preference order.
        #[arg(long = "cipher")]
        ciphers: Vec<String>,
        /// Allow legacy and insecure suites (RSA key transport, RC4).
        #[arg(long)]
        insecure_suites: bool,
        /// Send HTTP GET for this path after the handshake and print the body.
        #[arg(long)]
        http: Option<String>,
        /// Append NSS key log lines to this file.
        #[arg(long)]
        keylog: Option<String>,
        /// Connect and read timeout in seconds.
        #[arg(long, default_value = "10")]
        timeout: u64,
        /// Quiet mode: suppress connection info.
        #[arg(long, short)]
        quiet: bool,
    },
    /// List the supported cipher suites.
    Ciphers {
        /// Include legacy and insecure suites.
        #[arg(long)]
        all: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::SClient {
            connect,
            ciphers,
            insecure_suites,
            http,
            keylog,
            timeout,
            quiet,
        } => s_client::run(&s_client::Options {
            connect,
            ciphers,
            insecure_suites: *insecure_suites,
            http: http.as_deref(),
            keylog: keylog.as_deref(),
            timeout_secs: *timeout,
            quiet: *quiet,
        }),
        Commands::Ciphers { all } => ciphers::run(*all),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

//! Connect to a server, log in, and print what the session discovered.
//!
//! The password is read from `IMAP_PASSWORD`, which may also come from a `.env` file:
//!
//! ```text
//! RUST_LOG=imap_session=trace cargo run --example login -- imap.example.com alice --protocol imap/tls
//! ```

use clap::Parser;
use imap_session::{Capability, ClientBuilder};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "login", about = "Log in to an IMAP server and list its namespaces")]
struct Args {
    /// Server host name
    host: String,

    /// User name
    user: String,

    /// Server port
    #[arg(long, default_value = "143")]
    port: u16,

    /// Protocol specifier: "imap", "imap/ssl" or "imap/tls"
    #[arg(long, default_value = "imap/tls")]
    protocol: String,

    /// Extra namespace prefixes to probe for
    #[arg(long = "namespace")]
    namespaces: Vec<String>,

    /// Check whether SEARCH accepts this charset
    #[arg(long)]
    charset: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let password = std::env::var("IMAP_PASSWORD")?;

    let mut client = ClientBuilder::new(args.host.as_str(), args.port)
        .protocol(&args.protocol)
        .connect()?;
    client.login(&args.user, &password)?;

    let mut names: Vec<_> = client.capabilities().iter().collect();
    names.sort_by(|a, b| a.0.cmp(b.0));
    for (name, capability) in names {
        match capability {
            Capability::Atom => println!("capability {}", name),
            Capability::Values(values) => println!("capability {} = {}", name, values.join(" ")),
        }
    }

    for ns in client.namespaces(&args.namespaces)? {
        let hidden = if ns.hidden() { " (hidden)" } else { "" };
        println!(
            "{} namespace {:?} delimiter {:?}{}",
            ns.kind(),
            ns.name(),
            ns.delimiter(),
            hidden
        );
    }

    if let Some(charset) = args.charset {
        println!(
            "SEARCH CHARSET {}: {}",
            charset,
            if client.search_charset(&charset) { "supported" } else { "not supported" }
        );
    }

    client.logout()?;
    Ok(())
}

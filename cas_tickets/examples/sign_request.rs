use std::path::PathBuf;

use cas_tickets::{stores, CasAuthenticator, CredentialSource};
use clap::Parser;

#[derive(Debug, Parser)]
struct Opts {
    /// The base URL of the CAS server
    #[arg(long, env)]
    cas_url: url::Url,

    /// The service name registered with the CAS server
    #[arg(short, long, env)]
    service: String,

    /// The protected URL to request
    #[arg(short, long, env)]
    target: url::Url,

    /// Username to log in with; the netrc file is used when absent
    #[arg(short, long, env = "CAS_USERNAME")]
    username: Option<String>,

    /// Password to log in with
    #[arg(short, long, env = "CAS_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// The netrc file consulted when no username is given
    #[arg(long, env, default_value = "~/.netrc")]
    netrc: PathBuf,

    /// The local file used to persist the ticket-granting ticket
    #[arg(short = 'f', long, env, value_name = "FILE", default_value = ".cas/tgt")]
    ticket_file: PathBuf,

    /// Keep the ticket-granting ticket in memory only
    #[arg(long)]
    volatile: bool,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    dotenvy::dotenv().ok();
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();

    let mut credentials = CredentialSource::new().with_netrc_path(&opts.netrc);
    if let Some(username) = opts.username {
        credentials = credentials.with_username(username);
    }
    if let Some(password) = opts.password {
        credentials = credentials.with_password(password);
    }

    let authenticator = CasAuthenticator::new(opts.cas_url, opts.service);
    let authenticator = if opts.volatile {
        authenticator.with_store(stores::InMemoryTicketStore::new())
    } else {
        authenticator.with_store(stores::FileTicketStore::new(&opts.ticket_file))
    };

    authenticator.login(credentials).await?;

    let client = reqwest::Client::new();
    for attempt in 1..=3 {
        let request = reqwest::Request::new(reqwest::Method::GET, opts.target.clone());
        let request = authenticator.sign(request).await?;
        let response = client.execute(request).await?;

        tracing::info!(
            attempt,
            status = response.status().as_u16(),
            "requested protected resource"
        );
    }

    Ok(())
}

//! Terminal client for the authorization code flow.
//!
//! `url` prints a consent URL to open in a browser. After consent, the
//! provider redirects to the registered URI with a `code` parameter;
//! `exchange` trades that code for a token and calls the resource.

use std::fmt;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use rootcause::Report;
use tokenbridge_oauth::{
    AuthorizedClient, CallbackHandler, CodeSource, ConsentRedirector, OAuthError, ProviderConfig,
    TokenExchanger, http_client, redact,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Parser)]
#[command(
    name = "tokenbridge-exchange",
    version,
    about = "Complete an OAuth2 authorization code flow from the terminal"
)]
struct Cli {
    #[command(flatten)]
    provider: ProviderArgs,

    /// Upper bound on each HTTP request, in seconds.
    #[arg(long, env = "HTTP_TIMEOUT_SECONDS", default_value_t = 30)]
    http_timeout_seconds: u64,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Args)]
struct ProviderArgs {
    #[arg(long, env = "PROVIDER__CLIENT_ID")]
    client_id: String,
    #[arg(long, env = "PROVIDER__CLIENT_SECRET", hide_env_values = true)]
    client_secret: String,
    #[arg(long, env = "PROVIDER__AUTHORIZATION_ENDPOINT")]
    authorization_endpoint: String,
    #[arg(long, env = "PROVIDER__TOKEN_ENDPOINT")]
    token_endpoint: String,
    #[arg(long, env = "PROVIDER__REDIRECT_URI")]
    redirect_uri: String,
    #[arg(
        long,
        env = "PROVIDER__SCOPES",
        value_delimiter = ',',
        default_value = "full,refresh_token"
    )]
    scopes: Vec<String>,
    /// Base URL for resource calls when the token has no instance URL.
    #[arg(long, env = "PROVIDER__API_BASE")]
    api_base: Option<String>,
    /// Consent parameter requesting a refresh token; empty disables it.
    #[arg(long, env = "PROVIDER__OFFLINE_ACCESS_PARAM")]
    offline_access_param: Option<String>,
    /// Extra token request field as `name=value`; repeatable.
    #[arg(long = "token-param", value_parser = parse_pair)]
    token_params: Vec<(String, String)>,
    /// Extra consent URL parameter as `name=value`; repeatable.
    #[arg(long = "consent-param", value_parser = parse_pair)]
    consent_params: Vec<(String, String)>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Print a consent URL to open in a browser.
    Url,
    /// Exchange an authorization code and call a resource with the token.
    Exchange {
        /// Authorization code; read from stdin when omitted.
        #[arg(long)]
        code: Option<String>,
        /// Resource path, joined to the token's instance URL.
        #[arg(long, env = "RESOURCE__PATH", default_value = "/services/data/v32.0/query")]
        path: String,
        /// Query parameter as `name=value`; repeatable.
        #[arg(long = "query", value_parser = parse_pair)]
        query: Vec<(String, String)>,
        /// Stop after the exchange.
        #[arg(long)]
        no_call: bool,
    },
}

#[derive(Debug)]
enum CliError {
    Provider,
    Input { details: String },
    Flow,
    Output { details: String },
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provider => write!(f, "provider settings are invalid"),
            Self::Input { details } => write!(f, "failed to read authorization code: {details}"),
            Self::Flow => write!(f, "authorization code flow failed"),
            Self::Output { details } => write!(f, "failed to write response: {details}"),
        }
    }
}

impl std::error::Error for CliError {}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))
}

impl ProviderArgs {
    fn build(self) -> Result<ProviderConfig, Report<OAuthError>> {
        let mut builder = ProviderConfig::builder(
            self.client_id,
            self.client_secret,
            self.authorization_endpoint,
            self.token_endpoint,
            self.redirect_uri,
        )
        .scopes(self.scopes);
        if let Some(api_base) = self.api_base {
            builder = builder.api_base(api_base);
        }
        if let Some(param) = self.offline_access_param {
            builder = builder.offline_access_param(param);
        }
        for (name, value) in self.token_params {
            builder = builder.extra_token_param(name, value);
        }
        for (name, value) in self.consent_params {
            builder = builder.extra_consent_param(name, value);
        }
        builder.build()
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => {
            eprintln!("{report}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Report<CliError>> {
    let config = Arc::new(
        cli.provider
            .build()
            .map_err(|report| report.context(CliError::Provider))?,
    );

    match cli.cmd {
        Cmd::Url => {
            let consent =
                ConsentRedirector::new(config).map_err(|report| report.context(CliError::Provider))?;
            let (url, _) = consent.begin();
            println!("{url}");
        }
        Cmd::Exchange {
            code,
            path,
            query,
            no_call,
        } => {
            let code = match code {
                Some(code) => code,
                None => read_code().await?,
            };

            let http = http_client(Duration::from_secs(cli.http_timeout_seconds))
                .map_err(|report| report.context(CliError::Provider))?;
            let handler = CallbackHandler::new(TokenExchanger::new(config.clone(), http.clone()));
            let token = handler
                .handle_callback(CodeSource::Direct(&code))
                .await
                .map_err(|report| report.context(CliError::Flow))?;

            eprintln!("access token: {}", redact(token.access_token()));
            if let Some(instance_url) = token.instance_url() {
                eprintln!("instance URL: {instance_url}");
            }
            if no_call {
                return Ok(());
            }

            let client = AuthorizedClient::new(&config, http)
                .map_err(|report| report.context(CliError::Provider))?;
            let response = client
                .call_resource(&token, &path, &query)
                .await
                .map_err(|report| report.context(CliError::Flow))?;

            eprintln!("status: {}", response.status);
            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(&response.body)
                .await
                .map_err(|e| CliError::Output {
                    details: e.to_string(),
                })?;
            stdout.flush().await.map_err(|e| CliError::Output {
                details: e.to_string(),
            })?;
        }
    }

    Ok(())
}

async fn read_code() -> Result<String, Report<CliError>> {
    eprint!("Enter the authorization code: ");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .map_err(|e| CliError::Input {
            details: e.to_string(),
        })?;
    Ok(line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    const REQUIRED: [&str; 11] = [
        "tokenbridge-exchange",
        "--client-id",
        "C1",
        "--client-secret",
        "S1",
        "--authorization-endpoint",
        "https://login.example.com/services/oauth2/authorize",
        "--token-endpoint",
        "https://login.example.com/services/oauth2/token",
        "--redirect-uri",
        "https://app.example.com/auth/callback",
    ];

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn exchange_args_parse_query_pairs() {
        let args = REQUIRED.iter().copied().chain([
            "exchange",
            "--code",
            "abc",
            "--query",
            "q=select Id, name from account",
        ]);
        let cli = Cli::try_parse_from(args).expect("parse");

        match cli.cmd {
            Cmd::Exchange { code, query, path, .. } => {
                assert_eq!(code.as_deref(), Some("abc"));
                assert_eq!(path, "/services/data/v32.0/query");
                assert_eq!(
                    query,
                    vec![("q".to_string(), "select Id, name from account".to_string())]
                );
            }
            Cmd::Url => panic!("expected exchange"),
        }
    }

    #[test]
    fn provider_args_build_a_valid_config() {
        let cli = Cli::try_parse_from(REQUIRED.iter().copied().chain(["url"])).expect("parse");
        let config = cli.provider.build().expect("valid config");
        assert_eq!(config.scopes(), vec!["full", "refresh_token"]);
    }

    #[test]
    fn provider_specific_params_reach_the_config() {
        let args = REQUIRED.iter().copied().chain([
            "--offline-access-param",
            "prompt=consent",
            "--token-param",
            "format=json",
            "--token-param",
            "audience=api",
            "--consent-param",
            "display=popup",
            "url",
        ]);
        let cli = Cli::try_parse_from(args).expect("parse");
        let config = cli.provider.build().expect("valid config");

        assert_eq!(config.offline_access(), Some(("prompt", "consent")));
        assert_eq!(
            config.extra_token_params().get("format").map(String::as_str),
            Some("json")
        );
        assert_eq!(
            config.extra_token_params().get("audience").map(String::as_str),
            Some("api")
        );
        assert_eq!(
            config.extra_consent_params().get("display").map(String::as_str),
            Some("popup")
        );
    }

    #[test]
    fn empty_offline_param_disables_the_flag() {
        let args = REQUIRED
            .iter()
            .copied()
            .chain(["--offline-access-param", "", "url"]);
        let cli = Cli::try_parse_from(args).expect("parse");
        let config = cli.provider.build().expect("valid config");
        assert!(config.offline_access().is_none());
    }

    #[test]
    fn pair_parser_rejects_missing_separator() {
        assert!(parse_pair("novalue").is_err());
        assert!(parse_pair("=x").is_err());
        assert_eq!(
            parse_pair("a=b=c").expect("pair"),
            ("a".to_string(), "b=c".to_string())
        );
    }
}

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::{env, fmt, path::PathBuf, str::FromStr, time::Duration};

use crate::services::signing::DEFAULT_URL_TTL_SECS;

const DEFAULT_GATEWAY_URL: &str = "http://localhost:3000";
const DEFAULT_CLIENT_TIMEOUT_SECS: u64 = 300;

/// Command line: `serve` runs the gateway, everything else is a client of one.
#[derive(Parser, Debug)]
#[command(author, version, about = "File manager over an S3-style object bucket")]
pub struct Cli {
    /// Gateway base URL for client commands (overrides OBJECT_DRIVE_GATEWAY_URL)
    #[arg(long, global = true)]
    pub gateway: Option<String>,

    /// HTTP request timeout for client commands (overrides OBJECT_DRIVE_TIMEOUT_SECS)
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the gateway HTTP server
    Serve(ServeArgs),
    #[command(flatten)]
    Client(ClientCommand),
}

/// Commands that talk to a running gateway.
#[derive(Subcommand, Debug)]
pub enum ClientCommand {
    /// List folders and files under a prefix
    Ls {
        /// Folder prefix, e.g. `photos/` (root when omitted)
        prefix: Option<String>,
    },
    /// Total size of one or more folders
    Du {
        /// Folder prefixes (root when omitted)
        prefixes: Vec<String>,
    },
    /// Upload local files into a folder
    Upload(UploadArgs),
    /// Delete an object or folder marker
    Rm { key: String },
    /// Create a folder marker
    Mkdir {
        name: String,
        /// Parent folder prefix
        #[arg(long, default_value = "")]
        parent: String,
    },
    /// Download an object to a local file
    Download {
        key: String,
        /// Output path (defaults to the key's file name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Host to bind to (overrides OBJECT_DRIVE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides OBJECT_DRIVE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where object payloads are stored (overrides OBJECT_DRIVE_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides OBJECT_DRIVE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Bucket served by this gateway (overrides OBJECT_DRIVE_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Bucket region label (overrides OBJECT_DRIVE_REGION)
    #[arg(long)]
    pub region: Option<String>,

    /// Externally reachable base URL used in signed URLs (overrides OBJECT_DRIVE_PUBLIC_URL)
    #[arg(long)]
    pub public_url: Option<String>,

    /// HMAC secret for signed URLs (overrides OBJECT_DRIVE_SIGNING_SECRET)
    #[arg(long)]
    pub signing_secret: Option<String>,

    /// Signed URL validity in seconds (overrides OBJECT_DRIVE_URL_TTL_SECS)
    #[arg(long)]
    pub url_ttl_secs: Option<u64>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Target folder prefix; gets a trailing `/` when missing
    #[arg(long, default_value = "")]
    pub prefix: String,

    /// Upload in bounded-concurrency batches instead of one at a time
    #[arg(long)]
    pub concurrent: bool,

    /// Files per batch in concurrent mode
    #[arg(long, default_value_t = crate::client::upload::DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Local files to upload
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

/// Secret value that never shows up in logs.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Gateway configuration. CLI flags win over environment variables, which win
/// over defaults.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    pub bucket: String,
    pub region: String,
    pub public_url: String,
    pub signing_secret: Secret,
    /// True when no secret was configured and a per-process one was generated.
    pub signing_secret_generated: bool,
    pub url_ttl_secs: u64,
}

impl AppConfig {
    /// Merge `serve` flags with the process environment.
    pub fn from_env_and_args(args: &ServeArgs) -> Result<Self> {
        Self::resolve(args, |name| env::var(name).ok())
    }

    /// Merge `serve` flags with variables looked up through `lookup`.
    pub fn resolve(args: &ServeArgs, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = args
            .host
            .clone()
            .or_else(|| lookup("OBJECT_DRIVE_HOST"))
            .unwrap_or_else(|| "0.0.0.0".into());
        let port = match args.port {
            Some(port) => port,
            None => parse_var(&lookup, "OBJECT_DRIVE_PORT")?.unwrap_or(3000),
        };
        let url_ttl_secs = match args.url_ttl_secs {
            Some(ttl) => ttl,
            None => parse_var(&lookup, "OBJECT_DRIVE_URL_TTL_SECS")?
                .unwrap_or(DEFAULT_URL_TTL_SECS),
        };
        let public_url = args
            .public_url
            .clone()
            .or_else(|| lookup("OBJECT_DRIVE_PUBLIC_URL"))
            .unwrap_or_else(|| format!("http://127.0.0.1:{}", port));

        let (signing_secret, signing_secret_generated) = match args
            .signing_secret
            .clone()
            .or_else(|| lookup("OBJECT_DRIVE_SIGNING_SECRET"))
        {
            Some(secret) => (secret, false),
            None => (uuid::Uuid::new_v4().simple().to_string(), true),
        };

        Ok(Self {
            host,
            port,
            storage_dir: args
                .storage_dir
                .clone()
                .or_else(|| lookup("OBJECT_DRIVE_STORAGE_DIR"))
                .unwrap_or_else(|| "./data/objects".into()),
            database_url: args
                .database_url
                .clone()
                .or_else(|| lookup("OBJECT_DRIVE_DATABASE_URL"))
                .unwrap_or_else(|| "sqlite://./data/meta/object_drive.db".into()),
            bucket: args
                .bucket
                .clone()
                .or_else(|| lookup("OBJECT_DRIVE_BUCKET"))
                .unwrap_or_else(|| "drive".into()),
            region: args
                .region
                .clone()
                .or_else(|| lookup("OBJECT_DRIVE_REGION"))
                .unwrap_or_else(|| "local".into()),
            public_url,
            signing_secret: Secret(signing_secret),
            signing_secret_generated,
            url_ttl_secs,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Settings for the client-side commands.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub gateway_url: String,
    pub timeout: Duration,
}

impl ClientConfig {
    /// Merge the global client flags with the process environment.
    pub fn from_env_and_args(gateway: Option<String>, timeout_secs: Option<u64>) -> Result<Self> {
        Self::resolve(gateway, timeout_secs, |name| env::var(name).ok())
    }

    pub fn resolve(
        gateway: Option<String>,
        timeout_secs: Option<u64>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let gateway_url = gateway
            .or_else(|| lookup("OBJECT_DRIVE_GATEWAY_URL"))
            .unwrap_or_else(|| DEFAULT_GATEWAY_URL.into());
        let timeout_secs = match timeout_secs {
            Some(secs) => secs,
            None => parse_var(&lookup, "OBJECT_DRIVE_TIMEOUT_SECS")?
                .unwrap_or(DEFAULT_CLIENT_TIMEOUT_SECS),
        };

        Ok(Self {
            gateway_url,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(name)
        .map(|value| {
            value
                .parse::<T>()
                .with_context(|| format!("parsing {} value `{}`", name, value))
        })
        .transpose()
}

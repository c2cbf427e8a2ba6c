//! ip-fetcher: download provider IP ranges and publish them.

use clap::{Args, Parser, Subcommand};
use ip_fetcher::config::{mock_enabled, mock_env_name, LOG_ENV};
use ip_fetcher::fixtures::mock_transport;
use ip_fetcher::provider::{
    self, AbuseIpDb, AbuseIpDbConfig, Azure, AzureConfig, Cloudflare, CloudflareConfig, Edition,
    GeoIpFormat, LineMode, MaxMind, MaxMindConfig, UrlFeed, UrlFeedConfig, UNPUBLISHED,
};
use ip_fetcher::publish::{prepare_worktree, Publisher};
use ip_fetcher::save::save;
use ip_fetcher::{render, Descriptor, Error, Format, HttpClient, HttpConfig, Provider, PublishConfig, Result};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "ip-fetcher")]
#[command(version)]
#[command(about = "Fetch the IP ranges published by cloud, CDN, hosting and security providers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where and how to write a provider's output.
#[derive(Args, Debug, Clone)]
struct OutputArgs {
    /// Destination file, or directory to write the default file name into
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// Write to standard output
    #[arg(short, long)]
    stdout: bool,

    /// One prefix per line
    #[arg(long, conflicts_with = "format")]
    lines: bool,

    /// Output format: raw, json, yaml, csv or lines
    #[arg(long)]
    format: Option<Format>,
}

impl OutputArgs {
    fn format(&self, descriptor: &Descriptor) -> Format {
        if self.lines {
            Format::Lines
        } else {
            self.format.unwrap_or(descriptor.default_format)
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// AbuseIPDB blacklist (requires an API key)
    Abuseipdb {
        /// API key
        #[arg(long)]
        key: String,

        /// Minimum abuse confidence score (0 = provider default)
        #[arg(long, default_value_t = 0)]
        confidence: u8,

        /// Maximum number of addresses (0 = provider default)
        #[arg(long, default_value_t = 0)]
        limit: u32,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Amazon Web Services
    Aws(OutputArgs),

    /// Microsoft Azure service tags
    Azure {
        /// Discover the download link from the Microsoft download page
        #[arg(long)]
        scrape: bool,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Bingbot crawler
    Bingbot(OutputArgs),

    /// Cloudflare
    Cloudflare {
        /// IPv4 ranges only
        #[arg(short = '4', long = "ipv4")]
        ipv4: bool,

        /// IPv6 ranges only
        #[arg(short = '6', long = "ipv6")]
        ipv6: bool,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// DigitalOcean
    Digitalocean(OutputArgs),

    /// Fastly
    Fastly(OutputArgs),

    /// Google Cloud Platform
    Gcp(OutputArgs),

    /// GitHub
    Github(OutputArgs),

    /// Google
    Google(OutputArgs),

    /// Googlebot crawler
    Googlebot(OutputArgs),

    /// Google special crawlers
    Googlesc(OutputArgs),

    /// Google user-triggered fetchers
    Googleutf(OutputArgs),

    /// Hetzner (announced prefixes of its ASNs)
    Hetzner(OutputArgs),

    /// iCloud Private Relay egress ranges
    Icloudpr(OutputArgs),

    /// Linode
    Linode(OutputArgs),

    /// M247 (announced prefixes of its ASN)
    M247(OutputArgs),

    /// MaxMind GeoLite2 databases (requires a license key)
    Maxmind {
        /// License key
        #[arg(long)]
        key: String,

        /// Comma separated editions: asn, country, city
        #[arg(long, default_value = "asn")]
        edition: String,

        /// Database format: csv or mmdb
        #[arg(long, default_value = "csv")]
        format: GeoIpFormat,

        /// Unpack CSV archives
        #[arg(long)]
        extract: bool,

        /// Existing directory receiving the downloads
        #[arg(short, long)]
        path: PathBuf,
    },

    /// Oracle Cloud Infrastructure
    Oci(OutputArgs),

    /// OVHcloud (announced prefixes of its ASNs)
    Ovh(OutputArgs),

    /// Scaleway (announced prefixes of its ASNs)
    Scaleway(OutputArgs),

    /// Prefix lists at arbitrary URLs
    Url {
        /// Reject lines that are not prefixes instead of skipping them
        #[arg(long)]
        strict: bool,

        /// Feeds to fetch, in order
        #[arg(required = true)]
        urls: Vec<String>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Vultr
    Vultr(OutputArgs),

    /// Zscaler
    Zscaler(OutputArgs),

    /// Synchronize every keyless provider into a git working tree
    Publish {
        /// Working tree; cloned from GITHUB_PUBLISH_URL when it is not a checkout
        #[arg(short, long)]
        dir: PathBuf,

        /// Push to GITHUB_PUBLISH_URL afterwards
        #[arg(long)]
        push: bool,
    },

    /// List the supported providers
    List,
}

fn main() {
    // HTTP stack internals log full request URLs, which may carry keys.
    env_logger::Builder::from_env(env_logger::Env::default().filter_or(LOG_ENV, "info"))
        .filter_module("reqwest", log::LevelFilter::Warn)
        .filter_module("hyper", log::LevelFilter::Warn)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Abuseipdb {
            key,
            confidence,
            limit,
            output,
        } => {
            let config = AbuseIpDbConfig {
                confidence_minimum: confidence,
                limit,
                ..AbuseIpDbConfig::new(key)
            };
            emit(&output, "abuseipdb", |client| {
                Ok(Box::new(AbuseIpDb::new(client, config)?))
            })
        }
        Commands::Azure { scrape, output } => emit(&output, "azure", |client| {
            let config = AzureConfig {
                scrape,
                ..Default::default()
            };
            Ok(Box::new(Azure::new(client, config)))
        }),
        Commands::Cloudflare { ipv4, ipv6, output } => emit(&output, "cloudflare", |client| {
            let config = CloudflareConfig {
                ipv4,
                ipv6,
                ..Default::default()
            };
            Ok(Box::new(Cloudflare::new(client, config)))
        }),
        Commands::Maxmind {
            key,
            edition,
            format,
            extract,
            path,
        } => download_geoip(key, &edition, format, extract, path),
        Commands::Url { strict, urls, output } => emit(&output, "url", |client| {
            let mode = if strict { LineMode::Strict } else { LineMode::Relaxed };
            Ok(Box::new(UrlFeed::new(client, UrlFeedConfig { urls, mode })?))
        }),
        Commands::Aws(output) => emit_keyless(&output, "aws"),
        Commands::Bingbot(output) => emit_keyless(&output, "bingbot"),
        Commands::Digitalocean(output) => emit_keyless(&output, "digitalocean"),
        Commands::Fastly(output) => emit_keyless(&output, "fastly"),
        Commands::Gcp(output) => emit_keyless(&output, "gcp"),
        Commands::Github(output) => emit_keyless(&output, "github"),
        Commands::Google(output) => emit_keyless(&output, "google"),
        Commands::Googlebot(output) => emit_keyless(&output, "googlebot"),
        Commands::Googlesc(output) => emit_keyless(&output, "googlesc"),
        Commands::Googleutf(output) => emit_keyless(&output, "googleutf"),
        Commands::Hetzner(output) => emit_keyless(&output, "hetzner"),
        Commands::Icloudpr(output) => emit_keyless(&output, "icloudpr"),
        Commands::Linode(output) => emit_keyless(&output, "linode"),
        Commands::M247(output) => emit_keyless(&output, "m247"),
        Commands::Oci(output) => emit_keyless(&output, "oci"),
        Commands::Ovh(output) => emit_keyless(&output, "ovh"),
        Commands::Scaleway(output) => emit_keyless(&output, "scaleway"),
        Commands::Vultr(output) => emit_keyless(&output, "vultr"),
        Commands::Zscaler(output) => emit_keyless(&output, "zscaler"),
        Commands::Publish { dir, push } => publish(dir, push),
        Commands::List => {
            list();
            Ok(())
        }
    }
}

/// HTTP client for one provider, served from fixtures when its mock switch is on.
fn client_for(short_name: &str) -> Result<HttpClient> {
    let config = HttpConfig::default();
    if !mock_enabled(short_name) {
        return HttpClient::new(config);
    }
    let mock = mock_transport(short_name).ok_or_else(|| {
        Error::Config(format!("{} is set but {} has no fixtures", mock_env_name(short_name), short_name))
    })?;
    log::info!("Serving {} from embedded fixtures", short_name);
    Ok(HttpClient::with_transport(Arc::new(mock), config))
}

fn emit_keyless(output: &OutputArgs, short_name: &str) -> Result<()> {
    emit(output, short_name, |client| {
        provider::keyless(short_name, &client)
            .ok_or_else(|| Error::Config(format!("unknown provider {}", short_name)))
    })
}

/// Fetch one provider and write its rendering to the requested targets.
fn emit(
    output: &OutputArgs,
    short_name: &str,
    build: impl FnOnce(HttpClient) -> Result<Box<dyn Provider>>,
) -> Result<()> {
    if output.path.is_none() && !output.stdout {
        return Err(Error::Config("one of --path or --stdout is required".to_string()));
    }

    let provider = build(client_for(short_name)?)?;
    let descriptor = provider.descriptor();
    let format = output.format(descriptor);

    let document = provider.fetch()?;
    let bytes = render(&document, format)?;

    if let Some(path) = &output.path {
        save(path, &default_file_name(descriptor, format), &bytes)?;
    }
    if output.stdout {
        let mut stdout = io::stdout().lock();
        stdout.write_all(&bytes)?;
        stdout.flush()?;
    }
    Ok(())
}

/// File name used when `--path` is a directory.
fn default_file_name(descriptor: &Descriptor, format: Format) -> String {
    if format == descriptor.default_format {
        if let Some(name) = descriptor.filename {
            return name.to_string();
        }
    }
    let extension = match format {
        Format::Json => "json",
        Format::Yaml => "yaml",
        Format::Csv => "csv",
        Format::Lines => "txt",
        Format::Raw => descriptor
            .filename
            .and_then(|f| f.rsplit_once('.').map(|(_, ext)| ext))
            .unwrap_or("txt"),
    };
    format!("{}.{}", descriptor.short_name, extension)
}

fn download_geoip(key: String, editions: &str, format: GeoIpFormat, extract: bool, root: PathBuf) -> Result<()> {
    let config = MaxMindConfig {
        editions: Edition::parse_list(editions)?,
        format,
        extract,
        ..MaxMindConfig::new(key, root)
    };
    let maxmind = MaxMind::new(client_for("maxmind")?, config)?;
    let result = maxmind.download()?;

    let mut stdout = io::stdout().lock();
    for db in &result.databases {
        writeln!(stdout, "{}\t{}\t{}", db.edition, db.version, db.archive.display())?;
        for file in &db.files {
            writeln!(stdout, "\t{}", file.display())?;
        }
    }
    Ok(())
}

fn publish(dir: PathBuf, push: bool) -> Result<()> {
    let config = PublishConfig::from_env();
    let secrets = config.secrets();
    let remote = config.authenticated_url().ok();
    let mut tree = prepare_worktree(&dir, remote.as_deref(), &secrets)?;

    let mut providers = Vec::new();
    for descriptor in provider::descriptors() {
        if UNPUBLISHED.contains(&descriptor.short_name) {
            continue;
        }
        let client = client_for(descriptor.short_name)?;
        if let Some(p) = provider::keyless(descriptor.short_name, &client) {
            providers.push(p);
        }
    }

    let report = Publisher::new(providers)
        .with_author(config.author_name.clone(), config.author_email.clone())
        .run(&mut tree)?;

    if push {
        tree.push(&config.authenticated_url()?)?;
    }

    let updated: Vec<&str> = report.updated().map(|o| o.short_name).collect();
    let failed: Vec<&str> = report.failed().map(|o| o.short_name).collect();
    println!("updated: {}", if updated.is_empty() { "-".to_string() } else { updated.join(", ") });
    if !failed.is_empty() {
        println!("failed: {}", failed.join(", "));
    }
    Ok(())
}

fn list() {
    for d in provider::descriptors() {
        println!("{:<14}{:<34}{:<10}{}", d.short_name, d.full_name, d.category.as_str(), d.source_url);
    }
}

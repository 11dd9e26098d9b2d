use std::io;
use std::path::PathBuf;

use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use sts_pipeline::{
    extract, run_pipeline, HttpSession, LoadedPage, Manifest, OnCollision, PipelineConfig,
    Session, Slugger,
};
use tokio::runtime;
use url::Url;

/// Site Table Scraper
#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: SubCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum SubCommand {
    #[command(name = "scrap")]
    Scrap(ScrapArgs),
    #[command(name = "extract")]
    Extract(ExtractArgs),
    #[command(name = "slug")]
    Slug(SlugArgs),
    #[command(name = "lookup")]
    Lookup(LookupArgs),
    #[command(hide = true)]
    Completion,
}

/// Scrap the table of a page, download its images and write the manifest
#[derive(Debug, clap::Args)]
pub struct ScrapArgs {
    /// Optional yaml configuration file
    #[arg(env = "STS_CONFIG", long, short)]
    pub config: Option<PathBuf>,
    /// Override the page to scrap
    #[arg(long)]
    pub url: Option<String>,
    /// Override the CSS selector of the table
    #[arg(long)]
    pub table_selector: Option<String>,
    /// Override the directory where images are saved
    #[arg(long)]
    pub assets_dir: Option<PathBuf>,
    /// Override the manifest output file
    #[arg(long, short)]
    pub manifest: Option<PathBuf>,
    /// Override the user agent
    #[arg(long)]
    pub user_agent: Option<String>,
    /// Override the minimum accepted image size in bytes
    #[arg(long)]
    pub min_image_size: Option<usize>,
    /// Override the delay in seconds after each image download
    #[arg(long)]
    pub fetch_delay: Option<f32>,
    /// Override the image filename collision strategy
    #[arg(value_enum, long)]
    pub on_collision: Option<OnCollision>,
    /// Load pages with headless Chrome instead of plain HTTP
    #[cfg(feature = "browser")]
    #[arg(long)]
    pub browser: bool,
    /// Show the Chrome window, implies --browser
    #[cfg(feature = "browser")]
    #[arg(long)]
    pub with_head: bool,
    /// When quiet no logs are outputted
    #[arg(long, short)]
    pub quiet: bool,
}

impl TryFrom<&ScrapArgs> for PipelineConfig {
    type Error = anyhow::Error;

    fn try_from(args: &ScrapArgs) -> Result<Self, Self::Error> {
        let mut conf = load_config(args.config.as_ref())?;
        if let Some(url) = &args.url {
            conf.target_url = url.to_string();
        }
        if let Some(table_selector) = &args.table_selector {
            conf.table_selector = table_selector.to_string();
        }
        if let Some(assets_dir) = &args.assets_dir {
            conf.assets_dir = assets_dir.clone();
        }
        if let Some(manifest) = &args.manifest {
            conf.manifest_file = manifest.clone();
        }
        if let Some(user_agent) = &args.user_agent {
            conf.user_agent = user_agent.to_string();
        }
        if let Some(min_image_size) = args.min_image_size {
            conf.min_image_size = min_image_size;
        }
        if let Some(fetch_delay) = args.fetch_delay {
            conf.fetch_delay = fetch_delay;
        }
        if let Some(on_collision) = args.on_collision {
            conf.on_collision = on_collision;
        }
        Ok(conf)
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<PipelineConfig> {
    match path {
        Some(path) => Ok(serde_yaml::from_reader(fs_err::File::open(path)?)?),
        None => Ok(PipelineConfig::default()),
    }
}

pub fn scrap(args: ScrapArgs) -> anyhow::Result<()> {
    let conf: PipelineConfig = (&args).try_into()?;
    let rt = runtime::Builder::new_multi_thread().enable_all().build()?;

    #[cfg(feature = "browser")]
    let manifest = if args.browser || args.with_head {
        let session_conf = sts_pipeline::BrowserSessionConfig {
            with_head: args.with_head,
            ..Default::default()
        };
        rt.block_on(run_pipeline::<sts_pipeline::BrowserSession>(&conf, &session_conf))?
    } else {
        rt.block_on(run_pipeline::<HttpSession>(&conf, &()))?
    };
    #[cfg(not(feature = "browser"))]
    let manifest = rt.block_on(run_pipeline::<HttpSession>(&conf, &()))?;

    println!(
        "Scraped {} records, downloaded {} images to {}, {} failed",
        manifest.total_protocols,
        manifest.images_downloaded,
        conf.assets_dir.display(),
        manifest.failed_downloads.len()
    );
    Ok(())
}

/// Extract the records of a single page and print them as JSON
#[derive(Debug, clap::Args)]
#[command(group = clap::ArgGroup::new("page").required(true))]
pub struct ExtractArgs {
    /// A local html page
    #[arg(group = "page", long)]
    pub file: Option<PathBuf>,
    /// A distant html page
    #[arg(group = "page", long)]
    pub url: Option<String>,
    /// URL the local page was saved from, used to resolve relative links
    #[arg(long, conflicts_with = "url")]
    pub base_url: Option<String>,
    /// CSS selector of the table
    #[arg(long, default_value = "table")]
    pub table_selector: String,
    /// Custom user agent to download the page
    #[arg(long, conflicts_with = "file")]
    pub ua: Option<String>,
}

pub fn extract_page(args: ExtractArgs) -> anyhow::Result<()> {
    let mut conf = PipelineConfig {
        table_selector: args.table_selector,
        ..Default::default()
    };
    let table = conf.table_selector()?;

    let page = if let Some(url) = args.url {
        if let Some(ua) = args.ua {
            conf.user_agent = ua;
        }
        let url = Url::parse(&url)?;
        let rt = runtime::Builder::new_current_thread().enable_all().build()?;
        rt.block_on(async {
            let mut session = HttpSession::launch(&(), &conf).await?;
            let resp = session.goto(&url).await;
            session.close().await?;
            let resp = resp?;
            if !resp.is_success() {
                anyhow::bail!("Couldn't load {url} got HTTP error {}", resp.status);
            }
            Ok::<_, anyhow::Error>(LoadedPage {
                html: resp.text(),
                url: resp.url,
            })
        })?
    } else if let Some(path) = args.file {
        let html = fs_err::read_to_string(&path)?;
        let url = match args.base_url {
            Some(url) => Url::parse(&url)?,
            None => Url::from_file_path(fs_err::canonicalize(&path)?)
                .map_err(|_| anyhow::anyhow!("Couldn't make URL from {}", path.display()))?,
        };
        LoadedPage { url, html }
    } else {
        anyhow::bail!("Missing `url` or `file`");
    };

    let records = extract(&page, &table);
    serde_json::to_writer_pretty(io::stdout(), &records)?;
    println!();
    Ok(())
}

/// Print the URL slug of a name
#[derive(Debug, clap::Args)]
pub struct SlugArgs {
    pub name: String,
    /// Optional yaml configuration file, for slug special cases
    #[arg(env = "STS_CONFIG", long, short)]
    pub config: Option<PathBuf>,
}

/// Find the record of a manifest by slug
#[derive(Debug, clap::Args)]
pub struct LookupArgs {
    pub slug: String,
    /// The manifest written by `scrap`
    #[arg(long, short)]
    pub manifest: Option<PathBuf>,
    /// Optional yaml configuration file
    #[arg(env = "STS_CONFIG", long, short)]
    pub config: Option<PathBuf>,
}

pub fn lookup(args: LookupArgs) -> anyhow::Result<()> {
    let conf = load_config(args.config.as_ref())?;
    let manifest = Manifest::read(args.manifest.as_ref().unwrap_or(&conf.manifest_file))?;
    let slugger = Slugger::new(conf.slug_special_cases);

    let record = slugger
        .find(&manifest.protocols, &args.slug, |r| r.name.as_str())
        .ok_or_else(|| anyhow::anyhow!("No record matches slug {:?}", args.slug))?;

    let mut value = serde_json::to_value(record)?;
    if let Some(dl) = manifest.download_for(&record.name) {
        value["image"] = serde_json::to_value(dl)?;
    }
    serde_json::to_writer_pretty(io::stdout(), &value)?;
    println!();
    Ok(())
}

fn init_logger(quiet: bool) {
    if !quiet {
        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or("sts=info,sts_pipeline=info"),
        )
        .init();
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.cmd {
        SubCommand::Scrap(args) => {
            init_logger(args.quiet);
            scrap(args)
        }
        SubCommand::Extract(args) => {
            env_logger::Builder::from_env(
                env_logger::Env::default().default_filter_or("sts_pipeline=warn"),
            )
            .init();
            extract_page(args)
        }
        SubCommand::Slug(args) => {
            let conf = load_config(args.config.as_ref())?;
            println!("{}", Slugger::new(conf.slug_special_cases).slug(&args.name));
            Ok(())
        }
        SubCommand::Lookup(args) => lookup(args),
        SubCommand::Completion => {
            generate(Shell::Bash, &mut Args::command(), "sts", &mut io::stdout());
            Ok(())
        }
    }
}

use anyhow::Result;
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use spacetravelling::build::{build_article, build_site};
use spacetravelling::client::{ContentSource, PrismicClient};
use spacetravelling::config::Config;
use spacetravelling::date;
use spacetravelling::listing::{ListingView, LoadStatus};
use spacetravelling::site::PageStatus;
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn output_arg<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name("output")
        .long("output")
        .short("o")
        .takes_value(true)
        .value_name("DIR")
        .help("The directory pages are written to (default: `_output` next to the project file)")
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("spacetravelling=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = App::new("spacetravelling")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Builds the Spacetravelling blog from its headless CMS")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("build")
                .about("Generates the listing page and the pre-rendered article pages")
                .arg(output_arg()),
        )
        .subcommand(
            SubCommand::with_name("article")
                .about("Generates the page for a single article on demand")
                .arg(
                    Arg::with_name("UID")
                        .required(true)
                        .index(1)
                        .help("The article's unique identifier"),
                )
                .arg(output_arg()),
        )
        .subcommand(
            SubCommand::with_name("list")
                .about("Prints the article listing")
                .arg(
                    Arg::with_name("pages")
                        .long("pages")
                        .takes_value(true)
                        .value_name("N")
                        .default_value("0")
                        .help("The number of additional pages to load"),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        ("build", Some(args)) => build(args).await,
        ("article", Some(args)) => article(args).await,
        ("list", Some(args)) => list(args).await,
        _ => Ok(()),
    }
}

fn load_config(args: &ArgMatches) -> Result<Config> {
    let cwd = std::env::current_dir()?;
    Config::from_directory(&cwd, args.value_of("output").map(Path::new))
}

fn client(config: &Config) -> Result<PrismicClient> {
    Ok(PrismicClient::new(
        config.api_endpoint.clone(),
        &config.site.document_type,
        config.access_token.clone(),
    )?)
}

async fn build(args: &ArgMatches<'_>) -> Result<()> {
    let config = load_config(args)?;
    let generated = build_site(&config, client(&config)?, chrono::Utc::now()).await?;
    println!(
        "Generated {} page(s) in {}",
        generated.len(),
        config.output_directory.display()
    );
    Ok(())
}

async fn article(args: &ArgMatches<'_>) -> Result<()> {
    let config = load_config(args)?;
    let uid = args.value_of("UID").unwrap_or_default();
    match build_article(&config, client(&config)?, uid, chrono::Utc::now()).await? {
        PageStatus::Found => println!("Wrote the page for `{}`", uid),
        PageStatus::NotFound => println!("No article `{}`", uid),
    }
    Ok(())
}

async fn list(args: &ArgMatches<'_>) -> Result<()> {
    let config = load_config(args)?;
    let pages: usize = args.value_of("pages").unwrap_or("0").parse()?;
    let client = client(&config)?;

    let first_page = client.query_summaries(&config.site.listing_query()).await?;
    let mut view = ListingView::new(first_page);
    for _ in 0..pages {
        if !view.can_load_more() {
            break;
        }
        // failures are shown inline below the listing
        if view.load_more(&client).await.is_err() {
            break;
        }
    }

    for summary in view.items() {
        println!("{}", summary.title);
        if !summary.subtitle.is_empty() {
            println!("  {}", summary.subtitle);
        }
        match date::format_optional(summary.publication_date.as_ref(), config.site.locale) {
            Some(date) => println!("  {} · {}", date, summary.author),
            None => println!("  {}", summary.author),
        }
        println!("  /{}", spacetravelling::site::article_path(&summary.uid));
    }
    if let LoadStatus::Failed(message) = view.status() {
        println!("Could not load more posts: {}", message);
    }
    if view.can_load_more() {
        println!("Carregar mais posts");
    }
    Ok(())
}

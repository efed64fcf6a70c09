// src/main.rs
use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::time::Instant;

use orglink_lib::{
    client::{AuditTarget, QueryClient, ResponseRecorder},
    config::AppConfig,
    db, feed,
    pipeline::{Pipeline, PipelineOptions},
    reference,
    store::PgOrganizationStore,
};

#[derive(Parser, Debug)]
#[command(name = "orglink")]
#[command(about = "Links license contacts to provider organization records")]
#[command(version)]
struct Args {
    /// Verbose logging (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// License feed (JSON array); standard input when omitted
    #[arg(short, long, value_name = "FILE")]
    infile: Option<PathBuf>,

    /// Write raw domain query responses to this file
    #[arg(short = 'o', long, value_name = "FILE")]
    domain_search_outfile: Option<PathBuf>,

    /// Write raw name query responses to this file
    #[arg(short = 'p', long, value_name = "FILE")]
    name_search_outfile: Option<PathBuf>,

    /// Write raw domain query responses to standard output
    #[arg(short = 's', long)]
    domain_search_to_stdout: bool,

    /// Write raw name query responses to standard output
    #[arg(short = 't', long)]
    name_search_to_stdout: bool,

    /// Skip the first N records of the feed
    #[arg(long, value_name = "N", default_value = "0")]
    start_at: usize,

    /// Only ask for organizations updated since this date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    updated_since: Option<NaiveDate>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::init_from_env(env_logger::Env::default().default_filter_or(level));

    info!("Starting organization sync");
    let start_time = Instant::now();

    db::load_env();
    let config = AppConfig::from_env()?;

    let pool = db::connect()
        .await
        .context("Failed to connect to database")?;
    info!("Successfully connected to the database");

    let client = QueryClient::connect_or_fail(&config).await?;
    let isp_domains = reference::load_isp_domains(&config.isp_file)?;
    info!("Loaded {} ISP domains", isp_domains.len());

    let records = feed::load_source_records(args.infile.as_deref())?;
    info!("Read {} license records", records.len());

    let mut recorder = ResponseRecorder::new(
        AuditTarget {
            file: args.domain_search_outfile,
            to_stdout: args.domain_search_to_stdout,
        },
        AuditTarget {
            file: args.name_search_outfile,
            to_stdout: args.name_search_to_stdout,
        },
    );

    let options = PipelineOptions {
        start_at: args.start_at,
        updated_since: args.updated_since,
        ..PipelineOptions::from_config(&config)
    };
    let pipeline = Pipeline::new(
        client,
        PgOrganizationStore::new(pool),
        isp_domains,
        config.tld_file.clone(),
        options,
    );

    let stats = pipeline.run(&records, &mut recorder).await?;
    eprintln!("{}", stats);

    info!("Organization sync completed in {:.2?}", start_time.elapsed());
    Ok(())
}

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use futures::future::join_all;
use mdns::client::{TcpClient, build_query, query_udp, transfer_records};
use mdns::dns::enums::{DNSResourceType, ResponseCode};
use tracing::{error, info};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum BenchType {
    /// SOA queries over UDP
    Soa,
    /// Full zone transfers over TCP
    Axfr,
}

/// Load generator for an mdns server
#[derive(Parser, Debug)]
#[command(name = "mdns-bench")]
#[command(version, about, long_about = None)]
struct Args {
    /// Zone to query
    #[arg(short, long)]
    zone: String,

    /// Type of query to send
    #[arg(short = 't', long, value_enum, default_value = "soa")]
    qtype: BenchType,

    /// Number of concurrent queries to send
    #[arg(short = 'n', long, default_value_t = 10)]
    queries: usize,

    /// Target server
    #[arg(short, long, default_value = "127.0.0.1:5354")]
    server: SocketAddr,

    /// Per-query timeout in seconds
    #[arg(long, default_value_t = 15)]
    timeout: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct QueryResult {
    answers: usize,
    error: bool,
    elapsed: Duration,
}

async fn send_soa(args: &Args, id: u16) -> QueryResult {
    let start = Instant::now();
    let timeout = Duration::from_secs(args.timeout);
    let outcome = match build_query(id, &args.zone, DNSResourceType::SOA) {
        Ok(request) => query_udp(args.server, &request, timeout).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(reply) if reply.rcode() == Some(ResponseCode::NoError) => QueryResult {
            answers: reply.answers.len(),
            error: false,
            elapsed: start.elapsed(),
        },
        Ok(reply) => {
            error!(
                "ERROR: Querying SOA for {} : {:?}",
                args.zone,
                reply.rcode()
            );
            QueryResult {
                error: true,
                elapsed: start.elapsed(),
                ..Default::default()
            }
        }
        Err(e) => {
            error!("ERROR: Querying SOA for {} : {}", args.zone, e);
            QueryResult {
                error: true,
                elapsed: start.elapsed(),
                ..Default::default()
            }
        }
    }
}

async fn do_axfr(args: &Args, id: u16) -> QueryResult {
    let start = Instant::now();
    let timeout = Duration::from_secs(args.timeout);

    let outcome = async {
        let request = build_query(id, &args.zone, DNSResourceType::AXFR)?;
        let mut client = TcpClient::connect(args.server, timeout).await?;
        client.axfr(&request).await
    }
    .await;

    match outcome {
        Ok(envelopes)
            if envelopes
                .iter()
                .all(|e| e.rcode() == Some(ResponseCode::NoError)) =>
        {
            QueryResult {
                answers: transfer_records(&envelopes).len(),
                error: false,
                elapsed: start.elapsed(),
            }
        }
        Ok(envelopes) => {
            error!(
                "ERROR: AXFR for {} : {:?}",
                args.zone,
                envelopes.last().and_then(|e| e.rcode())
            );
            QueryResult {
                error: true,
                elapsed: start.elapsed(),
                ..Default::default()
            }
        }
        Err(e) => {
            error!("ERROR: AXFR for {} : {}", args.zone, e);
            QueryResult {
                error: true,
                elapsed: start.elapsed(),
                ..Default::default()
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args = Args::parse();
    if args.queries == 0 {
        return Err("--queries must be greater than 0".into());
    }
    info!(
        "Sending {:?} for {} {} times to {}",
        args.qtype, args.zone, args.queries, args.server
    );

    let start = Instant::now();
    let tasks = (0..args.queries).map(|i| {
        let id = (i % usize::from(u16::MAX)) as u16;
        let args = &args;
        async move {
            match args.qtype {
                BenchType::Soa => send_soa(args, id).await,
                BenchType::Axfr => do_axfr(args, id).await,
            }
        }
    });
    let results = join_all(tasks).await;
    let total = start.elapsed();

    let count = results.len() as f64;
    let errors = results.iter().filter(|r| r.error).count();
    let total_answers: usize = results.iter().map(|r| r.answers).sum();
    let cumulative_ms: f64 = results
        .iter()
        .map(|r| r.elapsed.as_secs_f64() * 1000.0)
        .sum();

    info!("Total execution time was {} ms", total.as_millis());
    info!(
        "Queries per second: {:.2}",
        count / total.as_secs_f64().max(f64::EPSILON)
    );
    info!("Total Errors: {}", errors);
    info!("Avg Response Duration: {:.3} ms", cumulative_ms / count);
    info!("Avg Response Length: {:.2} rrs", total_answers as f64 / count);

    Ok(())
}

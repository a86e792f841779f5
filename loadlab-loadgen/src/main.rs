use clap::Parser;
use loadlab_client::{Client, ClientConfig};
use loadlab_loadgen::audit::{self, Violation};
use loadlab_loadgen::metrics::Metrics;
use loadlab_loadgen::server::ServerProcess;
use loadlab_loadgen::worker::{self, Progress, RunMode, RunPlan};
use loadlab_loadgen::workload::WorkloadProfile;
use std::process;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "loadlab-loadgen", about = "Load generator for the LoadLab server")]
struct Args {
    /// Base URL of a running server; a local server is built and spawned when omitted
    #[arg(long)]
    target: Option<String>,

    /// Number of concurrent workers
    #[arg(long, default_value_t = 10)]
    concurrency: usize,

    /// Total requests to send; 0 runs for --duration instead
    #[arg(long, default_value_t = 0)]
    requests: u64,

    /// How long to run (seconds) when --requests is 0
    #[arg(long, default_value_t = 10)]
    duration: u64,

    /// Workload profile: mixed | stress | health-only | cpu-only
    #[arg(long, default_value = "mixed")]
    profile: String,

    /// Skip the think-time pause between requests
    #[arg(long)]
    no_think: bool,

    /// Fail if the unexpected error rate exceeds this fraction
    #[arg(long, default_value_t = 0.01)]
    max_error_rate: f64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loadlab_loadgen=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let profile = WorkloadProfile::from_name(&args.profile).unwrap_or_else(|| {
        eprintln!(
            "Unknown profile {:?}. Valid values: mixed, stress, health-only, cpu-only",
            args.profile
        );
        process::exit(3);
    });
    if args.concurrency == 0 {
        eprintln!("--concurrency must be at least 1");
        process::exit(3);
    }

    // `process::exit` skips destructors, so the spawned server is dropped first.
    let (base_url, server) = match &args.target {
        Some(target) => (target.trim_end_matches('/').to_string(), None),
        None => match ServerProcess::build_and_spawn() {
            Ok(server) => (server.base_url(), Some(server)),
            Err(e) => {
                eprintln!("Failed to start server: {e}");
                process::exit(3);
            }
        },
    };

    let exit_code = run(&args, profile, base_url).await;
    drop(server);
    process::exit(exit_code);
}

async fn run(args: &Args, profile: WorkloadProfile, base_url: String) -> i32 {
    let client = Client::new(ClientConfig { base_url: base_url.clone() });
    let before = match client.stats().await {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("Server at {base_url} is not reachable: {e}");
            return 3;
        }
    };

    let mode = if args.requests > 0 {
        RunMode::Requests(args.requests)
    } else {
        RunMode::Duration(Duration::from_secs(args.duration))
    };
    let plan = RunPlan { concurrency: args.concurrency, mode, think: !args.no_think };

    println!("Target:       {base_url}");
    println!("Profile:      {}", profile.as_name());
    println!("Concurrency:  {}", args.concurrency);
    match mode {
        RunMode::Requests(n) => println!("Requests:     {n}"),
        RunMode::Duration(d) => println!("Duration:     {} s", d.as_secs()),
    }
    println!();

    let progress = Arc::new(Progress::default());
    let progress_handle = {
        let progress = progress.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.tick().await;
            let mut last = 0;
            loop {
                interval.tick().await;
                let sent = progress.sent.load(Ordering::Relaxed);
                let failed = progress.failed.load(Ordering::Relaxed);
                println!("  sent {sent:>8}  failed {failed:>6}  ({} rps)", sent - last);
                last = sent;
            }
        })
    };

    let metrics = worker::run(base_url, profile, plan, progress).await;
    progress_handle.abort();

    let after = match client.stats().await {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("Failed to fetch /stats after the run: {e}");
            return 3;
        }
    };
    let violations = audit::check(&before, &after, &metrics.delivered, metrics.expected_errors);

    print_report(args, profile, &metrics, &violations);
    for v in &violations {
        eprintln!("VIOLATION {}", describe(v));
    }

    if metrics.error_rate() > args.max_error_rate {
        1
    } else if !violations.is_empty() {
        2
    } else {
        0
    }
}

fn print_report(
    args: &Args,
    profile: WorkloadProfile,
    metrics: &Metrics,
    violations: &[Violation],
) {
    let pass_fail = |exceeded: bool| if exceeded { "✗" } else { "✓" };
    let error_rate_exceeded = metrics.error_rate() > args.max_error_rate;
    let overall_pass = !error_rate_exceeded && violations.is_empty();

    println!();
    println!("LoadLab Load Test Results");
    println!("=========================");
    println!("Elapsed:               {:.1} s", metrics.elapsed_secs);
    println!("Profile:               {}", profile.as_name());
    println!("Workers:               {}", args.concurrency);
    println!();
    println!("Requests:              {}", format_thousands(metrics.requests_total));
    println!("Successful:            {}", metrics.successes);
    println!("Expected /error 500s:  {}", metrics.expected_errors);
    println!("Failed:                {}", metrics.failures);
    println!("Throughput:            {:.1} rps", metrics.throughput_rps());
    println!("Mean latency:          {:.1} ms", ns_to_ms(metrics.mean_ns()));
    println!("P50 latency:           {:.1} ms", ns_to_ms(metrics.p50_ns()));
    println!("P99 latency:           {:.1} ms", ns_to_ms(metrics.p99_ns()));
    println!();
    println!("Per endpoint:");
    for (endpoint, count) in &metrics.delivered {
        println!("  {:<8} {}", endpoint.path(), count);
    }
    println!();
    println!(
        "Error rate:            {:.3}%    [threshold: {:.3}%]  {}",
        metrics.error_rate() * 100.0,
        args.max_error_rate * 100.0,
        pass_fail(error_rate_exceeded),
    );
    println!(
        "Counter violations:    {}        [threshold: 0]        {}",
        violations.len(),
        pass_fail(!violations.is_empty()),
    );
    println!();
    println!("Result: {}", if overall_pass { "PASS" } else { "FAIL" });
}

fn describe(violation: &Violation) -> String {
    match violation {
        Violation::LostUpdates { endpoint, delivered, counted } => {
            format!("LostUpdates: {endpoint} answered {delivered} requests but counted {counted}")
        }
        Violation::EndpointSumMismatch { sum, total } => {
            format!("EndpointSumMismatch: per-endpoint sum {sum} != total_requests {total}")
        }
        Violation::ErrorsExceedRequests { errors, total } => {
            format!("ErrorsExceedRequests: error_count {errors} > total_requests {total}")
        }
        Violation::ErrorUndercount { observed, counted } => {
            format!("ErrorUndercount: saw {observed} injected failures but counted {counted}")
        }
        Violation::CounterDecreased { counter, before, after } => {
            format!("CounterDecreased: {counter} went from {before} to {after}")
        }
    }
}

fn format_thousands(n: u64) -> String {
    if n >= 1_000_000 {
        format!("~{}M", n / 1_000_000)
    } else if n >= 1_000 {
        format!("~{}K", n / 1_000)
    } else {
        n.to_string()
    }
}

fn ns_to_ms(ns: u64) -> f64 {
    ns as f64 / 1_000_000.0
}

/**
 * Command line surface
 *
 * The clap `Command` enum is the command table. `main` parses it once and hands
 * it to `run`, which resolves settings, builds the client and executes the
 * selected command. `run` returns the process exit code.
 */
use crate::config::Settings;
use crate::error::Result;
use crate::k8s::dynamic::KubeResourceClient;
use crate::k8s::observe::{
    HandlerSet, ResourceClient, ResourceIdentity, ResourceKind, RetryPolicy, WaitFor, WaitOutcome,
    WaitSpec, WatchLoop, WatchSpec, poll_until,
};
use crate::k8s::observe::config::optional_secs;
use crate::k8s::{USER_AGENT, client, events, pods};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Exit code for a wait that timed out
pub const EXIT_TIMED_OUT: u8 = 2;

/// Exit code after Ctrl-C
pub const EXIT_CANCELLED: u8 = 130;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file (YAML)
    #[arg(long, global = true, env = "KUBEOBS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Namespace to work in, defaults to the kubeconfig context's namespace
    #[arg(short, long, global = true)]
    pub namespace: Option<String>,

    /// Kubeconfig file, defaults to the inferred configuration
    #[arg(long, global = true)]
    pub kubeconfig: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate shell completions
    Completions { shell: Shell },

    #[command(flatten)]
    Cluster(ClusterCommand),
}

/// Commands that talk to the API server
#[derive(Subcommand, Debug)]
pub enum ClusterCommand {
    /// Watch a resource type and print every change until interrupted
    Watch {
        /// Resource type: a short name (`pods`, `deploy`, ...) or `plural.version[.group]`
        resource: ResourceKind,

        /// Label selector, e.g. `app=web`
        #[arg(short = 'l', long)]
        selector: Option<String>,

        /// Field selector, e.g. `status.phase=Running`
        #[arg(long)]
        field_selector: Option<String>,

        /// Watch across all namespaces
        #[arg(short = 'A', long)]
        all_namespaces: bool,

        /// Fixed delay between reconnection attempts in seconds, instead of exponential backoff
        #[arg(long)]
        retry_interval: Option<u64>,

        /// Give up when a reconnection cycle lasts longer than this many seconds (0 = never)
        #[arg(long)]
        retry_timeout: Option<u64>,
    },

    /// Wait until a resource reaches a condition
    Wait {
        resource: ResourceKind,

        name: String,

        /// `ready`, `available`, `condition=Type`, `field=/json/pointer` or `jsonpath=/json/pointer=value`
        #[arg(long = "for", default_value = "ready")]
        condition: WaitFor,

        /// Seconds between polls
        #[arg(long)]
        interval: Option<u64>,

        /// Seconds to wait before giving up
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Stream cluster events until interrupted
    Events {
        #[arg(short = 'A', long)]
        all_namespaces: bool,
    },

    /// Print pod readiness on a fixed interval until interrupted
    Monitor {
        #[arg(short = 'l', long)]
        selector: Option<String>,

        /// Seconds between listings
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Print one resource as YAML
    Get { resource: ResourceKind, name: String },

    /// List resources
    List {
        resource: ResourceKind,

        #[arg(short = 'l', long)]
        selector: Option<String>,

        #[arg(short = 'A', long)]
        all_namespaces: bool,
    },

    /// Delete one resource
    Delete { resource: ResourceKind, name: String },
}

fn identity_in(resource: ResourceKind, namespace: &str, name: &str) -> ResourceIdentity {
    let namespace = (!resource.is_cluster_scoped()).then_some(namespace);
    ResourceIdentity::new(resource, namespace, name)
}

/// Execute the parsed command line
///
/// # Errors
///
/// Will return `Err` if settings or the client cannot be loaded, or the command fails
pub async fn run(cli: Cli, cancel: CancellationToken) -> Result<u8> {
    let command = match cli.command {
        Command::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "kubeobs", &mut std::io::stdout());
            return Ok(0);
        }
        Command::Cluster(command) => command,
    };

    let settings = Settings::load(cli.config.as_deref())?;
    let kubeconfig = cli.kubeconfig.or_else(|| settings.kubeconfig.clone());
    let user_agent = client::user_agent(settings.user_agent.as_deref().unwrap_or(USER_AGENT));
    let config = client::load_config(kubeconfig.as_deref()).await?;

    let namespace = cli
        .namespace
        .or_else(|| settings.namespace.clone())
        .unwrap_or_else(|| config.default_namespace.clone());
    let kube_client = client::new(config, Some(user_agent.as_str()))?;
    let scoped = |all_namespaces: bool| (!all_namespaces).then_some(namespace.as_str());

    let resources = KubeResourceClient::new(kube_client);

    match command {
        ClusterCommand::Watch {
            resource,
            selector,
            field_selector,
            all_namespaces,
            retry_interval,
            retry_timeout,
        } => {
            let retry = retry_interval.map_or_else(
                || settings.watch.retry_policy(),
                |secs| RetryPolicy::fixed(Duration::from_secs(secs.max(1))),
            );
            let budget =
                retry_timeout.map_or_else(|| settings.watch.retry_timeout(), optional_secs);

            let handlers = HandlerSet::new().on_any(events::print_change);
            let spec = WatchSpec::new(resource, scoped(all_namespaces), handlers)
                .labels(selector.as_deref().unwrap_or_default())
                .fields(field_selector.as_deref().unwrap_or_default())
                .retry(retry)
                .retry_timeout(budget)
                .attempt_timeout(settings.watch.attempt_timeout());

            println!("Watching {}", spec.describe());
            let stats = WatchLoop::new(spec).run(&resources, &cancel).await?;
            info!(
                "📊 {} sessions, {} events, {} failed attempts",
                stats.sessions, stats.events, stats.failed_attempts
            );
            Ok(EXIT_CANCELLED)
        }

        ClusterCommand::Events { all_namespaces } => {
            let handlers = HandlerSet::new().on_any(events::print_cluster_event);
            let spec = WatchSpec::new(ResourceKind::events(), scoped(all_namespaces), handlers)
                .retry(settings.watch.retry_policy())
                .retry_timeout(settings.watch.retry_timeout())
                .attempt_timeout(settings.watch.attempt_timeout());

            println!("Streaming events in {}", scoped(all_namespaces).unwrap_or("all namespaces"));
            WatchLoop::new(spec).run(&resources, &cancel).await?;
            Ok(EXIT_CANCELLED)
        }

        ClusterCommand::Wait {
            resource,
            name,
            condition,
            interval,
            timeout,
        } => {
            let identity = identity_in(resource, &namespace, &name);
            let spec = WaitSpec::new(identity.clone(), condition.into_predicate())
                .poll_interval(Duration::from_secs(
                    interval.unwrap_or(settings.wait.poll_interval_seconds).max(1),
                ))
                .timeout(Duration::from_secs(
                    timeout.unwrap_or(settings.wait.timeout_seconds),
                ));

            match poll_until(&resources, spec, &cancel).await? {
                WaitOutcome::Satisfied { elapsed, .. } => {
                    println!("{identity} condition met after {}s", elapsed.as_secs());
                    Ok(0)
                }
                WaitOutcome::TimedOut { elapsed, .. } => {
                    eprintln!(
                        "timed out after {}s waiting for {identity}",
                        elapsed.as_secs()
                    );
                    Ok(EXIT_TIMED_OUT)
                }
                WaitOutcome::Cancelled { .. } => Ok(EXIT_CANCELLED),
            }
        }

        ClusterCommand::Monitor { selector, interval } => {
            let every = Duration::from_secs(
                interval.unwrap_or(settings.monitor.interval_seconds).max(1),
            );
            println!("Monitoring pod health in namespace {namespace}");
            pods::monitor_pod_health(
                &resources,
                Some(namespace.as_str()),
                selector.as_deref(),
                every,
                &cancel,
            )
            .await;
            Ok(EXIT_CANCELLED)
        }

        ClusterCommand::Get { resource, name } => {
            let identity = identity_in(resource, &namespace, &name);
            let snapshot = resources.fetch(&identity).await?;
            print!("{}", serde_yaml::to_string(snapshot.as_value())?);
            Ok(0)
        }

        ClusterCommand::List {
            resource,
            selector,
            all_namespaces,
        } => {
            let snapshots = resources
                .list(&resource, scoped(all_namespaces), selector.as_deref())
                .await?;
            if snapshots.is_empty() {
                eprintln!("No {resource} found");
            }
            for snapshot in &snapshots {
                println!(
                    "{}\t{}\t{}",
                    snapshot.namespace().unwrap_or("-"),
                    snapshot.name().unwrap_or("<unnamed>"),
                    events::snapshot_age(snapshot)
                );
            }
            Ok(0)
        }

        ClusterCommand::Delete { resource, name } => {
            let identity = identity_in(resource, &namespace, &name);
            resources.delete(&identity).await?;
            println!("{identity} deleted");
            Ok(0)
        }
    }
}

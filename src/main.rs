use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::info;

use smsrouter::billing::charge_submit_sm;
use smsrouter::config::Config;
use smsrouter::router::{Direction, Dispatch, Pdu, Routable, Router};
use smsrouter::telemetry::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "smsrouter")]
#[command(author, version, about = "Routing, interception and billing engine for an SMS gateway")]
struct Args {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Validate config and exit
    #[arg(long)]
    validate: bool,

    /// Print the routing and interception tables
    #[arg(long)]
    show: bool,

    /// Dispatch a test message and print the decision
    #[arg(long, value_enum, value_name = "DIRECTION")]
    dispatch: Option<DispatchDirection>,

    /// Sending user (MT dispatch)
    #[arg(long, requires = "dispatch")]
    user: Option<String>,

    /// Origin connector (MO dispatch)
    #[arg(long, requires = "dispatch")]
    connector: Option<String>,

    /// Source address
    #[arg(long, default_value = "")]
    from: String,

    /// Destination address
    #[arg(long, default_value = "")]
    to: String,

    /// Message text
    #[arg(long, default_value = "")]
    text: String,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DispatchDirection {
    Mo,
    Mt,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration first (to get log settings)
    let config = Config::load(&args.config)?;

    init_tracing(&config.telemetry)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        "starting smsrouter"
    );

    info!(
        connectors = config.connectors.len(),
        users = config.users.len(),
        mt_routes = config.mt_routes.len(),
        mo_routes = config.mo_routes.len(),
        "configuration loaded"
    );

    let router = config.build_router()?;

    if args.validate {
        info!("configuration is valid");
        return Ok(());
    }

    if args.show {
        show(&router);
    }

    if let Some(direction) = args.dispatch {
        dispatch_one(&config, &router, direction, &args).await?;
    }

    Ok(())
}

fn show(router: &Router) {
    for direction in [Direction::Mt, Direction::Mo] {
        println!("{} routes:", direction);
        for (order, route) in router.routes(direction) {
            println!("  #{} {}", order, route);
        }
        println!("{} interceptors:", direction);
        for (order, interceptor) in router.interceptors(direction) {
            println!("  #{} {}", order, interceptor);
        }
    }
}

async fn dispatch_one(
    config: &Config,
    router: &Router,
    direction: DispatchDirection,
    args: &Args,
) -> Result<()> {
    let (direction, routable) = match direction {
        DispatchDirection::Mt => {
            let Some(user_id) = args.user.as_deref() else {
                bail!("an MT dispatch needs --user");
            };
            let user = config
                .user(user_id)
                .cloned()
                .with_context(|| format!("unknown user: {}", user_id))?;
            let pdu = Pdu::submit_sm(&args.from, &args.to, &args.text);
            (Direction::Mt, Routable::submit_sm(pdu, user))
        }
        DispatchDirection::Mo => {
            let Some(connector_id) = args.connector.as_deref() else {
                bail!("an MO dispatch needs --connector");
            };
            let connector = config
                .connector(connector_id)
                .with_context(|| format!("unknown connector: {}", connector_id))?;
            let pdu = Pdu::deliver_sm(&args.from, &args.to, &args.text);
            (Direction::Mo, Routable::deliver_sm(pdu, connector))
        }
    };

    match router.dispatch(direction, routable).await? {
        Dispatch::Routed {
            routable,
            mut decision,
            bill,
        } => {
            println!("route: #{} {}", decision.order(), decision.route());
            match decision.get_connector() {
                Some(connector) => println!("connector: {}", connector),
                None => println!("connector: none"),
            }
            if !routable.tags().is_empty() {
                let tags: Vec<String> = routable.tags().iter().map(ToString::to_string).collect();
                println!("tags: {}", tags.join(", "));
            }
            if let (Some(bill), Some(user)) = (bill, routable.user()) {
                println!("bill: {}", bill);
                match charge_submit_sm(user, &bill, 1) {
                    Ok(delta) => println!(
                        "charge: balance -{} submit_sm_count -{}",
                        delta.balance, delta.submit_sm_count
                    ),
                    Err(e) => println!("charge: rejected ({})", e),
                }
            }
        }
        Dispatch::Intercepted {
            smpp_status,
            http_status,
            extra,
        } => {
            println!(
                "rejected by interceptor: smpp_status={} http_status={} extra={}",
                smpp_status, http_status, extra
            );
        }
        Dispatch::NoRoute { .. } => println!("no route"),
    }

    Ok(())
}

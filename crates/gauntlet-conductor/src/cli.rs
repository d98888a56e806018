//! Operator command line.
//!
//! Plain verbs are thin wrappers over the control channel and print the
//! worker's JSON reply; lifecycle and drill commands go through the
//! [`Orchestrator`]. Refused or failed drills still print their outcome
//! and exit zero, since a busy worker is not an error.

use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};

use gauntlet_rpc::{ControlResponse, RpcClient};
use gauntlet_supervisor::WorkerSupervisor;

use crate::config::ConductorConfig;
use crate::orchestrator::{FaultOutcome, Orchestrator};
use crate::procfile::ProcFile;

#[derive(Parser)]
#[command(author, version, about = "Conductor for the gateway compliance gauntlet")]
pub struct Cli {
    /// Path to the config file (can also be set via GAUNTLET_CONDUCTOR_CONFIG)
    #[arg(short, long)]
    pub config: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the worker process
    Start {
        /// Start even while the disconnect-mode latch is set
        #[arg(long)]
        force: bool,
    },
    /// Kill the worker process outright
    Kill,
    /// Kill and force-start the worker in one step
    Restart,
    /// Show the supervisor view plus the worker's own status report
    Status,
    /// Probe the control socket
    Ping,
    /// Submit a catalogue case to the worker
    RunCase {
        /// Case id such as 2.1.2.1
        case_id: String,
    },
    /// Re-enable trading and zero the risk counters
    ResetRisk,
    /// Show the alert thresholds
    GetThresholds,
    /// Update alert thresholds; only the given fields change
    SetThresholds {
        #[arg(long)]
        max_order_count: Option<u64>,
        #[arg(long)]
        max_cancel_count: Option<u64>,
        #[arg(long)]
        max_repeat_count: Option<u64>,
    },
    /// Dump the risk monitor snapshot
    GetRiskSnapshot,
    /// Show the effective test parameters
    GetTestConfig,
    /// Override test parameters; only the given fields change
    SetTestConfig {
        #[arg(long)]
        test_symbol: Option<String>,
        #[arg(long)]
        safe_buy_price: Option<f64>,
        #[arg(long)]
        deal_buy_price: Option<f64>,
    },
    /// Send a bare legacy verb (DISCONNECT, RECONNECT or PAUSE)
    Legacy { verb: String },
    /// Drill: kill the worker and leave it down
    HardDisconnect { case_id: String },
    /// Drill: bring a downed worker back and wait for it to answer
    HardReconnect { case_id: String },
    /// Drill: kill, hold the outage window, restart and wait
    HardCycle { case_id: String },
}

pub async fn run(command: Command, config: ConductorConfig) -> anyhow::Result<()> {
    let client = RpcClient::with_timeout(config.rpc.worker_addr, config.rpc.request_timeout());
    let supervisor = WorkerSupervisor::new(config.supervisor.clone());
    let procfile = ProcFile::load(config.state_path.clone());
    let orchestrator = Orchestrator::new(supervisor, client, procfile, config.faults.clone());

    match command {
        Command::Start { force } => {
            if orchestrator.start_worker(force)? {
                match orchestrator.worker_pid() {
                    Some(pid) => println!("worker running (pid {pid})"),
                    None => println!("worker running"),
                }
            } else {
                println!("start suppressed by disconnect mode, use --force to override");
            }
        }
        Command::Kill => {
            orchestrator.kill_worker();
            println!("kill delivered");
        }
        Command::Restart => {
            orchestrator.restart_worker().await?;
            match orchestrator.worker_pid() {
                Some(pid) => println!("worker restarted (pid {pid})"),
                None => println!("worker restarted"),
            }
        }
        Command::Status => {
            let process = orchestrator.process_report();
            let worker = match orchestrator.client().request("GET_STATUS", json!({})).await {
                Ok(response) if response.ok => response.data.unwrap_or(Value::Null),
                _ => Value::Null,
            };
            let combined = json!({ "process": process, "worker": worker });
            println!("{}", serde_json::to_string_pretty(&combined)?);
        }
        Command::Ping => {
            print_response(&orchestrator.client().request("PING", json!({})).await?)?;
        }
        Command::RunCase { case_id } => {
            let response = orchestrator
                .client()
                .request("RUN_CASE", json!({ "case_id": case_id }))
                .await?;
            print_response(&response)?;
        }
        Command::ResetRisk => {
            print_response(&orchestrator.client().request("RESET_RISK", json!({})).await?)?;
        }
        Command::GetThresholds => {
            print_response(
                &orchestrator
                    .client()
                    .request("GET_THRESHOLDS", json!({}))
                    .await?,
            )?;
        }
        Command::SetThresholds {
            max_order_count,
            max_cancel_count,
            max_repeat_count,
        } => {
            let mut payload = Map::new();
            if let Some(v) = max_order_count {
                payload.insert("max_order_count".to_string(), v.into());
            }
            if let Some(v) = max_cancel_count {
                payload.insert("max_cancel_count".to_string(), v.into());
            }
            if let Some(v) = max_repeat_count {
                payload.insert("max_repeat_count".to_string(), v.into());
            }
            let response = orchestrator
                .client()
                .request("SET_THRESHOLDS", Value::Object(payload))
                .await?;
            print_response(&response)?;
        }
        Command::GetRiskSnapshot => {
            print_response(
                &orchestrator
                    .client()
                    .request("GET_RISK_SNAPSHOT", json!({}))
                    .await?,
            )?;
        }
        Command::GetTestConfig => {
            print_response(
                &orchestrator
                    .client()
                    .request("GET_TEST_CONFIG", json!({}))
                    .await?,
            )?;
        }
        Command::SetTestConfig {
            test_symbol,
            safe_buy_price,
            deal_buy_price,
        } => {
            let mut payload = Map::new();
            if let Some(v) = test_symbol {
                payload.insert("test_symbol".to_string(), v.into());
            }
            if let Some(v) = safe_buy_price {
                payload.insert("safe_buy_price".to_string(), v.into());
            }
            if let Some(v) = deal_buy_price {
                payload.insert("deal_buy_price".to_string(), v.into());
            }
            let response = orchestrator
                .client()
                .request("SET_TEST_CONFIG", Value::Object(payload))
                .await?;
            print_response(&response)?;
        }
        Command::Legacy { verb } => {
            let reply = orchestrator.client().legacy(&verb).await?;
            println!("{reply}");
        }
        Command::HardDisconnect { case_id } => {
            print_outcome(&orchestrator.hard_disconnect(&case_id).await?)?;
        }
        Command::HardReconnect { case_id } => {
            print_outcome(&orchestrator.hard_reconnect(&case_id).await?)?;
        }
        Command::HardCycle { case_id } => {
            print_outcome(&orchestrator.hard_cycle(&case_id).await?)?;
        }
    }
    Ok(())
}

fn print_response(response: &ControlResponse) -> anyhow::Result<()> {
    if response.ok {
        match &response.data {
            Some(data) => println!("{}", serde_json::to_string_pretty(data)?),
            None => println!("ok"),
        }
        Ok(())
    } else {
        anyhow::bail!("{}", response.error.as_deref().unwrap_or("unspecified error"))
    }
}

fn print_outcome(outcome: &FaultOutcome) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(outcome)?);
    Ok(())
}

// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Covault Console
//!
//! Entry point for the `covault` binary. Parses CLI arguments, initializes
//! logging, and runs one of three subcommands:
//!
//! - `demo`    — scripted threshold-approval walkthrough on an in-memory
//!   vault chain: create, add an owner, survive a revert, enforce the
//!   canonical executor, move funds
//! - `check`   — offline address validation
//! - `version` — print build version information

mod cli;
mod logging;

use anyhow::{bail, Result};
use clap::Parser;
use rand::Rng;

use covault_core::identity::LocalIdentityProvider;
use covault_core::{
    ActionHash, ActionReport, ActionStatus, Address, ApproverEntry, InMemoryChain, SessionError,
    VaultSession,
};

use cli::{CheckArgs, Commands, CovaultCli, DemoArgs};
use logging::LogFormat;

/// Display names handed to demo owners, in creation order.
const DEMO_NAMES: [&str; 8] = [
    "alice", "bob", "carol", "dana", "erin", "frank", "grace", "heidi",
];

/// Starting balance credited to the demo vault.
const DEMO_FUNDING: u64 = 1_000_000;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CovaultCli::parse();

    match cli.command {
        Commands::Demo(args) => run_demo(args).await,
        Commands::Check(args) => check_address(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// demo
// ---------------------------------------------------------------------------

/// A demo participant: a display name and a wallet address.
struct DemoOwner {
    name: String,
    address: Address,
}

fn demo_owner(i: usize) -> DemoOwner {
    let name = DEMO_NAMES
        .get(i)
        .map(|n| n.to_string())
        .unwrap_or_else(|| format!("member-{}", i + 1));
    DemoOwner {
        name,
        address: random_address(),
    }
}

fn random_address() -> Address {
    Address::from_bytes(rand::thread_rng().gen::<[u8; 20]>())
}

/// Runs the scripted walkthrough. Narration goes to stdout; structured
/// logs from the core library go to stderr.
async fn run_demo(args: DemoArgs) -> Result<()> {
    let format = if args.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    logging::init_logging("covault_console=info,covault_core=debug", format);

    if args.owners == 0 {
        bail!("a vault needs at least one owner");
    }
    if args.threshold < 1 || args.threshold > args.owners {
        bail!(
            "threshold {} is out of range for {} owner(s)",
            args.threshold,
            args.owners
        );
    }

    let owners: Vec<DemoOwner> = (0..args.owners).map(demo_owner).collect();

    println!(
        "Deploying a {}-of-{} vault on the in-memory chain...",
        args.threshold, args.owners
    );

    let chain = InMemoryChain::new();
    let provider = LocalIdentityProvider::new(Some(owners[0].address));
    let entries: Vec<ApproverEntry> = owners
        .iter()
        .map(|o| ApproverEntry::named(o.address.to_string(), o.name.clone()))
        .collect();

    let mut session = VaultSession::create(&chain, &provider, &entries, args.threshold).await?;
    chain.deposit(session.vault_address(), DEMO_FUNDING)?;

    println!("Vault deployed at {}", session.vault_address());
    print_owner_table(&session);

    // --- Walkthrough 1: add a new owner through the approval chain ---
    let newcomer = demo_owner(args.owners);
    println!(
        "\n[1] {} proposes adding {} ({}) as an owner",
        owners[0].name, newcomer.name, newcomer.address
    );
    let report = session
        .propose_add_owner(&newcomer.address.to_string(), Some(newcomer.name.clone()))
        .await?;
    print_step(&owners[0].name, &report);
    drive_to_execution(&mut session, &owners, report).await?;
    print_owner_table(&session);

    // --- Walkthrough 2: a stranger is turned away locally ---
    let stranger = random_address();
    println!("\n[2] A non-owner wallet {} tries to move funds", stranger);
    session.handle_identity_change(stranger);
    match session.propose_transfer(&random_address().to_string(), 1).await {
        Ok(_) => bail!("guard failed to stop a non-owner"),
        Err(e) => print_failure(&e),
    }

    // --- Walkthrough 3: revert, canonical executor, resume ---
    if args.threshold > 1 {
        println!(
            "\n[3] Changing the threshold, with an execution revert injected at the final step"
        );
        session.handle_identity_change(owners[0].address);
        let report = session.propose_change_threshold(args.threshold - 1).await?;
        print_step(&owners[0].name, &report);
        let hash = report.hash;

        chain.revert_next_execution(session.vault_address(), "simulated chain congestion")?;
        let executor = collect_until_revert(&mut session, &owners, hash).await?;

        println!(
            "    {} is rejected; the final approval slot belongs to {}:",
            owners[0].name, executor.name
        );
        session.handle_identity_change(owners[0].address);
        match session.advance(hash).await {
            Ok(_) => bail!("executor canonicalization failed"),
            Err(e) => print_failure(&e),
        }

        session.handle_identity_change(executor.address);
        let report = session.advance(hash).await?;
        print_step(&executor.name, &report);
        println!("    Threshold is now {}", session.threshold());
    } else {
        println!("\n[3] Threshold 1: every owner action signs and executes in a single call");
    }

    // --- Walkthrough 4: transfer funds out ---
    let recipient = random_address();
    println!("\n[4] Transferring 2500 to {}", recipient.short());
    session.handle_identity_change(owners[0].address);
    let report = session
        .propose_transfer(&recipient.to_string(), 2_500)
        .await?;
    print_step(&owners[0].name, &report);
    drive_to_execution(&mut session, &owners, report).await?;

    // --- Final state ---
    let summary = serde_json::json!({
        "vault": session.vault_address().to_string(),
        "threshold": session.threshold(),
        "owners": session
            .roster()
            .owners()
            .iter()
            .map(|o| serde_json::json!({
                "address": o.to_string(),
                "nickname": session.roster().nickname(o),
            }))
            .collect::<Vec<_>>(),
    });
    println!("\nFinal vault state:\n{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

/// Advances the action as each owner in turn until it executes. Owners
/// who already signed are skipped; everyone else signs, approves, or
/// executes exactly as the engine instructs.
async fn drive_to_execution(
    session: &mut VaultSession,
    owners: &[DemoOwner],
    mut report: ActionReport,
) -> Result<()> {
    let hash = report.hash;
    for owner in owners {
        if report.status == ActionStatus::Executed {
            break;
        }
        session.handle_identity_change(owner.address);
        match session.advance(hash).await {
            Ok(next) => {
                print_step(&owner.name, &next);
                report = next;
            }
            Err(SessionError::Rejected(_)) => continue,
            Err(e) => return Err(e.into()),
        }
    }
    if report.status != ActionStatus::Executed {
        bail!("walkthrough ended without executing the action");
    }
    Ok(())
}

/// Advances the action owner by owner until an injected revert fires,
/// returning the owner who holds the final approval slot.
async fn collect_until_revert<'a>(
    session: &mut VaultSession,
    owners: &'a [DemoOwner],
    hash: ActionHash,
) -> Result<&'a DemoOwner> {
    for owner in &owners[1..] {
        session.handle_identity_change(owner.address);
        match session.advance(hash).await {
            Ok(report) => print_step(&owner.name, &report),
            Err(SessionError::ExecutionReverted { reason }) => {
                println!(
                    "    {}'s signature landed, but execution reverted: {}",
                    owner.name, reason
                );
                return Ok(owner);
            }
            Err(e) => return Err(e.into()),
        }
    }
    bail!("revert was never reached");
}

fn print_step(name: &str, report: &ActionReport) {
    println!(
        "    {} → {:?} ({}/{} signatures, {})",
        name, report.decision, report.signatures, report.threshold, report.status
    );
}

fn print_failure(err: &SessionError) {
    println!("    rejected [{:?}]: {}", err.class(), err);
}

fn print_owner_table(session: &VaultSession) {
    println!("    Owners ({}):", session.roster().len());
    for owner in session.roster().owners() {
        println!(
            "      {:10} {}",
            session.roster().nickname(owner).unwrap_or("-"),
            owner
        );
    }
    println!("    Threshold: {}", session.threshold());
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

/// Validates an address input offline and prints the canonical form.
fn check_address(args: CheckArgs) -> Result<()> {
    match Address::parse(&args.address) {
        Ok(address) => {
            println!("{}", address);
            Ok(())
        }
        Err(e) => bail!("{}", e),
    }
}

// ---------------------------------------------------------------------------
// version
// ---------------------------------------------------------------------------

/// Prints version information to stdout.
fn print_version() {
    println!("covault {}", env!("CARGO_PKG_VERSION"));
}

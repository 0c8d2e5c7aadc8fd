//! Minimal operator CLI around the prime ledger.
//!
//! Every command reads its configuration from the `PL_*` environment
//! variables (see `prime_ledger::config`) and exits non-zero on failure.

use std::{env, thread, time::Duration};

use prime_ledger::{telemetry, LedgerConfig, PrimeLedger, ProofVerdict};

const DEFAULT_RUN_SECONDS: u64 = 60;

fn fatal(message: &str) -> ! {
    eprintln!("{message}");
    std::process::exit(1);
}

fn print_help() {
    println!("Usage: primeledger <command> [args]");
    println!("  run [seconds]           mine for a while, then print the ledger status");
    println!("  status                  print count and most recent prime as JSON");
    println!("  share                   print a whole-chain proof string");
    println!("  share-tail              print a proof string over the last 50 primes");
    println!("  verify <proof>          check a whole-chain proof string");
    println!("  verify-tail <proof>     check a tail proof string");
}

fn open_ledger(autostart: bool) -> PrimeLedger {
    let mut config = LedgerConfig::from_env();
    config.autostart = autostart;
    PrimeLedger::open(config).unwrap_or_else(|err| fatal(&format!("cannot open ledger: {err}")))
}

fn print_status(ledger: &PrimeLedger) {
    match serde_json::to_string_pretty(&ledger.status()) {
        Ok(json) => println!("{json}"),
        Err(err) => fatal(&format!("cannot encode status: {err}")),
    }
}

fn report_verdict(verdict: ProofVerdict) {
    match verdict {
        ProofVerdict::Valid => println!("Chain is valid."),
        ProofVerdict::Invalid(reason) => fatal(&format!("Chain verification failed: {reason}")),
        ProofVerdict::Malformed(reason) => fatal(&format!("Invalid shareable string: {reason}")),
    }
}

fn main() {
    if let Err(err) = telemetry::init_tracing() {
        eprintln!("tracing already initialised: {err}");
    }
    let mut args = env::args().skip(1);
    let command = args.next();
    match command.as_deref() {
        Some("run") => {
            let seconds = match args.next() {
                Some(raw) => raw
                    .parse::<u64>()
                    .unwrap_or_else(|_| fatal(&format!("invalid duration: {raw}"))),
                None => DEFAULT_RUN_SECONDS,
            };
            let ledger = open_ledger(true);
            thread::sleep(Duration::from_secs(seconds));
            ledger.shutdown();
            print_status(&ledger);
        }
        Some("status") => print_status(&open_ledger(false)),
        Some("share") => match open_ledger(false).share() {
            Ok(proof) => println!("{proof}"),
            Err(err) => fatal(&format!("Error generating shareable string: {err}")),
        },
        Some("share-tail") => match open_ledger(false).share_tail() {
            Ok(proof) => println!("{proof}"),
            Err(err) => fatal(&format!("Error generating shareable string: {err}")),
        },
        Some("verify") => {
            let proof = args
                .next()
                .unwrap_or_else(|| fatal("Usage: primeledger verify <proof>"));
            report_verdict(open_ledger(false).verify(&proof));
        }
        Some("verify-tail") => {
            let proof = args
                .next()
                .unwrap_or_else(|| fatal("Usage: primeledger verify-tail <proof>"));
            report_verdict(open_ledger(false).verify_tail(&proof));
        }
        Some("help") | Some("--help") | None => print_help(),
        Some(other) => {
            print_help();
            fatal(&format!("unknown command: {other}"));
        }
    }
}

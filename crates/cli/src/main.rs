//! `mikro-access` — inspect router access configuration.
//!
//! # Configuration
//!
//! The configuration root is taken from, in order:
//!
//! 1. `--config DIR`
//! 2. `MIKRO_CONFIG_DIR`
//! 3. `/etc/mikro-manager`
//!
//! # Exit codes
//!
//! - `0`: allowed / configuration clean
//! - `2`: denied
//! - `3`: configuration error
//! - `4`: router or operation not found
//! - `64`: invalid command line

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use mikro_auth::{IdentityContext, PermissionResolver};
use mikro_config::{ConfigSet, resolve_config_dir};
use mikro_core::ExitStatus;

#[derive(Parser, Debug)]
#[command(name = "mikro-access")]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration root (also: MIKRO_CONFIG_DIR)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit JSON log lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check whether a user may run an operation on a router
    Check {
        /// Module name, e.g. dns
        #[arg(short, long)]
        module: String,

        /// Operation name, e.g. list
        #[arg(short, long)]
        operation: String,

        /// Router name (defaults to the first configured router)
        #[arg(short, long)]
        router: Option<String>,

        /// Unix user to check (defaults to $USER)
        #[arg(short, long, env = "USER")]
        user: String,

        /// Unix group membership (repeatable)
        #[arg(short, long = "group")]
        groups: Vec<String>,

        /// Treat the identity as superuser
        #[arg(long)]
        superuser: bool,

        /// Print a JSON explanation of the decision
        #[arg(long)]
        explain: bool,
    },

    /// Load the configuration and report every problem found
    Validate,
}

/// Exit status for a command line clap refused. `--help` and `--version`
/// also arrive here and succeed.
fn usage_status(error: &clap::Error) -> ExitStatus {
    if error.use_stderr() {
        ExitStatus::Usage
    } else {
        ExitStatus::Success
    }
}

fn main() -> Result<ExitCode> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(error) => {
            error.print()?;
            return Ok(ExitCode::from(usage_status(&error).code() as u8));
        }
    };
    if args.json_logs {
        mikro_observability::init_json();
    } else {
        mikro_observability::init();
    }

    let root = resolve_config_dir(args.config.as_deref());
    let (config, report) = ConfigSet::load(&root);

    let status = match args.command {
        Command::Validate => {
            for issue in &report.issues {
                println!("{issue}");
            }
            if report.is_clean() {
                println!(
                    "{}: {} routers, {} groups, {} modules, {} users",
                    root.display(),
                    config.routers.len(),
                    config.groups.len(),
                    config.modules.len(),
                    config.users.len()
                );
                ExitStatus::Success
            } else {
                ExitStatus::ConfigError
            }
        }
        Command::Check {
            module,
            operation,
            router,
            user,
            groups,
            superuser,
            explain,
        } => {
            let mut identity = IdentityContext::new(user).with_groups(groups);
            identity.superuser = superuser;
            let resolver = PermissionResolver::new(&config);

            let decision = if explain {
                let explanation =
                    resolver.explain(&identity, &module, &operation, router.as_deref());
                println!("{}", explanation.to_json()?);
                explanation.into_decision()
            } else {
                resolver.authorize(&identity, &module, &operation, router.as_deref())
            };
            match (decision.denial(), decision.access()) {
                (Some(reason), _) => eprintln!("Permission denied: {reason}"),
                (None, Some(level)) => {
                    let router = decision
                        .router()
                        .map(ToString::to_string)
                        .unwrap_or_else(|| "-".to_string());
                    println!("allowed: {module}:{operation} on {router} ({level})");
                }
                (None, None) => {}
            }
            decision.exit_status()
        }
    };

    tracing::debug!(code = status.code(), "exiting");
    Ok(ExitCode::from(status.code() as u8))
}

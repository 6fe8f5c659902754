//! CLI subcommands and their execution.

use crate::app::App;
use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Subcommand;
use std::fmt::Write as _;
use tiergate_entitlement::UpdateOptions;
use tiergate_store::MembershipStore;
use tiergate_types::{CustomLimits, Limit, MembershipStatus, ResourceType, UserId};

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List registered modules and discovery errors
    Modules {
        /// Only modules this user may access
        #[arg(long)]
        user: Option<i64>,
    },

    /// Read or change memberships
    #[command(subcommand)]
    Tier(TierCommand),

    /// Check whether a user is under the limit for a resource
    Check { user: i64, resource: String },

    /// Check whether a user may use a module
    Access { user: i64, module: String },

    /// Record resource usage for a user
    Record {
        user: i64,
        resource: String,
        #[arg(short, long, default_value = "1")]
        amount: u64,
        /// Refuse instead of overshooting the limit
        #[arg(long)]
        strict: bool,
    },

    /// Show usage against limits for the current month
    Usage {
        user: i64,
        #[arg(long)]
        json: bool,
    },

    /// Expire memberships whose expiry has passed
    Sweep {
        /// Treat this RFC 3339 instant as now
        #[arg(long)]
        now: Option<String>,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum TierCommand {
    /// Show a user's membership
    Get { user: i64 },

    /// Assign a tier, provisioning the membership if needed
    Set {
        user: i64,
        tier: String,
        /// RFC 3339 expiry instant
        #[arg(long)]
        expires: Option<String>,
        /// Per-user override as `resource=limit`; repeatable
        #[arg(long = "limit")]
        limits: Vec<String>,
    },

    /// Change a membership's status (billing events)
    Status { user: i64, status: String },

    /// Create the default free membership if the user has none
    Provision { user: i64 },
}

/// Parses `resource=limit`, e.g. `exports=5` or `episodes=unlimited`.
pub fn parse_limit_override(raw: &str) -> Result<(ResourceType, Limit)> {
    let (resource, limit) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected resource=limit, got {raw:?}"))?;
    let resource: ResourceType = resource
        .parse()
        .with_context(|| format!("invalid resource in {raw:?}"))?;
    let limit: Limit = limit
        .trim()
        .parse()
        .with_context(|| format!("invalid limit in {raw:?}"))?;
    Ok((resource, limit))
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("invalid RFC 3339 instant {raw:?}"))?
        .with_timezone(&Utc))
}

fn parse_resource(raw: &str) -> Result<ResourceType> {
    raw.parse()
        .with_context(|| format!("invalid resource type {raw:?}"))
}

/// Runs one command and returns the text to print.
pub fn run(app: &App, command: Command) -> Result<String> {
    let engine = app.engine.scope();
    let mut out = String::new();

    match command {
        Command::Modules { user } => {
            let modules = match user {
                Some(id) => engine.modules_for_user(UserId::new(id)),
                None => app.registry.list_all(),
            };
            for module in &modules {
                let d = &module.descriptor;
                writeln!(
                    out,
                    "{:<20} {:<10} {:<8} {:<9} {}",
                    d.id,
                    d.version,
                    d.min_tier.as_str(),
                    if d.enabled { "enabled" } else { "disabled" },
                    module.source
                )?;
            }
            if modules.is_empty() {
                writeln!(out, "no modules")?;
            }
            if user.is_none() {
                for error in app.registry.errors() {
                    writeln!(out, "error: {error}")?;
                }
            }
        }

        Command::Tier(TierCommand::Get { user }) => {
            let user = UserId::new(user);
            match app.store.get_membership(user)? {
                Some(record) => {
                    writeln!(out, "user:    {}", record.user_id)?;
                    writeln!(out, "tier:    {}", record.tier)?;
                    writeln!(out, "status:  {}", record.status.as_str())?;
                    writeln!(out, "since:   {}", record.starts_at.to_rfc3339())?;
                    match record.expires_at {
                        Some(at) => writeln!(out, "expires: {}", at.to_rfc3339())?,
                        None => writeln!(out, "expires: never")?,
                    }
                    for (resource, limit) in &record.custom_limits {
                        writeln!(out, "limit:   {resource}={limit}")?;
                    }
                }
                None => writeln!(out, "user {user} has no membership (tier: free)")?,
            }
        }

        Command::Tier(TierCommand::Set {
            user,
            tier,
            expires,
            limits,
        }) => {
            let user = UserId::new(user);
            let mut options = UpdateOptions::default();
            if let Some(raw) = expires {
                options.expires_at = Some(parse_instant(&raw)?);
            }
            if !limits.is_empty() {
                let parsed = limits
                    .iter()
                    .map(|raw| parse_limit_override(raw))
                    .collect::<Result<CustomLimits>>()?;
                options.custom_limits = Some(parsed);
            }
            engine.update_tier(user, &tier, options)?;
            writeln!(out, "user {user} is now {}", engine.tier(user))?;
        }

        Command::Tier(TierCommand::Status { user, status }) => {
            let user = UserId::new(user);
            let status: MembershipStatus = status
                .parse()
                .with_context(|| format!("invalid status {status:?}"))?;
            engine.set_status(user, status)?;
            writeln!(out, "user {user} is now {}", status.as_str())?;
        }

        Command::Tier(TierCommand::Provision { user }) => {
            let user = UserId::new(user);
            if engine.provision_default(user)? {
                writeln!(out, "provisioned free membership for user {user}")?;
            } else {
                writeln!(out, "user {user} already has a membership")?;
            }
        }

        Command::Check { user, resource } => {
            let user = UserId::new(user);
            let resource = parse_resource(&resource)?;
            let allowed = engine.check_usage_limit(&resource, user)?;
            let used = engine.current_usage(&resource, user)?;
            let effective = engine.effective_limit(&resource, user)?;
            let limit = effective
                .limit
                .map_or_else(|| "none".to_string(), |l| l.to_string());
            writeln!(
                out,
                "{}: {resource} used {used} of {limit}",
                if allowed { "allowed" } else { "denied" }
            )?;
        }

        Command::Access { user, module } => {
            let user = UserId::new(user);
            if !app.registry.contains(&module) {
                bail!("module {module:?} is not registered");
            }
            let allowed = engine.can_access_module(&module, user);
            writeln!(
                out,
                "{}: {module} for user {user} ({})",
                if allowed { "allowed" } else { "denied" },
                engine.tier(user)
            )?;
        }

        Command::Record {
            user,
            resource,
            amount,
            strict,
        } => {
            let user = UserId::new(user);
            let resource = parse_resource(&resource)?;
            if strict {
                if !engine.try_consume(&resource, user, amount)? {
                    bail!("limit reached for {resource}; nothing recorded");
                }
            } else {
                engine.record_consumption(&resource, user, amount)?;
            }
            let used = engine.current_usage(&resource, user)?;
            writeln!(out, "recorded {amount} {resource} ({used} used this period)")?;
        }

        Command::Usage { user, json } => {
            let user = UserId::new(user);
            let report = engine.usage_report(user)?;
            if json {
                out.push_str(&serde_json::to_string_pretty(&report)?);
                out.push('\n');
            } else {
                writeln!(out, "period {} ({})", engine.current_period(), engine.tier(user))?;
                for line in &report {
                    let limit = line.limit.map_or_else(|| "-".to_string(), |l| l.to_string());
                    writeln!(
                        out,
                        "{:<16} {:>6} / {:<10} {}",
                        line.resource.as_str(),
                        line.used,
                        limit,
                        if line.allowed { "ok" } else { "at limit" }
                    )?;
                }
            }
        }

        Command::Sweep { now } => {
            let now = match now {
                Some(raw) => parse_instant(&raw)?,
                None => Utc::now(),
            };
            let expired = engine.sweep_expirations(now)?;
            writeln!(out, "expired {expired} membership(s)")?;
        }
    }

    Ok(out)
}

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use vigil_core::enums::{OrgRole, UserRole};

/// Top-level CLI parser for the `vigil` binary.
#[derive(Debug, Parser)]
#[command(name = "vigil", version, about = "Vigil - audit-run workflow service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Explicit config file, layered above ./vigil.toml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the HTTP API.
    Serve(ServeArgs),
    /// Manage users.
    User {
        #[command(subcommand)]
        action: UserCommands,
    },
    /// Manage organizations.
    Org {
        #[command(subcommand)]
        action: OrgCommands,
    },
    /// Manage organization membership.
    Member {
        #[command(subcommand)]
        action: MemberCommands,
    },
    /// Mint and revoke bearer sessions.
    Session {
        #[command(subcommand)]
        action: SessionCommands,
    },
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Override `server.bind`.
    #[arg(long)]
    pub bind: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum UserCommands {
    /// Create a user.
    Create {
        email: String,
        #[arg(long)]
        name: Option<String>,
        /// Global role: USER or SUPER_ADMIN.
        #[arg(long, default_value = "USER", value_parser = parse_enum::<UserRole>)]
        role: UserRole,
    },
}

#[derive(Debug, Subcommand)]
pub enum OrgCommands {
    /// Create an organization.
    Create {
        name: String,
        /// Lowercase letters, digits, and dashes.
        #[arg(long)]
        slug: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum MemberCommands {
    /// Add a user to an organization, or change their role.
    Add {
        #[arg(long)]
        org: String,
        #[arg(long)]
        user: String,
        /// OWNER, ADMIN, AUDIT_MANAGER, COMPLIANCE_OFFICER, AUDITOR, CONTRIBUTOR, or VIEWER.
        #[arg(long, value_parser = parse_enum::<OrgRole>)]
        role: OrgRole,
    },
    /// List members of an organization.
    List {
        #[arg(long)]
        org: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum SessionCommands {
    /// Mint a bearer token for a user.
    Issue {
        #[arg(long)]
        user: String,
        /// Lifetime in hours (default: `auth.session_ttl_hours`).
        #[arg(long)]
        ttl_hours: Option<i64>,
    },
    /// Revoke a bearer token.
    Revoke { token: String },
    /// Delete expired sessions.
    Purge,
}

/// Parse a `SCREAMING_SNAKE_CASE` enum value, case-insensitively.
fn parse_enum<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, String> {
    let normalized = raw.trim().to_uppercase().replace('-', "_");
    serde_json::from_value(serde_json::Value::String(normalized))
        .map_err(|_| format!("unknown value '{raw}'"))
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn clap_command_tree_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn member_add_parses_role_case_insensitively() {
        let cli = Cli::try_parse_from([
            "vigil",
            "member",
            "add",
            "--org",
            "org-1",
            "--user",
            "usr-1",
            "--role",
            "audit-manager",
        ])
        .expect("cli should parse");

        match cli.command {
            Commands::Member {
                action: MemberCommands::Add { role, .. },
            } => assert_eq!(role, OrgRole::AuditManager),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        let result = Cli::try_parse_from([
            "vigil", "member", "add", "--org", "o", "--user", "u", "--role", "janitor",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from(["vigil", "serve", "--bind", "0.0.0.0:9000", "--verbose"])
            .expect("cli should parse");
        assert!(cli.verbose);
        match cli.command {
            Commands::Serve(args) => assert_eq!(args.bind.as_deref(), Some("0.0.0.0:9000")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn user_role_defaults_to_user() {
        let cli = Cli::try_parse_from(["vigil", "user", "create", "a@b.test"]).unwrap();
        match cli.command {
            Commands::User {
                action: UserCommands::Create { role, .. },
            } => assert_eq!(role, UserRole::User),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}

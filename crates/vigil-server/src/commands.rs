//! Operator commands. These run without an HTTP caller; whoever holds the
//! database file is trusted.

use anyhow::Context;
use chrono::TimeDelta;
use serde::Serialize;
use serde_json::json;
use vigil_config::VigilConfig;
use vigil_db::service::VigilService;

use crate::cli::{MemberCommands, OrgCommands, SessionCommands, UserCommands};

fn output<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn open(config: &VigilConfig) -> anyhow::Result<VigilService> {
    VigilService::from_config(&config.database, &config.general)
        .await
        .with_context(|| format!("failed to open database at {}", config.database.path))
}

pub async fn user(action: UserCommands, config: &VigilConfig) -> anyhow::Result<()> {
    let svc = open(config).await?;
    match action {
        UserCommands::Create { email, name, role } => {
            let user = svc.create_user(&email, name.as_deref(), role).await?;
            output(&user)
        }
    }
}

pub async fn org(action: OrgCommands, config: &VigilConfig) -> anyhow::Result<()> {
    let svc = open(config).await?;
    match action {
        OrgCommands::Create { name, slug } => {
            let org = svc.create_organization(&name, &slug).await?;
            output(&org)
        }
    }
}

pub async fn member(action: MemberCommands, config: &VigilConfig) -> anyhow::Result<()> {
    let svc = open(config).await?;
    match action {
        MemberCommands::Add { org, user, role } => {
            svc.get_organization(&org).await?;
            svc.get_user(&user).await?;
            let membership = svc.add_member(&org, &user, role).await?;
            output(&membership)
        }
        MemberCommands::List { org } => {
            svc.get_organization(&org).await?;
            output(&svc.list_members(&org).await?)
        }
    }
}

pub async fn session(action: SessionCommands, config: &VigilConfig) -> anyhow::Result<()> {
    let svc = open(config).await?;
    match action {
        SessionCommands::Issue { user, ttl_hours } => {
            let hours = ttl_hours.unwrap_or(config.auth.session_ttl_hours);
            let ttl = TimeDelta::try_hours(hours)
                .with_context(|| format!("ttl of {hours} hours is out of range"))?;
            let token = svc.issue_session(&user, ttl).await?;
            output(&json!({ "userId": user, "token": token, "ttlHours": hours }))
        }
        SessionCommands::Revoke { token } => {
            let revoked = svc.revoke_session(&token).await?;
            output(&json!({ "revoked": revoked }))
        }
        SessionCommands::Purge => {
            let purged = svc.purge_expired_sessions().await?;
            output(&json!({ "purged": purged }))
        }
    }
}

//! Mint bearer tokens for the issuer API
//!
//! Usage: mint-token --kind org --subject <uuid> [--hours 24]

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use issuer_service::auth::{issue_token, SubjectKind};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    User,
    Org,
}

#[derive(Parser, Debug)]
#[command(name = "mint-token", about = "Mint a bearer token for the issuer API")]
struct Args {
    /// Whether the token identifies an end user or an organization
    #[arg(long, value_enum)]
    kind: Kind,

    /// Subject id; a random one is generated when omitted
    #[arg(long)]
    subject: Option<Uuid>,

    /// Token lifetime in hours
    #[arg(long, default_value_t = 24)]
    hours: i64,

    /// Signing secret; defaults to JWT_SECRET from the environment
    #[arg(long, env = "JWT_SECRET")]
    secret: String,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let subject = args.subject.unwrap_or_else(Uuid::new_v4);
    let kind = match args.kind {
        Kind::User => SubjectKind::User,
        Kind::Org => SubjectKind::Org,
    };

    let token = issue_token(
        &args.secret,
        subject,
        kind,
        chrono::Duration::hours(args.hours),
    )
    .context("Failed to sign token")?;

    eprintln!("subject: {} ({})", subject, kind.as_str());
    println!("{}", token);
    Ok(())
}

use clap::{Parser, Subcommand};
use serde_json::json;
use uuid::Uuid;

use crate::auth::{generate_jwt, validate_jwt, Claims};
use crate::config;

#[derive(Parser)]
#[command(name = "scoped")]
#[command(about = "Token utilities for the scoped CRUD API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Mint a bearer token signed with JWT_SECRET")]
    Token {
        #[arg(long, help = "User id to embed as the subject (random when omitted)")]
        user: Option<Uuid>,

        #[arg(long, help = "Hours until expiry (defaults to the configured expiry)")]
        hours: Option<u64>,
    },

    #[command(about = "Verify a bearer token and print its subject")]
    Verify {
        #[arg(help = "Token to verify")]
        token: String,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let security = &config::config().security;

    match cli.command {
        Commands::Token { user, hours } => {
            let user = user.unwrap_or_else(Uuid::new_v4);
            let claims = Claims::new(user, hours.unwrap_or(security.jwt_expiry_hours))?;
            let token = generate_jwt(&claims, &security.jwt_secret)?;

            if cli.json {
                println!("{}", json!({ "user_id": user, "expires_at": claims.exp, "token": token }));
            } else {
                println!("{}", token);
            }
        }
        Commands::Verify { token } => {
            let claims = validate_jwt(token.trim(), &security.jwt_secret)?;

            if cli.json {
                println!("{}", serde_json::to_string(&claims)?);
            } else {
                println!("user_id: {}", claims.sub);
                println!("expires: {}", claims.exp);
            }
        }
    }

    Ok(())
}

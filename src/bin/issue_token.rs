//! Mint a bearer token for a circulation desk or reporting client.
//!
//! Usage: issue-token <subject> [librarian|viewer] [hours]

use anyhow::{bail, Context};

use library_circulation::{
    config::AppConfig,
    models::{StaffClaims, StaffRole},
};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut args = std::env::args().skip(1);
    let Some(subject) = args.next() else {
        bail!("usage: issue-token <subject> [librarian|viewer] [hours]");
    };
    let role: StaffRole = match args.next() {
        Some(role) => role.parse().map_err(anyhow::Error::msg)?,
        None => StaffRole::Librarian,
    };

    let config = AppConfig::load().context("loading configuration")?;
    let hours = match args.next() {
        Some(hours) => hours.parse().context("hours must be a whole number")?,
        None => config.auth.jwt_expiration_hours,
    };

    let token = StaffClaims::new(subject, role, hours)
        .create_token(&config.auth.jwt_secret)
        .context("signing token")?;

    println!("{}", token);
    Ok(())
}

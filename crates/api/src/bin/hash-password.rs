#!/usr/bin/env cargo
//! Password hashing utility for Gluten
//!
//! Generates Argon2id password hashes for the `users.password_hash` column
//! or a `USERS_FILE` line.
//! The hash is also folded into every auth token, so replacing it revokes
//! the user's outstanding tokens.
//!
//! Usage:
//!   cargo run --bin hash-password
//!   cargo run --bin hash-password "MySecurePassword123!"

use std::env;
use std::io::{self, Write};

use gluten_api::auth::hash_password;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let password = if let Some(pwd) = env::args().nth(1) {
        pwd
    } else {
        // Read from stdin so the password stays out of the process list
        print!("Enter password to hash: ");
        io::stdout().flush()?;

        let mut password = String::new();
        io::stdin().read_line(&mut password)?;
        password.trim().to_string()
    };

    if password.is_empty() {
        eprintln!("Error: Password cannot be empty");
        std::process::exit(1);
    }

    let password_hash = hash_password(&password)?;

    println!("{}", password_hash);
    eprintln!();
    eprintln!("Example SQL:");
    eprintln!(
        "INSERT INTO users (username, password_hash) VALUES ('alice', '{}');",
        password_hash
    );
    eprintln!();
    eprintln!("Example USERS_FILE line:");
    eprintln!("alice:{}", password_hash);

    Ok(())
}

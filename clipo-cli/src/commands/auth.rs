//! Login, register, logout and whoami

use std::env;

use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use dialoguer::{Input, Password};
use serde_json::json;

use clipo_core::domain::{AuthMode, Credentials, Registration};
use clipo_core::services::auth::failure_message;
use clipo_core::services::{AuthOutcome, LogEvent};

use super::{get_context, log_event};
use crate::output;

fn value_or_prompt(value: Option<String>, prompt: &str) -> Result<String> {
    match value {
        Some(v) => Ok(v),
        None => Ok(Input::<String>::new().with_prompt(prompt).interact_text()?),
    }
}

/// --password flag, then CLIPO_PASSWORD, then a hidden prompt
fn password_or_prompt(value: Option<String>) -> Result<String> {
    if let Some(p) = value {
        return Ok(p);
    }
    if let Ok(p) = env::var("CLIPO_PASSWORD") {
        return Ok(p);
    }
    Ok(Password::new().with_prompt("Password").interact()?)
}

fn report(mode: AuthMode, result: clipo_core::domain::result::Result<AuthOutcome>) -> Result<()> {
    match result {
        Ok(outcome) => {
            let event = match (&outcome, mode) {
                (AuthOutcome::Registered, _) => "registration_succeeded",
                (_, AuthMode::Login) => "login_succeeded",
                (_, AuthMode::Register) => "registration_signed_in",
            };
            log_event(LogEvent::new(event));
            output::success(&outcome.message(mode));
            if let AuthOutcome::SignedIn { identity } = &outcome {
                println!("Signed in as {}", output::identity_line(identity.as_ref()));
            }
            Ok(())
        }
        Err(e) => {
            let message = failure_message(mode, &e);
            log_event(
                LogEvent::new(match mode {
                    AuthMode::Login => "login_failed",
                    AuthMode::Register => "registration_failed",
                })
                .with_error(&message),
            );
            anyhow::bail!(message)
        }
    }
}

pub fn login(username: Option<String>, password: Option<String>) -> Result<()> {
    let ctx = get_context()?;
    let credentials = Credentials::new(value_or_prompt(username, "Username")?, password_or_prompt(password)?);
    report(AuthMode::Login, ctx.auth_service.login(&credentials))
}

pub fn register(username: Option<String>, email: Option<String>, password: Option<String>) -> Result<()> {
    let ctx = get_context()?;
    let registration = Registration::new(
        value_or_prompt(username, "Username")?,
        value_or_prompt(email, "Email")?,
        password_or_prompt(password)?,
    );
    report(AuthMode::Register, ctx.auth_service.register(&registration))
}

pub fn logout() -> Result<()> {
    let ctx = get_context()?;
    if !ctx.session.is_authenticated() {
        output::info("Not logged in.");
        return Ok(());
    }
    ctx.auth_service.logout()?;
    log_event(LogEvent::new("logged_out"));
    output::success("Logged out.");
    Ok(())
}

pub fn whoami(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let identity = ctx.session.identity();
    let authenticated = ctx.session.is_authenticated();

    if json {
        let value = json!({
            "authenticated": authenticated,
            "username": identity.as_ref().and_then(|i| i.sub.clone()),
            "expiresAt": identity.as_ref().and_then(|i| i.expires_at()).map(|t| t.to_rfc3339()),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    if !authenticated {
        println!("Not logged in.");
        return Ok(());
    }
    println!("{}", output::identity_line(identity.as_ref()).bold());
    match identity.as_ref().and_then(|i| i.expires_at()) {
        Some(exp) if exp <= Utc::now() => output::warning("Session expired. Run `clipo login` to sign in again."),
        Some(exp) => println!("Session valid until {}", exp.format("%Y-%m-%d %H:%M UTC")),
        None if identity.is_none() => output::warning("Session token could not be decoded."),
        None => {}
    }
    Ok(())
}

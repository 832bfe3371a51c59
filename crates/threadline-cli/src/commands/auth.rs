//! Authentication commands.

use super::{report_api_error, AppContext};
use crate::output::{self, OutputFormat};
use anyhow::Result;
use auth_session::{AuthError, AuthUser, Credentials, Registration};
use std::io::{self, Write};

/// Sign in with email and password.
pub async fn login(app: &AppContext, format: &OutputFormat) -> Result<()> {
    if app.session.is_signed_in() {
        let who = app
            .session
            .auth_user()
            .map(|user| user.email)
            .unwrap_or_else(|| "current user".to_string());
        output::print_success(&format!("Already signed in as {}", who), format);
        return Ok(());
    }

    let email = prompt("Email: ")?;
    if email.is_empty() {
        output::print_error("Email is required", format);
        return Ok(());
    }

    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        output::print_error("Password is required", format);
        return Ok(());
    }

    output::print_progress("Signing in...", format);
    let result = app
        .session
        .sign_in(&Credentials::new(email.clone(), password))
        .await;
    finish_sign_in(app, result.map(|_| ()), &email, format).await
}

/// Create an account and sign in.
pub async fn register(app: &AppContext, format: &OutputFormat) -> Result<()> {
    let email = prompt("Email: ")?;
    if email.is_empty() {
        output::print_error("Email is required", format);
        return Ok(());
    }

    let full_name = prompt("Full name: ")?;
    if full_name.is_empty() {
        output::print_error("Full name is required", format);
        return Ok(());
    }

    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        output::print_error("Password is required", format);
        return Ok(());
    }

    output::print_progress("Creating account...", format);
    let result = app
        .session
        .sign_up(&Registration::new(email.clone(), password, full_name))
        .await;
    finish_sign_in(app, result.map(|_| ()), &email, format).await
}

async fn finish_sign_in(
    app: &AppContext,
    result: Result<(), AuthError>,
    email: &str,
    format: &OutputFormat,
) -> Result<()> {
    match result {
        Ok(()) => {}
        Err(AuthError::InvalidCredentials(reason)) => {
            output::print_error(&format!("Sign-in failed: {}", reason), format);
            return Ok(());
        }
        Err(AuthError::Api(e)) => {
            report_api_error(&e, format);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    // The token is stored; the profile is a separate call.
    let display = match app.session.fetch_user_profile().await {
        Ok(Some(user)) => display_name(&user),
        Ok(None) => email.to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "Signed in but profile fetch failed");
            email.to_string()
        }
    };
    output::print_success(&format!("Signed in as {}", display), format);
    Ok(())
}

/// Sign out and clear the stored session.
pub async fn logout(app: &AppContext, format: &OutputFormat) -> Result<()> {
    app.session.sign_out()?;
    output::print_success("Signed out", format);
    Ok(())
}

/// Show the auth state.
pub async fn status(app: &AppContext, format: &OutputFormat) -> Result<()> {
    let state = app.session.state();
    let user = app.session.auth_user();

    match format {
        OutputFormat::Text => {
            output::print_row("API", &app.config.api_base_url);
            output::print_row("Auth", &state.to_string());
            if let Some(user) = &user {
                output::print_row("User ID", &user.id.to_string());
                output::print_row("Email", &user.email);
            }
        }
        OutputFormat::Json => {
            output::print_json(&serde_json::json!({
                "api_base_url": app.config.api_base_url,
                "state": state,
                "signed_in": state.is_signed_in(),
                "user_id": user.as_ref().map(|u| u.id),
                "email": user.as_ref().map(|u| u.email.clone()),
            }));
        }
    }
    Ok(())
}

/// Show the signed-in user's profile.
pub async fn profile(app: &AppContext, format: &OutputFormat) -> Result<()> {
    if !app.require_signed_in(format) {
        return Ok(());
    }

    let user = match app.session.fetch_user_profile().await {
        Ok(Some(user)) => user,
        Ok(None) => {
            output::print_error("Not signed in. Run 'threadline login' first", format);
            return Ok(());
        }
        Err(AuthError::Api(e)) => {
            report_api_error(&e, format);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    match format {
        OutputFormat::Text => {
            output::print_heading("Profile");
            output::print_row("User ID", &user.id.to_string());
            output::print_row("Email", &user.email);
            output::print_row(
                "Name",
                user.profile.full_name.as_deref().unwrap_or("(not set)"),
            );
            if let Some(avatar) = user.profile.avatar.as_deref().filter(|a| !a.is_empty()) {
                output::print_row("Avatar", avatar);
            }
        }
        OutputFormat::Json => output::print_json(&user),
    }
    Ok(())
}

fn display_name(user: &AuthUser) -> String {
    match user.profile.full_name.as_deref() {
        Some(name) if !name.is_empty() => format!("{} <{}>", name, user.email),
        _ => user.email.clone(),
    }
}

fn prompt(label: &str) -> Result<String> {
    eprint!("{}", label);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

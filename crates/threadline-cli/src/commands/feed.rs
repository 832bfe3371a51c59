//! Feed and notification commands.

use super::{report_api_error, AppContext};
use crate::output::{self, OutputFormat};
use anyhow::Result;

/// List one page of posts.
pub async fn feed(app: &AppContext, limit: u32, offset: u32, format: &OutputFormat) -> Result<()> {
    if !app.require_signed_in(format) {
        return Ok(());
    }

    let page = match app.api.fetch_posts(limit, offset).await {
        Ok(page) => page,
        Err(e) => {
            report_api_error(&e, format);
            return Ok(());
        }
    };

    match format {
        OutputFormat::Text => {
            if page.posts.is_empty() {
                println!("No posts.");
            }
            for post in &page.posts {
                let when = post
                    .created_at
                    .as_deref()
                    .map(output::format_timestamp)
                    .unwrap_or_default();
                println!("#{:<6} {:<40} {}", post.id, post.title, when);
            }
            if page.has_more {
                println!(
                    "\nMore posts available: threadline feed --offset {}",
                    offset + limit
                );
            }
        }
        OutputFormat::Json => output::print_json(&page),
    }
    Ok(())
}

/// List notifications, optionally marking them all read afterwards.
pub async fn notifications(
    app: &AppContext,
    mark_all_read: bool,
    format: &OutputFormat,
) -> Result<()> {
    if !app.require_signed_in(format) {
        return Ok(());
    }

    let notifications = match app.api.notifications().await {
        Ok(notifications) => notifications,
        Err(e) => {
            report_api_error(&e, format);
            return Ok(());
        }
    };

    match format {
        OutputFormat::Text => {
            if notifications.is_empty() {
                println!("No notifications.");
            }
            for notification in &notifications {
                let marker = if notification.is_read { " " } else { "*" };
                let when = notification
                    .created_at
                    .as_deref()
                    .map(output::format_timestamp)
                    .unwrap_or_default();
                println!(
                    "{} {:<50} {}",
                    marker,
                    notification.message.as_deref().unwrap_or("(no message)"),
                    when
                );
            }
        }
        OutputFormat::Json => output::print_json(&notifications),
    }

    if mark_all_read && notifications.iter().any(|n| !n.is_read) {
        match app.api.mark_all_notifications_read().await {
            Ok(_) => output::print_success("All notifications marked as read", format),
            Err(e) => report_api_error(&e, format),
        }
    }
    Ok(())
}

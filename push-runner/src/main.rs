use anyhow::{anyhow, Result};
use push_core::{Config, PushContext};
use push_delivery::{resolve_recipients, FirebaseNotifier, NotificationBuilder};
use std::env;
use tracing;
use tracing_subscriber;

const USAGE: &str = "usage: push-runner <topic:NAME | users:ID,ID,...> <title> <body> [icon-url]";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let (target, title, body) = match args.as_slice() {
        [target, title, body, ..] => (target.as_str(), title.as_str(), body.as_str()),
        _ => return Err(anyhow!(USAGE)),
    };

    tracing::info!("Starting firebase push runner");

    let config = Config::from_env();
    let ctx = PushContext::new(config).await?;
    let notifier = FirebaseNotifier::from_context(&ctx)?;

    tracing::info!("Push context initialized");

    let mut builder = NotificationBuilder::new().title(title).body(body);
    if let Some(icon) = args.get(3) {
        builder = builder.icon(icon.as_str());
    }

    builder = if let Some(topic) = target.strip_prefix("topic:") {
        builder.topic(topic)
    } else if let Some(ids) = target.strip_prefix("users:") {
        let user_ids = ids
            .split(',')
            .filter(|id| !id.trim().is_empty())
            .map(|id| id.trim().parse::<i64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow!("Invalid user id: {}", e))?;
        let store = ctx.notification_store();
        builder.users(resolve_recipients(&store, &user_ids).await?)
    } else {
        return Err(anyhow!(USAGE));
    };

    let request = builder.build();
    if notifier.push(&request).await? {
        tracing::info!("Notification delivered");
        Ok(())
    } else {
        Err(anyhow!("Notification delivery failed"))
    }
}

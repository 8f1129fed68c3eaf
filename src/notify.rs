use crate::keyboards;
use anyhow::Result;
use async_trait::async_trait;
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use tracing::{instrument, warn};

/// Outbound messages produced outside of an update handler.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a finished report with the result keyboard.
    async fn deliver_result(&self, chat_id: i64, report: &str, fact_check_id: i64) -> Result<()>;
    async fn deliver_failure(&self, chat_id: i64, message: &str) -> Result<()>;
    /// Best effort: a failure for one admin does not stop the others.
    async fn notify_admins(&self, message: &str);
}

#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
    admin_user_ids: Vec<i64>,
}

impl TelegramNotifier {
    pub fn new(bot: Bot, admin_user_ids: Vec<i64>) -> Self {
        Self {
            bot,
            admin_user_ids,
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    #[instrument(skip(self, report))]
    async fn deliver_result(&self, chat_id: i64, report: &str, fact_check_id: i64) -> Result<()> {
        self.bot
            .send_message(ChatId(chat_id), report)
            .reply_markup(keyboards::result(fact_check_id))
            .await?;
        Ok(())
    }

    #[instrument(skip(self, message))]
    async fn deliver_failure(&self, chat_id: i64, message: &str) -> Result<()> {
        self.bot.send_message(ChatId(chat_id), message).await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn notify_admins(&self, message: &str) {
        for admin in &self.admin_user_ids {
            if let Err(err) = self.bot.send_message(ChatId(*admin), message).await {
                warn!(?err, admin, "failed to notify admin");
            }
        }
    }
}

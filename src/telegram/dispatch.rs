//! Routing of incoming updates to the command handler.

use std::sync::Arc;

use teloxide::RequestError;
use teloxide::dispatching::{DefaultKey, Dispatcher, ShutdownToken, UpdateFilterExt};
use teloxide::dptree;
use teloxide::prelude::*;
use tracing::{debug, info, warn};

use super::TelegramBot;
use crate::commands::{CommandHandler, menu_hint};
use crate::reconciler::Oracle;

/// Long-polling front end of the bot.
pub struct UpdateRouter {
    dispatcher: Dispatcher<Bot, RequestError, DefaultKey>,
}

impl UpdateRouter {
    /// Wires message and callback endpoints to the given handler.
    #[must_use]
    pub fn new<O: Oracle + 'static>(telegram: Arc<TelegramBot>, handler: Arc<CommandHandler<O>>) -> Self {
        let schema = dptree::entry()
            .branch(Update::filter_message().endpoint(on_message::<O>))
            .branch(Update::filter_callback_query().endpoint(on_callback));

        let dispatcher = Dispatcher::builder(telegram.inner().clone(), schema)
            .dependencies(dptree::deps![telegram, handler])
            .default_handler(|_| async {
                debug!("Ignoring unsupported update");
            })
            .build();

        Self { dispatcher }
    }

    /// Token that stops [`run`](Self::run) from another task.
    #[must_use]
    pub fn shutdown_token(&self) -> ShutdownToken {
        self.dispatcher.shutdown_token()
    }

    /// Polls for updates until shut down.
    pub async fn run(mut self) {
        info!("Listening for commands");
        self.dispatcher.dispatch().await;
        info!("Update dispatcher stopped");
    }
}

async fn on_message<O: Oracle + 'static>(
    msg: Message,
    telegram: Arc<TelegramBot>,
    handler: Arc<CommandHandler<O>>,
) -> ResponseResult<()> {
    let (Some(text), Some(user)) = (msg.text(), msg.from.as_ref()) else {
        return Ok(());
    };
    let Ok(sender) = i64::try_from(user.id.0) else {
        return Ok(());
    };

    let Some(result) = handler.try_handle(sender, text).await else {
        return Ok(());
    };

    if let Err(e) = telegram.reply(msg.chat.id, &result).await {
        warn!("Failed to reply to {}: {}", sender, e);
    }

    if let Some(broadcast) = &result.broadcast {
        let report = telegram.broadcast(broadcast).await;
        let summary = format!(
            "📢 Broadcast done: {} delivered, {} failed.",
            report.delivered, report.failed
        );
        if let Err(e) = telegram.send_text(msg.chat.id.0, &summary).await {
            warn!("Failed to report broadcast to {}: {}", sender, e);
        }
    }

    Ok(())
}

async fn on_callback(bot: Bot, query: CallbackQuery, telegram: Arc<TelegramBot>) -> ResponseResult<()> {
    if let Err(e) = bot.answer_callback_query(query.id.clone()).await {
        debug!("Could not answer callback query: {}", e);
    }

    let Some(hint) = query.data.as_deref().and_then(menu_hint) else {
        return Ok(());
    };
    let chat = ChatId::from(query.from.id);
    if let Err(e) = telegram.send_text(chat.0, hint).await {
        warn!("Failed to send menu hint to {}: {}", chat, e);
    }

    Ok(())
}

impl std::fmt::Debug for UpdateRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateRouter").finish_non_exhaustive()
    }
}

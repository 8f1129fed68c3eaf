use crate::config::Config;
use crate::db::{self, Pool};
use crate::keyboards::{self, Action, CallbackData};
use crate::media::{self, DocumentKind};
use crate::model::{ClaimType, FeedbackType, PendingInput, PendingInputKind};
use crate::reporter::{self, ReportView};
use crate::text;
use crate::validator::Validator;
use anyhow::{anyhow, Result};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use teloxide::payloads::{AnswerCallbackQuerySetters, EditMessageTextSetters, SendMessageSetters};
use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardMarkup, User};
use tracing::{error, info, instrument, warn};

const WELCOME: &str = "به ربات فکت‌چکر خوش آمدید!\n\
من می‌توانم به شما در راستی‌آزمایی اخبار و اطلاعات کمک کنم.\n\n\
برای شروع می‌توانید:\n\
• متن خبر یا ادعا را برای من ارسال کنید\n\
• تصویر یا ویدیو موردنظر را بفرستید\n\
• لینک مطلب را به اشتراک بگذارید\n\
• فایل متنی حاوی ادعا را ارسال کنید\n\n\
از منوی زیر گزینه مورد نظر را انتخاب کنید:";

const HELP: &str = "🔍 راهنمای استفاده از ربات فکت‌چکر:\n\n\
1️⃣ ارسال متن:\nمتن خبر یا ادعای مورد نظر را مستقیماً ارسال کنید\n\n\
2️⃣ ارسال تصویر:\nتصویر را به همراه کپشن توضیحی ارسال کنید\n\n\
3️⃣ ارسال لینک:\nلینک خبر یا مطلب را ارسال کنید\n\n\
4️⃣ ارسال ویدیو و سند:\nویدیو یا فایل متنی حاوی ادعا را ارسال کنید\n\n\
5️⃣ دریافت نتایج:\nپس از بررسی، نتیجه به همراه منابع ارسال می‌شود\n\n\
🔸 سایر دستورات:\n\
/settings - تنظیمات\n\
/stats - آمار بررسی‌ها\n\
/lang - تغییر زبان\n\
/about - درباره ربات";

const ABOUT: &str = "ℹ️ درباره ربات فکت‌چکر\n\n\
این ربات با هدف کمک به راستی‌آزمایی اخبار و اطلاعات طراحی شده است. \
با استفاده از منابع معتبر و پایگاه‌های راستی‌آزمایی، صحت اطلاعات را بررسی می‌کند.\n\n\
🔸 قابلیت‌های اصلی:\n\
• تحلیل متن، تصویر و ویدیو\n\
• بررسی منابع معتبر خبری\n\
• ارائه گزارش تحلیلی";

const GENERIC_ERROR: &str = "متأسفانه در پردازش درخواست شما مشکلی پیش آمد. لطفاً دوباره تلاش کنید.";
const CLAIM_RECEIVED: &str = "✅ ادعای شما دریافت شد و در حال بررسی است. نتیجه به‌زودی ارسال می‌شود.";
const NOT_AVAILABLE: &str = "اطلاعات این نتیجه در دسترس نیست.";
const NO_TEXT_FOUND: &str = "❗️ متنی برای بررسی در این فایل پیدا نشد. لطفاً متن ادعا را در کپشن بنویسید.";
const VOICE_UNSUPPORTED: &str = "🎤 بررسی پیام‌های صوتی در حال حاضر پشتیبانی نمی‌شود. لطفاً متن ادعا را ارسال کنید.";
const UNSUPPORTED: &str = "❗️ این نوع پیام پشتیبانی نمی‌شود.";
const COMMENT_PROMPT: &str = "✍️ لطفاً نظر خود را درباره این نتیجه بنویسید:\n\n\
• نظر شما باید مرتبط با موضوع باشد\n\
• حداقل ۱۰ و حداکثر ۵۰۰ کاراکتر مجاز است\n\
• از ارسال محتوای نامناسب خودداری کنید";
const COMMENT_INVALID: &str = "❗️ نظر باید بین ۱۰ تا ۵۰۰ کاراکتر باشد. لطفاً دوباره بنویسید.";
const COMMENT_SAVED: &str = "✅ نظر شما ثبت شد و پس از بررسی نمایش داده می‌شود.";
const REPORT_SAVED: &str = "✅ گزارش شما ثبت شد. در صورت تمایل توضیحات بیشتری بنویسید یا انصراف را بزنید.";
const REPORT_DESCRIPTION_SAVED: &str = "✅ توضیحات گزارش ثبت شد. از همکاری شما متشکریم.";
const REPORT_CLOSED: &str = "این گزارش قبلاً بررسی شده و توضیحات جدید پذیرفته نمی‌شود.";
const MAX_REPORT_DESCRIPTION: usize = 1000;

/// Shared state injected into every handler.
pub struct BotState {
    pub pool: Pool,
    pub validator: Validator,
    pub config: Arc<Config>,
}

impl BotState {
    fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.config.app.data_dir)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Start,
    Help,
    Settings,
    Stats,
    Lang(Option<&'a str>),
    About,
    Ping,
    Unknown(&'a str),
}

/// Parses `/cmd[@bot] [args]`; returns `None` for non-command text.
pub fn parse_command(text: &str) -> Option<Command<'_>> {
    let trimmed = text.trim();
    let rest = trimmed.strip_prefix('/')?;
    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((h, a)) => (h, a.trim()),
        None => (rest, ""),
    };
    let name = head.split('@').next().unwrap_or(head);
    let arg = (!args.is_empty()).then_some(args);
    Some(match name.to_ascii_lowercase().as_str() {
        "start" => Command::Start,
        "help" => Command::Help,
        "settings" => Command::Settings,
        "stats" => Command::Stats,
        "lang" => Command::Lang(arg),
        "about" => Command::About,
        "ping" => Command::Ping,
        _ => Command::Unknown(name),
    })
}

pub fn language_name(code: &str) -> &'static str {
    match code {
        "en" => "English",
        _ => "فارسی",
    }
}

async fn reply(bot: &Bot, chat: ChatId, text: impl Into<String>) {
    if let Err(err) = bot.send_message(chat, text).await {
        warn!(?err, "failed to send message");
    }
}

async fn reply_with(bot: &Bot, chat: ChatId, text: impl Into<String>, markup: InlineKeyboardMarkup) {
    if let Err(err) = bot.send_message(chat, text).reply_markup(markup).await {
        warn!(?err, "failed to send message");
    }
}

async fn register_user(pool: &Pool, user: &User) -> Result<i64> {
    let lang = user
        .language_code
        .as_deref()
        .filter(|l| matches!(*l, "fa" | "en"));
    db::get_or_create_user(
        pool,
        user.id.0 as i64,
        user.username.as_deref(),
        Some(user.first_name.as_str()),
        user.last_name.as_deref(),
        lang,
    )
    .await
}

/// Message endpoint: errors are logged and answered with a generic reply.
pub async fn on_message(bot: Bot, state: Arc<BotState>, msg: Message) -> Result<()> {
    if let Err(err) = handle_message(&bot, &state, &msg).await {
        error!(?err, "failed to handle message");
        reply(&bot, msg.chat.id, GENERIC_ERROR).await;
    }
    Ok(())
}

#[instrument(skip_all)]
pub async fn handle_message(bot: &Bot, state: &BotState, msg: &Message) -> Result<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let tg_user_id = user.id.0 as i64;
    if db::is_user_banned(&state.pool, tg_user_id).await? {
        info!(tg_user_id, "ignoring banned user");
        return Ok(());
    }
    let user_id = register_user(&state.pool, user).await?;

    if let Some(text) = msg.text() {
        if let Some(cmd) = parse_command(text) {
            return handle_command(bot, state, msg, user, user_id, cmd).await;
        }
        if let Some(pending) = db::take_pending_input(&state.pool, user_id).await? {
            return handle_pending_input(bot, state, msg, user_id, pending, text).await;
        }
        return submit(bot, state, msg, user_id, text, ClaimType::Text).await;
    }

    if let Some((claim_text, claim_type)) = extract_media_claim(bot, state, msg, tg_user_id).await? {
        return submit(bot, state, msg, user_id, &claim_text, claim_type).await;
    }
    Ok(())
}

async fn handle_command(
    bot: &Bot,
    state: &BotState,
    msg: &Message,
    user: &User,
    user_id: i64,
    cmd: Command<'_>,
) -> Result<()> {
    let chat = msg.chat.id;
    match cmd {
        Command::Start => {
            let text = format!("سلام {} 👋\n\n{}", user.first_name, WELCOME);
            reply_with(bot, chat, text, keyboards::main_menu()).await;
        }
        Command::Help => reply(bot, chat, HELP).await,
        Command::About => reply(bot, chat, ABOUT).await,
        Command::Ping => reply(bot, chat, "PONG").await,
        Command::Settings => {
            let lang = db::user_language(&state.pool, user_id).await?;
            reply(bot, chat, settings_text(&lang)).await;
        }
        Command::Stats => {
            let stats = db::user_stats(&state.pool, user_id).await?;
            reply(bot, chat, reporter::stats_text(&stats)).await;
        }
        Command::Lang(None) => {
            let lang = db::user_language(&state.pool, user_id).await?;
            let text = format!(
                "🌐 انتخاب زبان ربات:\n\nزبان فعلی: {}\n\nبرای تغییر زبان بنویسید: /lang fa یا /lang en",
                language_name(&lang)
            );
            reply(bot, chat, text).await;
        }
        Command::Lang(Some(code)) => {
            let code = code.to_ascii_lowercase();
            if matches!(code.as_str(), "fa" | "en") {
                db::set_user_language(&state.pool, user_id, &code).await?;
                reply(bot, chat, format!("✅ زبان به {} تغییر کرد.", language_name(&code))).await;
            } else {
                reply(bot, chat, "❗️ زبان پشتیبانی نمی‌شود. گزینه‌ها: fa, en").await;
            }
        }
        Command::Unknown(name) => {
            info!(command = name, "unknown command");
            reply(bot, chat, "❗️ دستور ناشناخته. برای راهنما /help را بزنید.").await;
        }
    }
    Ok(())
}

fn settings_text(lang: &str) -> String {
    format!(
        "⚙️ تنظیمات ربات:\n\n\
         🔹 زبان فعلی: {}\n\
         🔹 فرمت گزارش: متنی\n\
         🔹 دریافت اعلان: فعال\n\n\
         برای تغییر زبان از دستور /lang استفاده کنید.",
        language_name(lang)
    )
}

async fn handle_pending_input(
    bot: &Bot,
    state: &BotState,
    msg: &Message,
    user_id: i64,
    pending: PendingInput,
    text: &str,
) -> Result<()> {
    let chat = msg.chat.id;
    match pending.kind {
        PendingInputKind::Comment => match state.validator.validate_comment(text) {
            Some(comment) => {
                db::add_comment(&state.pool, user_id, pending.fact_check_id, &comment).await?;
                reply(bot, chat, COMMENT_SAVED).await;
            }
            None => {
                // keep waiting for a valid comment
                db::set_pending_input(&state.pool, user_id, pending).await?;
                reply_with(
                    bot,
                    chat,
                    COMMENT_INVALID,
                    keyboards::back_or_cancel(pending.fact_check_id),
                )
                .await;
            }
        },
        PendingInputKind::Report => {
            let report_id = pending
                .report_id
                .ok_or_else(|| anyhow!("pending report input without report id"))?;
            let description =
                text::truncate_text(&text::clean_text(text), MAX_REPORT_DESCRIPTION, "...");
            if db::set_report_description(&state.pool, report_id, &description).await? {
                reply(bot, chat, REPORT_DESCRIPTION_SAVED).await;
            } else {
                reply(bot, chat, REPORT_CLOSED).await;
            }
        }
    }
    Ok(())
}

/// Validates and queues a claim, replying with the outcome.
async fn submit(
    bot: &Bot,
    state: &BotState,
    msg: &Message,
    user_id: i64,
    raw: &str,
    claim_type: ClaimType,
) -> Result<()> {
    let validated = match state.validator.validate(raw, claim_type) {
        Ok(v) => v,
        Err(err) => {
            info!(%err, "claim rejected");
            reply(bot, msg.chat.id, err.user_message()).await;
            return Ok(());
        }
    };

    let language = if validated.language == "unknown" {
        db::user_language(&state.pool, user_id).await?
    } else {
        validated.language.clone()
    };
    let metadata = json!({
        "tg_message_id": msg.id.0,
        "urls": validated.urls,
    });
    let claim_id = db::submit_claim(
        &state.pool,
        user_id,
        msg.chat.id.0,
        &validated.text,
        validated.claim_type,
        &language,
        &metadata,
    )
    .await?;
    info!(claim_id, claim_type = %validated.claim_type, "claim queued");
    reply(bot, msg.chat.id, CLAIM_RECEIVED).await;
    Ok(())
}

/// Turns photos, videos and documents into claim text. Replies and returns
/// `None` when nothing usable could be extracted.
async fn extract_media_claim(
    bot: &Bot,
    state: &BotState,
    msg: &Message,
    tg_user_id: i64,
) -> Result<Option<(String, ClaimType)>> {
    let chat = msg.chat.id;
    let caption = msg.caption();
    let data_dir = state.data_dir();
    let message_id = msg.id.0;

    let (extracted, claim_type) = if let Some(sizes) = msg.photo() {
        let Some(size) = sizes.last() else {
            return Ok(None);
        };
        let path = media::download_file(bot, &data_dir, tg_user_id, message_id, &size.file.id).await?;
        (ocr_or_log(&path).await, ClaimType::Image)
    } else if let Some(video) = msg.video() {
        let path =
            media::download_file(bot, &data_dir, tg_user_id, message_id, &video.file.id).await?;
        let text = match media::extract_frame(&path, &state.config.app.temp_dir()).await {
            Ok(frame) => {
                let text = ocr_or_log(&frame).await;
                if let Err(err) = tokio::fs::remove_file(&frame).await {
                    warn!(?err, frame = %frame.display(), "failed to remove frame");
                }
                text
            }
            Err(err) => {
                warn!(?err, video = %path.display(), "frame extraction failed");
                None
            }
        };
        (text, ClaimType::Video)
    } else if let Some(doc) = msg.document() {
        let mime = doc.mime_type.as_ref().map(|m| m.essence_str());
        match media::classify_document(mime, doc.file_name.as_deref()) {
            DocumentKind::Text => {
                if u64::from(doc.file.size) > media::MAX_TEXT_DOCUMENT_BYTES {
                    reply(bot, chat, "❗️ حجم فایل متنی بیش از حد مجاز (۱ مگابایت) است.").await;
                    return Ok(None);
                }
                let path =
                    media::download_file(bot, &data_dir, tg_user_id, message_id, &doc.file.id).await?;
                (Some(media::read_text_document(&path).await?), ClaimType::Document)
            }
            DocumentKind::Image => {
                let path =
                    media::download_file(bot, &data_dir, tg_user_id, message_id, &doc.file.id).await?;
                (ocr_or_log(&path).await, ClaimType::Image)
            }
            DocumentKind::Unsupported => {
                reply(bot, chat, UNSUPPORTED).await;
                return Ok(None);
            }
        }
    } else if msg.voice().is_some() || msg.audio().is_some() {
        reply(bot, chat, VOICE_UNSUPPORTED).await;
        return Ok(None);
    } else {
        reply(bot, chat, UNSUPPORTED).await;
        return Ok(None);
    };

    let combined = media::combine_text(caption, extracted.as_deref());
    if combined.is_empty() {
        reply(bot, chat, NO_TEXT_FOUND).await;
        return Ok(None);
    }
    Ok(Some((combined, claim_type)))
}

async fn ocr_or_log(path: &std::path::Path) -> Option<String> {
    match media::ocr_image(path, media::OCR_LANGUAGES).await {
        Ok(text) if !text.is_empty() => Some(text),
        Ok(_) => None,
        Err(err) => {
            warn!(?err, path = %path.display(), "ocr failed");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// callbacks

/// Callback endpoint: the query is always answered, with a notice on error.
pub async fn on_callback(bot: Bot, state: Arc<BotState>, q: CallbackQuery) -> Result<()> {
    let notice = match handle_callback(&bot, &state, &q).await {
        Ok(notice) => notice,
        Err(err) => {
            error!(?err, "failed to handle callback");
            Some(GENERIC_ERROR.to_string())
        }
    };
    let mut answer = bot.answer_callback_query(q.id.clone());
    if let Some(text) = notice {
        answer = answer.text(text);
    }
    if let Err(err) = answer.await {
        warn!(?err, "failed to answer callback query");
    }
    Ok(())
}

/// Returns an optional short notice shown in the callback answer.
#[instrument(skip_all)]
pub async fn handle_callback(
    bot: &Bot,
    state: &BotState,
    q: &CallbackQuery,
) -> Result<Option<String>> {
    let tg_user_id = q.from.id.0 as i64;
    if db::is_user_banned(&state.pool, tg_user_id).await? {
        return Ok(None);
    }
    let Some(data) = q.data.as_deref().and_then(CallbackData::decode) else {
        warn!(data = ?q.data, "unrecognized callback data");
        return Ok(Some("❗️ درخواست نامعتبر است.".to_string()));
    };
    let Some(message) = q.message.as_ref() else {
        return Ok(None);
    };
    let user_id = register_user(&state.pool, &q.from).await?;
    let chat = message.chat.id;

    if let Some(hint) = menu_hint(data.action) {
        reply(bot, chat, hint).await;
        return Ok(None);
    }

    match data.action {
        Action::MenuMain => {
            edit(bot, message, WELCOME, Some(keyboards::main_menu())).await;
            return Ok(None);
        }
        Action::MenuHelp => {
            reply(bot, chat, HELP).await;
            return Ok(None);
        }
        Action::MenuSettings => {
            let lang = db::user_language(&state.pool, user_id).await?;
            reply(bot, chat, settings_text(&lang)).await;
            return Ok(None);
        }
        _ => {}
    }

    let Some(fact_check_id) = data.id else {
        return Ok(Some("❗️ درخواست نامعتبر است.".to_string()));
    };
    let Some(fc) = db::get_fact_check(&state.pool, fact_check_id).await? else {
        return Ok(Some(NOT_AVAILABLE.to_string()));
    };
    let view = ReportView::from(&fc);

    match data.action {
        Action::Details => {
            let counts = db::feedback_counts(&state.pool, fc.id).await?;
            let text = reporter::detailed_text(&view, counts);
            edit(bot, message, &text, Some(keyboards::result(fc.id))).await;
            Ok(None)
        }
        Action::Share => {
            let username = &state.config.telegram.bot_username;
            let url = keyboards::share_url(&reporter::share_text(&view, username), username)?;
            edit(
                bot,
                message,
                "برای اشتراک‌گذاری نتیجه از دکمه زیر استفاده کنید:",
                Some(keyboards::share(fc.id, url)),
            )
            .await;
            Ok(None)
        }
        Action::Feedback => {
            let Some(vote) = data.vote else {
                return Ok(Some("❗️ درخواست نامعتبر است.".to_string()));
            };
            db::save_feedback(&state.pool, user_id, fc.id, vote).await?;
            let text = match vote {
                FeedbackType::Agree => "👍 نظر شما ثبت شد. شما با این نتیجه موافق هستید.",
                FeedbackType::Disagree => "👎 نظر شما ثبت شد. شما با این نتیجه مخالف هستید.",
            };
            Ok(Some(text.to_string()))
        }
        Action::Comment => {
            db::set_pending_input(
                &state.pool,
                user_id,
                PendingInput {
                    kind: PendingInputKind::Comment,
                    fact_check_id: fc.id,
                    report_id: None,
                },
            )
            .await?;
            reply_with(bot, chat, COMMENT_PROMPT, keyboards::back_or_cancel(fc.id)).await;
            Ok(None)
        }
        Action::Report => {
            edit(
                bot,
                message,
                "⚠️ گزارش مشکل\n\nلطفاً نوع مشکل را انتخاب کنید:",
                Some(keyboards::report_types(fc.id)),
            )
            .await;
            Ok(None)
        }
        Action::ReportType => {
            let Some(report_type) = data.report_type else {
                return Ok(Some("❗️ درخواست نامعتبر است.".to_string()));
            };
            let report_id =
                db::add_report(&state.pool, user_id, fc.id, report_type, None).await?;
            db::set_pending_input(
                &state.pool,
                user_id,
                PendingInput {
                    kind: PendingInputKind::Report,
                    fact_check_id: fc.id,
                    report_id: Some(report_id),
                },
            )
            .await?;
            info!(report_id, fact_check_id = fc.id, %report_type, "report filed");
            edit(bot, message, REPORT_SAVED, Some(keyboards::back_or_cancel(fc.id))).await;
            Ok(None)
        }
        Action::Recheck => {
            if !db::requeue_claim(&state.pool, fc.claim_id).await? {
                return Ok(Some("⏳ این ادعا هم‌اکنون در صف بررسی است.".to_string()));
            }
            info!(claim_id = fc.claim_id, "claim re-queued");
            Ok(Some("🔄 ادعا دوباره در صف بررسی قرار گرفت.".to_string()))
        }
        Action::Cancel => {
            db::clear_pending_input(&state.pool, user_id).await?;
            let text = reporter::render(&view, reporter::Format::Telegram)?;
            edit(bot, message, &text, Some(keyboards::result(fc.id))).await;
            Ok(Some("❌ لغو شد.".to_string()))
        }
        _ => Ok(None),
    }
}

fn menu_hint(action: Action) -> Option<&'static str> {
    Some(match action {
        Action::MenuText => "📝 متن خبر یا ادعای مورد نظر را ارسال کنید.",
        Action::MenuImage => "🖼 تصویر را به همراه کپشن توضیحی ارسال کنید.",
        Action::MenuVideo => "🎥 ویدیوی مورد نظر را ارسال کنید. متن روی تصویر استخراج می‌شود.",
        Action::MenuVoice => VOICE_UNSUPPORTED,
        Action::MenuDocument => "📄 فایل متنی (txt) یا تصویر سند را ارسال کنید.",
        Action::MenuLink => "🔗 لینک خبر یا مطلب را ارسال کنید.",
        _ => return None,
    })
}

async fn edit(bot: &Bot, message: &Message, text: &str, markup: Option<InlineKeyboardMarkup>) {
    let mut req = bot.edit_message_text(message.chat.id, message.id, text);
    if let Some(markup) = markup {
        req = req.reply_markup(markup);
    }
    if let Err(err) = req.await {
        warn!(?err, "failed to edit message");
    }
}

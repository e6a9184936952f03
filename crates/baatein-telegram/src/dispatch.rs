//! Routing of incoming Telegram messages to replies.
//!
//! The dispatcher turns one incoming message into the list of messages to
//! send back. It never talks to Telegram directly, which keeps every branch
//! testable with mock collaborators.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use baatein_chat::{ChatError, ChatPhase, ReplyAudio, SessionOrchestrator, TurnReply};
use baatein_core::types::ChatId;

use crate::api::{BotCommand, FileSource, Message};
use crate::error::{Result, TelegramError};
use crate::horoscope::{format_horoscope, Day, HoroscopeSource, Sign};

/// Telegram's limit on voice captions, in characters.
const CAPTION_LIMIT: usize = 1024;

const GENERIC_FAILURE: &str = "Something went wrong. Please retry.";
const START_HINT: &str = "Send /start to choose a character to chat with.";
const UNSUPPORTED: &str = "Your reply must be either text or a voice note";
const TYPE_A_NAME: &str = "Please type the name of the character you want to chat with.";

// =============================================================================
// Messages in and out
// =============================================================================

/// The parts of an incoming message the bot acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// `/name`, lowercased, without any `@bot` suffix.
    Command(String),
    Text(String),
    Voice { file_id: String },
    Unsupported,
}

impl Incoming {
    pub fn from_message(message: &Message) -> Self {
        if let Some(text) = &message.text {
            let trimmed = text.trim();
            if let Some(rest) = trimmed.strip_prefix('/') {
                let word = rest.split_whitespace().next().unwrap_or_default();
                let name = word.split('@').next().unwrap_or_default();
                return Incoming::Command(name.to_ascii_lowercase());
            }
            return Incoming::Text(text.clone());
        }
        match &message.voice {
            Some(voice) => Incoming::Voice {
                file_id: voice.file_id.clone(),
            },
            None => Incoming::Unsupported,
        }
    }
}

/// A message to send back to the chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    Text { text: String, markdown: bool },
    Voice { audio: Vec<u8>, caption: Option<String> },
}

impl Outgoing {
    pub fn plain(text: impl Into<String>) -> Self {
        Outgoing::Text {
            text: text.into(),
            markdown: false,
        }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Outgoing::Text {
            text: text.into(),
            markdown: true,
        }
    }
}

/// Escape the characters legacy Telegram Markdown treats as markup.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// =============================================================================
// Dispatcher
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HoroscopeStep {
    AwaitingSign,
    AwaitingDay(Sign),
}

pub struct Dispatcher {
    orchestrator: Arc<SessionOrchestrator>,
    files: Arc<dyn FileSource>,
    horoscope: Option<Arc<dyn HoroscopeSource>>,
    bot_name: String,
    flows: Mutex<HashMap<ChatId, HoroscopeStep>>,
}

impl Dispatcher {
    pub fn new(
        orchestrator: Arc<SessionOrchestrator>,
        files: Arc<dyn FileSource>,
        bot_name: impl Into<String>,
    ) -> Self {
        Self {
            orchestrator,
            files,
            horoscope: None,
            bot_name: bot_name.into(),
            flows: Mutex::new(HashMap::new()),
        }
    }

    /// Enable `/horoscope`.
    pub fn with_horoscope(mut self, source: Arc<dyn HoroscopeSource>) -> Self {
        self.horoscope = Some(source);
        self
    }

    /// Command list advertised through `setMyCommands`.
    pub fn commands(&self) -> Vec<BotCommand> {
        let mut commands = vec![
            BotCommand::new("start", "Choose a character to chat with"),
            BotCommand::new("reset", "Start over with a new character"),
        ];
        if self.horoscope.is_some() {
            commands.push(BotCommand::new("horoscope", "Get a daily horoscope"));
        }
        commands.push(BotCommand::new("help", "Show what I can do"));
        commands
    }

    /// Numbered, bold persona list in display order.
    pub fn menu(&self) -> String {
        self.orchestrator
            .catalog()
            .list_ordered()
            .iter()
            .enumerate()
            .map(|(i, persona)| format!("{}. *{}*", i + 1, escape_markdown(&persona.name)))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Handle one incoming message. Failures become a short apology.
    pub async fn dispatch(&self, chat_id: ChatId, incoming: Incoming) -> Vec<Outgoing> {
        match self.route(chat_id, incoming).await {
            Ok(replies) => replies,
            Err(e) => {
                tracing::warn!(%chat_id, error = %e, "Failed to handle message");
                let text = match &e {
                    TelegramError::Chat(chat_error) => chat_error.user_message(),
                    _ => GENERIC_FAILURE,
                };
                vec![Outgoing::plain(text)]
            }
        }
    }

    async fn route(&self, chat_id: ChatId, incoming: Incoming) -> Result<Vec<Outgoing>> {
        match incoming {
            Incoming::Command(command) => {
                self.flows().remove(&chat_id);
                self.command(chat_id, &command).await
            }
            Incoming::Text(text) => {
                let pending = self.flows().remove(&chat_id);
                if let Some(step) = pending {
                    return self.horoscope_step(chat_id, step, &text).await;
                }
                match self.orchestrator.phase(chat_id)? {
                    ChatPhase::NoSession => Ok(vec![Outgoing::plain(START_HINT)]),
                    ChatPhase::AwaitingPersonaChoice => self.choose_persona(chat_id, &text),
                    ChatPhase::ActiveSession if text.trim().eq_ignore_ascii_case("reset") => {
                        self.reset(chat_id)
                    }
                    ChatPhase::ActiveSession => {
                        let reply = self.orchestrator.handle_text(chat_id, &text).await?;
                        Ok(render_reply(reply))
                    }
                }
            }
            Incoming::Voice { file_id } => {
                let pending = self.flows().get(&chat_id).copied();
                if let Some(step) = pending {
                    return Ok(vec![step_prompt(step)]);
                }
                match self.orchestrator.phase(chat_id)? {
                    ChatPhase::NoSession => Ok(vec![Outgoing::plain(START_HINT)]),
                    ChatPhase::AwaitingPersonaChoice => Ok(vec![Outgoing::plain(TYPE_A_NAME)]),
                    ChatPhase::ActiveSession => {
                        let audio = self.files.download(&file_id).await?;
                        let reply = self.orchestrator.handle_audio(chat_id, &audio).await?;
                        Ok(render_reply(reply))
                    }
                }
            }
            Incoming::Unsupported => Ok(vec![Outgoing::plain(UNSUPPORTED)]),
        }
    }

    async fn command(&self, chat_id: ChatId, command: &str) -> Result<Vec<Outgoing>> {
        match command {
            "start" => match self.orchestrator.begin(chat_id)? {
                ChatPhase::ActiveSession => {
                    let persona = self.orchestrator.persona(chat_id).await?;
                    Ok(vec![Outgoing::plain(format!(
                        "You are chatting with {}. To switch character, send /reset.",
                        persona.name
                    ))])
                }
                _ => Ok(vec![Outgoing::markdown(format!(
                    "Hi, welcome to {}. Please choose the character you wish to chat with:\n\n{}",
                    escape_markdown(&self.bot_name),
                    self.menu()
                ))]),
            },
            "reset" => self.reset(chat_id),
            "horoscope" if self.horoscope.is_some() => {
                self.flows().insert(chat_id, HoroscopeStep::AwaitingSign);
                Ok(vec![step_prompt(HoroscopeStep::AwaitingSign)])
            }
            "help" => Ok(vec![Outgoing::plain(self.help())]),
            _ => Ok(vec![Outgoing::plain(
                "Sorry, I don't know that command. Send /help to see what I can do.",
            )]),
        }
    }

    fn help(&self) -> String {
        self.commands()
            .iter()
            .map(|c| format!("/{} - {}", c.command, c.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn reset(&self, chat_id: ChatId) -> Result<Vec<Outgoing>> {
        self.orchestrator.reset(chat_id)?;
        Ok(vec![Outgoing::markdown(format!(
            "Done. Please choose one of:\n\n{}",
            self.menu()
        ))])
    }

    fn choose_persona(&self, chat_id: ChatId, text: &str) -> Result<Vec<Outgoing>> {
        match self.orchestrator.select_persona(chat_id, text) {
            Ok(persona) => Ok(vec![
                Outgoing::plain("Setting things up..."),
                Outgoing::plain(format!(
                    "Done. You are now chatting with {}. To reset, enter /reset",
                    persona.name
                )),
            ]),
            Err(ChatError::UnknownPersona(_)) => Ok(vec![Outgoing::markdown(format!(
                "Sorry, that character is not available. Please choose one of:\n\n{}",
                self.menu()
            ))]),
            Err(e) => Err(e.into()),
        }
    }

    async fn horoscope_step(
        &self,
        chat_id: ChatId,
        step: HoroscopeStep,
        text: &str,
    ) -> Result<Vec<Outgoing>> {
        let Some(source) = &self.horoscope else {
            return Ok(vec![Outgoing::plain(START_HINT)]);
        };

        match step {
            HoroscopeStep::AwaitingSign => match text.parse::<Sign>() {
                Ok(sign) => {
                    let next = HoroscopeStep::AwaitingDay(sign);
                    self.flows().insert(chat_id, next);
                    Ok(vec![step_prompt(next)])
                }
                Err(_) => {
                    self.flows().insert(chat_id, step);
                    Ok(vec![retry_prompt(step)])
                }
            },
            HoroscopeStep::AwaitingDay(sign) => match text.parse::<Day>() {
                Ok(day) => {
                    let horoscope = source.daily(sign, day).await?;
                    Ok(vec![
                        Outgoing::plain("Here's your horoscope!"),
                        Outgoing::markdown(format_horoscope(&horoscope, sign)),
                    ])
                }
                Err(_) => {
                    self.flows().insert(chat_id, step);
                    Ok(vec![retry_prompt(step)])
                }
            },
        }
    }

    fn flows(&self) -> MutexGuard<'_, HashMap<ChatId, HoroscopeStep>> {
        self.flows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn sign_choices() -> String {
    Sign::ALL
        .iter()
        .map(|s| format!("*{}*", s))
        .collect::<Vec<_>>()
        .join(", ")
}

fn prompt_text(step: HoroscopeStep) -> String {
    match step {
        HoroscopeStep::AwaitingSign => {
            format!("What is your zodiac sign?\nChoose one: {}", sign_choices())
        }
        HoroscopeStep::AwaitingDay(_) => "What day do you want to know?\nChoose one: *Today*, *Tomorrow*, *Yesterday* or a date like 2024-01-31".to_string(),
    }
}

fn step_prompt(step: HoroscopeStep) -> Outgoing {
    Outgoing::markdown(prompt_text(step))
}

fn retry_prompt(step: HoroscopeStep) -> Outgoing {
    Outgoing::markdown(format!("Sorry, I didn't get that. {}", prompt_text(step)))
}

fn render_reply(reply: TurnReply) -> Vec<Outgoing> {
    let mut out = Vec::new();
    if let Some(heard) = &reply.heard {
        out.push(Outgoing::plain(format!("You said: {}", heard)));
    }
    match reply.audio {
        ReplyAudio::Rendered(audio) if reply.text.chars().count() <= CAPTION_LIMIT => {
            out.push(Outgoing::Voice {
                audio,
                caption: Some(reply.text),
            });
        }
        ReplyAudio::Rendered(audio) => {
            out.push(Outgoing::Voice {
                audio,
                caption: None,
            });
            out.push(Outgoing::plain(reply.text));
        }
        ReplyAudio::Skipped => out.push(Outgoing::plain(reply.text)),
        ReplyAudio::Failed(e) => {
            tracing::warn!(error = %e, "Sending reply as text only");
            out.push(Outgoing::plain(reply.text));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use baatein_audio::MockEncoder;
    use baatein_chat::{MockGenerator, PersonaCatalog, TurnPipeline};
    use baatein_voice::MockSynthesizer;
    use baatein_whisper::MockTranscriptionService;

    use crate::api::{Chat, Voice};
    use crate::horoscope::DailyHoroscope;

    const CHAT: ChatId = ChatId(77);

    #[derive(Default)]
    struct MockFiles {
        downloads: AtomicUsize,
    }

    #[async_trait]
    impl FileSource for MockFiles {
        async fn download(&self, file_id: &str) -> Result<Vec<u8>> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            if file_id == "missing" {
                return Err(TelegramError::Api {
                    code: 400,
                    description: "file not found".to_string(),
                });
            }
            Ok(b"OggS-voice".to_vec())
        }
    }

    struct MockHoroscope;

    #[async_trait]
    impl HoroscopeSource for MockHoroscope {
        async fn daily(&self, sign: Sign, day: Day) -> Result<DailyHoroscope> {
            Ok(DailyHoroscope {
                date: day.as_query(),
                horoscope_data: format!("{} will have a calm day.", sign),
            })
        }
    }

    fn dispatcher(speech: bool) -> (Dispatcher, Arc<MockFiles>) {
        let catalog = PersonaCatalog::load(
            r#"{
                "Nova": {"system_prompt": "s", "chat_model": "m", "voice": "Rachel", "sort_order": 1},
                "Old_Man": {"system_prompt": "s", "chat_model": "m", "voice": "Adam", "sort_order": 0}
            }"#,
            "eleven_monolingual_v1",
        )
        .unwrap();
        let mut pipeline = TurnPipeline::new(
            Arc::new(MockEncoder::new()),
            Arc::new(MockTranscriptionService::with_text("hello")),
            Arc::new(MockGenerator::new("hi there")),
        );
        if speech {
            pipeline = pipeline.with_synthesizer(Arc::new(MockSynthesizer::new()));
        }
        let orchestrator = Arc::new(SessionOrchestrator::new(Arc::new(catalog), pipeline));
        let files = Arc::new(MockFiles::default());
        let dispatcher = Dispatcher::new(orchestrator, files.clone(), "Baatein.ai")
            .with_horoscope(Arc::new(MockHoroscope));
        (dispatcher, files)
    }

    fn text(s: &str) -> Incoming {
        Incoming::Text(s.to_string())
    }

    fn command(s: &str) -> Incoming {
        Incoming::Command(s.to_string())
    }

    fn message(text: Option<&str>, voice: Option<&str>) -> Message {
        Message {
            message_id: 1,
            chat: Chat { id: 5 },
            text: text.map(str::to_string),
            voice: voice.map(|id| Voice {
                file_id: id.to_string(),
                duration: 2,
            }),
        }
    }

    #[test]
    fn test_incoming_from_message() {
        assert_eq!(
            Incoming::from_message(&message(Some("/start"), None)),
            command("start")
        );
        assert_eq!(
            Incoming::from_message(&message(Some("/Reset@BaateinBot now"), None)),
            command("reset")
        );
        assert_eq!(Incoming::from_message(&message(Some("Nova"), None)), text("Nova"));
        assert_eq!(
            Incoming::from_message(&message(None, Some("AwAD"))),
            Incoming::Voice {
                file_id: "AwAD".to_string()
            }
        );
        assert_eq!(Incoming::from_message(&message(None, None)), Incoming::Unsupported);
    }

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("Old_Man *x*"), "Old\\_Man \\*x\\*");
        assert_eq!(escape_markdown("Nova"), "Nova");
    }

    #[test]
    fn test_menu_is_numbered_in_display_order() {
        let (d, _) = dispatcher(false);
        assert_eq!(d.menu(), "1. *Old\\_Man*\n2. *Nova*");
    }

    #[tokio::test]
    async fn test_start_shows_welcome_menu() {
        let (d, _) = dispatcher(false);
        let out = d.dispatch(CHAT, command("start")).await;
        assert_eq!(out.len(), 1);
        match &out[0] {
            Outgoing::Text { text, markdown } => {
                assert!(*markdown);
                assert!(text.starts_with("Hi, welcome to Baatein.ai."));
                assert!(text.ends_with("1. *Old\\_Man*\n2. *Nova*"));
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_text_before_start_hints() {
        let (d, _) = dispatcher(false);
        assert_eq!(d.dispatch(CHAT, text("hello")).await, vec![Outgoing::plain(START_HINT)]);
    }

    #[tokio::test]
    async fn test_select_persona_flow() {
        let (d, _) = dispatcher(false);
        d.dispatch(CHAT, command("start")).await;

        let out = d.dispatch(CHAT, text("Zed")).await;
        match &out[..] {
            [Outgoing::Text { text, markdown: true }] => {
                assert!(text.starts_with("Sorry, that character is not available."))
            }
            other => panic!("unexpected reply {:?}", other),
        }

        let out = d.dispatch(CHAT, text("Nova")).await;
        assert_eq!(
            out,
            vec![
                Outgoing::plain("Setting things up..."),
                Outgoing::plain("Done. You are now chatting with Nova. To reset, enter /reset"),
            ]
        );

        let out = d.dispatch(CHAT, command("start")).await;
        assert!(matches!(&out[0], Outgoing::Text { text, .. } if text.contains("/reset")));
    }

    #[tokio::test]
    async fn test_text_turn_without_speech() {
        let (d, _) = dispatcher(false);
        d.dispatch(CHAT, command("start")).await;
        d.dispatch(CHAT, text("Nova")).await;
        assert_eq!(
            d.dispatch(CHAT, text("hello")).await,
            vec![Outgoing::plain("hi there")]
        );
    }

    #[tokio::test]
    async fn test_text_turn_with_speech_sends_voice() {
        let (d, _) = dispatcher(true);
        d.dispatch(CHAT, command("start")).await;
        d.dispatch(CHAT, text("Nova")).await;
        assert_eq!(
            d.dispatch(CHAT, text("hello")).await,
            vec![Outgoing::Voice {
                audio: b"Rachel:eleven_monolingual_v1:hi there".to_vec(),
                caption: Some("hi there".to_string()),
            }]
        );
    }

    #[tokio::test]
    async fn test_voice_turn_downloads_and_echoes_transcript() {
        let (d, files) = dispatcher(false);
        d.dispatch(CHAT, command("start")).await;
        d.dispatch(CHAT, text("Nova")).await;

        let out = d
            .dispatch(
                CHAT,
                Incoming::Voice {
                    file_id: "AwAD".to_string(),
                },
            )
            .await;
        assert_eq!(
            out,
            vec![Outgoing::plain("You said: hello"), Outgoing::plain("hi there")]
        );
        assert_eq!(files.downloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_voice_download_failure_apologizes() {
        let (d, _) = dispatcher(false);
        d.dispatch(CHAT, command("start")).await;
        d.dispatch(CHAT, text("Nova")).await;
        let out = d
            .dispatch(
                CHAT,
                Incoming::Voice {
                    file_id: "missing".to_string(),
                },
            )
            .await;
        assert_eq!(out, vec![Outgoing::plain(GENERIC_FAILURE)]);
    }

    #[tokio::test]
    async fn test_voice_while_choosing_asks_for_name() {
        let (d, files) = dispatcher(false);
        d.dispatch(CHAT, command("start")).await;
        let out = d
            .dispatch(
                CHAT,
                Incoming::Voice {
                    file_id: "AwAD".to_string(),
                },
            )
            .await;
        assert_eq!(out, vec![Outgoing::plain(TYPE_A_NAME)]);
        assert_eq!(files.downloads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reset_command_and_plain_reset() {
        let (d, _) = dispatcher(false);
        d.dispatch(CHAT, command("start")).await;
        d.dispatch(CHAT, text("Nova")).await;

        let out = d.dispatch(CHAT, text("Reset")).await;
        assert!(matches!(&out[0], Outgoing::Text { text, markdown: true } if text.starts_with("Done.")));
        assert_eq!(
            d.orchestrator.phase(CHAT).unwrap(),
            ChatPhase::AwaitingPersonaChoice
        );

        d.dispatch(CHAT, command("reset")).await;
        assert_eq!(
            d.orchestrator.phase(CHAT).unwrap(),
            ChatPhase::AwaitingPersonaChoice
        );
    }

    #[tokio::test]
    async fn test_unsupported_content() {
        let (d, _) = dispatcher(false);
        assert_eq!(
            d.dispatch(CHAT, Incoming::Unsupported).await,
            vec![Outgoing::plain(UNSUPPORTED)]
        );
    }

    #[tokio::test]
    async fn test_horoscope_flow() {
        let (d, _) = dispatcher(false);

        let out = d.dispatch(CHAT, command("horoscope")).await;
        assert!(matches!(&out[0], Outgoing::Text { text, .. } if text.contains("*Pisces*")));

        let out = d.dispatch(CHAT, text("Dragon")).await;
        assert!(matches!(&out[0], Outgoing::Text { text, .. } if text.starts_with("Sorry")));

        let out = d.dispatch(CHAT, text("leo")).await;
        assert!(matches!(&out[0], Outgoing::Text { text, .. } if text.contains("*Tomorrow*")));

        let out = d.dispatch(CHAT, text("someday")).await;
        assert!(matches!(&out[0], Outgoing::Text { text, .. } if text.starts_with("Sorry")));

        let out = d.dispatch(CHAT, text("tomorrow")).await;
        assert_eq!(
            out,
            vec![
                Outgoing::plain("Here's your horoscope!"),
                Outgoing::markdown(
                    "*Horoscope:* Leo will have a calm day.\n*Sign:* Leo\n*Day:* TOMORROW"
                ),
            ]
        );

        // Flow finished; text is routed to the persona flow again.
        assert_eq!(d.dispatch(CHAT, text("hello")).await, vec![Outgoing::plain(START_HINT)]);
    }

    #[tokio::test]
    async fn test_command_cancels_horoscope_flow() {
        let (d, _) = dispatcher(false);
        d.dispatch(CHAT, command("horoscope")).await;
        d.dispatch(CHAT, command("start")).await;

        let out = d.dispatch(CHAT, text("Nova")).await;
        assert_eq!(out[0], Outgoing::plain("Setting things up..."));
    }

    #[tokio::test]
    async fn test_horoscope_disabled() {
        let (d, _) = dispatcher(false);
        let d = Dispatcher {
            horoscope: None,
            ..d
        };
        assert!(!d.commands().iter().any(|c| c.command == "horoscope"));
        let out = d.dispatch(CHAT, command("horoscope")).await;
        assert!(matches!(&out[0], Outgoing::Text { text, .. } if text.contains("/help")));
    }

    #[test]
    fn test_long_reply_sent_after_voice() {
        let long = "a".repeat(CAPTION_LIMIT + 1);
        let out = render_reply(TurnReply {
            text: long.clone(),
            heard: None,
            audio: ReplyAudio::Rendered(vec![1, 2]),
        });
        assert_eq!(
            out,
            vec![
                Outgoing::Voice {
                    audio: vec![1, 2],
                    caption: None
                },
                Outgoing::plain(long),
            ]
        );
    }
}

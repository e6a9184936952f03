//! Telegram front end for Baatein.
//!
//! Long-polls the Bot API, routes each update through the session
//! orchestrator (or the horoscope side flow) and delivers the replies.

pub mod api;
pub mod dispatch;
pub mod error;
pub mod horoscope;
pub mod poller;

pub use api::{BotApi, BotCommand, FileSource};
pub use dispatch::{Dispatcher, Incoming, Outgoing};
pub use error::TelegramError;
pub use horoscope::{Day, HoroscopeClient, HoroscopeSource, Sign};
pub use poller::Poller;

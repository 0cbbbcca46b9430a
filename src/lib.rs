pub mod cli;
pub mod client;
pub mod error;
pub mod event;
pub mod settings;
pub mod types;
pub mod ui;

pub use client::{BASE_URL, ClientConfig, JirafeClient};
pub use error::{Error, Result};
pub use settings::{Credentials, FileSettings, MemorySettings, SettingKey, SettingsStore};
pub use types::{
    BatchEnvelope, CartData, Envelope, EventData, Method, OrderData, PageView, Params,
    ProductData, UserData,
};

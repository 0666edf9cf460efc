pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;

pub use catalog::{CourseCatalog, CourseInfo, FaqEntry, FaqTable};
pub use config::{AppConfig, ChatMode, ConfigError, ConfigOverrides, LoadOptions};
pub use domain::conversation::{validate_chat_input, ConversationHistory, Exchange, MAX_EXCHANGES};
pub use domain::registration::{RegistrationId, RegistrationRecord};
pub use errors::{ApplicationError, DomainError, ErrorClass, InterfaceError};

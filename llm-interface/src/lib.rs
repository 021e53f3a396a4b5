//! Language model calls that turn a product description into a scraping
//! instruction, and scraped posts into product ideas.

pub mod prompt;
pub mod providers;

pub use prompt::{snippet, strip_code_fences};
pub use providers::{GeminiProvider, OpenRouterProvider, PromptGenerator};

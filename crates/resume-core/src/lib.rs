pub mod config;
pub mod error;
pub mod filename;
pub mod skills;
pub mod types;

pub use config::ResumeConfig;
pub use error::{ResumeError, Result};
pub use filename::sanitize_filename;
pub use skills::{SkillMatcher, SKILLS_VOCABULARY};
pub use types::Metadata;

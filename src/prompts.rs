pub const GENERATE_SECTION_PROMPT_MD: &str = include_str!("../prompts/generate_section.md");
pub const RELEVANCE_SCORE_PROMPT_MD: &str = include_str!("../prompts/relevance_score.md");
pub const NESTING_PROMPT_MD: &str = include_str!("../prompts/nesting.md");
pub const SIBLINGS_PROMPT_MD: &str = include_str!("../prompts/siblings.md");

pub mod budgets;
pub mod estimates;
pub mod generations;
pub mod prompts;
pub mod templates;

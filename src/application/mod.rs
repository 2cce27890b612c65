pub mod use_cases;

pub use use_cases::database_query::DatabaseQueryUseCase;
pub use use_cases::log_analysis::LogAnalysisUseCase;
